use crate::{
    conditioner::StreamConditioner,
    config::PulseConfig,
    session::{LiveEstimate, MeasurementRecord, Recording, SessionError, SessionPhase},
    signal::{Sample, SampleSeries},
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, warn};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor worker is no longer accepting samples")]
    Closed,
    #[error("monitor worker exited without a measurement")]
    NoResult,
    #[error("monitor worker panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Session(#[from] SessionError),
}

enum MonitorCommand {
    Sample(Sample),
    Stop,
}

/// Display frames kept for a slow consumer; older frames are discarded.
pub const DISPLAY_BACKLOG: usize = 4;

/// Session events. These are small and queued without bound, so a consumer
/// that only polls should drain them regularly.
#[derive(Debug, Clone)]
pub enum MonitorUpdate {
    Estimate(LiveEstimate),
    Phase(SessionPhase),
    Finished(Result<MeasurementRecord, SessionError>),
}

/// Start a session worker. Returns the capture-side handle and the consumer side.
///
/// The capture side owns the [`StreamConditioner`] and conditions every raw
/// reading in place, then hands the conditioned sample to a worker thread
/// over a channel. The worker owns the [`Recording`] and runs the batch
/// stages on its buffer. Display frames go out on a bounded channel and
/// every other event as a [`MonitorUpdate`].
pub fn spawn_monitor(cfg: &PulseConfig) -> (CaptureHandle, LiveMonitor) {
    let (command_tx, command_rx) = unbounded();
    let (update_tx, update_rx) = unbounded();
    let (display_tx, display_rx) = bounded(DISPLAY_BACKLOG);
    let recording = Recording::new(cfg.session, cfg.pipeline);
    let worker = {
        let display = DisplayFeed {
            tx: display_tx,
            overflow: display_rx.clone(),
        };
        std::thread::spawn(move || MonitorWorker::new(recording, command_rx, update_tx, display).run())
    };
    let capture = CaptureHandle {
        conditioner: StreamConditioner::new(cfg.conditioner),
        last_timestamp: None,
        command_tx,
    };
    let monitor = LiveMonitor {
        update_rx,
        display_rx,
        worker: Some(worker),
    };
    (capture, monitor)
}

/// Capture-thread end of the handoff. Never blocks.
pub struct CaptureHandle {
    conditioner: StreamConditioner,
    last_timestamp: Option<f64>,
    command_tx: Sender<MonitorCommand>,
}

impl CaptureHandle {
    /// Condition one raw reading and queue it for the worker.
    ///
    /// Out-of-order readings are dropped before they reach the conditioner.
    /// A non-finite reading repeats the last conditioned value, or is dropped
    /// when nothing has been conditioned yet.
    pub fn submit(&mut self, timestamp: f64, raw: f64) -> Result<(), MonitorError> {
        if !timestamp.is_finite() {
            warn!("capture: dropping sample without a valid timestamp");
            return Ok(());
        }
        if let Some(last) = self.last_timestamp.filter(|&last| timestamp < last) {
            warn!("capture: dropping out-of-order sample at {timestamp:.3}s (last {last:.3}s)");
            return Ok(());
        }
        let value = self.conditioner.condition(raw);
        if !value.is_finite() {
            warn!("capture: dropping non-finite reading at {timestamp:.3}s");
            return Ok(());
        }
        self.last_timestamp = Some(timestamp);
        self.command_tx
            .send(MonitorCommand::Sample(Sample::new(timestamp, value)))
            .map_err(|_| MonitorError::Closed)
    }

    /// End the session. Dropping the handle has the same effect.
    pub fn stop(self) -> Result<(), MonitorError> {
        self.command_tx
            .send(MonitorCommand::Stop)
            .map_err(|_| MonitorError::Closed)
    }
}

/// Consumer end: receives display frames, updates and the final record.
pub struct LiveMonitor {
    update_rx: Receiver<MonitorUpdate>,
    display_rx: Receiver<SampleSeries>,
    worker: Option<JoinHandle<()>>,
}

impl LiveMonitor {
    /// Updates published since the last call, without waiting.
    pub fn pending_updates(&self) -> Vec<MonitorUpdate> {
        self.update_rx.try_iter().collect()
    }

    /// Next update, or `None` when nothing arrives within `timeout` or the worker is gone.
    pub fn next_update(&self, timeout: Duration) -> Option<MonitorUpdate> {
        match self.update_rx.recv_timeout(timeout) {
            Ok(update) => Some(update),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Display frames still queued, oldest first. At most [`DISPLAY_BACKLOG`].
    pub fn pending_displays(&self) -> Vec<SampleSeries> {
        self.display_rx.try_iter().collect()
    }

    /// Newest queued display frame, discarding older ones.
    pub fn latest_display(&self) -> Option<SampleSeries> {
        self.display_rx.try_iter().last()
    }

    /// Next display frame, or `None` when nothing arrives within `timeout` or the worker is gone.
    pub fn next_display(&self, timeout: Duration) -> Option<SampleSeries> {
        self.display_rx.recv_timeout(timeout).ok()
    }

    /// Block until the session finishes; hands every other update to `on_update`.
    pub fn wait_with<F>(mut self, mut on_update: F) -> Result<MeasurementRecord, MonitorError>
    where
        F: FnMut(&MonitorUpdate),
    {
        let mut outcome = None;
        for update in self.update_rx.iter() {
            if let MonitorUpdate::Finished(result) = update {
                outcome = Some(result);
                break;
            }
            on_update(&update);
        }
        let mut panicked = false;
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("monitor worker panicked");
                panicked = true;
            }
        }
        match outcome {
            Some(result) => Ok(result?),
            None if panicked => Err(MonitorError::WorkerPanicked),
            None => Err(MonitorError::NoResult),
        }
    }

    /// Block until the session finishes, discarding intermediate updates.
    pub fn wait(self) -> Result<MeasurementRecord, MonitorError> {
        self.wait_with(|_| {})
    }
}

/// Sending end of the display channel plus a receiver used to evict the
/// oldest frame when the consumer falls behind.
struct DisplayFeed {
    tx: Sender<SampleSeries>,
    overflow: Receiver<SampleSeries>,
}

impl DisplayFeed {
    fn publish(&self, frame: SampleSeries) {
        match self.tx.try_send(frame) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(frame)) => {
                let _ = self.overflow.try_recv();
                let _ = self.tx.try_send(frame);
            }
        }
    }
}

struct MonitorWorker {
    recording: Recording,
    command_rx: Receiver<MonitorCommand>,
    update_tx: Sender<MonitorUpdate>,
    display: DisplayFeed,
}

impl MonitorWorker {
    fn new(
        recording: Recording,
        command_rx: Receiver<MonitorCommand>,
        update_tx: Sender<MonitorUpdate>,
        display: DisplayFeed,
    ) -> Self {
        Self {
            recording,
            command_rx,
            update_tx,
            display,
        }
    }

    fn run(mut self) {
        while let Ok(command) = self.command_rx.recv() {
            match command {
                MonitorCommand::Sample(sample) => {
                    self.handle_sample(sample);
                    if self.recording.phase().is_complete() {
                        break;
                    }
                }
                MonitorCommand::Stop => break,
            }
        }
        // capture handle dropped, stop requested, or countdown elapsed
        let before = self.recording.phase();
        self.recording.stop();
        self.publish_phase(before);
        let result = self.recording.finish();
        debug!("monitor worker finished with {} samples", self.recording.buffer().len());
        let _ = self.update_tx.send(MonitorUpdate::Finished(result));
    }

    fn handle_sample(&mut self, sample: Sample) {
        let before = self.recording.phase();
        let estimate = self.recording.push(sample);
        self.display.publish(self.recording.display_series());
        if let Some(estimate) = estimate {
            let _ = self.update_tx.send(MonitorUpdate::Estimate(estimate));
        }
        self.publish_phase(before);
    }

    fn publish_phase(&self, before: SessionPhase) {
        let now = self.recording.phase();
        if now != before {
            let _ = self.update_tx.send(MonitorUpdate::Phase(now));
        }
    }
}
