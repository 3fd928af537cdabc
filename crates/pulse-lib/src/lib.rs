pub mod conditioner;
pub mod config;
pub mod detectors;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod monitor;
pub mod plot;
pub mod preprocess;
pub mod session;
pub mod signal;
pub mod synth;

pub use config::*;
pub use detectors::*;
pub use metrics::*;
pub use session::*;
pub use signal::*;
