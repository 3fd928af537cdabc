pub mod bpm;
pub mod hrv;
pub mod quality;
