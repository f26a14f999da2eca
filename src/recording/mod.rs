//! Recording Module
//!
//! Microphone capture for new layers:
//! - Capture device traits
//! - Countdown and capture pipeline

pub mod capture;
pub mod pipeline;

pub use capture::{read_buffer_len, CaptureBackend, CaptureStream};
pub use pipeline::{
    take_path, RecordedTake, RecordingEvent, RecordingPipeline, RecordingSettings, RecordingState,
};
