//! Capture device abstraction
//!
//! The platform microphone API sits behind these two traits so the pipeline
//! can run against a real device, a file, or a test double.

use std::io;

use crate::error::Result;

/// Factory for capture streams plus the permission query
pub trait CaptureBackend: Send + Sync {
    /// Whether the user has granted microphone access
    fn has_permission(&self) -> bool;

    /// Smallest read buffer, in bytes, the device accepts
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> usize;

    /// Open a 16-bit PCM stream
    ///
    /// # Errors
    /// * `DeviceInit` - if the device cannot be opened with this format
    fn open(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn CaptureStream>>;
}

/// An open capture stream delivering little-endian 16-bit PCM
pub trait CaptureStream: Send {
    /// Blocking read into `buf`. Returns the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Non-blocking read of whatever is still buffered in the device
    fn drain(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Stop and release the device
    fn stop(&mut self);
}

/// Read buffer size for a device: its minimum, but at least one stereo frame
pub fn read_buffer_len(backend: &dyn CaptureBackend, sample_rate: u32, channels: u16) -> usize {
    let frame = 2 * channels.max(1) as usize;
    let min = backend.min_buffer_size(sample_rate, channels).max(frame);
    // Keep reads frame-aligned
    min.div_ceil(frame) * frame
}
