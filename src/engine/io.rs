//! WAV file I/O for Loopdeck
//!
//! Captured audio, imported stems and rendered mixes are all 16-bit PCM WAV.
//! Writing goes through `hound`, which emits the canonical 44-byte header for
//! integer PCM, and a failed write never leaves a partial file behind.

use std::fs;
use std::io;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};

use crate::error::{LoopdeckError, Result};

/// Bit depth of every file this crate writes
pub const PCM_BITS: u16 = 16;

/// Size of the RIFF/WAVE header written for 16-bit PCM
pub const WAV_HEADER_LEN: u64 = 44;

/// Decoded 16-bit audio
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples
    pub samples: Vec<i16>,
}

impl WavAudio {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Sample at `frame` for output channel `channel`; mono sources feed every channel
    pub fn sample(&self, frame: usize, channel: usize) -> i16 {
        let channels = self.channels as usize;
        let ch = if channels == 1 { 0 } else { channel.min(channels - 1) };
        self.samples[frame * channels + ch]
    }
}

fn pcm_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: PCM_BITS,
        sample_format: SampleFormat::Int,
    }
}

fn write_error(e: hound::Error) -> LoopdeckError {
    match e {
        hound::Error::IoError(err) => LoopdeckError::Io(err),
        other => LoopdeckError::Io(io::Error::new(io::ErrorKind::Other, other.to_string())),
    }
}

fn read_error(path: &Path, e: hound::Error) -> LoopdeckError {
    match e {
        hound::Error::IoError(err) if err.kind() == io::ErrorKind::NotFound => {
            LoopdeckError::Io(err)
        }
        other => LoopdeckError::InvalidAudio {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Write interleaved 16-bit samples to `path`
///
/// # Errors
/// * `Io` - if the file cannot be created or written; any partial file is removed
pub fn write_samples_i16(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let result = (|| {
        let mut writer = WavWriter::create(path, pcm_spec(sample_rate, channels)).map_err(write_error)?;
        for &sample in samples {
            writer.write_sample(sample).map_err(write_error)?;
        }
        writer.finalize().map_err(write_error)
    })();

    if let Err(e) = result {
        if path.exists() {
            if let Err(rm) = fs::remove_file(path) {
                warn!("Could not remove partial file {}: {}", path.display(), rm);
            }
        }
        return Err(e);
    }
    Ok(())
}

/// Wrap raw little-endian 16-bit PCM bytes in a WAV container
///
/// Bytes past the last whole frame are dropped. Returns the number of frames
/// written.
///
/// # Arguments
/// * `path` - Destination file
/// * `pcm` - Interleaved little-endian samples as captured from the device
/// * `sample_rate` - Device sample rate
/// * `channels` - Device channel count
pub fn write_pcm16_wav(path: &Path, pcm: &[u8], sample_rate: u32, channels: u16) -> Result<u64> {
    let frame_bytes = 2 * channels.max(1) as usize;
    let whole = pcm.len() - pcm.len() % frame_bytes;
    if whole < pcm.len() {
        debug!("Dropping {} bytes of a partial frame", pcm.len() - whole);
    }
    let samples: Vec<i16> = pcm[..whole]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    write_samples_i16(path, &samples, sample_rate, channels)?;
    Ok((samples.len() / channels.max(1) as usize) as u64)
}

/// Read a 16-bit PCM WAV file
///
/// # Errors
/// * `Io` - if the file does not exist
/// * `InvalidAudio` - if the file is not 16-bit integer PCM WAV
pub fn read_samples_i16(path: &Path) -> Result<WavAudio> {
    let reader = WavReader::open(path).map_err(|e| read_error(path, e))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != PCM_BITS {
        return Err(LoopdeckError::InvalidAudio {
            path: path.to_path_buf(),
            reason: format!(
                "{}-bit {:?} audio (only 16-bit PCM supported)",
                spec.bits_per_sample, spec.sample_format
            ),
        });
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| read_error(path, e))?;

    Ok(WavAudio {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

/// Duration of a WAV file in milliseconds, read from its header
pub fn wav_duration_ms(path: &Path) -> Result<u64> {
    let reader = WavReader::open(path).map_err(|e| read_error(path, e))?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Err(LoopdeckError::InvalidAudio {
            path: path.to_path_buf(),
            reason: "sample rate is zero".to_string(),
        });
    }
    Ok(reader.duration() as u64 * 1000 / rate as u64)
}

/// Duration of a WAV file in whole seconds (truncated)
pub fn wav_duration_secs(path: &Path) -> Result<u64> {
    Ok(wav_duration_ms(path)? / 1000)
}

/// Generate a sine test tone as interleaved 16-bit samples
///
/// Every channel carries the same signal at half scale.
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32, channels: u16) -> Vec<i16> {
    let frames = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let value = ((angular_freq * i as f32).sin() * 16383.0) as i16;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    samples
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pcm_header_is_44_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.wav");

        // 100 stereo frames of 16-bit PCM
        let pcm = vec![0u8; 100 * 2 * 2];
        let frames = write_pcm16_wav(&path, &pcm, 44100, 2).unwrap();
        assert_eq!(frames, 100);

        let len = fs::metadata(&path).unwrap().len();
        assert_eq!(len, WAV_HEADER_LEN + pcm.len() as u64);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[36..40], b"data");
    }

    #[test]
    fn test_pcm_bytes_are_little_endian() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("le.wav");

        let pcm = [0x01, 0x00, 0xFF, 0x7F, 0x00, 0x80, 0x07];
        write_pcm16_wav(&path, &pcm, 8000, 1).unwrap();

        let audio = read_samples_i16(&path).unwrap();
        assert_eq!(audio.samples, vec![1, i16::MAX, i16::MIN]);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.sample_rate, 8000);
    }

    #[test]
    fn test_partial_frame_is_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.wav");

        // One stereo frame plus half of the next
        let frames = write_pcm16_wav(&path, &[1, 0, 2, 0, 3, 0], 44100, 2).unwrap();
        assert_eq!(frames, 1);

        let audio = read_samples_i16(&path).unwrap();
        assert_eq!(audio.samples, vec![1, 2]);
        assert_eq!(fs::metadata(&path).unwrap().len(), WAV_HEADER_LEN + 4);
    }

    #[test]
    fn test_duration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples = generate_test_tone(440.0, 2.5, 44100, 2);
        write_samples_i16(&path, &samples, 44100, 2).unwrap();

        assert_eq!(wav_duration_ms(&path).unwrap(), 2500);
        assert_eq!(wav_duration_secs(&path).unwrap(), 2);
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("take.wav");

        let result = write_pcm16_wav(&path, &[0, 0, 0, 0], 44100, 2);
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_nonexistent_file() {
        let result = read_samples_i16(Path::new("/nonexistent/path/audio.wav"));
        assert!(matches!(result, Err(LoopdeckError::Io(_))));
    }

    #[test]
    fn test_read_rejects_float_audio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            read_samples_i16(&path),
            Err(LoopdeckError::InvalidAudio { .. })
        ));
    }

    #[test]
    fn test_mono_sample_feeds_both_channels() {
        let audio = WavAudio {
            sample_rate: 44100,
            channels: 1,
            samples: vec![10, 20],
        };
        assert_eq!(audio.frames(), 2);
        assert_eq!(audio.sample(1, 0), 20);
        assert_eq!(audio.sample(1, 1), 20);
    }
}
