//! Microphone recording pipeline
//!
//! `Idle -> CountdownPending -> Recording -> Idle`. The countdown, device
//! setup, capture loop and WAV finalization all run on one worker thread;
//! progress is published as [`RecordingEvent`]s on the caller's channel.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use log::{debug, info, warn};

use super::capture::{read_buffer_len, CaptureBackend};
use crate::config::WorkstationConfig;
use crate::engine::io::write_pcm16_wav;
use crate::error::{LoopdeckError, Result};

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    CountdownPending,
    Recording,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::CountdownPending => write!(f, "CountdownPending"),
            RecordingState::Recording => write!(f, "Recording"),
        }
    }
}

/// A finished take on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTake {
    pub path: PathBuf,
    /// PCM payload size in bytes (header excluded)
    pub bytes: usize,
    pub frames: u64,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Progress of one recording attempt
#[derive(Debug)]
pub enum RecordingEvent {
    /// Countdown value about to be shown (3, 2, 1)
    CountdownTick(u8),
    /// The device is open and capturing
    Started,
    Finished(RecordedTake),
    /// Stopped during the countdown; no device was opened
    Cancelled,
    Failed(LoopdeckError),
}

/// Capture format and countdown timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub countdown_ticks: u8,
    pub countdown_tick: Duration,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self::from_config(&WorkstationConfig::default())
    }
}

impl RecordingSettings {
    pub fn from_config(config: &WorkstationConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.capture_channels,
            countdown_ticks: config.countdown_ticks,
            countdown_tick: config.countdown_tick(),
        }
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<RecordingState>,
    last_take: Mutex<Option<RecordedTake>>,
    recording: AtomicBool,
    stop_requested: AtomicBool,
    countdown: AtomicU8,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn last_take(&self) -> MutexGuard<'_, Option<RecordedTake>> {
        self.last_take.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: RecordingState) {
        *self.state() = state;
    }

    fn reset(&self) {
        self.recording.store(false, Ordering::SeqCst);
        self.countdown.store(0, Ordering::SeqCst);
        self.set_state(RecordingState::Idle);
    }
}

/// Countdown-then-capture recorder
pub struct RecordingPipeline {
    backend: Arc<dyn CaptureBackend>,
    settings: RecordingSettings,
    shared: Arc<Shared>,
}

impl RecordingPipeline {
    pub fn new(backend: Arc<dyn CaptureBackend>, settings: RecordingSettings) -> Self {
        Self {
            backend,
            settings,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    pub fn state(&self) -> RecordingState {
        *self.shared.state()
    }

    /// True while the capture loop is running
    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::SeqCst)
    }

    /// Countdown value currently shown, 0 outside the countdown
    pub fn countdown(&self) -> u8 {
        self.shared.countdown.load(Ordering::SeqCst)
    }

    /// Start the countdown and, once it ends, capture into `output`
    ///
    /// Returns the worker handle; the outcome arrives on `events`.
    ///
    /// # Errors
    /// * `RecordingBusy` - if a countdown or capture is already running
    /// * `Io` - if the worker thread cannot be spawned
    pub fn start_countdown_and_record<E>(
        &self,
        output: impl Into<PathBuf>,
        events: Sender<E>,
    ) -> Result<JoinHandle<()>>
    where
        E: From<RecordingEvent> + Send + 'static,
    {
        {
            let mut state = self.shared.state();
            if *state != RecordingState::Idle {
                return Err(LoopdeckError::RecordingBusy);
            }
            *state = RecordingState::CountdownPending;
        }
        self.shared.stop_requested.store(false, Ordering::SeqCst);

        let worker = CaptureWorker {
            backend: Arc::clone(&self.backend),
            settings: self.settings,
            shared: Arc::clone(&self.shared),
            output: output.into(),
            events,
        };

        thread::Builder::new()
            .name("loopdeck-capture".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.shared.reset();
                LoopdeckError::Io(e)
            })
    }

    /// Request the take to end; returns immediately
    ///
    /// During the countdown this cancels the take.
    pub fn stop_recording(&self) {
        debug!("[RECORD] Stop requested in state {}", self.state());
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.recording.store(false, Ordering::SeqCst);
    }

    /// The most recent finished take, if any
    pub fn last_take(&self) -> Option<RecordedTake> {
        self.shared.last_take().clone()
    }

    /// Hand over the finished take, leaving none behind
    pub fn take_recording(&self) -> Option<RecordedTake> {
        self.shared.last_take().take()
    }

    /// Drop the finished take and delete its file
    pub fn discard_recording(&self) -> Result<bool> {
        match self.take_recording() {
            Some(take) => {
                if take.path.exists() {
                    fs::remove_file(&take.path)?;
                }
                info!("[RECORD] Discarded {}", take.path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct CaptureWorker<E> {
    backend: Arc<dyn CaptureBackend>,
    settings: RecordingSettings,
    shared: Arc<Shared>,
    output: PathBuf,
    events: Sender<E>,
}

impl<E> CaptureWorker<E>
where
    E: From<RecordingEvent> + Send + 'static,
{
    fn run(self) {
        match self.record() {
            Ok(Some(take)) => {
                *self.shared.last_take() = Some(take.clone());
                self.shared.reset();
                info!(
                    "[RECORD] Finished {} ({} ms)",
                    take.path.display(),
                    take.duration_ms
                );
                self.publish(RecordingEvent::Finished(take));
            }
            Ok(None) => {
                self.shared.reset();
                info!("[RECORD] Cancelled during countdown");
                self.publish(RecordingEvent::Cancelled);
            }
            Err(e) => {
                self.shared.reset();
                warn!("[RECORD] Failed: {}", e);
                self.publish(RecordingEvent::Failed(e));
            }
        }
    }

    fn publish(&self, event: RecordingEvent) {
        if self.events.send(E::from(event)).is_err() {
            debug!("Recording event dropped: session closed");
        }
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on stop. Returns false if stopped.
    fn wait_tick(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }

    fn record(&self) -> Result<Option<RecordedTake>> {
        for tick in (1..=self.settings.countdown_ticks).rev() {
            if self.stop_requested() {
                return Ok(None);
            }
            self.shared.countdown.store(tick, Ordering::SeqCst);
            self.publish(RecordingEvent::CountdownTick(tick));
            if !self.wait_tick(self.settings.countdown_tick) {
                return Ok(None);
            }
        }
        self.shared.countdown.store(0, Ordering::SeqCst);
        if self.stop_requested() {
            return Ok(None);
        }

        if !self.backend.has_permission() {
            return Err(LoopdeckError::PermissionDenied);
        }

        let RecordingSettings {
            sample_rate,
            channels,
            ..
        } = self.settings;
        let mut stream = self.backend.open(sample_rate, channels)?;
        let mut buf = vec![0u8; read_buffer_len(self.backend.as_ref(), sample_rate, channels)];
        let mut pcm: Vec<u8> = Vec::new();

        self.shared.set_state(RecordingState::Recording);
        self.shared.recording.store(true, Ordering::SeqCst);
        self.publish(RecordingEvent::Started);
        info!("[RECORD] Capturing {} Hz, {} ch", sample_rate, channels);

        while !self.stop_requested() {
            match stream.read(&mut buf) {
                // A zero-length read means the device has nothing more to give
                Ok(0) => break,
                Ok(n) => pcm.extend_from_slice(&buf[..n]),
                Err(e) => {
                    stream.stop();
                    return Err(LoopdeckError::DeviceRead(e));
                }
            }
        }
        self.shared.recording.store(false, Ordering::SeqCst);

        // One final drain picks up whatever the device still holds
        match stream.drain(&mut buf) {
            Ok(n) => pcm.extend_from_slice(&buf[..n]),
            Err(e) => warn!("[RECORD] Final drain failed: {}", e),
        }
        stream.stop();

        let frames = write_pcm16_wav(&self.output, &pcm, sample_rate, channels)?;
        Ok(Some(RecordedTake {
            path: self.output.clone(),
            bytes: pcm.len(),
            frames,
            duration_ms: frames_to_ms(frames, sample_rate),
            finished_at: Utc::now(),
        }))
    }
}

fn frames_to_ms(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames * 1000 / sample_rate as u64
}

/// Path for a new take inside `dir`
pub fn take_path(dir: &Path) -> PathBuf {
    dir.join(format!("record_{}.wav", uuid::Uuid::new_v4()))
}
