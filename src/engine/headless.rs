//! Headless reference audio service
//!
//! A pure-Rust [`AudioRenderService`] for the CLI and for tests. It mixes the
//! current layer set offline from 16-bit WAV sources: each placement loops
//! its layer's audio from the start of the file for the placement's length,
//! placements are summed with the layer volume applied and the result is
//! clamped to 16 bits. There is no resampling; `playback_rate` is ignored.
//!
//! Playback is simulated. `start_playback` immediately reports full progress
//! and completion through the listener, unless auto-finish is disabled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use super::io::{read_samples_i16, write_samples_i16, WavAudio};
use super::service::{AudioRenderService, LayerAudioInfo, PlaybackListener};
use crate::error::Result;

/// Default number of waveform points reported per file
pub const DEFAULT_WAVEFORM_POINTS: usize = 100;

#[derive(Default)]
struct HeadlessState {
    layers: Vec<LayerAudioInfo>,
    max_used_bars: u32,
    listener: Option<Arc<dyn PlaybackListener>>,
    playing: bool,
}

/// Offline mixer with simulated playback
pub struct HeadlessEngine {
    sample_rate: u32,
    channels: u16,
    waveform_points: usize,
    auto_finish: bool,
    state: Mutex<HeadlessState>,
}

impl HeadlessEngine {
    /// Create an engine producing stereo output at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 2,
            waveform_points: DEFAULT_WAVEFORM_POINTS,
            auto_finish: true,
            state: Mutex::new(HeadlessState::default()),
        }
    }

    pub fn with_waveform_points(mut self, points: usize) -> Self {
        self.waveform_points = points.max(1);
        self
    }

    /// Keep "playing" after `start_playback` until stopped
    pub fn without_auto_finish(mut self) -> Self {
        self.auto_finish = false;
        self
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// Copy of the layer set last passed to `set_layers`
    pub fn layers(&self) -> Vec<LayerAudioInfo> {
        self.lock().layers.clone()
    }

    pub fn max_used_bars(&self) -> u32 {
        self.lock().max_used_bars
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        // A panic while holding the lock leaves plain data behind; keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listener(&self) -> Option<Arc<dyn PlaybackListener>> {
        self.lock().listener.clone()
    }

    /// Mix the current layer set into `total_frames` interleaved frames
    pub fn mix(&self, total_frames: u64) -> Result<Vec<i16>> {
        let layers = self.layers();
        let channels = self.channels as usize;
        let total = total_frames as usize;
        let mut acc = vec![0f32; total * channels];

        let mut sources: HashMap<PathBuf, WavAudio> = HashMap::new();
        for info in &layers {
            if !sources.contains_key(&info.file_path) {
                let audio = read_samples_i16(&info.file_path)?;
                if audio.sample_rate != self.sample_rate {
                    warn!(
                        "Layer {} is {} Hz, engine runs at {} Hz (no resampling)",
                        info.layer_id, audio.sample_rate, self.sample_rate
                    );
                }
                sources.insert(info.file_path.clone(), audio);
            }
            let Some(audio) = sources.get(&info.file_path) else {
                continue;
            };
            let source_frames = audio.frames();
            if source_frames == 0 {
                debug!("Layer {} has empty audio, skipped", info.layer_id);
                continue;
            }

            for placement in &info.placements {
                let start = placement.start_frame as usize;
                let end = (start + placement.length_frames as usize).min(total);
                for frame in start..end {
                    let src = (frame - start) % source_frames;
                    for ch in 0..channels {
                        acc[frame * channels + ch] += audio.sample(src, ch) as f32 * info.volume;
                    }
                }
            }
        }

        Ok(acc
            .into_iter()
            .map(|s| s.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect())
    }

    /// Peak amplitude per bucket, normalized to [0, 1]
    pub fn waveform_points(&self, path: &Path) -> Result<Vec<f32>> {
        let audio = read_samples_i16(path)?;
        let frames = audio.frames();
        if frames == 0 {
            return Ok(vec![0.0; self.waveform_points]);
        }

        let channels = audio.channels as usize;
        let points = self.waveform_points;
        Ok((0..points)
            .map(|i| {
                let from = i * frames / points;
                let to = ((i + 1) * frames / points).max(from + 1).min(frames);
                let peak = audio.samples[from * channels..to * channels]
                    .iter()
                    .map(|&s| (s as i32).unsigned_abs())
                    .max()
                    .unwrap_or(0);
                peak as f32 / 32768.0
            })
            .collect())
    }
}

impl AudioRenderService for HeadlessEngine {
    fn set_listener(&self, listener: Arc<dyn PlaybackListener>) {
        self.lock().listener = Some(listener);
    }

    fn set_layers(&self, layers: &[LayerAudioInfo], max_used_bars: u32) {
        let mut state = self.lock();
        state.layers = layers.to_vec();
        state.max_used_bars = max_used_bars;
        debug!("Engine layers set: {} layers, {} bars", layers.len(), max_used_bars);
    }

    fn start_playback(&self) {
        self.lock().playing = true;
        debug!("Engine playback started");

        if self.auto_finish {
            self.lock().playing = false;
            if let Some(listener) = self.listener() {
                listener.on_progress_update(1.0);
                listener.on_playback_finished();
            }
        }
    }

    fn stop_playback(&self) {
        self.lock().playing = false;
        debug!("Engine playback stopped");
    }

    fn render_mix_to_file(&self, path: &Path, total_frames: u64) -> bool {
        let result = self
            .mix(total_frames)
            .and_then(|samples| write_samples_i16(path, &samples, self.sample_rate, self.channels));
        match result {
            Ok(()) => {
                info!("Rendered {} frames to {}", total_frames, path.display());
                true
            }
            Err(e) => {
                warn!("Render to {} failed: {}", path.display(), e);
                false
            }
        }
    }

    fn generate_waveform(&self, path: &Path) {
        match self.waveform_points(path) {
            Ok(points) => {
                if let Some(listener) = self.listener() {
                    listener.on_waveform_update(points);
                }
            }
            Err(e) => warn!("Waveform for {} failed: {}", path.display(), e),
        }
    }
}
