//! Render coordination
//!
//! Turns a project snapshot into the parameters the audio service needs
//! (frame placements, total frame count) and sequences the service calls for
//! play, stop and mixdown. Preconditions are checked before the service is
//! touched, so a refused request never has side effects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use super::service::{AudioRenderService, FramePlacement, LayerAudioInfo};
use super::transport::PlaybackStateMachine;
use crate::config::WorkstationConfig;
use crate::error::{LoopdeckError, Result};
use crate::layers::{Layer, ProjectSnapshot, BEATS_PER_BAR};

/// Length of one bar in seconds
pub fn seconds_per_bar(bpm: f32) -> f64 {
    60.0 / bpm as f64 * BEATS_PER_BAR
}

/// Frame count of `bars` bars at `bpm`, rounded to the nearest frame
///
/// # Example
/// ```
/// use loopdeck::engine::total_frames;
/// assert_eq!(total_frames(8, 120.0, 44100), 705_600);
/// ```
pub fn total_frames(bars: u32, bpm: f32, sample_rate: u32) -> u64 {
    let total_seconds = bars as f64 * seconds_per_bar(bpm);
    (total_seconds * sample_rate as f64).round() as u64
}

/// Furthest bar reached by any block (0 when nothing is placed)
pub fn max_used_bars(layers: &[Layer]) -> u32 {
    layers
        .iter()
        .flat_map(|l| l.pattern_blocks())
        .map(|b| b.end())
        .max()
        .unwrap_or(0)
}

/// Engine parameters for one layer
pub fn layer_audio_info(layer: &Layer, project_bpm: f32, sample_rate: u32) -> LayerAudioInfo {
    LayerAudioInfo {
        layer_id: layer.id(),
        file_path: layer.wav_path.clone(),
        bpm: layer.effective_bpm(project_bpm),
        playback_rate: layer.playback_rate(project_bpm),
        volume: layer.volume,
        placements: layer
            .pattern_blocks()
            .iter()
            .map(|b| FramePlacement {
                start_frame: total_frames(b.start(), project_bpm, sample_rate),
                length_frames: total_frames(b.length(), project_bpm, sample_rate),
            })
            .collect(),
    }
}

/// Play/render preconditions: at least one layer, every layer placed
pub fn check_playable(snapshot: &ProjectSnapshot) -> Result<()> {
    if snapshot.layers.is_empty() {
        return Err(LoopdeckError::EmptyProject);
    }
    if let Some(layer) = snapshot.layers.iter().find(|l| !l.has_pattern()) {
        return Err(LoopdeckError::LayerWithoutPattern { layer_id: layer.id() });
    }
    Ok(())
}

/// Everything computed for one render or playback request
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub infos: Vec<LayerAudioInfo>,
    pub max_used_bars: u32,
    pub total_frames: u64,
}

/// A mix written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMix {
    pub path: PathBuf,
    pub max_used_bars: u32,
    pub total_frames: u64,
}

/// Sequencer of audio service calls
pub struct RenderCoordinator {
    service: Arc<dyn AudioRenderService>,
    sample_rate: u32,
    preview_path: PathBuf,
}

impl RenderCoordinator {
    pub fn new(
        service: Arc<dyn AudioRenderService>,
        sample_rate: u32,
        preview_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            service,
            sample_rate,
            preview_path: preview_path.into(),
        }
    }

    pub fn from_config(service: Arc<dyn AudioRenderService>, config: &WorkstationConfig) -> Self {
        Self::new(service, config.sample_rate, config.preview_path())
    }

    pub fn service(&self) -> &Arc<dyn AudioRenderService> {
        &self.service
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn preview_path(&self) -> &Path {
        &self.preview_path
    }

    /// Compute engine parameters for `snapshot`
    ///
    /// # Errors
    /// * `EmptyProject` - if there are no layers
    /// * `LayerWithoutPattern` - if any layer has no blocks
    pub fn render_plan(&self, snapshot: &ProjectSnapshot) -> Result<RenderPlan> {
        check_playable(snapshot)?;
        let bars = max_used_bars(&snapshot.layers);
        Ok(RenderPlan {
            infos: snapshot
                .layers
                .iter()
                .map(|l| layer_audio_info(l, snapshot.bpm, self.sample_rate))
                .collect(),
            max_used_bars: bars,
            total_frames: total_frames(bars, snapshot.bpm, self.sample_rate),
        })
    }

    /// Start playing `snapshot`, restarting if already playing
    ///
    /// The preview mix is rendered and a waveform requested before playback
    /// starts. A failed preview render only skips the waveform.
    pub fn start_playback(
        &self,
        snapshot: &ProjectSnapshot,
        transport: &mut PlaybackStateMachine,
    ) -> Result<RenderPlan> {
        let plan = self.render_plan(snapshot)?;

        if transport.is_playing() {
            self.service.stop_playback();
            transport.stop();
        }

        self.service.set_layers(&plan.infos, plan.max_used_bars);
        if self
            .service
            .render_mix_to_file(&self.preview_path, plan.total_frames)
        {
            self.service.generate_waveform(&self.preview_path);
        } else {
            warn!("Preview render to {} failed", self.preview_path.display());
        }
        self.service.start_playback();
        transport.start();

        info!(
            "Playing {} layers, {} bars ({} frames)",
            plan.infos.len(),
            plan.max_used_bars,
            plan.total_frames
        );
        Ok(plan)
    }

    /// Stop playback; takes effect immediately
    pub fn stop_playback(&self, transport: &mut PlaybackStateMachine) {
        self.service.stop_playback();
        transport.stop();
    }

    /// Play when stopped, stop when playing. Returns whether it is now playing.
    pub fn toggle_playback(
        &self,
        snapshot: &ProjectSnapshot,
        transport: &mut PlaybackStateMachine,
    ) -> Result<bool> {
        if transport.is_playing() {
            self.stop_playback(transport);
            return Ok(false);
        }
        self.start_playback(snapshot, transport)?;
        Ok(true)
    }

    /// Render `snapshot` to `path`
    ///
    /// # Errors
    /// * `EmptyProject` / `LayerWithoutPattern` - before any service call
    /// * `RenderFailed` - if the service reports failure
    pub fn render_mix(&self, snapshot: &ProjectSnapshot, path: &Path) -> Result<RenderedMix> {
        let plan = self.render_plan(snapshot)?;
        self.service.set_layers(&plan.infos, plan.max_used_bars);

        debug!("Rendering {} frames to {}", plan.total_frames, path.display());
        if !self.service.render_mix_to_file(path, plan.total_frames) {
            return Err(LoopdeckError::RenderFailed {
                path: path.to_path_buf(),
            });
        }
        Ok(RenderedMix {
            path: path.to_path_buf(),
            max_used_bars: plan.max_used_bars,
            total_frames: plan.total_frames,
        })
    }
}
