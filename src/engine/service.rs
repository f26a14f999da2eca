//! Audio service boundary
//!
//! The native renderer/player is an opaque collaborator. This core only hands
//! it copies of the data it needs ([`LayerAudioInfo`]) and receives progress,
//! waveform and completion signals back through a [`PlaybackListener`].
//!
//! Listener callbacks arrive on the engine's own threads. [`EventSink`] is the
//! listener the workstation registers: it never touches project state, it
//! only forwards each callback as an [`EngineEvent`] onto a channel drained by
//! the coordination thread.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Sender;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::layers::LayerId;

/// One placement of a layer expressed in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePlacement {
    pub start_frame: u64,
    pub length_frames: u64,
}

/// Everything the engine needs to render or play one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerAudioInfo {
    pub layer_id: LayerId,
    pub file_path: PathBuf,
    /// The layer's own tempo; the engine handles any resampling
    pub bpm: f32,
    /// Project BPM divided by the layer's BPM
    pub playback_rate: f32,
    pub volume: f32,
    pub placements: Vec<FramePlacement>,
}

/// Push-style signals from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PlaybackFinished,
    /// Playback position as a fraction of the mix
    Progress(f32),
    /// Amplitude points for visualization
    Waveform(Vec<f32>),
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::PlaybackFinished => write!(f, "PlaybackFinished"),
            EngineEvent::Progress(p) => write!(f, "Progress({:.3})", p),
            EngineEvent::Waveform(points) => write!(f, "Waveform({} points)", points.len()),
        }
    }
}

/// Callbacks the engine invokes, from any thread
pub trait PlaybackListener: Send + Sync {
    fn on_playback_finished(&self);
    fn on_progress_update(&self, fraction: f32);
    fn on_waveform_update(&self, points: Vec<f32>);
}

/// Opaque rendering/playback service
///
/// Calls are one-shot commands; results of playback arrive through the
/// registered listener.
pub trait AudioRenderService: Send + Sync {
    /// Register the listener that receives playback signals
    fn set_listener(&self, listener: Arc<dyn PlaybackListener>);

    /// Replace the engine's layer set
    fn set_layers(&self, layers: &[LayerAudioInfo], max_used_bars: u32);

    fn start_playback(&self);

    fn stop_playback(&self);

    /// Render the current layer set to `path`, exactly `total_frames` long
    fn render_mix_to_file(&self, path: &Path, total_frames: u64) -> bool;

    /// Compute waveform points for `path`, delivered through the listener
    fn generate_waveform(&self, path: &Path);
}

/// Listener that forwards every callback onto a channel
///
/// The receiving side decides when the event is applied; the delivering
/// thread never blocks and never mutates shared state.
pub struct EventSink<E> {
    tx: Sender<E>,
}

impl<E> EventSink<E> {
    pub fn new(tx: Sender<E>) -> Self {
        Self { tx }
    }
}

impl<E> EventSink<E>
where
    E: From<EngineEvent> + Send,
{
    fn forward(&self, event: EngineEvent) {
        // A closed queue means the session is gone; late signals are dropped
        if self.tx.send(E::from(event)).is_err() {
            debug!("Engine event dropped: session closed");
        }
    }
}

impl<E> PlaybackListener for EventSink<E>
where
    E: From<EngineEvent> + Send,
{
    fn on_playback_finished(&self) {
        self.forward(EngineEvent::PlaybackFinished);
    }

    fn on_progress_update(&self, fraction: f32) {
        self.forward(EngineEvent::Progress(fraction));
    }

    fn on_waveform_update(&self, points: Vec<f32>) {
        self.forward(EngineEvent::Waveform(points));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;

    #[test]
    fn test_event_sink_forwards_from_other_thread() {
        let (tx, rx) = unbounded::<EngineEvent>();
        let sink: Arc<dyn PlaybackListener> = Arc::new(EventSink::new(tx));

        let remote = Arc::clone(&sink);
        thread::spawn(move || {
            remote.on_progress_update(0.25);
            remote.on_waveform_update(vec![0.1, 0.2]);
            remote.on_playback_finished();
        })
        .join()
        .unwrap();

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                EngineEvent::Progress(0.25),
                EngineEvent::Waveform(vec![0.1, 0.2]),
                EngineEvent::PlaybackFinished,
            ]
        );
    }

    #[test]
    fn test_event_sink_tolerates_closed_queue() {
        let (tx, rx) = unbounded::<EngineEvent>();
        drop(rx);
        let sink = EventSink::new(tx);
        sink.on_playback_finished();
    }

    #[test]
    fn test_event_display() {
        assert_eq!(EngineEvent::Progress(0.5).to_string(), "Progress(0.500)");
        assert_eq!(
            EngineEvent::Waveform(vec![0.0; 3]).to_string(),
            "Waveform(3 points)"
        );
    }
}
