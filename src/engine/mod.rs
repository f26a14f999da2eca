//! Audio Engine Module
//!
//! Everything between the layer model and the audio service:
//! - Audio service boundary and event forwarding
//! - Render coordination and frame math
//! - Playback state machine
//! - WAV file I/O
//! - Headless reference engine

pub mod headless;
pub mod io;
pub mod render;
pub mod service;
pub mod transport;

pub use headless::HeadlessEngine;
pub use io::{
    generate_test_tone, read_samples_i16, wav_duration_ms, wav_duration_secs, write_pcm16_wav,
    write_samples_i16, WavAudio,
};
pub use render::{
    check_playable, layer_audio_info, max_used_bars, seconds_per_bar, total_frames,
    RenderCoordinator, RenderPlan, RenderedMix,
};
pub use service::{
    AudioRenderService, EngineEvent, EventSink, FramePlacement, LayerAudioInfo, PlaybackListener,
};
pub use transport::{PlaybackState, PlaybackStateMachine};
