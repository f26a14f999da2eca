//! Loopdeck - Layer Sequencing and Mix Coordination
//!
//! Loopdeck is the core of a loop-based music workstation. Users stack
//! layers (imported stems or microphone takes), place them on a bar grid,
//! play the arrangement through an external audio engine and publish the
//! rendered mix.
//!
//! # Architecture
//!
//! - `layers`: layer model, bar-grid patterns and the lifecycle manager
//! - `engine`: audio service boundary, render coordination, playback state
//! - `recording`: countdown and microphone capture
//! - `remote`: track server DTOs, import and the HTTP client
//! - `upload`: metadata, multipart form and the render-then-submit pipeline
//! - `workstation`: the session that owns state and applies queued events

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod layers;
pub mod recording;
pub mod remote;
pub mod upload;
pub mod workstation;

pub use config::WorkstationConfig;
pub use error::{ErrorCategory, LoopdeckError, Result};
pub use workstation::{Notification, NotificationKind, Workstation, WorkstationEvent};
