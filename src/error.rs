//! Error handling for Loopdeck
//!
//! Every error belongs to one of four user-facing categories (validation,
//! device, render, network). All of them are recoverable at the interaction
//! level: the user can retry the same action and project state is never left
//! half-applied.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Loopdeck operations
pub type Result<T> = std::result::Result<T, LoopdeckError>;

/// Coarse failure category, used to pick how a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input detected before any external call
    Validation,
    /// Microphone / capture device problems
    Device,
    /// The audio service could not produce a mix
    Render,
    /// Import, download or upload failed
    Network,
    /// File system, serialization or configuration plumbing
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "ValidationFailure"),
            ErrorCategory::Device => write!(f, "DeviceFailure"),
            ErrorCategory::Render => write!(f, "RenderFailure"),
            ErrorCategory::Network => write!(f, "NetworkFailure"),
            ErrorCategory::Internal => write!(f, "InternalFailure"),
        }
    }
}

/// Main error type for Loopdeck operations
#[derive(Error, Debug)]
pub enum LoopdeckError {
    // Validation Errors
    #[error("The project has no layers")]
    EmptyProject,

    #[error("Layer {layer_id} has no pattern blocks")]
    LayerWithoutPattern { layer_id: u32 },

    #[error("Layer not found: {layer_id}")]
    LayerNotFound { layer_id: u32 },

    #[error("Missing upload field: {field}")]
    MissingUploadField { field: &'static str },

    #[error("Bar {bar} is outside the {timeline_bars}-bar timeline")]
    InvalidBar { bar: u32, timeline_bars: u32 },

    #[error("Auto-repeat interval must be at least one bar")]
    InvalidInterval,

    #[error("Invalid BPM: {bpm}")]
    InvalidBpm { bpm: f32 },

    #[error("Invalid pattern block: {reason}")]
    InvalidBlock { reason: String },

    #[error("There is no finished recording to add")]
    NoRecordedTake,

    // Device Errors
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Capture device initialization failed: {reason}")]
    DeviceInit { reason: String },

    #[error("Capture device read failed: {0}")]
    DeviceRead(#[source] std::io::Error),

    #[error("A recording is already in progress")]
    RecordingBusy,

    // Render Errors
    #[error("Mix rendering failed: {path}")]
    RenderFailed { path: PathBuf },

    // Network Errors
    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("Import failed: {reason}")]
    ImportFailed { reason: String },

    #[error("Upload rejected by server (code {code})")]
    UploadRejected { code: String },

    // Plumbing
    #[error("Invalid audio file {path}: {reason}")]
    InvalidAudio { path: PathBuf, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("No layer identities left in this session")]
    LayerIdsExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoopdeckError {
    /// Get the failure category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoopdeckError::EmptyProject
            | LoopdeckError::LayerWithoutPattern { .. }
            | LoopdeckError::LayerNotFound { .. }
            | LoopdeckError::MissingUploadField { .. }
            | LoopdeckError::InvalidBar { .. }
            | LoopdeckError::InvalidInterval
            | LoopdeckError::InvalidBpm { .. }
            | LoopdeckError::InvalidBlock { .. }
            | LoopdeckError::NoRecordedTake => ErrorCategory::Validation,
            LoopdeckError::PermissionDenied
            | LoopdeckError::DeviceInit { .. }
            | LoopdeckError::DeviceRead(_)
            | LoopdeckError::RecordingBusy => ErrorCategory::Device,
            LoopdeckError::RenderFailed { .. } => ErrorCategory::Render,
            LoopdeckError::Network { .. }
            | LoopdeckError::ImportFailed { .. }
            | LoopdeckError::UploadRejected { .. } => ErrorCategory::Network,
            LoopdeckError::InvalidAudio { .. }
            | LoopdeckError::Config { .. }
            | LoopdeckError::LayerIdsExhausted
            | LoopdeckError::Io(_)
            | LoopdeckError::Serialization(_) => ErrorCategory::Internal,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LoopdeckError::EmptyProject => "EMPTY_PROJECT",
            LoopdeckError::LayerWithoutPattern { .. } => "LAYER_WITHOUT_PATTERN",
            LoopdeckError::LayerNotFound { .. } => "LAYER_NOT_FOUND",
            LoopdeckError::MissingUploadField { .. } => "MISSING_UPLOAD_FIELD",
            LoopdeckError::InvalidBar { .. } => "INVALID_BAR",
            LoopdeckError::InvalidInterval => "INVALID_INTERVAL",
            LoopdeckError::InvalidBpm { .. } => "INVALID_BPM",
            LoopdeckError::InvalidBlock { .. } => "INVALID_BLOCK",
            LoopdeckError::NoRecordedTake => "NO_RECORDED_TAKE",
            LoopdeckError::PermissionDenied => "PERMISSION_DENIED",
            LoopdeckError::DeviceInit { .. } => "DEVICE_INIT",
            LoopdeckError::DeviceRead(_) => "DEVICE_READ",
            LoopdeckError::RecordingBusy => "RECORDING_BUSY",
            LoopdeckError::RenderFailed { .. } => "RENDER_FAILED",
            LoopdeckError::Network { .. } => "NETWORK_ERROR",
            LoopdeckError::ImportFailed { .. } => "IMPORT_FAILED",
            LoopdeckError::UploadRejected { .. } => "UPLOAD_REJECTED",
            LoopdeckError::InvalidAudio { .. } => "INVALID_AUDIO",
            LoopdeckError::Config { .. } => "CONFIG_ERROR",
            LoopdeckError::LayerIdsExhausted => "LAYER_IDS_EXHAUSTED",
            LoopdeckError::Io(_) => "IO_ERROR",
            LoopdeckError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the user can simply retry the action that produced this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LoopdeckError::Config { .. })
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            LoopdeckError::EmptyProject => "Add at least one layer before playing.".to_string(),
            LoopdeckError::LayerWithoutPattern { .. } => {
                "Every layer needs at least one placed bar before playing.".to_string()
            }
            LoopdeckError::MissingUploadField { .. } => {
                "Please fill in the title, description and tags.".to_string()
            }
            LoopdeckError::PermissionDenied => {
                "Microphone access is needed to record. Enable it and try again.".to_string()
            }
            LoopdeckError::DeviceInit { .. } | LoopdeckError::DeviceRead(_) => {
                "The microphone could not be started. Try again.".to_string()
            }
            LoopdeckError::RenderFailed { .. } => "Mixing the track failed.".to_string(),
            LoopdeckError::ImportFailed { .. } => "Importing the track failed.".to_string(),
            LoopdeckError::Network { .. } => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            LoopdeckError::UploadRejected { .. } => {
                "Saving the mix to the server failed.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = LoopdeckError::LayerWithoutPattern { layer_id: 3 };
        assert_eq!(err.error_code(), "LAYER_WITHOUT_PATTERN");
        assert_eq!(err.to_string(), "Layer 3 has no pattern blocks");
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            LoopdeckError::MissingUploadField { field: "tags" }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(LoopdeckError::PermissionDenied.category(), ErrorCategory::Device);
        assert_eq!(
            LoopdeckError::RenderFailed {
                path: PathBuf::from("mix.wav")
            }
            .category(),
            ErrorCategory::Render
        );
        assert_eq!(
            LoopdeckError::UploadRejected {
                code: "FAIL".to_string()
            }
            .category(),
            ErrorCategory::Network
        );
        assert_eq!(ErrorCategory::Render.to_string(), "RenderFailure");
    }

    #[test]
    fn test_user_failures_are_recoverable() {
        assert!(LoopdeckError::EmptyProject.is_recoverable());
        assert!(LoopdeckError::PermissionDenied.is_recoverable());
        assert!(!LoopdeckError::Config {
            reason: "bad".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_network_message_does_not_blame_import() {
        let err = LoopdeckError::Network {
            reason: "HTTP 502".to_string(),
        };
        assert!(!err.friendly_message().contains("Importing"));
        assert_eq!(
            LoopdeckError::ImportFailed {
                reason: "NF".to_string()
            }
            .friendly_message(),
            "Importing the track failed."
        );
    }
}
