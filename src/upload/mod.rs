//! Upload Module
//!
//! Publishing a finished mix:
//! - User metadata and validation
//! - Multipart form assembly
//! - Render-then-submit pipeline

pub mod form;
pub mod metadata;
pub mod pipeline;

pub use form::{UploadForm, PART_LAYER_SOUND, PART_TRACK_SOUND};
pub use metadata::{UploadMetadata, Visibility};
pub use pipeline::{PreparedUpload, UploadPipeline, UploadReceipt};
