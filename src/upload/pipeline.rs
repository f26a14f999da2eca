//! Upload pipeline
//!
//! validate -> render the mix -> measure it -> build the form -> submit.
//! Each step runs only when the previous one succeeded, so a validation
//! or render failure never reaches the network.
//!
//! [`UploadPipeline::prepare`] touches the audio engine and must run on the
//! thread that owns playback. [`UploadPipeline::submit`] is network only and
//! can run anywhere.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};

use super::form::UploadForm;
use super::metadata::UploadMetadata;
use crate::engine::io::wav_duration_secs;
use crate::engine::RenderCoordinator;
use crate::error::{LoopdeckError, Result};
use crate::layers::ProjectSnapshot;
use crate::remote::WorkstationService;

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Track id assigned by the server, when it returned one
    pub track_id: Option<i64>,
    pub mix_path: PathBuf,
    pub duration_secs: u64,
}

/// A rendered mix and its form, ready to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedUpload {
    pub form: UploadForm,
    pub mix_path: PathBuf,
    pub duration_secs: u64,
}

/// Renders and submits finished mixes
pub struct UploadPipeline {
    service: Arc<dyn WorkstationService>,
    files_dir: PathBuf,
    key: String,
}

impl UploadPipeline {
    pub fn new(service: Arc<dyn WorkstationService>, files_dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            service,
            files_dir: files_dir.into(),
            key: key.into(),
        }
    }

    /// Path the mix for `metadata` is rendered to
    pub fn mix_path(&self, metadata: &UploadMetadata) -> PathBuf {
        self.files_dir.join(metadata.mix_file_name())
    }

    /// Render `snapshot` and upload it with `metadata`
    ///
    /// # Errors
    /// See [`UploadPipeline::prepare`] and [`UploadPipeline::submit`].
    pub fn upload(
        &self,
        renderer: &RenderCoordinator,
        snapshot: &ProjectSnapshot,
        metadata: &UploadMetadata,
    ) -> Result<UploadReceipt> {
        let prepared = self.prepare(renderer, snapshot, metadata)?;
        self.submit(prepared)
    }

    /// Validate, render the mix and build the form
    ///
    /// # Errors
    /// * `MissingUploadField` - if the metadata is incomplete (no render)
    /// * `EmptyProject` / `LayerWithoutPattern` - if the project cannot be rendered
    /// * `RenderFailed` - if the engine could not produce the mix
    pub fn prepare(
        &self,
        renderer: &RenderCoordinator,
        snapshot: &ProjectSnapshot,
        metadata: &UploadMetadata,
    ) -> Result<PreparedUpload> {
        metadata.validate()?;

        fs::create_dir_all(&self.files_dir)?;
        let mix_path = self.mix_path(metadata);
        let mix = renderer.render_mix(snapshot, &mix_path)?;
        let duration_secs = wav_duration_secs(&mix.path)?;

        let form = UploadForm::build(snapshot, metadata, &mix.path, duration_secs, &self.key)?;
        info!(
            "Prepared '{}': {} layers, {} s",
            metadata.title,
            snapshot.layers.len(),
            duration_secs
        );
        Ok(PreparedUpload {
            form,
            mix_path: mix.path,
            duration_secs,
        })
    }

    /// Send a prepared upload to the server
    ///
    /// # Errors
    /// * `Network` / `UploadRejected` - if the submission fails
    pub fn submit(&self, prepared: PreparedUpload) -> Result<UploadReceipt> {
        info!("Uploading {}", prepared.mix_path.display());
        let response = self.service.upload_track(&prepared.form)?;
        if !response.is_success() {
            warn!(
                "Upload rejected: {} {}",
                response.code,
                response.message.as_deref().unwrap_or("")
            );
            return Err(LoopdeckError::UploadRejected {
                code: response.code,
            });
        }

        Ok(UploadReceipt {
            track_id: response.payload,
            mix_path: prepared.mix_path,
            duration_secs: prepared.duration_secs,
        })
    }
}
