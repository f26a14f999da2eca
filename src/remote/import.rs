//! Layer import
//!
//! Fetches a published (or recommended) track, downloads each layer's audio
//! into the files directory and normalizes it into local [`Layer`]s. An
//! import either yields every layer or nothing; files downloaded by a failed
//! import are removed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use super::{ImportedTrack, RemoteLayer, WorkstationService};
use crate::engine::io::wav_duration_ms;
use crate::error::{ErrorCategory, LoopdeckError, Result};
use crate::layers::{bars_from_duration, pattern_from_hints, Layer};

/// Name the server gives layers that were never named
pub const PLACEHOLDER_LAYER_NAME: &str = "layer";

/// Where imported layers come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    /// A track picked from search
    Search { track_id: i64 },
    /// A track recommended for the given source layers
    Recommendation { layer_ids: Vec<i64> },
}

/// Downloader and normalizer for remote layers
pub struct Importer {
    service: Arc<dyn WorkstationService>,
    files_dir: PathBuf,
    max_loop_bars: u32,
}

impl Importer {
    pub fn new(service: Arc<dyn WorkstationService>, files_dir: impl Into<PathBuf>, max_loop_bars: u32) -> Self {
        Self {
            service,
            files_dir: files_dir.into(),
            max_loop_bars,
        }
    }

    pub fn service(&self) -> &Arc<dyn WorkstationService> {
        &self.service
    }

    /// Fetch and normalize every layer of the track named by `source`
    ///
    /// # Errors
    /// * `Network` / `ImportFailed` - if the fetch, a download or a duration
    ///   measurement fails, or the response carries no track
    pub fn import(&self, source: &ImportSource, project_bpm: f32) -> Result<Vec<Layer>> {
        let track = self.fetch(source)?;
        info!(
            "Importing '{}' ({} layers) from {:?}",
            track.title,
            track.layers.len(),
            source
        );

        fs::create_dir_all(&self.files_dir).map_err(|e| import_error(e.into()))?;

        let mut downloaded: Vec<PathBuf> = Vec::new();
        let result = track
            .layers
            .iter()
            .map(|remote| {
                let path = self.files_dir.join(format!("layer_{}.wav", Uuid::new_v4()));
                downloaded.push(path.clone());
                self.service
                    .download(&remote.sound_url, &path)
                    .map_err(import_error)?;

                let duration_ms = wav_duration_ms(&path).map_err(import_error)?;
                debug!("Layer {} downloaded: {} ms", remote.layer_id, duration_ms);
                normalize_layer(
                    &track,
                    remote,
                    source,
                    path,
                    duration_ms,
                    project_bpm,
                    self.max_loop_bars,
                )
                .map_err(import_error)
            })
            .collect::<Result<Vec<Layer>>>();

        if result.is_err() {
            remove_downloads(downloaded.iter().map(PathBuf::as_path));
        }
        result
    }

    fn fetch(&self, source: &ImportSource) -> Result<ImportedTrack> {
        let response = match source {
            ImportSource::Search { track_id } => self.service.import_track(*track_id),
            ImportSource::Recommendation { layer_ids } => self.service.import_recommended(layer_ids),
        }
        .map_err(import_error)?;
        response.into_payload()
    }
}

/// Errors from import keep their network meaning; anything else becomes `ImportFailed`
fn import_error(e: LoopdeckError) -> LoopdeckError {
    if e.category() == ErrorCategory::Network {
        e
    } else {
        LoopdeckError::ImportFailed {
            reason: e.to_string(),
        }
    }
}

/// Build a local layer from a downloaded remote layer
///
/// Loop length comes from the audio duration at the project tempo. Naming:
/// a search import uses the track title as the name and the layer's own name
/// as the description (the title again when the server sent the placeholder
/// name); a recommendation uses the track title for both.
pub fn normalize_layer(
    track: &ImportedTrack,
    remote: &RemoteLayer,
    source: &ImportSource,
    wav_path: impl Into<PathBuf>,
    duration_ms: u64,
    project_bpm: f32,
    max_loop_bars: u32,
) -> Result<Layer> {
    let length = bars_from_duration(duration_ms, project_bpm, max_loop_bars);
    let description = match source {
        ImportSource::Search { .. } if remote.name != PLACEHOLDER_LAYER_NAME => remote.name.clone(),
        _ => track.title.clone(),
    };
    let pattern = pattern_from_hints(remote.bars.as_deref(), length)?;

    Layer::new(track.title.clone(), remote.instrument_type, length, wav_path)?
        .with_description(description)
        .with_source_id(remote.layer_id)
        .with_bpm(Some(remote.bpm.unwrap_or(project_bpm)))
        .with_pattern(pattern)
}

/// Whether `path` is a file this importer would have created
pub fn is_imported_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("layer_") && n.ends_with(".wav"))
        .unwrap_or(false)
}

/// Delete files left by an import that will not be used
///
/// Only files named like the importer's own downloads are touched.
pub fn remove_downloads<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        if !is_imported_file(path) || !path.exists() {
            continue;
        }
        if let Err(e) = fs::remove_file(path) {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}
