//! Multipart upload form
//!
//! Text fields are kept in wire order next to the file parts so the form can
//! be inspected, logged and serialized before it is sent.

use std::path::PathBuf;

use serde::Serialize;

use super::metadata::UploadMetadata;
use crate::error::Result;
use crate::layers::ProjectSnapshot;

pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_DURATION: &str = "duration";
pub const FIELD_VISIBILITY: &str = "visibility";
pub const FIELD_TAGS: &str = "tags";
pub const FIELD_SOURCE_TRACKS: &str = "sourceTracks";
pub const FIELD_LAYER_NAME: &str = "layerName";
pub const FIELD_INSTRUMENT_TYPE: &str = "instrumentType";
pub const FIELD_BARS_JSON: &str = "barsJson";
pub const FIELD_BPM: &str = "bpm";
pub const FIELD_KEY: &str = "key";

/// File part carrying the rendered mix
pub const PART_TRACK_SOUND: &str = "trackSoundFile";
/// File part carrying one layer's audio, repeated per layer
pub const PART_LAYER_SOUND: &str = "layerSoundFiles";

/// A ready-to-send track upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadForm {
    pub fields: Vec<(String, String)>,
    pub track_sound_file: PathBuf,
    pub layer_sound_files: Vec<PathBuf>,
}

fn csv<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}

impl UploadForm {
    /// Assemble the form for `snapshot`
    ///
    /// # Arguments
    /// * `snapshot` - Layers in project order
    /// * `metadata` - Validated user metadata
    /// * `mix_path` - Rendered mix file
    /// * `duration_secs` - Whole seconds of the rendered mix
    /// * `key` - Musical key label
    pub fn build(
        snapshot: &ProjectSnapshot,
        metadata: &UploadMetadata,
        mix_path: impl Into<PathBuf>,
        duration_secs: u64,
        key: &str,
    ) -> Result<Self> {
        let layers = &snapshot.layers;
        let bars: Vec<Vec<u32>> = layers.iter().map(|l| l.block_starts()).collect();

        let fields = vec![
            (FIELD_TITLE, metadata.title.clone()),
            (FIELD_DESCRIPTION, metadata.description.clone()),
            (FIELD_DURATION, duration_secs.to_string()),
            (FIELD_VISIBILITY, metadata.visibility.code().to_string()),
            (FIELD_TAGS, metadata.tags_csv()),
            (FIELD_SOURCE_TRACKS, csv(layers.iter().map(|l| l.source_id))),
            (FIELD_LAYER_NAME, csv(layers.iter().map(|l| &l.name))),
            (FIELD_INSTRUMENT_TYPE, csv(layers.iter().map(|l| l.instrument_type))),
            (FIELD_BARS_JSON, serde_json::to_string(&bars)?),
            (FIELD_BPM, (snapshot.bpm as i64).to_string()),
            (FIELD_KEY, key.to_string()),
        ];

        Ok(Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            track_sound_file: mix_path.into(),
            layer_sound_files: layers.iter().map(|l| l.wav_path.clone()).collect(),
        })
    }

    /// Value of a text field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
