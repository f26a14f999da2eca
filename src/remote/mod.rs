//! Remote Workstation Service
//!
//! DTOs and the service trait for the track server: importing a published
//! track's layers, asking for recommended layers, downloading audio and
//! uploading a finished mix.
//!
//! The HTTP implementation uses a blocking `reqwest` client and is compiled
//! only with the `http` feature.

pub mod import;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LoopdeckError, Result};
use crate::upload::UploadForm;

pub use import::{remove_downloads, ImportSource, Importer};

/// Response code the server uses for success
pub const SUCCESS_CODE: &str = "SU";

/// Envelope around every server response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: String,
    pub message: Option<String>,
    pub payload: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// The payload of a successful response
    ///
    /// # Errors
    /// * `ImportFailed` - if the code is not success or the payload is missing
    pub fn into_payload(self) -> Result<T> {
        if !self.is_success() {
            return Err(LoopdeckError::ImportFailed {
                reason: format!(
                    "server returned {} ({})",
                    self.code,
                    self.message.unwrap_or_default()
                ),
            });
        }
        self.payload.ok_or_else(|| LoopdeckError::ImportFailed {
            reason: "response has no payload".to_string(),
        })
    }
}

/// One layer of a published track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLayer {
    pub layer_id: i64,
    pub track_id: i64,
    pub name: String,
    pub instrument_type: u32,
    pub sound_url: String,
    /// Start bars of the layer's blocks
    #[serde(default)]
    pub bars: Option<Vec<u32>>,
    #[serde(default)]
    pub bpm: Option<f32>,
}

/// Import payload: a published track and its layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedTrack {
    pub layer_id: i64,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub sound_url: String,
    #[serde(default)]
    pub layers: Vec<RemoteLayer>,
}

/// Body of a recommendation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    pub layer_ids: Vec<i64>,
}

/// Track server operations
pub trait WorkstationService: Send + Sync {
    /// Fetch a published track's layers for import
    fn import_track(&self, track_id: i64) -> Result<ApiResponse<ImportedTrack>>;

    /// Ask for a track recommended from the given source layers
    fn import_recommended(&self, layer_ids: &[i64]) -> Result<ApiResponse<ImportedTrack>>;

    /// Upload a mix; the payload is the new track id
    fn upload_track(&self, form: &UploadForm) -> Result<ApiResponse<i64>>;

    /// Download `url` to `dest`
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

// ============================================================================
// HTTP Client
// ============================================================================

/// Blocking HTTP client for the track server
#[derive(Debug, Clone)]
pub struct HttpWorkstationService {
    base_url: String,
    token: Option<String>,
}

impl HttpWorkstationService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[cfg_attr(not(feature = "http"), allow(dead_code))]
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
    use serde::de::DeserializeOwned;
    use std::fs::File;
    use std::io;

    fn network_error(e: reqwest::Error) -> LoopdeckError {
        LoopdeckError::Network {
            reason: e.to_string(),
        }
    }

    impl HttpWorkstationService {
        fn client(&self) -> Result<Client> {
            Client::builder().build().map_err(network_error)
        }

        fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
            match &self.token {
                Some(token) => builder.bearer_auth(token),
                None => builder,
            }
        }

        fn send(&self, builder: RequestBuilder) -> Result<Response> {
            let response = self.authorized(builder).send().map_err(network_error)?;
            if !response.status().is_success() {
                tracing::warn!("Track server returned HTTP {}", response.status());
                return Err(LoopdeckError::Network {
                    reason: format!("HTTP {}", response.status()),
                });
            }
            Ok(response)
        }

        fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<ApiResponse<T>> {
            self.send(builder)?
                .json::<ApiResponse<T>>()
                .map_err(|e| LoopdeckError::Network {
                    reason: format!("Invalid response from server: {}", e),
                })
        }
    }

    impl WorkstationService for HttpWorkstationService {
        fn import_track(&self, track_id: i64) -> Result<ApiResponse<ImportedTrack>> {
            tracing::debug!(track_id, "import track");
            let client = self.client()?;
            self.json(
                client
                    .get(self.url("workstation/import"))
                    .query(&[("trackId", track_id)]),
            )
        }

        fn import_recommended(&self, layer_ids: &[i64]) -> Result<ApiResponse<ImportedTrack>> {
            tracing::debug!(?layer_ids, "recommend layers");
            let client = self.client()?;
            let body = RecommendRequest {
                layer_ids: layer_ids.to_vec(),
            };
            self.json(client.post(self.url("workstation/ai/recommend")).json(&body))
        }

        fn upload_track(&self, form: &UploadForm) -> Result<ApiResponse<i64>> {
            let mut multipart = multipart::Form::new();
            for (name, value) in &form.fields {
                multipart = multipart.text(name.clone(), value.clone());
            }
            multipart = multipart
                .file(crate::upload::PART_TRACK_SOUND, &form.track_sound_file)?;
            for path in &form.layer_sound_files {
                multipart = multipart.file(crate::upload::PART_LAYER_SOUND, path)?;
            }

            tracing::info!(
                layers = form.layer_sound_files.len(),
                "uploading mix {}",
                form.track_sound_file.display()
            );
            let client = self.client()?;
            self.json(client.post(self.url("workstation")).multipart(multipart))
        }

        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            let client = self.client()?;
            let mut response = self.send(client.get(url))?;
            let mut file = File::create(dest)?;
            if let Err(e) = io::copy(&mut response, &mut file) {
                drop(file);
                let _ = std::fs::remove_file(dest);
                return Err(LoopdeckError::Network {
                    reason: format!("download of {} failed: {}", url, e),
                });
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "http"))]
impl WorkstationService for HttpWorkstationService {
    fn import_track(&self, _track_id: i64) -> Result<ApiResponse<ImportedTrack>> {
        Err(not_compiled())
    }

    fn import_recommended(&self, _layer_ids: &[i64]) -> Result<ApiResponse<ImportedTrack>> {
        Err(not_compiled())
    }

    fn upload_track(&self, _form: &UploadForm) -> Result<ApiResponse<i64>> {
        Err(not_compiled())
    }

    fn download(&self, _url: &str, _dest: &Path) -> Result<()> {
        Err(not_compiled())
    }
}

#[cfg(not(feature = "http"))]
fn not_compiled() -> LoopdeckError {
    LoopdeckError::Network {
        reason: "HTTP support not compiled. Build with --features http".to_string(),
    }
}
