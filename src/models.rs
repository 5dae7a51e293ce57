use serde::{Deserialize, Serialize};

// === API Request/Response Models ===

/// The JSON body for a `POST /api/download` request.
///
/// Only `url` is mandatory; everything else falls back to the CLI defaults.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub audio_only: bool,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

pub fn default_resolution() -> String {
    "720p".to_string()
}

pub fn default_format() -> String {
    "mp4".to_string()
}

pub fn default_audio_format() -> String {
    "mp3".to_string()
}

impl DownloadRequest {
    /// The URL, if one was given and it is not empty.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

/// The response sent once a download job exits successfully.
#[derive(Serialize, Debug)]
pub struct DownloadResponse {
    pub success: bool,
    pub message: String,
    pub output: String,
}

#[derive(Serialize, Debug)]
pub struct ServiceStatus {
    pub status: &'static str,
}
