use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

/// Structured summary returned by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub summary: String,
    pub key_topics: Vec<String>,
    pub key_moments: Vec<KeyMoment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMoment {
    pub timestamp_description: String,
    pub event_summary: String,
}

/// A still image sampled from a video.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    /// Position in the video, in seconds
    pub timestamp: f64,
    /// JPEG bytes
    pub data: Vec<u8>,
}

impl Frame {
    pub const MIME: &'static str = "image/jpeg";

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            Self::MIME,
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// A local file picked for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    pub path: PathBuf,
    pub mime: String,
}

impl VideoFile {
    /// Build from a path, guessing the MIME type from its extension
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime = guess_mime(&path).to_string();
        Self { path, mime }
    }

    pub fn with_mime(path: impl Into<PathBuf>, mime: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime: mime.into(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let Some(ext) = path.extension() else {
        return "application/octet-stream";
    };

    match ext.to_string_lossy().to_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        "ogv" => "video/ogg",
        "3gp" => "video/3gpp",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "png" => "image/png",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Previewable handle for the selected file.
///
/// The controller releases it when a new file supersedes the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    url: String,
}

impl Preview {
    pub fn for_file(file: &VideoFile) -> Self {
        let absolute = std::path::absolute(&file.path).unwrap_or_else(|_| file.path.clone());
        Self {
            url: format!("file://{}", absolute.display()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn release(self) {
        tracing::debug!(url = %self.url, "released preview");
    }
}
