use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to run decoder: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not read video {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("No frames could be extracted from {path}")]
    NoFrames { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No frames to analyze")]
    NoFrames,

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Invalid API response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Response does not match the expected shape: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}: {env_var} environment variable is not set")]
    MissingApiKey {
        provider_name: String,
        env_var: String,
    },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Please upload a valid video file (got {mime})")]
    InvalidUpload { mime: String },

    #[error("Please select a video file first")]
    PreconditionFailure,

    #[error("{0}")]
    ExtractionFailure(#[from] ExtractionError),

    #[error("{0}")]
    AnalysisFailure(#[from] AnalysisError),

    #[error("Frame count must be between 5 and 50, got {0}")]
    InvalidFrameCount(u32),

    #[error("An analysis is already running")]
    Busy,
}

impl SessionError {
    /// Message shown to the user when a run ends with this error
    pub fn user_message(&self) -> String {
        match self {
            SessionError::ExtractionFailure(_) | SessionError::AnalysisFailure(_) => {
                format!("Analysis Failed: {}", self)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
