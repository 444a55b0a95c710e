//! Glimpse Core Library
//!
//! Samples frames from a video, sends them to a multimodal AI model and
//! returns a structured summary of the video.

pub mod analysis;
pub mod error;
pub mod extractor;
pub mod format;
pub mod progress;
pub mod provider;
pub mod session;
pub mod types;

// Re-export commonly used items at crate root
pub use analysis::{AnalysisClient, HttpAnalysisClient, parse_completion};
pub use error::{AnalysisError, ExtractionError, ProviderError, Result, SessionError};
pub use extractor::{FfmpegExtractor, FrameExtractor, sample_timestamps};
pub use format::{format_report_readable, format_timestamp};
pub use progress::{ProgressReceiver, ProgressSender, progress_channel};
pub use provider::{Provider, ProviderConfig};
pub use session::{FrameCount, Session, SessionEvent, SessionState};
pub use types::{AnalysisResult, Frame, KeyMoment, Preview, VideoFile};
