use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    error::ExtractionError,
    progress::ProgressSender,
    types::{Frame, VideoFile},
};

/// Seconds kept clear of the end of the video so the last seek still lands on a frame
const END_MARGIN_SECONDS: f64 = 0.1;

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Sample `count` frames evenly across the video, in timestamp order.
    ///
    /// Never returns an empty vector: zero frames is `ExtractionError::NoFrames`.
    async fn extract(
        &self,
        file: &VideoFile,
        count: usize,
        progress: ProgressSender,
    ) -> Result<Vec<Frame>, ExtractionError>;
}

/// Timestamps for `count` frames spread evenly over `[0, duration - margin]`.
///
/// The first frame is at 0. A single frame is taken from the middle.
pub fn sample_timestamps(duration: f64, count: usize) -> Vec<f64> {
    if count == 0 || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }

    let end = (duration - END_MARGIN_SECONDS).max(0.0);
    if count == 1 {
        return vec![end / 2.0];
    }

    let step = end / (count - 1) as f64;
    (0..count).map(|i| i as f64 * step).collect()
}

/// Frame extractor backed by `ffprobe` and `ffmpeg`
pub struct FfmpegExtractor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    max_width: Option<u32>,
    jpeg_quality: u8,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegExtractor {
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            max_width: Some(1024),
            jpeg_quality: 3,
        }
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    /// Downscale frames wider than `max_width`. `None` keeps the source size.
    pub fn with_max_width(mut self, max_width: Option<u32>) -> Self {
        self.max_width = max_width;
        self
    }

    /// ffmpeg `-q:v` value, 2 (best) to 31 (worst)
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(2, 31);
        self
    }

    async fn probe_duration(&self, video_path: &Path) -> Result<f64, ExtractionError> {
        debug!(path = %video_path.display(), "probing video");
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(video_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractionError::Unreadable {
                path: video_path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_duration(&output.stdout).map_err(|reason| ExtractionError::Unreadable {
            path: video_path.to_path_buf(),
            reason,
        })
    }

    async fn extract_frame(&self, video_path: &Path, timestamp: f64) -> Result<Vec<u8>, String> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", timestamp))
            .arg("-i")
            .arg(video_path)
            .arg("-frames:v")
            .arg("1");

        if let Some(width) = self.max_width {
            command.arg("-vf").arg(format!("scale='min({},iw)':-2", width));
        }

        let output = command
            .arg("-q:v")
            .arg(self.jpeg_quality.to_string())
            .arg("-f")
            .arg("image2pipe")
            .arg("-c:v")
            .arg("mjpeg")
            .arg("pipe:1")
            .output()
            .await
            .map_err(|e| e.to_string())?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        if output.stdout.is_empty() {
            return Err("decoder produced no image".to_string());
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(
        &self,
        file: &VideoFile,
        count: usize,
        mut progress: ProgressSender,
    ) -> Result<Vec<Frame>, ExtractionError> {
        let duration = self.probe_duration(&file.path).await?;
        let timestamps = sample_timestamps(duration, count);
        info!(
            path = %file.path.display(),
            duration,
            requested = count,
            "extracting frames"
        );

        let mut frames = Vec::with_capacity(timestamps.len());
        for (i, &timestamp) in timestamps.iter().enumerate() {
            match self.extract_frame(&file.path, timestamp).await {
                Ok(data) => frames.push(Frame {
                    index: frames.len(),
                    timestamp,
                    data,
                }),
                Err(reason) => warn!(timestamp, %reason, "skipping frame"),
            }
            progress.report((i + 1) as f32 / timestamps.len() as f32);
        }

        if frames.is_empty() {
            return Err(ExtractionError::NoFrames {
                path: file.path.clone(),
            });
        }

        progress.report(1.0);
        info!(extracted = frames.len(), "frames ready");
        Ok(frames)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Duration in seconds from `ffprobe -print_format json` output
fn parse_probe_duration(stdout: &[u8]) -> Result<f64, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable probe output: {}", e))?;

    let Some(video) = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
    else {
        return Err("no video stream".to_string());
    };

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .or_else(|| video.duration.clone())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| "unknown duration".to_string())?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(format!("invalid duration {}", duration));
    }

    Ok(duration)
}
