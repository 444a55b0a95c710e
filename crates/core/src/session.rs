//! Session controller.
//!
//! Owns everything a user interacts with during one session: the selected
//! file and its preview, the requested frame count, and the outcome of the
//! latest run. A run goes through extraction and analysis in order and ends
//! in exactly one of a result or an error.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    analysis::AnalysisClient,
    error::{ExtractionError, Result, SessionError},
    extractor::FrameExtractor,
    progress::progress_channel,
    types::{AnalysisResult, Preview, VideoFile},
};

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    FileSelected,
    Extracting,
    Analyzing,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Extraction progress in [0, 1], never decreasing within a run
    Progress(f32),
}

/// Number of frames to sample, 5 to 50 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCount(u32);

impl FrameCount {
    pub const MIN: u32 = 5;
    pub const MAX: u32 = 50;
    pub const DEFAULT: u32 = 15;

    pub fn new(count: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&count) {
            Ok(Self(count))
        } else {
            Err(SessionError::InvalidFrameCount(count))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for FrameCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

struct Selection {
    file: VideoFile,
    preview: Preview,
}

enum Phase {
    Ready,
    Extracting { progress: f32 },
    Analyzing,
}

pub struct Session {
    extractor: Arc<dyn FrameExtractor>,
    client: Arc<dyn AnalysisClient>,
    selection: Option<Selection>,
    frame_count: FrameCount,
    phase: Phase,
    /// Result or error of the latest run, `None` while a run is in flight
    outcome: Option<Result<AnalysisResult>>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl Session {
    pub fn new(extractor: Arc<dyn FrameExtractor>, client: Arc<dyn AnalysisClient>) -> Self {
        Self {
            extractor,
            client,
            selection: None,
            frame_count: FrameCount::default(),
            phase: Phase::Ready,
            outcome: None,
            events: None,
        }
    }

    /// Receive state changes and extraction progress from now on.
    ///
    /// Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn state(&self) -> SessionState {
        match (&self.phase, &self.outcome) {
            (Phase::Extracting { .. }, _) => SessionState::Extracting,
            (Phase::Analyzing, _) => SessionState::Analyzing,
            (Phase::Ready, Some(Ok(_))) => SessionState::Done,
            (Phase::Ready, Some(Err(_))) => SessionState::Failed,
            (Phase::Ready, None) if self.selection.is_some() => SessionState::FileSelected,
            (Phase::Ready, None) => SessionState::Idle,
        }
    }

    pub fn is_loading(&self) -> bool {
        !matches!(self.phase, Phase::Ready)
    }

    /// Extraction progress of the current run, 1.0 once extraction is over
    pub fn progress(&self) -> f32 {
        match self.phase {
            Phase::Extracting { progress } => progress,
            Phase::Analyzing => 1.0,
            Phase::Ready if self.result().is_some() => 1.0,
            Phase::Ready => 0.0,
        }
    }

    pub fn file(&self) -> Option<&VideoFile> {
        self.selection.as_ref().map(|s| &s.file)
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.selection.as_ref().map(|s| &s.preview)
    }

    pub fn frame_count(&self) -> FrameCount {
        self.frame_count
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.outcome.as_ref()?.as_ref().ok()
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.outcome.as_ref()?.as_ref().err()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(SessionError::user_message)
    }

    /// Short line describing what the session is doing
    pub fn status_message(&self) -> String {
        match self.state() {
            SessionState::Idle => "Select a video to begin".to_string(),
            SessionState::FileSelected => match &self.selection {
                Some(selection) => format!(
                    "Ready to analyze {}",
                    selection
                        .file
                        .path
                        .file_name()
                        .map(|name| name.to_string_lossy())
                        .unwrap_or_else(|| selection.file.path.to_string_lossy())
                ),
                None => "Select a video to begin".to_string(),
            },
            SessionState::Extracting => {
                format!("Extracting frames... {:.0}%", self.progress() * 100.0)
            }
            SessionState::Analyzing => format!("Analyzing frames with {}...", self.client.name()),
            SessionState::Done => "Analysis complete".to_string(),
            SessionState::Failed => "Analysis failed".to_string(),
        }
    }

    /// Select a new video, replacing the current one.
    ///
    /// A file whose MIME type is not `video/*` leaves the selection untouched
    /// but records `InvalidUpload` as the session outcome, so the session
    /// moves to `Failed` and any previous result is dropped.
    pub fn select_file(&mut self, file: VideoFile) -> Result<()> {
        if self.is_loading() {
            return Err(SessionError::Busy);
        }

        if !file.is_video() {
            warn!(path = %file.path.display(), mime = %file.mime, "rejected upload");
            self.finish(Err(SessionError::InvalidUpload {
                mime: file.mime.clone(),
            }));
            return Err(SessionError::InvalidUpload { mime: file.mime });
        }

        if let Some(previous) = self.selection.take() {
            previous.preview.release();
        }

        info!(path = %file.path.display(), mime = %file.mime, "selected video");
        let preview = Preview::for_file(&file);
        self.selection = Some(Selection { file, preview });
        self.outcome = None;
        self.set_phase(Phase::Ready);
        Ok(())
    }

    pub fn set_frame_count(&mut self, count: u32) -> Result<()> {
        if self.is_loading() {
            return Err(SessionError::Busy);
        }
        self.frame_count = FrameCount::new(count)?;
        Ok(())
    }

    /// Extract frames from the selected video and analyze them.
    ///
    /// Runs to completion; the returned outcome is also kept in the session
    /// until the next run or selection.
    pub async fn analyze(&mut self) -> Result<&AnalysisResult, &SessionError> {
        let Some(selection) = &self.selection else {
            return self.finish(Err(SessionError::PreconditionFailure)).as_ref();
        };

        let file = selection.file.clone();
        let count = self.frame_count.get() as usize;
        let span = info_span!(
            "analysis_run",
            run_id = %Uuid::new_v4(),
            path = %file.path.display(),
            frames = count
        );
        let outcome = self.run(file, count).instrument(span).await;
        self.finish(outcome).as_ref()
    }

    async fn run(&mut self, file: VideoFile, count: usize) -> Result<AnalysisResult> {
        self.outcome = None;
        self.set_phase(Phase::Extracting { progress: 0.0 });
        self.emit(SessionEvent::Progress(0.0));

        let extractor = Arc::clone(&self.extractor);
        let (progress_tx, mut progress_rx) = progress_channel();
        let extraction = extractor.extract(&file, count, progress_tx);
        tokio::pin!(extraction);

        let extracted = loop {
            tokio::select! {
                biased;
                Some(progress) = progress_rx.recv() => self.record_progress(progress),
                result = &mut extraction => break result,
            }
        };
        while let Ok(progress) = progress_rx.try_recv() {
            self.record_progress(progress);
        }

        let frames = match extracted {
            Ok(frames) if !frames.is_empty() => frames,
            Ok(_) => {
                warn!("extractor returned no frames");
                return Err(ExtractionError::NoFrames { path: file.path.clone() }.into());
            }
            Err(e) => {
                warn!(error = %e, "frame extraction failed");
                return Err(e.into());
            }
        };

        info!(frames = frames.len(), "extraction finished");
        self.set_phase(Phase::Analyzing);

        let client = Arc::clone(&self.client);
        let result = client.analyze(&frames).await.inspect_err(|e| {
            warn!(error = %e, "analysis failed");
        })?;
        info!(title = %result.title, "analysis finished");
        Ok(result)
    }

    /// Store the outcome of a run and leave the busy phases
    fn finish(&mut self, outcome: Result<AnalysisResult>) -> &Result<AnalysisResult> {
        self.phase = Phase::Ready;
        let state = if outcome.is_ok() {
            SessionState::Done
        } else {
            SessionState::Failed
        };
        self.emit(SessionEvent::StateChanged(state));
        self.outcome.insert(outcome)
    }

    fn record_progress(&mut self, fraction: f32) {
        if let Phase::Extracting { progress } = &mut self.phase {
            *progress = fraction;
        }
        self.emit(SessionEvent::Progress(fraction));
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.emit(SessionEvent::StateChanged(self.state()));
    }

    fn emit(&mut self, event: SessionEvent) {
        if let Some(tx) = &self.events
            && tx.send(event).is_err()
        {
            self.events = None;
        }
    }
}
