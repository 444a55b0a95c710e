use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use glimpse_core::{
    AnalysisClient, AnalysisError, AnalysisResult, ExtractionError, Frame, FrameCount,
    FrameExtractor, KeyMoment, ProgressSender, Session, SessionError, SessionEvent, SessionState,
    VideoFile, parse_completion, sample_timestamps,
};
use tokio::sync::mpsc;

enum Extraction {
    Frames { duration: f64 },
    Empty,
    Broken,
}

struct FakeExtractor {
    behavior: Extraction,
    calls: AtomicUsize,
    requested: Mutex<Vec<usize>>,
}

impl FakeExtractor {
    fn new(behavior: Extraction) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameExtractor for FakeExtractor {
    async fn extract(
        &self,
        file: &VideoFile,
        count: usize,
        mut progress: ProgressSender,
    ) -> Result<Vec<Frame>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(count);

        match self.behavior {
            Extraction::Frames { duration } => {
                let timestamps = sample_timestamps(duration, count);
                let mut frames = Vec::new();
                for (i, timestamp) in timestamps.iter().enumerate() {
                    frames.push(Frame {
                        index: i,
                        timestamp: *timestamp,
                        data: vec![0xff, 0xd8, i as u8],
                    });
                    progress.report((i + 1) as f32 / timestamps.len() as f32);
                    tokio::task::yield_now().await;
                }
                progress.report(1.0);
                Ok(frames)
            }
            Extraction::Empty => {
                progress.report(1.0);
                Ok(Vec::new())
            }
            Extraction::Broken => Err(ExtractionError::Unreadable {
                path: file.path.clone(),
                reason: "moov atom not found".to_string(),
            }),
        }
    }
}

enum Reply {
    Content(&'static str),
    Unreachable,
}

struct FakeClient {
    reply: Reply,
    received: Mutex<Vec<Frame>>,
    calls: AtomicUsize,
}

impl FakeClient {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            received: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisClient for FakeClient {
    async fn analyze(&self, frames: &[Frame]) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.received.lock().unwrap() = frames.to_vec();

        match self.reply {
            Reply::Content(content) => parse_completion(&serde_json::json!({
                "choices": [{"message": {"content": content}}]
            })),
            Reply::Unreachable => Err(AnalysisError::Service {
                status: 503,
                body: "overloaded".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

const WELL_FORMED: &str = r#"{"title":"T","summary":"S","key_topics":["a"],"key_moments":[{"timestamp_description":"0:02","event_summary":"x"}]}"#;
const MISSING_MOMENTS: &str = r#"{"title":"T","summary":"S","key_topics":["a"]}"#;

fn expected_result() -> AnalysisResult {
    AnalysisResult {
        title: "T".to_string(),
        summary: "S".to_string(),
        key_topics: vec!["a".to_string()],
        key_moments: vec![KeyMoment {
            timestamp_description: "0:02".to_string(),
            event_summary: "x".to_string(),
        }],
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> (Vec<SessionState>, Vec<f32>) {
    let mut states = Vec::new();
    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::StateChanged(state) => states.push(state),
            SessionEvent::Progress(p) => progress.push(p),
        }
    }
    (states, progress)
}

#[tokio::test]
async fn ten_second_video_runs_through_every_state() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor.clone(), client.clone());
    let mut events = session.subscribe();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.status_message(), "Select a video to begin");

    session
        .select_file(VideoFile::from_path("/videos/holiday.mp4"))
        .unwrap();
    assert_eq!(session.status_message(), "Ready to analyze holiday.mp4");
    session.set_frame_count(5).unwrap();

    let result = session.analyze().await.unwrap().clone();
    assert_eq!(result, expected_result());

    let (states, progress) = drain(&mut events);
    assert_eq!(
        states,
        vec![
            SessionState::FileSelected,
            SessionState::Extracting,
            SessionState::Analyzing,
            SessionState::Done,
        ]
    );
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.first(), Some(&0.0));
    assert_eq!(progress.last(), Some(&1.0));

    let received = client.received.lock().unwrap().clone();
    let timestamps: Vec<f64> = received.iter().map(|f| f.timestamp).collect();
    assert_eq!(timestamps, sample_timestamps(10.0, 5));
    assert_eq!(timestamps.len(), 5);
    assert_eq!(timestamps[0], 0.0);
    assert!((timestamps[2] - 4.95).abs() < 1e-9);

    assert_eq!(session.state(), SessionState::Done);
    assert!(!session.is_loading());
    assert_eq!(session.progress(), 1.0);
    assert_eq!(session.result(), Some(&expected_result()));
    assert!(session.error().is_none());
    assert_eq!(session.status_message(), "Analysis complete");
}

#[tokio::test]
async fn requested_frame_count_reaches_the_extractor() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 60.0 });
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor.clone(), client.clone());

    session.select_file(VideoFile::from_path("talk.webm")).unwrap();
    session.analyze().await.unwrap();
    session.set_frame_count(32).unwrap();
    session.analyze().await.unwrap();

    assert_eq!(*extractor.requested.lock().unwrap(), vec![15, 32]);
    assert_eq!(client.received.lock().unwrap().len(), 32);
}

#[tokio::test]
async fn non_video_upload_keeps_selection() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor, client);

    let err = session
        .select_file(VideoFile::from_path("notes.txt"))
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidUpload { .. }));
    assert!(session.file().is_none());
    assert!(session.preview().is_none());
    assert!(matches!(
        session.error(),
        Some(SessionError::InvalidUpload { mime }) if mime == "text/plain"
    ));

    session.select_file(VideoFile::from_path("clip.mp4")).unwrap();
    let preview = session.preview().cloned();

    let err = session
        .select_file(VideoFile::from_path("cover.png"))
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidUpload { .. }));
    assert_eq!(session.file().map(|f| f.path.clone()), Some(PathBuf::from("clip.mp4")));
    assert_eq!(session.preview().cloned(), preview);
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(
        session.error_message().as_deref(),
        Some("Please upload a valid video file (got image/png)")
    );
}

#[tokio::test]
async fn analyze_without_file_is_a_precondition_failure() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor.clone(), client.clone());

    let err = session.analyze().await.unwrap_err();
    assert!(matches!(err, SessionError::PreconditionFailure));
    assert!(!session.is_loading());
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(extractor.calls(), 0);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn zero_frames_never_reach_the_client() {
    let extractor = FakeExtractor::new(Extraction::Empty);
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor, client.clone());
    let mut events = session.subscribe();

    session.select_file(VideoFile::from_path("empty.mp4")).unwrap();
    let err = session.analyze().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::ExtractionFailure(ExtractionError::NoFrames { .. })
    ));

    assert_eq!(client.calls(), 0);
    assert!(session.result().is_none());
    assert!(!session.is_loading());
    assert_eq!(
        session.error_message().as_deref(),
        Some("Analysis Failed: No frames could be extracted from empty.mp4")
    );

    let (states, _) = drain(&mut events);
    assert_eq!(
        states,
        vec![
            SessionState::FileSelected,
            SessionState::Extracting,
            SessionState::Failed,
        ]
    );
}

#[tokio::test]
async fn decode_fault_is_an_extraction_failure() {
    let extractor = FakeExtractor::new(Extraction::Broken);
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor, client.clone());

    session.select_file(VideoFile::from_path("corrupt.mov")).unwrap();
    let err = session.analyze().await.unwrap_err();
    assert!(matches!(err, SessionError::ExtractionFailure(_)));
    assert!(
        session
            .error_message()
            .unwrap()
            .starts_with("Analysis Failed: Could not read video corrupt.mov")
    );
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn malformed_response_is_an_analysis_failure() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Content(MISSING_MOMENTS));
    let mut session = Session::new(extractor, client);
    let mut events = session.subscribe();

    session.select_file(VideoFile::from_path("clip.mp4")).unwrap();
    let err = session.analyze().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::AnalysisFailure(AnalysisError::Parse(_))
    ));
    assert!(session.result().is_none());
    assert!(!session.is_loading());

    let (states, _) = drain(&mut events);
    assert_eq!(states.last(), Some(&SessionState::Failed));
    assert!(states.contains(&SessionState::Analyzing));
}

#[tokio::test]
async fn service_error_is_reported_with_prefix() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Unreachable);
    let mut session = Session::new(extractor, client);

    session.select_file(VideoFile::from_path("clip.mp4")).unwrap();
    session.analyze().await.unwrap_err();
    assert_eq!(
        session.error_message().as_deref(),
        Some("Analysis Failed: Service returned 503: overloaded")
    );
}

#[tokio::test]
async fn new_upload_clears_previous_outcome() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor, client);

    session.select_file(VideoFile::from_path("first.mp4")).unwrap();
    session.analyze().await.unwrap();
    assert!(session.result().is_some());

    session.select_file(VideoFile::from_path("second.mkv")).unwrap();
    assert_eq!(session.state(), SessionState::FileSelected);
    assert!(session.result().is_none());
    assert!(session.error().is_none());
    assert_eq!(
        session.file().map(|f| f.mime.as_str()),
        Some("video/x-matroska")
    );
    assert!(session.preview().unwrap().url().ends_with("second.mkv"));
}

#[tokio::test]
async fn invalid_upload_after_success_replaces_result() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor, client);
    let mut events = session.subscribe();

    session.select_file(VideoFile::from_path("clip.mp4")).unwrap();
    assert_eq!(session.analyze().await.unwrap(), &expected_result());
    assert_eq!(session.progress(), 1.0);

    session
        .select_file(VideoFile::from_path("notes.txt"))
        .unwrap_err();
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.result().is_none());
    assert_eq!(session.progress(), 0.0);
    assert_eq!(session.file().map(|f| f.path.clone()), Some(PathBuf::from("clip.mp4")));

    let (states, _) = drain(&mut events);
    assert_eq!(states.first(), Some(&SessionState::FileSelected));
    assert_eq!(
        states[states.len() - 2..],
        [SessionState::Done, SessionState::Failed]
    );
}

#[tokio::test]
async fn failed_run_can_be_retriggered() {
    let extractor = FakeExtractor::new(Extraction::Frames { duration: 10.0 });
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor, client.clone());

    session.analyze().await.unwrap_err();
    session.select_file(VideoFile::from_path("clip.mp4")).unwrap();
    session.analyze().await.unwrap();
    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(client.calls(), 1);
}

#[test]
fn frame_count_is_bounded() {
    let extractor = FakeExtractor::new(Extraction::Empty);
    let client = FakeClient::new(Reply::Content(WELL_FORMED));
    let mut session = Session::new(extractor, client);

    assert_eq!(session.frame_count().get(), 15);
    assert!(matches!(
        session.set_frame_count(4),
        Err(SessionError::InvalidFrameCount(4))
    ));
    assert!(matches!(
        session.set_frame_count(51),
        Err(SessionError::InvalidFrameCount(51))
    ));
    assert_eq!(session.frame_count().get(), 15);

    session.set_frame_count(FrameCount::MIN).unwrap();
    assert_eq!(session.frame_count().get(), 5);
    session.set_frame_count(FrameCount::MAX).unwrap();
    assert_eq!(session.frame_count().get(), 50);
}
