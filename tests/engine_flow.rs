use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::Result;
use chrono::Utc;
use image::{DynamicImage, RgbImage};

use bainoculars_lib::camera::{Frame, FrameSource};
use bainoculars_lib::db::{Database, RecordStatus};
use bainoculars_lib::detection::Classifier;
use bainoculars_lib::engine::{EngineConfig, EngineHandle, EngineParts};
use bainoculars_lib::error::SessionError;
use bainoculars_lib::models::{Classification, SessionMode, SessionStatus, SessionSummary, StartRequest};
use bainoculars_lib::persistence::DiskSnapshotStore;
use bainoculars_lib::presentation::Presenter;
use bainoculars_lib::session::FrameUpdate;
use bainoculars_lib::settings::{DetectionSettings, DwellWindow, PersistPolicy};

struct StillCamera;

impl FrameSource for StillCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(Some(Frame {
            image: DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
            captured_at: Utc::now(),
        }))
    }
}

/// A camera that never has a frame ready.
struct BlankCamera;

impl FrameSource for BlankCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(None)
    }
}

/// Answers from a script, one entry per call, then "nothing" forever.
struct ScriptedClassifier {
    script: Mutex<VecDeque<Option<Classification>>>,
    delay: Duration,
}

impl ScriptedClassifier {
    fn new(labels: &[&str], delay: Duration) -> Self {
        Self {
            script: Mutex::new(
                labels
                    .iter()
                    .map(|label| Some(Classification::new(*label, 0.9)))
                    .collect(),
            ),
            delay,
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, _image: &DynamicImage) -> Result<Option<Classification>> {
        std::thread::sleep(self.delay);
        let mut script = self.script.lock().expect("script lock");
        Ok(script.pop_front().flatten())
    }
}

#[derive(Clone, Default)]
struct Recorded {
    frames: Arc<Mutex<Vec<FrameUpdate>>>,
    summaries: Arc<Mutex<Vec<SessionSummary>>>,
}

impl Recorded {
    fn frames(&self) -> Vec<FrameUpdate> {
        self.frames.lock().expect("frames lock").clone()
    }

    fn summaries(&self) -> Vec<SessionSummary> {
        self.summaries.lock().expect("summaries lock").clone()
    }
}

struct RecordingPresenter(Recorded);

impl Presenter for RecordingPresenter {
    fn render_frame(&mut self, update: &FrameUpdate) {
        self.0.frames.lock().expect("frames lock").push(update.clone());
    }

    fn render_summary(&mut self, summary: &SessionSummary) {
        self.0.summaries.lock().expect("summaries lock").push(summary.clone());
    }
}

struct Harness {
    engine: EngineHandle,
    db: Database,
    recorded: Recorded,
    capture_dir: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn harness(
    classifier: ScriptedClassifier,
    dwell_frames: u32,
    policy: PersistPolicy,
    classify_timeout: Duration,
) -> Harness {
    harness_with_camera(Box::new(StillCamera), classifier, dwell_frames, policy, classify_timeout)
}

fn harness_with_camera(
    camera: Box<dyn FrameSource>,
    classifier: ScriptedClassifier,
    dwell_frames: u32,
    policy: PersistPolicy,
    classify_timeout: Duration,
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("history.sqlite3")).expect("db");
    let capture_dir = dir.path().join("captured_birds");
    let snapshots = DiskSnapshotStore::new(capture_dir.clone()).expect("snapshots");
    let recorded = Recorded::default();

    let config = EngineConfig {
        detection: DetectionSettings {
            dwell: DwellWindow::Frames(dwell_frames),
            ..DetectionSettings::default()
        },
        persist_policy: policy,
        frame_interval: Duration::from_millis(5),
        classify_timeout,
    };

    let engine = EngineHandle::spawn(
        config,
        EngineParts {
            camera,
            classifier: Arc::new(classifier),
            snapshots: Arc::new(snapshots),
            presenter: Box::new(RecordingPresenter(recorded.clone())),
            db: db.clone(),
        },
    );

    Harness {
        engine,
        db,
        recorded,
        capture_dir,
        _dir: dir,
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

const SCENARIO: [&str; 7] = ["ROBIN", "ROBIN", "ROBIN", "CROW", "ROBIN", "ROBIN", "ROBIN"];

async fn run_explore_scenario(policy: PersistPolicy) -> (Harness, String) {
    let h = harness(
        ScriptedClassifier::new(&SCENARIO, Duration::ZERO),
        3,
        policy,
        Duration::from_secs(2),
    );

    let snapshot = h.engine.start(StartRequest::explore()).await.expect("start");
    let session_id = snapshot.session_id.expect("session id");

    let recorded = h.recorded.clone();
    wait_until("scenario frames", || recorded.frames().len() > SCENARIO.len()).await;

    let summary = h.engine.stop().await.expect("stop").expect("summary");
    assert_eq!(summary.species_count, 1);
    assert!(!summary.timed_out);

    (h, session_id)
}

#[tokio::test]
async fn explore_scenario_confirms_robin_twice() {
    let (h, session_id) = run_explore_scenario(PersistPolicy::EverySighting).await;

    let frames = h.recorded.frames();
    let sightings: Vec<_> = frames
        .iter()
        .enumerate()
        .filter_map(|(idx, frame)| {
            frame
                .sighting
                .as_ref()
                .map(|s| (idx + 1, s.label.clone(), frame.novel()))
        })
        .collect();
    assert_eq!(
        sightings,
        vec![
            (3, "ROBIN".to_string(), Some(true)),
            (7, "ROBIN".to_string(), Some(false)),
        ]
    );

    let stored = h.db.get_sightings_for_session(&session_id).await.expect("sightings");
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|s| s.snapshot_path.is_some()));

    let files = std::fs::read_dir(&h.capture_dir).expect("capture dir").count();
    assert_eq!(files, 2);

    let record = h.db.get_session(&session_id).await.expect("record");
    assert_eq!(record.status, RecordStatus::Stopped);
    assert_eq!(record.species_count, 1);

    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn novel_only_policy_saves_one_snapshot() {
    let (h, session_id) = run_explore_scenario(PersistPolicy::NovelOnly).await;

    let stored = h.db.get_sightings_for_session(&session_id).await.expect("sightings");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored.iter().filter(|s| s.snapshot_path.is_some()).count(), 1);

    let files = std::fs::read_dir(&h.capture_dir).expect("capture dir").count();
    assert_eq!(files, 1);

    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn arcade_ends_on_the_clock() {
    let h = harness(
        ScriptedClassifier::new(&["ROBIN", "CROW", "JAY"], Duration::from_millis(20)),
        1,
        PersistPolicy::EverySighting,
        Duration::from_secs(2),
    );

    let duration = Duration::from_millis(800);
    let snapshot = h
        .engine
        .start(StartRequest::arcade(duration))
        .await
        .expect("start");
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.score, Some(0));
    let session_id = snapshot.session_id.expect("session id");

    let recorded = h.recorded.clone();
    wait_until("time up", || !recorded.summaries().is_empty()).await;

    let summaries = h.recorded.summaries();
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert!(summary.timed_out);
    assert_eq!(summary.mode, SessionMode::Arcade);
    assert_eq!(summary.score, 3);
    assert_eq!(summary.species_count, 3);
    assert_eq!(summary.elapsed, duration);

    let status = h.engine.status().await.expect("status");
    assert_eq!(status.status, SessionStatus::Finished);
    assert_eq!(status.remaining, Some(Duration::ZERO));

    // Arcade never writes snapshots.
    let files = std::fs::read_dir(&h.capture_dir).expect("capture dir").count();
    assert_eq!(files, 0);

    let record = h.db.get_session(&session_id).await.expect("record");
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(record.score, 3);

    h.engine.reset().await.expect("reset");
    assert_eq!(
        h.engine.status().await.expect("status").status,
        SessionStatus::Idle
    );

    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn camera_gap_keeps_the_countdown_on_screen() {
    let h = harness_with_camera(
        Box::new(BlankCamera),
        ScriptedClassifier::new(&["ROBIN", "ROBIN", "ROBIN"], Duration::ZERO),
        1,
        PersistPolicy::EverySighting,
        Duration::from_secs(1),
    );

    let duration = Duration::from_millis(300);
    h.engine
        .start(StartRequest::arcade(duration))
        .await
        .expect("start");

    let recorded = h.recorded.clone();
    wait_until("time up without frames", || !recorded.summaries().is_empty()).await;

    let frames = h.recorded.frames();
    assert!(frames.len() >= 2, "expected overlay updates, got {}", frames.len());
    // The classifier is never asked about a frame that does not exist.
    assert!(frames.iter().all(|f| f.current.is_none() && f.sighting.is_none()));
    assert!(frames.iter().all(|f| f.score == Some(0) && f.remaining.is_some()));
    let remaining: Vec<_> = frames.iter().filter_map(|f| f.remaining).collect();
    assert!(remaining.windows(2).all(|pair| pair[1] <= pair[0]));

    let summaries = h.recorded.summaries();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].timed_out);
    assert_eq!(summaries[0].elapsed, duration);
    assert_eq!(summaries[0].score, 0);

    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn oversized_arcade_round_is_refused_and_loop_survives() {
    let h = harness(
        ScriptedClassifier::new(&[], Duration::ZERO),
        3,
        PersistPolicy::EverySighting,
        Duration::from_secs(1),
    );

    let err = h
        .engine
        .start(StartRequest::arcade(Duration::from_secs(u64::MAX)))
        .await
        .expect_err("duration too long");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::DurationTooLong(_))
    ));

    tokio::time::sleep(Duration::from_millis(30)).await;
    let status = h.engine.status().await.expect("frame loop still answers");
    assert_eq!(status.status, SessionStatus::Idle);
    assert!(h.db.list_recent_sessions(10).await.expect("list").is_empty());
    assert!(h.db.get_incomplete_sessions().await.expect("incomplete").is_empty());

    h.engine.start(StartRequest::explore()).await.expect("start after refusal");
    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn stop_does_not_wait_for_slow_classifier() {
    let h = harness(
        ScriptedClassifier::new(&["ROBIN"], Duration::from_millis(600)),
        1,
        PersistPolicy::EverySighting,
        Duration::from_secs(5),
    );

    h.engine.start(StartRequest::explore()).await.expect("start");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let asked = Instant::now();
    let summary = h.engine.stop().await.expect("stop").expect("summary");
    assert!(asked.elapsed() < Duration::from_millis(400));
    assert_eq!(summary.species_count, 0);

    // The aborted classification finishes in the background and is dropped.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(h.recorded.frames().is_empty());
    let status = h.engine.status().await.expect("status");
    assert_eq!(status.status, SessionStatus::Finished);
    assert_eq!(status.species_count, 0);

    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn slow_classifier_counts_as_no_detection() {
    let h = harness(
        ScriptedClassifier::new(&["ROBIN", "ROBIN"], Duration::from_millis(100)),
        1,
        PersistPolicy::EverySighting,
        Duration::from_millis(10),
    );

    h.engine.start(StartRequest::explore()).await.expect("start");
    let recorded = h.recorded.clone();
    wait_until("timed-out frames", || recorded.frames().len() >= 2).await;

    let frames = h.recorded.frames();
    assert!(frames.iter().take(2).all(|f| f.current.is_none() && !f.detected));

    h.engine.stop().await.expect("stop");
    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn misuse_is_reported_and_harmless() {
    let h = harness(
        ScriptedClassifier::new(&[], Duration::ZERO),
        3,
        PersistPolicy::EverySighting,
        Duration::from_secs(1),
    );

    assert!(h.engine.stop().await.expect("stop").is_none());

    let first = h.engine.start(StartRequest::explore()).await.expect("start");
    let err = h
        .engine
        .start(StartRequest::arcade(Duration::from_secs(30)))
        .await
        .expect_err("second start");
    assert_eq!(
        err.downcast_ref::<SessionError>(),
        Some(&SessionError::AlreadyRunning(SessionMode::Explore))
    );

    let err = h.engine.reset().await.expect_err("reset while running");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::InvalidTransition { action: "reset", .. })
    ));

    let status = h.engine.status().await.expect("status");
    assert_eq!(status.session_id, first.session_id);
    assert_eq!(status.mode, Some(SessionMode::Explore));
    assert_eq!(status.status, SessionStatus::Running);

    h.engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shutdown_records_running_session() {
    let h = harness(
        ScriptedClassifier::new(&[], Duration::ZERO),
        3,
        PersistPolicy::EverySighting,
        Duration::from_secs(1),
    );

    let snapshot = h.engine.start(StartRequest::explore()).await.expect("start");
    let session_id = snapshot.session_id.expect("session id");
    let db = h.db.clone();
    let recorded = h.recorded.clone();

    h.engine.shutdown().await.expect("shutdown");

    assert_eq!(recorded.summaries().len(), 1);
    let record = db.get_session(&session_id).await.expect("record");
    assert_eq!(record.status, RecordStatus::Stopped);
    assert!(db.get_incomplete_sessions().await.expect("incomplete").is_empty());
}
