use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::camera::{Frame, FrameSource};
use crate::db::{Database, SessionRecord, SightingRecord};
use crate::detection::Classifier;
use crate::error::SessionError;
use crate::models::{Classification, SessionSummary, StartRequest};
use crate::persistence::SnapshotSink;
use crate::presentation::Presenter;
use crate::session::{FrameUpdate, SessionController, SessionSnapshot};

use super::controller::{EngineConfig, EngineParts};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

type SharedCamera = Arc<Mutex<Box<dyn FrameSource>>>;

pub(super) enum EngineCommand {
    Start {
        request: StartRequest,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<Option<SessionSummary>>,
    },
    Reset {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Status {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Result of one capture + classify round, tagged with the session it was
/// started for.
struct CaptureOutcome {
    session_id: String,
    frame: Option<Arc<Frame>>,
    classification: Option<Classification>,
}

struct FrameWorker {
    controller: SessionController,
    camera: SharedCamera,
    classifier: Arc<dyn Classifier>,
    snapshots: Arc<dyn SnapshotSink>,
    presenter: Box<dyn Presenter>,
    db: Database,
    classify_timeout: Duration,
    in_flight: Option<JoinHandle<CaptureOutcome>>,
}

pub(super) async fn frame_loop(
    config: EngineConfig,
    parts: EngineParts,
    mut commands: mpsc::Receiver<EngineCommand>,
    cancel_token: CancellationToken,
) {
    let EngineParts {
        camera,
        classifier,
        snapshots,
        presenter,
        db,
    } = parts;

    let mut worker = FrameWorker {
        controller: SessionController::new(config.detection.clone(), config.persist_policy),
        camera: Arc::new(Mutex::new(camera)),
        classifier,
        snapshots,
        presenter,
        db,
        classify_timeout: config.classify_timeout,
        in_flight: None,
    };

    let mut ticker = tokio::time::interval(config.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "frame loop running (interval={}ms, classifier timeout={}ms)",
        config.frame_interval.as_millis(),
        config.classify_timeout.as_millis()
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("frame loop shutting down");
                worker.stop_session().await;
                break;
            }
            command = commands.recv() => match command {
                Some(command) => worker.handle_command(command).await,
                None => {
                    log_info!("engine handle dropped; frame loop exiting");
                    worker.stop_session().await;
                    break;
                }
            },
            joined = join_in_flight(&mut worker.in_flight) => {
                worker.in_flight = None;
                match joined {
                    Ok(outcome) => worker.process(outcome).await,
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => log_error!("capture task failed: {err}"),
                }
            }
            _ = ticker.tick() => worker.on_tick().await,
        }
    }
}

/// Resolves when the in-flight capture finishes; pending forever when idle.
async fn join_in_flight(
    in_flight: &mut Option<JoinHandle<CaptureOutcome>>,
) -> Result<CaptureOutcome, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl FrameWorker {
    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Start { request, reply } => {
                let result = self.start_session(request).await;
                let _ = reply.send(result);
            }
            EngineCommand::Stop { reply } => {
                let summary = self.stop_session().await;
                let _ = reply.send(summary);
            }
            EngineCommand::Reset { reply } => {
                let _ = reply.send(self.controller.reset());
            }
            EngineCommand::Status { reply } => {
                let now = Instant::now();
                if let Some(summary) = self.controller.expire(now) {
                    self.abort_in_flight();
                    self.finalize(summary).await;
                }
                let _ = reply.send(self.controller.snapshot(now));
            }
        }
    }

    async fn start_session(
        &mut self,
        request: StartRequest,
    ) -> Result<SessionSnapshot, SessionError> {
        let started_at = Utc::now();
        let now = Instant::now();
        let session = self.controller.start(request, started_at, now)?;
        let record = SessionRecord::started(
            session.id.clone(),
            session.mode,
            session
                .duration
                .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
            started_at,
        );

        log_info!("session {} started in {} mode", record.id, record.mode);

        // Anything still running belongs to a session that no longer exists.
        self.abort_in_flight();

        if let Err(err) = self.db.insert_session(&record).await {
            log_error!("failed to record session {}: {err:?}", record.id);
        }

        Ok(self.controller.snapshot(now))
    }

    /// Halt frame intake and finish the running session, if any. The
    /// in-flight capture is aborted and whatever it would have produced is
    /// never seen.
    async fn stop_session(&mut self) -> Option<SessionSummary> {
        self.abort_in_flight();
        let summary = self.controller.stop(Instant::now())?;
        self.finalize(summary.clone()).await;
        Some(summary)
    }

    async fn on_tick(&mut self) {
        if let Some(summary) = self.controller.expire(Instant::now()) {
            self.abort_in_flight();
            self.finalize(summary).await;
            return;
        }

        if self.in_flight.is_some() {
            return;
        }
        let Some(session_id) = self.controller.running_session_id().map(str::to_string) else {
            return;
        };
        self.in_flight = Some(self.spawn_capture(session_id));
    }

    fn spawn_capture(&self, session_id: String) -> JoinHandle<CaptureOutcome> {
        let camera = Arc::clone(&self.camera);
        let classifier = Arc::clone(&self.classifier);
        let classify_timeout = self.classify_timeout;

        tokio::spawn(async move {
            let frame = match tokio::task::spawn_blocking(move || read_frame(&camera)).await {
                Ok(Ok(frame)) => frame.map(Arc::new),
                Ok(Err(err)) => {
                    log_warn!("camera read failed: {err:?}");
                    None
                }
                Err(err) => {
                    log_error!("camera worker join failed: {err}");
                    None
                }
            };

            let classification = match &frame {
                Some(frame) => {
                    classify_frame(classifier, Arc::clone(frame), classify_timeout).await
                }
                None => None,
            };

            CaptureOutcome {
                session_id,
                frame,
                classification,
            }
        })
    }

    async fn process(&mut self, outcome: CaptureOutcome) {
        let now = Instant::now();

        if self.controller.running_session_id() != Some(outcome.session_id.as_str()) {
            log_debug!("discarding frame result from session {}", outcome.session_id);
            return;
        }

        let Some(frame) = outcome.frame else {
            // Camera gap: keep the overlay and countdown moving.
            let update = self.controller.refresh(now);
            self.presenter.render_frame(&update);
            if let Some(summary) = update.summary {
                self.finalize(summary).await;
            }
            return;
        };

        match &outcome.classification {
            Some(classification) => log_debug!(
                "frame: {} ({:.3})",
                classification.label,
                classification.confidence
            ),
            None => log_debug!("frame: no prediction"),
        }

        let update = self.controller.tick(outcome.classification.as_ref(), now);
        self.presenter.render_frame(&update);

        if update.sighting.is_some() {
            self.record_sighting(&update, frame).await;
        }

        if let Some(summary) = update.summary {
            self.finalize(summary).await;
        }
    }

    async fn record_sighting(&mut self, update: &FrameUpdate, frame: Arc<Frame>) {
        let (Some(session_id), Some(sighting)) = (&update.session_id, &update.sighting) else {
            return;
        };
        let novel = update.novel().unwrap_or(false);

        log_info!(
            "sighting {} ({:.0}%){}",
            sighting.label,
            sighting.confidence * 100.0,
            if novel { " [new species]" } else { "" }
        );

        let record = SightingRecord {
            id: None,
            session_id: session_id.clone(),
            label: sighting.label.clone(),
            confidence: f64::from(sighting.confidence),
            novel,
            observed_at: frame.captured_at,
            snapshot_path: None,
        };

        let sighting_id = match self.db.insert_sighting(&record).await {
            Ok(id) => Some(id),
            Err(err) => {
                log_error!("failed to record sighting {}: {err:?}", record.label);
                None
            }
        };

        if !update.should_persist() {
            return;
        }

        match self.save_snapshot(frame, record.label.clone()).await {
            Ok(path) => {
                log_info!("saved snapshot {}", path.display());
                if let Some(id) = sighting_id {
                    let path = path.to_string_lossy();
                    if let Err(err) = self.db.set_sighting_snapshot(id, &path).await {
                        log_error!("failed to link snapshot to sighting {id}: {err:?}");
                    }
                }
            }
            Err(err) => log_error!("failed to save snapshot for {}: {err:?}", record.label),
        }
    }

    async fn save_snapshot(&mut self, frame: Arc<Frame>, label: String) -> Result<PathBuf> {
        let sink = Arc::clone(&self.snapshots);
        tokio::task::spawn_blocking(move || sink.save(&frame.image, &label, frame.captured_at))
            .await
            .context("snapshot worker join failed")?
    }

    async fn finalize(&mut self, summary: SessionSummary) {
        log_info!(
            "session {} finished: {} species, score {}, {}s{}",
            summary.session_id,
            summary.species_count,
            summary.score,
            summary.elapsed.as_secs(),
            if summary.timed_out { " (time up)" } else { "" }
        );

        if let Err(err) = self.db.finish_session(&summary, Utc::now()).await {
            log_error!("failed to record end of session {}: {err:?}", summary.session_id);
        }
        self.presenter.render_summary(&summary);
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

fn read_frame(camera: &SharedCamera) -> Result<Option<Frame>> {
    let mut guard = camera
        .lock()
        .map_err(|_| anyhow!("camera lock poisoned"))?;
    guard.next_frame()
}

/// Failures and timeouts both count as "no detection" for this frame.
async fn classify_frame(
    classifier: Arc<dyn Classifier>,
    frame: Arc<Frame>,
    limit: Duration,
) -> Option<Classification> {
    let task = tokio::task::spawn_blocking(move || classifier.classify(&frame.image));

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(Ok(classification))) => classification,
        Ok(Ok(Err(err))) => {
            log_warn!("classifier failed: {err:?}");
            None
        }
        Ok(Err(err)) => {
            log_error!("classifier worker join failed: {err}");
            None
        }
        Err(_) => {
            log_warn!("classifier timed out after {}ms", limit.as_millis());
            None
        }
    }
}
