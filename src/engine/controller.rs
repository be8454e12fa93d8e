use anyhow::{anyhow, Context, Result};
use log::info;
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::camera::FrameSource;
use crate::db::Database;
use crate::detection::Classifier;
use crate::models::{SessionSummary, StartRequest};
use crate::persistence::SnapshotSink;
use crate::presentation::Presenter;
use crate::session::SessionSnapshot;
use crate::settings::{DetectionSettings, PersistPolicy, Settings};

use super::loop_worker::{frame_loop, EngineCommand};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub detection: DetectionSettings,
    pub persist_policy: PersistPolicy,
    pub frame_interval: Duration,
    pub classify_timeout: Duration,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            detection: settings.detection.clone(),
            persist_policy: settings.explore.persist_policy,
            frame_interval: settings.camera.frame_interval(),
            classify_timeout: settings.classifier.timeout(),
        }
    }
}

/// The collaborators the frame loop drives.
pub struct EngineParts {
    pub camera: Box<dyn FrameSource>,
    pub classifier: Arc<dyn Classifier>,
    pub snapshots: Arc<dyn SnapshotSink>,
    pub presenter: Box<dyn Presenter>,
    pub db: Database,
}

/// Handle to the frame loop task, which is the only owner of the session
/// state. Every method is a request/reply round trip over a channel.
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Spawn the frame loop on the current tokio runtime.
    pub fn spawn(config: EngineConfig, parts: EngineParts) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(frame_loop(config, parts, command_rx, cancel_token.clone()));

        Self {
            commands: command_tx,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub async fn start(&self, request: StartRequest) -> Result<SessionSnapshot> {
        let snapshot = self
            .request(|reply| EngineCommand::Start { request, reply })
            .await??;
        Ok(snapshot)
    }

    /// Stop the running session. `None` when nothing was running.
    pub async fn stop(&self) -> Result<Option<SessionSummary>> {
        self.request(|reply| EngineCommand::Stop { reply }).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Reset { reply }).await??;
        Ok(())
    }

    pub async fn status(&self) -> Result<SessionSnapshot> {
        self.request(|reply| EngineCommand::Status { reply }).await
    }

    /// Stop any running session, then wait for the frame loop to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel_token.cancel();

        if let Some(handle) = self.handle.take() {
            handle.await.context("frame loop task failed to join")?;
        }
        info!("Frame loop stopped");
        Ok(())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| anyhow!("frame loop is not running"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("frame loop dropped the request"))
    }
}
