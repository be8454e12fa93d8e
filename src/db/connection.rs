use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const DB_THREAD_NAME: &str = "bainoculars-db";

type HistoryJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum HistoryRequest {
    Run(HistoryJob),
    Close,
}

struct HistoryWorker {
    requests: mpsc::Sender<HistoryRequest>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for HistoryWorker {
    fn drop(&mut self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        if self.requests.send(HistoryRequest::Close).is_err() {
            warn!("History thread already gone at close");
        }
        if handle.join().is_err() {
            error!("History thread panicked");
        }
    }
}

/// Session and sighting history.
///
/// The frame loop and the console both hold clones. Every query runs on the
/// single `bainoculars-db` thread that owns the SQLite connection, so sightings
/// land in the order the frame loop confirmed them.
#[derive(Clone)]
pub struct Database {
    worker: Arc<HistoryWorker>,
}

impl Database {
    /// Open (or create) the history file and bring its schema up to date.
    /// Returns only after the worker thread has finished migrating.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }

        let (request_tx, request_rx) = mpsc::channel::<HistoryRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_path = db_path.clone();

        let handle = thread::Builder::new()
            .name(DB_THREAD_NAME.into())
            .spawn(move || {
                let mut conn = match open_history(&thread_path) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for request in request_rx {
                    match request {
                        HistoryRequest::Run(job) => job(&mut conn),
                        HistoryRequest::Close => break,
                    }
                }
                info!("History thread closed");
            })
            .context("failed to spawn history thread")?;

        ready_rx
            .recv()
            .context("history thread exited during startup")??;

        info!("Session history at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(HistoryWorker {
                requests: request_tx,
                thread: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Run `job` against the connection on the history thread.
    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let request = HistoryRequest::Run(Box::new(move |conn| {
            // The caller may have been cancelled (frame loop abort); nothing to do then.
            let _ = reply_tx.send(job(conn));
        }));

        self.worker
            .requests
            .send(request)
            .map_err(|_| anyhow!("history thread is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("history thread dropped the request"))?
    }
}

fn open_history(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open history database {}", path.display()))?;

    // Sighting writes come in bursts while a session runs.
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL unavailable for history database: {err}");
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    run_migrations(&mut conn).context("failed to migrate history database")?;
    Ok(conn)
}
