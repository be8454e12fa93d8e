pub mod audio;
pub mod camera;
pub mod db;
pub mod detection;
pub mod engine;
pub mod error;
pub mod models;
pub mod persistence;
pub mod presentation;
pub mod session;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use audio::ChimeHandle;
use camera::DirectoryCamera;
use db::Database;
use detection::CommandClassifier;
use engine::{EngineConfig, EngineHandle, EngineParts};
use persistence::DiskSnapshotStore;
use presentation::{overlay, TerminalPresenter};
use session::{commands::HELP, parse_command, ConsoleCommand};
use settings::{ChimeSettings, SettingsStore};

const DATA_DIR_ENV: &str = "BAINOCULARS_DATA_DIR";
const DEBUG_ENV: &str = "BAINOCULARS_DEBUG";
const DEFAULT_DATA_DIR: &str = "bainoculars-data";
const HISTORY_LIMIT: usize = 10;

pub(crate) struct AppState {
    engine: EngineHandle,
    db: Database,
    settings: SettingsStore,
    chime: ChimeHandle,
    default_arcade_secs: u64,
}

impl AppState {
    /// Run one console command. Errors are for the operator, not fatal.
    async fn dispatch(&self, command: ConsoleCommand) -> Result<()> {
        match command {
            ConsoleCommand::Start(request) => {
                let snapshot = self.engine.start(request).await?;
                println!("{}", overlay::status_text(&snapshot));
            }
            ConsoleCommand::Stop => {
                if self.engine.stop().await?.is_none() {
                    println!("No session is running");
                }
            }
            ConsoleCommand::Reset => {
                self.engine.reset().await?;
                println!("{}", overlay::status_text(&self.engine.status().await?));
            }
            ConsoleCommand::Status => {
                println!("{}", overlay::status_text(&self.engine.status().await?));
            }
            ConsoleCommand::History => {
                let sessions = self.db.list_recent_sessions(HISTORY_LIMIT).await?;
                if sessions.is_empty() {
                    println!("No sessions recorded yet");
                }
                for record in &sessions {
                    println!("{}", overlay::history_line(record));
                }
            }
            ConsoleCommand::Chime(enabled) => {
                self.settings.update_chime(ChimeSettings { enabled })?;
                self.chime.set_enabled(enabled);
                println!("Chime {}", if enabled { "on" } else { "off" });
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }
}

pub fn run() -> Result<()> {
    utils::logging::init(env_flag(DEBUG_ENV));

    info!("bAInoculars starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bainoculars-worker")
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run_console())
}

async fn run_console() -> Result<()> {
    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    let settings = settings_store.snapshot();
    if let Err(err) = settings.detection.validate() {
        warn!("Detection settings are invalid ({err}); sessions will not start until fixed");
    }

    let database = Database::new(data_dir.join("bainoculars.sqlite3"))?;
    recover_interrupted_sessions(&database).await?;

    let frame_dir = resolve(&data_dir, &settings.camera.frame_dir);
    let camera = DirectoryCamera::open(&frame_dir, settings.camera.looping)?;
    info!("Replaying {} frames from {}", camera.len(), frame_dir.display());

    let snapshots = DiskSnapshotStore::new(resolve(&data_dir, &settings.explore.capture_dir))?;
    info!("Explore snapshots go to {}", snapshots.dir().display());
    let chime = ChimeHandle::new(settings.chime.enabled);

    let engine = EngineHandle::spawn(
        EngineConfig::from_settings(&settings),
        EngineParts {
            camera: Box::new(camera),
            classifier: Arc::new(CommandClassifier::new(&settings.classifier)),
            snapshots: Arc::new(snapshots),
            presenter: Box::new(TerminalPresenter::new(std::io::stdout(), chime.clone())),
            db: database.clone(),
        },
    );

    let state = AppState {
        engine,
        db: database,
        settings: settings_store,
        chime,
        default_arcade_secs: settings.arcade.default_duration_secs,
    };

    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read console input")?
    {
        match parse_command(&line, state.default_arcade_secs) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = state.dispatch(command).await {
                    println!("{err}");
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    state.engine.shutdown().await
}

/// Sessions left `Running` by a previous process never got a summary.
async fn recover_interrupted_sessions(db: &Database) -> Result<()> {
    let now = Utc::now();
    for session in db.get_incomplete_sessions().await? {
        warn!(
            "Recovered incomplete session {}; marking as Interrupted",
            session.id
        );
        db.mark_session_interrupted(&session.id, now).await?;
    }
    Ok(())
}

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Relative settings paths live under the data directory.
fn resolve(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
