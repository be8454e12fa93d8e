//! Audible emphasis for novel sightings.
//!
//! Playback lives on its own thread because rodio's output stream is not
//! `Send`. Without the `chime` feature the handle keeps its on/off state but
//! plays nothing.

#[cfg(feature = "chime")]
mod chime;

use log::debug;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[cfg(feature = "chime")]
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};

#[cfg(feature = "chime")]
enum ChimeCommand {
    Play,
}

#[derive(Clone)]
pub struct ChimeHandle {
    enabled: Arc<AtomicBool>,
    #[cfg(feature = "chime")]
    tx: Arc<Mutex<Option<Sender<ChimeCommand>>>>,
}

impl ChimeHandle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
            #[cfg(feature = "chime")]
            tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn play_novel(&self) -> Result<(), String> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.send_play()
    }

    #[cfg(not(feature = "chime"))]
    fn send_play(&self) -> Result<(), String> {
        debug!("chime requested but audio support is not compiled in");
        Ok(())
    }

    #[cfg(feature = "chime")]
    fn send_play(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(ChimeCommand::Play).map_err(|e| e.to_string())
    }

    #[cfg(feature = "chime")]
    fn ensure_thread(&self) -> Result<Sender<ChimeCommand>, String> {
        use rodio::{OutputStream, Sink};
        use std::thread;

        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<ChimeCommand>();

        thread::Builder::new()
            .name("chime".to_string())
            .spawn(move || {
                let (_stream, sink) = match OutputStream::try_default()
                    .map_err(|e| e.to_string())
                    .and_then(|(stream, handle)| {
                        Sink::try_new(&handle)
                            .map(|sink| (stream, sink))
                            .map_err(|e| e.to_string())
                    }) {
                    Ok(pair) => pair,
                    Err(err) => {
                        log::warn!("audio output unavailable, chime disabled: {err}");
                        return;
                    }
                };

                while let Ok(ChimeCommand::Play) = rx.recv() {
                    sink.append(chime::Chirp::new());
                }
                debug!("chime thread shutting down");
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}
