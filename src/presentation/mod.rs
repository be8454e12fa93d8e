pub mod overlay;

use std::io::Write;

use crate::audio::ChimeHandle;
use crate::models::SessionSummary;
use crate::session::FrameUpdate;

/// Display collaborator. The frame loop calls `render_frame` after every
/// processed frame and `render_summary` once when a session finishes.
pub trait Presenter: Send + 'static {
    fn render_frame(&mut self, update: &FrameUpdate);
    fn render_summary(&mut self, summary: &SessionSummary);
}

/// Single status line rewritten in place, plus a chime for new species.
pub struct TerminalPresenter<W: Write + Send + 'static> {
    out: W,
    chime: ChimeHandle,
    last_line: String,
}

impl<W: Write + Send + 'static> TerminalPresenter<W> {
    pub fn new(out: W, chime: ChimeHandle) -> Self {
        Self {
            out,
            chime,
            last_line: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> Presenter for TerminalPresenter<W> {
    fn render_frame(&mut self, update: &FrameUpdate) {
        if update.novel() == Some(true) {
            if let Err(err) = self.chime.play_novel() {
                log::warn!("failed to play chime: {err}");
            }
        }

        let line = overlay::frame_text(update);
        if line == self.last_line {
            return;
        }
        // Pad so a shorter line fully covers the previous one.
        let width = self.last_line.chars().count().max(line.chars().count());
        let _ = write!(self.out, "\r{line:<width$}");
        let _ = self.out.flush();
        self.last_line = line;
    }

    fn render_summary(&mut self, summary: &SessionSummary) {
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "{}", overlay::summary_text(summary));
        let _ = self.out.flush();
        self.last_line.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, SessionMode, SessionStatus};
    use std::time::Duration;

    fn frame(label: &str) -> FrameUpdate {
        FrameUpdate {
            session_id: Some("s".into()),
            status: SessionStatus::Running,
            mode: Some(SessionMode::Explore),
            current: Some(Classification::new(label, 0.9)),
            detected: true,
            remaining: None,
            score: None,
            sighting: None,
            outcome: None,
            summary: None,
        }
    }

    #[test]
    fn repeated_frames_are_written_once() {
        let mut presenter = TerminalPresenter::new(Vec::new(), ChimeHandle::new(false));
        presenter.render_frame(&frame("ROBIN"));
        presenter.render_frame(&frame("ROBIN"));
        presenter.render_frame(&frame("CROW"));

        let written = String::from_utf8(presenter.into_inner()).expect("utf8");
        assert_eq!(written.matches("ROBIN").count(), 1);
        assert_eq!(written.matches("CROW").count(), 1);
    }

    #[test]
    fn summary_ends_the_status_line() {
        let mut presenter = TerminalPresenter::new(Vec::new(), ChimeHandle::new(false));
        presenter.render_frame(&frame("ROBIN"));
        presenter.render_summary(&SessionSummary {
            session_id: "s".into(),
            mode: SessionMode::Arcade,
            species_count: 2,
            score: 2,
            elapsed: Duration::from_secs(60),
            timed_out: true,
        });

        let written = String::from_utf8(presenter.into_inner()).expect("utf8");
        assert!(written.ends_with("\nTime's Up! Final Score: 2\n"));
    }
}
