use std::time::Duration;

use crate::db::SessionRecord;
use crate::models::{SessionMode, SessionStatus, SessionSummary};
use crate::session::{FrameUpdate, SessionSnapshot};

/// Label line drawn over the live frame.
pub fn label_text(update: &FrameUpdate) -> String {
    match update.current.as_ref().filter(|_| update.detected) {
        Some(current) => format!("Identified: {} ({}%)", current.label, current.percent()),
        None => "No bird identified".to_string(),
    }
}

/// Countdown and score line for Arcade mode.
pub fn arcade_info_text(remaining: Duration, score: u32) -> String {
    format!("Time Left: {}s   Score: {}", remaining.as_secs(), score)
}

/// The whole per-frame overlay, one line.
pub fn frame_text(update: &FrameUpdate) -> String {
    let mut text = label_text(update);

    if let (Some(remaining), Some(score)) = (update.remaining, update.score) {
        text.push_str("   ");
        text.push_str(&arcade_info_text(remaining, score));
    }

    if let (Some(true), Some(sighting)) = (update.novel(), update.sighting.as_ref()) {
        text.push_str(&format!("   NEW: {}!", sighting.label));
    }

    text
}

/// Terminal display for a finished session.
pub fn summary_text(summary: &SessionSummary) -> String {
    match summary.mode {
        SessionMode::Arcade if summary.timed_out => {
            format!("Time's Up! Final Score: {}", summary.score)
        }
        SessionMode::Arcade => format!(
            "Game Over! Final Score: {} ({} played)",
            summary.score,
            clock(summary.elapsed)
        ),
        SessionMode::Explore => format!(
            "Explore finished: {} species in {}",
            summary.species_count,
            clock(summary.elapsed)
        ),
    }
}

/// Answer to the `status` console command.
pub fn status_text(snapshot: &SessionSnapshot) -> String {
    let Some(mode) = snapshot.mode else {
        return "Idle. Start with 'explore' or 'arcade [seconds]'".to_string();
    };

    let mut text = format!(
        "{} {}: {} species, {} elapsed",
        mode,
        snapshot.status,
        snapshot.species_count,
        clock(snapshot.elapsed)
    );
    if let (Some(remaining), Some(score)) = (snapshot.remaining, snapshot.score) {
        text.push_str("   ");
        text.push_str(&arcade_info_text(remaining, score));
    }
    if snapshot.status == SessionStatus::Finished {
        text.push_str("   (type 'reset' to return to the menu)");
    }
    text
}

/// One row of the `history` listing.
pub fn history_line(record: &SessionRecord) -> String {
    let mut line = format!(
        "{}  {:<7} {:<11} {} species  {}",
        record.started_at.format("%Y-%m-%d %H:%M"),
        record.mode.as_str(),
        record.status.as_str(),
        record.species_count,
        clock(Duration::from_millis(record.elapsed_ms))
    );
    if record.mode == SessionMode::Arcade {
        line.push_str(&format!("  score {}", record.score));
    }
    line
}

fn clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
