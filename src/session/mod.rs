pub mod commands;
pub mod controller;
pub mod state;
pub mod tracker;

pub use commands::{parse_command, ConsoleCommand};
pub use controller::{FrameUpdate, SessionController, SessionSnapshot};
pub use state::Session;
pub use tracker::{Novelty, NoveltyTracker, TrackOutcome};
