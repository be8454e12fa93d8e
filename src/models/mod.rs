pub mod session;
pub mod sighting;

pub use session::{SessionMode, SessionStatus, SessionSummary, StartRequest};
pub use sighting::{Classification, Sighting};
