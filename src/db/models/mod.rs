pub mod session;
pub mod sighting;

pub use session::{RecordStatus, SessionRecord};
pub use sighting::SightingRecord;
