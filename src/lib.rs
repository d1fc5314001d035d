//! Voice interview automation.
//!
//! Two entry points share this library: the long-running interview worker
//! (`intervue`), which accepts room jobs from the room service and drives one
//! scripted interview session per job, and the standalone candidate sync job
//! (`sync_candidates`), which merges applicant lists from two tracking
//! tenants into the shared candidate table.

pub mod agent;
pub mod limiter;
pub mod room;
pub mod script;
pub mod session;
pub mod settings;
pub mod sync;
pub mod table;
pub mod worker;

pub use session::{SessionController, SessionJob, SessionOutcome};
pub use settings::Settings;
