//! Interview session lifecycle.

pub mod controller;
pub mod shutdown;

pub use controller::{SessionController, SessionDeps, SessionPolicy};
pub use shutdown::{ShutdownHandle, ShutdownTimer};

use crate::room::Participant;

/// One job handed to the worker by the dispatch socket.
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub room_name: String,
}

/// Terminal result of a session's start sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The agent is running; the session ends later via the delayed
    /// shutdown or a room-closing event.
    Completed {
        room: String,
        participant: Participant,
        started_at: chrono::DateTime<chrono::Utc>,
    },
    /// The candidate was over the usage limit and the session ended before
    /// the agent started.
    Rejected { identity: String },
}
