//! Room service integration.
//!
//! The real-time transport stays external. The worker touches it through two
//! narrow surfaces: a WebSocket signal connection per room (participant and
//! lifecycle events) and the HTTP control plane (room deletion, recording
//! egress). Both sit behind traits so sessions can run against in-memory
//! fakes in tests.

pub mod control;
pub mod signal;

pub use control::{EgressRequest, RoomControlClient};
pub use signal::SignalTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use control::EgressInfo;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid room service URL: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("room service returned {status}: {body}")]
    Service {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid signal payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("connection closed before a participant joined")]
    ClosedWhileWaiting,
    #[error("timed out waiting for a participant to join")]
    JoinTimeout,
}

/// A remote participant as announced by the signal connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identity, an email address for interview candidates
    pub identity: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSubscribe {
    AudioOnly,
    All,
}

impl AutoSubscribe {
    pub(crate) fn as_query_value(self) -> &'static str {
        match self {
            AutoSubscribe::AudioOnly => "audio",
            AutoSubscribe::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub auto_subscribe: AutoSubscribe,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            auto_subscribe: AutoSubscribe::AudioOnly,
        }
    }
}

/// Opens signal connections to rooms.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    async fn connect(
        &self,
        room: &str,
        opts: ConnectOptions,
    ) -> Result<Box<dyn RoomConnection>, RoomError>;
}

/// One established room connection, owned by a single session.
#[async_trait]
pub trait RoomConnection: Send {
    fn room_name(&self) -> &str;

    /// Block until a remote participant joins.
    async fn wait_for_participant(&mut self) -> Result<Participant, RoomError>;

    /// Resolves once the room service announces the room is closing, or the
    /// connection is lost. Used to cancel the delayed shutdown.
    async fn closed(&mut self);

    /// End this session's presence in the room.
    async fn shutdown(&mut self, reason: &str) -> Result<(), RoomError>;
}

/// Server-side room operations.
#[async_trait]
pub trait RoomControl: Send + Sync {
    /// Delete the room. Idempotent on the service side, so a duplicate
    /// delete after a lost timer race is harmless.
    async fn delete_room(&self, room: &str) -> Result<(), RoomError>;

    async fn start_room_composite_egress(
        &self,
        req: &EgressRequest,
    ) -> Result<EgressInfo, RoomError>;
}
