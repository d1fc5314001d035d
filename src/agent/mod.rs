//! Conversational engine integration.
//!
//! The speech/LLM engine is external. A session hands it an `AgentConfig`
//! built from the interview script, the scripted opening turn, and the room
//! binding; everything after the first reply request is turn-taking between
//! the engine and the participant.

pub mod realtime;

pub use realtime::RealtimeEngine;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::room::Participant;
use crate::script::{InterviewScript, TurnDetection};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid engine URL: {0}")]
    InvalidUrl(String),
    #[error("invalid engine payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Audio,
    Text,
}

/// Server-side voice-activity turn detection.
#[derive(Debug, Clone, Serialize)]
pub struct ServerVad {
    #[serde(rename = "type")]
    kind: &'static str,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl From<TurnDetection> for ServerVad {
    fn from(td: TurnDetection) -> Self {
        Self {
            kind: "server_vad",
            threshold: td.threshold,
            prefix_padding_ms: td.prefix_padding_ms,
            silence_duration_ms: td.silence_duration_ms,
        }
    }
}

/// Engine session configuration sent with `session.update`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub instructions: String,
    pub modalities: Vec<Modality>,
    pub voice: String,
    pub turn_detection: ServerVad,
}

impl AgentConfig {
    pub fn from_script(script: &InterviewScript) -> Self {
        Self {
            instructions: script.instructions.clone(),
            modalities: vec![Modality::Audio, Modality::Text],
            voice: script.voice.clone(),
            turn_detection: script.turn_detection.into(),
        }
    }
}

/// Starts engine sessions bound to a room and participant.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    /// Construct the engine session, append the scripted opening turn, and
    /// return a handle for driving replies.
    async fn start_agent(
        &self,
        config: AgentConfig,
        opening_prompt: &str,
        room: &str,
        participant: &Participant,
    ) -> Result<Box<dyn AgentHandle>, EngineError>;
}

/// One running engine session.
#[async_trait]
pub trait AgentHandle: Send {
    /// Ask the engine to produce its next reply.
    async fn generate_reply(&mut self) -> Result<(), EngineError>;

    /// Tear the engine session down.
    async fn stop(&mut self) -> Result<(), EngineError>;
}
