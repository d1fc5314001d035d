//! Agent dispatch loop.
//!
//! The worker holds one WebSocket to the room service, registers itself as
//! an interview agent, and spawns a session for every assigned room. A
//! failed session is logged and dropped; a dead dispatch socket ends the
//! worker.

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::session::{SessionController, SessionJob};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DispatchFrame {
    Registered { worker_id: String },
    JobAssigned { room_name: String },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WorkerFrame<'a> {
    Register { agent_name: &'a str },
    Pong,
}

pub struct Worker {
    controller: Arc<SessionController>,
    ws_url: String,
    api_key: String,
    agent_name: String,
}

impl Worker {
    pub fn new(
        controller: Arc<SessionController>,
        ws_url: impl Into<String>,
        api_key: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            ws_url: ws_url.into(),
            api_key: api_key.into(),
            agent_name: agent_name.into(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/agent/dispatch", self.ws_url),
            &[("access_token", self.api_key.as_str())],
        )
        .context("invalid dispatch URL")?;

        let (stream, _) = connect_async(url.as_str())
            .await
            .context("failed to connect to the dispatch socket")?;
        let (mut sink, mut stream) = stream.split();

        let register = serde_json::to_string(&WorkerFrame::Register {
            agent_name: &self.agent_name,
        })?;
        sink.send(Message::Text(register)).await?;
        info!(agent_name = %self.agent_name, "worker registered, waiting for jobs");

        while let Some(msg) = stream.next().await {
            let text = match msg.context("dispatch socket error")? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match serde_json::from_str::<DispatchFrame>(&text) {
                Ok(DispatchFrame::Registered { worker_id }) => {
                    info!(worker_id, "dispatch acknowledged registration");
                }
                Ok(DispatchFrame::JobAssigned { room_name }) => {
                    info!(room = %room_name, "job assigned");
                    let controller = Arc::clone(&self.controller);
                    tokio::spawn(async move {
                        let job = SessionJob {
                            room_name: room_name.clone(),
                        };
                        match controller.run(job).await {
                            Ok(outcome) => info!(room = %room_name, ?outcome, "session started"),
                            Err(e) => error!(room = %room_name, "session failed: {:#}", e),
                        }
                    });
                }
                Ok(DispatchFrame::Ping) => {
                    let pong = serde_json::to_string(&WorkerFrame::Pong)?;
                    sink.send(Message::Text(pong)).await?;
                }
                Err(e) => warn!("unrecognized dispatch frame: {}", e),
            }
        }

        bail!("dispatch socket closed")
    }
}
