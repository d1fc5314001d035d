//! Realtime engine WebSocket client.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::{AgentConfig, AgentHandle, ConversationEngine, EngineError};
use crate::room::Participant;

type WsSink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ClientFrame<'a> {
    #[serde(rename = "session.update")]
    SessionUpdate { session: &'a AgentConfig },
    #[serde(rename = "conversation.item.create")]
    ItemCreate { item: ConversationItem<'a> },
    #[serde(rename = "response.create")]
    ResponseCreate,
}

#[derive(Debug, Serialize)]
struct ConversationItem<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    role: &'static str,
    content: Vec<ItemContent<'a>>,
}

#[derive(Debug, Serialize)]
struct ItemContent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl<'a> ConversationItem<'a> {
    fn assistant_text(text: &'a str) -> Self {
        Self {
            kind: "message",
            role: "assistant",
            content: vec![ItemContent { kind: "text", text }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ServerFrame {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "response.done")]
    ResponseDone,
    #[serde(rename = "response.audio_transcript.delta")]
    TranscriptDelta { delta: String },
    #[serde(rename = "error")]
    Error { error: EngineFault },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct EngineFault {
    #[serde(default)]
    message: String,
}

pub struct RealtimeEngine {
    url: String,
    api_key: String,
}

impl RealtimeEngine {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ConversationEngine for RealtimeEngine {
    async fn start_agent(
        &self,
        config: AgentConfig,
        opening_prompt: &str,
        room: &str,
        participant: &Participant,
    ) -> Result<Box<dyn AgentHandle>, EngineError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/realtime", self.url),
            &[
                ("access_token", self.api_key.as_str()),
                ("room", room),
                ("participant", participant.identity.as_str()),
            ],
        )
        .map_err(|e| EngineError::InvalidUrl(e.to_string()))?;

        let (stream, _) = connect_async(url.as_str()).await?;
        info!(room, identity = %participant.identity, "engine session opened");

        let (mut sink, mut stream) = stream.split();

        send(&mut sink, &ClientFrame::SessionUpdate { session: &config }).await?;
        send(
            &mut sink,
            &ClientFrame::ItemCreate {
                item: ConversationItem::assistant_text(opening_prompt),
            },
        )
        .await?;

        // Engine events are informational for the worker; transcripts and
        // faults are logged and the conversation itself stays server-side.
        let event_room = room.to_string();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                match serde_json::from_str::<ServerFrame>(&text) {
                    Ok(ServerFrame::SessionCreated) => {
                        debug!(room = %event_room, "engine session created")
                    }
                    Ok(ServerFrame::ResponseDone) => {
                        debug!(room = %event_room, "engine response done")
                    }
                    Ok(ServerFrame::TranscriptDelta { delta }) => {
                        debug!(room = %event_room, "transcript: {}", delta)
                    }
                    Ok(ServerFrame::Error { error }) => {
                        error!(room = %event_room, "engine error: {}", error.message)
                    }
                    Ok(ServerFrame::Other) => {}
                    Err(e) => warn!(room = %event_room, "unrecognized engine frame: {}", e),
                }
            }
        });

        Ok(Box::new(RealtimeAgent { sink, reader }))
    }
}

pub struct RealtimeAgent {
    sink: WsSink,
    reader: JoinHandle<()>,
}

#[async_trait]
impl AgentHandle for RealtimeAgent {
    async fn generate_reply(&mut self) -> Result<(), EngineError> {
        send(&mut self.sink, &ClientFrame::ResponseCreate).await
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.sink.close().await?;
        Ok(())
    }
}

impl Drop for RealtimeAgent {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn send(sink: &mut WsSink, frame: &ClientFrame<'_>) -> Result<(), EngineError> {
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}
