//! WebSocket signal connection to a room.
//!
//! The signal stream carries participant membership and room lifecycle
//! events as JSON frames. Media never flows here; audio is negotiated
//! between the room service and the conversational engine.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{ConnectOptions, Participant, RoomConnection, RoomError, RoomTransport};

type WsSink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Inbound signal frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum SignalFrame {
    ParticipantJoined { participant: Participant },
    ParticipantLeft { participant: Participant },
    RoomClosing,
}

/// Outbound signal frames.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientAction<'a> {
    Leave { reason: &'a str },
}

pub struct SignalTransport {
    ws_url: String,
    api_key: String,
}

impl SignalTransport {
    pub fn new(ws_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl RoomTransport for SignalTransport {
    async fn connect(
        &self,
        room: &str,
        opts: ConnectOptions,
    ) -> Result<Box<dyn RoomConnection>, RoomError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/agent/rooms/{}", self.ws_url, room),
            &[
                ("access_token", self.api_key.as_str()),
                ("subscribe", opts.auto_subscribe.as_query_value()),
            ],
        )
        .map_err(|e| RoomError::InvalidUrl(e.to_string()))?;

        let (stream, _) = connect_async(url.as_str()).await?;
        info!(room, "connected to room signal stream");

        let (sink, mut stream) = stream.split();
        let (joined_tx, joined_rx) = mpsc::unbounded_channel();
        let (closing_tx, closing_rx) = watch::channel(false);

        let event_room = room.to_string();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                match serde_json::from_str::<SignalFrame>(&text) {
                    Ok(SignalFrame::ParticipantJoined { participant }) => {
                        let _ = joined_tx.send(participant);
                    }
                    Ok(SignalFrame::ParticipantLeft { participant }) => {
                        debug!(
                            room = %event_room,
                            identity = %participant.identity,
                            "participant left"
                        );
                    }
                    Ok(SignalFrame::RoomClosing) => {
                        info!(room = %event_room, "room closing");
                        let _ = closing_tx.send(true);
                    }
                    Err(e) => warn!(room = %event_room, "unrecognized signal frame: {}", e),
                }
            }
            // Dropping closing_tx wakes any closed() waiter on socket loss.
        });

        Ok(Box::new(SignalConnection {
            room_name: room.to_string(),
            sink,
            joined: joined_rx,
            closing: closing_rx,
            reader,
        }))
    }
}

pub struct SignalConnection {
    room_name: String,
    sink: WsSink,
    joined: mpsc::UnboundedReceiver<Participant>,
    closing: watch::Receiver<bool>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl RoomConnection for SignalConnection {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    async fn wait_for_participant(&mut self) -> Result<Participant, RoomError> {
        match self.joined.recv().await {
            Some(participant) => Ok(participant),
            None => Err(RoomError::ClosedWhileWaiting),
        }
    }

    async fn closed(&mut self) {
        while !*self.closing.borrow() {
            if self.closing.changed().await.is_err() {
                return;
            }
        }
    }

    async fn shutdown(&mut self, reason: &str) -> Result<(), RoomError> {
        info!(room = %self.room_name, reason, "leaving room");
        let frame = serde_json::to_string(&ClientAction::Leave { reason })?;
        self.sink.send(Message::Text(frame)).await?;
        self.sink.close().await?;
        Ok(())
    }
}

impl Drop for SignalConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_frames_deserialize() {
        let joined: SignalFrame = serde_json::from_str(
            r#"{"event":"participant_joined","participant":{"identity":"a@x.com","name":"Ada"}}"#,
        )
        .unwrap();
        match joined {
            SignalFrame::ParticipantJoined { participant } => {
                assert_eq!(participant.identity, "a@x.com");
                assert_eq!(participant.name, "Ada");
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        let closing: SignalFrame = serde_json::from_str(r#"{"event":"room_closing"}"#).unwrap();
        assert!(matches!(closing, SignalFrame::RoomClosing));
    }

    #[test]
    fn participant_name_defaults_to_empty() {
        let frame: SignalFrame = serde_json::from_str(
            r#"{"event":"participant_joined","participant":{"identity":"a@x.com"}}"#,
        )
        .unwrap();
        match frame {
            SignalFrame::ParticipantJoined { participant } => assert_eq!(participant.name, ""),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn leave_action_serializes() {
        let json = serde_json::to_string(&ClientAction::Leave {
            reason: "session timeout",
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"leave","reason":"session timeout"}"#);
    }
}
