//! Chat websocket.
//!
//! Inbound frames are JSON `{message, sessionId?}` or plain text. Each
//! message is answered with `{type: "ai_response" | "error", content,
//! sessionId}`. Messages that arrive while a run is in flight wait their
//! turn; closing the socket cancels the in-flight run.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SqlMaticError;
use crate::log_component;

use super::AppState;

/// One chat request from the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundChat {
    pub message: String,
    #[serde(default, rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
}

impl InboundChat {
    /// Parse a text frame: a JSON object with `message`, else the raw text.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<InboundChat>(text) {
            Ok(chat) => chat,
            Err(_) => Self {
                message: text.to_string(),
                session_id: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    AiResponse,
    Error,
}

/// One reply frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundChat {
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    pub content: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl OutboundChat {
    pub fn response(content: String, session_id: &str) -> Self {
        Self {
            kind: OutboundKind::AiResponse,
            content,
            session_id: session_id.to_string(),
        }
    }

    pub fn error(content: String, session_id: &str) -> Self {
        Self {
            kind: OutboundKind::Error,
            content,
            session_id: session_id.to_string(),
        }
    }
}

pub async fn chat_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let connection = state.shutdown.child_token();
    // Used when the client does not name a session.
    let connection_session = state.agent.router().resolve(None);
    log_component!(
        info,
        "gateway",
        "Chat websocket connected",
        session_id = connection_session.as_str()
    );

    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<InboundChat>();

    let reader_token = connection.clone();
    let reader = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    if queue_tx.send(InboundChat::parse(text.as_str())).is_err() {
                        break;
                    }
                }
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "Chat websocket closed by client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Chat websocket error");
                    break;
                }
            }
        }
        reader_token.cancel();
    });

    loop {
        let next = tokio::select! {
            biased;
            _ = connection.cancelled() => None,
            next = queue_rx.recv() => next,
        };
        let Some(chat) = next else {
            break;
        };

        let session_id = chat
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&connection_session)
            .to_string();

        let reply = match state
            .agent
            .run(&session_id, &chat.message, connection.child_token())
            .await
        {
            Ok(answer) => OutboundChat::response(answer, &session_id),
            Err(SqlMaticError::Cancelled) => break,
            Err(e) => OutboundChat::error(e.to_string(), &session_id),
        };

        let frame = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize chat reply");
                continue;
            }
        };
        if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
            warn!(error = %e, "Failed to send chat reply");
            break;
        }
    }

    connection.cancel();
    reader.abort();
    log_component!(
        info,
        "gateway",
        "Chat websocket disconnected",
        session_id = connection_session.as_str()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_with_session() {
        let chat = InboundChat::parse(r#"{"message": "How many orders?", "sessionId": "abc"}"#);
        assert_eq!(chat.message, "How many orders?");
        assert_eq!(chat.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_json_without_session() {
        let chat = InboundChat::parse(r#"{"message": "hi"}"#);
        assert_eq!(chat.session_id, None);
    }

    #[test]
    fn test_parse_plain_text() {
        let chat = InboundChat::parse("List all customers");
        assert_eq!(chat.message, "List all customers");
        assert_eq!(chat.session_id, None);

        // JSON that is not a chat object is treated as text
        let raw = r#"{"question": "x"}"#;
        assert_eq!(InboundChat::parse(raw).message, raw);
    }

    #[test]
    fn test_outbound_shape() {
        let json = serde_json::to_value(OutboundChat::response("42".into(), "s1")).unwrap();
        assert_eq!(json["type"], "ai_response");
        assert_eq!(json["content"], "42");
        assert_eq!(json["sessionId"], "s1");

        let json = serde_json::to_value(OutboundChat::error("busy".into(), "s1")).unwrap();
        assert_eq!(json["type"], "error");
    }
}
