//! Websocket fan-out for dashboard observers.
//!
//! Each connection gets its own subscription to the event hub and a small
//! command vocabulary for driving a call remotely. Events are pushed for all
//! sessions; filtering by call id is the client's job.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

use crate::state::AppState;

/// Commands a dashboard client can send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    /// Declares interest in one call. Events are broadcast regardless; this
    /// exists so clients built against per-call subscriptions keep working.
    #[serde(rename_all = "camelCase")]
    SubscribeCall { call_id: String },
    #[serde(rename_all = "camelCase")]
    EndCall { call_id: String },
    #[serde(rename_all = "camelCase")]
    SendText { call_id: String, message: String },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[instrument(name = "observer_ws", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", &connection_id.to_string());
    info!("observer connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut events = state.events.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(error) => {
                            warn!(%error, "failed to serialize session event");
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                        debug!("observer send failed, closing");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "observer fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_command(&state, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(error)) => {
                    debug!(%error, "observer socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!("observer disconnected");
}

async fn handle_command(state: &Arc<AppState>, text: &str) {
    let command = match serde_json::from_str::<WsCommand>(text) {
        Ok(command) => command,
        Err(error) => {
            warn!(%error, "ignoring malformed observer command");
            return;
        }
    };

    match command {
        WsCommand::SubscribeCall { call_id } => {
            debug!(call_id, "observer subscribed to call");
        }
        WsCommand::EndCall { call_id } => {
            state.lifecycle.end_call(&call_id);
        }
        WsCommand::SendText { call_id, message } => {
            if message.trim().is_empty() {
                warn!(call_id, "ignoring empty send_text command");
                return;
            }
            state.lifecycle.inject_reply(&call_id, &message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_decode_from_tagged_json() {
        let subscribe: WsCommand =
            serde_json::from_str(r#"{"type": "subscribe_call", "callId": "CA1"}"#).unwrap();
        assert!(matches!(subscribe, WsCommand::SubscribeCall { call_id } if call_id == "CA1"));

        let end: WsCommand =
            serde_json::from_str(r#"{"type": "end_call", "callId": "CA2"}"#).unwrap();
        assert!(matches!(end, WsCommand::EndCall { call_id } if call_id == "CA2"));

        let send: WsCommand = serde_json::from_str(
            r#"{"type": "send_text", "callId": "CA3", "message": "hello"}"#,
        )
        .unwrap();
        match send {
            WsCommand::SendText { call_id, message } => {
                assert_eq!(call_id, "CA3");
                assert_eq!(message, "hello");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_or_malformed_commands_fail_to_decode() {
        assert!(serde_json::from_str::<WsCommand>(r#"{"type": "reboot"}"#).is_err());
        assert!(serde_json::from_str::<WsCommand>(r#"{"type": "end_call"}"#).is_err());
        assert!(serde_json::from_str::<WsCommand>("not json").is_err());
    }
}
