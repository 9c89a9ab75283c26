//! Broadcast fan-out for conversation activity.
//!
//! Every turn append and every session termination is published as a
//! [`SessionEvent`] on a shared broadcast channel. Observers (the dashboard
//! websocket, mostly) subscribe and render; publishers never wait for them.

use tokio::sync::broadcast;

use crate::turn::ConversationTurn;

/// Default capacity of the event channel. A slow observer that falls more
/// than this many events behind starts losing the oldest ones.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A notification about one conversation session, addressed by call id.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A turn was appended to the session's log.
    #[serde(rename_all = "camelCase")]
    Turn {
        call_id: String,
        turn: ConversationTurn,
        turn_count: usize,
        elapsed_seconds: i64,
    },
    /// The session was terminated and its state discarded.
    #[serde(rename_all = "camelCase")]
    Ended { call_id: String },
}

/// Hands session events to however many observers happen to be listening.
///
/// Publishing is fire-and-forget: with no subscribers the event is silently
/// dropped, and a subscriber that cannot keep up is skipped ahead by the
/// channel rather than allowed to stall the conversation.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new subscription. Only events published after this call are
    /// delivered to the returned receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish_turn(
        &self,
        call_id: &str,
        turn: &ConversationTurn,
        turn_count: usize,
        elapsed_seconds: i64,
    ) {
        self.publish(SessionEvent::Turn {
            call_id: call_id.to_owned(),
            turn: turn.clone(),
            turn_count,
            elapsed_seconds,
        });
    }

    pub fn publish_session_ended(&self, call_id: &str) {
        self.publish(SessionEvent::Ended {
            call_id: call_id.to_owned(),
        });
    }

    fn publish(&self, event: SessionEvent) {
        // send only errors when there are no receivers, which is normal here
        let _ = self.sender.send(event);
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
