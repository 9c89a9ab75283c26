//! Concurrent map of live sessions.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::events::BroadcastHub;
use crate::session::ConversationSession;

/// A session shared between request handlers. All mutation goes through the
/// mutex, so turn appends for one call are serialized.
pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Owns every live [`ConversationSession`], keyed by call id.
///
/// Lookups and creation are lock-free per key thanks to the sharded map;
/// `get_or_create` is atomic, so two racing webhooks for the same call id
/// always end up sharing one session.
pub struct SessionRegistry {
    sessions: DashMap<String, SharedSession>,
    events: BroadcastHub,
    default_persona: String,
}

impl SessionRegistry {
    pub fn new(events: BroadcastHub, default_persona: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            events,
            default_persona: default_persona.into(),
        }
    }

    /// Returns the session for `call_id`, creating an empty one on first
    /// reference. `persona` is only consulted at creation time; an existing
    /// session keeps the persona it was created with.
    pub fn get_or_create(&self, call_id: &str, persona: Option<&str>) -> SharedSession {
        let entry = self
            .sessions
            .entry(call_id.to_owned())
            .or_insert_with(|| {
                debug!(call_id, "creating session");
                let persona = persona.unwrap_or(&self.default_persona);
                Arc::new(Mutex::new(ConversationSession::new(
                    call_id,
                    persona,
                    self.events.clone(),
                )))
            });
        Arc::clone(entry.value())
    }

    /// Looks up a session without creating one.
    pub fn get(&self, call_id: &str) -> Option<SharedSession> {
        self.sessions.get(call_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drops the session, discarding its entire turn log. Returns whether a
    /// session existed. Handlers still holding the session's `Arc` can finish
    /// their current operation; the state is simply no longer reachable by id.
    pub fn terminate(&self, call_id: &str) -> bool {
        self.sessions.remove(call_id).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
