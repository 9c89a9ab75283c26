//! Call-scoped entry points for the service layer.
//!
//! Webhook and REST handlers never reach into sessions directly; they go
//! through [`CallLifecycle`], which owns the greeting policy, the operator
//! injection flow, and teardown.

use std::sync::Arc;

use tracing::{debug, info};

use crate::events::BroadcastHub;
use crate::registry::SessionRegistry;
use crate::responder::ResponseGenerator;
use crate::turn::{ConversationTurn, Speaker};

/// Spoken when a call connects for the first time, unless the deployment
/// configures its own greeting.
pub const DEFAULT_GREETING: &str =
    "Hello! Thank you for picking up. How are you doing today?";

/// Spoken when the provider re-delivers a call-start event for a session
/// that already has history. Repeating the greeting would sound broken.
pub const NEUTRAL_PROMPT: &str = "I'm listening. Please tell me more.";

/// A read-only view of one session's state, safe to hand to serializers.
#[derive(Debug, Clone, Default)]
pub struct TranscriptSnapshot {
    pub turns: Vec<ConversationTurn>,
    pub turn_count: usize,
    pub elapsed_seconds: i64,
}

/// Drives every session transition the outside world can cause.
pub struct CallLifecycle {
    registry: Arc<SessionRegistry>,
    responder: ResponseGenerator,
    events: BroadcastHub,
    greeting: String,
}

impl CallLifecycle {
    pub fn new(
        registry: Arc<SessionRegistry>,
        responder: ResponseGenerator,
        events: BroadcastHub,
        greeting: String,
    ) -> Self {
        Self {
            registry,
            responder,
            events,
            greeting,
        }
    }

    /// Handles a call-start signal and returns the text to speak.
    ///
    /// A brand-new session is greeted; a session that already has turns gets
    /// a neutral prompt instead, so provider retries never double-greet.
    pub async fn incoming_call(&self, call_id: &str) -> String {
        let session = self.registry.get_or_create(call_id, None);
        let mut live = session.lock().await;
        if live.turn_count() == 0 {
            info!(call_id, "greeting new call");
            live.append_turn(Speaker::Agent, &self.greeting);
            self.greeting.clone()
        } else {
            debug!(call_id, "call-start replay on a session with history");
            NEUTRAL_PROMPT.to_owned()
        }
    }

    /// Handles a recognized caller utterance and returns the agent's reply.
    pub async fn caller_utterance(&self, call_id: &str, utterance: &str) -> String {
        self.responder.respond(call_id, utterance).await
    }

    /// Stages `text` as the answer to the caller's next utterance.
    ///
    /// The injection is recorded in the log immediately so observers can see
    /// what the operator queued; it is spoken once the caller next talks.
    pub async fn inject_reply(&self, call_id: &str, text: &str) {
        let session = self.registry.get_or_create(call_id, None);
        let mut live = session.lock().await;
        live.append_turn(Speaker::Caller, text);
        live.queue_injected_reply(text);
        info!(call_id, "operator reply staged");
    }

    /// Terminates the session and tells observers the call is over.
    ///
    /// Safe to call for ids that were never seen or already ended; the
    /// ended notification goes out either way so dashboards converge.
    pub fn end_call(&self, call_id: &str) {
        if self.registry.terminate(call_id) {
            info!(call_id, "session terminated");
        } else {
            debug!(call_id, "end requested for unknown session");
        }
        self.events.publish_session_ended(call_id);
    }

    /// Snapshot of the session's transcript, or an empty snapshot when no
    /// session is live for `call_id`.
    pub async fn transcript(&self, call_id: &str) -> TranscriptSnapshot {
        match self.registry.get(call_id) {
            Some(session) => {
                let live = session.lock().await;
                TranscriptSnapshot {
                    turns: live.transcript(),
                    turn_count: live.turn_count(),
                    elapsed_seconds: live.elapsed_seconds(),
                }
            }
            None => TranscriptSnapshot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionEvent;
    use crate::llm_client::{DEFAULT_PERSONA, MockLLMClient};
    use crate::responder::REPEAT_PROMPT;

    fn lifecycle_with(llm: MockLLMClient) -> (CallLifecycle, BroadcastHub) {
        let events = BroadcastHub::new(64);
        let registry = Arc::new(SessionRegistry::new(events.clone(), DEFAULT_PERSONA));
        let responder = ResponseGenerator::new(Arc::clone(&registry), Arc::new(llm));
        let lifecycle = CallLifecycle::new(
            registry,
            responder,
            events.clone(),
            DEFAULT_GREETING.to_owned(),
        );
        (lifecycle, events)
    }

    fn silent_llm() -> MockLLMClient {
        let mut llm = MockLLMClient::new();
        llm.expect_agent_reply().times(0);
        llm
    }

    #[tokio::test]
    async fn first_call_start_greets_exactly_once() {
        let (lifecycle, _events) = lifecycle_with(silent_llm());

        assert_eq!(lifecycle.incoming_call("CA1").await, DEFAULT_GREETING);
        let snapshot = lifecycle.transcript("CA1").await;
        assert_eq!(snapshot.turn_count, 1);
        assert_eq!(snapshot.turns[0].speaker, Speaker::Agent);
        assert_eq!(snapshot.turns[0].content, DEFAULT_GREETING);

        // a replayed call-start must not append a second greeting
        assert_eq!(lifecycle.incoming_call("CA1").await, NEUTRAL_PROMPT);
        assert_eq!(lifecycle.transcript("CA1").await.turn_count, 1);
    }

    #[tokio::test]
    async fn blank_utterance_changes_nothing() {
        let (lifecycle, _events) = lifecycle_with(silent_llm());
        lifecycle.incoming_call("CA1").await;

        assert_eq!(lifecycle.caller_utterance("CA1", "  ").await, REPEAT_PROMPT);
        assert_eq!(lifecycle.transcript("CA1").await.turn_count, 1);
    }

    #[tokio::test]
    async fn injected_reply_is_spoken_instead_of_generating() {
        let (lifecycle, _events) = lifecycle_with(silent_llm());
        lifecycle.incoming_call("CA1").await;

        lifecycle.inject_reply("CA1", "Please hold while I check.").await;
        assert_eq!(lifecycle.transcript("CA1").await.turn_count, 2);

        let reply = lifecycle.caller_utterance("CA1", "Can you check my order?").await;
        assert_eq!(reply, "Please hold while I check.");
        // caller turn plus the spoken injection
        assert_eq!(lifecycle.transcript("CA1").await.turn_count, 4);
    }

    #[tokio::test]
    async fn later_injection_overwrites_earlier_one() {
        let (lifecycle, _events) = lifecycle_with(silent_llm());

        lifecycle.inject_reply("CA1", "first answer").await;
        lifecycle.inject_reply("CA1", "second answer").await;

        let reply = lifecycle.caller_utterance("CA1", "Well?").await;
        assert_eq!(reply, "second answer");
    }

    #[tokio::test]
    async fn end_call_discards_state_and_notifies() {
        let (lifecycle, events) = lifecycle_with(silent_llm());
        lifecycle.incoming_call("CA1").await;
        let mut rx = events.subscribe();

        lifecycle.end_call("CA1");

        match rx.recv().await.unwrap() {
            SessionEvent::Ended { call_id } => assert_eq!(call_id, "CA1"),
            other => panic!("unexpected event: {other:?}"),
        }
        let snapshot = lifecycle.transcript("CA1").await;
        assert_eq!(snapshot.turn_count, 0);
        assert_eq!(snapshot.elapsed_seconds, 0);
        assert!(snapshot.turns.is_empty());
    }

    #[tokio::test]
    async fn ending_an_unknown_call_still_notifies() {
        let (lifecycle, events) = lifecycle_with(silent_llm());
        let mut rx = events.subscribe();

        lifecycle.end_call("CA-never-seen");

        match rx.recv().await.unwrap() {
            SessionEvent::Ended { call_id } => assert_eq!(call_id, "CA-never-seen"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn calls_progress_independently() {
        let mut llm = MockLLMClient::new();
        llm.expect_agent_reply()
            .times(1)
            .returning(|_, _| Ok("Nice to meet you.".to_owned()));
        let (lifecycle, _events) = lifecycle_with(llm);

        lifecycle.incoming_call("CA1").await;
        lifecycle.incoming_call("CA2").await;

        lifecycle.caller_utterance("CA1", "I'm Dana.").await;

        assert_eq!(lifecycle.transcript("CA1").await.turn_count, 3);
        assert_eq!(lifecycle.transcript("CA2").await.turn_count, 1);
    }

    #[tokio::test]
    async fn transcript_for_unknown_call_is_empty() {
        let (lifecycle, _events) = lifecycle_with(silent_llm());
        let snapshot = lifecycle.transcript("CA-missing").await;
        assert_eq!(snapshot.turn_count, 0);
        assert_eq!(snapshot.elapsed_seconds, 0);
        assert!(snapshot.turns.is_empty());
    }
}
