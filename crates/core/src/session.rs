//! In-memory state for a single live call.

use chrono::{DateTime, Utc};

use crate::events::BroadcastHub;
use crate::turn::{ConversationTurn, Speaker};

/// The complete conversational state of one call, keyed by the telephony
/// provider's call id.
///
/// A session lives entirely in memory and is discarded wholesale when the
/// call ends. Callers mutate it behind a lock owned by the registry; the
/// session itself performs no synchronization.
#[derive(Debug)]
pub struct ConversationSession {
    call_id: String,
    turns: Vec<ConversationTurn>,
    next_turn_id: u64,
    started_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    persona: String,
    pending_reply: Option<String>,
    events: BroadcastHub,
}

impl ConversationSession {
    pub fn new(call_id: &str, persona: &str, events: BroadcastHub) -> Self {
        let now = Utc::now();
        Self {
            call_id: call_id.to_owned(),
            turns: Vec::new(),
            next_turn_id: 1,
            started_at: now,
            last_activity: now,
            persona: persona.to_owned(),
            pending_reply: None,
            events,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Appends an utterance to the log and announces it to observers.
    ///
    /// Consecutive turns by the same speaker are recorded as-is; the engine
    /// does not police turn-taking. Returns the stored turn.
    pub fn append_turn(&mut self, speaker: Speaker, content: &str) -> ConversationTurn {
        let turn = ConversationTurn {
            id: self.next_turn_id,
            speaker,
            content: content.to_owned(),
            timestamp: Utc::now(),
        };
        self.next_turn_id += 1;
        self.last_activity = turn.timestamp;
        self.turns.push(turn.clone());
        self.events
            .publish_turn(&self.call_id, &turn, self.turn_count(), self.elapsed_seconds());
        turn
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Whole seconds since the session was created, never negative.
    pub fn elapsed_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    /// Stages text that the next caller utterance should be answered with,
    /// replacing any previously staged text.
    pub fn queue_injected_reply(&mut self, text: &str) {
        self.pending_reply = Some(text.to_owned());
    }

    /// Takes the staged reply, leaving the slot empty.
    pub fn consume_injected_reply(&mut self) -> Option<String> {
        self.pending_reply.take()
    }

    /// A point-in-time copy of the turn log, oldest first.
    pub fn transcript(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionEvent;

    fn session() -> ConversationSession {
        ConversationSession::new("CA123", "Be brief.", BroadcastHub::new(16))
    }

    #[test]
    fn appends_preserve_order_and_assign_increasing_ids() {
        let mut s = session();
        s.append_turn(Speaker::Agent, "Hello!");
        s.append_turn(Speaker::Caller, "Hi.");
        s.append_turn(Speaker::Agent, "What brings you here?");

        let turns = s.transcript();
        assert_eq!(s.turn_count(), 3);
        assert_eq!(
            turns.iter().map(|t| t.content.as_str()).collect::<Vec<_>>(),
            vec!["Hello!", "Hi.", "What brings you here?"]
        );
        assert!(turns.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn consecutive_turns_by_one_speaker_are_kept() {
        let mut s = session();
        s.append_turn(Speaker::Caller, "Hello?");
        s.append_turn(Speaker::Caller, "Are you there?");
        assert_eq!(s.turn_count(), 2);
        assert!(s.transcript().iter().all(|t| t.speaker == Speaker::Caller));
    }

    #[test]
    fn elapsed_seconds_is_non_negative_and_non_decreasing() {
        let s = session();
        let first = s.elapsed_seconds();
        let second = s.elapsed_seconds();
        assert!(first >= 0);
        assert!(second >= first);
    }

    #[test]
    fn append_advances_last_activity() {
        let mut s = session();
        let before = s.last_activity();
        s.append_turn(Speaker::Caller, "hi");
        assert!(s.last_activity() >= before);
    }

    #[test]
    fn injected_reply_last_write_wins_and_is_consumed_once() {
        let mut s = session();
        s.queue_injected_reply("first");
        s.queue_injected_reply("second");
        assert_eq!(s.consume_injected_reply().as_deref(), Some("second"));
        assert_eq!(s.consume_injected_reply(), None);
    }

    #[tokio::test]
    async fn append_publishes_a_turn_event() {
        let hub = BroadcastHub::new(16);
        let mut rx = hub.subscribe();
        let mut s = ConversationSession::new("CA9", "persona", hub);

        s.append_turn(Speaker::Agent, "Hello!");

        match rx.recv().await.unwrap() {
            SessionEvent::Turn {
                call_id,
                turn,
                turn_count,
                elapsed_seconds,
            } => {
                assert_eq!(call_id, "CA9");
                assert_eq!(turn.content, "Hello!");
                assert_eq!(turn_count, 1);
                assert!(elapsed_seconds >= 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
