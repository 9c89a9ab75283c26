//! The caller-utterance turn cycle.
//!
//! One call to [`ResponseGenerator::respond`] takes a recognized utterance
//! from the telephony provider and produces the exact text the agent should
//! speak next, recording both sides in the session log along the way.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm_client::LLMClient;
use crate::registry::SessionRegistry;
use crate::turn::Speaker;

/// Spoken when speech recognition produced nothing usable.
pub const REPEAT_PROMPT: &str = "I didn't catch that. Could you please repeat what you said?";

/// Spoken in place of a reply whenever generation fails. The call keeps
/// going; only this one exchange is degraded.
pub const TECHNICAL_DIFFICULTY_REPLY: &str =
    "I'm experiencing technical difficulties. Please try again later.";

/// Turns caller utterances into agent replies.
pub struct ResponseGenerator {
    registry: Arc<SessionRegistry>,
    llm: Arc<dyn LLMClient>,
}

impl ResponseGenerator {
    pub fn new(registry: Arc<SessionRegistry>, llm: Arc<dyn LLMClient>) -> Self {
        Self { registry, llm }
    }

    /// Produces the agent's next utterance for `call_id`.
    ///
    /// A blank utterance short-circuits to a repeat prompt without touching
    /// any session state. Otherwise the caller turn is recorded, a staged
    /// operator reply is used verbatim if one is waiting, and only then is
    /// the model asked. Generation failures degrade to a fixed apology so
    /// the phone line always hears something.
    pub async fn respond(&self, call_id: &str, caller_utterance: &str) -> String {
        if caller_utterance.trim().is_empty() {
            debug!(call_id, "blank utterance, prompting caller to repeat");
            return REPEAT_PROMPT.to_owned();
        }

        let session = self.registry.get_or_create(call_id, None);

        let (persona, history) = {
            let mut live = session.lock().await;
            live.append_turn(Speaker::Caller, caller_utterance);
            if let Some(staged) = live.consume_injected_reply() {
                debug!(call_id, "answering with operator-injected reply");
                live.append_turn(Speaker::Agent, &staged);
                return staged;
            }
            (live.persona().to_owned(), live.transcript())
        };

        // The session lock is released while the model thinks, so transcript
        // reads and dashboard updates stay responsive mid-generation.
        let reply = match self.llm.agent_reply(&persona, &history).await {
            Ok(text) => text,
            Err(error) => {
                warn!(call_id, %error, "reply generation failed, substituting apology");
                TECHNICAL_DIFFICULTY_REPLY.to_owned()
            }
        };

        session.lock().await.append_turn(Speaker::Agent, &reply);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastHub;
    use crate::llm_client::{DEFAULT_PERSONA, MockLLMClient};
    use anyhow::anyhow;

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(BroadcastHub::new(64), DEFAULT_PERSONA))
    }

    #[tokio::test]
    async fn records_caller_turn_then_generated_reply() {
        let registry = registry();
        let mut llm = MockLLMClient::new();
        llm.expect_agent_reply()
            .withf(|persona, history| {
                persona == DEFAULT_PERSONA
                    && history.len() == 1
                    && history[0].speaker == Speaker::Caller
                    && history[0].content == "Hello there"
            })
            .times(1)
            .returning(|_, _| Ok("Hi! How can I help?".to_owned()));
        let generator = ResponseGenerator::new(Arc::clone(&registry), Arc::new(llm));

        let reply = generator.respond("CA1", "Hello there").await;

        assert_eq!(reply, "Hi! How can I help?");
        let session = registry.get("CA1").unwrap();
        let turns = session.lock().await.transcript();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, Speaker::Caller);
        assert_eq!(turns[1].speaker, Speaker::Agent);
        assert_eq!(turns[1].content, "Hi! How can I help?");
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_apology() {
        let registry = registry();
        let mut llm = MockLLMClient::new();
        llm.expect_agent_reply()
            .times(1)
            .returning(|_, _| Err(anyhow!("upstream timed out")));
        let generator = ResponseGenerator::new(Arc::clone(&registry), Arc::new(llm));

        let reply = generator.respond("CA1", "Hello?").await;

        assert_eq!(reply, TECHNICAL_DIFFICULTY_REPLY);
        // the failed exchange is still fully recorded
        let session = registry.get("CA1").unwrap();
        let turns = session.lock().await.transcript();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, TECHNICAL_DIFFICULTY_REPLY);
    }

    #[tokio::test]
    async fn staged_reply_preempts_generation() {
        let registry = registry();
        let mut llm = MockLLMClient::new();
        llm.expect_agent_reply().times(0);
        let generator = ResponseGenerator::new(Arc::clone(&registry), Arc::new(llm));

        registry
            .get_or_create("CA1", None)
            .lock()
            .await
            .queue_injected_reply("Our office opens at nine.");

        let reply = generator.respond("CA1", "When do you open?").await;

        assert_eq!(reply, "Our office opens at nine.");
        let session = registry.get("CA1").unwrap();
        let turns = session.lock().await.transcript();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "Our office opens at nine.");

        // the slot was consumed, so nothing is staged for the next exchange
        assert_eq!(session.lock().await.consume_injected_reply(), None);
    }

    #[tokio::test]
    async fn blank_utterance_leaves_sessions_untouched() {
        let registry = registry();
        let mut llm = MockLLMClient::new();
        llm.expect_agent_reply().times(0);
        let generator = ResponseGenerator::new(Arc::clone(&registry), Arc::new(llm));

        assert_eq!(generator.respond("CA1", "   ").await, REPEAT_PROMPT);
        assert!(registry.get("CA1").is_none());
    }

    #[tokio::test]
    async fn blank_utterance_on_existing_session_keeps_its_log() {
        let registry = registry();
        let mut llm = MockLLMClient::new();
        llm.expect_agent_reply().times(0);
        let generator = ResponseGenerator::new(Arc::clone(&registry), Arc::new(llm));

        registry
            .get_or_create("CA1", None)
            .lock()
            .await
            .append_turn(Speaker::Agent, "Hello!");

        assert_eq!(generator.respond("CA1", "").await, REPEAT_PROMPT);
        let session = registry.get("CA1").unwrap();
        assert_eq!(session.lock().await.turn_count(), 1);
    }
}
