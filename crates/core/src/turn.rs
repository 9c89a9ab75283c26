use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the call produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The human on the phone.
    Caller,
    /// The automated voice agent.
    Agent,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Caller => write!(f, "caller"),
            Speaker::Agent => write!(f, "agent"),
        }
    }
}

/// One recorded utterance in a conversation.
///
/// Turns are immutable once appended. Ids are assigned by the owning session
/// from a counter that only moves forward, so they order turns even when two
/// appends land within the same clock tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: u64,
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Speaker::Caller).unwrap(), "\"caller\"");
        assert_eq!(serde_json::to_string(&Speaker::Agent).unwrap(), "\"agent\"");
    }

    #[test]
    fn speaker_display_matches_wire_form() {
        assert_eq!(Speaker::Caller.to_string(), "caller");
        assert_eq!(Speaker::Agent.to_string(), "agent");
    }
}
