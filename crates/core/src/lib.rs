//! Conversation-session engine for phone calls driven by an LLM agent.
//!
//! The crate keeps one in-memory [`session::ConversationSession`] per live
//! call, serializes mutation per call, and fans activity out to observers
//! through [`events::BroadcastHub`]. The service layer drives it via
//! [`lifecycle::CallLifecycle`] and never holds session state of its own.

pub mod events;
pub mod lifecycle;
pub mod llm_client;
pub mod registry;
pub mod responder;
pub mod session;
pub mod turn;
