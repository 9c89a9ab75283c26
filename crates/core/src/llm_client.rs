use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

use crate::turn::{ConversationTurn, Speaker};

/// System prompt used when no per-deployment persona is configured.
pub const DEFAULT_PERSONA: &str = "You are a helpful voice agent. Respond naturally and conversationally to the user. Keep responses concise and appropriate for a phone conversation. Be friendly and professional.";

/// Replies are capped short because they are read aloud over the phone.
const MAX_REPLY_TOKENS: u32 = 150;
const REPLY_TEMPERATURE: f32 = 0.7;

/// A generic client for turning conversation history into the agent's next
/// utterance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Produces the agent's reply to a conversation. `history` is the full
    /// turn log, oldest first, ending with the caller utterance to answer.
    async fn agent_reply(&self, persona: &str, history: &[ConversationTurn]) -> Result<String>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn agent_reply(&self, persona: &str, history: &[ConversationTurn]) -> Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(persona)
                .build()?
                .into(),
        ];
        for turn in history {
            match turn.speaker {
                Speaker::Caller => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content.clone())
                        .build()?
                        .into(),
                ),
                Speaker::Agent => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.clone())
                        .build()?
                        .into(),
                ),
            }
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(MAX_REPLY_TOKENS)
            .temperature(REPLY_TEMPERATURE)
            .build()?;

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .filter(|content| !content.trim().is_empty())
            .cloned()
            .ok_or_else(|| anyhow!("Chat completion contained no usable text."))
    }
}
