//! API and Database Models
//!
//! This module defines the core data structures used for both database mapping
//! with `sqlx` and for generating OpenAPI documentation with `utoipa`. All
//! JSON surfaces use camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use switchboard_core::turn::ConversationTurn;
use utoipa::ToSchema;
use uuid::Uuid;

/// Longest phone number the `calls` table accepts.
const MAX_PHONE_NUMBER_LEN: usize = 20;

/// One row of the `calls` audit table.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(example = "+15551234567")]
    pub phone_number: String,
    pub message: Option<String>,
    #[schema(example = "in-progress")]
    pub status: String,
    /// Call length in seconds, reported by the provider once the call ends.
    pub duration: i32,
    pub call_sid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallPayload {
    #[schema(example = "+15551234567")]
    pub phone_number: String,
    /// Optional note stored with the call record.
    pub message: Option<String>,
}

impl CreateCallPayload {
    pub fn validate(&self) -> Result<(), String> {
        let trimmed = self.phone_number.trim();
        if trimmed.is_empty() {
            return Err("Phone number is required".to_string());
        }
        if trimmed.len() > MAX_PHONE_NUMBER_LEN {
            return Err("Phone number is too long".to_string());
        }
        Ok(())
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SendTextPayload {
    #[schema(example = "Our office opens at nine.")]
    pub message: String,
}

/// A single transcript entry as exposed over the REST and websocket surfaces.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct TranscriptTurn {
    pub id: u64,
    #[schema(example = "caller")]
    pub speaker: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ConversationTurn> for TranscriptTurn {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            id: turn.id,
            speaker: turn.speaker.to_string(),
            content: turn.content,
            timestamp: turn.timestamp,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMetrics {
    pub total_turns: usize,
    /// Seconds the session has been live.
    pub call_duration: i64,
    /// Mean utterance length in characters, for the dashboard's gauge.
    pub average_turn_length: f64,
}

impl TranscriptMetrics {
    pub fn from_turns(turns: &[TranscriptTurn], elapsed_seconds: i64) -> Self {
        let average_turn_length = if turns.is_empty() {
            0.0
        } else {
            let total_chars: usize = turns.iter().map(|t| t.content.chars().count()).sum();
            total_chars as f64 / turns.len() as f64
        };
        Self {
            total_turns: turns.len(),
            call_duration: elapsed_seconds,
            average_turn_length,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub call_id: String,
    pub transcript: Vec<TranscriptTurn>,
    pub turn_count: usize,
    pub duration: i64,
    pub metrics: TranscriptMetrics,
}

/// Coarse health report for the dashboard's status strip.
#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "connected")]
    pub twilio: String,
    #[schema(example = "connected")]
    pub openai: String,
    #[schema(example = "connected")]
    pub postgres: String,
    #[schema(example = "pending")]
    pub webhook: String,
}

#[derive(Serialize, ToSchema)]
pub struct AckResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
