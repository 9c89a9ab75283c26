//! Webhook endpoints called by the telephony provider.
//!
//! These are form-encoded POSTs, not JSON, and the voice and gather variants
//! must answer with TwiML no matter what went wrong internally; an error
//! status here would make the provider play its own failure message.

use axum::{
    extract::{Form, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use switchboard_core::responder::REPEAT_PROMPT;
use tracing::info;

use crate::handlers::ApiError;
use crate::state::AppState;
use crate::telephony::{self, is_terminal_status};

/// An XML body with the content type Twilio expects.
pub struct Xml(pub String);

impl IntoResponse for Xml {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "text/xml")], self.0).into_response()
    }
}

/// Posted when a call connects.
#[derive(Debug, Deserialize)]
pub struct VoiceWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "To", default)]
    pub to: Option<String>,
}

/// Posted after each speech gather completes.
#[derive(Debug, Deserialize)]
pub struct GatherWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    /// Absent when recognition produced nothing.
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: Option<String>,
}

/// Posted on call status transitions.
#[derive(Debug, Deserialize)]
pub struct StatusWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
    /// Seconds, sent as a decimal string once the call has ended.
    #[serde(rename = "CallDuration", default)]
    pub call_duration: Option<String>,
}

/// Answer a freshly connected call with the greeting TwiML.
pub async fn voice(
    State(state): State<Arc<AppState>>,
    Form(event): Form<VoiceWebhook>,
) -> Xml {
    info!(
        call_sid = %event.call_sid,
        from = event.from.as_deref().unwrap_or("unknown"),
        to = event.to.as_deref().unwrap_or("unknown"),
        "voice webhook received"
    );

    let reply = state.lifecycle.incoming_call(&event.call_sid).await;
    Xml(telephony::voice_reply_twiml(&reply))
}

/// Answer a speech gather with the agent's next utterance.
pub async fn gather(
    State(state): State<Arc<AppState>>,
    Form(event): Form<GatherWebhook>,
) -> Xml {
    let speech = event.speech_result.as_deref().unwrap_or("");
    info!(call_sid = %event.call_sid, speech, "gather webhook received");

    let reply = if speech.trim().is_empty() {
        REPEAT_PROMPT.to_owned()
    } else {
        state.lifecycle.caller_utterance(&event.call_sid, speech).await
    };

    Xml(telephony::voice_reply_twiml(&reply))
}

/// Record a status transition and tear the session down on terminal ones.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Form(event): Form<StatusWebhook>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        call_sid = %event.call_sid,
        call_status = %event.call_status,
        call_duration = event.call_duration.as_deref().unwrap_or(""),
        "status callback received"
    );

    let duration = event.call_duration.as_deref().and_then(|d| d.parse::<i32>().ok());

    if let Some(record) = state.db.get_call_by_sid(&event.call_sid).await? {
        state
            .db
            .update_call_status(record.id, &event.call_status, duration)
            .await?;
    }

    if is_terminal_status(&event.call_status) {
        state.lifecycle.end_call(&event.call_sid);
    }

    Ok((StatusCode::OK, "OK"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_webhook_decodes_provider_field_names() {
        let event: VoiceWebhook = serde_json::from_str(
            r#"{"CallSid": "CA1", "From": "+15550001111", "To": "+15552223333"}"#,
        )
        .unwrap();

        assert_eq!(event.call_sid, "CA1");
        assert_eq!(event.from.as_deref(), Some("+15550001111"));
        assert_eq!(event.to.as_deref(), Some("+15552223333"));
    }

    #[test]
    fn test_gather_webhook_tolerates_missing_speech() {
        let event: GatherWebhook = serde_json::from_str(r#"{"CallSid": "CA1"}"#).unwrap();
        assert_eq!(event.call_sid, "CA1");
        assert_eq!(event.speech_result, None);

        let event: GatherWebhook =
            serde_json::from_str(r#"{"CallSid": "CA1", "SpeechResult": "hello there"}"#).unwrap();
        assert_eq!(event.speech_result.as_deref(), Some("hello there"));
    }

    #[test]
    fn test_status_webhook_duration_is_a_string_field() {
        let event: StatusWebhook = serde_json::from_str(
            r#"{"CallSid": "CA1", "CallStatus": "completed", "CallDuration": "42"}"#,
        )
        .unwrap();

        assert_eq!(event.call_status, "completed");
        assert_eq!(event.call_duration.as_deref(), Some("42"));
        assert_eq!(event.call_duration.as_deref().and_then(|d| d.parse::<i32>().ok()), Some(42));
    }

    #[test]
    fn test_xml_response_sets_content_type() {
        let response = Xml("<Response/>".to_string()).into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/xml"
        );
    }
}
