//! Outbound telephony and TwiML rendering.
//!
//! Everything provider-specific is confined to this module. Handlers talk to
//! the [`TelephonyGateway`] trait and return TwiML built by
//! [`voice_reply_twiml`]; the rest of the service neither knows nor cares
//! that the provider is Twilio.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;

/// Spoken inside the speech gather so the caller knows the line is open.
pub const GATHER_PROMPT: &str = "Please say something, or press any key to continue.";

/// Spoken when the gather times out without any input, right before hangup.
pub const GOODBYE_TEXT: &str = "Thank you for using the voice agent demo. Goodbye!";

/// Provider statuses after which a call can no longer progress.
const TERMINAL_CALL_STATUSES: [&str; 5] =
    ["completed", "busy", "failed", "no-answer", "canceled"];

pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_CALL_STATUSES.contains(&status)
}

/// Result of asking the provider to place a call.
#[derive(Debug, Clone)]
pub struct CallPlacement {
    pub sid: String,
    pub status: String,
}

/// The operations the service needs from a telephony provider.
#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    /// Dials `to` and points the call's webhooks at this service.
    async fn place_call(&self, to: &str) -> Result<CallPlacement>;

    /// Asks the provider to hang up an in-progress call.
    async fn complete_call(&self, call_sid: &str) -> Result<()>;
}

/// Shape of the call resource in Twilio's REST responses, reduced to the
/// fields we read.
#[derive(Debug, Deserialize)]
struct TwilioCallResource {
    sid: String,
    status: String,
}

/// A [`TelephonyGateway`] backed by Twilio's 2010-04-01 REST API.
pub struct TwilioGateway {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    webhook_base: String,
}

impl TwilioGateway {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        public_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid,
            auth_token,
            from_number,
            webhook_base: public_url,
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls.json",
            self.account_sid
        )
    }

    fn call_url(&self, call_sid: &str) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls/{}.json",
            self.account_sid, call_sid
        )
    }
}

#[async_trait]
impl TelephonyGateway for TwilioGateway {
    async fn place_call(&self, to: &str) -> Result<CallPlacement> {
        let voice_url = format!("{}/api/twilio/voice", self.webhook_base);
        let status_url = format!("{}/api/twilio/status", self.webhook_base);

        let params = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Url", voice_url.as_str()),
            ("Method", "POST"),
            ("StatusCallback", status_url.as_str()),
            ("StatusCallbackMethod", "POST"),
            ("Record", "false"),
        ];

        let response = self
            .http
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .context("Failed to reach the telephony provider")?;

        if !response.status().is_success() {
            bail!(
                "Telephony provider rejected the call request: {}",
                response.status()
            );
        }

        let created: TwilioCallResource = response
            .json()
            .await
            .context("Failed to decode the provider's call resource")?;

        Ok(CallPlacement {
            sid: created.sid,
            status: created.status,
        })
    }

    async fn complete_call(&self, call_sid: &str) -> Result<()> {
        let response = self
            .http
            .post(self.call_url(call_sid))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await
            .context("Failed to reach the telephony provider")?;

        if !response.status().is_success() {
            bail!(
                "Telephony provider refused to complete call '{}': {}",
                call_sid,
                response.status()
            );
        }
        Ok(())
    }
}

/// Renders the TwiML for one conversational exchange.
///
/// The agent speaks `message`, then a speech gather waits for the caller and
/// posts the result back to the gather webhook. If the caller stays silent
/// past the timeout, a goodbye is spoken and the call is hung up.
pub fn voice_reply_twiml(message: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<Response>",
            r#"<Say voice="alice" language="en-US">{message}</Say>"#,
            r#"<Gather input="speech" timeout="10" action="/api/twilio/gather" method="POST">"#,
            r#"<Say voice="alice" language="en-US">{gather}</Say>"#,
            "</Gather>",
            r#"<Say voice="alice" language="en-US">{goodbye}</Say>"#,
            "<Hangup/>",
            "</Response>"
        ),
        message = xml_escape(message),
        gather = xml_escape(GATHER_PROMPT),
        goodbye = xml_escape(GOODBYE_TEXT),
    )
}

/// Escapes the five XML-reserved characters for element content.
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
