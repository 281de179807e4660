//! Chat-bot webhook delivery.
//!
//! Uses `reqwest::blocking`: a run sends one message and then exits, so an
//! async client would buy nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlugcountError;
use crate::notify::{Notifier, SummaryMessage};

/// Payload shape expected by the receiving bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFormat {
    /// Feishu/Lark custom bot: `{"msg_type":"text","content":{"text":...}}`.
    #[default]
    Feishu,
    /// Slack-compatible incoming webhook: `{"text":...}`.
    Slack,
}

impl WebhookFormat {
    pub fn payload(&self, message: &SummaryMessage) -> serde_json::Value {
        match self {
            WebhookFormat::Feishu => serde_json::json!({
                "msg_type": "text",
                "content": { "text": message.text }
            }),
            WebhookFormat::Slack => serde_json::json!({ "text": message.text }),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            WebhookFormat::Feishu => "feishu",
            WebhookFormat::Slack => "slack",
        }
    }
}

pub struct WebhookNotifier {
    url: String,
    format: WebhookFormat,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`. `timeout` bounds the whole
    /// request, connect included.
    pub fn new(
        url: impl Into<String>,
        format: WebhookFormat,
        timeout: Duration,
    ) -> Result<Self, PlugcountError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("plugcount/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlugcountError::Delivery(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            format,
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, message: &SummaryMessage) -> Result<(), PlugcountError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.format.payload(message))
            .send()
            .map_err(|e| PlugcountError::Delivery(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(PlugcountError::Delivery(format!("HTTP {status}: {text}")));
        }

        // Feishu answers 200 even for rejected messages and reports the
        // failure through a non-zero `code`.
        if self.format == WebhookFormat::Feishu {
            if let Ok(body) = serde_json::from_str::<serde_json::Value>(&text) {
                let code = body
                    .get("code")
                    .or_else(|| body.get("StatusCode"))
                    .and_then(|c| c.as_i64())
                    .unwrap_or(0);
                if code != 0 {
                    let msg = body
                        .get("msg")
                        .or_else(|| body.get("StatusMessage"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error");
                    return Err(PlugcountError::Delivery(format!(
                        "rejected with code {code}: {msg}"
                    )));
                }
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        self.format.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn notifier(url: String, format: WebhookFormat) -> WebhookNotifier {
        WebhookNotifier::new(url, format, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn feishu_payload_shape() {
        let payload = WebhookFormat::Feishu.payload(&SummaryMessage::from_text("hi"));
        assert_eq!(payload["msg_type"], "text");
        assert_eq!(payload["content"]["text"], "hi");
    }

    #[test]
    fn posts_feishu_message() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "msg_type": "text",
                "content": { "text": "Total plugins: 215" }
            })))
            .with_status(200)
            .with_body(r#"{"StatusCode":0,"StatusMessage":"success","code":0,"msg":"success"}"#)
            .create();

        let n = notifier(format!("{}/hook", server.url()), WebhookFormat::Feishu);
        n.send(&SummaryMessage::from_text("Total plugins: 215")).unwrap();
        mock.assert();
        assert_eq!(n.name(), "feishu");
    }

    #[test]
    fn posts_slack_message() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/services/T000")
            .match_body(Matcher::Json(serde_json::json!({ "text": "hello" })))
            .with_status(200)
            .with_body("ok")
            .create();

        let n = notifier(format!("{}/services/T000", server.url()), WebhookFormat::Slack);
        n.send(&SummaryMessage::from_text("hello")).unwrap();
        mock.assert();
    }

    #[test]
    fn non_success_status_is_delivery_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("boom")
            .create();

        let n = notifier(format!("{}/hook", server.url()), WebhookFormat::Feishu);
        let err = n.send(&SummaryMessage::from_text("x")).unwrap_err();
        assert!(matches!(err, PlugcountError::Delivery(_)));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn feishu_rejection_code_is_delivery_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .with_body(r#"{"code":19021,"msg":"sign match fail or timestamp is not within one hour from current time"}"#)
            .create();

        let n = notifier(format!("{}/hook", server.url()), WebhookFormat::Feishu);
        let err = n.send(&SummaryMessage::from_text("x")).unwrap_err();
        assert!(err.to_string().contains("code 19021"));
    }

    #[test]
    fn unreachable_endpoint_is_delivery_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let n = notifier("http://127.0.0.1:9/hook".to_string(), WebhookFormat::Feishu);
        let err = n.send(&SummaryMessage::from_text("x")).unwrap_err();
        assert!(matches!(err, PlugcountError::Delivery(_)));
    }
}
