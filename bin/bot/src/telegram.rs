//! Minimal Telegram Bot API client.
//!
//! Only the two methods the bot needs are implemented: `getUpdates` for
//! long polling and `sendMessage` for replies. Requests go out as JSON
//! POSTs to `{api_url}/bot{token}/{method}`.

use crate::config::TelegramConfig;
use crate::error::TelegramError;
use gatehouse_core::ChatUserId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Extra time the HTTP client waits beyond the long-poll timeout.
const POLL_GRACE_SECONDS: u64 = 10;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// An incoming update. Only messages are requested.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// A text message ready for the conversation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    /// Who sent it; sessions are keyed by this.
    pub user: ChatUserId,
    /// Where replies go.
    pub chat_id: i64,
    pub text: String,
}

impl Update {
    /// Extracts the text message, if this update carries one.
    #[must_use]
    pub fn into_incoming(self) -> Option<Incoming> {
        let message = self.message?;
        let text = message.text?;
        let sender = message.from.map_or(message.chat.id, |user| user.id);
        Some(Incoming {
            user: ChatUserId::new(sender),
            chat_id: message.chat.id,
            text,
        })
    }
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    poll_timeout_seconds: u64,
}

impl TelegramClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config.poll_timeout_seconds + POLL_GRACE_SECONDS,
            ))
            .build()
            .map_err(|e| TelegramError::Client {
                details: e.without_url().to_string(),
            })?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
            poll_timeout_seconds: config.poll_timeout_seconds,
        })
    }

    /// Long-polls for updates after `offset`.
    #[instrument(skip(self))]
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &GetUpdates {
                    offset,
                    timeout: self.poll_timeout_seconds,
                    allowed_updates: &["message"],
                },
            )
            .await?;
        debug!(count = updates.len(), "received updates");
        Ok(updates)
    }

    /// Sends a plain text message to a chat.
    #[instrument(skip(self, text))]
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _sent: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id, text })
            .await?;
        Ok(())
    }

    async fn call<P, T>(&self, method: &'static str, payload: &P) -> Result<T, TelegramError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        // The URL carries the token, so it is stripped from every error.
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(|e| TelegramError::Request {
                method,
                details: e.without_url().to_string(),
            })?;

        let body = response.bytes().await.map_err(|e| TelegramError::Request {
            method,
            details: e.without_url().to_string(),
        })?;

        decode(method, &body)
    }
}

fn decode<T: DeserializeOwned>(method: &'static str, body: &[u8]) -> Result<T, TelegramError> {
    let envelope: ApiResponse<T> =
        serde_json::from_slice(body).map_err(|e| TelegramError::Decode {
            method,
            details: e.to_string(),
        })?;

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { ok: true, .. } => Err(TelegramError::Decode {
            method,
            details: "missing result".to_string(),
        }),
        ApiResponse { description, .. } => Err(TelegramError::Api {
            method,
            description: description.unwrap_or_else(|| "no description".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_and_non_text_updates() {
        let body = br#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "date": 0,
                    "chat": {"id": 42, "type": "private"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Juan"},
                    "text": "/start"}},
                {"update_id": 11, "message": {"message_id": 2, "date": 0,
                    "chat": {"id": 42, "type": "private"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Juan"},
                    "sticker": {}}},
                {"update_id": 12, "edited_message": {}}
            ]
        }"#;
        let updates: Vec<Update> = decode("getUpdates", body).expect("decodes");
        assert_eq!(updates.len(), 3);

        let incoming: Vec<_> = updates
            .into_iter()
            .filter_map(Update::into_incoming)
            .collect();
        assert_eq!(
            incoming,
            vec![Incoming {
                user: ChatUserId::new(42),
                chat_id: 42,
                text: "/start".to_string(),
            }]
        );
    }

    #[test]
    fn sender_defaults_to_chat_when_from_is_missing() {
        let update = Update {
            update_id: 1,
            message: Some(Message {
                message_id: 1,
                chat: Chat { id: -100 },
                from: None,
                text: Some("hi".to_string()),
            }),
        };
        let incoming = update.into_incoming().expect("text message");
        assert_eq!(incoming.user, ChatUserId::new(-100));
    }

    #[test]
    fn api_errors_carry_description() {
        let body = br#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let err = decode::<Vec<Update>>("getUpdates", body).expect_err("rejected");
        assert_eq!(
            err,
            TelegramError::Api {
                method: "getUpdates",
                description: "Unauthorized".to_string(),
            }
        );
    }

    #[test]
    fn successful_send_decodes_into_any_value() {
        let body = br#"{"ok": true, "result": {"message_id": 7, "chat": {"id": 42}}}"#;
        let sent: serde_json::Value = decode("sendMessage", body).expect("decodes");
        assert_eq!(sent["message_id"], 7);
    }

    #[test]
    fn ok_without_result_is_a_decode_error() {
        let err = decode::<Vec<Update>>("getUpdates", br#"{"ok": true}"#).expect_err("no result");
        assert_eq!(
            err,
            TelegramError::Decode {
                method: "getUpdates",
                details: "missing result".to_string(),
            }
        );
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode::<Vec<Update>>("getUpdates", b"<html>").expect_err("garbage");
        assert!(matches!(err, TelegramError::Decode { .. }));
    }

    #[test]
    fn base_url_tolerates_trailing_slash() {
        let client = TelegramClient::new(&TelegramConfig {
            token: "abc:def".to_string(),
            api_url: "http://localhost:8081/".to_string(),
            poll_timeout_seconds: 1,
        })
        .expect("client builds");
        assert_eq!(client.base_url, "http://localhost:8081/botabc:def");
    }
}
