//! Telegram Bot API client — the relay's transport gateway.
//!
//! Native implementation over reqwest. The `Telegram` trait is the seam the
//! router is written against; `BotApi` is the real client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::de::DeserializeOwned;

use crate::error::TransportError;
use crate::telegram::types::{
    ApiResponse, ForumTopic, InlineKeyboardMarkup, Message, MessageId, Update, User,
};

/// Telegram caps forum topic names at 128 characters.
const MAX_TOPIC_NAME_CHARS: usize = 128;

/// `getUpdates` long-poll timeout.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Backoff after a failed poll cycle.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// The transport operations the relay needs from Telegram.
#[async_trait]
pub trait Telegram: Send + Sync {
    /// Create a forum topic in a supergroup; returns its thread id.
    /// The name is truncated to Telegram's 128-character bound.
    async fn create_forum_topic(&self, chat_id: i64, name: &str) -> Result<i64, TransportError>;

    /// Send text into a chat, optionally into a topic and/or with an inline
    /// keyboard attached.
    async fn send_message(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<i64, TransportError>;

    /// Copy a message into another chat without re-authoring it. Media and
    /// captions are carried as-is.
    async fn copy_message(
        &self,
        to_chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
        thread_id: Option<i64>,
    ) -> Result<i64, TransportError>;

    /// Reply to a message in its own chat (and topic, if any).
    async fn reply_to(&self, msg: &Message, text: &str) -> Result<i64, TransportError>;
}

/// Bot API client over HTTPS.
pub struct BotApi {
    token: String,
    client: reqwest::Client,
}

impl BotApi {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.token)
    }

    /// POST a method call and unwrap Telegram's response envelope.
    ///
    /// Telegram reports rejections inside the envelope (`ok: false` plus a
    /// description), including on non-2xx statuses, so the body is parsed
    /// unconditionally.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await?;

        let envelope: ApiResponse<T> = resp.json().await?;
        if !envelope.ok {
            return Err(TransportError::Api {
                method: method.into(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".into()),
            });
        }
        envelope.result.ok_or_else(|| TransportError::InvalidResponse {
            method: method.into(),
            reason: "ok response with no result".into(),
        })
    }

    /// Verify the token and identify the bot.
    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", serde_json::json!({})).await
    }

    /// One long-poll cycle.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"]
            }),
        )
        .await
    }
}

#[async_trait]
impl Telegram for BotApi {
    async fn create_forum_topic(&self, chat_id: i64, name: &str) -> Result<i64, TransportError> {
        let topic: ForumTopic = self
            .call(
                "createForumTopic",
                serde_json::json!({
                    "chat_id": chat_id,
                    "name": truncate_chars(name, MAX_TOPIC_NAME_CHARS),
                }),
            )
            .await?;
        Ok(topic.message_thread_id)
    }

    async fn send_message(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<i64, TransportError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(thread_id) = thread_id {
            body["message_thread_id"] = thread_id.into();
        }
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup)?;
        }
        let sent: MessageId = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }

    async fn copy_message(
        &self,
        to_chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
        thread_id: Option<i64>,
    ) -> Result<i64, TransportError> {
        let mut body = serde_json::json!({
            "chat_id": to_chat_id,
            "from_chat_id": from_chat_id,
            "message_id": message_id,
        });
        if let Some(thread_id) = thread_id {
            body["message_thread_id"] = thread_id.into();
        }
        let copied: MessageId = self.call("copyMessage", body).await?;
        Ok(copied.message_id)
    }

    async fn reply_to(&self, msg: &Message, text: &str) -> Result<i64, TransportError> {
        let mut body = serde_json::json!({
            "chat_id": msg.chat.id,
            "text": text,
            "reply_to_message_id": msg.message_id,
        });
        if let Some(thread_id) = msg.message_thread_id {
            body["message_thread_id"] = thread_id.into();
        }
        let sent: MessageId = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }
}

/// Spawn the long-poll loop and expose received messages as a stream.
///
/// Poll failures are logged and retried after a delay; the loop stops once
/// the consuming side of the stream is dropped.
pub fn spawn_update_stream(api: Arc<BotApi>) -> impl Stream<Item = Message> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut offset: i64 = 0;

        tracing::info!("Listening for Telegram updates...");

        loop {
            let updates = match api.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                // Advance offset past this update
                offset = offset.max(update.update_id + 1);

                let Some(message) = update.message else {
                    continue;
                };

                if tx.send(message).is_err() {
                    tracing::info!("Update receiver dropped; stopping poller");
                    return;
                }
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|msg| (msg, rx))
    })
}

/// Truncate to at most `max` characters without splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
