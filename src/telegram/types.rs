//! Telegram Bot API wire types — the subset the relay touches.

use serde::{Deserialize, Serialize};

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// An incoming message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    /// Forum topic the message belongs to, if any.
    #[serde(default)]
    pub message_thread_id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// The chat a message was posted in.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// "private", "group", "supergroup" or "channel".
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

/// A Telegram user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Display name: first + last name, with a numeric fallback when the
    /// profile carries no usable name.
    pub fn full_name(&self) -> String {
        let name = match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        };
        if name.trim().is_empty() {
            format!("User{}", self.id)
        } else {
            name
        }
    }
}

/// `createForumTopic` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ForumTopic {
    pub message_thread_id: i64,
    pub name: String,
}

/// Minimal view of a sent/copied message — `sendMessage` returns a full
/// Message and `copyMessage` a bare id; both carry `message_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageId {
    pub message_id: i64,
}

/// Inline keyboard attached to an outgoing message.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub url: String,
}

impl InlineKeyboardMarkup {
    /// Single-button keyboard deep-linking to a user's profile, so staff can
    /// open a direct conversation from the topic.
    pub fn user_link(user_id: i64) -> Self {
        Self {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "👤 User".into(),
                url: format!("tg://user?id={user_id}"),
            }]],
        }
    }
}
