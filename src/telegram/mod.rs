//! Telegram Bot API integration — wire types and the transport gateway.

pub mod api;
pub mod types;

pub use api::{BotApi, Telegram, spawn_update_stream};
pub use types::{Chat, InlineKeyboardMarkup, Message, Update, User};
