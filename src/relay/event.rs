//! Route classification for inbound messages.
//!
//! One pure function decides which flow handles a message, in a fixed
//! precedence order: origin chat first, then command token, then the
//! forwarding fallback.

use crate::telegram::types::Message;

/// Recognized command tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Ban,
    Unban,
}

/// Parse a command token from message text.
///
/// Accepts an optional `@botname` suffix and trailing arguments; anything
/// else is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.trim_start().split_whitespace().next()?;
    let token = first.strip_prefix('/')?;
    let token = token.split('@').next().unwrap_or(token);
    match token {
        "start" => Some(Command::Start),
        "ban" => Some(Command::Ban),
        "unban" => Some(Command::Unban),
        _ => None,
    }
}

/// Which administrative action a command maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Ban,
    Unban,
}

/// Where an inbound message is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/start` in a private chat.
    Initiate,
    /// Any other private message — forward into the user's topic.
    UserForward,
    /// Staff message inside a topic — forward to the mapped user.
    StaffReply,
    /// `/ban` or `/unban` inside a topic.
    Admin(AdminAction),
    /// Nothing to do.
    Ignore,
}

/// Classify a message.
///
/// Staff-side messages outside a topic, private messages without a sender,
/// and anything from unrelated chats are ignored without side effects.
pub fn classify(msg: &Message, support_group_id: i64) -> Route {
    let command = msg.text.as_deref().and_then(parse_command);

    if msg.chat.id == support_group_id {
        if msg.message_thread_id.is_none() {
            return Route::Ignore;
        }
        return match command {
            Some(Command::Ban) => Route::Admin(AdminAction::Ban),
            Some(Command::Unban) => Route::Admin(AdminAction::Unban),
            // /start has no staff-side meaning; it forwards like any reply
            _ => Route::StaffReply,
        };
    }

    if msg.chat.is_private() {
        if msg.from.is_none() {
            return Route::Ignore;
        }
        return match command {
            Some(Command::Start) => Route::Initiate,
            // /ban and /unban are only valid in the support group
            _ => Route::UserForward,
        };
    }

    Route::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::types::{Chat, User};

    const SUPPORT: i64 = -100_123;

    fn private(text: Option<&str>, with_sender: bool) -> Message {
        Message {
            message_id: 1,
            chat: Chat {
                id: 42,
                kind: "private".into(),
            },
            from: with_sender.then(|| User {
                id: 42,
                first_name: "Alice".into(),
                last_name: None,
                username: None,
            }),
            message_thread_id: None,
            text: text.map(String::from),
        }
    }

    fn support(text: Option<&str>, thread_id: Option<i64>) -> Message {
        Message {
            message_id: 2,
            chat: Chat {
                id: SUPPORT,
                kind: "supergroup".into(),
            },
            from: Some(User {
                id: 7,
                first_name: "Staff".into(),
                last_name: None,
                username: None,
            }),
            message_thread_id: thread_id,
            text: text.map(String::from),
        }
    }

    #[test]
    fn parse_command_recognizes_tokens() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/ban"), Some(Command::Ban));
        assert_eq!(parse_command("/unban"), Some(Command::Unban));
    }

    #[test]
    fn parse_command_strips_bot_suffix_and_args() {
        assert_eq!(parse_command("/start@support_bot"), Some(Command::Start));
        assert_eq!(parse_command("/ban reason goes here"), Some(Command::Ban));
        assert_eq!(parse_command("  /unban@support_bot now"), Some(Command::Unban));
    }

    #[test]
    fn parse_command_rejects_non_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command("/restart"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("text with /start inside"), None);
    }

    #[test]
    fn start_in_private_chat_initiates() {
        assert_eq!(classify(&private(Some("/start"), true), SUPPORT), Route::Initiate);
    }

    #[test]
    fn private_text_forwards() {
        assert_eq!(
            classify(&private(Some("my server is down"), true), SUPPORT),
            Route::UserForward
        );
    }

    #[test]
    fn private_media_without_text_forwards() {
        assert_eq!(classify(&private(None, true), SUPPORT), Route::UserForward);
    }

    #[test]
    fn private_without_sender_is_ignored() {
        assert_eq!(classify(&private(Some("/start"), false), SUPPORT), Route::Ignore);
        assert_eq!(classify(&private(Some("hello"), false), SUPPORT), Route::Ignore);
    }

    #[test]
    fn ban_in_private_chat_is_not_a_command() {
        // Origin chat wins over command token
        assert_eq!(classify(&private(Some("/ban"), true), SUPPORT), Route::UserForward);
    }

    #[test]
    fn support_topic_message_is_staff_reply() {
        assert_eq!(
            classify(&support(Some("try restarting"), Some(1001)), SUPPORT),
            Route::StaffReply
        );
        assert_eq!(classify(&support(None, Some(1001)), SUPPORT), Route::StaffReply);
    }

    #[test]
    fn ban_in_topic_is_admin() {
        assert_eq!(
            classify(&support(Some("/ban"), Some(1001)), SUPPORT),
            Route::Admin(AdminAction::Ban)
        );
        assert_eq!(
            classify(&support(Some("/unban"), Some(1001)), SUPPORT),
            Route::Admin(AdminAction::Unban)
        );
    }

    #[test]
    fn start_in_topic_forwards_like_any_reply() {
        assert_eq!(
            classify(&support(Some("/start"), Some(1001)), SUPPORT),
            Route::StaffReply
        );
    }

    #[test]
    fn support_message_outside_topic_is_ignored() {
        assert_eq!(classify(&support(Some("/ban"), None), SUPPORT), Route::Ignore);
        assert_eq!(classify(&support(Some("general chat"), None), SUPPORT), Route::Ignore);
    }

    #[test]
    fn unrelated_group_is_ignored() {
        let mut msg = support(Some("/ban"), Some(1001));
        msg.chat.id = -100_999;
        assert_eq!(classify(&msg, SUPPORT), Route::Ignore);
    }
}
