//! User-facing message texts.

/// Greeting sent to a user whose support topic was just created.
pub const WELCOME: &str = "👋 Hi!\n\
If you have a technical question, include right away:\n\
• the server or its IP\n\
• the device showing the problem\n\
• a short note on where things go wrong\n\n\
ℹ️ Photos, videos and documents are welcome.";

/// Greeting for a returning user who already has a topic.
pub const WELCOME_BACK: &str = "👋 Hi again!\n\
If you have a technical question, include right away:\n\
• the server or its IP\n\
• the device showing the problem\n\
• a short note on where things go wrong\n\n\
ℹ️ Photos, videos and documents are welcome.";

/// Flow A failed — nothing was created.
pub const CREATION_FAILED: &str = "❌ Could not open your support request. Please try again later.";

/// User messaged before ever issuing /start.
pub const NOT_STARTED: &str = "⚠️ Please use /start first";

/// User→staff forward failed.
pub const SEND_FAILED: &str = "❌ Could not send your message. Please try again later.";

/// Topic has no mapped user (staff side).
pub const USER_NOT_FOUND: &str = "❌ No user is linked to this topic";

/// Staff→user forward failed.
pub const STAFF_SEND_FAILED: &str = "❌ Could not deliver the message to the user";

/// Admin command aborted on an internal failure.
pub const ADMIN_FAILED: &str = "❌ Command failed. Please try again later.";

/// Notice for a banned user trying to message support.
pub const BANNED_NOTICE: &str = "⛔ You are banned from support";

/// Notice sent when a ban is applied.
pub const BAN_APPLIED: &str = "⛔ You have been banned from support";

/// Notice sent when a ban is lifted.
pub const BAN_LIFTED: &str = "✅ Your ban has been lifted";

/// Header posted into a freshly created topic for the staff.
pub fn topic_info(user_name: &str, user_id: i64) -> String {
    format!("ℹ️ New support request\n\n👤 Name: {user_name}\n🆔 ID: {user_id}")
}

/// Staff-side confirmation for /ban and /unban.
pub fn ban_confirmation(user_id: i64, banned: bool) -> String {
    if banned {
        format!("User id:{user_id} banned")
    } else {
        format!("User id:{user_id} unbanned")
    }
}
