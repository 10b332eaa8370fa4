//! The relay router — classifies each inbound message and runs the
//! corresponding flow.
//!
//! Four flows: user initiation, user→staff forwarding, staff→user
//! forwarding, and ban administration. Every flow resolves its own failures
//! into a user-facing reply and a logged diagnostic; `handle` never
//! propagates an error to the dispatch loop.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::Error;
use crate::relay::event::{AdminAction, Route, classify};
use crate::relay::templates;
use crate::store::{CreateMapping, IdentityStore};
use crate::telegram::api::Telegram;
use crate::telegram::types::{InlineKeyboardMarkup, Message, User};

/// Routes inbound messages between users and the support group.
///
/// Holds no durable state of its own; everything shared lives in the
/// identity store, and every lookup is treated as possibly stale the moment
/// it returns.
pub struct RelayRouter {
    store: Arc<dyn IdentityStore>,
    telegram: Arc<dyn Telegram>,
    support_group_id: i64,
}

impl RelayRouter {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        telegram: Arc<dyn Telegram>,
        support_group_id: i64,
    ) -> Self {
        Self {
            store,
            telegram,
            support_group_id,
        }
    }

    /// Handle one inbound message.
    pub async fn handle(&self, msg: Message) {
        match classify(&msg, self.support_group_id) {
            Route::Initiate => self.initiate(&msg).await,
            Route::UserForward => self.forward_user_message(&msg).await,
            Route::StaffReply => self.forward_staff_reply(&msg).await,
            Route::Admin(action) => self.admin(&msg, action).await,
            Route::Ignore => {}
        }
    }

    // ── Flow A: initiation ──────────────────────────────────────────

    async fn initiate(&self, msg: &Message) {
        let Some(user) = msg.from.clone() else { return };

        // A banned user gets no response at all here: /start must not
        // reveal the ban through differential behavior.
        match self.store.is_banned(user.id).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                error!(user_id = user.id, "Ban check failed: {e}");
                self.notify_user(user.id, templates::CREATION_FAILED).await;
                return;
            }
        }

        if let Err(e) = self.initiate_inner(&user).await {
            error!(user_id = user.id, "Initiation failed: {e}");
            self.notify_user(user.id, templates::CREATION_FAILED).await;
        }
    }

    async fn initiate_inner(&self, user: &User) -> Result<(), Error> {
        if let Some(topic_id) = self.store.topic_for_user(user.id).await? {
            debug!(user_id = user.id, topic_id, "Topic already open");
            self.telegram
                .send_message(user.id, None, templates::WELCOME_BACK, None)
                .await?;
            return Ok(());
        }

        let name = user.full_name();
        let topic_id = self
            .telegram
            .create_forum_topic(self.support_group_id, &name)
            .await?;

        // The mapping must be durable before either outward message, so a
        // message arriving concurrently from the same user sees it.
        match self.store.create_mapping(user.id, topic_id).await? {
            CreateMapping::Created => {}
            CreateMapping::AlreadyExists => {
                // Lost a concurrent /start race; the winner's topic stands.
                info!(
                    user_id = user.id,
                    orphan_topic = topic_id,
                    "Duplicate initiation, keeping existing mapping"
                );
                self.telegram
                    .send_message(user.id, None, templates::WELCOME_BACK, None)
                    .await?;
                return Ok(());
            }
        }

        info!(user_id = user.id, topic_id, "Support topic created");

        self.telegram
            .send_message(user.id, None, templates::WELCOME, None)
            .await?;
        self.telegram
            .send_message(
                self.support_group_id,
                Some(topic_id),
                &templates::topic_info(&name, user.id),
                Some(InlineKeyboardMarkup::user_link(user.id)),
            )
            .await?;
        Ok(())
    }

    // ── Flow B: user → staff ────────────────────────────────────────

    async fn forward_user_message(&self, msg: &Message) {
        let Some(user) = msg.from.clone() else { return };

        match self.store.is_banned(user.id).await {
            Ok(true) => {
                // Fire-and-forget: the banned user may have blocked the bot.
                self.notify_user(user.id, templates::BANNED_NOTICE).await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!(user_id = user.id, "Ban check failed: {e}");
                self.notify_user(user.id, templates::SEND_FAILED).await;
                return;
            }
        }

        if let Err(e) = self.forward_user_inner(msg, user.id).await {
            error!(user_id = user.id, "User forward failed: {e}");
            self.notify_user(user.id, templates::SEND_FAILED).await;
        }
    }

    async fn forward_user_inner(&self, msg: &Message, user_id: i64) -> Result<(), Error> {
        let Some(topic_id) = self.store.topic_for_user(user_id).await? else {
            self.telegram
                .send_message(user_id, None, templates::NOT_STARTED, None)
                .await?;
            return Ok(());
        };

        self.telegram
            .copy_message(
                self.support_group_id,
                msg.chat.id,
                msg.message_id,
                Some(topic_id),
            )
            .await?;
        Ok(())
    }

    // ── Flow C: staff → user ────────────────────────────────────────

    async fn forward_staff_reply(&self, msg: &Message) {
        let Some(topic_id) = msg.message_thread_id else { return };

        if let Err(e) = self.forward_staff_inner(msg, topic_id).await {
            error!(topic_id, "Staff forward failed: {e}");
            self.reply_best_effort(msg, templates::STAFF_SEND_FAILED).await;
        }
    }

    async fn forward_staff_inner(&self, msg: &Message, topic_id: i64) -> Result<(), Error> {
        let Some(user_id) = self.store.user_for_topic(topic_id).await? else {
            self.telegram.reply_to(msg, templates::USER_NOT_FOUND).await?;
            return Ok(());
        };

        self.telegram
            .copy_message(user_id, msg.chat.id, msg.message_id, None)
            .await?;
        Ok(())
    }

    // ── Flow D: ban administration ──────────────────────────────────

    async fn admin(&self, msg: &Message, action: AdminAction) {
        let Some(topic_id) = msg.message_thread_id else { return };

        if let Err(e) = self.admin_inner(msg, topic_id, action).await {
            error!(topic_id, ?action, "Admin command failed: {e}");
            self.reply_best_effort(msg, templates::ADMIN_FAILED).await;
        }
    }

    async fn admin_inner(
        &self,
        msg: &Message,
        topic_id: i64,
        action: AdminAction,
    ) -> Result<(), Error> {
        let Some(user_id) = self.store.user_for_topic(topic_id).await? else {
            self.telegram.reply_to(msg, templates::USER_NOT_FOUND).await?;
            return Ok(());
        };

        let banned = matches!(action, AdminAction::Ban);
        self.store.set_banned(user_id, banned).await?;
        info!(user_id, banned, "Ban state updated");

        self.telegram
            .reply_to(msg, &templates::ban_confirmation(user_id, banned))
            .await?;

        // Fire-and-forget: the admin command must not fail on an
        // unreachable user.
        let notice = if banned {
            templates::BAN_APPLIED
        } else {
            templates::BAN_LIFTED
        };
        self.notify_user(user_id, notice).await;
        Ok(())
    }

    // ── Best-effort sends ───────────────────────────────────────────

    /// Text to a user's private chat; failures are logged and swallowed
    /// (the user may have blocked the bot).
    async fn notify_user(&self, user_id: i64, text: &str) {
        if let Err(e) = self.telegram.send_message(user_id, None, text, None).await {
            debug!(user_id, "User notification dropped: {e}");
        }
    }

    /// In-thread reply; failures are logged and swallowed.
    async fn reply_best_effort(&self, msg: &Message, text: &str) {
        if let Err(e) = self.telegram.reply_to(msg, text).await {
            debug!(chat_id = msg.chat.id, "Reply dropped: {e}");
        }
    }
}
