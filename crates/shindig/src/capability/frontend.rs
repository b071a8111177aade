//! Chat-frontend contract and optional approval capabilities.

use crate::domain::{BotIdentity, MemberStatus, MessageOrigin, QueueDecision, Track, TrackId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use trackline::RawMessage;

/// The chat transport the bot lives in.
///
/// Implementations wrap a concrete platform client (long polling, webhooks,
/// whatever). All methods may suspend; errors map to
/// [`BotError::Transport`](crate::error::BotError::Transport).
#[async_trait]
pub trait ChatFrontend: Send + Sync {
    /// Connect and begin receiving messages.
    async fn start(&self) -> Result<()>;

    /// Disconnect. Pending `next_message` calls return `None` afterwards.
    async fn stop(&self) -> Result<()>;

    /// The next inbound chat message, or `None` when the stream ends.
    async fn next_message(&self) -> Result<Option<RawMessage>>;

    /// Send a text message, optionally as a reply. Returns the new message id.
    async fn send_text(
        &self,
        chat_id: &str,
        reply_to: Option<&str>,
        text: &str,
    ) -> Result<String>;

    /// React to a message with an emoji.
    async fn react(&self, chat_id: &str, message_id: &str, emoji: &str) -> Result<()>;

    /// Replace a message's text (used to strip interactive buttons).
    async fn edit_message(&self, chat_id: &str, message_id: &str, text: &str) -> Result<()>;

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()>;

    /// Send a DM to a single user. Returns the sent message id.
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<String>;

    /// Ask the requester to confirm a prompt; resolves to their answer, or
    /// an [`ApprovalTimeout`](crate::error::BotError::ApprovalTimeout) error.
    async fn await_approval(
        &self,
        origin: &MessageOrigin,
        prompt: &str,
        timeout: Duration,
    ) -> Result<bool>;

    /// Post an interactive approve/reject message for an auto-DJ pick.
    /// The eventual button press arrives through the registered decision
    /// sender, keyed by track id.
    async fn send_queue_track_approval(
        &self,
        chat_id: &str,
        track_id: &TrackId,
        text: &str,
    ) -> Result<String>;

    /// Register where button-press decisions should be delivered.
    fn set_queue_decision_sender(&self, tx: mpsc::UnboundedSender<QueueDecision>);

    async fn is_user_admin(&self, chat_id: &str, user_id: &str) -> Result<bool>;

    async fn admin_user_ids(&self, chat_id: &str) -> Result<Vec<String>>;

    /// The bot's own identity on the platform.
    async fn me(&self) -> Result<BotIdentity>;

    async fn chat_member_status(&self, chat_id: &str, user_id: &str) -> Result<MemberStatus>;
}

/// Optional: route a request to admins with inline approve/deny buttons.
#[async_trait]
pub trait AdminApproval: Send + Sync {
    /// Whether the deployment has admin approval switched on.
    fn is_enabled(&self) -> bool;

    /// Block until an admin decides or the timeout elapses.
    async fn await_admin_approval(
        &self,
        origin: &MessageOrigin,
        track: &Track,
        mood: &str,
        timeout: Duration,
    ) -> Result<bool>;
}

/// Optional: let the room approve a request by piling reactions onto it.
#[async_trait]
pub trait CommunityApproval: Send + Sync {
    /// Block until `required` reactions accumulate (the requester's own
    /// reaction does not count) or the threshold becomes unreachable or the
    /// timeout elapses.
    async fn await_community_approval(
        &self,
        message_id: &str,
        required: u32,
        timeout: Duration,
        requester_user_id: &str,
    ) -> Result<bool>;
}

/// Optional: abort an in-flight admin approval early.
#[async_trait]
pub trait CancelAdminApproval: Send + Sync {
    async fn cancel_admin_approval(&self, origin: &MessageOrigin) -> Result<()>;
}

/// A chat frontend plus its optional capabilities, probed once at
/// construction.
#[derive(Clone)]
pub struct Frontend {
    pub chat: Arc<dyn ChatFrontend>,
    pub admin_approval: Option<Arc<dyn AdminApproval>>,
    pub community_approval: Option<Arc<dyn CommunityApproval>>,
    pub cancel_admin_approval: Option<Arc<dyn CancelAdminApproval>>,
}

impl Frontend {
    pub fn new(chat: Arc<dyn ChatFrontend>) -> Self {
        Self {
            chat,
            admin_approval: None,
            community_approval: None,
            cancel_admin_approval: None,
        }
    }

    pub fn with_admin_approval(mut self, cap: Arc<dyn AdminApproval>) -> Self {
        self.admin_approval = Some(cap);
        self
    }

    pub fn with_community_approval(mut self, cap: Arc<dyn CommunityApproval>) -> Self {
        self.community_approval = Some(cap);
        self
    }

    pub fn with_cancel_admin_approval(mut self, cap: Arc<dyn CancelAdminApproval>) -> Self {
        self.cancel_admin_approval = Some(cap);
        self
    }

    /// Whether non-admin requests must pass admin approval.
    pub fn admin_approval_enabled(&self) -> bool {
        self.admin_approval
            .as_ref()
            .map(|cap| cap.is_enabled())
            .unwrap_or(false)
    }
}
