//! Shared wiring for all subsystems: injected capabilities plus the bot's
//! own state holders, bundled behind one `Arc`.

use crate::capability::{Frontend, LinkResolver, LlmAssist, StreamingBackend};
use crate::dedup::DedupSet;
use crate::flows::FlowRegistry;
use crate::lexicon::Lexicon;
use crate::priority::PriorityRegistry;
use crate::shadow::ShadowQueue;
use crate::wake::{wake_channel, WakeReceiver, WakeSender};
use crate::warnings::{WarningCategory, WarningManager};
use shinconf::ShindigConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct Services {
    pub config: ShindigConfig,
    pub providers: trackline::Providers,
    pub lexicon: Lexicon,

    // Injected capabilities
    pub frontend: Frontend,
    pub streaming: Arc<dyn StreamingBackend>,
    pub llm: Arc<dyn LlmAssist>,
    pub resolver: Arc<dyn LinkResolver>,

    // Owned state
    pub dedup: DedupSet,
    pub shadow: ShadowQueue,
    pub flows: FlowRegistry,
    pub warnings: WarningManager,
    pub priority: PriorityRegistry,

    pub wake: WakeSender,
    pub shutdown: CancellationToken,
}

impl Services {
    /// Wire up the bot. The returned [`WakeReceiver`] goes to the queue
    /// manager; everything else shares the `Services`.
    pub fn new(
        config: ShindigConfig,
        frontend: Frontend,
        streaming: Arc<dyn StreamingBackend>,
        llm: Arc<dyn LlmAssist>,
        resolver: Arc<dyn LinkResolver>,
    ) -> (Self, WakeReceiver) {
        let (wake, wake_rx) = wake_channel();
        let warnings = WarningManager::new(frontend.chat.clone());

        let services = Self {
            config,
            providers: trackline::Providers::default(),
            lexicon: Lexicon::default(),
            frontend,
            streaming,
            llm,
            resolver,
            dedup: DedupSet::new(),
            shadow: ShadowQueue::new(),
            flows: FlowRegistry::new(),
            warnings,
            priority: PriorityRegistry::new(),
            wake,
            shutdown: CancellationToken::new(),
        };

        (services, wake_rx)
    }

    pub fn chat_id(&self) -> &str {
        &self.config.room.chat_id
    }

    pub fn playlist_id(&self) -> &str {
        &self.config.room.playlist_id
    }

    /// Raise a warning for `category` unless it is already active.
    ///
    /// Admin enumeration and DM failures are logged and swallowed; the
    /// monitors calling this must keep ticking regardless.
    pub async fn raise_warning(&self, category: WarningCategory, message: &str) {
        if !self.warnings.should_send(category) {
            return;
        }

        let admin_ids = match self.frontend.chat.admin_user_ids(self.chat_id()).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(warning.category = %category, error = %e, "Could not enumerate admins for warning");
                return;
            }
        };

        if let Err(e) = self
            .warnings
            .send_to_admins(category, &admin_ids, message)
            .await
        {
            warn!(warning.category = %category, error = %e, "Warning delivery incomplete");
        }
    }

    pub async fn clear_warning(&self, category: WarningCategory) {
        self.warnings.clear(category).await;
    }
}
