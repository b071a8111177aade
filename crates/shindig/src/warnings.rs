//! Deduplicated admin warnings, delivered by DM and cleaned up on recovery.
//!
//! For each category, at most one logical warning is active at a time no
//! matter how many admins it was broadcast to. Monitors call
//! [`WarningManager::should_send`] before composing a warning, so raising
//! is idempotent; once the condition resolves, [`WarningManager::clear`]
//! deletes the DMs it sent so stale alerts don't pile up.

use crate::capability::ChatFrontend;
use crate::error::{BotError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One deduplication key per failure condition the monitors watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCategory {
    /// No active playback device.
    Device,
    /// The bot lacks admin rights in the chat.
    Permissions,
    /// Shuffle/repeat drifted and could not be corrected.
    Settings,
    /// Shadow queue and streaming backend disagree.
    QueueSync,
}

impl std::fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WarningCategory::Device => "device",
            WarningCategory::Permissions => "permissions",
            WarningCategory::Settings => "settings",
            WarningCategory::QueueSync => "queue_sync",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Default)]
struct CategoryState {
    active: bool,
    /// admin user id -> DM message id, for cleanup on resolution.
    sent: HashMap<String, String>,
}

pub struct WarningManager {
    chat: Arc<dyn ChatFrontend>,
    state: Mutex<HashMap<WarningCategory, CategoryState>>,
}

impl WarningManager {
    pub fn new(chat: Arc<dyn ChatFrontend>) -> Self {
        Self {
            chat,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a warning for this category is due (i.e. not already active).
    pub fn should_send(&self, category: WarningCategory) -> bool {
        !self.is_active(category)
    }

    pub fn is_active(&self, category: WarningCategory) -> bool {
        self.state
            .lock()
            .unwrap()
            .get(&category)
            .map(|s| s.active)
            .unwrap_or(false)
    }

    /// DM `message` to every admin and mark the category active.
    ///
    /// The active flag is set before any I/O so a failing send cannot cause
    /// a retry storm from the periodic monitors. Per-admin failures are
    /// logged; the call errors only if at least one send failed.
    pub async fn send_to_admins(
        &self,
        category: WarningCategory,
        admin_ids: &[String],
        message: &str,
    ) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .entry(category)
            .or_default()
            .active = true;

        let mut sent = HashMap::new();
        let mut failures = 0usize;

        for admin_id in admin_ids {
            match self.chat.send_direct_message(admin_id, message).await {
                Ok(message_id) => {
                    sent.insert(admin_id.clone(), message_id);
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        warning.category = %category,
                        admin.id = %admin_id,
                        error = %e,
                        "Failed to DM admin warning"
                    );
                }
            }
        }

        self.state
            .lock()
            .unwrap()
            .entry(category)
            .or_default()
            .sent
            .extend(sent);

        if failures > 0 {
            return Err(BotError::Transport(format!(
                "warning '{}' failed to reach {} admin(s)",
                category, failures
            )));
        }

        Ok(())
    }

    /// Mark the category resolved and delete the DMs it produced.
    ///
    /// State flips under the lock; message deletion is best-effort I/O that
    /// runs after the lock is released.
    pub async fn clear(&self, category: WarningCategory) {
        let to_delete: Vec<(String, String)> = {
            let mut state = self.state.lock().unwrap();
            let Some(cat) = state.get_mut(&category) else {
                return;
            };
            if !cat.active {
                return;
            }
            cat.active = false;
            cat.sent.drain().collect()
        };

        for (admin_id, message_id) in to_delete {
            if let Err(e) = self.chat.delete_message(&admin_id, &message_id).await {
                debug!(
                    warning.category = %category,
                    admin.id = %admin_id,
                    error = %e,
                    "Failed to delete resolved warning DM"
                );
            }
        }
    }
}
