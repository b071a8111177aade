//! Periodic health loops: playback settings, bot permissions, and shadow
//! queue maintenance. None of these ever surface errors to chat users;
//! they drive the warning manager instead.

use crate::domain::RepeatMode;
use crate::services::Services;
use crate::warnings::WarningCategory;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Playback-settings poll period.
const SETTINGS_INTERVAL: Duration = Duration::from_secs(30);
/// Bot-permissions poll period.
const PERMISSIONS_INTERVAL: Duration = Duration::from_secs(60);

/// Watches shuffle/repeat compliance and auto-corrects before warning.
pub async fn settings_monitor(services: Arc<Services>) {
    let mut ticker = tokio::time::interval(SETTINGS_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = services.shutdown.cancelled() => break,
        }
        check_playback_settings(&services).await;
    }
}

async fn check_playback_settings(services: &Services) {
    let compliance = match services.streaming.check_playback_compliance().await {
        Ok(compliance) => compliance,
        Err(e) => {
            debug!(error = %e, "Compliance check failed");
            return;
        }
    };

    if compliance.is_optimal() {
        services.clear_warning(WarningCategory::Settings).await;
        return;
    }

    // Try to fix it ourselves before bothering the admins.
    let shuffle_fixed = match services.streaming.set_shuffle(false).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Could not switch shuffle off");
            false
        }
    };
    let repeat_fixed = match services.streaming.set_repeat(RepeatMode::Off).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Could not switch repeat off");
            false
        }
    };
    if shuffle_fixed && repeat_fixed {
        debug!("Playback settings corrected");
        return;
    }

    let issues = compliance.issues.join(", ");
    let message = services
        .lexicon
        .render("warn.settings", &[("issues", &issues)]);
    services
        .raise_warning(WarningCategory::Settings, &message)
        .await;
}

/// Verifies the bot still holds admin rights in the chat. Runs once
/// immediately, then on its interval.
pub async fn permissions_monitor(services: Arc<Services>) {
    check_permissions(&services).await;

    let mut ticker = tokio::time::interval(PERMISSIONS_INTERVAL);
    ticker.tick().await; // the immediate tick already ran above

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = services.shutdown.cancelled() => break,
        }
        check_permissions(&services).await;
    }
}

async fn check_permissions(services: &Services) {
    let chat = &services.frontend.chat;

    let me = match chat.me().await {
        Ok(me) => me,
        Err(e) => {
            debug!(error = %e, "Could not fetch bot identity");
            return;
        }
    };

    let status = match chat.chat_member_status(services.chat_id(), &me.user_id).await {
        Ok(status) => status,
        Err(e) => {
            debug!(error = %e, "Could not fetch bot membership");
            return;
        }
    };

    if status.is_privileged() {
        services.clear_warning(WarningCategory::Permissions).await;
    } else {
        warn!(?status, "Bot is not an admin in the chat");
        let message = services.lexicon.get("warn.permissions").to_string();
        services
            .raise_warning(WarningCategory::Permissions, &message)
            .await;
    }
}

/// Keeps the shadow queue honest: progression, reconciliation, eviction,
/// priority pruning, and the drift warning.
pub async fn shadow_maintenance_monitor(services: Arc<Services>) {
    let mut ticker =
        tokio::time::interval(services.config.tuning.shadow.maintenance_interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = services.shutdown.cancelled() => break,
        }
        run_shadow_maintenance(&services).await;
    }
}

async fn run_shadow_maintenance(services: &Services) {
    let streaming = &services.streaming;

    let current = match streaming.current_track_id().await {
        Ok(current) => current,
        Err(e) => {
            debug!(error = %e, "Could not read current track");
            None
        }
    };
    if let Some(current) = &current {
        services.shadow.on_current_track_changed(current);
    }

    match streaming.queue_track_ids().await {
        Ok(backend_ids) => services.shadow.reconcile(&backend_ids),
        Err(e) => debug!(error = %e, "Could not read backend queue"),
    }

    services
        .shadow
        .evict_older_than(services.config.tuning.shadow.max_age());

    services
        .priority
        .prune(current.as_ref(), &services.shadow.track_ids());

    let health = services
        .shadow
        .sync_health(services.config.tuning.shadow.sync_warning_timeout());
    if health.is_healthy() {
        services.clear_warning(WarningCategory::QueueSync).await;
    } else {
        warn!(?health, "Shadow queue drift detected");
        let message = services.lexicon.get("warn.queue_sync").to_string();
        services
            .raise_warning(WarningCategory::QueueSync, &message)
            .await;
    }
}
