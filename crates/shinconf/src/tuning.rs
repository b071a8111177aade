//! Tuning knobs: approval deadlines, queue-fill targets, shadow maintenance.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// All runtime tuning, grouped by subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TuningConfig {
    #[serde(default)]
    pub approvals: ApprovalsConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub shadow: ShadowConfig,
}

/// Deadlines and gate toggles for the approval flows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalsConfig {
    /// How long a requester has to confirm a disambiguated track.
    pub confirm_timeout_secs: u64,

    /// How long admins (and the community) have to decide on a request.
    pub admin_timeout_secs: u64,

    /// Whether non-admin requests go through admin approval at all.
    pub admin_approval: bool,

    /// Whether requests *from* admins also need a second admin's approval.
    pub admin_needs_approval: bool,

    /// Reactions required for community approval. 0 disables the community race.
    pub community_reactions: u32,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: 60,
            admin_timeout_secs: 180,
            admin_approval: false,
            admin_needs_approval: false,
            community_reactions: 0,
        }
    }
}

impl ApprovalsConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_secs(self.admin_timeout_secs)
    }
}

/// Queue-manager targets and the auto-DJ proposal window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Base target for remaining queue duration.
    pub ahead_duration_secs: u64,

    /// Queue-manager tick period.
    pub check_interval_secs: u64,

    /// Decision window for an auto-DJ proposal. Also padded onto the
    /// queue-ahead target so a proposal round can finish before the
    /// queue drains.
    pub track_approval_timeout_secs: u64,

    /// Rejections per proposal flow before replacements auto-approve.
    pub max_track_replacements: u32,

    /// Upper bound on playlist tracks fetched per fill pass.
    pub max_tracks_to_fetch: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            ahead_duration_secs: 600,
            check_interval_secs: 60,
            track_approval_timeout_secs: 300,
            max_track_replacements: 2,
            max_tracks_to_fetch: 10,
        }
    }
}

impl QueueConfig {
    pub fn ahead_duration(&self) -> Duration {
        Duration::from_secs(self.ahead_duration_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn track_approval_timeout(&self) -> Duration {
        Duration::from_secs(self.track_approval_timeout_secs)
    }

    /// The effective fill target: base plus the approval window.
    pub fn target_duration(&self) -> Duration {
        Duration::from_secs(self.ahead_duration_secs + self.track_approval_timeout_secs)
    }
}

/// Shadow-queue maintenance cadence and staleness thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShadowConfig {
    /// Maintenance loop period.
    pub maintenance_interval_secs: u64,

    /// Shadow items older than this are evicted.
    pub max_age_hours: u64,

    /// Inactivity threshold before the queue-sync warning fires.
    pub sync_warning_timeout_mins: u64,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            maintenance_interval_secs: 30,
            max_age_hours: 3,
            sync_warning_timeout_mins: 30,
        }
    }
}

impl ShadowConfig {
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 3600)
    }

    pub fn sync_warning_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_warning_timeout_mins * 60)
    }
}
