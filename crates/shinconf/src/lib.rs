//! Minimal configuration loading for Shindig.
//!
//! This crate provides configuration loading with minimal dependencies,
//! designed to be imported by every Shindig crate without causing
//! circular dependency issues.
//!
//! # Configuration Philosophy
//!
//! Configuration is split into two categories:
//!
//! - **Room** (`RoomConfig`): Identity of the chat room and target playlist.
//!   Cannot change while the bot is running.
//!
//! - **Tuning** (`TuningConfig`): Timeouts, thresholds and intervals that
//!   shape approval flows and the queue-fill loop.
//!
//! # Usage
//!
//! ```rust,no_run
//! use shinconf::ShindigConfig;
//!
//! let config = ShindigConfig::load().expect("Failed to load config");
//!
//! println!("Playlist: {}", config.room.playlist_id);
//! println!("Queue ahead: {:?}", config.tuning.queue.ahead_duration());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/shindig/config.toml` (system)
//! 2. `~/.config/shindig/config.toml` (user)
//! 3. `./shindig.toml` (local override, replaceable via `--config`)
//! 4. Environment variables (`SHINDIG_*`)
//!
//! # Example Config
//!
//! ```toml
//! [room]
//! chat_id = "-1001234567890"
//! playlist_id = "4yNfoeS1Sv1DBwxnSSBtXK"
//!
//! [approvals]
//! confirm_timeout_secs = 60
//! admin_approval = true
//! community_reactions = 3
//!
//! [queue]
//! ahead_duration_secs = 600
//! check_interval_secs = 60
//!
//! [shadow]
//! maintenance_interval_secs = 30
//! max_age_hours = 3
//! ```

pub mod loader;
pub mod room;
pub mod tuning;

pub use loader::{ConfigSources, Loader};
pub use room::RoomConfig;
pub use tuning::{ApprovalsConfig, QueueConfig, ShadowConfig, TuningConfig};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file {path} is not valid TOML: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Complete Shindig configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShindigConfig {
    /// Room identity - cannot change at runtime.
    #[serde(default)]
    pub room: RoomConfig,

    /// Approval/queue/shadow tuning knobs.
    #[serde(flatten)]
    pub tuning: TuningConfig,
}

impl ShindigConfig {
    /// Load from the standard layers (see the crate docs for the order).
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Loader::new().load()?.0)
    }

    /// Load with `config_path` standing in for the local `./shindig.toml`
    /// layer. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        Ok(Loader::with_override(config_path).load()?.0)
    }

    /// Load and report which files and environment variables contributed.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Loader::new().load()
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# Shindig Configuration\n\n");

        output.push_str("[room]\n");
        output.push_str(&format!("chat_id = \"{}\"\n", self.room.chat_id));
        output.push_str(&format!("playlist_id = \"{}\"\n", self.room.playlist_id));

        output.push_str("\n[approvals]\n");
        let a = &self.tuning.approvals;
        output.push_str(&format!(
            "confirm_timeout_secs = {}\n",
            a.confirm_timeout_secs
        ));
        output.push_str(&format!(
            "admin_timeout_secs = {}\n",
            a.admin_timeout_secs
        ));
        output.push_str(&format!("admin_approval = {}\n", a.admin_approval));
        output.push_str(&format!(
            "admin_needs_approval = {}\n",
            a.admin_needs_approval
        ));
        output.push_str(&format!(
            "community_reactions = {}\n",
            a.community_reactions
        ));

        output.push_str("\n[queue]\n");
        let q = &self.tuning.queue;
        output.push_str(&format!(
            "ahead_duration_secs = {}\n",
            q.ahead_duration_secs
        ));
        output.push_str(&format!(
            "check_interval_secs = {}\n",
            q.check_interval_secs
        ));
        output.push_str(&format!(
            "track_approval_timeout_secs = {}\n",
            q.track_approval_timeout_secs
        ));
        output.push_str(&format!(
            "max_track_replacements = {}\n",
            q.max_track_replacements
        ));
        output.push_str(&format!("max_tracks_to_fetch = {}\n", q.max_tracks_to_fetch));

        output.push_str("\n[shadow]\n");
        let s = &self.tuning.shadow;
        output.push_str(&format!(
            "maintenance_interval_secs = {}\n",
            s.maintenance_interval_secs
        ));
        output.push_str(&format!("max_age_hours = {}\n", s.max_age_hours));
        output.push_str(&format!(
            "sync_warning_timeout_mins = {}\n",
            s.sync_warning_timeout_mins
        ));

        output
    }
}
