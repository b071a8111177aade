//! Layered config loading: files, CLI override, environment.

use crate::{ConfigError, ShindigConfig};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Every path and environment prefix is derived from this.
const APP_NAME: &str = "shindig";

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Runs the configuration layers in order: compiled defaults, system file,
/// user file, local (or CLI-supplied) file, then `SHINDIG_*` environment
/// variables. Later layers win.
#[derive(Debug, Default)]
pub struct Loader {
    override_path: Option<PathBuf>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `path` in place of the local `./shindig.toml` layer. System and
    /// user files still load first.
    pub fn with_override(path: Option<&Path>) -> Self {
        Self {
            override_path: path.map(Path::to_path_buf),
        }
    }

    /// Apply all layers and report which sources contributed.
    pub fn load(&self) -> Result<(ShindigConfig, ConfigSources), ConfigError> {
        let mut config = ShindigConfig::default();
        let mut sources = ConfigSources::default();

        for path in self.layer_paths() {
            if !path.exists() {
                continue;
            }
            apply_overlay(&mut config, read_overlay(&path)?);
            sources.files.push(path);
        }

        overlay_env(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Candidate files, lowest precedence first. Existence is checked at
    /// load time, not here.
    fn layer_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(format!("/etc/{APP_NAME}/config.toml"))];

        if let Some(base) = directories::BaseDirs::new() {
            paths.push(base.config_dir().join(APP_NAME).join("config.toml"));
        }

        // A CLI-supplied path stands in for the local layer entirely; an
        // explicit --config that doesn't exist must not silently fall back.
        paths.push(match &self.override_path {
            Some(path) => path.clone(),
            None => PathBuf::from(format!("{APP_NAME}.toml")),
        });

        paths
    }
}

/// A partially-specified config as read from one file. Absent fields
/// leave the previous layer untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverlay {
    #[serde(default)]
    room: RoomOverlay,
    #[serde(default)]
    approvals: ApprovalsOverlay,
    #[serde(default)]
    queue: QueueOverlay,
    #[serde(default)]
    shadow: ShadowOverlay,
}

#[derive(Debug, Default, Deserialize)]
struct RoomOverlay {
    chat_id: Option<String>,
    playlist_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalsOverlay {
    confirm_timeout_secs: Option<u64>,
    admin_timeout_secs: Option<u64>,
    admin_approval: Option<bool>,
    admin_needs_approval: Option<bool>,
    community_reactions: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct QueueOverlay {
    ahead_duration_secs: Option<u64>,
    check_interval_secs: Option<u64>,
    track_approval_timeout_secs: Option<u64>,
    max_track_replacements: Option<u32>,
    max_tracks_to_fetch: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ShadowOverlay {
    maintenance_interval_secs: Option<u64>,
    max_age_hours: Option<u64>,
    sync_warning_timeout_mins: Option<u64>,
}

fn read_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&text).map_err(|e| ConfigError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply an overlay onto the config, field by field.
fn apply_overlay(config: &mut ShindigConfig, overlay: ConfigOverlay) {
    macro_rules! set {
        ($dst:expr, $src:expr) => {
            if let Some(v) = $src {
                $dst = v;
            }
        };
    }

    set!(config.room.chat_id, overlay.room.chat_id);
    set!(config.room.playlist_id, overlay.room.playlist_id);

    let a = &mut config.tuning.approvals;
    set!(a.confirm_timeout_secs, overlay.approvals.confirm_timeout_secs);
    set!(a.admin_timeout_secs, overlay.approvals.admin_timeout_secs);
    set!(a.admin_approval, overlay.approvals.admin_approval);
    set!(a.admin_needs_approval, overlay.approvals.admin_needs_approval);
    set!(a.community_reactions, overlay.approvals.community_reactions);

    let q = &mut config.tuning.queue;
    set!(q.ahead_duration_secs, overlay.queue.ahead_duration_secs);
    set!(q.check_interval_secs, overlay.queue.check_interval_secs);
    set!(
        q.track_approval_timeout_secs,
        overlay.queue.track_approval_timeout_secs
    );
    set!(q.max_track_replacements, overlay.queue.max_track_replacements);
    set!(q.max_tracks_to_fetch, overlay.queue.max_tracks_to_fetch);

    let s = &mut config.tuning.shadow;
    set!(
        s.maintenance_interval_secs,
        overlay.shadow.maintenance_interval_secs
    );
    set!(s.max_age_hours, overlay.shadow.max_age_hours);
    set!(
        s.sync_warning_timeout_mins,
        overlay.shadow.sync_warning_timeout_mins
    );
}

/// Apply `SHINDIG_*` environment overrides. Every tuning key is covered;
/// unparseable values are ignored.
fn overlay_env(config: &mut ShindigConfig, sources: &mut ConfigSources) {
    let room = &mut config.room;
    set_from_env("SHINDIG_CHAT_ID", &mut room.chat_id, sources);
    set_from_env("SHINDIG_PLAYLIST_ID", &mut room.playlist_id, sources);

    let a = &mut config.tuning.approvals;
    set_from_env(
        "SHINDIG_CONFIRM_TIMEOUT_SECS",
        &mut a.confirm_timeout_secs,
        sources,
    );
    set_from_env(
        "SHINDIG_ADMIN_TIMEOUT_SECS",
        &mut a.admin_timeout_secs,
        sources,
    );
    set_from_env("SHINDIG_ADMIN_APPROVAL", &mut a.admin_approval, sources);
    set_from_env(
        "SHINDIG_ADMIN_NEEDS_APPROVAL",
        &mut a.admin_needs_approval,
        sources,
    );
    set_from_env(
        "SHINDIG_COMMUNITY_REACTIONS",
        &mut a.community_reactions,
        sources,
    );

    let q = &mut config.tuning.queue;
    set_from_env(
        "SHINDIG_QUEUE_AHEAD_SECS",
        &mut q.ahead_duration_secs,
        sources,
    );
    set_from_env(
        "SHINDIG_QUEUE_CHECK_INTERVAL_SECS",
        &mut q.check_interval_secs,
        sources,
    );
    set_from_env(
        "SHINDIG_TRACK_APPROVAL_TIMEOUT_SECS",
        &mut q.track_approval_timeout_secs,
        sources,
    );
    set_from_env(
        "SHINDIG_MAX_TRACK_REPLACEMENTS",
        &mut q.max_track_replacements,
        sources,
    );
    set_from_env(
        "SHINDIG_MAX_TRACKS_TO_FETCH",
        &mut q.max_tracks_to_fetch,
        sources,
    );

    let s = &mut config.tuning.shadow;
    set_from_env(
        "SHINDIG_MAINTENANCE_INTERVAL_SECS",
        &mut s.maintenance_interval_secs,
        sources,
    );
    set_from_env("SHINDIG_MAX_AGE_HOURS", &mut s.max_age_hours, sources);
    set_from_env(
        "SHINDIG_SYNC_WARNING_TIMEOUT_MINS",
        &mut s.sync_warning_timeout_mins,
        sources,
    );
}

fn set_from_env<T: FromStr>(name: &str, target: &mut T, sources: &mut ConfigSources) {
    let Ok(raw) = env::var(name) else { return };
    if let Ok(value) = raw.parse() {
        *target = value;
        sources.env_overrides.push(name.to_string());
    }
}
