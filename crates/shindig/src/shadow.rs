//! The shadow queue: the bot's local model of the streaming backend's
//! upcoming-track queue.
//!
//! The backend exposes queue contents only as a flat id list, so durations
//! and ordering intent live here. The backend stays the source of truth for
//! *presence* (see [`ShadowQueue::reconcile`]); the shadow is the source of
//! truth for order and duration among the items it knows.

use crate::capability::StreamingBackend;
use crate::domain::TrackId;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// How a track ended up in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowSource {
    /// Pulled from the playlist by the queue manager.
    Playlist,
    /// An approved auto-DJ pick.
    QueueFill,
    /// An admin's priority request.
    Priority,
}

/// One queued track as the bot believes the backend has it.
#[derive(Debug, Clone)]
pub struct ShadowItem {
    pub track_id: TrackId,
    /// Index in the shadow list; 0 plays next after the current track.
    pub position: usize,
    /// Whatever the track's duration was when enqueued. Never re-estimated.
    pub duration: Duration,
    pub source: ShadowSource,
    pub added_at: Instant,
}

/// Reasons the sync-health check wants a queue-sync warning raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHealth {
    Healthy,
    /// The shadow is non-empty but nothing has touched it for too long.
    Stale,
    /// Reconciliation kept dropping items several runs in a row.
    RepeatedRemovals,
    /// No successful reconciliation for too long while non-empty.
    SyncOverdue,
}

impl SyncHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, SyncHealth::Healthy)
    }
}

/// Consecutive removal-reconciliations before the drift warning fires.
const SYNC_REMOVAL_THRESHOLD: u32 = 3;

#[derive(Debug)]
struct ShadowState {
    items: Vec<ShadowItem>,
    last_current_track: Option<TrackId>,
    last_modified: Instant,
    last_successful_sync: Instant,
    consecutive_sync_removals: u32,
}

#[derive(Debug)]
pub struct ShadowQueue {
    inner: RwLock<ShadowState>,
}

impl Default for ShadowQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowQueue {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: RwLock::new(ShadowState {
                items: Vec::new(),
                last_current_track: None,
                last_modified: now,
                last_successful_sync: now,
                consecutive_sync_removals: 0,
            }),
        }
    }

    /// Append a track at the end of the shadow list.
    pub fn append(&self, track_id: TrackId, source: ShadowSource, duration: Duration) {
        let mut state = self.inner.write().unwrap();
        let position = state.items.len();
        state.items.push(ShadowItem {
            track_id,
            position,
            duration,
            source,
            added_at: Instant::now(),
        });
        state.last_modified = Instant::now();
    }

    /// Sum of all shadowed durations.
    pub fn total_duration(&self) -> Duration {
        self.inner
            .read()
            .unwrap()
            .items
            .iter()
            .map(|i| i.duration)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().items.is_empty()
    }

    /// Position of the first occurrence of `track_id`, if shadowed.
    pub fn position(&self, track_id: &TrackId) -> Option<usize> {
        self.inner
            .read()
            .unwrap()
            .items
            .iter()
            .find(|i| &i.track_id == track_id)
            .map(|i| i.position)
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.position(track_id).is_some()
    }

    /// The current-track id as of the last progression that removed items.
    pub fn last_current_track(&self) -> Option<TrackId> {
        self.inner.read().unwrap().last_current_track.clone()
    }

    /// Snapshot of the shadowed track ids, in order.
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.inner
            .read()
            .unwrap()
            .items
            .iter()
            .map(|i| i.track_id.clone())
            .collect()
    }

    /// The canonical queue-budget figure: remaining time of the current
    /// track plus everything shadowed behind it.
    pub async fn remaining_with_current_track(
        &self,
        streaming: &dyn StreamingBackend,
    ) -> Result<Duration> {
        let current_remaining = streaming.current_track_remaining().await?;
        Ok(current_remaining + self.total_duration())
    }

    /// Advance the shadow when the backend reports a new current track.
    ///
    /// - Unknown id: a manual play; the shadow stays intact and resumes
    ///   when the manual play ends.
    /// - Position 0: normal progression; pop and renumber.
    /// - Position k > 0: the user skipped forward; drop 0..=k and renumber.
    pub fn on_current_track_changed(&self, new_id: &TrackId) {
        let mut state = self.inner.write().unwrap();

        let Some(index) = state.items.iter().position(|i| &i.track_id == new_id) else {
            return;
        };

        state.items.drain(0..=index);
        renumber(&mut state.items);
        state.last_current_track = Some(new_id.clone());
        state.last_modified = Instant::now();
    }

    /// Drop shadow items the backend no longer reports as queued.
    ///
    /// Each backend occurrence consumes at most one shadow item; surviving
    /// items keep their insertion order. Stamps the sync clock and tracks
    /// how many consecutive runs removed something.
    pub fn reconcile(&self, backend_queue_ids: &[TrackId]) {
        let mut state = self.inner.write().unwrap();

        let mut budget: HashMap<&TrackId, usize> = HashMap::new();
        for id in backend_queue_ids {
            *budget.entry(id).or_insert(0) += 1;
        }

        let before = state.items.len();
        state.items.retain(|item| {
            match budget.get_mut(&item.track_id) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        });
        let removed = before - state.items.len();

        renumber(&mut state.items);
        state.last_successful_sync = Instant::now();
        if removed > 0 {
            state.consecutive_sync_removals += 1;
            state.last_modified = Instant::now();
            tracing::debug!(
                shadow.removed = removed,
                shadow.remaining = state.items.len(),
                shadow.consecutive_removals = state.consecutive_sync_removals,
                "Reconciliation dropped shadow items"
            );
        } else {
            state.consecutive_sync_removals = 0;
        }
    }

    /// Drop items older than `max_age` and renumber.
    pub fn evict_older_than(&self, max_age: Duration) {
        let mut state = self.inner.write().unwrap();
        let before = state.items.len();
        state.items.retain(|i| i.added_at.elapsed() <= max_age);
        if state.items.len() != before {
            renumber(&mut state.items);
            state.last_modified = Instant::now();
        }
    }

    /// Evaluate the drift/staleness signals that feed the queue-sync
    /// warning. `timeout` is the configured inactivity threshold.
    pub fn sync_health(&self, timeout: Duration) -> SyncHealth {
        let state = self.inner.read().unwrap();
        let non_empty = !state.items.is_empty();

        if non_empty && state.last_modified.elapsed() > timeout {
            return SyncHealth::Stale;
        }
        if state.consecutive_sync_removals >= SYNC_REMOVAL_THRESHOLD {
            return SyncHealth::RepeatedRemovals;
        }
        if non_empty && state.last_successful_sync.elapsed() > timeout {
            return SyncHealth::SyncOverdue;
        }
        SyncHealth::Healthy
    }
}

fn renumber(items: &mut [ShadowItem]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.position = index;
    }
}
