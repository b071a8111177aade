//! Registry of priority tracks and where to resume the playlist afterwards.
//!
//! Lock-ordering convention: when both this lock and the shadow lock are
//! needed, take the shadow lock first.

use crate::domain::{PriorityTrackInfo, TrackId};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct PriorityRegistry {
    tracks: RwLock<HashMap<TrackId, PriorityTrackInfo>>,
}

impl PriorityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `track_id` jumped the queue while `resume_song_id` was
    /// playing.
    pub fn insert(&self, track_id: TrackId, resume_song_id: TrackId) {
        self.tracks
            .write()
            .unwrap()
            .insert(track_id, PriorityTrackInfo { resume_song_id });
    }

    pub fn get(&self, track_id: &TrackId) -> Option<PriorityTrackInfo> {
        self.tracks.read().unwrap().get(track_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tracks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().unwrap().is_empty()
    }

    /// Drop entries that are neither currently playing nor still shadowed.
    pub fn prune(&self, currently_playing: Option<&TrackId>, shadowed: &[TrackId]) {
        self.tracks.write().unwrap().retain(|track_id, _| {
            currently_playing == Some(track_id) || shadowed.contains(track_id)
        });
    }
}
