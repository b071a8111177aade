//! Streaming-backend contract: search, playlist, queue, playback, auto-DJ.

use crate::domain::{
    PlaybackCompliance, RecommendedTrack, RepeatMode, Track, TrackId,
};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The music streaming account the bot drives.
#[async_trait]
pub trait StreamingBackend: Send + Sync {
    // --- Search ---

    /// Free-text track search, best matches first.
    async fn search_track(&self, query: &str, limit: usize) -> Result<Vec<Track>>;

    /// Whether [`search_track_by_isrc`](Self::search_track_by_isrc) works on
    /// this backend.
    fn supports_isrc_search(&self) -> bool {
        false
    }

    async fn search_track_by_isrc(&self, isrc: &str) -> Result<Option<Track>>;

    async fn search_track_by_title_artist(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<Track>>;

    // --- Playlist ---

    async fn add_to_playlist(&self, playlist_id: &str, track_id: &TrackId) -> Result<()>;

    async fn add_to_playlist_at_position(
        &self,
        playlist_id: &str,
        track_id: &TrackId,
        position: usize,
    ) -> Result<()>;

    /// Full playlist contents, in playlist order.
    async fn playlist_tracks_with_details(&self, playlist_id: &str) -> Result<Vec<Track>>;

    /// Playlist tracks strictly *after* `position`, at most `limit` of them.
    async fn next_playlist_tracks_from_position(
        &self,
        playlist_id: &str,
        position: usize,
        limit: usize,
    ) -> Result<Vec<Track>>;

    // --- Queue ---

    async fn add_to_queue(&self, track_id: &TrackId) -> Result<()>;

    /// Ids currently sitting in the backend's upcoming-track queue.
    async fn queue_track_ids(&self) -> Result<Vec<TrackId>>;

    // --- Playback ---

    async fn current_track_id(&self) -> Result<Option<TrackId>>;

    /// Remaining play time of the current track; zero when nothing plays.
    async fn current_track_remaining(&self) -> Result<Duration>;

    async fn has_active_device(&self) -> Result<bool>;

    async fn check_playback_compliance(&self) -> Result<PlaybackCompliance>;

    async fn set_shuffle(&self, enabled: bool) -> Result<()>;

    async fn set_repeat(&self, mode: RepeatMode) -> Result<()>;

    // --- Auto-DJ ---

    /// Ask the backend for a recommendation to keep the room going.
    async fn recommended_track(&self) -> Result<RecommendedTrack>;

    /// Full details for one track id.
    async fn track_details(&self, track_id: &TrackId) -> Result<Track>;

    // --- Utility ---

    /// Pull the opaque track id out of a share URL, if it is one.
    fn extract_track_id(&self, url: &str) -> Option<TrackId>;

    /// Whether [`set_target_playlist`](Self::set_target_playlist) is
    /// meaningful on this backend.
    fn supports_target_playlist(&self) -> bool {
        false
    }

    async fn set_target_playlist(&self, playlist_id: &str) -> Result<()>;
}
