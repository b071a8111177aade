//! Language-model contract: ranking, intent detection, mood text.
//!
//! Implementations must tolerate frequent calls. Failures are non-fatal;
//! callers either degrade (classification defaults to letting the message
//! through) or fall back to canned text.

use crate::domain::Track;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LlmAssist: Send + Sync {
    /// Order `candidates` by relevance to `query`, best first. May return a
    /// subset; an empty result means nothing looked plausible.
    async fn rank_tracks(&self, query: &str, candidates: &[Track]) -> Result<Vec<Track>>;

    /// Whether the text is chatter rather than a music request.
    async fn is_not_music_request(&self, text: &str) -> Result<bool>;

    /// Whether the text asks how to use the bot.
    async fn is_help_request(&self, text: &str) -> Result<bool>;

    /// Whether the text asks for a track to be played *right now*.
    async fn is_priority_request(&self, text: &str) -> Result<bool>;

    /// A short mood phrase describing the given tracks.
    async fn track_mood(&self, tracks: &[Track]) -> Result<String>;

    /// Distill free text into a clean search query.
    async fn extract_song_query(&self, text: &str) -> Result<String>;
}
