//! Error kinds for the bot core.
//!
//! Non-fatal errors never escape the per-message pipeline: they are logged,
//! surfaced to the requester as a localized message, and that message's
//! processing ends cleanly.

use crate::domain::TrackId;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong between chat, streaming backend and LLM.
#[derive(Debug, Error)]
pub enum BotError {
    /// Chat or streaming I/O failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The music-link resolver declined or errored.
    #[error("link resolution failed: {0}")]
    Resolution(String),

    /// Streaming search returned zero results.
    #[error("no search results for \"{query}\"")]
    SearchMiss { query: String },

    /// The language-model RPC failed.
    #[error("language model failure: {0}")]
    Llm(String),

    /// The language model returned nothing rankable.
    #[error("language model returned nothing rankable")]
    ClassifierMiss,

    /// The bot lacks admin rights in the chat.
    #[error("bot lacks admin rights in chat {chat_id}")]
    Permission { chat_id: String },

    /// No active playback device on the streaming account.
    #[error("no active playback device")]
    DeviceAbsent,

    /// Shadow queue drifted too far from the streaming backend.
    #[error("shadow queue out of sync with streaming backend")]
    QueueDesync,

    /// A user/admin/community approval deadline elapsed.
    #[error("approval timed out after {0:?}")]
    ApprovalTimeout(Duration),

    /// An approval was explicitly rejected.
    #[error("approval denied")]
    ApprovalDenied,

    /// The track is already in the target playlist.
    #[error("track already in playlist: {0}")]
    DuplicateTrack(TrackId),

    /// The dispatcher context was cancelled.
    #[error("shutting down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, BotError>;
