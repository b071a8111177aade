//! Core domain types shared across the bot's subsystems.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// The streaming backend's opaque track identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A resolved streaming track. Immutable once constructed for a given id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub year: Option<u32>,
    /// Required for queue-budget math.
    pub duration: Duration,
    /// Shareable link used in user-visible messages.
    pub url: String,
}

impl Track {
    /// "Artist - Title" as shown in chat messages.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Where the original request message lives, for replies and reactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOrigin {
    pub chat_id: String,
    pub message_id: String,
    pub sender_id: String,
}

impl MessageOrigin {
    pub fn of(input: &trackline::InputMessage) -> Self {
        Self {
            chat_id: input.chat_id.clone(),
            message_id: input.message_id.clone(),
            sender_id: input.sender_id.clone(),
        }
    }
}

/// The per-message pipeline's state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Dispatch,
    HandleStreamingLink,
    HandleForeignLink,
    AskWhichSong,
    LlmDisambiguate,
    EnhancedLlmDisambiguate,
    ConfirmationPrompt,
    AwaitAdminApproval,
    AddToPlaylist,
    ReactAdded,
    ReactDuplicate,
    /// Carries a lexicon key naming what went wrong.
    ReactError(String),
    ClarifyAsk,
    GiveUp,
}

/// Live state of one in-flight chat message.
#[derive(Debug)]
pub struct MessageContext {
    pub input: trackline::InputMessage,
    pub state: PipelineState,
    pub candidates: Vec<Track>,
    pub selected: Option<Track>,
    pub is_priority: bool,
    pub track_mood: Option<String>,
    /// Label of whoever approved the request ("admin"/"community"), when an
    /// approval round ran.
    pub approved_by: Option<String>,
    pub start_time: Instant,
}

impl MessageContext {
    pub fn new(input: trackline::InputMessage) -> Self {
        Self {
            input,
            state: PipelineState::Dispatch,
            candidates: Vec::new(),
            selected: None,
            is_priority: false,
            track_mood: None,
            approved_by: None,
            start_time: Instant::now(),
        }
    }

    pub fn origin(&self) -> MessageOrigin {
        MessageOrigin::of(&self.input)
    }
}

/// Recorded when an admin's priority request jumps the queue.
///
/// `resume_song_id` is what was playing at insertion time; it locates the
/// "resume here" point in the playlist once the priority track finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityTrackInfo {
    pub resume_song_id: TrackId,
}

/// An auto-DJ pick from the streaming backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedTrack {
    pub id: TrackId,
    /// The query the backend derived the pick from.
    pub query: String,
    /// A short mood description of the pick.
    pub mood: String,
}

/// Result of a playback-settings compliance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackCompliance {
    pub correct_shuffle: bool,
    pub correct_repeat: bool,
    pub issues: Vec<String>,
}

impl Default for PlaybackCompliance {
    fn default() -> Self {
        Self::optimal()
    }
}

impl PlaybackCompliance {
    pub fn optimal() -> Self {
        Self {
            correct_shuffle: true,
            correct_repeat: true,
            issues: Vec::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.correct_shuffle && self.correct_repeat
    }
}

/// Repeat modes the bot can request from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    Off,
    Track,
    Context,
}

/// The bot's own identity on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub user_id: String,
}

/// Membership status of a user in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    /// Whether this status carries the rights the bot needs.
    pub fn is_privileged(&self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator)
    }
}

/// A decision on an auto-DJ proposal, delivered by the chat frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDecision {
    pub track_id: TrackId,
    pub approved: bool,
}
