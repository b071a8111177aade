//! Chat-message normalization and music-link classification.
//!
//! Turns a raw chat message into an [`InputMessage`]: text is Unicode
//! NFKC-normalized with whitespace collapsed, URLs are extracted and
//! scrubbed of tracking parameters, and the message is classified as a
//! streaming link, a foreign music link, or free text.
//!
//! # Example
//!
//! ```
//! use trackline::{parse_message, MessageKind, Providers, RawMessage};
//!
//! let raw = RawMessage::new("m1", "c1", "u1", "https://open.spotify.com/track/abc123?si=xyz");
//! let input = parse_message(&raw, &Providers::default());
//!
//! assert_eq!(input.kind, MessageKind::StreamingLink);
//! assert_eq!(input.urls[0], "https://open.spotify.com/track/abc123");
//! ```

pub mod classify;
pub mod normalize;

pub use classify::{classify, extract_urls};
pub use normalize::{normalize_text, scrub_url};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a chat message turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// A link (or URI token) pointing at the primary streaming backend.
    StreamingLink,
    /// A link to a known non-primary music provider.
    ForeignMusicLink,
    /// Anything else - handed to the language model for interpretation.
    FreeText,
}

/// A chat message as delivered by the transport, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    /// URLs the transport already extracted (e.g. from message entities).
    pub urls: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl RawMessage {
    /// Convenience constructor for tests and simple transports.
    pub fn new(
        message_id: impl Into<String>,
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            sender_name: String::new(),
            text: text.into(),
            urls: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// A normalized, classified chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    pub kind: MessageKind,
    /// NFKC-normalized text with collapsed whitespace.
    pub text: String,
    /// Scrubbed URLs: transport-provided first, then any found in the text.
    pub urls: Vec<String>,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Hosts and URI schemes that identify music providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Providers {
    /// Hosts belonging to the primary streaming backend.
    pub streaming_hosts: Vec<String>,
    /// URI token prefix of the streaming backend (e.g. `spotify:`).
    pub streaming_uri_prefix: String,
    /// Hosts of known non-primary music providers.
    pub foreign_hosts: Vec<String>,
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            streaming_hosts: vec!["open.spotify.com".into(), "spotify.link".into()],
            streaming_uri_prefix: "spotify:".into(),
            foreign_hosts: vec![
                "music.youtube.com".into(),
                "youtube.com".into(),
                "youtu.be".into(),
                "music.apple.com".into(),
                "soundcloud.com".into(),
                "tidal.com".into(),
                "deezer.com".into(),
                "bandcamp.com".into(),
            ],
        }
    }
}

impl Providers {
    /// Whether `host` belongs to the streaming backend (exact or subdomain).
    pub fn is_streaming_host(&self, host: &str) -> bool {
        host_matches(host, &self.streaming_hosts)
    }

    /// Whether `host` belongs to a known foreign music provider.
    pub fn is_foreign_host(&self, host: &str) -> bool {
        host_matches(host, &self.foreign_hosts)
    }
}

fn host_matches(host: &str, known: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    known
        .iter()
        .any(|k| host == *k || host.ends_with(&format!(".{}", k)))
}

/// Normalize and classify a raw chat message.
pub fn parse_message(raw: &RawMessage, providers: &Providers) -> InputMessage {
    let text = normalize_text(&raw.text);

    let mut urls: Vec<String> = Vec::new();
    for candidate in raw.urls.iter().map(String::as_str).chain(
        extract_urls(&text).iter().map(String::as_str),
    ) {
        let scrubbed = scrub_url(candidate);
        if !urls.contains(&scrubbed) {
            urls.push(scrubbed);
        }
    }

    let kind = classify(&text, &urls, providers);

    InputMessage {
        kind,
        text,
        urls,
        chat_id: raw.chat_id.clone(),
        sender_id: raw.sender_id.clone(),
        sender_name: raw.sender_name.clone(),
        message_id: raw.message_id.clone(),
        timestamp: raw.timestamp,
    }
}
