//! Resolver for music links from non-primary providers.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Song metadata recovered from a foreign provider's link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSong {
    pub title: String,
    pub artist: String,
    /// International Standard Recording Code, when the provider exposes one.
    pub isrc: Option<String>,
}

/// Resolves links from supported non-primary music providers.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Whether this resolver understands the URL at all.
    fn can_resolve(&self, url: &str) -> bool;

    /// Fetch title/artist (and ISRC when available) for the linked song.
    async fn resolve(&self, url: &str) -> Result<ResolvedSong>;
}
