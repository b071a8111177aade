//! The per-message pipeline: classification, resolution, ranking,
//! deduplication, approval, and playlist insertion.
//!
//! One pipeline runs per inbound chat message in its own task. It is a
//! small state machine; every handler does its work and names the next
//! state, and the terminal states react on the original message so the
//! requester always sees an outcome.

use crate::approval::{self, ApprovalVerdict};
use crate::domain::{MessageContext, PipelineState, Track, TrackId};
use crate::lexicon::Lexicon;
use crate::services::Services;
use crate::shadow::ShadowSource;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trackline::{InputMessage, MessageKind};

/// Candidates pulled from the initial free-text search.
const INITIAL_SEARCH_LIMIT: usize = 10;
/// How many ranked entries seed the refinement re-search.
const RERANK_SEED_COUNT: usize = 3;
/// Results taken per refinement search.
const RERANK_SEARCH_LIMIT: usize = 3;

const REACT_ADDED: &str = "👍";
const REACT_REJECTED: &str = "👎";
const REACT_PRIORITY: &str = "⚡";
const REACT_ERROR: &str = "⚠️";
/// Reactions for chatter that was never a music request.
const REACT_NO_EVIL: &[&str] = &["🙈", "🙉", "🙊"];

pub struct MessagePipeline {
    services: Arc<Services>,
}

impl MessagePipeline {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// Drive one message to completion.
    pub async fn run(&self, input: InputMessage) {
        let mut ctx = MessageContext::new(input);
        debug!(
            message.id = %ctx.input.message_id,
            message.kind = ?ctx.input.kind,
            "Pipeline started"
        );

        loop {
            let state = ctx.state.clone();
            let next = match state {
                PipelineState::Dispatch => self.dispatch(&mut ctx).await,
                PipelineState::HandleStreamingLink => self.handle_streaming_link(&mut ctx).await,
                PipelineState::HandleForeignLink => self.handle_foreign_link(&mut ctx).await,
                PipelineState::LlmDisambiguate => self.llm_disambiguate(&mut ctx).await,
                PipelineState::EnhancedLlmDisambiguate => {
                    self.enhanced_llm_disambiguate(&mut ctx).await
                }
                PipelineState::ConfirmationPrompt => self.confirmation_prompt(&mut ctx).await,
                PipelineState::AwaitAdminApproval => self.await_admin_approval(&mut ctx).await,
                PipelineState::AddToPlaylist => self.add_to_playlist(&mut ctx).await,
                PipelineState::ReactAdded => self.react_added(&ctx).await,
                PipelineState::ReactDuplicate => self.react_duplicate(&ctx).await,
                PipelineState::ReactError(key) => self.react_error(&ctx, &key).await,
                PipelineState::AskWhichSong => self.ask_which_song(&ctx).await,
                PipelineState::ClarifyAsk => self.clarify(&ctx).await,
                PipelineState::GiveUp => break,
            };
            ctx.state = next;
        }

        debug!(
            message.id = %ctx.input.message_id,
            elapsed_ms = ctx.start_time.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
    }

    // --- Dispatch ---

    async fn dispatch(&self, ctx: &mut MessageContext) -> PipelineState {
        match ctx.input.kind {
            MessageKind::StreamingLink => PipelineState::HandleStreamingLink,
            MessageKind::ForeignMusicLink => PipelineState::HandleForeignLink,
            MessageKind::FreeText => self.dispatch_free_text(ctx).await,
        }
    }

    async fn dispatch_free_text(&self, ctx: &mut MessageContext) -> PipelineState {
        let text = &ctx.input.text;

        // A failing classifier lets the message through rather than
        // dropping a possible request on the floor.
        let not_music = self
            .services
            .llm
            .is_not_music_request(text)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Chatter classification failed, treating as music request");
                false
            });

        if !not_music {
            return PipelineState::LlmDisambiguate;
        }

        let wants_help = self
            .services
            .llm
            .is_help_request(text)
            .await
            .unwrap_or(false);
        if wants_help {
            return PipelineState::ClarifyAsk;
        }

        // Plain chatter: acknowledge with a wink and move on.
        let emoji = REACT_NO_EVIL
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("🙈");
        self.react(ctx, emoji).await;
        PipelineState::GiveUp
    }

    // --- Link handling ---

    async fn handle_streaming_link(&self, ctx: &mut MessageContext) -> PipelineState {
        let Some(track_id) = self.extract_streaming_id(&ctx.input) else {
            return PipelineState::ReactError("bot.error_extract".into());
        };

        if self.services.dedup.has(&track_id) {
            ctx.selected = self.services.streaming.track_details(&track_id).await.ok();
            return PipelineState::ReactDuplicate;
        }

        match self.services.streaming.track_details(&track_id).await {
            Ok(track) => {
                ctx.selected = Some(track);
                self.approval_gate(ctx).await
            }
            Err(e) => {
                warn!(track.id = %track_id, error = %e, "Could not fetch track details");
                PipelineState::ReactError("bot.error_add".into())
            }
        }
    }

    fn extract_streaming_id(&self, input: &InputMessage) -> Option<TrackId> {
        let streaming = &self.services.streaming;
        input
            .urls
            .iter()
            .map(String::as_str)
            .chain(
                input
                    .text
                    .split_whitespace()
                    .filter(|t| t.starts_with(&self.services.providers.streaming_uri_prefix)),
            )
            .find_map(|candidate| streaming.extract_track_id(candidate))
    }

    async fn handle_foreign_link(&self, ctx: &mut MessageContext) -> PipelineState {
        let Some(url) = ctx.input.urls.first().cloned() else {
            return PipelineState::AskWhichSong;
        };

        if !self.services.resolver.can_resolve(&url) {
            return PipelineState::AskWhichSong;
        }

        let resolved = match self.services.resolver.resolve(&url).await {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(url = %url, error = %e, "Foreign link resolution failed");
                return PipelineState::AskWhichSong;
            }
        };

        let streaming = &self.services.streaming;
        let found = match resolved.isrc.as_deref() {
            Some(isrc) if streaming.supports_isrc_search() => {
                streaming.search_track_by_isrc(isrc).await
            }
            _ => {
                streaming
                    .search_track_by_title_artist(&resolved.title, &resolved.artist)
                    .await
            }
        };

        match found {
            Ok(Some(track)) => {
                if self.services.dedup.has(&track.id) {
                    ctx.selected = Some(track);
                    PipelineState::ReactDuplicate
                } else {
                    ctx.selected = Some(track);
                    self.approval_gate(ctx).await
                }
            }
            Ok(None) => PipelineState::AskWhichSong,
            Err(e) => {
                debug!(url = %url, error = %e, "Streaming lookup for foreign link failed");
                PipelineState::AskWhichSong
            }
        }
    }

    // --- Free-text disambiguation, stages 0-2 ---

    async fn llm_disambiguate(&self, ctx: &mut MessageContext) -> PipelineState {
        let text = ctx.input.text.clone();

        // Stage 0: distill a search query; fall back to the raw text.
        let query = self
            .services
            .llm
            .extract_song_query(&text)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Query extraction failed, using raw text");
                text.clone()
            });

        // Stage 1: initial search. No candidates means we refuse rather
        // than let the model invent a track.
        let initial = match self
            .services
            .streaming
            .search_track(&query, INITIAL_SEARCH_LIMIT)
            .await
        {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!(query = %query, error = %e, "Initial search failed");
                return PipelineState::ReactError("bot.error_no_matches".into());
            }
        };
        if initial.is_empty() {
            return PipelineState::ReactError("bot.error_no_matches".into());
        }

        // Stage 2: let the model order them.
        let ranked = match self.services.llm.rank_tracks(&query, &initial).await {
            Ok(ranked) => ranked,
            Err(e) => {
                debug!(error = %e, "Ranking failed");
                return PipelineState::AskWhichSong;
            }
        };
        if ranked.is_empty() {
            return PipelineState::AskWhichSong;
        }

        ctx.candidates = ranked;
        PipelineState::EnhancedLlmDisambiguate
    }

    // --- Free-text disambiguation, stage 3 ---

    async fn enhanced_llm_disambiguate(&self, ctx: &mut MessageContext) -> PipelineState {
        // Stage 3a: re-search the top ranked entries to recover the
        // backend's own spelling of ids, titles and durations.
        let mut pool: Vec<Track> = Vec::new();
        for candidate in ctx.candidates.iter().take(RERANK_SEED_COUNT) {
            let query = format!("{} {}", candidate.artist, candidate.title);
            match self
                .services
                .streaming
                .search_track(&query, RERANK_SEARCH_LIMIT)
                .await
            {
                Ok(results) => {
                    for track in results {
                        if !pool.iter().any(|t| t.id == track.id) {
                            pool.push(track);
                        }
                    }
                }
                Err(e) => {
                    debug!(query = %query, error = %e, "Refinement search failed");
                }
            }
        }
        if pool.is_empty() {
            return PipelineState::ReactError("bot.error_no_matches".into());
        }

        // Stage 3b: rank the refined pool against the original message.
        let reranked = match self
            .services
            .llm
            .rank_tracks(&ctx.input.text, &pool)
            .await
        {
            Ok(ranked) => ranked,
            Err(e) => {
                debug!(error = %e, "Refined ranking failed");
                return PipelineState::AskWhichSong;
            }
        };

        let Some(top) = reranked.first() else {
            return PipelineState::AskWhichSong;
        };

        // Restore the authoritative id/url/duration from the pool.
        let Some(merged) = best_streaming_match(top, &pool) else {
            return PipelineState::AskWhichSong;
        };
        if merged.url.is_empty() {
            return PipelineState::AskWhichSong;
        }

        ctx.selected = Some(merged.clone());
        PipelineState::ConfirmationPrompt
    }

    // --- Confirmation ---

    async fn confirmation_prompt(&self, ctx: &mut MessageContext) -> PipelineState {
        let Some(track) = ctx.selected.clone() else {
            return PipelineState::AskWhichSong;
        };

        let mood = self
            .services
            .llm
            .track_mood(std::slice::from_ref(&track))
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Mood generation failed");
                "unknown style".to_string()
            });
        ctx.track_mood = Some(mood.clone());

        let album = track
            .album
            .as_deref()
            .map(|a| format!(" from {}", a))
            .unwrap_or_default();
        let year = track
            .year
            .map(|y| format!(" ({})", y))
            .unwrap_or_default();
        let prompt = self.services.lexicon.render(
            "bot.confirm",
            &[
                ("title", &track.title),
                ("artist", &track.artist),
                ("album", &album),
                ("year", &year),
                ("mood", &mood),
                ("url", &track.url),
            ],
        );

        match approval::confirm_with_requester(&self.services, &ctx.origin(), &prompt).await {
            Ok(true) => {
                // Duplicates only become detectable once the exact track is
                // known.
                if self.services.dedup.has(&track.id) {
                    return PipelineState::ReactDuplicate;
                }
                self.approval_gate(ctx).await
            }
            Ok(false) => PipelineState::AskWhichSong,
            Err(e) => {
                warn!(error = %e, "Requester confirmation failed");
                PipelineState::ReactError("bot.error_approval".into())
            }
        }
    }

    // --- Approval gate ---

    /// Decide whether this request needs an admin round, and classify
    /// admin requests as priority while we're at it.
    async fn approval_gate(&self, ctx: &mut MessageContext) -> PipelineState {
        let input = &ctx.input;
        let is_admin = self
            .services
            .frontend
            .chat
            .is_user_admin(&input.chat_id, &input.sender_id)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Admin check failed, assuming non-admin");
                false
            });

        if is_admin {
            ctx.is_priority = self
                .services
                .llm
                .is_priority_request(&input.text)
                .await
                .unwrap_or(false);
        }

        let approvals = &self.services.config.tuning.approvals;
        let needs_approval = if is_admin {
            approvals.admin_needs_approval
        } else {
            approvals.admin_approval && self.services.frontend.admin_approval_enabled()
        };

        if needs_approval {
            PipelineState::AwaitAdminApproval
        } else {
            PipelineState::AddToPlaylist
        }
    }

    async fn await_admin_approval(&self, ctx: &mut MessageContext) -> PipelineState {
        let Some(track) = ctx.selected.clone() else {
            return PipelineState::ReactError("bot.error_approval".into());
        };
        let mood = ctx.track_mood.clone().unwrap_or_default();

        let verdict = approval::admin_approval(
            &self.services,
            &ctx.origin(),
            &ctx.input.sender_name,
            &track,
            &mood,
        )
        .await;

        match verdict {
            Ok(ApprovalVerdict::Approved(approver)) => {
                ctx.approved_by = Some(approver.label().to_string());
                PipelineState::AddToPlaylist
            }
            Ok(ApprovalVerdict::Denied) => {
                let reply = self.services.lexicon.get("bot.denied").to_string();
                self.reply(ctx, &reply).await;
                self.react(ctx, REACT_REJECTED).await;
                PipelineState::GiveUp
            }
            Err(e) => {
                warn!(error = %e, "Approval round failed");
                PipelineState::ReactError("bot.error_approval".into())
            }
        }
    }

    // --- Insertion ---

    async fn add_to_playlist(&self, ctx: &mut MessageContext) -> PipelineState {
        let Some(track) = ctx.selected.clone() else {
            return PipelineState::ReactError("bot.error_add".into());
        };

        if ctx.is_priority {
            return self.add_priority(ctx, &track).await;
        }

        let playlist_id = self.services.playlist_id();
        if let Err(e) = self
            .services
            .streaming
            .add_to_playlist(playlist_id, &track.id)
            .await
        {
            warn!(track.id = %track.id, error = %e, "Playlist insertion failed");
            return PipelineState::ReactError("bot.error_add".into());
        }

        self.services.dedup.add(track.id.clone());
        self.services.wake.wake();

        info!(
            track.id = %track.id,
            track.name = %track.display_name(),
            requester = %ctx.input.sender_id,
            "Track added to playlist"
        );
        PipelineState::ReactAdded
    }

    /// Admin fast lane: straight into the backend queue, then pinned to the
    /// top of the playlist so the playlist mirrors what actually played.
    async fn add_priority(&self, ctx: &mut MessageContext, track: &Track) -> PipelineState {
        let streaming = &self.services.streaming;

        if let Err(e) = streaming.add_to_queue(&track.id).await {
            warn!(track.id = %track.id, error = %e, "Priority queue insertion failed");
            return PipelineState::ReactError("bot.error_add".into());
        }
        self.services
            .shadow
            .append(track.id.clone(), ShadowSource::Priority, track.duration);

        // Remember where to resume the playlist once this finishes.
        match streaming.current_track_id().await {
            Ok(Some(current)) => {
                self.services.priority.insert(track.id.clone(), current);
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Could not read current track for priority resume"),
        }

        let playlist_id = self.services.playlist_id();
        if let Err(e) = streaming
            .add_to_playlist_at_position(playlist_id, &track.id, 0)
            .await
        {
            warn!(track.id = %track.id, error = %e, "Priority playlist pin failed");
        }
        self.services.dedup.add(track.id.clone());

        info!(
            track.id = %track.id,
            track.name = %track.display_name(),
            requester = %ctx.input.sender_id,
            "Priority track queued"
        );

        let reply = self.services.lexicon.render(
            "bot.added_priority",
            &[("title", &track.title), ("artist", &track.artist)],
        );
        self.reply(ctx, &reply).await;
        self.react(ctx, REACT_PRIORITY).await;
        PipelineState::GiveUp
    }

    // --- Terminal reactions ---

    async fn react_added(&self, ctx: &MessageContext) -> PipelineState {
        if let Some(track) = &ctx.selected {
            let reply = render_added(
                &self.services.lexicon,
                track,
                self.services.shadow.position(&track.id),
                ctx.approved_by.as_deref(),
            );
            self.reply(ctx, &reply).await;
        }
        self.react(ctx, REACT_ADDED).await;
        PipelineState::GiveUp
    }

    async fn react_duplicate(&self, ctx: &MessageContext) -> PipelineState {
        let (title, artist) = ctx
            .selected
            .as_ref()
            .map(|t| (t.title.clone(), t.artist.clone()))
            .unwrap_or_else(|| ("that one".to_string(), "someone".to_string()));
        let reply = self
            .services
            .lexicon
            .render("bot.duplicate", &[("title", &title), ("artist", &artist)]);
        self.reply(ctx, &reply).await;
        self.react(ctx, REACT_REJECTED).await;
        PipelineState::GiveUp
    }

    async fn react_error(&self, ctx: &MessageContext, key: &str) -> PipelineState {
        let reply = self.services.lexicon.get(key).to_string();
        self.reply(ctx, &reply).await;
        self.react(ctx, REACT_ERROR).await;
        PipelineState::GiveUp
    }

    async fn ask_which_song(&self, ctx: &MessageContext) -> PipelineState {
        self.react(ctx, REACT_REJECTED).await;
        let reply = self.services.lexicon.get("bot.which_song").to_string();
        self.reply(ctx, &reply).await;
        PipelineState::GiveUp
    }

    async fn clarify(&self, ctx: &MessageContext) -> PipelineState {
        let reply = self.services.lexicon.get("bot.help").to_string();
        self.reply(ctx, &reply).await;
        PipelineState::GiveUp
    }

    // --- Small helpers ---

    async fn reply(&self, ctx: &MessageContext, text: &str) {
        let input = &ctx.input;
        if let Err(e) = self
            .services
            .frontend
            .chat
            .send_text(&input.chat_id, Some(&input.message_id), text)
            .await
        {
            warn!(message.id = %input.message_id, error = %e, "Could not send reply");
        }
    }

    async fn react(&self, ctx: &MessageContext, emoji: &str) {
        let input = &ctx.input;
        if let Err(e) = self
            .services
            .frontend
            .chat
            .react(&input.chat_id, &input.message_id, emoji)
            .await
        {
            debug!(message.id = %input.message_id, error = %e, "Could not react");
        }
    }
}

/// The merge ladder: exact id, exact title/artist, case-insensitive, then
/// substring in either direction.
fn best_streaming_match<'a>(candidate: &Track, pool: &'a [Track]) -> Option<&'a Track> {
    if let Some(track) = pool.iter().find(|t| t.id == candidate.id) {
        return Some(track);
    }
    if let Some(track) = pool
        .iter()
        .find(|t| t.title == candidate.title && t.artist == candidate.artist)
    {
        return Some(track);
    }
    if let Some(track) = pool
        .iter()
        .find(|t| eq_ci(&t.title, &candidate.title) && eq_ci(&t.artist, &candidate.artist))
    {
        return Some(track);
    }
    pool.iter().find(|t| {
        contains_either_way(&t.title, &candidate.title)
            && contains_either_way(&t.artist, &candidate.artist)
    })
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn contains_either_way(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

fn render_added(
    lexicon: &Lexicon,
    track: &Track,
    shadow_position: Option<usize>,
    approved_by: Option<&str>,
) -> String {
    if let Some(approver) = approved_by {
        return lexicon.render(
            "bot.added_by_approver",
            &[
                ("title", &track.title),
                ("artist", &track.artist),
                ("approver", approver),
                ("url", &track.url),
            ],
        );
    }
    match shadow_position {
        Some(position) => lexicon.render(
            "bot.added_at_position",
            &[
                ("title", &track.title),
                ("artist", &track.artist),
                // 1-based for humans
                ("position", &(position + 1).to_string()),
                ("url", &track.url),
            ],
        ),
        None => lexicon.render(
            "bot.added",
            &[
                ("title", &track.title),
                ("artist", &track.artist),
                ("url", &track.url),
            ],
        ),
    }
}
