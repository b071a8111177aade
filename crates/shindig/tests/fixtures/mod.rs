//! Hand-written mock capabilities for driving the bot core in tests.
//!
//! Every mock records the calls it receives behind a `Mutex<Vec<_>>` so
//! tests can assert on the exact interaction sequence.

#![allow(dead_code)]

use async_trait::async_trait;
use shindig::capability::{
    AdminApproval, CancelAdminApproval, ChatFrontend, CommunityApproval, Frontend, LinkResolver,
    LlmAssist, ResolvedSong, StreamingBackend,
};
use shindig::domain::{
    BotIdentity, MemberStatus, MessageOrigin, PlaybackCompliance, QueueDecision, RecommendedTrack,
    RepeatMode, Track, TrackId,
};
use shindig::error::{BotError, Result};
use shindig::wake::WakeReceiver;
use shindig::Services;
use shinconf::ShindigConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use trackline::{parse_message, InputMessage, Providers, RawMessage};

pub const CHAT_ID: &str = "room-1";
pub const PLAYLIST_ID: &str = "playlist-1";

pub fn track(id: &str, title: &str, artist: &str, secs: u64) -> Track {
    Track {
        id: TrackId::from(id),
        title: title.to_string(),
        artist: artist.to_string(),
        album: None,
        year: None,
        duration: Duration::from_secs(secs),
        url: format!("https://open.spotify.com/track/{}", id),
    }
}

// --- Chat frontend mock ---

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub id: String,
    pub chat_id: String,
    pub reply_to: Option<String>,
    pub text: String,
}

#[derive(Default)]
pub struct MockChat {
    pub sent: Mutex<Vec<SentMessage>>,
    pub reactions: Mutex<Vec<(String, String, String)>>,
    pub edited: Mutex<Vec<(String, String, String)>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub dms: Mutex<Vec<(String, String, String)>>,
    pub admins: Mutex<Vec<String>>,
    pub inbox: Mutex<VecDeque<RawMessage>>,
    /// `None` makes `await_approval` time out instead of answering.
    pub approval_answer: Mutex<Option<bool>>,
    pub approval_prompts: Mutex<Vec<String>>,
    pub queue_approvals: Mutex<Vec<(String, TrackId, String)>>,
    pub decision_tx: Mutex<Option<mpsc::UnboundedSender<QueueDecision>>>,
    pub bot_status: Mutex<Option<MemberStatus>>,
    next_id: AtomicUsize,
}

impl MockChat {
    pub fn new() -> Self {
        Self {
            admins: Mutex::new(vec!["admin-1".to_string()]),
            ..Self::default()
        }
    }

    pub fn set_bot_status(&self, status: MemberStatus) {
        *self.bot_status.lock().unwrap() = Some(status);
    }

    fn make_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    pub fn reactions_on(&self, message_id: &str) -> Vec<String> {
        self.reactions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m, _)| m == message_id)
            .map(|(_, _, emoji)| emoji.clone())
            .collect()
    }
}

#[async_trait]
impl ChatFrontend for MockChat {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<RawMessage>> {
        Ok(self.inbox.lock().unwrap().pop_front())
    }

    async fn send_text(
        &self,
        chat_id: &str,
        reply_to: Option<&str>,
        text: &str,
    ) -> Result<String> {
        let id = self.make_id("msg");
        self.sent.lock().unwrap().push(SentMessage {
            id: id.clone(),
            chat_id: chat_id.to_string(),
            reply_to: reply_to.map(str::to_string),
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn react(&self, chat_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        self.reactions.lock().unwrap().push((
            chat_id.to_string(),
            message_id.to_string(),
            emoji.to_string(),
        ));
        Ok(())
    }

    async fn edit_message(&self, chat_id: &str, message_id: &str, text: &str) -> Result<()> {
        self.edited.lock().unwrap().push((
            chat_id.to_string(),
            message_id.to_string(),
            text.to_string(),
        ));
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        self.deleted
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<String> {
        let id = self.make_id("dm");
        self.dms
            .lock()
            .unwrap()
            .push((user_id.to_string(), id.clone(), text.to_string()));
        Ok(id)
    }

    async fn await_approval(
        &self,
        _origin: &MessageOrigin,
        prompt: &str,
        timeout: Duration,
    ) -> Result<bool> {
        self.approval_prompts.lock().unwrap().push(prompt.to_string());
        match *self.approval_answer.lock().unwrap() {
            Some(answer) => Ok(answer),
            None => Err(BotError::ApprovalTimeout(timeout)),
        }
    }

    async fn send_queue_track_approval(
        &self,
        chat_id: &str,
        track_id: &TrackId,
        text: &str,
    ) -> Result<String> {
        let id = self.make_id("approval");
        self.queue_approvals.lock().unwrap().push((
            id.clone(),
            track_id.clone(),
            text.to_string(),
        ));
        self.sent.lock().unwrap().push(SentMessage {
            id: id.clone(),
            chat_id: chat_id.to_string(),
            reply_to: None,
            text: text.to_string(),
        });
        Ok(id)
    }

    fn set_queue_decision_sender(&self, tx: mpsc::UnboundedSender<QueueDecision>) {
        *self.decision_tx.lock().unwrap() = Some(tx);
    }

    async fn is_user_admin(&self, _chat_id: &str, user_id: &str) -> Result<bool> {
        Ok(self.admins.lock().unwrap().iter().any(|a| a == user_id))
    }

    async fn admin_user_ids(&self, _chat_id: &str) -> Result<Vec<String>> {
        Ok(self.admins.lock().unwrap().clone())
    }

    async fn me(&self) -> Result<BotIdentity> {
        Ok(BotIdentity {
            user_id: "bot".to_string(),
        })
    }

    async fn chat_member_status(&self, _chat_id: &str, _user_id: &str) -> Result<MemberStatus> {
        Ok(self
            .bot_status
            .lock()
            .unwrap()
            .unwrap_or(MemberStatus::Administrator))
    }
}

// --- Streaming backend mock ---

#[derive(Default)]
pub struct MockStreaming {
    pub catalog: Mutex<HashMap<TrackId, Track>>,
    pub playlist: Mutex<Vec<TrackId>>,
    pub queue: Mutex<Vec<TrackId>>,
    pub current: Mutex<Option<TrackId>>,
    pub current_remaining: Mutex<Duration>,
    pub device_active: AtomicBool,
    pub search_results: Mutex<HashMap<String, Vec<Track>>>,
    pub recommendations: Mutex<VecDeque<RecommendedTrack>>,
    pub compliance: Mutex<PlaybackCompliance>,
    pub fail_settings_fix: AtomicBool,
    pub fail_playlist_add: AtomicBool,
    pub playlist_adds: Mutex<Vec<(String, TrackId)>>,
    pub queue_adds: Mutex<Vec<TrackId>>,
}

impl MockStreaming {
    pub fn new() -> Self {
        Self {
            device_active: AtomicBool::new(true),
            compliance: Mutex::new(PlaybackCompliance::optimal()),
            ..Self::default()
        }
    }

    pub fn add_catalog_track(&self, track: Track) {
        self.catalog.lock().unwrap().insert(track.id.clone(), track);
    }

    /// Put a track in the catalog *and* at the end of the playlist.
    pub fn add_playlist_track(&self, track: Track) {
        self.playlist.lock().unwrap().push(track.id.clone());
        self.add_catalog_track(track);
    }

    pub fn set_search_result(&self, query: &str, tracks: Vec<Track>) {
        self.search_results
            .lock()
            .unwrap()
            .insert(query.to_string(), tracks);
    }

    pub fn push_recommendation(&self, track: &Track, mood: &str) {
        self.add_catalog_track(track.clone());
        self.recommendations.lock().unwrap().push_back(RecommendedTrack {
            id: track.id.clone(),
            query: track.display_name(),
            mood: mood.to_string(),
        });
    }

    pub fn playlist_adds_for(&self, id: &str) -> usize {
        let id = TrackId::from(id);
        self.playlist_adds
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, t)| *t == id)
            .count()
    }
}

#[async_trait]
impl StreamingBackend for MockStreaming {
    async fn search_track(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        if let Some(tracks) = self.search_results.lock().unwrap().get(query) {
            return Ok(tracks.iter().take(limit).cloned().collect());
        }
        // Fall back to "{artist} {title}" catalog lookups so the
        // refinement re-search works without per-test setup.
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .values()
            .filter(|t| format!("{} {}", t.artist, t.title) == query)
            .take(limit)
            .cloned()
            .collect())
    }

    fn supports_isrc_search(&self) -> bool {
        true
    }

    async fn search_track_by_isrc(&self, isrc: &str) -> Result<Option<Track>> {
        Ok(self
            .search_results
            .lock()
            .unwrap()
            .get(&format!("isrc:{}", isrc))
            .and_then(|tracks| tracks.first().cloned()))
    }

    async fn search_track_by_title_artist(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<Track>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .values()
            .find(|t| t.title.eq_ignore_ascii_case(title) && t.artist.eq_ignore_ascii_case(artist))
            .cloned())
    }

    async fn add_to_playlist(&self, playlist_id: &str, track_id: &TrackId) -> Result<()> {
        if self.fail_playlist_add.load(Ordering::SeqCst) {
            return Err(BotError::Transport("playlist add refused".into()));
        }
        self.playlist_adds
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_id.clone()));
        self.playlist.lock().unwrap().push(track_id.clone());
        Ok(())
    }

    async fn add_to_playlist_at_position(
        &self,
        playlist_id: &str,
        track_id: &TrackId,
        position: usize,
    ) -> Result<()> {
        self.playlist_adds
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_id.clone()));
        let mut playlist = self.playlist.lock().unwrap();
        let position = position.min(playlist.len());
        playlist.insert(position, track_id.clone());
        Ok(())
    }

    async fn playlist_tracks_with_details(&self, _playlist_id: &str) -> Result<Vec<Track>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(self
            .playlist
            .lock()
            .unwrap()
            .iter()
            .filter_map(|id| catalog.get(id).cloned())
            .collect())
    }

    async fn next_playlist_tracks_from_position(
        &self,
        playlist_id: &str,
        position: usize,
        limit: usize,
    ) -> Result<Vec<Track>> {
        let all = self.playlist_tracks_with_details(playlist_id).await?;
        Ok(all.into_iter().skip(position + 1).take(limit).collect())
    }

    async fn add_to_queue(&self, track_id: &TrackId) -> Result<()> {
        self.queue_adds.lock().unwrap().push(track_id.clone());
        self.queue.lock().unwrap().push(track_id.clone());
        Ok(())
    }

    async fn queue_track_ids(&self) -> Result<Vec<TrackId>> {
        Ok(self.queue.lock().unwrap().clone())
    }

    async fn current_track_id(&self) -> Result<Option<TrackId>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn current_track_remaining(&self) -> Result<Duration> {
        Ok(*self.current_remaining.lock().unwrap())
    }

    async fn has_active_device(&self) -> Result<bool> {
        Ok(self.device_active.load(Ordering::SeqCst))
    }

    async fn check_playback_compliance(&self) -> Result<PlaybackCompliance> {
        Ok(self.compliance.lock().unwrap().clone())
    }

    async fn set_shuffle(&self, _enabled: bool) -> Result<()> {
        if self.fail_settings_fix.load(Ordering::SeqCst) {
            return Err(BotError::Transport("shuffle locked".into()));
        }
        Ok(())
    }

    async fn set_repeat(&self, _mode: RepeatMode) -> Result<()> {
        if self.fail_settings_fix.load(Ordering::SeqCst) {
            return Err(BotError::Transport("repeat locked".into()));
        }
        Ok(())
    }

    async fn recommended_track(&self) -> Result<RecommendedTrack> {
        self.recommendations
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BotError::Transport("no recommendation available".into()))
    }

    async fn track_details(&self, track_id: &TrackId) -> Result<Track> {
        self.catalog
            .lock()
            .unwrap()
            .get(track_id)
            .cloned()
            .ok_or_else(|| BotError::Transport(format!("unknown track {}", track_id)))
    }

    fn extract_track_id(&self, url: &str) -> Option<TrackId> {
        if let Some(rest) = url.strip_prefix("https://open.spotify.com/track/") {
            let id = rest.split(['?', '/']).next().unwrap_or(rest);
            if !id.is_empty() {
                return Some(TrackId::from(id));
            }
        }
        if let Some(id) = url.strip_prefix("spotify:track:") {
            if !id.is_empty() {
                return Some(TrackId::from(id));
            }
        }
        None
    }

    fn supports_target_playlist(&self) -> bool {
        true
    }

    async fn set_target_playlist(&self, _playlist_id: &str) -> Result<()> {
        Ok(())
    }
}

// --- LLM mock ---

pub struct MockLlm {
    pub not_music: AtomicBool,
    pub help: AtomicBool,
    pub priority: AtomicBool,
    /// Configured stage-0 query; `None` echoes the raw text.
    pub extracted_query: Mutex<Option<String>>,
    /// When set, `rank_tracks` returns exactly this; otherwise it passes
    /// the candidates through unchanged.
    pub ranked: Mutex<Option<Vec<Track>>>,
    pub mood: Mutex<String>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self {
            not_music: AtomicBool::new(false),
            help: AtomicBool::new(false),
            priority: AtomicBool::new(false),
            extracted_query: Mutex::new(None),
            ranked: Mutex::new(None),
            mood: Mutex::new("mellow and warm".to_string()),
        }
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LlmAssist for MockLlm {
    async fn rank_tracks(&self, _query: &str, candidates: &[Track]) -> Result<Vec<Track>> {
        Ok(self
            .ranked
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| candidates.to_vec()))
    }

    async fn is_not_music_request(&self, _text: &str) -> Result<bool> {
        Ok(self.not_music.load(Ordering::SeqCst))
    }

    async fn is_help_request(&self, _text: &str) -> Result<bool> {
        Ok(self.help.load(Ordering::SeqCst))
    }

    async fn is_priority_request(&self, _text: &str) -> Result<bool> {
        Ok(self.priority.load(Ordering::SeqCst))
    }

    async fn track_mood(&self, _tracks: &[Track]) -> Result<String> {
        Ok(self.mood.lock().unwrap().clone())
    }

    async fn extract_song_query(&self, text: &str) -> Result<String> {
        Ok(self
            .extracted_query
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| text.to_string()))
    }
}

// --- Link resolver mock ---

#[derive(Default)]
pub struct MockResolver {
    pub songs: Mutex<HashMap<String, ResolvedSong>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_song(&self, url: &str, title: &str, artist: &str, isrc: Option<&str>) {
        self.songs.lock().unwrap().insert(
            url.to_string(),
            ResolvedSong {
                title: title.to_string(),
                artist: artist.to_string(),
                isrc: isrc.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl LinkResolver for MockResolver {
    fn can_resolve(&self, url: &str) -> bool {
        self.songs.lock().unwrap().contains_key(url)
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedSong> {
        self.songs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| BotError::Resolution(format!("unsupported url {}", url)))
    }
}

// --- Optional approval capabilities ---

pub struct MockAdminApproval {
    pub enabled: bool,
    /// `None` times out instead of answering.
    pub answer: Mutex<Option<bool>>,
    pub delay: Mutex<Duration>,
}

impl MockAdminApproval {
    pub fn answering(answer: bool) -> Self {
        Self {
            enabled: true,
            answer: Mutex::new(Some(answer)),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }
}

#[async_trait]
impl AdminApproval for MockAdminApproval {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn await_admin_approval(
        &self,
        _origin: &MessageOrigin,
        _track: &Track,
        _mood: &str,
        timeout: Duration,
    ) -> Result<bool> {
        let delay = *self.delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        match *self.answer.lock().unwrap() {
            Some(answer) => Ok(answer),
            None => Err(BotError::ApprovalTimeout(timeout)),
        }
    }
}

pub struct MockCommunityApproval {
    pub answer: Mutex<Option<bool>>,
    pub delay: Mutex<Duration>,
}

impl MockCommunityApproval {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer: Mutex::new(Some(answer)),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }
}

#[async_trait]
impl CommunityApproval for MockCommunityApproval {
    async fn await_community_approval(
        &self,
        _message_id: &str,
        _required: u32,
        timeout: Duration,
        _requester_user_id: &str,
    ) -> Result<bool> {
        let delay = *self.delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        match *self.answer.lock().unwrap() {
            Some(answer) => Ok(answer),
            None => Err(BotError::ApprovalTimeout(timeout)),
        }
    }
}

#[derive(Default)]
pub struct MockCancelAdmin {
    pub cancelled: Mutex<Vec<MessageOrigin>>,
}

#[async_trait]
impl CancelAdminApproval for MockCancelAdmin {
    async fn cancel_admin_approval(&self, origin: &MessageOrigin) -> Result<()> {
        self.cancelled.lock().unwrap().push(origin.clone());
        Ok(())
    }
}

// --- The fixture itself ---

pub struct TestFixture {
    pub chat: Arc<MockChat>,
    pub streaming: Arc<MockStreaming>,
    pub llm: Arc<MockLlm>,
    pub resolver: Arc<MockResolver>,
    pub admin_cap: Option<Arc<MockAdminApproval>>,
    pub community_cap: Option<Arc<MockCommunityApproval>>,
    pub cancel_cap: Option<Arc<MockCancelAdmin>>,
    pub services: Arc<Services>,
    pub wake_rx: Mutex<Option<WakeReceiver>>,
}

pub struct FixtureBuilder {
    config: ShindigConfig,
    admin_cap: Option<Arc<MockAdminApproval>>,
    community_cap: Option<Arc<MockCommunityApproval>>,
    cancel_cap: Option<Arc<MockCancelAdmin>>,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        let mut config = ShindigConfig::default();
        config.room.chat_id = CHAT_ID.to_string();
        config.room.playlist_id = PLAYLIST_ID.to_string();
        Self {
            config,
            admin_cap: None,
            community_cap: None,
            cancel_cap: None,
        }
    }

    pub fn config(mut self, tweak: impl FnOnce(&mut ShindigConfig)) -> Self {
        tweak(&mut self.config);
        self
    }

    pub fn admin_approval(mut self, cap: MockAdminApproval) -> Self {
        self.admin_cap = Some(Arc::new(cap));
        self
    }

    pub fn community_approval(mut self, cap: MockCommunityApproval) -> Self {
        self.community_cap = Some(Arc::new(cap));
        self
    }

    pub fn cancel_capability(mut self) -> Self {
        self.cancel_cap = Some(Arc::new(MockCancelAdmin::default()));
        self
    }

    pub fn build(self) -> TestFixture {
        let chat = Arc::new(MockChat::new());
        let streaming = Arc::new(MockStreaming::new());
        let llm = Arc::new(MockLlm::new());
        let resolver = Arc::new(MockResolver::new());

        let mut frontend = Frontend::new(chat.clone());
        if let Some(cap) = &self.admin_cap {
            frontend = frontend.with_admin_approval(cap.clone());
        }
        if let Some(cap) = &self.community_cap {
            frontend = frontend.with_community_approval(cap.clone());
        }
        if let Some(cap) = &self.cancel_cap {
            frontend = frontend.with_cancel_admin_approval(cap.clone());
        }

        let (services, wake_rx) = Services::new(
            self.config,
            frontend,
            streaming.clone(),
            llm.clone(),
            resolver.clone(),
        );

        TestFixture {
            chat,
            streaming,
            llm,
            resolver,
            admin_cap: self.admin_cap,
            community_cap: self.community_cap,
            cancel_cap: self.cancel_cap,
            services: Arc::new(services),
            wake_rx: Mutex::new(Some(wake_rx)),
        }
    }
}

impl TestFixture {
    pub fn new() -> Self {
        FixtureBuilder::new().build()
    }

    pub fn builder() -> FixtureBuilder {
        FixtureBuilder::new()
    }

    pub fn pipeline(&self) -> shindig::MessagePipeline {
        shindig::MessagePipeline::new(self.services.clone())
    }

    pub fn queue_manager(&self) -> shindig::QueueManager {
        shindig::QueueManager::new(self.services.clone())
    }

    pub fn take_wake_rx(&self) -> WakeReceiver {
        self.wake_rx
            .lock()
            .unwrap()
            .take()
            .expect("wake receiver already taken")
    }

    /// Parse a chat message the way the dispatcher would.
    pub fn message(&self, sender_id: &str, text: &str) -> InputMessage {
        let mut raw = RawMessage::new(
            format!("in-{}", next_suffix()),
            CHAT_ID,
            sender_id,
            text,
        );
        raw.sender_name = sender_id.to_string();
        parse_message(&raw, &Providers::default())
    }
}

fn next_suffix() -> String {
    use std::sync::atomic::AtomicU64;
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::SeqCst).to_string()
}
