//! The queue manager: keeps the streaming queue filled to a target
//! remaining duration, and runs the auto-DJ proposal protocol when the
//! playlist runs out.
//!
//! The loop wakes on a periodic tick, on a coalesced wake-up from the
//! pipeline after any playlist insertion, or on shutdown. Each pass is
//! guarded by a single-flight flag in the flow registry; the flag stays
//! held while a proposal flow is awaiting its verdict so two auto-DJ
//! rounds can never overlap.

use crate::domain::{Track, TrackId};
use crate::error::Result;
use crate::flows::{FlowId, FlowRegistry, PendingApproval};
use crate::lexicon::{
    queue_approval_message_key, KEY_QUEUE_MANAGEMENT, KEY_QUEUE_REPLACEMENT,
};
use crate::services::Services;
use crate::shadow::ShadowSource;
use crate::wake::WakeReceiver;
use crate::warnings::WarningCategory;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Grace before an auto-approved proposal is acted on, so the room sees
/// the announcement before the track lands.
const AUTO_APPROVE_DELAY: Duration = Duration::from_secs(2);

/// Deadline for the work a timeout worker does after its own window has
/// already expired (playlist add, button strip).
const POST_TIMEOUT_BUDGET: Duration = Duration::from_secs(10);

/// Releases the single-flight flag unless the run handed off to a pending
/// proposal flow.
struct RunGuard<'a> {
    flows: &'a FlowRegistry,
    armed: bool,
}

impl<'a> RunGuard<'a> {
    fn new(flows: &'a FlowRegistry) -> Self {
        Self { flows, armed: true }
    }

    /// Keep the flag held past this run; the flow's decision path will
    /// release it.
    fn hand_off(&mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flows.release_queue_run();
        }
    }
}

pub struct QueueManager {
    services: Arc<Services>,
}

impl QueueManager {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// The long-running loop. Consumes the wake receiver.
    pub async fn run(&self, mut wake: WakeReceiver) {
        let mut ticker = tokio::time::interval(self.services.config.tuning.queue.check_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                token = wake.recv() => {
                    if token.is_none() {
                        break;
                    }
                }
                _ = self.services.shutdown.cancelled() => break,
            }
            self.tick().await;
        }

        debug!("Queue manager stopped");
    }

    /// One pass: check the device, claim the single-flight slot, and fill.
    pub async fn tick(&self) {
        let services = &self.services;

        match services.streaming.has_active_device().await {
            Ok(true) => services.clear_warning(WarningCategory::Device).await,
            Ok(false) => {
                let message = services.lexicon.get("warn.device").to_string();
                services
                    .raise_warning(WarningCategory::Device, &message)
                    .await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Device check failed");
                return;
            }
        }

        if !services.flows.try_acquire_queue_run() {
            debug!("Queue run already in flight, skipping");
            return;
        }
        let mut guard = RunGuard::new(&services.flows);

        if let Err(e) = self.fill(&mut guard).await {
            warn!(error = %e, "Queue fill pass failed");
        }
    }

    async fn fill(&self, guard: &mut RunGuard<'_>) -> Result<()> {
        let services = &self.services;
        let target = services.config.tuning.queue.target_duration();
        let mut current = services
            .shadow
            .remaining_with_current_track(services.streaming.as_ref())
            .await?;

        if current >= target {
            return Ok(());
        }

        let Some(position) = self.logical_playlist_position().await? else {
            // Progression is unknowable; do nothing rather than guess.
            debug!("Current track not locatable in playlist, skipping fill");
            return Ok(());
        };

        let playlist_id = services.playlist_id();
        let upcoming = services
            .streaming
            .next_playlist_tracks_from_position(
                playlist_id,
                position,
                services.config.tuning.queue.max_tracks_to_fetch,
            )
            .await?;

        for track in upcoming {
            if current >= target {
                break;
            }
            if services.shadow.contains(&track.id) {
                continue;
            }
            match services.streaming.add_to_queue(&track.id).await {
                Ok(()) => {
                    current += track.duration;
                    services.shadow.append(
                        track.id.clone(),
                        ShadowSource::Playlist,
                        track.duration,
                    );
                    debug!(track.id = %track.id, "Queued from playlist");
                }
                Err(e) => {
                    warn!(track.id = %track.id, error = %e, "Could not queue playlist track");
                }
            }
        }

        if current >= target {
            return Ok(());
        }

        // The playlist ran dry; ask the auto-DJ.
        self.start_proposal_flow(guard).await
    }

    /// Where the next playlist pull should come from, adjusted for a
    /// currently playing priority track.
    async fn logical_playlist_position(&self) -> Result<Option<usize>> {
        let services = &self.services;
        let Some(current) = services.streaming.current_track_id().await? else {
            return Ok(None);
        };

        let tracks = services
            .streaming
            .playlist_tracks_with_details(services.playlist_id())
            .await?;
        let find = |id: &TrackId| tracks.iter().position(|t| &t.id == id);

        if let Some(info) = services.priority.get(&current) {
            if let Some(position) = find(&info.resume_song_id) {
                return Ok(Some(position));
            }
            // The resume point vanished (playlist edited?); try the
            // priority track itself.
            if let Some(position) = find(&current) {
                return Ok(Some(position + 1));
            }
            return Ok(None);
        }

        Ok(find(&current))
    }

    // --- Auto-DJ proposals ---

    async fn start_proposal_flow(&self, guard: &mut RunGuard<'_>) -> Result<()> {
        let services = &self.services;
        let flow_id = services.flows.create_flow();
        let auto_approve = services.config.tuning.queue.max_track_replacements == 0;

        match self
            .propose_candidate(&flow_id, KEY_QUEUE_MANAGEMENT, auto_approve)
            .await
        {
            Ok(()) => {
                guard.hand_off();
                Ok(())
            }
            Err(e) => {
                services.flows.remove_flow(&flow_id);
                Err(e)
            }
        }
    }

    /// Fetch an auto-DJ pick, attach it to the flow, and post its approval
    /// message (interactive, or plain text on the auto path).
    fn propose_candidate<'a>(
        &'a self,
        flow_id: &'a FlowId,
        base_key: &'a str,
        auto_approve: bool,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let services = &self.services;
            let recommendation = services.streaming.recommended_track().await?;
            let track = services
                .streaming
                .track_details(&recommendation.id)
                .await?;

            services
                .flows
                .add_pending_track(flow_id, track.id.clone(), track.display_name());

            let key = queue_approval_message_key(base_key, auto_approve);
            let text = services.lexicon.render(
                &key,
                &[
                    ("title", &track.title),
                    ("artist", &track.artist),
                    ("mood", &recommendation.mood),
                ],
            );

            info!(
                track.id = %track.id,
                track.name = %track.display_name(),
                flow.id = %flow_id,
                auto_approve,
                "Proposing auto-DJ pick"
            );

            if auto_approve {
                self.post_auto_proposal(&track, &text).await
            } else {
                self.post_interactive_proposal(&track, &text).await
            }
        })
    }

    async fn post_auto_proposal(&self, track: &Track, text: &str) -> Result<()> {
        let services = &self.services;
        let chat = &services.frontend.chat;
        let chat_id = services.chat_id();

        let message_id = chat.send_text(chat_id, None, text).await?;
        if let Err(e) = chat.react(chat_id, &message_id, "👍").await {
            debug!(error = %e, "Could not react on auto proposal");
        }

        let manager = QueueManager::new(services.clone());
        let track_id = track.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(AUTO_APPROVE_DELAY).await;
            manager.handle_decision(track_id, true).await;
        });
        Ok(())
    }

    async fn post_interactive_proposal(&self, track: &Track, text: &str) -> Result<()> {
        let services = &self.services;
        let chat_id = services.chat_id().to_string();
        let window = services.config.tuning.queue.track_approval_timeout();

        let message_id = services
            .frontend
            .chat
            .send_queue_track_approval(&chat_id, &track.id, text)
            .await?;

        let cancel = CancellationToken::new();
        services.flows.register_approval(PendingApproval {
            track_id: track.id.clone(),
            chat_id,
            message_id: message_id.clone(),
            expires_at: Instant::now() + window,
            cancel: cancel.clone(),
        });

        let worker_services = services.clone();
        let track_id = track.id.clone();
        tokio::spawn(async move {
            timeout_worker(worker_services, message_id, track_id, cancel, window).await;
        });
        Ok(())
    }

    /// Verdict funnel: button callbacks and the auto-approve branch both
    /// land here.
    pub async fn handle_decision(&self, track_id: TrackId, approved: bool) {
        let services = &self.services;
        let Some(claim) = services.flows.claim_decision(&track_id) else {
            debug!(track.id = %track_id, "Stale queue decision ignored");
            return;
        };

        if approved {
            match services
                .streaming
                .add_to_playlist(services.playlist_id(), &track_id)
                .await
            {
                Ok(()) => {
                    services.dedup.add(track_id.clone());
                    services.wake.wake();
                }
                Err(e) => {
                    warn!(track.id = %track_id, error = %e, "Approved pick failed to land in playlist");
                }
            }
            if let Some((chat_id, message_id)) = &claim.approval {
                if let Err(e) = services
                    .frontend
                    .chat
                    .react(chat_id, message_id, "👍")
                    .await
                {
                    debug!(error = %e, "Could not react on approved proposal");
                }
            }
            info!(
                track.id = %track_id,
                track.name = %claim.track_name,
                flow.id = %claim.flow_id,
                "Queue proposal approved"
            );
            services.flows.remove_flow(&claim.flow_id);
            services.flows.release_queue_run();
        } else {
            let rejections = services
                .flows
                .record_rejection(&claim.flow_id)
                .unwrap_or(claim.rejection_count + 1);
            let auto_approve =
                rejections >= services.config.tuning.queue.max_track_replacements;
            // Once the rejection budget is spent, the flow falls back to
            // plain queue management - no more haggling.
            let base_key = if auto_approve {
                KEY_QUEUE_MANAGEMENT
            } else {
                KEY_QUEUE_REPLACEMENT
            };

            info!(
                track.id = %track_id,
                flow.id = %claim.flow_id,
                flow.rejections = rejections,
                auto_approve,
                "Queue proposal rejected, fetching replacement"
            );

            if let Err(e) = self
                .propose_candidate(&claim.flow_id, base_key, auto_approve)
                .await
            {
                warn!(flow.id = %claim.flow_id, error = %e, "Replacement proposal failed");
                services.flows.remove_flow(&claim.flow_id);
                services.flows.release_queue_run();
            }
            // The flag stays held while the replacement awaits its verdict.
        }
    }
}

/// Waits out an interactive proposal's decision window. Silence is consent
/// once the window has passed, otherwise the room goes dead.
async fn timeout_worker(
    services: Arc<Services>,
    message_id: String,
    track_id: TrackId,
    cancel: CancellationToken,
    window: Duration,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(window) => {}
    }

    // Loses cleanly if an explicit decision got here first.
    let Some(claim) = services.flows.claim_timeout(&message_id, &track_id) else {
        return;
    };

    // The original window has expired; the follow-up work gets its own
    // bounded deadline.
    let work = async {
        match services
            .streaming
            .add_to_playlist(services.playlist_id(), &track_id)
            .await
        {
            Ok(()) => {
                services.dedup.add(track_id.clone());
                services.wake.wake();
            }
            Err(e) => {
                warn!(track.id = %track_id, error = %e, "Auto-accepted pick failed to land in playlist");
            }
        }

        if let Some((chat_id, approval_message_id)) = &claim.approval {
            let text = services
                .lexicon
                .render("bot.queue_auto_accepted", &[("track", &claim.track_name)]);
            // Editing replaces the interactive message, stripping buttons.
            if let Err(e) = services
                .frontend
                .chat
                .edit_message(chat_id, approval_message_id, &text)
                .await
            {
                debug!(error = %e, "Could not strip approval buttons");
            }
            if let Err(e) = services
                .frontend
                .chat
                .react(chat_id, approval_message_id, "👍")
                .await
            {
                debug!(error = %e, "Could not react on auto-accepted proposal");
            }
        }
    };

    if tokio::time::timeout(POST_TIMEOUT_BUDGET, work).await.is_err() {
        warn!(track.id = %track_id, "Post-timeout cleanup overran its budget");
    }

    info!(
        track.id = %track_id,
        track.name = %claim.track_name,
        "Auto-accepted after timeout"
    );
    services.flows.remove_flow(&claim.flow_id);
    services.flows.release_queue_run();
}
