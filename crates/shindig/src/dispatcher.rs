//! Lifecycle coordinator: wires the frontend to the pipeline, spawns the
//! monitors and the queue manager, and tracks in-flight messages.

use crate::monitors;
use crate::pipeline::MessagePipeline;
use crate::queue_manager::QueueManager;
use crate::services::Services;
use crate::wake::WakeReceiver;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use trackline::parse_message;

/// Bookkeeping for one message whose pipeline is still running.
#[derive(Debug)]
pub struct InFlightMessage {
    pub sender_id: String,
    pub accepted_at: Instant,
}

pub struct Dispatcher {
    services: Arc<Services>,
    in_flight: RwLock<HashMap<String, InFlightMessage>>,
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            in_flight: RwLock::new(HashMap::new()),
        }
    }

    /// Messages currently being processed.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.read().unwrap().len()
    }

    /// Bring the bot up and serve until shutdown.
    pub async fn run(self: &Arc<Self>, wake_rx: WakeReceiver) -> Result<()> {
        let services = &self.services;
        let chat = services.frontend.chat.clone();

        // Point the backend at our playlist when it supports that.
        if services.streaming.supports_target_playlist() {
            services
                .streaming
                .set_target_playlist(services.playlist_id())
                .await
                .context("Failed to set target playlist")?;
        }

        // Seed the dedup set from a playlist snapshot. A failure here is
        // survivable - worst case we re-add a duplicate.
        match services
            .streaming
            .playlist_tracks_with_details(services.playlist_id())
            .await
        {
            Ok(tracks) => {
                let count = tracks.len();
                services.dedup.load(tracks.into_iter().map(|t| t.id));
                info!(playlist.tracks = count, "Dedup set loaded from playlist snapshot");
            }
            Err(e) => {
                warn!(error = %e, "Could not load playlist snapshot, starting with empty dedup set");
            }
        }

        chat.start().await.context("Failed to start chat frontend")?;

        // Route auto-DJ button presses to the queue manager.
        let (decision_tx, mut decision_rx) = mpsc::unbounded_channel();
        chat.set_queue_decision_sender(decision_tx);

        if let Err(e) = chat
            .send_text(services.chat_id(), None, services.lexicon.get("bot.startup"))
            .await
        {
            warn!(error = %e, "Could not post startup message");
        }

        tokio::spawn(monitors::settings_monitor(services.clone()));
        tokio::spawn(monitors::permissions_monitor(services.clone()));
        tokio::spawn(monitors::shadow_maintenance_monitor(services.clone()));

        let queue_manager = Arc::new(QueueManager::new(services.clone()));
        {
            let queue_manager = queue_manager.clone();
            tokio::spawn(async move {
                queue_manager.run(wake_rx).await;
            });
        }
        {
            let queue_manager = queue_manager.clone();
            let shutdown = services.shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        decision = decision_rx.recv() => {
                            let Some(decision) = decision else { break };
                            queue_manager
                                .handle_decision(decision.track_id, decision.approved)
                                .await;
                        }
                        _ = shutdown.cancelled() => break,
                    }
                }
            });
        }

        info!("Shindig is live, listening for requests");
        self.listen().await;
        Ok(())
    }

    async fn listen(self: &Arc<Self>) {
        let services = &self.services;
        let pipeline = Arc::new(MessagePipeline::new(services.clone()));

        loop {
            tokio::select! {
                _ = services.shutdown.cancelled() => break,
                message = services.frontend.chat.next_message() => match message {
                    Ok(Some(raw)) => self.accept(raw, &pipeline),
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Receive failed, backing off");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                },
            }
        }

        debug!("Dispatcher listen loop stopped");
    }

    fn accept(self: &Arc<Self>, raw: trackline::RawMessage, pipeline: &Arc<MessagePipeline>) {
        let input = parse_message(&raw, &self.services.providers);

        {
            let mut in_flight = self.in_flight.write().unwrap();
            if in_flight.contains_key(&input.message_id) {
                debug!(message.id = %input.message_id, "Message already in flight, ignoring");
                return;
            }
            in_flight.insert(
                input.message_id.clone(),
                InFlightMessage {
                    sender_id: input.sender_id.clone(),
                    accepted_at: Instant::now(),
                },
            );
        }

        let dispatcher = self.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let message_id = input.message_id.clone();
            pipeline.run(input).await;
            dispatcher.in_flight.write().unwrap().remove(&message_id);
        });
    }

    /// Post the goodbye and cancel everything. In-flight tasks drain at
    /// their next suspension point.
    pub async fn stop(&self) {
        let services = &self.services;
        if let Err(e) = services
            .frontend
            .chat
            .send_text(services.chat_id(), None, services.lexicon.get("bot.shutdown"))
            .await
        {
            warn!(error = %e, "Could not post shutdown message");
        }

        services.shutdown.cancel();

        if let Err(e) = services.frontend.chat.stop().await {
            warn!(error = %e, "Chat frontend stop failed");
        }
        info!("Shindig stopped");
    }
}
