//! Approval orchestration: requester confirmation, admin-only approval,
//! and the concurrent admin/community race.

use crate::domain::{MessageOrigin, Track};
use crate::error::{BotError, Result};
use crate::services::Services;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How an approval round ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalVerdict {
    Approved(Approver),
    Denied,
}

/// Who said yes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approver {
    Admin,
    Community,
}

impl Approver {
    pub fn label(&self) -> &'static str {
        match self {
            Approver::Admin => "admin",
            Approver::Community => "community",
        }
    }
}

/// Ask the requester to confirm a disambiguated track.
///
/// A timeout counts as "no"; only real transport failures propagate.
pub async fn confirm_with_requester(
    services: &Services,
    origin: &MessageOrigin,
    prompt: &str,
) -> Result<bool> {
    let timeout = services.config.tuning.approvals.confirm_timeout();
    match services
        .frontend
        .chat
        .await_approval(origin, prompt, timeout)
        .await
    {
        Ok(answer) => Ok(answer),
        Err(BotError::ApprovalTimeout(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Run the admin (and, when configured, community) approval round for a
/// request. Posts a notification into the chat first and deletes it again
/// whatever the outcome.
pub async fn admin_approval(
    services: &Arc<Services>,
    origin: &MessageOrigin,
    requester_name: &str,
    track: &Track,
    mood: &str,
) -> Result<ApprovalVerdict> {
    let chat = &services.frontend.chat;
    let chat_id = services.chat_id().to_string();

    let text = services.lexicon.render(
        "bot.approval_request",
        &[
            ("requester", requester_name),
            ("title", &track.title),
            ("artist", &track.artist),
            ("url", &track.url),
        ],
    );
    let notification_id = chat
        .send_text(&chat_id, Some(&origin.message_id), &text)
        .await?;
    if let Err(e) = chat.react(&chat_id, &notification_id, "👍").await {
        debug!(error = %e, "Could not seed approval reaction");
    }

    let verdict = run_approval_round(services, origin, track, mood, &notification_id).await;

    if let Err(e) = chat.delete_message(&chat_id, &notification_id).await {
        debug!(error = %e, "Could not delete approval notification");
    }

    verdict
}

async fn run_approval_round(
    services: &Arc<Services>,
    origin: &MessageOrigin,
    track: &Track,
    mood: &str,
    notification_id: &str,
) -> Result<ApprovalVerdict> {
    let admin_cap = services
        .frontend
        .admin_approval
        .clone()
        .ok_or_else(|| BotError::Transport("admin approval capability missing".into()))?;

    let approvals = &services.config.tuning.approvals;
    let timeout = approvals.admin_timeout();
    let threshold = approvals.community_reactions;

    let community_cap = services.frontend.community_approval.clone();
    let Some(community_cap) = community_cap.filter(|_| threshold > 0) else {
        // Admin-only round.
        return match admin_cap
            .await_admin_approval(origin, track, mood, timeout)
            .await
        {
            Ok(true) => Ok(ApprovalVerdict::Approved(Approver::Admin)),
            Ok(false) => Ok(ApprovalVerdict::Denied),
            Err(BotError::ApprovalTimeout(_)) => Ok(ApprovalVerdict::Denied),
            Err(e) => Err(e),
        };
    };

    // Concurrent race: admins and the room both get a say; whoever answers
    // first wins, except that a community "no" merely falls back to the
    // admins.
    let (admin_tx, mut admin_rx) = mpsc::channel::<Result<bool>>(1);
    let (community_tx, mut community_rx) = mpsc::channel::<Result<bool>>(1);

    {
        let cap = admin_cap.clone();
        let origin = origin.clone();
        let track = track.clone();
        let mood = mood.to_string();
        tokio::spawn(async move {
            let result = cap
                .await_admin_approval(&origin, &track, &mood, timeout)
                .await;
            let _ = admin_tx.send(result).await;
        });
    }
    {
        let cap = community_cap.clone();
        let message_id = notification_id.to_string();
        let requester = origin.sender_id.clone();
        tokio::spawn(async move {
            let result = cap
                .await_community_approval(&message_id, threshold, timeout, &requester)
                .await;
            let _ = community_tx.send(result).await;
        });
    }

    let mut community_settled = false;
    loop {
        tokio::select! {
            Some(result) = admin_rx.recv() => {
                // An admin decision is always final.
                return match result {
                    Ok(true) => Ok(ApprovalVerdict::Approved(Approver::Admin)),
                    Ok(false) => Ok(ApprovalVerdict::Denied),
                    Err(BotError::ApprovalTimeout(_)) => Ok(ApprovalVerdict::Denied),
                    Err(e) => Err(e),
                };
            }
            Some(result) = community_rx.recv(), if !community_settled => {
                match result {
                    Ok(true) => {
                        if let Some(cancel) = &services.frontend.cancel_admin_approval {
                            if let Err(e) = cancel.cancel_admin_approval(origin).await {
                                warn!(error = %e, "Could not cancel admin approval");
                            }
                        }
                        return Ok(ApprovalVerdict::Approved(Approver::Community));
                    }
                    Ok(false) | Err(BotError::ApprovalTimeout(_)) => {
                        // Threshold unreachable: wait out the admins alone.
                        community_settled = true;
                    }
                    Err(e) => return Err(e),
                }
            }
            _ = services.shutdown.cancelled() => {
                // Shutdown counts as a denial.
                return Ok(ApprovalVerdict::Denied);
            }
        }
    }
}
