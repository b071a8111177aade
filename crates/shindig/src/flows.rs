//! Registry of auto-DJ proposal flows and their pending approvals.
//!
//! A flow is one round of "the queue needs filling": it may span several
//! proposed candidates as admins reject them. Two maps live under one lock
//! together with the queue manager's single-flight flag, so a decision can
//! be resolved atomically: find the owning flow, detach the track, cancel
//! the timeout, drop the pending-approval entry - all in one acquisition.

use crate::domain::TrackId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for one proposal flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowId(Uuid);

impl FlowId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One round of auto-DJ proposals.
#[derive(Debug)]
pub struct QueueFlow {
    pub flow_id: FlowId,
    pub rejection_count: u32,
    /// track id -> display name of every candidate still awaiting a verdict.
    pub pending_tracks: HashMap<TrackId, String>,
    pub created_at: Instant,
}

/// One pending interactive approval message.
#[derive(Debug)]
pub struct PendingApproval {
    pub track_id: TrackId,
    pub chat_id: String,
    pub message_id: String,
    pub expires_at: Instant,
    /// Aborts the timeout worker if a decision lands first.
    pub cancel: CancellationToken,
}

/// What a resolved decision detached from the registry.
#[derive(Debug)]
pub struct DecisionClaim {
    pub flow_id: FlowId,
    pub rejection_count: u32,
    /// Display name the track was proposed under.
    pub track_name: String,
    /// The approval message that carried the buttons, absent on the
    /// auto-approve path (plain text, no interactive message).
    pub approval: Option<(String, String)>,
}

/// Registry snapshot for debug logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStats {
    pub open_flows: usize,
    pub pending_approvals: usize,
    pub queue_run_active: bool,
}

#[derive(Debug, Default)]
struct Inner {
    flows: HashMap<FlowId, QueueFlow>,
    pending: HashMap<String, PendingApproval>,
    queue_run_active: bool,
}

#[derive(Debug, Default)]
pub struct FlowRegistry {
    inner: Mutex<Inner>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_flow(&self) -> FlowId {
        let flow_id = FlowId::new();
        let mut inner = self.inner.lock().unwrap();
        inner.flows.insert(
            flow_id.clone(),
            QueueFlow {
                flow_id: flow_id.clone(),
                rejection_count: 0,
                pending_tracks: HashMap::new(),
                created_at: Instant::now(),
            },
        );
        tracing::debug!(flow.id = %flow_id, "Proposal flow created");
        flow_id
    }

    /// Attach a proposed candidate to its flow.
    pub fn add_pending_track(&self, flow_id: &FlowId, track_id: TrackId, name: String) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(flow) = inner.flows.get_mut(flow_id) {
            flow.pending_tracks.insert(track_id, name);
        }
    }

    /// Register an interactive approval message, keyed by its message id.
    pub fn register_approval(&self, approval: PendingApproval) {
        self.inner
            .lock()
            .unwrap()
            .pending
            .insert(approval.message_id.clone(), approval);
    }

    /// Resolve an explicit decision for `track_id`.
    ///
    /// Atomically detaches the track from its flow, cancels the timeout
    /// worker, and drops the pending-approval entry. Returns `None` when no
    /// flow owns the track (a stale or duplicate decision), in which case
    /// nothing is touched.
    pub fn claim_decision(&self, track_id: &TrackId) -> Option<DecisionClaim> {
        let mut inner = self.inner.lock().unwrap();

        let (flow_id, rejection_count, track_name) = detach_from_flow(&mut inner.flows, track_id)?;

        let approval_key = inner
            .pending
            .iter()
            .find(|(_, a)| &a.track_id == track_id)
            .map(|(k, _)| k.clone());

        let approval = approval_key.and_then(|key| inner.pending.remove(&key)).map(|a| {
            a.cancel.cancel();
            (a.chat_id, a.message_id)
        });

        Some(DecisionClaim {
            flow_id,
            rejection_count,
            track_name,
            approval,
        })
    }

    /// Resolve a timeout for the approval message `message_id`.
    ///
    /// Succeeds only while the approval is still pending *and* the track is
    /// still referenced by some flow; both entries are removed. A `None`
    /// means an explicit decision won the race (at most one of the two
    /// paths ever fires per track).
    pub fn claim_timeout(&self, message_id: &str, track_id: &TrackId) -> Option<DecisionClaim> {
        let mut inner = self.inner.lock().unwrap();

        if !inner
            .pending
            .get(message_id)
            .map(|a| &a.track_id == track_id)
            .unwrap_or(false)
        {
            return None;
        }

        let (flow_id, rejection_count, track_name) = detach_from_flow(&mut inner.flows, track_id)?;

        let approval = inner
            .pending
            .remove(message_id)
            .map(|a| (a.chat_id, a.message_id));

        Some(DecisionClaim {
            flow_id,
            rejection_count,
            track_name,
            approval,
        })
    }

    /// Bump a flow's rejection counter and return the new value.
    pub fn record_rejection(&self, flow_id: &FlowId) -> Option<u32> {
        let mut inner = self.inner.lock().unwrap();
        let flow = inner.flows.get_mut(flow_id)?;
        flow.rejection_count += 1;
        Some(flow.rejection_count)
    }

    pub fn rejection_count(&self, flow_id: &FlowId) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .flows
            .get(flow_id)
            .map(|f| f.rejection_count)
    }

    pub fn remove_flow(&self, flow_id: &FlowId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.flows.remove(flow_id).is_some() {
            tracing::debug!(flow.id = %flow_id, "Proposal flow removed");
        }
    }

    /// Claim the queue manager's single-flight slot. Returns false when a
    /// run (or an unfinished proposal flow) already holds it.
    pub fn try_acquire_queue_run(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.queue_run_active {
            false
        } else {
            inner.queue_run_active = true;
            true
        }
    }

    pub fn release_queue_run(&self) {
        self.inner.lock().unwrap().queue_run_active = false;
    }

    pub fn queue_run_active(&self) -> bool {
        self.inner.lock().unwrap().queue_run_active
    }

    pub fn stats(&self) -> FlowStats {
        let inner = self.inner.lock().unwrap();
        FlowStats {
            open_flows: inner.flows.len(),
            pending_approvals: inner.pending.len(),
            queue_run_active: inner.queue_run_active,
        }
    }
}

/// Remove `track_id` from whichever flow owns it, returning the flow id,
/// its current rejection count, and the track's display name.
fn detach_from_flow(
    flows: &mut HashMap<FlowId, QueueFlow>,
    track_id: &TrackId,
) -> Option<(FlowId, u32, String)> {
    for flow in flows.values_mut() {
        if let Some(name) = flow.pending_tracks.remove(track_id) {
            return Some((flow.flow_id.clone(), flow.rejection_count, name));
        }
    }
    None
}
