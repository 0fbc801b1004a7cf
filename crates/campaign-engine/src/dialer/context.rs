//! Per-campaign execution state.
//!
//! One [`CampaignExecution`] exists per actively-driven campaign. It holds
//! the in-memory dial queue plus the counters the throttle needs, all cheap
//! enough to touch from both the drive loop and outcome ingestion.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::campaign::{CallId, CampaignId, ContactId, ThrottleConfig};

/// One queued dial: a contact and the number to reach them on
#[derive(Debug, Clone)]
pub struct QueuedContact {
    pub contact_id: ContactId,
    pub phone_number: String,
}

/// Live dialing state for one campaign
pub struct CampaignExecution {
    pub campaign_id: CampaignId,

    running: AtomicBool,
    active_calls: AtomicUsize,

    /// Contacts waiting out a retry backoff. They are not in the queue, but
    /// the campaign is not done while any remain.
    pending_retries: AtomicUsize,

    /// Call ids this context placed and has not yet seen settle. Settles for
    /// calls outside this set (a call left over from a previous execution of
    /// the same campaign) must not touch this context's slots.
    in_flight: Mutex<HashSet<CallId>>,

    queue: Mutex<VecDeque<QueuedContact>>,
    last_dial_at: Mutex<Option<Instant>>,

    /// Serializes advance passes for this campaign
    pub advance_guard: tokio::sync::Mutex<()>,

    nudge: Notify,
}

impl CampaignExecution {
    pub fn new(campaign_id: CampaignId) -> Self {
        Self {
            campaign_id,
            running: AtomicBool::new(true),
            active_calls: AtomicUsize::new(0),
            pending_retries: AtomicUsize::new(0),
            in_flight: Mutex::new(HashSet::new()),
            queue: Mutex::new(VecDeque::new()),
            last_dial_at: Mutex::new(None),
            advance_guard: tokio::sync::Mutex::new(()),
            nudge: Notify::new(),
        }
    }

    /// Whether the drive loop should keep going
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the drive loop at its next pass
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether a dial may be placed right now under the given throttle
    pub fn throttle_allows(&self, throttle: &ThrottleConfig, spacing_floor: Duration) -> bool {
        if self.active_calls.load(Ordering::SeqCst) >= throttle.max_concurrent_calls {
            return false;
        }
        let last = self.last_dial_at.lock();
        match *last {
            Some(at) => at.elapsed() >= throttle.pacing_interval(spacing_floor),
            None => true,
        }
    }

    /// Claim a concurrency slot before dialing
    pub fn acquire_slot(&self) {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Release a concurrency slot once a call settles
    pub fn release_slot(&self) {
        let _ = self
            .active_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::SeqCst)
    }

    /// Tie a successfully-placed call to the slot it holds
    pub fn register_call(&self, call_id: CallId) {
        self.in_flight.lock().insert(call_id);
    }

    /// A call settled. Releases its slot only if this context placed it;
    /// returns whether it did.
    pub fn settle_call(&self, call_id: &CallId) -> bool {
        let owned = self.in_flight.lock().remove(call_id);
        if owned {
            self.release_slot();
        }
        owned
    }

    /// Record the moment a dial went out, for rate spacing
    pub fn record_dial(&self) {
        *self.last_dial_at.lock() = Some(Instant::now());
    }

    /// Append a contact at the back of the dial queue
    pub fn enqueue(&self, contact: QueuedContact) {
        self.queue.lock().push_back(contact);
    }

    /// Take the next contact from the front of the queue
    pub fn dequeue(&self) -> Option<QueuedContact> {
        self.queue.lock().pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// A retry timer started for one contact
    pub fn retry_scheduled(&self) {
        self.pending_retries.fetch_add(1, Ordering::SeqCst);
    }

    /// A retry timer fired (or was abandoned)
    pub fn retry_settled(&self) {
        let _ = self
            .pending_retries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn pending_retries(&self) -> usize {
        self.pending_retries.load(Ordering::SeqCst)
    }

    /// Nothing left to dial and nothing in flight or waiting on backoff
    pub fn is_drained(&self) -> bool {
        self.queue_len() == 0 && self.active_calls() == 0 && self.pending_retries() == 0
    }

    /// Wake the drive loop ahead of its next pacing sleep
    pub fn nudge(&self) {
        self.nudge.notify_one();
    }

    /// Wait for a nudge
    pub async fn nudged(&self) {
        self.nudge.notified().await;
    }
}
