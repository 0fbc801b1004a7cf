//! Engine Event System
//!
//! Simple event system using tokio::sync::broadcast. Events are
//! fire-and-forget notifications for observers (dashboards, metrics,
//! tests); nothing in the engine relies on them for correctness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::campaign::{CallId, CampaignId, ContactId};
use crate::outcome::CallOutcome;

/// Events published by the campaign engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CampaignEvent {
    /// A campaign began dialing
    CampaignStarted {
        campaign_id: CampaignId,
        at: DateTime<Utc>,
    },

    /// An existing campaign picked back up (resume or process restart)
    CampaignResumed { campaign_id: CampaignId },

    /// A campaign was paused; in-flight calls continue
    CampaignPaused { campaign_id: CampaignId },

    /// All contacts settled and the campaign finished
    CampaignCompleted {
        campaign_id: CampaignId,
        at: DateTime<Utc>,
    },

    /// A call was handed to the provider
    CallPlaced {
        campaign_id: CampaignId,
        contact_id: ContactId,
        call_id: CallId,
        from_number: Option<String>,
    },

    /// A failed placement was scheduled for another attempt
    RetryScheduled {
        campaign_id: CampaignId,
        contact_id: ContactId,
        attempt: u32,
        delay_ms: u64,
    },

    /// A contact exhausted its retry budget
    ContactFailed {
        campaign_id: CampaignId,
        contact_id: ContactId,
        error: String,
    },

    /// A terminal outcome was folded into campaign state
    OutcomeRecorded {
        campaign_id: CampaignId,
        contact_id: ContactId,
        call_id: CallId,
        outcome: CallOutcome,
    },
}

/// Broadcast bus for engine events
#[derive(Debug, Clone)]
pub struct EngineEventBus {
    sender: broadcast::Sender<CampaignEvent>,
}

impl EngineEventBus {
    /// Create a new event bus with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Lagging or absent subscribers are ignored.
    pub fn publish(&self, event: CampaignEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EngineEventBus::new(16);
        let mut rx = bus.subscribe();

        let campaign_id = CampaignId::new();
        bus.publish(CampaignEvent::CampaignPaused {
            campaign_id: campaign_id.clone(),
        });

        match rx.recv().await.unwrap() {
            CampaignEvent::CampaignPaused { campaign_id: id } => assert_eq!(id, campaign_id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EngineEventBus::new(16);
        bus.publish(CampaignEvent::CampaignResumed {
            campaign_id: CampaignId::new(),
        });
    }
}
