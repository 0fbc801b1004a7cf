//! Folding provider call-status events back into campaign state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::{CampaignEvent, EngineEventBus};
use crate::scheduler::ExecutionRegistry;
use crate::store::{CampaignStore, ContactUpdate};

use super::classifier::{classify_outcome, CallStatusEvent};

/// Consumes call-status events and records terminal outcomes.
///
/// Every event is acknowledged, including unknown call ids and duplicate
/// terminal deliveries; providers retry on anything else and the retries
/// would change nothing anyway.
pub struct OutcomeIngestion {
    store: Arc<dyn CampaignStore>,
    registry: Arc<ExecutionRegistry>,
    events: EngineEventBus,
}

impl OutcomeIngestion {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        registry: Arc<ExecutionRegistry>,
        events: EngineEventBus,
    ) -> Self {
        Self {
            store,
            registry,
            events,
        }
    }

    /// Process one call-status event
    pub async fn ingest(&self, event: CallStatusEvent) -> Result<()> {
        let Some(record) = self.store.find_call(&event.call_id).await? else {
            warn!("Dropping status event for unknown call {}", event.call_id);
            return Ok(());
        };

        if !event.is_terminal() {
            debug!("Call {} status: {}", event.call_id, event.status);
            self.store
                .update_call_status(&event.call_id, &event.status)
                .await?;
            return Ok(());
        }

        let outcome = classify_outcome(&event);

        // The latch admits one terminal transition per call; a duplicate
        // delivery lands here with `false` and changes nothing
        if !self.store.mark_call_terminal(&event.call_id, outcome).await? {
            debug!(
                "Duplicate terminal event for call {}, ignoring",
                event.call_id
            );
            return Ok(());
        }

        info!(
            "📴 Call {} ended: {} (campaign {}, contact {})",
            event.call_id, outcome, record.campaign_id, record.contact_id
        );

        self.store
            .update_contact_status(
                &record.campaign_id,
                &record.contact_id,
                ContactUpdate {
                    status: Some(outcome.contact_status()),
                    completed_at: Some(Utc::now()),
                    result: event.summary.clone().or_else(|| Some(outcome.to_string())),
                    ..Default::default()
                },
            )
            .await?;

        self.store
            .increment_outcome(&record.campaign_id, outcome.counter())
            .await?;

        self.registry
            .on_call_settled(&record.campaign_id, &event.call_id);

        self.events.publish(CampaignEvent::OutcomeRecorded {
            campaign_id: record.campaign_id,
            contact_id: record.contact_id,
            call_id: event.call_id,
            outcome,
        });
        Ok(())
    }
}
