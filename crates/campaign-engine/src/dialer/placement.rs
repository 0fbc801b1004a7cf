//! Call placement.
//!
//! [`CallDispatcher`] turns a queued contact into a provider call: it bumps
//! the attempt count, resolves the outbound caller id, and hands the call to
//! the [`CallInitiator`]. Failed placements flow through the retry policy;
//! a retried contact goes to the BACK of the queue after its backoff so it
//! cannot starve the rest of the campaign.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::campaign::{CallId, Campaign, CampaignId, ContactId, ContactStatus, PhoneSource};
use crate::error::Result;
use crate::events::{CampaignEvent, EngineEventBus};
use crate::outcome::CallOutcome;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::rotation::RotationEngine;
use crate::store::{CallRecord, CampaignStore, ContactUpdate};

use super::context::{CampaignExecution, QueuedContact};

/// Everything the call provider needs to start an outbound call
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    /// Destination number
    pub to_number: String,
    /// Caller id, when the engine resolves one
    pub from_number: Option<String>,
    /// Agent that will handle the call
    pub agent_id: String,
}

/// Why a placement attempt did not produce a call
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The provider rejected or failed the request; usually transient
    #[error("provider error: {0}")]
    Provider(String),

    /// The request could not be built, e.g. no caller id available
    #[error("configuration error: {0}")]
    Config(String),
}

/// Seam to the outbound call provider
#[async_trait]
pub trait CallInitiator: Send + Sync {
    /// Start an outbound call, returning the provider's call id
    async fn place_call(
        &self,
        request: &PlacementRequest,
    ) -> std::result::Result<CallId, PlacementError>;
}

/// Places calls for queued contacts and applies the retry policy
pub struct CallDispatcher {
    store: Arc<dyn CampaignStore>,
    rotation: Arc<RotationEngine>,
    initiator: Arc<dyn CallInitiator>,
    retry: RetryPolicy,
    events: EngineEventBus,
    default_from_number: Option<String>,
}

impl CallDispatcher {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        rotation: Arc<RotationEngine>,
        initiator: Arc<dyn CallInitiator>,
        retry: RetryPolicy,
        events: EngineEventBus,
        default_from_number: Option<String>,
    ) -> Self {
        Self {
            store,
            rotation,
            initiator,
            retry,
            events,
            default_from_number,
        }
    }

    /// Dial one queued contact.
    ///
    /// The caller has already claimed a concurrency slot. On a successful
    /// placement the slot stays held until the terminal outcome arrives; on
    /// any failure path the slot is released here.
    pub async fn dial(
        &self,
        campaign: &Campaign,
        queued: QueuedContact,
        execution: &Arc<CampaignExecution>,
    ) -> Result<()> {
        let contact = match self
            .store
            .get_contact(&campaign.id, &queued.contact_id)
            .await?
        {
            Some(c) if !c.status.is_terminal() => c,
            Some(_) => {
                debug!(
                    "Contact {} already settled, skipping dial",
                    queued.contact_id
                );
                execution.release_slot();
                return Ok(());
            }
            None => {
                warn!(
                    "Queued contact {} missing from campaign {}",
                    queued.contact_id, campaign.id
                );
                execution.release_slot();
                return Ok(());
            }
        };

        let attempts = contact.attempts + 1;
        self.store
            .update_contact_status(
                &campaign.id,
                &queued.contact_id,
                ContactUpdate {
                    status: Some(ContactStatus::InProgress),
                    attempts: Some(attempts),
                    last_attempt_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        let from_number = match self.resolve_from_number(campaign) {
            Ok(from) => from,
            Err(err) => {
                return self
                    .handle_failure(campaign, queued, attempts, err, execution)
                    .await;
            }
        };

        let request = PlacementRequest {
            campaign_id: campaign.id.clone(),
            contact_id: queued.contact_id.clone(),
            to_number: queued.phone_number.clone(),
            from_number: from_number.clone(),
            agent_id: campaign.agent_id.clone(),
        };

        match self.initiator.place_call(&request).await {
            Ok(call_id) => {
                info!(
                    "📞 Placed call {} for contact {} (campaign {}, attempt {})",
                    call_id, queued.contact_id, campaign.id, attempts
                );
                self.store
                    .upsert_call(CallRecord::placed(
                        call_id.clone(),
                        campaign.id.clone(),
                        queued.contact_id.clone(),
                    ))
                    .await?;
                // The held slot now belongs to this call id
                execution.register_call(call_id.clone());
                self.events.publish(CampaignEvent::CallPlaced {
                    campaign_id: campaign.id.clone(),
                    contact_id: queued.contact_id,
                    call_id,
                    from_number,
                });
                Ok(())
            }
            Err(err) => {
                self.handle_failure(campaign, queued, attempts, err, execution)
                    .await
            }
        }
    }

    /// Resolve the caller id for a campaign's next dial.
    ///
    /// A pool with no eligible number is not a failure; the dial falls back
    /// to the platform default caller id.
    fn resolve_from_number(
        &self,
        campaign: &Campaign,
    ) -> std::result::Result<Option<String>, PlacementError> {
        match &campaign.phone_source {
            PhoneSource::Pool(pool_id) => {
                let selected = self
                    .rotation
                    .select_number(pool_id, Utc::now())
                    .map_err(|e| PlacementError::Config(e.to_string()))?;
                match selected {
                    Some(number) => Ok(Some(number.phone_number)),
                    None => {
                        debug!(
                            "No eligible number in pool {}, using default caller id",
                            pool_id
                        );
                        Ok(self.default_from_number.clone())
                    }
                }
            }
            PhoneSource::Fixed(number) => Ok(Some(number.clone())),
            PhoneSource::Default => Ok(self.default_from_number.clone()),
        }
    }

    /// Apply the retry policy to a failed attempt
    async fn handle_failure(
        &self,
        campaign: &Campaign,
        queued: QueuedContact,
        attempts: u32,
        err: PlacementError,
        execution: &Arc<CampaignExecution>,
    ) -> Result<()> {
        let message = err.to_string();
        match self.retry.decide(attempts) {
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    "Placement failed for contact {} (attempt {}): {}, retrying in {:?}",
                    queued.contact_id, attempts, message, delay
                );
                self.store
                    .update_contact_status(
                        &campaign.id,
                        &queued.contact_id,
                        ContactUpdate {
                            status: Some(ContactStatus::Pending),
                            last_error: Some(message),
                            ..Default::default()
                        },
                    )
                    .await?;

                self.events.publish(CampaignEvent::RetryScheduled {
                    campaign_id: campaign.id.clone(),
                    contact_id: queued.contact_id.clone(),
                    attempt: attempts,
                    delay_ms: delay.as_millis() as u64,
                });

                execution.retry_scheduled();
                let execution_for_timer = Arc::clone(execution);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if execution_for_timer.is_running() {
                        execution_for_timer.enqueue(queued);
                        execution_for_timer.nudge();
                    }
                    // A stopped campaign leaves the contact pending in the
                    // store; a later resume reloads it from there.
                    execution_for_timer.retry_settled();
                });
            }
            RetryDecision::GiveUp => {
                warn!(
                    "Contact {} exhausted its {} attempts: {}",
                    queued.contact_id,
                    self.retry.max_attempts(),
                    message
                );
                self.store
                    .update_contact_status(
                        &campaign.id,
                        &queued.contact_id,
                        ContactUpdate {
                            status: Some(ContactStatus::Failed),
                            completed_at: Some(Utc::now()),
                            last_error: Some(message.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.store
                    .increment_outcome(&campaign.id, CallOutcome::Failed.counter())
                    .await?;
                self.events.publish(CampaignEvent::ContactFailed {
                    campaign_id: campaign.id.clone(),
                    contact_id: queued.contact_id,
                    error: message,
                });
            }
        }

        execution.release_slot();
        execution.nudge();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::campaign::{CampaignContact, CampaignStatus};
    use crate::config::RotationConfig;
    use crate::store::MemoryStore;

    struct FailingInitiator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CallInitiator for FailingInitiator {
        async fn place_call(
            &self,
            _request: &PlacementRequest,
        ) -> std::result::Result<CallId, PlacementError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PlacementError::Provider("provider down".to_string()))
        }
    }

    struct OkInitiator;

    #[async_trait]
    impl CallInitiator for OkInitiator {
        async fn place_call(
            &self,
            _request: &PlacementRequest,
        ) -> std::result::Result<CallId, PlacementError> {
            Ok(CallId::new())
        }
    }

    async fn setup(
        store: Arc<MemoryStore>,
    ) -> (Campaign, QueuedContact, Arc<CampaignExecution>) {
        let mut campaign = Campaign::new("dial test", "org-1", "agent-1");
        campaign.status = CampaignStatus::Running;
        let contact_id = ContactId::new();
        let queued = QueuedContact {
            contact_id: contact_id.clone(),
            phone_number: "+15550009999".to_string(),
        };
        store.insert_campaign(campaign.clone()).await.unwrap();
        store
            .add_contact(CampaignContact::new(
                campaign.id.clone(),
                contact_id,
                queued.phone_number.clone(),
            ))
            .await
            .unwrap();

        let execution = Arc::new(CampaignExecution::new(campaign.id.clone()));
        execution.acquire_slot();
        (campaign, queued, execution)
    }

    fn dispatcher(
        store: Arc<dyn CampaignStore>,
        initiator: Arc<dyn CallInitiator>,
        retry: RetryPolicy,
    ) -> CallDispatcher {
        CallDispatcher::new(
            store,
            Arc::new(RotationEngine::new(RotationConfig::default())),
            initiator,
            retry,
            EngineEventBus::new(64),
            Some("+15550000000".to_string()),
        )
    }

    #[tokio::test]
    async fn successful_dial_records_call_and_holds_slot() {
        let store = Arc::new(MemoryStore::new());
        let (campaign, queued, execution) = setup(Arc::clone(&store)).await;
        let d = dispatcher(
            Arc::clone(&store) as Arc<dyn CampaignStore>,
            Arc::new(OkInitiator),
            RetryPolicy::new(3, vec![Duration::from_secs(60)]),
        );
        let mut events = d.events.subscribe();

        d.dial(&campaign, queued.clone(), &execution).await.unwrap();

        let contact = store
            .get_contact(&campaign.id, &queued.contact_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::InProgress);
        assert_eq!(contact.attempts, 1);
        // Slot stays held until the outcome arrives
        assert_eq!(execution.active_calls(), 1);

        // The call is registered against the context that placed it
        let call_id = match events.recv().await.unwrap() {
            CampaignEvent::CallPlaced { call_id, .. } => call_id,
            other => panic!("unexpected event: {other:?}"),
        };
        assert!(execution.settle_call(&call_id));
        assert_eq!(execution.active_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_schedules_retry_at_queue_tail() {
        let store = Arc::new(MemoryStore::new());
        let (campaign, queued, execution) = setup(Arc::clone(&store)).await;
        let d = dispatcher(
            Arc::clone(&store) as Arc<dyn CampaignStore>,
            Arc::new(FailingInitiator {
                calls: AtomicUsize::new(0),
            }),
            RetryPolicy::new(3, vec![Duration::from_secs(60)]),
        );

        d.dial(&campaign, queued.clone(), &execution).await.unwrap();

        assert_eq!(execution.active_calls(), 0);
        assert_eq!(execution.pending_retries(), 1);
        let contact = store
            .get_contact(&campaign.id, &queued.contact_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::Pending);
        assert!(contact.last_error.is_some());

        // The backoff timer re-enqueues the contact
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(execution.queue_len(), 1);
        assert_eq!(execution.pending_retries(), 0);
    }

    #[tokio::test]
    async fn exhausted_budget_fails_the_contact() {
        let store = Arc::new(MemoryStore::new());
        let (campaign, queued, execution) = setup(Arc::clone(&store)).await;
        let d = dispatcher(
            Arc::clone(&store) as Arc<dyn CampaignStore>,
            Arc::new(FailingInitiator {
                calls: AtomicUsize::new(0),
            }),
            RetryPolicy::new(1, vec![Duration::from_secs(60)]),
        );

        d.dial(&campaign, queued.clone(), &execution).await.unwrap();

        let contact = store
            .get_contact(&campaign.id, &queued.contact_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::Failed);
        assert!(contact.completed_at.is_some());

        let loaded = store.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(loaded.counters.failed_calls, 1);
        assert_eq!(loaded.counters.completed_calls, 1);
        assert_eq!(execution.active_calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_pool_falls_back_to_default_caller_id() {
        let store = Arc::new(MemoryStore::new());
        let (mut campaign, queued, execution) = setup(Arc::clone(&store)).await;

        let rotation = Arc::new(RotationEngine::new(RotationConfig::default()));
        let pool = crate::rotation::PhoneNumberPool::new(
            "empty",
            crate::rotation::RotationStrategy::RoundRobin,
        );
        campaign.phone_source = PhoneSource::Pool(pool.id.clone());
        rotation.register_pool(pool);

        let d = CallDispatcher::new(
            Arc::clone(&store) as Arc<dyn CampaignStore>,
            rotation,
            Arc::new(OkInitiator),
            RetryPolicy::new(3, vec![Duration::from_secs(60)]),
            EngineEventBus::new(64),
            Some("+15550000000".to_string()),
        );
        let mut events = d.events.subscribe();

        d.dial(&campaign, queued.clone(), &execution).await.unwrap();

        match events.recv().await.unwrap() {
            CampaignEvent::CallPlaced { from_number, .. } => {
                assert_eq!(from_number.as_deref(), Some("+15550000000"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
