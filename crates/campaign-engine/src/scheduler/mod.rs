//! # Execution Scheduler
//!
//! The scheduler owns campaign execution end to end. On a fixed tick it asks
//! the store which campaigns should be dialing (everything `running`, plus
//! `scheduled` campaigns whose schedule is due) and makes sure each has a
//! live execution context with a driver task.
//!
//! Each campaign is advanced by exactly one driver task, guarded by the
//! context's advance lock, so overlapping ticks can never double-dial. The
//! tick only starts and nudges drivers; it never places calls itself.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::campaign::{CallId, Campaign, CampaignId, CampaignStatus};
use crate::config::EngineConfig;
use crate::dialer::{CallDispatcher, CampaignExecution, QueuedContact};
use crate::error::{CampaignEngineError, Result};
use crate::events::{CampaignEvent, EngineEventBus};
use crate::store::CampaignStore;

/// Live execution contexts, one per actively-driven campaign
#[derive(Default)]
pub struct ExecutionRegistry {
    contexts: DashMap<CampaignId, Arc<CampaignExecution>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, campaign_id: &CampaignId) -> Option<Arc<CampaignExecution>> {
        self.contexts.get(campaign_id).map(|e| Arc::clone(&e))
    }

    pub fn contains(&self, campaign_id: &CampaignId) -> bool {
        self.contexts.contains_key(campaign_id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn insert(&self, campaign_id: CampaignId, execution: Arc<CampaignExecution>) {
        self.contexts.insert(campaign_id, execution);
    }

    fn remove(&self, campaign_id: &CampaignId) {
        self.contexts.remove(campaign_id);
    }

    /// A call for this campaign reached a terminal outcome: free its
    /// concurrency slot and wake the driver for the next dial. The slot is
    /// only released if the live context placed this call; an outcome for a
    /// call placed before a pause/resume cycle must not touch the slots of
    /// the context that replaced it.
    pub fn on_call_settled(&self, campaign_id: &CampaignId, call_id: &CallId) {
        if let Some(execution) = self.get(campaign_id) {
            if !execution.settle_call(call_id) {
                debug!(
                    "Call {} settled for campaign {} but was not placed by its live context",
                    call_id, campaign_id
                );
            }
            execution.nudge();
        }
    }
}

/// What one advance pass of a driver decided
enum Advance {
    /// A call went out; check the throttle again right away
    Dialed,
    /// Nothing to do until a nudge or the pacing interval passes
    Wait,
    /// The campaign drained and was marked completed
    Finished,
}

/// Drives campaign execution on a fixed tick
pub struct ExecutionScheduler {
    config: EngineConfig,
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<CallDispatcher>,
    registry: Arc<ExecutionRegistry>,
    events: EngineEventBus,
}

impl ExecutionScheduler {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CampaignStore>,
        dispatcher: Arc<CallDispatcher>,
        registry: Arc<ExecutionRegistry>,
        events: EngineEventBus,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            registry,
            events,
        }
    }

    /// Run the tick loop until the task is aborted
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.scheduler.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                "⏰ Execution scheduler running (tick every {:?})",
                self.config.scheduler.tick_interval
            );
            loop {
                interval.tick().await;
                if let Err(e) = self.tick().await {
                    error!("Scheduler tick failed: {}", e);
                }
            }
        })
    }

    /// One scheduling pass
    pub async fn tick(&self) -> Result<()> {
        let runnable = self.store.find_runnable_campaigns(Utc::now()).await?;
        debug!("Scheduler tick: {} runnable campaign(s)", runnable.len());

        for campaign in runnable {
            if let Some(execution) = self.registry.get(&campaign.id) {
                execution.nudge();
                continue;
            }
            let id = campaign.id.clone();
            if let Err(e) = self.start_campaign(campaign).await {
                error!("Failed to start campaign {}: {}", id, e);
            }
        }
        Ok(())
    }

    /// Bring a due campaign into execution: load its pending contacts,
    /// persist `running`, and spawn the driver task
    async fn start_campaign(&self, campaign: Campaign) -> Result<()> {
        let execution = Arc::new(CampaignExecution::new(campaign.id.clone()));
        let pending = self.store.find_pending_contacts(&campaign.id).await?;
        for contact in &pending {
            execution.enqueue(QueuedContact {
                contact_id: contact.contact_id.clone(),
                phone_number: contact.phone_number.clone(),
            });
        }

        let now = Utc::now();
        let first_start = campaign.started_at.is_none();
        self.store
            .update_campaign_status(
                &campaign.id,
                CampaignStatus::Running,
                first_start.then_some(now),
                None,
            )
            .await?;

        if first_start {
            info!(
                "🚀 Campaign {} started with {} contact(s)",
                campaign.id,
                pending.len()
            );
            self.events.publish(CampaignEvent::CampaignStarted {
                campaign_id: campaign.id.clone(),
                at: now,
            });
        } else {
            info!(
                "▶️ Campaign {} resumed with {} pending contact(s)",
                campaign.id,
                pending.len()
            );
            self.events.publish(CampaignEvent::CampaignResumed {
                campaign_id: campaign.id.clone(),
            });
        }

        self.registry
            .insert(campaign.id.clone(), Arc::clone(&execution));

        let driver = CampaignDriver {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
        };
        tokio::spawn(async move {
            driver.run(execution).await;
        });
        Ok(())
    }

    /// Pause a running campaign. In-flight calls are left to finish.
    pub async fn pause_campaign(&self, campaign_id: &CampaignId) -> Result<()> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {campaign_id}")))?;

        if campaign.status != CampaignStatus::Running {
            return Err(CampaignEngineError::campaign(format!(
                "cannot pause campaign {campaign_id} in status {}",
                campaign.status
            )));
        }

        if let Some(execution) = self.registry.get(campaign_id) {
            execution.stop();
            execution.nudge();
        }
        self.store
            .update_campaign_status(campaign_id, CampaignStatus::Paused, None, None)
            .await?;
        info!("⏸️ Campaign {} paused", campaign_id);
        self.events.publish(CampaignEvent::CampaignPaused {
            campaign_id: campaign_id.clone(),
        });
        Ok(())
    }

    /// Resume a paused campaign. It re-enters `scheduled` and the next tick
    /// picks it back up with its remaining pending contacts.
    pub async fn resume_campaign(&self, campaign_id: &CampaignId) -> Result<()> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {campaign_id}")))?;

        if campaign.status != CampaignStatus::Paused {
            return Err(CampaignEngineError::campaign(format!(
                "cannot resume campaign {campaign_id} in status {}",
                campaign.status
            )));
        }

        self.store
            .update_campaign_status(campaign_id, CampaignStatus::Scheduled, None, None)
            .await?;
        info!("▶️ Campaign {} queued for resume", campaign_id);
        Ok(())
    }

    /// Move a draft campaign to `scheduled` so the tick loop can pick it up
    pub async fn request_start(&self, campaign_id: &CampaignId) -> Result<()> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {campaign_id}")))?;

        match campaign.status {
            CampaignStatus::Draft => {
                self.store
                    .update_campaign_status(campaign_id, CampaignStatus::Scheduled, None, None)
                    .await?;
                info!("📅 Campaign {} scheduled", campaign_id);
                Ok(())
            }
            other => Err(CampaignEngineError::campaign(format!(
                "cannot start campaign {campaign_id} from status {other}"
            ))),
        }
    }

    /// Cancel a campaign in any non-terminal state. Pending contacts are
    /// abandoned; in-flight calls are left to finish.
    pub async fn cancel_campaign(&self, campaign_id: &CampaignId) -> Result<()> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {campaign_id}")))?;

        match campaign.status {
            CampaignStatus::Completed | CampaignStatus::Cancelled => {
                Err(CampaignEngineError::campaign(format!(
                    "campaign {campaign_id} already {}",
                    campaign.status
                )))
            }
            _ => {
                if let Some(execution) = self.registry.get(campaign_id) {
                    execution.stop();
                    execution.nudge();
                }
                self.store
                    .update_campaign_status(
                        campaign_id,
                        CampaignStatus::Cancelled,
                        None,
                        Some(Utc::now()),
                    )
                    .await?;
                info!("🛑 Campaign {} cancelled", campaign_id);
                Ok(())
            }
        }
    }
}

/// The per-campaign driver task: owns the advance loop for one campaign
struct CampaignDriver {
    config: EngineConfig,
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<CallDispatcher>,
    registry: Arc<ExecutionRegistry>,
    events: EngineEventBus,
}

impl CampaignDriver {
    /// Loop until the campaign completes, pauses, or otherwise leaves
    /// `running`
    async fn run(&self, execution: Arc<CampaignExecution>) {
        let floor = self.config.dialer.min_dial_spacing;

        while execution.is_running() {
            let campaign = match self.store.get_campaign(&execution.campaign_id).await {
                Ok(Some(c)) => c,
                Ok(None) => {
                    warn!(
                        "Campaign {} disappeared from the store, stopping driver",
                        execution.campaign_id
                    );
                    break;
                }
                Err(e) => {
                    error!(
                        "Driver for campaign {} could not load state: {}",
                        execution.campaign_id, e
                    );
                    tokio::time::sleep(floor).await;
                    continue;
                }
            };

            if campaign.status != CampaignStatus::Running {
                debug!(
                    "Campaign {} is {}, stopping driver",
                    campaign.id, campaign.status
                );
                execution.stop();
                break;
            }

            match self.advance(&campaign, &execution).await {
                Ok(Advance::Dialed) => continue,
                Ok(Advance::Finished) => break,
                Ok(Advance::Wait) => {
                    let pacing = campaign.throttle.pacing_interval(floor);
                    tokio::select! {
                        _ = execution.nudged() => {}
                        _ = tokio::time::sleep(pacing) => {}
                    }
                }
                Err(e) => {
                    error!("Campaign {} advance failed: {}", campaign.id, e);
                    tokio::time::sleep(floor).await;
                }
            }
        }

        self.registry.remove(&execution.campaign_id);
        debug!("Driver for campaign {} exited", execution.campaign_id);
    }

    /// One advance pass: complete a drained campaign, or dial the next
    /// queued contact if the throttle allows
    async fn advance(
        &self,
        campaign: &Campaign,
        execution: &Arc<CampaignExecution>,
    ) -> Result<Advance> {
        let _guard = execution.advance_guard.lock().await;

        // A pause or cancel may have landed while we waited for the guard
        if !execution.is_running() {
            return Ok(Advance::Finished);
        }

        if execution.is_drained() {
            let now = Utc::now();
            let completed = self.store.complete_campaign(&campaign.id, now).await?;
            execution.stop();
            if completed {
                info!("🏁 Campaign {} completed", campaign.id);
                self.events.publish(CampaignEvent::CampaignCompleted {
                    campaign_id: campaign.id.clone(),
                    at: now,
                });
            } else {
                debug!(
                    "Campaign {} left running before completion, keeping its status",
                    campaign.id
                );
            }
            return Ok(Advance::Finished);
        }

        if !execution.throttle_allows(&campaign.throttle, self.config.dialer.min_dial_spacing) {
            return Ok(Advance::Wait);
        }

        let Some(next) = execution.dequeue() else {
            // In-flight calls or backoff timers remain; wait for them
            return Ok(Advance::Wait);
        };

        execution.acquire_slot();
        execution.record_dial();
        if let Err(e) = self.dispatcher.dial(campaign, next, execution).await {
            // Store-level failure mid-dial; the slot must not leak
            execution.release_slot();
            return Err(e);
        }
        Ok(Advance::Dialed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::campaign::{CampaignContact, ContactId};
    use crate::dialer::{CallInitiator, PlacementError, PlacementRequest};
    use crate::retry::RetryPolicy;
    use crate::rotation::RotationEngine;
    use crate::store::MemoryStore;

    struct NoopInitiator;

    #[async_trait]
    impl CallInitiator for NoopInitiator {
        async fn place_call(
            &self,
            _request: &PlacementRequest,
        ) -> std::result::Result<CallId, PlacementError> {
            Ok(CallId::new())
        }
    }

    fn scheduler(store: Arc<MemoryStore>) -> Arc<ExecutionScheduler> {
        let config = EngineConfig::default();
        let events = EngineEventBus::new(64);
        let rotation = Arc::new(RotationEngine::new(config.rotation.clone()));
        let dispatcher = Arc::new(CallDispatcher::new(
            Arc::clone(&store) as Arc<dyn CampaignStore>,
            rotation,
            Arc::new(NoopInitiator),
            RetryPolicy::from(&config.retry),
            events.clone(),
            None,
        ));
        Arc::new(ExecutionScheduler::new(
            config,
            store,
            dispatcher,
            Arc::new(ExecutionRegistry::new()),
            events,
        ))
    }

    async fn scheduled_campaign(store: &MemoryStore) -> CampaignId {
        let mut campaign = Campaign::new("tick test", "org-1", "agent-1");
        campaign.status = CampaignStatus::Scheduled;
        let id = campaign.id.clone();
        store.insert_campaign(campaign).await.unwrap();
        id
    }

    #[tokio::test(start_paused = true)]
    async fn tick_starts_due_campaign() {
        let store = Arc::new(MemoryStore::new());
        let id = scheduled_campaign(&store).await;
        store
            .add_contact(CampaignContact::new(
                id.clone(),
                ContactId::new(),
                "+15550000001".to_string(),
            ))
            .await
            .unwrap();

        let s = scheduler(Arc::clone(&store));
        s.tick().await.unwrap();

        assert!(s.registry.contains(&id));
        let campaign = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Running);
        assert!(campaign.started_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_campaign_completes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let id = scheduled_campaign(&store).await;

        let s = scheduler(Arc::clone(&store));
        s.tick().await.unwrap();

        // Let the driver task run its first advance
        tokio::time::sleep(Duration::from_millis(10)).await;

        let campaign = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Completed);
        assert!(campaign.completed_at.is_some());
        assert!(!s.registry.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_driver_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let id = scheduled_campaign(&store).await;
        store
            .add_contact(CampaignContact::new(
                id.clone(),
                ContactId::new(),
                "+15550000001".to_string(),
            ))
            .await
            .unwrap();

        let s = scheduler(Arc::clone(&store));
        s.tick().await.unwrap();
        s.pause_campaign(&id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        let campaign = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Paused);
        assert!(!s.registry.contains(&id));
    }

    #[tokio::test]
    async fn request_start_only_from_draft() {
        let store = Arc::new(MemoryStore::new());
        let campaign = Campaign::new("draft", "org-1", "agent-1");
        let id = campaign.id.clone();
        store.insert_campaign(campaign).await.unwrap();

        let s = scheduler(Arc::clone(&store));
        s.request_start(&id).await.unwrap();
        assert_eq!(
            store.get_campaign(&id).await.unwrap().unwrap().status,
            CampaignStatus::Scheduled
        );

        // A second request is rejected
        assert!(s.request_start(&id).await.is_err());
    }

    #[tokio::test]
    async fn resume_requires_paused() {
        let store = Arc::new(MemoryStore::new());
        let id = scheduled_campaign(&store).await;
        let s = scheduler(Arc::clone(&store));
        assert!(s.resume_campaign(&id).await.is_err());
    }

    #[tokio::test]
    async fn settled_call_from_previous_execution_keeps_slots_intact() {
        let registry = ExecutionRegistry::new();
        let campaign_id = CampaignId::new();
        let execution = Arc::new(CampaignExecution::new(campaign_id.clone()));
        registry.insert(campaign_id.clone(), Arc::clone(&execution));

        let current = CallId::new();
        execution.acquire_slot();
        execution.register_call(current.clone());
        assert_eq!(execution.active_calls(), 1);

        // Outcome for a call placed before this context existed
        registry.on_call_settled(&campaign_id, &CallId::new());
        assert_eq!(execution.active_calls(), 1);

        registry.on_call_settled(&campaign_id, &current);
        assert_eq!(execution.active_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drained_advance_never_overwrites_cancellation() {
        let store = Arc::new(MemoryStore::new());
        let mut campaign = Campaign::new("race test", "org-1", "agent-1");
        campaign.status = CampaignStatus::Cancelled;
        campaign.completed_at = Some(Utc::now());
        let id = campaign.id.clone();
        store.insert_campaign(campaign.clone()).await.unwrap();

        let s = scheduler(Arc::clone(&store));
        let driver = CampaignDriver {
            config: s.config.clone(),
            store: Arc::clone(&s.store),
            dispatcher: Arc::clone(&s.dispatcher),
            registry: Arc::clone(&s.registry),
            events: s.events.clone(),
        };

        // A cancel landed on the drained context before this pass
        let execution = Arc::new(CampaignExecution::new(id.clone()));
        execution.stop();
        assert!(matches!(
            driver.advance(&campaign, &execution).await.unwrap(),
            Advance::Finished
        ));
        assert_eq!(
            store.get_campaign(&id).await.unwrap().unwrap().status,
            CampaignStatus::Cancelled
        );

        // Even a still-running drained context defers to the stored status
        let execution = Arc::new(CampaignExecution::new(id.clone()));
        let mut events = s.events.subscribe();
        assert!(matches!(
            driver.advance(&campaign, &execution).await.unwrap(),
            Advance::Finished
        ));
        assert_eq!(
            store.get_campaign(&id).await.unwrap().unwrap().status,
            CampaignStatus::Cancelled
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_rejects_terminal_campaigns() {
        let store = Arc::new(MemoryStore::new());
        let id = scheduled_campaign(&store).await;
        let s = scheduler(Arc::clone(&store));

        s.cancel_campaign(&id).await.unwrap();
        assert_eq!(
            store.get_campaign(&id).await.unwrap().unwrap().status,
            CampaignStatus::Cancelled
        );
        assert!(s.cancel_campaign(&id).await.is_err());
    }
}
