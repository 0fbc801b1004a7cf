//! # Outbound Campaign Execution Engine
//!
//! This crate drives automated outbound-calling campaigns: given a list of
//! contacts and a configured calling agent, it dials contacts at a controlled
//! rate, rotates among a pool of phone numbers to avoid carrier spam flags,
//! retries failed attempts with backoff, and folds call outcomes back into
//! campaign-level progress counters.
//!
//! ## Features
//!
//! - **Execution Scheduling**: Immediate, one-shot, and recurring campaigns
//!   with optional local-time calling windows
//! - **Throttled Dialing**: Per-campaign calls-per-minute pacing and a hard
//!   concurrency cap, FIFO contact queue
//! - **Number Rotation**: Round-robin, random, least-used, and weighted
//!   caller id selection with per-number cooldowns and spam-score health
//! - **Retry Policy**: Bounded attempts with an escalating backoff schedule
//! - **Outcome Ingestion**: Idempotent terminal-outcome processing keeping
//!   the campaign counters consistent at every instant
//!
//! ## Architecture
//!
//! - [`scheduler`]: Tick loop, per-campaign driver tasks, lifecycle ops
//! - [`dialer`]: Execution context, throttle gates, call placement
//! - [`rotation`]: Number pools and selection strategies
//! - [`retry`]: Placement retry policy
//! - [`outcome`]: Classification and ingestion of provider call events
//! - [`store`]: Persistence seam with in-memory and SQLite backends
//! - [`events`]: Broadcast event bus for observers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use outdial_campaign_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # struct MyProvider;
//! # #[async_trait::async_trait]
//! # impl CallInitiator for MyProvider {
//! #     async fn place_call(
//! #         &self,
//! #         _request: &PlacementRequest,
//! #     ) -> std::result::Result<CallId, PlacementError> {
//! #         Ok(CallId::new())
//! #     }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = Arc::new(SqliteStore::in_memory().await?);
//!     let engine = CampaignEngine::new(
//!         EngineConfig::default(),
//!         store,
//!         Arc::new(MyProvider),
//!     )?;
//!
//!     let mut campaign = Campaign::new("spring outreach", "org-1", "agent-1");
//!     campaign.throttle.calls_per_minute = 10;
//!     engine.create_campaign(campaign).await?;
//!
//!     engine.start();
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod error;

// Data model
pub mod campaign;

// Engine functionality modules
pub mod dialer;
pub mod outcome;
pub mod retry;
pub mod rotation;
pub mod scheduler;

// External interfaces
pub mod events;
pub mod store;

use std::sync::Arc;

use tokio::task::JoinHandle;

// Re-exports for convenience
pub use campaign::{Campaign, CampaignContact, CampaignId};
pub use config::EngineConfig;
pub use error::{CampaignEngineError, Result};

use campaign::ContactId;
use dialer::{CallDispatcher, CallInitiator};
use events::{CampaignEvent, EngineEventBus};
use outcome::{CallStatusEvent, OutcomeIngestion};
use retry::RetryPolicy;
use rotation::RotationEngine;
use scheduler::{ExecutionRegistry, ExecutionScheduler};
use store::CampaignStore;

/// Main campaign engine
///
/// Wires the scheduler, dispatcher, rotation engine, and outcome ingestion
/// together over one store and one call provider, and exposes the campaign
/// lifecycle operations.
pub struct CampaignEngine {
    store: Arc<dyn CampaignStore>,
    rotation: Arc<RotationEngine>,
    registry: Arc<ExecutionRegistry>,
    scheduler: Arc<ExecutionScheduler>,
    ingestion: OutcomeIngestion,
    events: EngineEventBus,
}

impl CampaignEngine {
    /// Create a new campaign engine over a store and a call provider
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CampaignStore>,
        initiator: Arc<dyn CallInitiator>,
    ) -> Result<Self> {
        config.validate().map_err(CampaignEngineError::config)?;
        tracing::info!("🎯 Initializing CampaignEngine");

        let events = EngineEventBus::new(config.scheduler.event_capacity);
        let rotation = Arc::new(RotationEngine::new(config.rotation.clone()));
        let registry = Arc::new(ExecutionRegistry::new());

        let dispatcher = Arc::new(CallDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&rotation),
            initiator,
            RetryPolicy::from(&config.retry),
            events.clone(),
            config.dialer.default_from_number.clone(),
        ));

        let scheduler = Arc::new(ExecutionScheduler::new(
            config,
            Arc::clone(&store),
            dispatcher,
            Arc::clone(&registry),
            events.clone(),
        ));

        let ingestion = OutcomeIngestion::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            events.clone(),
        );

        Ok(Self {
            store,
            rotation,
            registry,
            scheduler,
            ingestion,
            events,
        })
    }

    /// Start the scheduler tick loop
    pub fn start(&self) -> JoinHandle<()> {
        Arc::clone(&self.scheduler).spawn()
    }

    /// Persist a new campaign
    pub async fn create_campaign(&self, campaign: Campaign) -> Result<CampaignId> {
        if campaign.name.trim().is_empty() {
            return Err(CampaignEngineError::invalid_input(
                "campaign name cannot be empty",
            ));
        }
        let id = campaign.id.clone();
        self.store.insert_campaign(campaign).await?;
        Ok(id)
    }

    /// Add a contact to a campaign
    pub async fn add_contact(
        &self,
        campaign_id: &CampaignId,
        contact_id: ContactId,
        phone_number: String,
    ) -> Result<()> {
        if phone_number.trim().is_empty() {
            return Err(CampaignEngineError::invalid_input(
                "contact phone number cannot be empty",
            ));
        }
        self.store
            .add_contact(CampaignContact::new(
                campaign_id.clone(),
                contact_id,
                phone_number,
            ))
            .await
    }

    /// Move a draft campaign to `scheduled`
    pub async fn request_start(&self, campaign_id: &CampaignId) -> Result<()> {
        self.scheduler.request_start(campaign_id).await
    }

    /// Pause a running campaign
    pub async fn pause_campaign(&self, campaign_id: &CampaignId) -> Result<()> {
        self.scheduler.pause_campaign(campaign_id).await
    }

    /// Resume a paused campaign
    pub async fn resume_campaign(&self, campaign_id: &CampaignId) -> Result<()> {
        self.scheduler.resume_campaign(campaign_id).await
    }

    /// Cancel a campaign
    pub async fn cancel_campaign(&self, campaign_id: &CampaignId) -> Result<()> {
        self.scheduler.cancel_campaign(campaign_id).await
    }

    /// Process one provider call-status event
    pub async fn ingest(&self, event: CallStatusEvent) -> Result<()> {
        self.ingestion.ingest(event).await
    }

    /// Fetch a campaign's current state
    pub async fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Option<Campaign>> {
        self.store.get_campaign(campaign_id).await
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CampaignEvent> {
        self.events.subscribe()
    }

    /// The caller id rotation engine, for pool management
    pub fn rotation(&self) -> &Arc<RotationEngine> {
        &self.rotation
    }

    /// The execution scheduler, for hosts running their own tick loop
    pub fn scheduler(&self) -> &Arc<ExecutionScheduler> {
        &self.scheduler
    }

    /// Live execution contexts
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Campaign, CampaignEngine, CampaignEngineError, EngineConfig, Result};

    pub use crate::campaign::{
        CallId, CampaignContact, CampaignId, CampaignStatus, ContactId, ContactStatus,
        PhoneNumberId, PhoneSource, PoolId, RecurrencePattern, Schedule, ThrottleConfig,
        TimeWindow,
    };

    pub use crate::config::{DialerConfig, RetryConfig, RotationConfig, SchedulerConfig};

    pub use crate::dialer::{CallInitiator, PlacementError, PlacementRequest};

    pub use crate::events::{CampaignEvent, EngineEventBus};

    pub use crate::outcome::{classify_outcome, CallOutcome, CallStatusEvent};

    pub use crate::rotation::{
        PhoneNumberPool, PoolPhoneNumber, RotationEngine, RotationStrategy, SelectedNumber,
    };

    pub use crate::store::{CallRecord, CampaignStore, MemoryStore, SqliteStore};

    // Common external types
    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
