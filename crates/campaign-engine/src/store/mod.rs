//! # Campaign Store
//!
//! Persistence seam for campaigns, contacts, and call correlation records.
//! The engine only talks to [`CampaignStore`]; hosts pick an implementation:
//!
//! - [`MemoryStore`]: in-process tables, used in tests and embedded setups
//! - [`SqliteStore`]: durable storage on sqlx/SQLite
//!
//! Counter updates go through atomic increments rather than read-modify-write
//! because multiple calls for the same campaign settle concurrently. Terminal
//! outcomes additionally pass through [`CampaignStore::mark_call_terminal`],
//! a latch that admits each call's terminal transition exactly once so
//! duplicate webhook deliveries cannot double-count.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::{
    CallId, Campaign, CampaignContact, CampaignId, CampaignStatus, ContactId, ContactStatus,
    CounterField,
};
use crate::error::Result;
use crate::outcome::CallOutcome;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Correlation record for a placed call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    /// Last provider status seen for this call
    pub status: String,
    pub outcome: Option<CallOutcome>,
    /// Set once the terminal outcome has been ingested
    pub terminal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// Create a fresh record for a just-placed call
    pub fn placed(call_id: CallId, campaign_id: CampaignId, contact_id: ContactId) -> Self {
        let now = Utc::now();
        Self {
            call_id,
            campaign_id,
            contact_id,
            status: "initiated".to_string(),
            outcome: None,
            terminal: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied to a campaign contact
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub status: Option<ContactStatus>,
    pub attempts: Option<u32>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub last_error: Option<String>,
}

/// Persistence operations the engine needs from its backing store
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Insert a new campaign
    async fn insert_campaign(&self, campaign: Campaign) -> Result<()>;

    /// Fetch one campaign
    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>>;

    /// Campaigns that should be driven right now: everything `running`,
    /// plus `scheduled` campaigns whose schedule is due at `now`
    async fn find_runnable_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// Update campaign status; timestamps are only written when provided
    async fn update_campaign_status(
        &self,
        id: &CampaignId,
        status: CampaignStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Transition a campaign from `running` to `completed`. Returns `true`
    /// if this call won the transition, `false` if the campaign was in any
    /// other status (paused, cancelled, already completed); a driver racing
    /// a lifecycle operation must not overwrite the other status.
    async fn complete_campaign(
        &self,
        id: &CampaignId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically add `delta` to one campaign counter
    async fn atomic_increment(
        &self,
        id: &CampaignId,
        counter: CounterField,
        delta: i64,
    ) -> Result<()>;

    /// Atomically record one terminal call against a campaign: increments
    /// `completed_calls` and the given outcome counter together, so the
    /// counter invariant holds at every observable instant
    async fn increment_outcome(&self, id: &CampaignId, outcome_counter: CounterField)
        -> Result<()>;

    /// Add a contact to a campaign, bumping `total_contacts` atomically
    async fn add_contact(&self, contact: CampaignContact) -> Result<()>;

    /// All `pending` contacts for a campaign, in insertion order
    async fn find_pending_contacts(&self, id: &CampaignId) -> Result<Vec<CampaignContact>>;

    /// Fetch one contact record
    async fn get_contact(
        &self,
        campaign_id: &CampaignId,
        contact_id: &ContactId,
    ) -> Result<Option<CampaignContact>>;

    /// Apply a partial update to a contact
    async fn update_contact_status(
        &self,
        campaign_id: &CampaignId,
        contact_id: &ContactId,
        update: ContactUpdate,
    ) -> Result<()>;

    /// Insert or replace a call correlation record
    async fn upsert_call(&self, record: CallRecord) -> Result<()>;

    /// Fetch a call correlation record
    async fn find_call(&self, call_id: &CallId) -> Result<Option<CallRecord>>;

    /// Record the provider status of a non-terminal call
    async fn update_call_status(&self, call_id: &CallId, status: &str) -> Result<()>;

    /// Latch a call terminal with its outcome. Returns `true` if this call
    /// transitioned non-terminal to terminal, `false` if it already was
    /// terminal (duplicate delivery) or is unknown.
    async fn mark_call_terminal(&self, call_id: &CallId, outcome: CallOutcome) -> Result<bool>;
}
