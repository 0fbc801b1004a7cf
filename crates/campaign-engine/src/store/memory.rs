//! In-memory campaign store.
//!
//! All tables live behind a single RwLock, so every mutation - including
//! paired counter increments - is atomic with respect to concurrent readers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::campaign::{
    CallId, Campaign, CampaignContact, CampaignId, CampaignStatus, ContactId, ContactStatus,
    CounterField,
};
use crate::error::{CampaignEngineError, Result};
use crate::outcome::CallOutcome;

use super::{CallRecord, CampaignStore, ContactUpdate};

#[derive(Default)]
struct MemoryTables {
    campaigns: HashMap<CampaignId, Campaign>,
    contacts: HashMap<CampaignId, Vec<CampaignContact>>,
    calls: HashMap<CallId, CallRecord>,
}

/// In-memory implementation of [`CampaignStore`]
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_increment(campaign: &mut Campaign, counter: CounterField, delta: i64) {
    let counters = &mut campaign.counters;
    let slot = match counter {
        CounterField::TotalContacts => &mut counters.total_contacts,
        CounterField::CompletedCalls => &mut counters.completed_calls,
        CounterField::ConnectedCalls => &mut counters.connected_calls,
        CounterField::VoicemailCalls => &mut counters.voicemail_calls,
        CounterField::FailedCalls => &mut counters.failed_calls,
    };
    *slot += delta;
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn insert_campaign(&self, campaign: Campaign) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.campaigns.contains_key(&campaign.id) {
            return Err(CampaignEngineError::AlreadyExists(format!(
                "campaign {}",
                campaign.id
            )));
        }
        tables.contacts.entry(campaign.id.clone()).or_default();
        tables.campaigns.insert(campaign.id.clone(), campaign);
        Ok(())
    }

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>> {
        let tables = self.tables.read().await;
        Ok(tables.campaigns.get(id).cloned())
    }

    async fn find_runnable_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let tables = self.tables.read().await;
        Ok(tables
            .campaigns
            .values()
            .filter(|c| match c.status {
                CampaignStatus::Running => true,
                CampaignStatus::Scheduled => c.schedule.is_due(now),
                _ => false,
            })
            .cloned()
            .collect())
    }

    async fn update_campaign_status(
        &self,
        id: &CampaignId,
        status: CampaignStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let campaign = tables
            .campaigns
            .get_mut(id)
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {id}")))?;
        campaign.status = status;
        if started_at.is_some() {
            campaign.started_at = started_at;
        }
        if completed_at.is_some() {
            campaign.completed_at = completed_at;
        }
        debug!("Campaign {} status updated to {}", id, status);
        Ok(())
    }

    async fn complete_campaign(
        &self,
        id: &CampaignId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let campaign = tables
            .campaigns
            .get_mut(id)
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {id}")))?;
        if campaign.status != CampaignStatus::Running {
            return Ok(false);
        }
        campaign.status = CampaignStatus::Completed;
        campaign.completed_at = Some(completed_at);
        Ok(true)
    }

    async fn atomic_increment(
        &self,
        id: &CampaignId,
        counter: CounterField,
        delta: i64,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let campaign = tables
            .campaigns
            .get_mut(id)
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {id}")))?;
        apply_increment(campaign, counter, delta);
        Ok(())
    }

    async fn increment_outcome(
        &self,
        id: &CampaignId,
        outcome_counter: CounterField,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let campaign = tables
            .campaigns
            .get_mut(id)
            .ok_or_else(|| CampaignEngineError::not_found(format!("campaign {id}")))?;
        apply_increment(campaign, CounterField::CompletedCalls, 1);
        apply_increment(campaign, outcome_counter, 1);
        Ok(())
    }

    async fn add_contact(&self, contact: CampaignContact) -> Result<()> {
        let mut tables = self.tables.write().await;
        let campaign_id = contact.campaign_id.clone();
        if !tables.campaigns.contains_key(&campaign_id) {
            return Err(CampaignEngineError::not_found(format!(
                "campaign {campaign_id}"
            )));
        }

        let contacts = tables.contacts.entry(campaign_id.clone()).or_default();
        if contacts.iter().any(|c| c.contact_id == contact.contact_id) {
            return Err(CampaignEngineError::AlreadyExists(format!(
                "contact {} in campaign {}",
                contact.contact_id, campaign_id
            )));
        }
        contacts.push(contact);

        if let Some(campaign) = tables.campaigns.get_mut(&campaign_id) {
            apply_increment(campaign, CounterField::TotalContacts, 1);
        }
        Ok(())
    }

    async fn find_pending_contacts(&self, id: &CampaignId) -> Result<Vec<CampaignContact>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .get(id)
            .map(|contacts| {
                contacts
                    .iter()
                    .filter(|c| c.status == ContactStatus::Pending)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_contact(
        &self,
        campaign_id: &CampaignId,
        contact_id: &ContactId,
    ) -> Result<Option<CampaignContact>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .get(campaign_id)
            .and_then(|contacts| contacts.iter().find(|c| &c.contact_id == contact_id))
            .cloned())
    }

    async fn update_contact_status(
        &self,
        campaign_id: &CampaignId,
        contact_id: &ContactId,
        update: ContactUpdate,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let contact = tables
            .contacts
            .get_mut(campaign_id)
            .and_then(|contacts| contacts.iter_mut().find(|c| &c.contact_id == contact_id))
            .ok_or_else(|| {
                CampaignEngineError::not_found(format!(
                    "contact {contact_id} in campaign {campaign_id}"
                ))
            })?;

        if let Some(status) = update.status {
            contact.status = status;
        }
        if let Some(attempts) = update.attempts {
            contact.attempts = attempts;
        }
        if update.last_attempt_at.is_some() {
            contact.last_attempt_at = update.last_attempt_at;
        }
        if update.completed_at.is_some() {
            contact.completed_at = update.completed_at;
        }
        if update.result.is_some() {
            contact.result = update.result;
        }
        if update.last_error.is_some() {
            contact.last_error = update.last_error;
        }
        Ok(())
    }

    async fn upsert_call(&self, record: CallRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.calls.insert(record.call_id.clone(), record);
        Ok(())
    }

    async fn find_call(&self, call_id: &CallId) -> Result<Option<CallRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.calls.get(call_id).cloned())
    }

    async fn update_call_status(&self, call_id: &CallId, status: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let record = tables
            .calls
            .get_mut(call_id)
            .ok_or_else(|| CampaignEngineError::not_found(format!("call {call_id}")))?;
        record.status = status.to_string();
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_call_terminal(&self, call_id: &CallId, outcome: CallOutcome) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.calls.get_mut(call_id) else {
            return Ok(false);
        };
        if record.terminal {
            return Ok(false);
        }
        record.terminal = true;
        record.outcome = Some(outcome);
        record.status = "ended".to_string();
        record.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign() -> Campaign {
        let mut c = Campaign::new("test", "org-1", "agent-1");
        c.status = CampaignStatus::Scheduled;
        c
    }

    #[tokio::test]
    async fn add_contact_bumps_total() {
        let store = MemoryStore::new();
        let c = campaign();
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();

        store
            .add_contact(CampaignContact::new(
                id.clone(),
                ContactId::new(),
                "+15550000001".to_string(),
            ))
            .await
            .unwrap();

        let c = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(c.counters.total_contacts, 1);
    }

    #[tokio::test]
    async fn pending_contacts_keep_insertion_order() {
        let store = MemoryStore::new();
        let c = campaign();
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();

        for n in 0..3 {
            store
                .add_contact(CampaignContact::new(
                    id.clone(),
                    ContactId(format!("contact-{n}")),
                    format!("+1555000000{n}"),
                ))
                .await
                .unwrap();
        }

        let pending = store.find_pending_contacts(&id).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|c| c.contact_id.as_str()).collect();
        assert_eq!(ids, vec!["contact-0", "contact-1", "contact-2"]);
    }

    #[tokio::test]
    async fn outcome_increment_is_paired() {
        let store = MemoryStore::new();
        let c = campaign();
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();
        store
            .add_contact(CampaignContact::new(
                id.clone(),
                ContactId::new(),
                "+15550000001".to_string(),
            ))
            .await
            .unwrap();

        store
            .increment_outcome(&id, CounterField::ConnectedCalls)
            .await
            .unwrap();

        let c = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(c.counters.completed_calls, 1);
        assert_eq!(c.counters.connected_calls, 1);
        assert!(c.counters.is_consistent());
    }

    #[tokio::test]
    async fn atomic_increment_moves_one_counter() {
        let store = MemoryStore::new();
        let c = campaign();
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();

        store
            .atomic_increment(&id, CounterField::TotalContacts, 5)
            .await
            .unwrap();
        store
            .atomic_increment(&id, CounterField::TotalContacts, -2)
            .await
            .unwrap();

        let c = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(c.counters.total_contacts, 3);
        assert_eq!(c.counters.completed_calls, 0);

        assert!(store
            .atomic_increment(&CampaignId::new(), CounterField::FailedCalls, 1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn complete_only_transitions_running_campaigns() {
        let store = MemoryStore::new();
        let mut c = campaign();
        c.status = CampaignStatus::Running;
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();

        assert!(store.complete_campaign(&id, Utc::now()).await.unwrap());
        // Second completion finds the campaign already settled
        assert!(!store.complete_campaign(&id, Utc::now()).await.unwrap());

        let c = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(c.status, CampaignStatus::Completed);
        assert!(c.completed_at.is_some());
    }

    #[tokio::test]
    async fn complete_does_not_overwrite_cancelled() {
        let store = MemoryStore::new();
        let mut c = campaign();
        c.status = CampaignStatus::Cancelled;
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();

        assert!(!store.complete_campaign(&id, Utc::now()).await.unwrap());
        assert_eq!(
            store.get_campaign(&id).await.unwrap().unwrap().status,
            CampaignStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn terminal_latch_admits_one_delivery() {
        let store = MemoryStore::new();
        let call_id = CallId::new();
        store
            .upsert_call(CallRecord::placed(
                call_id.clone(),
                CampaignId::new(),
                ContactId::new(),
            ))
            .await
            .unwrap();

        assert!(store
            .mark_call_terminal(&call_id, CallOutcome::Connected)
            .await
            .unwrap());
        assert!(!store
            .mark_call_terminal(&call_id, CallOutcome::Connected)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_call_does_not_latch() {
        let store = MemoryStore::new();
        assert!(!store
            .mark_call_terminal(&CallId::new(), CallOutcome::Failed)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn runnable_includes_running_and_due_scheduled() {
        let store = MemoryStore::new();

        let mut running = campaign();
        running.status = CampaignStatus::Running;
        let running_id = running.id.clone();

        let mut future = campaign();
        future.schedule = crate::campaign::Schedule::At {
            start_at: Utc::now() + chrono::Duration::hours(1),
        };

        let due = campaign();
        let due_id = due.id.clone();

        store.insert_campaign(running).await.unwrap();
        store.insert_campaign(future).await.unwrap();
        store.insert_campaign(due).await.unwrap();

        let runnable = store.find_runnable_campaigns(Utc::now()).await.unwrap();
        let ids: Vec<_> = runnable.iter().map(|c| c.id.clone()).collect();
        assert_eq!(runnable.len(), 2);
        assert!(ids.contains(&running_id));
        assert!(ids.contains(&due_id));
    }
}
