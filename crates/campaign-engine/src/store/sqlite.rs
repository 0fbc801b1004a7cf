//! Durable campaign store on sqlx/SQLite.
//!
//! Counter updates are single conditional UPDATE statements, so they stay
//! atomic under concurrent completions without read-modify-write. The
//! terminal latch is the same `rows_affected` gate pattern used for any
//! compare-and-set against SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::campaign::{
    CallId, Campaign, CampaignContact, CampaignCounters, CampaignId, CampaignStatus, ContactId,
    ContactStatus, CounterField, PhoneSource, ThrottleConfig,
};
use crate::campaign::Schedule;
use crate::error::{CampaignEngineError, Result};
use crate::outcome::CallOutcome;

use super::{CallRecord, CampaignStore, ContactUpdate};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS campaigns (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        agent_id TEXT NOT NULL,
        name TEXT NOT NULL,
        status TEXT NOT NULL,
        schedule TEXT NOT NULL,
        throttle TEXT NOT NULL,
        phone_source TEXT NOT NULL,
        total_contacts INTEGER NOT NULL DEFAULT 0,
        completed_calls INTEGER NOT NULL DEFAULT 0,
        connected_calls INTEGER NOT NULL DEFAULT 0,
        voicemail_calls INTEGER NOT NULL DEFAULT 0,
        failed_calls INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS campaign_contacts (
        campaign_id TEXT NOT NULL,
        contact_id TEXT NOT NULL,
        phone_number TEXT NOT NULL,
        status TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_attempt_at TEXT,
        completed_at TEXT,
        result TEXT,
        last_error TEXT,
        PRIMARY KEY (campaign_id, contact_id)
    )",
    "CREATE TABLE IF NOT EXISTS calls (
        call_id TEXT PRIMARY KEY,
        campaign_id TEXT NOT NULL,
        contact_id TEXT NOT NULL,
        status TEXT NOT NULL,
        outcome TEXT,
        terminal INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_contacts_status
        ON campaign_contacts (campaign_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns (status)",
];

/// SQLite-backed implementation of [`CampaignStore`]
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a SQLite database and ensure the schema exists
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await.map_err(db_err)?;
        Self::with_pool(pool, url).await
    }

    /// Connect to a fresh in-memory database.
    ///
    /// The pool is pinned to one connection: every connection to
    /// `sqlite::memory:` gets its own database, so a wider pool would
    /// scatter the tables.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;
        Self::with_pool(pool, "sqlite::memory:").await
    }

    async fn with_pool(pool: SqlitePool, url: &str) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(db_err)?;
        }
        debug!("SQLite campaign store ready at {}", url);
        Ok(Self { pool })
    }

    /// Access the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> CampaignEngineError {
    CampaignEngineError::Database(e.into())
}

fn json_err(e: serde_json::Error) -> CampaignEngineError {
    CampaignEngineError::Database(e.into())
}

fn campaign_status_from_str(raw: &str) -> Result<CampaignStatus> {
    match raw {
        "draft" => Ok(CampaignStatus::Draft),
        "scheduled" => Ok(CampaignStatus::Scheduled),
        "running" => Ok(CampaignStatus::Running),
        "paused" => Ok(CampaignStatus::Paused),
        "completed" => Ok(CampaignStatus::Completed),
        "cancelled" => Ok(CampaignStatus::Cancelled),
        other => Err(CampaignEngineError::internal(format!(
            "unknown campaign status in store: {other}"
        ))),
    }
}

fn contact_status_from_str(raw: &str) -> Result<ContactStatus> {
    match raw {
        "pending" => Ok(ContactStatus::Pending),
        "in_progress" => Ok(ContactStatus::InProgress),
        "completed" => Ok(ContactStatus::Completed),
        "voicemail" => Ok(ContactStatus::Voicemail),
        "failed" => Ok(ContactStatus::Failed),
        other => Err(CampaignEngineError::internal(format!(
            "unknown contact status in store: {other}"
        ))),
    }
}

fn outcome_from_str(raw: &str) -> Result<CallOutcome> {
    match raw {
        "connected" => Ok(CallOutcome::Connected),
        "voicemail" => Ok(CallOutcome::Voicemail),
        "busy" => Ok(CallOutcome::Busy),
        "no_answer" => Ok(CallOutcome::NoAnswer),
        "failed" => Ok(CallOutcome::Failed),
        other => Err(CampaignEngineError::internal(format!(
            "unknown call outcome in store: {other}"
        ))),
    }
}

fn row_to_campaign(row: &SqliteRow) -> Result<Campaign> {
    let schedule: Schedule =
        serde_json::from_str(&row.try_get::<String, _>("schedule").map_err(db_err)?)
            .map_err(json_err)?;
    let throttle: ThrottleConfig =
        serde_json::from_str(&row.try_get::<String, _>("throttle").map_err(db_err)?)
            .map_err(json_err)?;
    let phone_source: PhoneSource =
        serde_json::from_str(&row.try_get::<String, _>("phone_source").map_err(db_err)?)
            .map_err(json_err)?;
    let status = campaign_status_from_str(&row.try_get::<String, _>("status").map_err(db_err)?)?;

    Ok(Campaign {
        id: CampaignId(row.try_get("id").map_err(db_err)?),
        organization_id: row.try_get("organization_id").map_err(db_err)?,
        agent_id: row.try_get("agent_id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        status,
        schedule,
        throttle,
        phone_source,
        counters: CampaignCounters {
            total_contacts: row.try_get("total_contacts").map_err(db_err)?,
            completed_calls: row.try_get("completed_calls").map_err(db_err)?,
            connected_calls: row.try_get("connected_calls").map_err(db_err)?,
            voicemail_calls: row.try_get("voicemail_calls").map_err(db_err)?,
            failed_calls: row.try_get("failed_calls").map_err(db_err)?,
        },
        created_at: row.try_get("created_at").map_err(db_err)?,
        started_at: row.try_get("started_at").map_err(db_err)?,
        completed_at: row.try_get("completed_at").map_err(db_err)?,
    })
}

fn row_to_contact(row: &SqliteRow) -> Result<CampaignContact> {
    let status = contact_status_from_str(&row.try_get::<String, _>("status").map_err(db_err)?)?;
    Ok(CampaignContact {
        campaign_id: CampaignId(row.try_get("campaign_id").map_err(db_err)?),
        contact_id: ContactId(row.try_get("contact_id").map_err(db_err)?),
        phone_number: row.try_get("phone_number").map_err(db_err)?,
        status,
        attempts: row.try_get::<i64, _>("attempts").map_err(db_err)? as u32,
        last_attempt_at: row.try_get("last_attempt_at").map_err(db_err)?,
        completed_at: row.try_get("completed_at").map_err(db_err)?,
        result: row.try_get("result").map_err(db_err)?,
        last_error: row.try_get("last_error").map_err(db_err)?,
    })
}

fn row_to_call(row: &SqliteRow) -> Result<CallRecord> {
    let outcome = row
        .try_get::<Option<String>, _>("outcome")
        .map_err(db_err)?
        .map(|raw| outcome_from_str(&raw))
        .transpose()?;
    Ok(CallRecord {
        call_id: CallId(row.try_get("call_id").map_err(db_err)?),
        campaign_id: CampaignId(row.try_get("campaign_id").map_err(db_err)?),
        contact_id: ContactId(row.try_get("contact_id").map_err(db_err)?),
        status: row.try_get("status").map_err(db_err)?,
        outcome,
        terminal: row.try_get::<i64, _>("terminal").map_err(db_err)? != 0,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

#[async_trait]
impl CampaignStore for SqliteStore {
    async fn insert_campaign(&self, campaign: Campaign) -> Result<()> {
        let schedule = serde_json::to_string(&campaign.schedule).map_err(json_err)?;
        let throttle = serde_json::to_string(&campaign.throttle).map_err(json_err)?;
        let phone_source = serde_json::to_string(&campaign.phone_source).map_err(json_err)?;

        sqlx::query(
            "INSERT INTO campaigns (
                id, organization_id, agent_id, name, status, schedule, throttle,
                phone_source, total_contacts, completed_calls, connected_calls,
                voicemail_calls, failed_calls, created_at, started_at, completed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .bind(campaign.id.as_str())
        .bind(&campaign.organization_id)
        .bind(&campaign.agent_id)
        .bind(&campaign.name)
        .bind(campaign.status.as_str())
        .bind(schedule)
        .bind(throttle)
        .bind(phone_source)
        .bind(campaign.counters.total_contacts)
        .bind(campaign.counters.completed_calls)
        .bind(campaign.counters.connected_calls)
        .bind(campaign.counters.voicemail_calls)
        .bind(campaign.counters.failed_calls)
        .bind(campaign.created_at)
        .bind(campaign.started_at)
        .bind(campaign.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>> {
        let row = sqlx::query("SELECT * FROM campaigns WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_campaign).transpose()
    }

    async fn find_runnable_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let rows = sqlx::query("SELECT * FROM campaigns WHERE status IN ('scheduled', 'running')")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut runnable = Vec::new();
        for row in &rows {
            let campaign = row_to_campaign(row)?;
            match campaign.status {
                CampaignStatus::Running => runnable.push(campaign),
                CampaignStatus::Scheduled if campaign.schedule.is_due(now) => {
                    runnable.push(campaign)
                }
                _ => {}
            }
        }
        Ok(runnable)
    }

    async fn update_campaign_status(
        &self,
        id: &CampaignId,
        status: CampaignStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE campaigns SET
                status = ?1,
                started_at = COALESCE(?2, started_at),
                completed_at = COALESCE(?3, completed_at)
             WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(started_at)
        .bind(completed_at)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CampaignEngineError::not_found(format!("campaign {id}")));
        }
        Ok(())
    }

    async fn complete_campaign(
        &self,
        id: &CampaignId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Conditional update: a concurrent pause or cancel keeps its status
        let result = sqlx::query(
            "UPDATE campaigns SET status = 'completed', completed_at = ?1
             WHERE id = ?2 AND status = 'running'",
        )
        .bind(completed_at)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn atomic_increment(
        &self,
        id: &CampaignId,
        counter: CounterField,
        delta: i64,
    ) -> Result<()> {
        let column = counter.column();
        let sql = format!("UPDATE campaigns SET {column} = {column} + ?1 WHERE id = ?2");
        let result = sqlx::query(&sql)
            .bind(delta)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CampaignEngineError::not_found(format!("campaign {id}")));
        }
        Ok(())
    }

    async fn increment_outcome(
        &self,
        id: &CampaignId,
        outcome_counter: CounterField,
    ) -> Result<()> {
        let column = outcome_counter.column();
        let sql = format!(
            "UPDATE campaigns SET completed_calls = completed_calls + 1, \
             {column} = {column} + 1 WHERE id = ?1"
        );
        let result = sqlx::query(&sql)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CampaignEngineError::not_found(format!("campaign {id}")));
        }
        Ok(())
    }

    async fn add_contact(&self, contact: CampaignContact) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO campaign_contacts (
                campaign_id, contact_id, phone_number, status, attempts,
                last_attempt_at, completed_at, result, last_error
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(contact.campaign_id.as_str())
        .bind(contact.contact_id.as_str())
        .bind(&contact.phone_number)
        .bind(contact.status.as_str())
        .bind(contact.attempts as i64)
        .bind(contact.last_attempt_at)
        .bind(contact.completed_at)
        .bind(&contact.result)
        .bind(&contact.last_error)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let result =
            sqlx::query("UPDATE campaigns SET total_contacts = total_contacts + 1 WHERE id = ?1")
                .bind(contact.campaign_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Err(CampaignEngineError::not_found(format!(
                "campaign {}",
                contact.campaign_id
            )));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn find_pending_contacts(&self, id: &CampaignId) -> Result<Vec<CampaignContact>> {
        let rows = sqlx::query(
            "SELECT * FROM campaign_contacts
             WHERE campaign_id = ?1 AND status = 'pending'
             ORDER BY rowid ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_contact).collect()
    }

    async fn get_contact(
        &self,
        campaign_id: &CampaignId,
        contact_id: &ContactId,
    ) -> Result<Option<CampaignContact>> {
        let row =
            sqlx::query("SELECT * FROM campaign_contacts WHERE campaign_id = ?1 AND contact_id = ?2")
                .bind(campaign_id.as_str())
                .bind(contact_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.as_ref().map(row_to_contact).transpose()
    }

    async fn update_contact_status(
        &self,
        campaign_id: &CampaignId,
        contact_id: &ContactId,
        update: ContactUpdate,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE campaign_contacts SET
                status = COALESCE(?1, status),
                attempts = COALESCE(?2, attempts),
                last_attempt_at = COALESCE(?3, last_attempt_at),
                completed_at = COALESCE(?4, completed_at),
                result = COALESCE(?5, result),
                last_error = COALESCE(?6, last_error)
             WHERE campaign_id = ?7 AND contact_id = ?8",
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.attempts.map(|a| a as i64))
        .bind(update.last_attempt_at)
        .bind(update.completed_at)
        .bind(update.result)
        .bind(update.last_error)
        .bind(campaign_id.as_str())
        .bind(contact_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CampaignEngineError::not_found(format!(
                "contact {contact_id} in campaign {campaign_id}"
            )));
        }
        Ok(())
    }

    async fn upsert_call(&self, record: CallRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO calls (
                call_id, campaign_id, contact_id, status, outcome, terminal,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(call_id) DO UPDATE SET
                status = excluded.status,
                outcome = excluded.outcome,
                updated_at = excluded.updated_at",
        )
        .bind(record.call_id.as_str())
        .bind(record.campaign_id.as_str())
        .bind(record.contact_id.as_str())
        .bind(&record.status)
        .bind(record.outcome.map(|o| o.as_str()))
        .bind(record.terminal as i64)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_call(&self, call_id: &CallId) -> Result<Option<CallRecord>> {
        let row = sqlx::query("SELECT * FROM calls WHERE call_id = ?1")
            .bind(call_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_call).transpose()
    }

    async fn update_call_status(&self, call_id: &CallId, status: &str) -> Result<()> {
        let result = sqlx::query("UPDATE calls SET status = ?1, updated_at = ?2 WHERE call_id = ?3")
            .bind(status)
            .bind(Utc::now())
            .bind(call_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CampaignEngineError::not_found(format!("call {call_id}")));
        }
        Ok(())
    }

    async fn mark_call_terminal(&self, call_id: &CallId, outcome: CallOutcome) -> Result<bool> {
        // Conditional update: only the first terminal delivery wins the latch
        let result = sqlx::query(
            "UPDATE calls SET terminal = 1, outcome = ?1, status = 'ended', updated_at = ?2
             WHERE call_id = ?3 AND terminal = 0",
        )
        .bind(outcome.as_str())
        .bind(Utc::now())
        .bind(call_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign() -> Campaign {
        let mut c = Campaign::new("sqlite test", "org-1", "agent-1");
        c.status = CampaignStatus::Scheduled;
        c
    }

    #[tokio::test]
    async fn campaign_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let c = campaign();
        let id = c.id.clone();
        store.insert_campaign(c.clone()).await.unwrap();

        let loaded = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(loaded.id, c.id);
        assert_eq!(loaded.status, CampaignStatus::Scheduled);
        assert_eq!(loaded.schedule, c.schedule);
        assert_eq!(loaded.throttle, c.throttle);
    }

    #[tokio::test]
    async fn increment_outcome_moves_both_counters() {
        let store = SqliteStore::in_memory().await.unwrap();
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
            .increment_outcome(&id, CounterField::VoicemailCalls)
            .await
            .unwrap();

        let loaded = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(loaded.counters.completed_calls, 1);
        assert_eq!(loaded.counters.voicemail_calls, 1);
        assert!(loaded.counters.is_consistent());
    }

    #[tokio::test]
    async fn atomic_increment_moves_one_counter() {
        let store = SqliteStore::in_memory().await.unwrap();
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

        let loaded = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(loaded.counters.total_contacts, 3);
        assert_eq!(loaded.counters.completed_calls, 0);

        assert!(store
            .atomic_increment(&CampaignId::new(), CounterField::FailedCalls, 1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn complete_only_transitions_running_campaigns() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut c = campaign();
        c.status = CampaignStatus::Running;
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();

        assert!(store.complete_campaign(&id, Utc::now()).await.unwrap());
        assert!(!store.complete_campaign(&id, Utc::now()).await.unwrap());

        let loaded = store.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CampaignStatus::Completed);
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn complete_does_not_overwrite_cancelled() {
        let store = SqliteStore::in_memory().await.unwrap();
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
    async fn terminal_latch_is_single_shot() {
        let store = SqliteStore::in_memory().await.unwrap();
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
            .mark_call_terminal(&call_id, CallOutcome::Failed)
            .await
            .unwrap());

        let record = store.find_call(&call_id).await.unwrap().unwrap();
        assert_eq!(record.outcome, Some(CallOutcome::Connected));
    }

    #[tokio::test]
    async fn contact_update_applies_partial_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let c = campaign();
        let id = c.id.clone();
        store.insert_campaign(c).await.unwrap();

        let contact_id = ContactId::new();
        store
            .add_contact(CampaignContact::new(
                id.clone(),
                contact_id.clone(),
                "+15550000001".to_string(),
            ))
            .await
            .unwrap();

        store
            .update_contact_status(
                &id,
                &contact_id,
                ContactUpdate {
                    status: Some(ContactStatus::InProgress),
                    attempts: Some(1),
                    last_attempt_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let contact = store.get_contact(&id, &contact_id).await.unwrap().unwrap();
        assert_eq!(contact.status, ContactStatus::InProgress);
        assert_eq!(contact.attempts, 1);
        assert!(contact.last_attempt_at.is_some());
        assert!(contact.last_error.is_none());
    }
}
