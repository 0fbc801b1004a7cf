use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schedule::Schedule;

/// Unique campaign identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub String);

/// Unique contact identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub String);

/// Unique phone number pool identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId(pub String);

/// Unique phone number identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumberId(pub String);

/// External call correlation identifier, issued by the call provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// Generate a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

impl_id!(CampaignId);
impl_id!(ContactId);
impl_id!(PoolId);
impl_id!(PhoneNumberId);
impl_id!(CallId);

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-contact dialing status within one campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Pending,
    InProgress,
    Completed,
    Voicemail,
    Failed,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::InProgress => "in_progress",
            ContactStatus::Completed => "completed",
            ContactStatus::Voicemail => "voicemail",
            ContactStatus::Failed => "failed",
        }
    }

    /// Whether this status is terminal for the contact
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContactStatus::Completed | ContactStatus::Voicemail | ContactStatus::Failed
        )
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dial rate limits for one campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Target dial rate
    pub calls_per_minute: u32,

    /// Concurrency cap: in-flight calls never exceed this
    pub max_concurrent_calls: usize,
}

impl ThrottleConfig {
    /// Minimum spacing between dials implied by the configured rate
    pub fn dial_interval(&self) -> Duration {
        Duration::from_millis(60_000 / self.calls_per_minute.max(1) as u64)
    }

    /// Spacing between advance passes: the configured rate, floored so a
    /// high calls-per-minute setting cannot overwhelm the call provider
    pub fn pacing_interval(&self, floor: Duration) -> Duration {
        self.dial_interval().max(floor)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: 10,
            max_concurrent_calls: 3,
        }
    }
}

/// Where outbound caller id numbers come from for a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum PhoneSource {
    /// Rotate through a number pool
    Pool(PoolId),
    /// Always dial out from one fixed number
    Fixed(String),
    /// Fall through to the platform default caller id
    Default,
}

/// Campaign progress counters
///
/// Invariant: `connected_calls + voicemail_calls + failed_calls ==
/// completed_calls <= total_contacts`, always.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCounters {
    pub total_contacts: i64,
    pub completed_calls: i64,
    pub connected_calls: i64,
    pub voicemail_calls: i64,
    pub failed_calls: i64,
}

impl CampaignCounters {
    /// Check the counter invariant
    pub fn is_consistent(&self) -> bool {
        self.connected_calls + self.voicemail_calls + self.failed_calls == self.completed_calls
            && self.completed_calls <= self.total_contacts
    }
}

/// Campaign counter fields addressable through atomic increments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    TotalContacts,
    CompletedCalls,
    ConnectedCalls,
    VoicemailCalls,
    FailedCalls,
}

impl CounterField {
    /// Column name used by the durable store
    pub fn column(&self) -> &'static str {
        match self {
            CounterField::TotalContacts => "total_contacts",
            CounterField::CompletedCalls => "completed_calls",
            CounterField::ConnectedCalls => "connected_calls",
            CounterField::VoicemailCalls => "voicemail_calls",
            CounterField::FailedCalls => "failed_calls",
        }
    }
}

/// A persisted batch-calling job targeting a set of contacts via one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub organization_id: String,
    pub agent_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub schedule: Schedule,
    pub throttle: ThrottleConfig,
    pub phone_source: PhoneSource,
    pub counters: CampaignCounters,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Create a new draft campaign with default throttle and immediate schedule
    pub fn new<S: Into<String>>(name: S, organization_id: S, agent_id: S) -> Self {
        Self {
            id: CampaignId::new(),
            organization_id: organization_id.into(),
            agent_id: agent_id.into(),
            name: name.into(),
            status: CampaignStatus::Draft,
            schedule: Schedule::Immediate,
            throttle: ThrottleConfig::default(),
            phone_source: PhoneSource::Default,
            counters: CampaignCounters::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Per-contact progress record within one campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignContact {
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    /// Number to dial for this contact
    pub phone_number: String,
    pub status: ContactStatus,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub last_error: Option<String>,
}

impl CampaignContact {
    /// Create a pending contact record for a campaign
    pub fn new(campaign_id: CampaignId, contact_id: ContactId, phone_number: String) -> Self {
        Self {
            campaign_id,
            contact_id,
            phone_number,
            status: ContactStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            completed_at: None,
            result: None,
            last_error: None,
        }
    }
}
