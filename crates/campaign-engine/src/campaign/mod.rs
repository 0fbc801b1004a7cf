//! # Campaign Data Model
//!
//! Core types for outbound campaigns: the campaign record itself, the
//! per-contact progress records the dialer mutates, and the schedule
//! types driving the due-check in the execution scheduler.
//!
//! The counters on a campaign obey one invariant at all times:
//!
//! ```text
//! connected_calls + voicemail_calls + failed_calls == completed_calls <= total_contacts
//! ```
//!
//! The store enforces this by only ever moving the counters through paired
//! atomic increments (see [`crate::store::CampaignStore`]).

pub mod schedule;
pub mod types;

pub use schedule::{RecurrencePattern, Schedule, TimeWindow};
pub use types::{
    CallId, Campaign, CampaignContact, CampaignCounters, CampaignId, CampaignStatus, ContactId,
    ContactStatus, CounterField, PhoneNumberId, PhoneSource, PoolId, ThrottleConfig,
};
