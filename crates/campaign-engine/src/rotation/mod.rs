//! # Phone Number Rotation
//!
//! Outbound caller id management. Campaigns that dial from a number pool go
//! through [`RotationEngine::select_number`] for every placement; the engine
//! applies the pool's strategy over the numbers that are active, healthy,
//! under the spam threshold, and out of cooldown.
//!
//! Reputation flows in through [`RotationEngine::report_spam_score`]; a score
//! at or above the configured threshold pulls the number out of rotation
//! until a later report clears it.

pub mod engine;
pub mod types;

pub use engine::RotationEngine;
pub use types::{PhoneNumberPool, PoolPhoneNumber, RotationStrategy, SelectedNumber};
