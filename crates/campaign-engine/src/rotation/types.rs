use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::{PhoneNumberId, PoolId};

/// How the next caller id is picked from a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Cycle through eligible numbers in order
    RoundRobin,
    /// Pick uniformly among eligible numbers
    Random,
    /// Pick the eligible number with the fewest calls made
    LeastUsed,
    /// Pick proportionally to each number's weight
    Weighted,
}

impl RotationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStrategy::RoundRobin => "round_robin",
            RotationStrategy::Random => "random",
            RotationStrategy::LeastUsed => "least_used",
            RotationStrategy::Weighted => "weighted",
        }
    }
}

impl fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pool of outbound caller id numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumberPool {
    pub id: PoolId,
    pub name: String,
    pub strategy: RotationStrategy,

    /// Calls a number may make before entering cooldown
    pub max_calls_per_number: u32,

    /// Cooldown length once a number hits its cap
    pub cooldown_minutes: i64,

    pub is_active: bool,

    /// Total calls placed through this pool
    pub total_calls: u64,
}

impl PhoneNumberPool {
    pub fn new<S: Into<String>>(name: S, strategy: RotationStrategy) -> Self {
        Self {
            id: PoolId::new(),
            name: name.into(),
            strategy,
            max_calls_per_number: 100,
            cooldown_minutes: 30,
            is_active: true,
            total_calls: 0,
        }
    }
}

/// One caller id number inside a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolPhoneNumber {
    pub pool_id: PoolId,
    pub phone_number_id: PhoneNumberId,
    /// E.164 caller id
    pub phone_number: String,

    pub calls_made: u32,
    pub last_used_at: Option<DateTime<Utc>>,

    /// Reputation score 0-100; higher means more likely flagged as spam
    pub spam_score: u8,
    pub is_healthy: bool,

    /// Excluded from selection until this instant passes
    pub cooldown_until: Option<DateTime<Utc>>,

    /// Selection weight for weighted pools
    pub weight: u32,
    pub is_active: bool,
}

impl PoolPhoneNumber {
    pub fn new<S: Into<String>>(pool_id: PoolId, phone_number: S) -> Self {
        Self {
            pool_id,
            phone_number_id: PhoneNumberId::new(),
            phone_number: phone_number.into(),
            calls_made: 0,
            last_used_at: None,
            spam_score: 0,
            is_healthy: true,
            cooldown_until: None,
            weight: 1,
            is_active: true,
        }
    }

    /// Whether this number may be handed out right now
    pub fn is_eligible(&self, spam_threshold: u8, now: DateTime<Utc>) -> bool {
        if !self.is_active || !self.is_healthy {
            return false;
        }
        if self.spam_score >= spam_threshold {
            return false;
        }
        match self.cooldown_until {
            Some(until) => until <= now,
            None => true,
        }
    }
}

/// A number handed out by the rotation engine for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedNumber {
    pub phone_number_id: PhoneNumberId,
    pub phone_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let now = Utc::now();
        let mut number = PoolPhoneNumber::new(PoolId::new(), "+15550001111");
        assert!(number.is_eligible(70, now));

        number.cooldown_until = Some(now + Duration::minutes(5));
        assert!(!number.is_eligible(70, now));
        assert!(number.is_eligible(70, now + Duration::minutes(6)));
    }

    #[test]
    fn spam_threshold_is_inclusive() {
        let now = Utc::now();
        let mut number = PoolPhoneNumber::new(PoolId::new(), "+15550001111");
        number.spam_score = 70;
        assert!(!number.is_eligible(70, now));
        number.spam_score = 69;
        assert!(number.is_eligible(70, now));
    }
}
