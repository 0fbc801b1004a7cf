use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Campaign engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduler settings
    pub scheduler: SchedulerConfig,

    /// Dialing settings
    pub dialer: DialerConfig,

    /// Retry policy settings
    pub retry: RetryConfig,

    /// Number rotation settings
    pub rotation: RotationConfig,
}

/// Execution scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between scheduler ticks
    pub tick_interval: Duration,

    /// Capacity of the engine event bus
    pub event_capacity: usize,
}

/// Dialing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialerConfig {
    /// Minimum spacing between dial attempts within one campaign,
    /// applied regardless of the configured calls-per-minute so a
    /// misconfigured campaign cannot hammer the call provider
    pub min_dial_spacing: Duration,

    /// Default calls per minute for campaigns without an explicit throttle
    pub default_calls_per_minute: u32,

    /// Default maximum concurrent calls per campaign
    pub default_max_concurrent_calls: usize,

    /// Platform-wide fallback caller id; may be empty for providers
    /// that resolve caller id server-side
    pub default_from_number: Option<String>,
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts allowed per contact, including the first
    pub max_attempts: u32,

    /// Backoff schedule in minutes, indexed by failures so far;
    /// the last entry repeats if attempts exceed the schedule length
    pub backoff_minutes: Vec<u64>,
}

/// Phone number rotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Spam score at or above which a number is excluded from selection
    pub spam_score_threshold: u8,

    /// Default cooldown applied when a number reaches its call cap (minutes)
    pub default_cooldown_minutes: i64,

    /// Default weight for numbers in weighted pools
    pub default_weight: u32,
}

impl EngineConfig {
    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.tick_interval.is_zero() {
            return Err("tick_interval must be greater than zero".to_string());
        }

        if self.scheduler.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".to_string());
        }

        if self.dialer.default_calls_per_minute == 0 {
            return Err("default_calls_per_minute must be greater than 0".to_string());
        }

        if self.dialer.default_max_concurrent_calls == 0 {
            return Err("default_max_concurrent_calls must be greater than 0".to_string());
        }

        if self.retry.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        if self.retry.max_attempts > 10 {
            return Err("max_attempts cannot exceed 10".to_string());
        }

        if self.retry.backoff_minutes.is_empty() {
            return Err("backoff_minutes cannot be empty".to_string());
        }

        if self.rotation.spam_score_threshold > 100 {
            return Err("spam_score_threshold cannot exceed 100".to_string());
        }

        if self.rotation.default_cooldown_minutes <= 0 {
            return Err("default_cooldown_minutes must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            dialer: DialerConfig::default(),
            retry: RetryConfig::default(),
            rotation: RotationConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            event_capacity: 1000,
        }
    }
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            min_dial_spacing: Duration::from_secs(5),
            default_calls_per_minute: 10,
            default_max_concurrent_calls: 3,
            default_from_number: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_minutes: vec![1, 5, 15],
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            spam_score_threshold: 70,
            default_cooldown_minutes: 30,
            default_weight: 1,
        }
    }
}
