//! # Retry Policy
//!
//! Decides what happens after a failed placement attempt: wait and try
//! again, or give the contact up as failed. The backoff schedule is indexed
//! by how many attempts have already been made; the last entry repeats when
//! the schedule is shorter than the attempt budget.

use std::time::Duration;

use crate::config::RetryConfig;

/// What to do with a contact after a failed placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after this delay
    RetryAfter(Duration),
    /// Budget exhausted, mark the contact failed
    GiveUp,
}

/// Placement retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Total attempts allowed per contact, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide the next step given how many attempts have been made so far.
    ///
    /// `attempts_made` counts the attempt that just failed, so the first
    /// failure calls this with 1.
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made >= self.max_attempts || self.backoff.is_empty() {
            return RetryDecision::GiveUp;
        }
        let index = (attempts_made.saturating_sub(1) as usize).min(self.backoff.len() - 1);
        RetryDecision::RetryAfter(self.backoff[index])
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let backoff = config
            .backoff_minutes
            .iter()
            .map(|&m| Duration::from_secs(m * 60))
            .collect();
        Self::new(config.max_attempts, backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::from(&RetryConfig::default())
    }

    #[test]
    fn escalating_backoff_then_give_up() {
        let p = policy();
        assert_eq!(p.decide(1), RetryDecision::RetryAfter(Duration::from_secs(60)));
        assert_eq!(p.decide(2), RetryDecision::RetryAfter(Duration::from_secs(300)));
        assert_eq!(p.decide(3), RetryDecision::GiveUp);
    }

    #[test]
    fn last_backoff_entry_repeats() {
        let p = RetryPolicy::new(5, vec![Duration::from_secs(60), Duration::from_secs(300)]);
        assert_eq!(p.decide(3), RetryDecision::RetryAfter(Duration::from_secs(300)));
        assert_eq!(p.decide(4), RetryDecision::RetryAfter(Duration::from_secs(300)));
        assert_eq!(p.decide(5), RetryDecision::GiveUp);
    }

    #[test]
    fn single_attempt_budget_never_retries() {
        let p = RetryPolicy::new(1, vec![Duration::from_secs(60)]);
        assert_eq!(p.decide(1), RetryDecision::GiveUp);
    }
}
