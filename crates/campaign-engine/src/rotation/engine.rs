//! Pool state and number selection.
//!
//! Selection and its side effects (usage counters, cooldown entry) happen
//! under one lock acquisition, so two concurrent dials can never observe a
//! number below its cap and both push it past.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::campaign::{PhoneNumberId, PoolId};
use crate::config::RotationConfig;
use crate::error::{CampaignEngineError, Result};

use super::types::{PhoneNumberPool, PoolPhoneNumber, RotationStrategy, SelectedNumber};

struct PoolState {
    pool: PhoneNumberPool,
    numbers: Vec<PoolPhoneNumber>,
}

/// Tracks number pools and hands out caller ids per pool strategy
pub struct RotationEngine {
    config: RotationConfig,
    pools: RwLock<HashMap<PoolId, PoolState>>,
}

impl RotationEngine {
    /// Create a rotation engine with no pools registered
    pub fn new(config: RotationConfig) -> Self {
        Self {
            config,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a pool. Replaces any existing pool with the same id.
    pub fn register_pool(&self, pool: PhoneNumberPool) {
        let mut pools = self.pools.write();
        debug!("📞 Registered number pool {} ({})", pool.id, pool.strategy);
        pools.insert(
            pool.id.clone(),
            PoolState {
                pool,
                numbers: Vec::new(),
            },
        );
    }

    /// Add a number to a registered pool
    pub fn add_number(&self, mut number: PoolPhoneNumber) -> Result<()> {
        let mut pools = self.pools.write();
        let state = pools.get_mut(&number.pool_id).ok_or_else(|| {
            CampaignEngineError::rotation(format!("unknown pool {}", number.pool_id))
        })?;
        if number.weight == 0 {
            number.weight = self.config.default_weight.max(1);
        }
        state.numbers.push(number);
        Ok(())
    }

    /// Pick the next caller id from a pool and record its use.
    ///
    /// Numbers that are inactive, unhealthy, above the spam threshold, or in
    /// cooldown are skipped. Selecting a number bumps its usage counters and
    /// puts it into cooldown once it reaches the pool's per-number cap.
    ///
    /// Returns `Ok(None)` when no number is currently eligible; the caller
    /// falls back to another caller id source.
    pub fn select_number(
        &self,
        pool_id: &PoolId,
        now: DateTime<Utc>,
    ) -> Result<Option<SelectedNumber>> {
        let mut pools = self.pools.write();
        let state = pools
            .get_mut(pool_id)
            .ok_or_else(|| CampaignEngineError::rotation(format!("unknown pool {pool_id}")))?;

        if !state.pool.is_active {
            return Ok(None);
        }

        let threshold = self.config.spam_score_threshold;
        let eligible: Vec<usize> = state
            .numbers
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_eligible(threshold, now))
            .map(|(i, _)| i)
            .collect();

        if eligible.is_empty() {
            return Ok(None);
        }

        let index = match state.pool.strategy {
            RotationStrategy::RoundRobin => pick_oldest(&state.numbers, &eligible),
            RotationStrategy::Random => {
                eligible[rand::thread_rng().gen_range(0..eligible.len())]
            }
            RotationStrategy::LeastUsed => pick_least_used(&state.numbers, &eligible),
            RotationStrategy::Weighted => pick_weighted(&state.numbers, &eligible),
        };

        let cooldown_minutes = if state.pool.cooldown_minutes > 0 {
            state.pool.cooldown_minutes
        } else {
            self.config.default_cooldown_minutes
        };
        let max_calls = state.pool.max_calls_per_number;
        state.pool.total_calls += 1;

        let number = &mut state.numbers[index];
        number.calls_made += 1;
        number.last_used_at = Some(now);

        if number.calls_made >= max_calls {
            number.cooldown_until = Some(now + Duration::minutes(cooldown_minutes));
            info!(
                "🧊 Number {} hit its cap, cooling down for {}m",
                number.phone_number, cooldown_minutes
            );
        }

        Ok(Some(SelectedNumber {
            phone_number_id: number.phone_number_id.clone(),
            phone_number: number.phone_number.clone(),
        }))
    }

    /// Record a reputation score for a number. Numbers at or above the
    /// configured threshold are marked unhealthy and leave rotation.
    pub fn report_spam_score(
        &self,
        pool_id: &PoolId,
        phone_number_id: &PhoneNumberId,
        score: u8,
    ) -> Result<()> {
        let mut pools = self.pools.write();
        let number = find_number(&mut pools, pool_id, phone_number_id)?;
        number.spam_score = score;
        let healthy = score < self.config.spam_score_threshold;
        if number.is_healthy && !healthy {
            warn!(
                "⚠️ Number {} flagged unhealthy (spam score {})",
                number.phone_number, score
            );
        }
        number.is_healthy = healthy;
        Ok(())
    }

    /// Pull a number out of rotation regardless of its spam score
    pub fn mark_unhealthy(&self, pool_id: &PoolId, phone_number_id: &PhoneNumberId) -> Result<()> {
        let mut pools = self.pools.write();
        let number = find_number(&mut pools, pool_id, phone_number_id)?;
        number.is_healthy = false;
        Ok(())
    }

    /// Reset every cooldown in a pool
    pub fn clear_cooldowns(&self, pool_id: &PoolId) -> Result<usize> {
        let mut pools = self.pools.write();
        let state = pools
            .get_mut(pool_id)
            .ok_or_else(|| CampaignEngineError::rotation(format!("unknown pool {pool_id}")))?;

        let mut cleared = 0;
        for number in &mut state.numbers {
            if number.cooldown_until.take().is_some() {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Snapshot the numbers in a pool
    pub fn pool_numbers(&self, pool_id: &PoolId) -> Result<Vec<PoolPhoneNumber>> {
        let pools = self.pools.read();
        let state = pools
            .get(pool_id)
            .ok_or_else(|| CampaignEngineError::rotation(format!("unknown pool {pool_id}")))?;
        Ok(state.numbers.clone())
    }
}

fn find_number<'a>(
    pools: &'a mut HashMap<PoolId, PoolState>,
    pool_id: &PoolId,
    phone_number_id: &PhoneNumberId,
) -> Result<&'a mut PoolPhoneNumber> {
    let state = pools
        .get_mut(pool_id)
        .ok_or_else(|| CampaignEngineError::rotation(format!("unknown pool {pool_id}")))?;
    state
        .numbers
        .iter_mut()
        .find(|n| &n.phone_number_id == phone_number_id)
        .ok_or_else(|| {
            CampaignEngineError::rotation(format!(
                "number {phone_number_id} not in pool {pool_id}"
            ))
        })
}

/// Least-recently-used eligible number; never used beats any timestamp,
/// ties go to the earliest number in the pool
fn pick_oldest(numbers: &[PoolPhoneNumber], eligible: &[usize]) -> usize {
    let mut best = eligible[0];
    for &i in &eligible[1..] {
        if numbers[i].last_used_at < numbers[best].last_used_at {
            best = i;
        }
    }
    best
}

fn pick_least_used(numbers: &[PoolPhoneNumber], eligible: &[usize]) -> usize {
    let mut best = eligible[0];
    for &i in &eligible[1..] {
        if numbers[i].calls_made < numbers[best].calls_made {
            best = i;
        }
    }
    best
}

fn pick_weighted(numbers: &[PoolPhoneNumber], eligible: &[usize]) -> usize {
    let total: u64 = eligible.iter().map(|&i| numbers[i].weight as u64).sum();
    if total == 0 {
        return eligible[0];
    }
    let mut roll = rand::thread_rng().gen_range(0..total);
    for &i in eligible {
        let weight = numbers[i].weight as u64;
        if roll < weight {
            return i;
        }
        roll -= weight;
    }
    eligible[0]
}
