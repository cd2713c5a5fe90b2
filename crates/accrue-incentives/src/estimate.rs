use std::collections::BTreeSet;

use accrue_core::coins::Coins;
use accrue_core::epoch::EpochInfo;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::{DistributeTo, Gauge};
use accrue_core::lock::Lock;
use accrue_core::types::{AccountId, Balance, GaugeId, Timestamp};
use tracing::debug;

use crate::keeper::Keeper;

/// One hypothetical epoch of `gauge` for `locks`, against `total_locked`
/// qualifying units. Returns the advanced gauge and the locks' rewards.
///
/// Works on an owned copy; the caller's gauge and the store are untouched.
pub fn estimate_epoch(
    gauge: &Gauge,
    locks: &[Lock],
    total_locked: Balance,
) -> Result<(Gauge, Coins), IncentivesError> {
    let DistributeTo::ByDuration { denom, duration } = &gauge.distribute_to else {
        return Err(IncentivesError::UnsupportedLockQueryType(
            gauge.distribute_to.query_type().into(),
        ));
    };
    let per_epoch = gauge.coins_per_epoch()?;
    let mut next = gauge.clone();
    next.record_distribution(&per_epoch)?;
    if total_locked == 0 {
        return Ok((next, Coins::new()));
    }

    let mut rewards = Coins::new();
    for lock in locks.iter().filter(|l| l.duration >= *duration) {
        let amount = lock.amount_of(denom);
        if amount == 0 {
            continue;
        }
        rewards.add_assign(&per_epoch.mul_div_floor(amount, total_locked)?)?;
    }
    Ok((next, rewards))
}

impl Keeper {
    /// Estimated rewards for `locks` (or every lock of `owner` when `locks`
    /// is empty) from the current epoch through `end_epoch`.
    ///
    /// A replay on owned copies of the gauges: nothing is ever written, and a
    /// gauge that fails to replay simply stops contributing.
    pub fn rewards_est(
        &self,
        owner: &AccountId,
        locks: &[Lock],
        end_epoch: i64,
        now: Timestamp,
    ) -> Result<Coins, IncentivesError> {
        let locks = if locks.is_empty() {
            self.locks.account_locks(owner)?
        } else {
            locks.to_vec()
        };

        let denoms: BTreeSet<&str> = locks.iter().flat_map(|l| l.coins.denoms()).collect();
        let mut ids: BTreeSet<GaugeId> = BTreeSet::new();
        for denom in denoms {
            ids.extend(self.store.ids_by_denom(denom)?);
        }

        let epoch = self.epoch_info()?;
        let mut estimated = Coins::new();
        for id in ids {
            let Some(gauge) = self.store.get_gauge(id)? else {
                continue;
            };
            if !gauge.distribute_to.is_lock_based() {
                continue;
            }
            match self.replay_gauge(gauge, &locks, &epoch, end_epoch, now) {
                Ok(rewards) => estimated.add_assign(&rewards)?,
                Err(e) => debug!(gauge_id = id, error = %e, "gauge left out of estimate"),
            }
        }
        Ok(estimated)
    }

    fn replay_gauge(
        &self,
        mut gauge: Gauge,
        locks: &[Lock],
        epoch: &EpochInfo,
        end_epoch: i64,
        now: Timestamp,
    ) -> Result<Coins, IncentivesError> {
        let total_locked = self.locks.total_locked_amount(&gauge.distribute_to)?;
        let mut rewards = Coins::new();
        let begin = epoch.first_paying_epoch(gauge.start_time, now);
        for _ in begin..=end_epoch {
            // Perpetual gauges pay out everything in one epoch.
            if gauge.is_last_distribution_done() || gauge.remaining_coins()?.is_empty() {
                break;
            }
            let (next, paid) = estimate_epoch(&gauge, locks, total_locked)?;
            rewards.add_assign(&paid)?;
            gauge = next;
        }
        Ok(rewards)
    }
}
