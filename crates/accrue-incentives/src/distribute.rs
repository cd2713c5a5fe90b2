use std::collections::BTreeMap;
use std::time::Duration;

use accrue_core::coins::{Coin, Coins};
use accrue_core::constants::{is_synthetic_denom, NO_LOCK_INTERNAL_PREFIX};
use accrue_core::epoch::EpochInfo;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::{DistributeTo, Gauge};
use accrue_core::lock::{sum_locks_by_denom, Lock};
use accrue_core::params::Params;
use accrue_core::types::{AccountId, Balance, PoolId, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::keeper::Keeper;

/// Shortest lock duration fetched when filling the per-denom lock cache.
const MIN_LOCK_QUERY_DURATION: Duration = Duration::from_millis(1);

// ── DistributionInfo ──────────────────────────────────────────────────────────

/// Payouts accumulated over one `distribute` call, keyed by receiver so each
/// receiver gets a single transfer.
#[derive(Debug, Default)]
pub struct DistributionInfo {
    payouts: BTreeMap<AccountId, Coins>,
}

impl DistributionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rewards(&mut self, receiver: &AccountId, rewards: &Coins) -> Result<(), IncentivesError> {
        if rewards.is_empty() {
            return Ok(());
        }
        self.payouts
            .entry(receiver.clone())
            .or_default()
            .add_assign(rewards)
    }

    pub fn is_empty(&self) -> bool {
        self.payouts.is_empty()
    }

    /// Number of distinct receivers.
    pub fn len(&self) -> usize {
        self.payouts.len()
    }

    /// Receiver/amount pairs in receiver order.
    pub fn into_payouts(self) -> Vec<(AccountId, Coins)> {
        self.payouts.into_iter().collect()
    }
}

// ── Per-gauge computation ─────────────────────────────────────────────────────

/// Outcome of one epoch of a lock gauge.
#[derive(Debug, PartialEq, Eq)]
pub enum LockPayout {
    /// Qualifying locks hold none of the denom; the gauge is left untouched.
    NoLockedAmount,
    /// No payout this epoch. The epoch is still consumed: `per_epoch` is
    /// booked as distributed and stays in the module account.
    Skipped { per_epoch: Coins },
    /// Shares per lock receiver, in lock order, and their sum.
    Paid { shares: Vec<(AccountId, Coins)>, total: Coins },
}

/// Splits one epoch of `gauge` across `locks` pro rata to each lock's amount
/// of the gauge denom.
///
/// Each share is `remain * lock_amount / (lock_sum * remain_epochs)`, floored
/// per denom, so shares never sum past the per-epoch amount.
pub fn lock_payout(
    gauge: &Gauge,
    locks: &[Lock],
    min_value_for_distribution: Balance,
) -> Result<LockPayout, IncentivesError> {
    let remain_epochs = gauge.remaining_epochs()?;
    let remain = gauge.remaining_coins()?;
    let per_epoch = remain.quo_floor(remain_epochs);

    if locks.is_empty() {
        return Ok(LockPayout::Skipped { per_epoch });
    }
    let denom = gauge.distribute_to.denom();
    let lock_sum = sum_locks_by_denom(locks, denom)?;
    if lock_sum == 0 {
        return Ok(LockPayout::NoLockedAmount);
    }
    if is_spam(&remain, min_value_for_distribution) {
        return Ok(LockPayout::Skipped { per_epoch });
    }

    let mut shares = Vec::new();
    let mut total = Coins::new();
    for lock in locks {
        let amount = lock.amount_of(denom);
        if amount == 0 {
            continue;
        }
        // floor(floor(x / a) / b) == floor(x / (a * b))
        let share = remain.mul_div_floor(amount, lock_sum)?.quo_floor(remain_epochs);
        if share.is_empty() {
            continue;
        }
        total.add_assign(&share)?;
        shares.push((lock.reward_receiver_or_owner().clone(), share));
    }
    Ok(LockPayout::Paid { shares, total })
}

/// Remaining coins too small to be worth a payout.
fn is_spam(remain: &Coins, min_value_for_distribution: Balance) -> bool {
    if remain.is_empty() {
        return true;
    }
    match remain.iter().next() {
        Some((_, amount)) if remain.len() == 1 => amount < min_value_for_distribution,
        _ => false,
    }
}

/// `amount / epoch_secs` as an exact decimal.
pub fn emission_rate(amount: Balance, epoch: &EpochInfo) -> Result<Decimal, IncentivesError> {
    let amount = i128::try_from(amount).map_err(|_| IncentivesError::AmountOverflow)?;
    let amount = Decimal::try_from_i128_with_scale(amount, 0)
        .map_err(|_| IncentivesError::AmountOverflow)?;
    amount
        .checked_div(Decimal::from(epoch.duration_secs()))
        .ok_or(IncentivesError::AmountOverflow)
}

/// Uptime for a "no lock" gauge: the params' internal uptime for pool-owned
/// gauges, the gauge's own duration otherwise, defaulted when unusable.
fn no_lock_uptime(params: &Params, denom: &str, duration: Duration) -> Duration {
    if denom.starts_with(NO_LOCK_INTERNAL_PREFIX) {
        params.effective_uptime(params.internal_uptime)
    } else {
        params.effective_uptime(duration)
    }
}

struct PendingSchedule {
    pool_id: PoolId,
    coin: Coin,
    emission_rate: Decimal,
    uptime: Duration,
}

// ── Distribute ────────────────────────────────────────────────────────────────

impl Keeper {
    /// Pays one epoch of every gauge in `gauges`, in the given order.
    ///
    /// Lock gauges accumulate into a single batched payout; "no lock" gauges
    /// register incentive schedules on their pool. The distribution epoch must
    /// be known to the epoch keeper. Gauges are persisted only after every
    /// schedule and the batched payout succeeded, then gauges on their last
    /// epoch are finished. Returns the total paid.
    pub fn distribute(&self, gauges: &[Gauge], now: Timestamp) -> Result<Coins, IncentivesError> {
        let params = self.params()?;
        let epoch = self.epoch_info()?;
        let mut info = DistributionInfo::new();
        let mut locks_by_denom: BTreeMap<String, Vec<Lock>> = BTreeMap::new();
        let mut schedules = Vec::new();
        let mut staged = Vec::with_capacity(gauges.len());
        let mut total = Coins::new();

        for gauge in gauges {
            let mut updated = gauge.clone();
            match &gauge.distribute_to {
                DistributeTo::ByGroup => {
                    debug!(gauge_id = gauge.id, "group gauge skipped by distribute");
                    continue;
                }
                DistributeTo::ByTime { .. } => {
                    return Err(IncentivesError::UnsupportedLockQueryType("ByTime".into()));
                }
                DistributeTo::ByDuration { denom, duration } => {
                    let locks = self.qualifying_locks(&mut locks_by_denom, denom, *duration)?;
                    match lock_payout(gauge, &locks, params.min_value_for_distribution)? {
                        LockPayout::NoLockedAmount => {
                            debug!(gauge_id = gauge.id, "no locked amount, gauge untouched");
                            continue;
                        }
                        LockPayout::Skipped { per_epoch } => {
                            debug!(gauge_id = gauge.id, locks = locks.len(), "payout skipped");
                            updated.record_distribution(&per_epoch)?;
                        }
                        LockPayout::Paid { shares, total: paid } => {
                            for (receiver, share) in &shares {
                                info.add_rewards(receiver, share)?;
                            }
                            updated.record_distribution(&paid)?;
                            total.add_assign(&paid)?;
                        }
                    }
                }
                DistributeTo::NoLock { denom, duration } => {
                    let per_epoch = gauge.coins_per_epoch()?;
                    let pool_id = self.pools.pool_for_gauge(gauge.id, epoch.duration)?;
                    let uptime = no_lock_uptime(&params, denom, *duration);
                    for (d, amount) in per_epoch.iter() {
                        schedules.push(PendingSchedule {
                            pool_id,
                            coin: Coin::new(d, amount),
                            emission_rate: emission_rate(amount, &epoch)?,
                            uptime,
                        });
                    }
                    updated.record_distribution(&per_epoch)?;
                    total.add_assign(&per_epoch)?;
                }
            }
            staged.push(updated);
        }

        for s in &schedules {
            self.pools.register_incentive_schedule(
                s.pool_id,
                &s.coin,
                s.emission_rate,
                now,
                s.uptime,
            )?;
            debug!(
                pool_id = s.pool_id,
                coin = %s.coin,
                rate = %s.emission_rate,
                uptime_secs = s.uptime.as_secs(),
                "incentive schedule registered"
            );
        }

        let receivers = info.len();
        if !info.is_empty() {
            let payouts = info.into_payouts();
            self.bank.batched_move_from_module(&payouts)?;
            for (receiver, amount) in &payouts {
                self.hooks.on_distribution(receiver, amount);
                debug!(%receiver, %amount, "distribution");
            }
        }

        for gauge in &staged {
            self.store.put_gauge(gauge)?;
        }
        for gauge in staged.iter().filter(|g| g.is_last_distribution_done()) {
            self.finish_distribution(gauge)?;
        }
        self.hooks.after_epoch_distribution();

        info!(
            gauges = staged.len(),
            receivers,
            schedules = schedules.len(),
            total = %total,
            "epoch distribution complete"
        );
        Ok(total)
    }

    /// Locks qualifying for a `ByDuration` gauge. Synthetic denoms go through
    /// the synthetic registry; everything else is served from a per-denom
    /// cache and filtered by duration.
    fn qualifying_locks(
        &self,
        cache: &mut BTreeMap<String, Vec<Lock>>,
        denom: &str,
        duration: Duration,
    ) -> Result<Vec<Lock>, IncentivesError> {
        if is_synthetic_denom(denom) {
            return self.locks.synthetic_locks_matching(denom, duration);
        }
        if !cache.contains_key(denom) {
            let all = self.locks.locks_matching(&DistributeTo::ByDuration {
                denom: denom.to_string(),
                duration: MIN_LOCK_QUERY_DURATION,
            })?;
            cache.insert(denom.to_string(), all);
        }
        Ok(cache
            .get(denom)
            .map(|all| all.iter().filter(|l| l.duration >= duration).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::BankKeeper;
    use crate::memory::HookEvent;
    use crate::testutil::*;
    use accrue_core::constants::DEFAULT_UPTIME;
    use accrue_core::gauge::GaugeState;

    fn distribute_active(f: &Fixture, now: Timestamp) -> Coins {
        let active = f.keeper.store.gauges_in(GaugeState::Active).unwrap();
        f.keeper.distribute(&active, now).unwrap()
    }

    #[test]
    fn equal_locks_split_evenly_and_finish() {
        let f = fixture("equal_locks");
        let id = f.lock_gauge(&stake(3_000), 1);
        for b in 1..=3 {
            f.lock(&acct(b), 10, DAY);
        }
        f.start_all(NOW);

        let total = distribute_active(&f, NOW);
        assert_eq!(total.amount_of("stake"), 3_000);
        for b in 1..=3 {
            assert_eq!(f.bank.balance(&acct(b)).amount_of("stake"), 1_000);
        }

        let g = f.gauge(id);
        assert_eq!(g.filled_epochs, 1);
        assert_eq!(g.distributed_coins, stake(3_000));
        assert!(f.keeper.store.has_ref(GaugeState::Finished, NOW, id));
        assert!(f.keeper.store.ids_by_denom(LP).unwrap().is_empty());
        assert!(f.hooks.events().contains(&HookEvent::FinishDistribution(id)));
        assert_eq!(f.hooks.events().last(), Some(&HookEvent::EpochDistribution));
        f.assert_indices_consistent(NOW);
    }

    #[test]
    fn rounding_dust_stays_in_escrow() {
        let f = fixture("rounding_dust");
        let id = f.lock_gauge(&stake(1_001), 3);
        f.lock(&acct(1), 5, DAY);
        f.lock(&acct(2), 5, WEEK);
        f.start_all(NOW);

        for _ in 0..3 {
            distribute_active(&f, NOW);
        }
        let g = f.gauge(id);
        assert_eq!(g.filled_epochs, 3);
        assert_eq!(g.distributed_coins.amount_of("stake"), 1_000);
        let dust = g.remaining_coins().unwrap().amount_of("stake");
        assert!(dust <= 2, "dust {} exceeds lock count", dust);
        assert_eq!(f.bank.balance(f.keeper.module_account()).amount_of("stake"), dust);
        f.assert_indices_consistent(NOW);
    }

    #[test]
    fn shares_never_exceed_the_epoch_amount() {
        let f = fixture("shares_bounded");
        let id = f.lock_gauge(&stake(1_000), 3);
        f.lock(&acct(1), 1, DAY);
        f.lock(&acct(2), 2, DAY);
        f.lock(&acct(3), 4, DAY);
        f.start_all(NOW);

        let per_epoch = f.gauge(id).coins_per_epoch().unwrap();
        let total = distribute_active(&f, NOW);
        assert_eq!(total.amount_of("stake"), 47 + 95 + 190);
        assert!(total.is_all_lte(&per_epoch));
        assert_eq!(f.gauge(id).distributed_coins, total);
    }

    #[test]
    fn eighteen_decimal_rewards_pay_alongside_small_gauges() {
        let f = fixture("wide_amounts");
        let weth = Coins::single("weth", 10_000 * 10u128.pow(18));
        let small = f.lock_gauge(&stake(3_000), 1);
        let large = f.lock_gauge(&weth, 1);
        f.lock(&acct(1), 10u128.pow(23), DAY);
        f.lock(&acct(2), 10u128.pow(23), DAY);
        f.start_all(NOW);

        let total = distribute_active(&f, NOW);
        assert_eq!(total.amount_of("weth"), 10_000 * 10u128.pow(18));
        assert_eq!(total.amount_of("stake"), 3_000);
        for b in 1..=2 {
            let balance = f.bank.balance(&acct(b));
            assert_eq!(balance.amount_of("weth"), 5_000 * 10u128.pow(18));
            assert_eq!(balance.amount_of("stake"), 1_500);
        }
        assert_eq!(f.gauge(small).filled_epochs, 1);
        assert_eq!(f.gauge(large).filled_epochs, 1);
    }

    #[test]
    fn spam_payouts_are_booked_but_not_sent() {
        let f = fixture("spam_payout");
        let id = f.lock_gauge(&stake(10), 1);
        f.lock(&acct(1), 10, DAY);
        f.start_all(NOW);

        let total = distribute_active(&f, NOW);
        assert!(total.is_empty());
        let g = f.gauge(id);
        assert_eq!(g.filled_epochs, 1);
        assert_eq!(g.distributed_coins, stake(10));
        assert_eq!(f.bank.batched_sends(), 0);
        assert!(f.bank.balance(&acct(1)).is_empty());
        assert_eq!(f.bank.balance(f.keeper.module_account()), stake(10));
        f.assert_indices_consistent(NOW);
    }

    #[test]
    fn gauge_without_locks_still_consumes_an_epoch() {
        let f = fixture("no_locks");
        let id = f.lock_gauge(&stake(3_000), 3);
        f.start_all(NOW);

        distribute_active(&f, NOW);
        let g = f.gauge(id);
        assert_eq!(g.filled_epochs, 1);
        assert_eq!(g.distributed_coins, stake(1_000));
        assert_eq!(f.bank.batched_sends(), 0);
        assert!(f.keeper.store.has_ref(GaugeState::Active, NOW, id));
    }

    #[test]
    fn locks_without_the_denom_leave_the_gauge_untouched() {
        let f = fixture("no_locked_amount");
        let id = f.lock_gauge(&stake(300), 1);
        let g = f.gauge(id);
        let locks = vec![Lock::new(1, acct(1), Coins::single("uatom", 5), DAY)];
        assert_eq!(lock_payout(&g, &locks, 100).unwrap(), LockPayout::NoLockedAmount);
    }

    #[test]
    fn by_time_gauges_cannot_be_distributed() {
        let f = fixture("by_time_distribute");
        let g = Gauge {
            id: 9,
            is_perpetual: false,
            distribute_to: DistributeTo::ByTime { denom: LP.into(), timestamp: NOW },
            coins: stake(100),
            start_time: NOW,
            num_epochs_paid_over: 1,
            filled_epochs: 0,
            distributed_coins: Coins::new(),
        };
        f.keeper.store.put_gauge(&g).unwrap();
        assert!(matches!(
            f.keeper.distribute(&[g], NOW),
            Err(IncentivesError::UnsupportedLockQueryType(_))
        ));
        assert_eq!(f.gauge(9).filled_epochs, 0);
    }

    #[test]
    fn one_transfer_per_receiver() {
        let f = fixture("one_transfer");
        f.lock_gauge(&stake(300), 1);
        f.lock_gauge(&stake(300), 1);
        f.lock(&acct(1), 10, DAY);
        f.start_all(NOW);

        distribute_active(&f, NOW);
        let payouts: Vec<_> = f
            .hooks
            .events()
            .into_iter()
            .filter(|e| matches!(e, HookEvent::Distribution { .. }))
            .collect();
        assert_eq!(
            payouts,
            vec![HookEvent::Distribution { receiver: acct(1), amount: stake(600) }]
        );
        assert_eq!(f.bank.batched_sends(), 1);
    }

    #[test]
    fn reward_receiver_is_paid_instead_of_owner() {
        let f = fixture("reward_receiver");
        f.lock_gauge(&stake(500), 1);
        f.locks.add_lock(
            Lock::new(77, acct(1), Coins::single(LP, 10), DAY).with_reward_receiver(acct(2)),
        );
        f.start_all(NOW);

        distribute_active(&f, NOW);
        assert!(f.bank.balance(&acct(1)).is_empty());
        assert_eq!(f.bank.balance(&acct(2)), stake(500));
    }

    #[test]
    fn external_no_lock_gauge_registers_a_schedule() {
        let f = fixture("external_schedule");
        let owner = f.funded(1, &stake(172_800));
        let no_lock = DistributeTo::NoLock { denom: String::new(), duration: DAY };
        let id = f
            .keeper
            .create_gauge(false, &owner, &stake(172_800), no_lock, NOW, 2, 5, NOW)
            .unwrap();
        f.start_all(NOW);

        let total = distribute_active(&f, NOW);
        assert_eq!(total, stake(86_400));
        let schedules = f.pools.schedules();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].pool_id, 5);
        assert_eq!(schedules[0].emission_rate, Decimal::ONE);
        assert_eq!(schedules[0].start_time, NOW);
        // DAY is supported but not authorized by default.
        assert_eq!(schedules[0].uptime, DEFAULT_UPTIME);

        let params = Params {
            authorized_uptimes: vec![DEFAULT_UPTIME, DAY],
            ..f.keeper.params().unwrap()
        };
        f.keeper.set_params(&params).unwrap();
        distribute_active(&f, NOW);
        assert_eq!(f.pools.schedules()[1].uptime, DAY);
        assert!(f.gauge(id).is_finished(NOW));
    }

    #[test]
    fn internal_no_lock_gauge_uses_internal_uptime() {
        let f = fixture("internal_schedule");
        let id = f.pool_with_internal_gauge(3, 0);
        f.bank.fund(f.keeper.module_account(), &stake(86_400)).unwrap();
        f.keeper.add_to_gauge_rewards_internal(&stake(86_400), id, NOW).unwrap();
        f.start_all(NOW);

        distribute_active(&f, NOW);
        let schedules = f.pools.schedules();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].pool_id, 3);
        assert_eq!(schedules[0].uptime, DEFAULT_UPTIME);
        assert_eq!(schedules[0].emission_rate, Decimal::ONE);
        // Perpetual gauges pay everything each epoch and stay active.
        let g = f.gauge(id);
        assert_eq!(g.distributed_coins, stake(86_400));
        assert!(g.is_active(NOW));
    }

    #[test]
    fn unknown_distribution_epoch_persists_nothing() {
        let f = fixture("unknown_epoch");
        let id = f.lock_gauge(&stake(3_000), 1);
        f.lock(&acct(1), 10, DAY);
        f.start_all(NOW);
        let params = Params { distr_epoch_identifier: "hour".into(), ..f.keeper.params().unwrap() };
        f.keeper.set_params(&params).unwrap();

        let active = f.keeper.store.gauges_in(GaugeState::Active).unwrap();
        let err = f.keeper.distribute(&active, NOW).unwrap_err();
        assert!(matches!(err, IncentivesError::EpochNotFound(ref e) if e == "hour"));
        assert_eq!(f.gauge(id).filled_epochs, 0);
        assert!(f.bank.balance(&acct(1)).is_empty());
    }

    #[test]
    fn failed_payout_persists_nothing() {
        let f = fixture("failed_payout");
        let id = f.lock_gauge(&stake(3_000), 1);
        f.lock(&acct(1), 10, DAY);
        f.start_all(NOW);
        f.bank.move_from_module(&acct(99), &stake(3_000)).unwrap();

        let active = f.keeper.store.gauges_in(GaugeState::Active).unwrap();
        let err = f.keeper.distribute(&active, NOW).unwrap_err();
        assert!(matches!(err, IncentivesError::InsufficientFunds { .. }));
        let g = f.gauge(id);
        assert_eq!(g.filled_epochs, 0);
        assert!(g.distributed_coins.is_empty());
        assert!(f.keeper.store.has_ref(GaugeState::Active, NOW, id));
    }

    #[test]
    fn emission_rate_is_per_second() {
        let epoch = EpochInfo {
            identifier: EPOCH.into(),
            duration: DAY,
            current_epoch: 1,
            current_epoch_start_time: NOW,
        };
        assert_eq!(emission_rate(172_800, &epoch).unwrap(), Decimal::from(2));
        assert_eq!(emission_rate(43_200, &epoch).unwrap(), Decimal::new(5, 1));
    }
}
