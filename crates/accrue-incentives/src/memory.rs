//! In-memory collaborators for tests and the simulator.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use accrue_core::coins::{Coin, Coins};
use accrue_core::constants::is_synthetic_denom;
use accrue_core::epoch::EpochInfo;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::DistributeTo;
use accrue_core::lock::{sum_locks_by_denom, Lock};
use accrue_core::types::{AccountId, Balance, GaugeId, PoolId, Timestamp};
use rust_decimal::Decimal;

use crate::hooks::IncentiveHooks;
use crate::interfaces::{BankKeeper, EpochKeeper, LockKeeper, PoolIncentivesKeeper};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn insufficient(err: IncentivesError) -> IncentivesError {
    match err {
        IncentivesError::CoinsUnderflow { denom, minuend, subtrahend } => {
            IncentivesError::InsufficientFunds { denom, need: subtrahend, have: minuend }
        }
        other => other,
    }
}

// ── Bank ──────────────────────────────────────────────────────────────────────

/// Balance ledger keyed by account.
pub struct MemoryBank {
    module: AccountId,
    balances: Mutex<BTreeMap<AccountId, Coins>>,
    batched_sends: Mutex<u64>,
}

impl MemoryBank {
    /// New ledger whose module transfers go through `module`.
    pub fn new(module: AccountId) -> Self {
        Self {
            module,
            balances: Mutex::new(BTreeMap::new()),
            batched_sends: Mutex::new(0),
        }
    }

    /// Mints `coins` into `account`.
    pub fn fund(&self, account: &AccountId, coins: &Coins) -> Result<(), IncentivesError> {
        let mut balances = guard(&self.balances);
        balances.entry(account.clone()).or_default().add_assign(coins)
    }

    pub fn balance(&self, account: &AccountId) -> Coins {
        guard(&self.balances).get(account).cloned().unwrap_or_default()
    }

    /// Number of batched payouts executed so far.
    pub fn batched_sends(&self) -> u64 {
        *guard(&self.batched_sends)
    }

    fn transfer(
        balances: &mut BTreeMap<AccountId, Coins>,
        from: &AccountId,
        to: &AccountId,
        coins: &Coins,
    ) -> Result<(), IncentivesError> {
        let have = balances.get(from).cloned().unwrap_or_default();
        let rest = have.checked_sub(coins).map_err(insufficient)?;
        balances.insert(from.clone(), rest);
        balances.entry(to.clone()).or_default().add_assign(coins)
    }
}

impl BankKeeper for MemoryBank {
    fn move_to_module(&self, from: &AccountId, coins: &Coins) -> Result<(), IncentivesError> {
        let mut balances = guard(&self.balances);
        Self::transfer(&mut balances, from, &self.module, coins)
    }

    fn move_from_module(&self, to: &AccountId, coins: &Coins) -> Result<(), IncentivesError> {
        let mut balances = guard(&self.balances);
        Self::transfer(&mut balances, &self.module, to, coins)
    }

    fn batched_move_from_module(
        &self,
        payouts: &[(AccountId, Coins)],
    ) -> Result<(), IncentivesError> {
        let mut balances = guard(&self.balances);
        let mut staged = balances.clone();
        for (to, coins) in payouts {
            Self::transfer(&mut staged, &self.module, to, coins)?;
        }
        *balances = staged;
        *guard(&self.batched_sends) += 1;
        Ok(())
    }

    fn send(&self, from: &AccountId, to: &AccountId, coins: &Coins) -> Result<(), IncentivesError> {
        let mut balances = guard(&self.balances);
        Self::transfer(&mut balances, from, to, coins)
    }
}

// ── Locks ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryLocks {
    locks: Mutex<Vec<Lock>>,
    synthetic: Mutex<Vec<Lock>>,
}

impl MemoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lock(&self, lock: Lock) {
        guard(&self.locks).push(lock);
    }

    /// Registers a lock under a synthetic denom; only
    /// `synthetic_locks_matching` sees it.
    pub fn add_synthetic_lock(&self, lock: Lock) {
        guard(&self.synthetic).push(lock);
    }

    fn qualifying(locks: &[Lock], denom: &str, duration: Duration) -> Vec<Lock> {
        locks
            .iter()
            .filter(|l| l.amount_of(denom) > 0 && l.duration >= duration)
            .cloned()
            .collect()
    }
}

impl LockKeeper for MemoryLocks {
    fn locks_matching(&self, condition: &DistributeTo) -> Result<Vec<Lock>, IncentivesError> {
        match condition {
            DistributeTo::ByDuration { denom, duration } => {
                Ok(Self::qualifying(&guard(&self.locks), denom, *duration))
            }
            DistributeTo::ByTime { .. } => {
                Err(IncentivesError::UnsupportedLockQueryType("ByTime".into()))
            }
            DistributeTo::NoLock { .. } | DistributeTo::ByGroup => Ok(Vec::new()),
        }
    }

    fn synthetic_locks_matching(
        &self,
        denom: &str,
        duration: Duration,
    ) -> Result<Vec<Lock>, IncentivesError> {
        Ok(Self::qualifying(&guard(&self.synthetic), denom, duration))
    }

    fn total_locked_amount(&self, condition: &DistributeTo) -> Result<Balance, IncentivesError> {
        let locks = match condition {
            DistributeTo::ByDuration { denom, duration } if is_synthetic_denom(denom) => {
                self.synthetic_locks_matching(denom, *duration)?
            }
            _ => self.locks_matching(condition)?,
        };
        sum_locks_by_denom(&locks, condition.denom())
    }

    fn account_locks(&self, owner: &AccountId) -> Result<Vec<Lock>, IncentivesError> {
        Ok(guard(&self.locks)
            .iter()
            .filter(|l| &l.owner == owner)
            .cloned()
            .collect())
    }
}

// ── Pools ─────────────────────────────────────────────────────────────────────

/// An emission registered on a pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncentiveSchedule {
    pub pool_id: PoolId,
    pub coin: Coin,
    pub emission_rate: Decimal,
    pub start_time: Timestamp,
    pub uptime: Duration,
}

pub struct MemoryPools {
    longest_lockable_duration: Duration,
    duration_links: Mutex<BTreeMap<(GaugeId, Duration), PoolId>>,
    no_lock_links: Mutex<BTreeMap<GaugeId, PoolId>>,
    internal_gauges: Mutex<BTreeMap<PoolId, GaugeId>>,
    volumes: Mutex<BTreeMap<PoolId, Balance>>,
    schedules: Mutex<Vec<IncentiveSchedule>>,
}

impl MemoryPools {
    pub fn new(longest_lockable_duration: Duration) -> Self {
        Self {
            longest_lockable_duration,
            duration_links: Mutex::new(BTreeMap::new()),
            no_lock_links: Mutex::new(BTreeMap::new()),
            internal_gauges: Mutex::new(BTreeMap::new()),
            volumes: Mutex::new(BTreeMap::new()),
            schedules: Mutex::new(Vec::new()),
        }
    }

    /// Binds `gauge_id` to `pool_id` for lockable `duration`.
    pub fn link_gauge(&self, gauge_id: GaugeId, duration: Duration, pool_id: PoolId) {
        guard(&self.duration_links).insert((gauge_id, duration), pool_id);
    }

    pub fn set_internal_gauge(&self, pool_id: PoolId, gauge_id: GaugeId) {
        guard(&self.internal_gauges).insert(pool_id, gauge_id);
    }

    pub fn set_volume(&self, pool_id: PoolId, volume: Balance) {
        guard(&self.volumes).insert(pool_id, volume);
    }

    pub fn schedules(&self) -> Vec<IncentiveSchedule> {
        guard(&self.schedules).clone()
    }
}

impl PoolIncentivesKeeper for MemoryPools {
    fn pool_for_gauge(&self, gauge_id: GaugeId, duration: Duration) -> Result<PoolId, IncentivesError> {
        if let Some(pool) = guard(&self.duration_links).get(&(gauge_id, duration)) {
            return Ok(*pool);
        }
        guard(&self.no_lock_links)
            .get(&gauge_id)
            .copied()
            .ok_or(IncentivesError::NoPoolForGauge { gauge_id, duration })
    }

    fn internal_gauge_for_pool(&self, pool_id: PoolId) -> Result<GaugeId, IncentivesError> {
        guard(&self.internal_gauges)
            .get(&pool_id)
            .copied()
            .ok_or(IncentivesError::NoInternalGauge(pool_id))
    }

    fn link_no_lock_gauge(&self, pool_id: PoolId, gauge_id: GaugeId) -> Result<(), IncentivesError> {
        guard(&self.no_lock_links).insert(gauge_id, pool_id);
        Ok(())
    }

    fn longest_lockable_duration(&self) -> Result<Duration, IncentivesError> {
        if self.longest_lockable_duration.is_zero() {
            return Err(IncentivesError::NoLockableDurations);
        }
        Ok(self.longest_lockable_duration)
    }

    fn register_incentive_schedule(
        &self,
        pool_id: PoolId,
        coin: &Coin,
        emission_rate: Decimal,
        start_time: Timestamp,
        uptime: Duration,
    ) -> Result<(), IncentivesError> {
        guard(&self.schedules).push(IncentiveSchedule {
            pool_id,
            coin: coin.clone(),
            emission_rate,
            start_time,
            uptime,
        });
        Ok(())
    }

    fn cumulative_volume(&self, pool_id: PoolId) -> Result<Option<Balance>, IncentivesError> {
        Ok(guard(&self.volumes).get(&pool_id).copied())
    }
}

// ── Epochs ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryEpochs {
    infos: Mutex<BTreeMap<String, EpochInfo>>,
}

impl MemoryEpochs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, info: EpochInfo) {
        guard(&self.infos).insert(info.identifier.clone(), info);
    }

    /// Starts the next epoch of `identifier`; returns its number.
    pub fn advance(&self, identifier: &str) -> Result<i64, IncentivesError> {
        let mut infos = guard(&self.infos);
        let info = infos
            .get_mut(identifier)
            .ok_or_else(|| IncentivesError::EpochNotFound(identifier.to_string()))?;
        info.current_epoch += 1;
        info.current_epoch_start_time += info.duration.as_secs() as Timestamp;
        Ok(info.current_epoch)
    }
}

impl EpochKeeper for MemoryEpochs {
    fn epoch_info(&self, identifier: &str) -> Result<EpochInfo, IncentivesError> {
        guard(&self.infos)
            .get(identifier)
            .cloned()
            .ok_or_else(|| IncentivesError::EpochNotFound(identifier.to_string()))
    }
}

// ── Hooks ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookEvent {
    CreateGauge(GaugeId),
    AddToGauge(GaugeId),
    FinishDistribution(GaugeId),
    EpochDistribution,
    Distribution { receiver: AccountId, amount: Coins },
    GroupSyncFailure { group_gauge_id: GaugeId, error: String },
}

/// Hooks that remember every event in order.
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<HookEvent>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HookEvent> {
        guard(&self.events).clone()
    }

    fn push(&self, event: HookEvent) {
        guard(&self.events).push(event);
    }
}

impl IncentiveHooks for RecordingHooks {
    fn after_create_gauge(&self, gauge_id: GaugeId) {
        self.push(HookEvent::CreateGauge(gauge_id));
    }

    fn after_add_to_gauge(&self, gauge_id: GaugeId) {
        self.push(HookEvent::AddToGauge(gauge_id));
    }

    fn after_finish_distribution(&self, gauge_id: GaugeId) {
        self.push(HookEvent::FinishDistribution(gauge_id));
    }

    fn after_epoch_distribution(&self) {
        self.push(HookEvent::EpochDistribution);
    }

    fn on_distribution(&self, receiver: &AccountId, amount: &Coins) {
        self.push(HookEvent::Distribution {
            receiver: receiver.clone(),
            amount: amount.clone(),
        });
    }

    fn on_group_sync_failure(&self, group_gauge_id: GaugeId, error: &IncentivesError) {
        self.push(HookEvent::GroupSyncFailure {
            group_gauge_id,
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(b: u8) -> AccountId {
        AccountId::from_bytes([b; 32])
    }

    #[test]
    fn failed_batch_moves_nothing() {
        let module = acct(0);
        let bank = MemoryBank::new(module.clone());
        bank.fund(&module, &Coins::single("stake", 10)).unwrap();
        let payouts = vec![
            (acct(1), Coins::single("stake", 6)),
            (acct(2), Coins::single("stake", 6)),
        ];
        let err = bank.batched_move_from_module(&payouts).unwrap_err();
        assert!(matches!(err, IncentivesError::InsufficientFunds { .. }));
        assert_eq!(bank.balance(&module).amount_of("stake"), 10);
        assert!(bank.balance(&acct(1)).is_empty());
        assert_eq!(bank.batched_sends(), 0);
    }

    #[test]
    fn synthetic_locks_are_separate() {
        let locks = MemoryLocks::new();
        let d = Duration::from_secs(10);
        locks.add_synthetic_lock(Lock::new(1, acct(1), Coins::single("lp/superbonding/v", 5), d));
        let cond = DistributeTo::ByDuration { denom: "lp/superbonding/v".into(), duration: d };
        assert!(locks.locks_matching(&cond).unwrap().is_empty());
        assert_eq!(locks.total_locked_amount(&cond).unwrap(), 5);
    }
}
