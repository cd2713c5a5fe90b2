use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use accrue_core::coins::Coins;
use accrue_core::constants::no_lock_internal_denom;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::DistributeTo;
use accrue_core::lock::Lock;
use accrue_core::types::{AccountId, Balance, GaugeId, LockId, PoolId, Timestamp};
use accrue_incentives::memory::{MemoryBank, MemoryLocks, MemoryPools};
use accrue_incentives::{IncentiveHooks, Keeper};

const REWARD_DENOM: &str = "stake";
const TREASURY_FUNDS: Balance = 1_000_000_000;
const LOCK_GAUGE_BASE: Balance = 100_000;
const EXTERNAL_GAUGE_COINS: Balance = 50_000;
const GROUP_COINS: Balance = 300_000;

// ── Hooks ─────────────────────────────────────────────────────────────────────

/// Logs engine events.
pub struct LoggingHooks;

impl IncentiveHooks for LoggingHooks {
    fn after_create_gauge(&self, gauge_id: GaugeId) {
        debug!(gauge_id, "hook: gauge created");
    }

    fn after_finish_distribution(&self, gauge_id: GaugeId) {
        info!(gauge_id, "hook: gauge finished");
    }

    fn on_distribution(&self, receiver: &AccountId, amount: &Coins) {
        debug!(%receiver, %amount, "hook: paid");
    }

    fn on_group_sync_failure(&self, group_gauge_id: GaugeId, error: &IncentivesError) {
        warn!(group_gauge_id, %error, "hook: group skipped");
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

/// A seeded population of pools, gauges and lock holders.
pub struct Scenario<'a> {
    keeper: &'a Keeper,
    bank: &'a MemoryBank,
    locks: &'a MemoryLocks,
    pools: &'a MemoryPools,
    rng: StdRng,
    lockers: Vec<AccountId>,
    volumes: BTreeMap<PoolId, Balance>,
    next_lock_id: LockId,
}

impl<'a> Scenario<'a> {
    pub fn new(
        keeper: &'a Keeper,
        bank: &'a MemoryBank,
        locks: &'a MemoryLocks,
        pools: &'a MemoryPools,
        rng: StdRng,
    ) -> Self {
        Self {
            keeper,
            bank,
            locks,
            pools,
            rng,
            lockers: Vec::new(),
            volumes: BTreeMap::new(),
            next_lock_id: 1,
        }
    }

    pub fn lockers(&self) -> &[AccountId] {
        &self.lockers
    }

    /// Creates `pool_count` pools, each with an internal gauge and a lock
    /// gauge over its share denom, `locker_count` holders locking into every
    /// pool, one external gauge on the first pool and a group over all pools.
    pub fn seed(
        &mut self,
        pool_count: u64,
        locker_count: u8,
        epochs: u64,
        start: Timestamp,
    ) -> Result<(), IncentivesError> {
        let params = self.keeper.params()?;
        let durations = params.lockable_durations.clone();
        let Some(&shortest) = durations.iter().min() else {
            return Err(IncentivesError::NoLockableDurations);
        };
        let epochs = epochs.max(1);

        let treasury = AccountId::from_bytes([0xAA; 32]);
        self.bank.fund(&treasury, &Coins::single(REWARD_DENOM, TREASURY_FUNDS))?;

        let pool_ids: Vec<PoolId> = (1..=pool_count).collect();
        for &pool_id in &pool_ids {
            let internal = self.keeper.create_gauge(
                true,
                self.keeper.module_account(),
                &Coins::new(),
                DistributeTo::NoLock {
                    denom: no_lock_internal_denom(pool_id),
                    duration: Duration::ZERO,
                },
                start,
                0,
                pool_id,
                start,
            )?;
            self.pools.set_internal_gauge(pool_id, internal);
            let volume = Balance::from(self.rng.gen_range(1_000u64..=10_000));
            self.pools.set_volume(pool_id, volume);
            self.volumes.insert(pool_id, volume);

            let coins = Coins::single(REWARD_DENOM, LOCK_GAUGE_BASE * Balance::from(pool_id));
            self.keeper.create_gauge(
                false,
                &treasury,
                &coins,
                DistributeTo::ByDuration { denom: share_denom(pool_id), duration: shortest },
                start,
                epochs,
                0,
                start,
            )?;
        }

        for i in 0..locker_count {
            let owner = AccountId::from_bytes([i.wrapping_add(1); 32]);
            for &pool_id in &pool_ids {
                let amount = Balance::from(self.rng.gen_range(1u64..=1_000));
                let duration = durations[self.rng.gen_range(0..durations.len())];
                let lock = Lock::new(
                    self.next_lock_id,
                    owner.clone(),
                    Coins::single(share_denom(pool_id), amount),
                    duration,
                );
                self.next_lock_id += 1;
                self.locks.add_lock(lock);
            }
            self.lockers.push(owner);
        }

        if let Some(&first) = pool_ids.first() {
            self.keeper.create_gauge(
                false,
                &treasury,
                &Coins::single(REWARD_DENOM, EXTERNAL_GAUGE_COINS),
                DistributeTo::NoLock { denom: String::new(), duration: Duration::from_secs(3_600) },
                start,
                epochs,
                first,
                start,
            )?;
        }
        if pool_ids.len() > 1 {
            self.keeper.create_group(
                &Coins::single(REWARD_DENOM, GROUP_COINS),
                epochs,
                &treasury,
                &pool_ids,
                start,
            )?;
        }

        info!(
            pools = pool_count,
            lockers = self.lockers.len(),
            locks = self.next_lock_id - 1,
            gauges = self.keeper.store.last_gauge_id()?,
            "scenario seeded"
        );
        Ok(())
    }

    /// Adds a random amount of trading volume to every pool.
    pub fn grow_volumes(&mut self) {
        for (pool_id, volume) in self.volumes.iter_mut() {
            *volume += Balance::from(self.rng.gen_range(0u64..=5_000));
            self.pools.set_volume(*pool_id, *volume);
        }
    }
}

fn share_denom(pool_id: PoolId) -> String {
    format!("gamm/pool/{}", pool_id)
}
