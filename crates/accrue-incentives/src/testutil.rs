use std::sync::Arc;
use std::time::Duration;

use accrue_core::coins::Coins;
use accrue_core::constants::{no_lock_internal_denom, INCENTIVES_MODULE_NAME};
use accrue_core::epoch::EpochInfo;
use accrue_core::gauge::{DistributeTo, Gauge, GaugeState};
use accrue_core::lock::Lock;
use accrue_core::params::Params;
use accrue_core::types::{AccountId, Balance, GaugeId, PoolId, Timestamp};
use accrue_state::GaugeStore;

use crate::keeper::Keeper;
use crate::memory::{MemoryBank, MemoryEpochs, MemoryLocks, MemoryPools, RecordingHooks};

pub const EPOCH: &str = "day";
pub const DAY: Duration = Duration::from_secs(86_400);
pub const WEEK: Duration = Duration::from_secs(7 * 86_400);
pub const NOW: Timestamp = 1_700_000_000;
pub const LP: &str = "gamm/pool/1";

pub struct Fixture {
    pub keeper: Keeper,
    pub bank: Arc<MemoryBank>,
    pub locks: Arc<MemoryLocks>,
    pub pools: Arc<MemoryPools>,
    pub epochs: Arc<MemoryEpochs>,
    pub hooks: Arc<RecordingHooks>,
    next_lock_id: std::cell::Cell<u64>,
}

pub fn acct(b: u8) -> AccountId {
    AccountId::from_bytes([b; 32])
}

pub fn stake(amount: Balance) -> Coins {
    Coins::single("stake", amount)
}

pub fn fixture(name: &str) -> Fixture {
    let dir = std::env::temp_dir().join(format!("accrue_incentives_test_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    let store = Arc::new(GaugeStore::open(&dir).expect("open temp db"));

    let bank = Arc::new(MemoryBank::new(AccountId::module(INCENTIVES_MODULE_NAME)));
    let locks = Arc::new(MemoryLocks::new());
    let pools = Arc::new(MemoryPools::new(WEEK));
    let epochs = Arc::new(MemoryEpochs::new());
    let hooks = Arc::new(RecordingHooks::new());
    epochs.set(EpochInfo {
        identifier: EPOCH.into(),
        duration: DAY,
        current_epoch: 1,
        current_epoch_start_time: NOW,
    });

    let keeper = Keeper::new(store, bank.clone(), locks.clone(), pools.clone(), epochs.clone())
        .with_hooks(hooks.clone());
    let params = Params {
        distr_epoch_identifier: EPOCH.into(),
        lockable_durations: vec![DAY, WEEK],
        group_creation_fee: stake(50),
        ..Params::default()
    };
    keeper.set_params(&params).expect("set params");

    Fixture { keeper, bank, locks, pools, epochs, hooks, next_lock_id: std::cell::Cell::new(1) }
}

impl Fixture {
    /// A fresh account holding `coins`.
    pub fn funded(&self, b: u8, coins: &Coins) -> AccountId {
        let a = acct(b);
        self.bank.fund(&a, coins).expect("fund");
        a
    }

    pub fn lock(&self, owner: &AccountId, amount: Balance, duration: Duration) {
        let id = self.next_lock_id.get();
        self.next_lock_id.set(id + 1);
        self.locks.add_lock(Lock::new(id, owner.clone(), Coins::single(LP, amount), duration));
    }

    /// Non-perpetual `ByDuration` gauge over `LP` starting now.
    pub fn lock_gauge(&self, coins: &Coins, epochs: u64) -> GaugeId {
        let owner = self.funded(200, coins);
        self.keeper
            .create_gauge(
                false,
                &owner,
                coins,
                DistributeTo::ByDuration { denom: LP.into(), duration: DAY },
                NOW,
                epochs,
                0,
                NOW,
            )
            .expect("create gauge")
    }

    /// Perpetual internal "no lock" gauge for `pool_id`, registered as the
    /// pool's internal gauge, with cumulative volume `volume`.
    pub fn pool_with_internal_gauge(&self, pool_id: PoolId, volume: Balance) -> GaugeId {
        let id = self
            .keeper
            .create_gauge(
                true,
                self.keeper.module_account(),
                &Coins::new(),
                DistributeTo::NoLock { denom: no_lock_internal_denom(pool_id), duration: DAY },
                NOW,
                0,
                pool_id,
                NOW,
            )
            .expect("create internal gauge");
        self.pools.set_internal_gauge(pool_id, id);
        self.pools.set_volume(pool_id, volume);
        id
    }

    pub fn gauge(&self, id: GaugeId) -> Gauge {
        self.keeper.gauge(id).expect("gauge")
    }

    /// Promotes every due gauge.
    pub fn start_all(&self, now: Timestamp) {
        self.keeper.promote_due_gauges(now).expect("promote");
    }

    /// Every stored gauge sits in exactly the index its classification at
    /// `now` names.
    pub fn assert_indices_consistent(&self, now: Timestamp) {
        let store = &self.keeper.store;
        for g in store.gauges().expect("gauges") {
            let state = g.state(now);
            for s in [GaugeState::Upcoming, GaugeState::Active, GaugeState::Finished] {
                assert_eq!(
                    store.has_ref(s, g.start_time, g.id),
                    s == state,
                    "gauge {} classified {} but index {} disagrees",
                    g.id,
                    state,
                    s
                );
            }
        }
    }
}
