//! Collaborators the engine consumes. Every external registry is reached
//! through one of these traits and injected into the [`Keeper`] at
//! construction.
//!
//! [`Keeper`]: crate::keeper::Keeper

use std::time::Duration;

use accrue_core::coins::{Coin, Coins};
use accrue_core::epoch::EpochInfo;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::DistributeTo;
use accrue_core::lock::Lock;
use accrue_core::types::{AccountId, Balance, GaugeId, PoolId, Timestamp};
use rust_decimal::Decimal;

pub use crate::hooks::{IncentiveHooks, NoopHooks};

/// Escrow and transfer primitive of the host ledger. Every call either fully
/// succeeds or fails without moving anything.
pub trait BankKeeper {
    /// Escrow `coins` from `from` into the incentives module account.
    fn move_to_module(&self, from: &AccountId, coins: &Coins) -> Result<(), IncentivesError>;

    /// Pay `coins` out of the incentives module account.
    fn move_from_module(&self, to: &AccountId, coins: &Coins) -> Result<(), IncentivesError>;

    /// Pay many recipients out of the module account in one operation.
    fn batched_move_from_module(
        &self,
        payouts: &[(AccountId, Coins)],
    ) -> Result<(), IncentivesError>;

    /// Account-to-account transfer; used for creation fees.
    fn send(&self, from: &AccountId, to: &AccountId, coins: &Coins) -> Result<(), IncentivesError>;
}

/// Read access to the lock registry.
pub trait LockKeeper {
    /// Locks qualifying for `condition` through the general lock index.
    fn locks_matching(&self, condition: &DistributeTo) -> Result<Vec<Lock>, IncentivesError>;

    /// Synthetic locks of `denom` lasting at least `duration`.
    fn synthetic_locks_matching(
        &self,
        denom: &str,
        duration: Duration,
    ) -> Result<Vec<Lock>, IncentivesError>;

    /// Sum of the condition's denom across every qualifying lock.
    fn total_locked_amount(&self, condition: &DistributeTo) -> Result<Balance, IncentivesError>;

    fn account_locks(&self, owner: &AccountId) -> Result<Vec<Lock>, IncentivesError>;
}

/// The pool registry and its incentive mechanism.
pub trait PoolIncentivesKeeper {
    /// Pool a gauge is bound to for the given lockable duration.
    fn pool_for_gauge(&self, gauge_id: GaugeId, duration: Duration) -> Result<PoolId, IncentivesError>;

    /// The pool's own internal gauge.
    fn internal_gauge_for_pool(&self, pool_id: PoolId) -> Result<GaugeId, IncentivesError>;

    /// Binds a freshly created "no lock" gauge to its pool.
    fn link_no_lock_gauge(&self, pool_id: PoolId, gauge_id: GaugeId) -> Result<(), IncentivesError>;

    fn longest_lockable_duration(&self) -> Result<Duration, IncentivesError>;

    /// Registers (or extends) an emission of `coin` on the pool at
    /// `emission_rate` units per second, starting at `start_time`.
    fn register_incentive_schedule(
        &self,
        pool_id: PoolId,
        coin: &Coin,
        emission_rate: Decimal,
        start_time: Timestamp,
        uptime: Duration,
    ) -> Result<(), IncentivesError>;

    /// Monotonic cumulative trading volume; `None` when the pool has none.
    fn cumulative_volume(&self, pool_id: PoolId) -> Result<Option<Balance>, IncentivesError>;
}

/// The host's epoch clock.
pub trait EpochKeeper {
    fn epoch_info(&self, identifier: &str) -> Result<EpochInfo, IncentivesError>;
}
