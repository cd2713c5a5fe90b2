use accrue_core::coins::Coins;
use accrue_core::constants::{no_lock_external_denom, no_lock_internal_denom};
use accrue_core::error::IncentivesError;
use accrue_core::gauge::{DistributeTo, Gauge, GaugeState};
use accrue_core::params::Params;
use accrue_core::types::{AccountId, GaugeId, PoolId, Timestamp};
use tracing::{debug, info, warn};

use crate::keeper::Keeper;

impl Keeper {
    // ── Creation ──────────────────────────────────────────────────────────────

    /// Escrows `coins` from `owner` into a new gauge and indexes it as
    /// upcoming. Returns the new gauge id.
    ///
    /// `pool_id` must be non-zero for `NoLock` gauges and zero otherwise. An
    /// empty `NoLock` denom marks an external gauge and is rewritten to the
    /// pool's external marker. Nothing is stored if escrow fails.
    #[allow(clippy::too_many_arguments)]
    pub fn create_gauge(
        &self,
        is_perpetual: bool,
        owner: &AccountId,
        coins: &Coins,
        distribute_to: DistributeTo,
        start_time: Timestamp,
        num_epochs_paid_over: u64,
        pool_id: PoolId,
        now: Timestamp,
    ) -> Result<GaugeId, IncentivesError> {
        let params = self.params()?;
        let distribute_to = validate_distribute_to(&params, distribute_to, pool_id)?;
        if !is_perpetual && num_epochs_paid_over == 0 {
            return Err(IncentivesError::ZeroEpochsPaidOver);
        }

        let id = self.next_gauge_id()?;
        self.bank.move_to_module(owner, coins)?;

        if let DistributeTo::NoLock { .. } = distribute_to {
            if let Err(e) = self.pools.link_no_lock_gauge(pool_id, id) {
                warn!(gauge_id = id, pool_id, error = %e, "pool link failed, refunding escrow");
                self.bank.move_from_module(owner, coins)?;
                return Err(e);
            }
        }

        let gauge = Gauge {
            id,
            is_perpetual,
            distribute_to,
            coins: coins.clone(),
            start_time,
            num_epochs_paid_over,
            filled_epochs: 0,
            distributed_coins: Coins::new(),
        };
        self.store.put_gauge(&gauge)?;
        self.store.set_last_gauge_id(id)?;
        self.store.add_ref(GaugeState::Upcoming, start_time, id)?;
        self.store.add_denom_ref(gauge.distribute_to.denom(), id)?;
        self.hooks.after_create_gauge(id);

        info!(
            gauge_id = id,
            kind = gauge.distribute_to.query_type(),
            denom = gauge.distribute_to.denom(),
            coins = %gauge.coins,
            perpetual = is_perpetual,
            epochs = num_epochs_paid_over,
            starts_in = start_time - now,
            "gauge created"
        );
        Ok(id)
    }

    // ── Index transitions ─────────────────────────────────────────────────────

    /// Moves a gauge from the upcoming to the active index.
    pub fn begin_distribution(&self, gauge: &Gauge, now: Timestamp) -> Result<(), IncentivesError> {
        if now < gauge.start_time {
            return Err(IncentivesError::GaugeNotStarted {
                gauge_id: gauge.id,
                start_time: gauge.start_time,
                now,
            });
        }
        self.store
            .move_ref(GaugeState::Upcoming, GaugeState::Active, gauge.start_time, gauge.id)?;
        debug!(gauge_id = gauge.id, "gauge distribution started");
        Ok(())
    }

    /// Moves a gauge from the active to the finished index and drops its
    /// denomination reference.
    pub fn finish_distribution(&self, gauge: &Gauge) -> Result<(), IncentivesError> {
        self.store
            .move_ref(GaugeState::Active, GaugeState::Finished, gauge.start_time, gauge.id)?;
        if !gauge.is_group() {
            self.store.remove_denom_ref(gauge.distribute_to.denom(), gauge.id)?;
        }
        self.hooks.after_finish_distribution(gauge.id);
        info!(
            gauge_id = gauge.id,
            distributed = %gauge.distributed_coins,
            "gauge distribution finished"
        );
        Ok(())
    }

    /// Promotes every upcoming gauge whose start time has passed. Returns the
    /// promoted ids.
    pub fn promote_due_gauges(&self, now: Timestamp) -> Result<Vec<GaugeId>, IncentivesError> {
        let mut promoted = Vec::new();
        for gauge in self.store.gauges_in(GaugeState::Upcoming)? {
            if gauge.is_upcoming(now) {
                // Index order is by start time; nothing after this is due.
                break;
            }
            self.begin_distribution(&gauge, now)?;
            promoted.push(gauge.id);
        }
        Ok(promoted)
    }

    // ── Funding ───────────────────────────────────────────────────────────────

    /// Escrows `coins` from `owner` and adds them to a gauge that has not
    /// finished.
    pub fn add_to_gauge_rewards(
        &self,
        owner: &AccountId,
        coins: &Coins,
        gauge_id: GaugeId,
        now: Timestamp,
    ) -> Result<(), IncentivesError> {
        let gauge = self.fundable_gauge(gauge_id, now)?;
        self.bank.move_to_module(owner, coins)?;
        self.credit_gauge(gauge, coins)
    }

    /// Adds `coins` already held by the module account to a gauge that has
    /// not finished.
    pub fn add_to_gauge_rewards_internal(
        &self,
        coins: &Coins,
        gauge_id: GaugeId,
        now: Timestamp,
    ) -> Result<(), IncentivesError> {
        let gauge = self.fundable_gauge(gauge_id, now)?;
        self.credit_gauge(gauge, coins)
    }

    pub(crate) fn fundable_gauge(
        &self,
        gauge_id: GaugeId,
        now: Timestamp,
    ) -> Result<Gauge, IncentivesError> {
        let gauge = self.gauge(gauge_id)?;
        if gauge.is_finished(now) {
            return Err(IncentivesError::GaugeFinished(gauge_id));
        }
        Ok(gauge)
    }

    fn credit_gauge(&self, mut gauge: Gauge, coins: &Coins) -> Result<(), IncentivesError> {
        gauge.coins.add_assign(coins)?;
        self.store.put_gauge(&gauge)?;
        self.hooks.after_add_to_gauge(gauge.id);
        debug!(gauge_id = gauge.id, added = %coins, total = %gauge.coins, "gauge funded");
        Ok(())
    }
}

/// Checks a selection condition against the params and the pool id,
/// returning it with the external marker filled in for external `NoLock`
/// gauges.
fn validate_distribute_to(
    params: &Params,
    distribute_to: DistributeTo,
    pool_id: PoolId,
) -> Result<DistributeTo, IncentivesError> {
    match distribute_to {
        DistributeTo::ByDuration { denom, duration } => {
            if pool_id != 0 {
                return Err(IncentivesError::PoolIdOnLockGauge(pool_id));
            }
            if denom.trim().is_empty() {
                return Err(IncentivesError::InvalidDenom(denom));
            }
            if !params.is_lockable_duration(duration) {
                return Err(IncentivesError::InvalidDuration(duration));
            }
            Ok(DistributeTo::ByDuration { denom, duration })
        }
        DistributeTo::NoLock { denom, duration } => {
            if pool_id == 0 {
                return Err(IncentivesError::NoLockGaugeWithoutPool);
            }
            if denom == no_lock_internal_denom(pool_id) {
                return Ok(DistributeTo::NoLock { denom, duration });
            }
            if !denom.is_empty() {
                return Err(IncentivesError::NoLockExternalDenomSet(denom));
            }
            Ok(DistributeTo::NoLock { denom: no_lock_external_denom(pool_id), duration })
        }
        DistributeTo::ByTime { .. } => {
            Err(IncentivesError::UnsupportedLockQueryType("ByTime".into()))
        }
        DistributeTo::ByGroup => Err(IncentivesError::InvalidGaugeType("ByGroup".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::PoolIncentivesKeeper;
    use crate::memory::HookEvent;
    use crate::testutil::*;
    use std::time::Duration;

    fn by_duration(duration: Duration) -> DistributeTo {
        DistributeTo::ByDuration { denom: LP.into(), duration }
    }

    #[test]
    fn create_escrows_and_indexes_upcoming() {
        let f = fixture("create_escrows");
        let owner = f.funded(1, &stake(1_000));
        let id = f
            .keeper
            .create_gauge(false, &owner, &stake(600), by_duration(DAY), NOW + 10, 2, 0, NOW)
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(f.bank.balance(&owner).amount_of("stake"), 400);
        assert_eq!(f.bank.balance(f.keeper.module_account()).amount_of("stake"), 600);
        assert!(f.keeper.store.has_ref(GaugeState::Upcoming, NOW + 10, id));
        assert_eq!(f.keeper.store.ids_by_denom(LP).unwrap(), vec![id]);
        assert_eq!(f.keeper.store.last_gauge_id().unwrap(), 1);
        assert_eq!(f.hooks.events(), vec![HookEvent::CreateGauge(1)]);
    }

    #[test]
    fn unlisted_duration_is_rejected() {
        let f = fixture("unlisted_duration");
        let owner = f.funded(1, &stake(100));
        let err = f
            .keeper
            .create_gauge(false, &owner, &stake(100), by_duration(Duration::from_secs(5)), NOW, 1, 0, NOW)
            .unwrap_err();
        assert!(matches!(err, IncentivesError::InvalidDuration(_)));
        assert_eq!(f.bank.balance(&owner).amount_of("stake"), 100);
        assert_eq!(f.keeper.store.last_gauge_id().unwrap(), 0);
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        let f = fixture("malformed_conditions");
        let owner = f.funded(1, &stake(100));
        let k = &f.keeper;

        let by_time = DistributeTo::ByTime { denom: LP.into(), timestamp: NOW };
        assert!(matches!(
            k.create_gauge(false, &owner, &stake(1), by_time, NOW, 1, 0, NOW),
            Err(IncentivesError::UnsupportedLockQueryType(_))
        ));
        assert!(matches!(
            k.create_gauge(false, &owner, &stake(1), DistributeTo::ByGroup, NOW, 1, 0, NOW),
            Err(IncentivesError::InvalidGaugeType(_))
        ));
        let no_lock = DistributeTo::NoLock { denom: String::new(), duration: DAY };
        assert!(matches!(
            k.create_gauge(false, &owner, &stake(1), no_lock, NOW, 1, 0, NOW),
            Err(IncentivesError::NoLockGaugeWithoutPool)
        ));
        let no_lock = DistributeTo::NoLock { denom: "uatom".into(), duration: DAY };
        assert!(matches!(
            k.create_gauge(false, &owner, &stake(1), no_lock, NOW, 1, 3, NOW),
            Err(IncentivesError::NoLockExternalDenomSet(_))
        ));
        assert!(matches!(
            k.create_gauge(false, &owner, &stake(1), by_duration(DAY), NOW, 1, 3, NOW),
            Err(IncentivesError::PoolIdOnLockGauge(3))
        ));
        assert!(matches!(
            k.create_gauge(false, &owner, &stake(1), by_duration(DAY), NOW, 0, 0, NOW),
            Err(IncentivesError::ZeroEpochsPaidOver)
        ));
        assert_eq!(f.bank.balance(&owner).amount_of("stake"), 100);
        assert!(k.store.gauges().unwrap().is_empty());
    }

    #[test]
    fn external_no_lock_denom_is_rewritten_and_linked() {
        let f = fixture("external_no_lock");
        let owner = f.funded(1, &stake(100));
        let no_lock = DistributeTo::NoLock { denom: String::new(), duration: DAY };
        let id = f
            .keeper
            .create_gauge(false, &owner, &stake(100), no_lock, NOW, 1, 7, NOW)
            .unwrap();
        assert_eq!(f.gauge(id).distribute_to.denom(), "no-lock/e/7");
        assert_eq!(f.pools.pool_for_gauge(id, DAY).unwrap(), 7);
    }

    #[test]
    fn failed_escrow_stores_nothing() {
        let f = fixture("failed_escrow");
        let owner = f.funded(1, &stake(10));
        let err = f
            .keeper
            .create_gauge(false, &owner, &stake(11), by_duration(DAY), NOW, 1, 0, NOW)
            .unwrap_err();
        assert!(matches!(err, IncentivesError::InsufficientFunds { .. }));
        assert!(f.keeper.store.gauges().unwrap().is_empty());
        assert!(f.keeper.store.ids_in(GaugeState::Upcoming).unwrap().is_empty());
        assert!(f.hooks.events().is_empty());
    }

    #[test]
    fn begin_distribution_waits_for_start_time() {
        let f = fixture("begin_waits");
        let id = {
            let owner = f.funded(1, &stake(10));
            f.keeper
                .create_gauge(false, &owner, &stake(10), by_duration(DAY), NOW + 100, 1, 0, NOW)
                .unwrap()
        };
        let g = f.gauge(id);
        assert!(matches!(
            f.keeper.begin_distribution(&g, NOW),
            Err(IncentivesError::GaugeNotStarted { .. })
        ));
        assert!(f.keeper.promote_due_gauges(NOW).unwrap().is_empty());
        assert_eq!(f.keeper.promote_due_gauges(NOW + 100).unwrap(), vec![id]);
        f.assert_indices_consistent(NOW + 100);
    }

    #[test]
    fn finished_gauges_reject_more_rewards() {
        let f = fixture("finished_rejects");
        let id = f.lock_gauge(&stake(100), 1);
        let mut g = f.gauge(id);
        g.filled_epochs = 1;
        f.keeper.store.put_gauge(&g).unwrap();

        let owner = f.funded(2, &stake(5));
        assert!(matches!(
            f.keeper.add_to_gauge_rewards(&owner, &stake(5), id, NOW),
            Err(IncentivesError::GaugeFinished(_))
        ));
        assert_eq!(f.bank.balance(&owner).amount_of("stake"), 5);
    }

    #[test]
    fn add_to_gauge_rewards_grows_coins() {
        let f = fixture("add_rewards");
        let id = f.lock_gauge(&stake(100), 2);
        let owner = f.funded(2, &stake(5));
        f.keeper.add_to_gauge_rewards(&owner, &stake(5), id, NOW).unwrap();
        assert_eq!(f.gauge(id).coins.amount_of("stake"), 105);
        assert!(f.hooks.events().contains(&HookEvent::AddToGauge(id)));

        f.keeper
            .add_to_gauge_rewards_internal(&Coins::single("uatom", 3), id, NOW)
            .unwrap();
        assert_eq!(f.gauge(id).coins.amount_of("uatom"), 3);
    }
}
