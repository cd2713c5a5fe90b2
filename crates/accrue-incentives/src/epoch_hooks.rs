use accrue_core::coins::Coins;
use accrue_core::constants::is_synthetic_denom;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::{Gauge, GaugeState};
use accrue_core::types::{GaugeId, Timestamp};
use tracing::{debug, info};

use crate::keeper::Keeper;

/// What one distribution epoch did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EpochSummary {
    pub promoted: Vec<GaugeId>,
    pub distributed: Coins,
    pub allocated: Coins,
}

/// Perpetual gauges over synthetic locks are paid by the staking side, not
/// by the epoch distribution.
fn paid_by_epoch(gauge: &Gauge) -> bool {
    !gauge.is_group() && !(gauge.is_perpetual && is_synthetic_denom(gauge.distribute_to.denom()))
}

impl Keeper {
    pub fn before_epoch_start(&self, _epoch_identifier: &str, _epoch_number: i64) -> Result<(), IncentivesError> {
        Ok(())
    }

    /// Runs one distribution epoch if `epoch_identifier` is the configured
    /// distribution epoch: promote due gauges, pay active gauges, then fund
    /// group members.
    pub fn after_epoch_end(
        &self,
        epoch_identifier: &str,
        epoch_number: i64,
        now: Timestamp,
    ) -> Result<EpochSummary, IncentivesError> {
        let params = self.params()?;
        if epoch_identifier != params.distr_epoch_identifier {
            debug!(epoch_identifier, "not the distribution epoch");
            return Ok(EpochSummary::default());
        }

        let promoted = self.promote_due_gauges(now)?;
        let gauges: Vec<Gauge> = self
            .store
            .gauges_in(GaugeState::Active)?
            .into_iter()
            .filter(paid_by_epoch)
            .collect();
        let distributed = self.distribute(&gauges, now)?;
        let allocated = self.allocate_across_gauges(now)?;

        info!(
            epoch = epoch_number,
            promoted = promoted.len(),
            distributed = %distributed,
            allocated = %allocated,
            "epoch processed"
        );
        Ok(EpochSummary { promoted, distributed, allocated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use accrue_core::gauge::DistributeTo;
    use accrue_core::lock::Lock;

    const SUPERBONDED: &str = "gamm/pool/1/superbonding/val1";

    #[test]
    fn other_epochs_are_ignored() {
        let f = fixture("epoch_ignored");
        let id = f.lock_gauge(&stake(1_000), 1);
        f.lock(&acct(1), 10, DAY);

        let summary = f.keeper.after_epoch_end("week", 1, NOW).unwrap();
        assert_eq!(summary, EpochSummary::default());
        assert_eq!(f.gauge(id).filled_epochs, 0);
        assert!(f.keeper.store.has_ref(GaugeState::Upcoming, NOW, id));
    }

    #[test]
    fn epochs_promote_pay_and_allocate() {
        let f = fixture("epoch_flow");
        let owner = f.funded(1, &stake(2_000));
        let lock_gauge = f
            .keeper
            .create_gauge(
                false,
                &owner,
                &stake(2_000),
                DistributeTo::ByDuration { denom: LP.into(), duration: DAY },
                NOW + 86_400,
                2,
                0,
                NOW,
            )
            .unwrap();
        f.lock(&acct(2), 10, DAY);
        let (g1, g2) = (f.pool_with_internal_gauge(1, 100), f.pool_with_internal_gauge(2, 100));
        let creator = f.funded(3, &stake(250));
        let group = f.keeper.create_group(&stake(200), 2, &creator, &[1, 2], NOW).unwrap();

        let first = f.keeper.after_epoch_end(EPOCH, 1, NOW).unwrap();
        assert_eq!(first.promoted, vec![g1, g2, group]);
        assert!(first.distributed.is_empty());
        assert_eq!(first.allocated, stake(100));
        f.assert_indices_consistent(NOW);

        let now = NOW + 86_400;
        let second = f.keeper.after_epoch_end(EPOCH, 2, now).unwrap();
        assert_eq!(second.promoted, vec![lock_gauge]);
        assert_eq!(second.distributed, stake(1_100));
        assert_eq!(second.allocated, stake(100));
        assert!(f.keeper.store.get_group(group).unwrap().is_none());
        f.assert_indices_consistent(now);

        let now = NOW + 2 * 86_400;
        let third = f.keeper.after_epoch_end(EPOCH, 3, now).unwrap();
        assert!(third.promoted.is_empty());
        assert_eq!(third.distributed, stake(1_100));
        assert!(third.allocated.is_empty());
        f.assert_indices_consistent(now);

        assert_eq!(f.bank.balance(&acct(2)), stake(2_000));
        assert!(f.gauge(lock_gauge).is_finished(now));
        assert_eq!(f.pools.schedules().len(), 4);
        assert!(f.keeper.module_to_distribute_coins().unwrap().is_empty());
        assert_eq!(f.keeper.module_distributed_coins().unwrap(), stake(2_200));
    }

    #[test]
    fn perpetual_synthetic_gauges_are_left_to_staking() {
        let f = fixture("epoch_synthetic");
        let owner = f.funded(1, &stake(1_000));
        let id = f
            .keeper
            .create_gauge(
                true,
                &owner,
                &stake(1_000),
                DistributeTo::ByDuration { denom: SUPERBONDED.into(), duration: DAY },
                NOW,
                0,
                0,
                NOW,
            )
            .unwrap();
        f.locks.add_synthetic_lock(Lock::new(
            1,
            acct(2),
            Coins::single(SUPERBONDED, 10),
            DAY,
        ));

        let summary = f.keeper.after_epoch_end(EPOCH, 1, NOW).unwrap();
        assert_eq!(summary.promoted, vec![id]);
        assert!(summary.distributed.is_empty());
        assert_eq!(f.gauge(id).filled_epochs, 0);
        assert!(f.bank.balance(&acct(2)).is_empty());
    }

    #[test]
    fn before_epoch_start_changes_nothing() {
        let f = fixture("epoch_before_start");
        let id = f.lock_gauge(&stake(1_000), 1);
        f.keeper.before_epoch_start(EPOCH, 1).unwrap();
        assert!(f.keeper.store.has_ref(GaugeState::Upcoming, NOW, id));
    }
}
