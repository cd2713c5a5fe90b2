use std::time::Duration;

use accrue_core::coins::Coins;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::{Gauge, GaugeState};
use accrue_core::group::Group;
use accrue_core::types::GaugeId;

use crate::keeper::Keeper;

/// A group together with its gauge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupWithGauge {
    pub group: Group,
    pub gauge: Gauge,
}

impl Keeper {
    pub fn gauges(&self) -> Result<Vec<Gauge>, IncentivesError> {
        self.store.gauges()
    }

    pub fn active_gauges(&self) -> Result<Vec<Gauge>, IncentivesError> {
        self.store.gauges_in(GaugeState::Active)
    }

    pub fn upcoming_gauges(&self) -> Result<Vec<Gauge>, IncentivesError> {
        self.store.gauges_in(GaugeState::Upcoming)
    }

    pub fn finished_gauges(&self) -> Result<Vec<Gauge>, IncentivesError> {
        self.store.gauges_in(GaugeState::Finished)
    }

    /// Upcoming then active gauges.
    pub fn not_finished_gauges(&self) -> Result<Vec<Gauge>, IncentivesError> {
        let mut out = self.upcoming_gauges()?;
        out.extend(self.active_gauges()?);
        Ok(out)
    }

    pub fn active_gauges_per_denom(&self, denom: &str) -> Result<Vec<Gauge>, IncentivesError> {
        self.gauges_per_denom(denom, GaugeState::Active)
    }

    pub fn upcoming_gauges_per_denom(&self, denom: &str) -> Result<Vec<Gauge>, IncentivesError> {
        self.gauges_per_denom(denom, GaugeState::Upcoming)
    }

    fn gauges_per_denom(&self, denom: &str, state: GaugeState) -> Result<Vec<Gauge>, IncentivesError> {
        let mut out = Vec::new();
        for id in self.store.ids_by_denom(denom)? {
            let gauge = self.gauge(id)?;
            if self.store.has_ref(state, gauge.start_time, id) {
                out.push(gauge);
            }
        }
        Ok(out)
    }

    pub fn groups(&self) -> Result<Vec<Group>, IncentivesError> {
        self.store.groups()
    }

    pub fn group(&self, group_gauge_id: GaugeId) -> Result<GroupWithGauge, IncentivesError> {
        let group = self
            .store
            .get_group(group_gauge_id)?
            .ok_or(IncentivesError::GroupNotFound(group_gauge_id))?;
        let gauge = self
            .store
            .get_gauge(group_gauge_id)?
            .ok_or(IncentivesError::UnpairedGroup { group_id: group_gauge_id })?;
        Ok(GroupWithGauge { group, gauge })
    }

    /// Coins still to be paid by active and upcoming gauges.
    pub fn module_to_distribute_coins(&self) -> Result<Coins, IncentivesError> {
        let mut total = Coins::new();
        for gauge in self.not_finished_gauges()? {
            total.add_assign(&gauge.remaining_coins()?)?;
        }
        Ok(total)
    }

    /// Coins already paid by active and finished gauges.
    pub fn module_distributed_coins(&self) -> Result<Coins, IncentivesError> {
        let mut total = Coins::new();
        for gauge in self.active_gauges()?.into_iter().chain(self.finished_gauges()?) {
            total.add_assign(&gauge.distributed_coins)?;
        }
        Ok(total)
    }

    pub fn lockable_durations(&self) -> Result<Vec<Duration>, IncentivesError> {
        Ok(self.params()?.lockable_durations)
    }
}
