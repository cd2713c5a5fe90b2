use std::collections::BTreeSet;

use accrue_core::error::IncentivesError;
use accrue_core::gauge::Gauge;
use accrue_core::group::Group;
use accrue_core::params::Params;
use accrue_core::types::{GaugeId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::keeper::Keeper;

/// Complete module state, as imported at chain start and exported for
/// upgrades.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub params: Params,
    pub gauges: Vec<Gauge>,
    pub last_gauge_id: GaugeId,
    pub groups: Vec<Group>,
}

impl GenesisState {
    pub fn from_json(json: &str) -> Result<Self, IncentivesError> {
        serde_json::from_str(json).map_err(|e| IncentivesError::InvalidGenesis(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, IncentivesError> {
        serde_json::to_string_pretty(self).map_err(|e| IncentivesError::Serialization(e.to_string()))
    }

    /// Params are valid, ids are unique and not past `last_gauge_id`, and
    /// every group is paired with a group gauge of the same id and vice versa.
    pub fn validate(&self) -> Result<(), IncentivesError> {
        self.params.validate()?;
        let mut ids = BTreeSet::new();
        for gauge in &self.gauges {
            if !ids.insert(gauge.id) {
                return Err(IncentivesError::InvalidGenesis(format!("duplicate gauge id {}", gauge.id)));
            }
            if gauge.id == 0 || gauge.id > self.last_gauge_id {
                return Err(IncentivesError::InvalidGenesis(format!(
                    "gauge id {} outside 1..={}",
                    gauge.id, self.last_gauge_id
                )));
            }
            if !gauge.distributed_coins.is_all_lte(&gauge.coins) {
                return Err(IncentivesError::DistributedExceedsCoins(gauge.id));
            }
        }

        let group_ids: BTreeSet<GaugeId> = self.groups.iter().map(|g| g.group_gauge_id).collect();
        if group_ids.len() != self.groups.len() {
            return Err(IncentivesError::InvalidGenesis("duplicate group".into()));
        }
        for group in &self.groups {
            let paired = self
                .gauges
                .iter()
                .any(|g| g.id == group.group_gauge_id && g.is_group());
            if !paired {
                return Err(IncentivesError::UnpairedGroup { group_id: group.group_gauge_id });
            }
        }
        for gauge in self.gauges.iter().filter(|g| g.is_group()) {
            if !group_ids.contains(&gauge.id) {
                return Err(IncentivesError::UnpairedGroup { group_id: gauge.id });
            }
        }
        Ok(())
    }
}

impl Keeper {
    /// Loads a validated genesis. Each gauge is indexed by its classification
    /// at `now`; only unfinished non-group gauges get a denomination
    /// reference.
    pub fn init_genesis(&self, genesis: &GenesisState, now: Timestamp) -> Result<(), IncentivesError> {
        genesis.validate()?;
        self.set_params(&genesis.params)?;

        for gauge in &genesis.gauges {
            let state = gauge.state(now);
            if gauge.is_group() {
                let group = genesis
                    .groups
                    .iter()
                    .find(|g| g.group_gauge_id == gauge.id)
                    .ok_or(IncentivesError::UnpairedGroup { group_id: gauge.id })?;
                self.store.insert_group_pair(gauge, group, state)?;
                continue;
            }
            self.store.put_gauge(gauge)?;
            self.store.add_ref(state, gauge.start_time, gauge.id)?;
            if !gauge.is_finished(now) {
                self.store.add_denom_ref(gauge.distribute_to.denom(), gauge.id)?;
            }
        }
        self.store.set_last_gauge_id(genesis.last_gauge_id)?;

        info!(
            gauges = genesis.gauges.len(),
            groups = genesis.groups.len(),
            last_gauge_id = genesis.last_gauge_id,
            "genesis imported"
        );
        Ok(())
    }

    pub fn export_genesis(&self) -> Result<GenesisState, IncentivesError> {
        Ok(GenesisState {
            params: self.params()?,
            gauges: self.store.gauges()?,
            last_gauge_id: self.store.last_gauge_id()?,
            groups: self.store.groups()?,
        })
    }
}
