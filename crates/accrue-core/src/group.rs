use serde::{Deserialize, Serialize};

use crate::error::IncentivesError;
use crate::types::{Balance, GaugeId};

/// How a group divides each epoch's payable amount across its records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplittingPolicy {
    /// Weight by trading volume accrued since the previous sync.
    #[default]
    ByVolume,
}

/// One underlying gauge funded by a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalGaugeRecord {
    pub gauge_id: GaugeId,
    /// Volume delta observed at the last successful sync.
    pub current_weight: Balance,
    /// Cumulative volume observed at the last successful sync. Never decreases.
    pub cumulative_weight: Balance,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalGaugeInfo {
    pub total_weight: Balance,
    pub gauge_records: Vec<InternalGaugeRecord>,
}

/// A group gauge's satellite record. Always stored under the id of its gauge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_gauge_id: GaugeId,
    pub internal_gauge_info: InternalGaugeInfo,
    pub splitting_policy: SplittingPolicy,
}

impl Group {
    /// New group over `gauge_ids`, every weight zero.
    pub fn new(group_gauge_id: GaugeId, gauge_ids: &[GaugeId]) -> Self {
        let gauge_records = gauge_ids
            .iter()
            .map(|&gauge_id| InternalGaugeRecord {
                gauge_id,
                current_weight: 0,
                cumulative_weight: 0,
            })
            .collect();
        Self {
            group_gauge_id,
            internal_gauge_info: InternalGaugeInfo { total_weight: 0, gauge_records },
            splitting_policy: SplittingPolicy::ByVolume,
        }
    }

    pub fn gauge_ids(&self) -> Vec<GaugeId> {
        self.internal_gauge_info
            .gauge_records
            .iter()
            .map(|r| r.gauge_id)
            .collect()
    }

    pub fn total_weight(&self) -> Balance {
        self.internal_gauge_info.total_weight
    }

    /// Sets `total_weight` to the sum of the records' current weights.
    pub fn recompute_total_weight(&mut self) -> Result<(), IncentivesError> {
        let total = self
            .internal_gauge_info
            .gauge_records
            .iter()
            .try_fold(0u128, |acc, r| acc.checked_add(r.current_weight))
            .ok_or(IncentivesError::AmountOverflow)?;
        self.internal_gauge_info.total_weight = total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_group_starts_unweighted() {
        let g = Group::new(9, &[3, 4]);
        assert_eq!(g.gauge_ids(), vec![3, 4]);
        assert_eq!(g.total_weight(), 0);
        assert_eq!(g.splitting_policy, SplittingPolicy::ByVolume);
    }

    #[test]
    fn total_weight_is_recomputed_from_records() {
        let mut g = Group::new(9, &[3, 4]);
        g.internal_gauge_info.gauge_records[0].current_weight = 70;
        g.internal_gauge_info.gauge_records[1].current_weight = 30;
        g.recompute_total_weight().unwrap();
        assert_eq!(g.total_weight(), 100);
    }
}
