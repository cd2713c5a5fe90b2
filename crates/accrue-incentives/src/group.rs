use std::collections::BTreeSet;
use std::time::Duration;

use accrue_core::coins::Coins;
use accrue_core::constants::PERPETUAL_NUM_EPOCHS_PAID_OVER;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::{DistributeTo, Gauge, GaugeState};
use accrue_core::group::Group;
use accrue_core::params::Params;
use accrue_core::types::{AccountId, GaugeId, PoolId, Timestamp};
use tracing::{debug, error, info, warn};

use crate::keeper::Keeper;

fn validate_pool_ids(pool_ids: &[PoolId]) -> Result<(), IncentivesError> {
    match pool_ids {
        [] => Err(IncentivesError::NoPoolIdsGiven),
        [only] => Err(IncentivesError::OnePoolIdGroup { pool_id: *only }),
        _ => {
            let unique: BTreeSet<&PoolId> = pool_ids.iter().collect();
            if unique.len() != pool_ids.len() {
                return Err(IncentivesError::DuplicatePoolIds(pool_ids.to_vec()));
            }
            Ok(())
        }
    }
}

/// Splits `payable` across a group's records by current weight. The last
/// record takes whatever the others' floored shares left over.
pub fn split_by_weight(
    payable: &Coins,
    group: &Group,
) -> Result<Vec<(GaugeId, Coins)>, IncentivesError> {
    let total_weight = group.total_weight();
    if total_weight == 0 {
        return Err(IncentivesError::ZeroTotalWeight(group.group_gauge_id));
    }
    let records = &group.internal_gauge_info.gauge_records;
    let mut out = Vec::with_capacity(records.len());
    let mut allocated = Coins::new();
    for (i, record) in records.iter().enumerate() {
        let share = if i + 1 == records.len() {
            payable.checked_sub(&allocated)?
        } else {
            payable.mul_div_floor(record.current_weight, total_weight)?
        };
        allocated.add_assign(&share)?;
        out.push((record.gauge_id, share));
    }
    Ok(out)
}

impl Keeper {
    // ── Creation ──────────────────────────────────────────────────────────────

    /// Creates a group over the internal gauges of `pool_ids`, funded with
    /// `coins` from `owner`. The group is perpetual when
    /// `num_epochs_paid_over` is zero.
    ///
    /// Weights are synced from current pool volumes before anything is
    /// stored, so a group over pools without volume is never created. The
    /// creation fee goes to the community pool unless `owner` is the module
    /// account or whitelisted.
    pub fn create_group(
        &self,
        coins: &Coins,
        num_epochs_paid_over: u64,
        owner: &AccountId,
        pool_ids: &[PoolId],
        now: Timestamp,
    ) -> Result<GaugeId, IncentivesError> {
        self.create_group_inner(coins, num_epochs_paid_over, owner, pool_ids, true, now)
    }

    /// Creates an unfunded group owned by the module account: no fee and no
    /// initial weight sync.
    pub fn create_group_as_module(
        &self,
        num_epochs_paid_over: u64,
        pool_ids: &[PoolId],
        now: Timestamp,
    ) -> Result<GaugeId, IncentivesError> {
        let owner = self.module_account().clone();
        self.create_group_inner(&Coins::new(), num_epochs_paid_over, &owner, pool_ids, false, now)
    }

    fn create_group_inner(
        &self,
        coins: &Coins,
        num_epochs_paid_over: u64,
        owner: &AccountId,
        pool_ids: &[PoolId],
        sync: bool,
        now: Timestamp,
    ) -> Result<GaugeId, IncentivesError> {
        validate_pool_ids(pool_ids)?;
        let params = self.params()?;

        let mut gauge_ids = Vec::with_capacity(pool_ids.len());
        for &pool_id in pool_ids {
            let gauge_id = self.pools.internal_gauge_for_pool(pool_id)?;
            self.gauge(gauge_id)?;
            gauge_ids.push(gauge_id);
        }

        let id = self.next_gauge_id()?;
        let gauge = Gauge {
            id,
            is_perpetual: num_epochs_paid_over == PERPETUAL_NUM_EPOCHS_PAID_OVER,
            distribute_to: DistributeTo::ByGroup,
            coins: coins.clone(),
            start_time: now,
            num_epochs_paid_over,
            filled_epochs: 0,
            distributed_coins: Coins::new(),
        };
        let mut group = Group::new(id, &gauge_ids);
        if sync {
            if let Some(synced) = self.compute_group_weights(&group)? {
                group = synced;
            }
        }

        if !coins.is_empty() {
            self.bank.move_to_module(owner, coins)?;
        }
        if let Err(e) = self.charge_group_creation_fee(&params, owner) {
            if !coins.is_empty() {
                self.bank.move_from_module(owner, coins)?;
            }
            return Err(e);
        }

        self.store.insert_group_pair(&gauge, &group, GaugeState::Upcoming)?;
        self.store.set_last_gauge_id(id)?;
        self.hooks.after_create_gauge(id);

        info!(
            group_gauge_id = id,
            pools = ?pool_ids,
            gauges = ?gauge_ids,
            coins = %coins,
            epochs = num_epochs_paid_over,
            total_weight = group.total_weight(),
            "group created"
        );
        Ok(id)
    }

    fn charge_group_creation_fee(&self, params: &Params, owner: &AccountId) -> Result<(), IncentivesError> {
        if owner == self.module_account() || params.is_whitelisted(owner) {
            debug!(%owner, "group creation fee waived");
            return Ok(());
        }
        if params.group_creation_fee.is_empty() {
            return Ok(());
        }
        self.bank.send(owner, &params.community_pool, &params.group_creation_fee)?;
        debug!(%owner, fee = %params.group_creation_fee, "group creation fee charged");
        Ok(())
    }

    // ── Weight sync ───────────────────────────────────────────────────────────

    /// Pool and lockable duration a group record's gauge is bound to.
    ///
    /// "No lock" gauges are bound for the epoch duration, lock gauges for the
    /// longest lockable duration. Other gauge types cannot be group members.
    pub fn pool_and_duration_for_record(
        &self,
        gauge_id: GaugeId,
    ) -> Result<(PoolId, Duration), IncentivesError> {
        let gauge = self.gauge(gauge_id)?;
        let duration = match gauge.distribute_to {
            DistributeTo::NoLock { .. } => self.epoch_info()?.duration,
            DistributeTo::ByDuration { .. } => self.pools.longest_lockable_duration()?,
            other => return Err(IncentivesError::InvalidGaugeType(other.query_type().into())),
        };
        let pool_id = self.pools.pool_for_gauge(gauge_id, duration)?;
        Ok((pool_id, duration))
    }

    /// Recomputes weights from cumulative pool volumes without storing them.
    ///
    /// `Ok(None)` when no pool saw new volume since the last sync; the group
    /// keeps its previous weights. Any failing record fails the whole sync.
    pub fn compute_group_weights(&self, group: &Group) -> Result<Option<Group>, IncentivesError> {
        let records = &group.internal_gauge_info.gauge_records;
        let mut volumes = Vec::with_capacity(records.len());
        for record in records {
            let (pool_id, _) = self.pool_and_duration_for_record(record.gauge_id)?;
            let volume = self
                .pools
                .cumulative_volume(pool_id)?
                .filter(|v| *v > 0)
                .ok_or(IncentivesError::NoPoolVolume(pool_id))?;
            if volume < record.cumulative_weight {
                return Err(IncentivesError::CumulativeVolumeDecreased {
                    pool_id,
                    gauge_id: record.gauge_id,
                    stored: record.cumulative_weight,
                    reported: volume,
                });
            }
            volumes.push(volume);
        }

        if records.iter().zip(&volumes).all(|(r, v)| r.cumulative_weight == *v) {
            return Ok(None);
        }

        let mut updated = group.clone();
        for (record, volume) in updated
            .internal_gauge_info
            .gauge_records
            .iter_mut()
            .zip(volumes)
        {
            record.current_weight = volume - record.cumulative_weight;
            record.cumulative_weight = volume;
        }
        updated.recompute_total_weight()?;
        Ok(Some(updated))
    }

    /// Syncs a group's weights to current pool volumes and stores the result.
    /// A failed sync leaves the stored group untouched.
    pub fn sync_group_weights(&self, group: &Group) -> Result<(), IncentivesError> {
        match self.compute_group_weights(group)? {
            Some(updated) => {
                self.store.put_group(&updated)?;
                debug!(
                    group_gauge_id = group.group_gauge_id,
                    total_weight = updated.total_weight(),
                    "group weights synced"
                );
            }
            None => {
                debug!(group_gauge_id = group.group_gauge_id, "no new volume, weights kept");
            }
        }
        Ok(())
    }

    // ── Allocation ────────────────────────────────────────────────────────────

    /// Funds the internal gauges of every active group with one epoch of the
    /// group gauge, split by volume weight. Returns the total allocated.
    ///
    /// A group whose sync fails is skipped and reported through the hooks;
    /// other groups still run. Groups on their last epoch sweep any leftover
    /// to the community pool and are pruned together with their gauge.
    pub fn allocate_across_gauges(&self, now: Timestamp) -> Result<Coins, IncentivesError> {
        let params = self.params()?;
        let mut total = Coins::new();

        for group in self.store.groups()? {
            let group_id = group.group_gauge_id;
            let mut gauge = self
                .store
                .get_gauge(group_id)?
                .ok_or(IncentivesError::UnpairedGroup { group_id })?;
            if !gauge.is_active(now)
                || !self.store.has_ref(GaugeState::Active, gauge.start_time, group_id)
            {
                continue;
            }

            if let Err(e) = self.sync_group_weights(&group) {
                if e.is_invariant_violation() {
                    error!(group_gauge_id = group_id, error = %e, "group sync failed");
                } else {
                    warn!(group_gauge_id = group_id, error = %e, "group sync failed");
                }
                self.hooks.on_group_sync_failure(group_id, &e);
                continue;
            }
            let group = self
                .store
                .get_group(group_id)?
                .ok_or(IncentivesError::GroupNotFound(group_id))?;
            if group.total_weight() == 0 {
                debug!(group_gauge_id = group_id, "group has no weight, skipped");
                continue;
            }

            let payable = gauge.coins_per_epoch()?;
            let shares = split_by_weight(&payable, &group)?;
            let mut batch = Vec::with_capacity(shares.len() + 1);
            for (gauge_id, share) in &shares {
                if share.is_empty() {
                    continue;
                }
                let mut internal = self.fundable_gauge(*gauge_id, now)?;
                internal.coins.add_assign(share)?;
                batch.push(internal);
            }
            gauge.record_distribution(&payable)?;
            let funded: Vec<(GaugeId, Coins)> =
                batch.iter().map(|g| (g.id, g.coins.clone())).collect();

            // Nothing is written until every share and the group record are staged.
            if gauge.is_last_distribution_done() {
                self.prune_group(&gauge, &batch, &params)?;
            } else {
                batch.push(gauge);
                self.store.put_gauges(&batch)?;
            }
            for (gauge_id, coins) in &funded {
                self.hooks.after_add_to_gauge(*gauge_id);
                debug!(gauge_id = *gauge_id, total = %coins, "gauge funded");
            }
            total.add_assign(&payable)?;
            debug!(group_gauge_id = group_id, payable = %payable, "group allocated");
        }

        info!(allocated = %total, "group allocation complete");
        Ok(total)
    }

    /// Sweeps the finished group's leftover, writes the funded internal
    /// gauges and drops the group pair.
    fn prune_group(
        &self,
        gauge: &Gauge,
        funded: &[Gauge],
        params: &Params,
    ) -> Result<(), IncentivesError> {
        let leftover = gauge.remaining_coins()?;
        if !leftover.is_empty() {
            self.bank.move_from_module(&params.community_pool, &leftover)?;
        }
        self.store.put_gauges(funded)?;
        self.store.delete_group_pair(gauge, GaugeState::Active)?;
        self.hooks.after_finish_distribution(gauge.id);
        info!(group_gauge_id = gauge.id, swept = %leftover, "finished group pruned");
        Ok(())
    }
}
