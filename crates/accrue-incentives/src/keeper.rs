use std::sync::Arc;

use accrue_core::constants::INCENTIVES_MODULE_NAME;
use accrue_core::epoch::EpochInfo;
use accrue_core::error::IncentivesError;
use accrue_core::gauge::Gauge;
use accrue_core::params::Params;
use accrue_core::types::{AccountId, GaugeId};
use accrue_state::GaugeStore;
use tracing::info;

use crate::hooks::{IncentiveHooks, NoopHooks};
use crate::interfaces::{BankKeeper, EpochKeeper, LockKeeper, PoolIncentivesKeeper};

// ── Keeper ────────────────────────────────────────────────────────────────────

/// The incentives engine.
///
/// Owns the gauge store and reaches every external registry through the
/// injected collaborators. Operations take the current block time `now`
/// explicitly; the keeper holds no clock of its own.
pub struct Keeper {
    pub store: Arc<GaugeStore>,
    pub(crate) bank: Arc<dyn BankKeeper>,
    pub(crate) locks: Arc<dyn LockKeeper>,
    pub(crate) pools: Arc<dyn PoolIncentivesKeeper>,
    pub(crate) epochs: Arc<dyn EpochKeeper>,
    pub(crate) hooks: Arc<dyn IncentiveHooks>,
    module_account: AccountId,
}

impl Keeper {
    pub fn new(
        store: Arc<GaugeStore>,
        bank: Arc<dyn BankKeeper>,
        locks: Arc<dyn LockKeeper>,
        pools: Arc<dyn PoolIncentivesKeeper>,
        epochs: Arc<dyn EpochKeeper>,
    ) -> Self {
        Self {
            store,
            bank,
            locks,
            pools,
            epochs,
            hooks: Arc::new(NoopHooks),
            module_account: AccountId::module(INCENTIVES_MODULE_NAME),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn IncentiveHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Address of the escrow account holding every gauge's coins.
    pub fn module_account(&self) -> &AccountId {
        &self.module_account
    }

    pub fn params(&self) -> Result<Params, IncentivesError> {
        self.store.params()
    }

    /// Validates and persists new params.
    pub fn set_params(&self, params: &Params) -> Result<(), IncentivesError> {
        params.validate()?;
        self.store.put_params(params)?;
        info!(
            epoch = %params.distr_epoch_identifier,
            lockable_durations = params.lockable_durations.len(),
            "incentive params updated"
        );
        Ok(())
    }

    /// The distribution epoch named in the params.
    pub fn epoch_info(&self) -> Result<EpochInfo, IncentivesError> {
        let params = self.params()?;
        self.epochs.epoch_info(&params.distr_epoch_identifier)
    }

    pub fn gauge(&self, id: GaugeId) -> Result<Gauge, IncentivesError> {
        self.store
            .get_gauge(id)?
            .ok_or(IncentivesError::GaugeNotFound(id))
    }

    pub(crate) fn next_gauge_id(&self) -> Result<GaugeId, IncentivesError> {
        self.store
            .last_gauge_id()?
            .checked_add(1)
            .ok_or(IncentivesError::AmountOverflow)
    }
}
