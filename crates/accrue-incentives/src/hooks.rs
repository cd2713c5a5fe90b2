use accrue_core::coins::Coins;
use accrue_core::error::IncentivesError;
use accrue_core::types::{AccountId, GaugeId};

/// Observability callbacks fired by the engine. Every method defaults to a
/// no-op, so implementors override only what they listen for.
pub trait IncentiveHooks {
    fn after_create_gauge(&self, _gauge_id: GaugeId) {}

    fn after_add_to_gauge(&self, _gauge_id: GaugeId) {}

    fn after_finish_distribution(&self, _gauge_id: GaugeId) {}

    fn after_epoch_distribution(&self) {}

    /// One call per receiver of a batched payout.
    fn on_distribution(&self, _receiver: &AccountId, _amount: &Coins) {}

    /// A group was skipped because its weights could not be synced.
    fn on_group_sync_failure(&self, _group_gauge_id: GaugeId, _error: &IncentivesError) {}
}

/// Hooks that ignore every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl IncentiveHooks for NoopHooks {}
