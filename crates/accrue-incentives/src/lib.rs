pub mod distribute;
pub mod epoch_hooks;
pub mod estimate;
pub mod genesis;
pub mod group;
pub mod hooks;
pub mod interfaces;
pub mod keeper;
pub mod lifecycle;
pub mod memory;
pub mod queries;

#[cfg(test)]
mod testutil;

pub use distribute::DistributionInfo;
pub use epoch_hooks::EpochSummary;
pub use genesis::GenesisState;
pub use hooks::{IncentiveHooks, NoopHooks};
pub use interfaces::{BankKeeper, EpochKeeper, LockKeeper, PoolIncentivesKeeper};
pub use keeper::Keeper;
