use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coins::Coins;
use crate::error::IncentivesError;
use crate::types::{AccountId, Balance, LockId};

/// A stake lock as reported by the lock registry. Read-only to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub id: LockId,
    pub owner: AccountId,
    pub coins: Coins,
    pub duration: Duration,
    /// Payout address; `None` pays the owner.
    pub reward_receiver: Option<AccountId>,
}

impl Lock {
    pub fn new(id: LockId, owner: AccountId, coins: Coins, duration: Duration) -> Self {
        Self { id, owner, coins, duration, reward_receiver: None }
    }

    pub fn with_reward_receiver(mut self, receiver: AccountId) -> Self {
        self.reward_receiver = Some(receiver);
        self
    }

    pub fn reward_receiver_or_owner(&self) -> &AccountId {
        self.reward_receiver.as_ref().unwrap_or(&self.owner)
    }

    pub fn amount_of(&self, denom: &str) -> Balance {
        self.coins.amount_of(denom)
    }
}

/// Total amount of `denom` held across `locks`.
pub fn sum_locks_by_denom(locks: &[Lock], denom: &str) -> Result<Balance, IncentivesError> {
    locks.iter().try_fold(0u128, |acc, l| {
        acc.checked_add(l.amount_of(denom))
            .ok_or(IncentivesError::AmountOverflow)
    })
}
