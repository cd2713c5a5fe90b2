use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coins::Coins;
use crate::error::IncentivesError;
use crate::types::{GaugeId, Timestamp};

// ── DistributeTo ─────────────────────────────────────────────────────────────

/// Which recipients a gauge pays out to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributeTo {
    /// Locks of `denom` whose lock duration is at least `duration`.
    ByDuration { denom: String, duration: Duration },
    /// Locks of `denom` unlocking after `timestamp`. Deprecated; every
    /// operation on such a gauge fails.
    ByTime { denom: String, timestamp: Timestamp },
    /// A pool's incentive mechanism rather than individual locks. `denom` is
    /// the internal or external no-lock marker of the pool; `duration` is the
    /// requested uptime for external gauges.
    NoLock { denom: String, duration: Duration },
    /// A group gauge; funds other gauges instead of recipients.
    ByGroup,
}

impl DistributeTo {
    /// Denom used for the denomination index. Group gauges have none.
    pub fn denom(&self) -> &str {
        match self {
            DistributeTo::ByDuration { denom, .. }
            | DistributeTo::ByTime { denom, .. }
            | DistributeTo::NoLock { denom, .. } => denom,
            DistributeTo::ByGroup => "",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            DistributeTo::ByDuration { duration, .. } | DistributeTo::NoLock { duration, .. } => {
                *duration
            }
            DistributeTo::ByTime { .. } | DistributeTo::ByGroup => Duration::ZERO,
        }
    }

    pub fn query_type(&self) -> &'static str {
        match self {
            DistributeTo::ByDuration { .. } => "ByDuration",
            DistributeTo::ByTime { .. } => "ByTime",
            DistributeTo::NoLock { .. } => "NoLock",
            DistributeTo::ByGroup => "ByGroup",
        }
    }

    pub fn is_lock_based(&self) -> bool {
        matches!(self, DistributeTo::ByDuration { .. } | DistributeTo::ByTime { .. })
    }
}

// ── GaugeState ───────────────────────────────────────────────────────────────

/// Logical lifecycle state, derived from time and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GaugeState {
    Upcoming,
    Active,
    Finished,
}

impl fmt::Display for GaugeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GaugeState::Upcoming => "upcoming",
            GaugeState::Active => "active",
            GaugeState::Finished => "finished",
        };
        write!(f, "{}", s)
    }
}

// ── Gauge ────────────────────────────────────────────────────────────────────

/// A time-bounded reward pool with escrowed coins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gauge {
    pub id: GaugeId,
    pub is_perpetual: bool,
    pub distribute_to: DistributeTo,
    /// Total coins ever escrowed into this gauge.
    pub coins: Coins,
    pub start_time: Timestamp,
    /// Unused (0) for perpetual gauges.
    pub num_epochs_paid_over: u64,
    /// Distribution rounds performed so far.
    pub filled_epochs: u64,
    /// Cumulative amount paid out; entrywise ≤ `coins`.
    pub distributed_coins: Coins,
}

impl Gauge {
    pub fn is_upcoming(&self, now: Timestamp) -> bool {
        now < self.start_time
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        !self.is_upcoming(now)
            && (self.is_perpetual || self.filled_epochs < self.num_epochs_paid_over)
    }

    pub fn is_finished(&self, now: Timestamp) -> bool {
        !self.is_upcoming(now) && !self.is_active(now)
    }

    /// Pure lifecycle classification at `now`.
    pub fn state(&self, now: Timestamp) -> GaugeState {
        if self.is_upcoming(now) {
            GaugeState::Upcoming
        } else if self.is_active(now) {
            GaugeState::Active
        } else {
            GaugeState::Finished
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.distribute_to, DistributeTo::ByGroup)
    }

    /// True once a non-perpetual gauge has paid out over all its epochs.
    pub fn is_last_distribution_done(&self) -> bool {
        !self.is_perpetual && self.filled_epochs >= self.num_epochs_paid_over
    }

    /// `coins - distributed_coins`.
    pub fn remaining_coins(&self) -> Result<Coins, IncentivesError> {
        self.coins.checked_sub(&self.distributed_coins)
    }

    /// Epochs left to pay over: 1 for perpetual gauges. Zero on an active
    /// gauge is an invariant violation.
    pub fn remaining_epochs(&self) -> Result<u64, IncentivesError> {
        let remain = if self.is_perpetual {
            1
        } else {
            self.num_epochs_paid_over.saturating_sub(self.filled_epochs)
        };
        if remain == 0 {
            return Err(IncentivesError::ZeroRemainingEpochs(self.id));
        }
        Ok(remain)
    }

    /// Amount payable this epoch: `floor(remaining / remaining_epochs)`.
    pub fn coins_per_epoch(&self) -> Result<Coins, IncentivesError> {
        let remain = self.remaining_coins()?;
        Ok(remain.quo_floor(self.remaining_epochs()?))
    }

    /// Records one distribution round that realized `distributed`.
    pub fn record_distribution(&mut self, distributed: &Coins) -> Result<(), IncentivesError> {
        let total = self.distributed_coins.checked_add(distributed)?;
        if !total.is_all_lte(&self.coins) {
            return Err(IncentivesError::DistributedExceedsCoins(self.id));
        }
        self.distributed_coins = total;
        self.filled_epochs += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauge(perpetual: bool, epochs: u64, filled: u64) -> Gauge {
        Gauge {
            id: 1,
            is_perpetual: perpetual,
            distribute_to: DistributeTo::ByDuration {
                denom: "lptoken".into(),
                duration: Duration::from_secs(86_400),
            },
            coins: Coins::single("stake", 1_000),
            start_time: 100,
            num_epochs_paid_over: epochs,
            filled_epochs: filled,
            distributed_coins: Coins::new(),
        }
    }

    #[test]
    fn classification_follows_time_and_counters() {
        assert_eq!(gauge(false, 2, 0).state(99), GaugeState::Upcoming);
        assert_eq!(gauge(false, 2, 1).state(100), GaugeState::Active);
        assert_eq!(gauge(false, 2, 2).state(100), GaugeState::Finished);
        assert_eq!(gauge(true, 0, 50).state(100), GaugeState::Active);
    }

    #[test]
    fn zero_remaining_epochs_is_reported() {
        let g = gauge(false, 2, 2);
        assert!(matches!(
            g.remaining_epochs(),
            Err(IncentivesError::ZeroRemainingEpochs(1))
        ));
    }

    #[test]
    fn per_epoch_is_floor_division() {
        let g = gauge(false, 3, 0);
        assert_eq!(g.coins_per_epoch().unwrap().amount_of("stake"), 333);
    }

    #[test]
    fn recording_past_coins_is_rejected() {
        let mut g = gauge(false, 1, 0);
        assert!(g.record_distribution(&Coins::single("stake", 1_001)).is_err());
        assert_eq!(g.filled_epochs, 0);
        g.record_distribution(&Coins::single("stake", 1_000)).unwrap();
        assert_eq!(g.filled_epochs, 1);
    }
}
