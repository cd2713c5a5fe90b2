use std::time::Duration;

use thiserror::Error;

use crate::types::{Balance, GaugeId, PoolId, Timestamp};

#[derive(Debug, Error)]
pub enum IncentivesError {
    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("invalid duration: {0:?} is not a lockable duration")]
    InvalidDuration(Duration),

    #[error("unsupported lock query type: {0}")]
    UnsupportedLockQueryType(String),

    #[error("'no lock' gauges must have a pool id")]
    NoLockGaugeWithoutPool,

    #[error("'no lock' external gauges must have an empty denom, got {0}")]
    NoLockExternalDenomSet(String),

    #[error("pool id must be 0 for gauges with lock, got {0}")]
    PoolIdOnLockGauge(PoolId),

    #[error("non-perpetual gauges must pay over at least one epoch")]
    ZeroEpochsPaidOver,

    #[error("invalid denom: {0:?}")]
    InvalidDenom(String),

    #[error("no pool ids given for group")]
    NoPoolIdsGiven,

    #[error("group must contain more than one pool, got only pool {pool_id}")]
    OnePoolIdGroup { pool_id: PoolId },

    #[error("group pool ids must be unique, got {0:?}")]
    DuplicatePoolIds(Vec<PoolId>),

    #[error("invalid gauge type: {0}")]
    InvalidGaugeType(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    // ── Invariant violations ─────────────────────────────────────────────────
    #[error(
        "cumulative volume decreased for pool {pool_id} (gauge {gauge_id}): \
         stored {stored}, reported {reported}"
    )]
    CumulativeVolumeDecreased {
        pool_id: PoolId,
        gauge_id: GaugeId,
        stored: Balance,
        reported: Balance,
    },

    #[error("gauge {0} has zero remaining epochs but is still active")]
    ZeroRemainingEpochs(GaugeId),

    #[error("gauge {gauge_id} cannot start distribution before {start_time} (now {now})")]
    GaugeNotStarted {
        gauge_id: GaugeId,
        start_time: Timestamp,
        now: Timestamp,
    },

    #[error("gauge {0} is already finished")]
    GaugeFinished(GaugeId),

    #[error("gauge {0} would distribute more than it holds")]
    DistributedExceedsCoins(GaugeId),

    #[error("group {0} has zero total weight")]
    ZeroTotalWeight(GaugeId),

    #[error("group {group_id} is not paired with a gauge of the same id")]
    UnpairedGroup { group_id: GaugeId },

    // ── Resource errors ──────────────────────────────────────────────────────
    #[error("insufficient funds: need {need}{denom}, have {have}{denom}")]
    InsufficientFunds {
        denom: String,
        need: Balance,
        have: Balance,
    },

    #[error("coin subtraction underflow for {denom}: {minuend} - {subtrahend}")]
    CoinsUnderflow {
        denom: String,
        minuend: Balance,
        subtrahend: Balance,
    },

    #[error("amount overflow")]
    AmountOverflow,

    // ── Lookup errors ────────────────────────────────────────────────────────
    #[error("gauge with id {0} does not exist")]
    GaugeNotFound(GaugeId),

    #[error("group with gauge id {0} does not exist")]
    GroupNotFound(GaugeId),

    #[error("no pool linked to gauge {gauge_id} for duration {duration:?}")]
    NoPoolForGauge { gauge_id: GaugeId, duration: Duration },

    #[error("no internal gauge for pool {0}")]
    NoInternalGauge(PoolId),

    #[error("no pool volume for pool {0}")]
    NoPoolVolume(PoolId),

    #[error("no lockable durations configured")]
    NoLockableDurations,

    #[error("epoch info not found for identifier {0:?}")]
    EpochNotFound(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl IncentivesError {
    /// True for errors that signal corrupted external state rather than bad
    /// input. These are never swallowed by the distribution paths.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            IncentivesError::CumulativeVolumeDecreased { .. }
                | IncentivesError::ZeroRemainingEpochs(_)
                | IncentivesError::DistributedExceedsCoins(_)
                | IncentivesError::UnpairedGroup { .. }
        )
    }
}
