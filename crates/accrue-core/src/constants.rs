// ─── Accrue incentives constants ────────────────────────────────────────────
use std::time::Duration;

// ── Module accounts ──────────────────────────────────────────────────────────

/// Name of the module account that escrows every gauge's coins.
pub const INCENTIVES_MODULE_NAME: &str = "incentives";

/// Name of the module account that receives fees and rounding dust.
pub const COMMUNITY_POOL_MODULE_NAME: &str = "distribution";

// ── Gauges ───────────────────────────────────────────────────────────────────

/// `num_epochs_paid_over` value marking a perpetual group gauge.
pub const PERPETUAL_NUM_EPOCHS_PAID_OVER: u64 = 0;

/// Default distribution epoch identifier.
pub const DEFAULT_DISTR_EPOCH_IDENTIFIER: &str = "week";

/// Default single-denom amount below which a lock gauge's payout is skipped
/// as spam.
pub const DEFAULT_MIN_VALUE_FOR_DISTRIBUTION: u128 = 100;

// ── Denom markers ────────────────────────────────────────────────────────────

/// Prefix of the denom recorded on internal (pool-owned) "no lock" gauges.
pub const NO_LOCK_INTERNAL_PREFIX: &str = "no-lock/i/";

/// Prefix of the denom recorded on external (user-funded) "no lock" gauges.
pub const NO_LOCK_EXTERNAL_PREFIX: &str = "no-lock/e/";

/// Markers present in the derived denom of synthetic locks.
pub const SYNTHETIC_DENOM_MARKERS: [&str; 2] = ["/superbonding", "/superunbonding"];

// ── Uptimes ──────────────────────────────────────────────────────────────────

/// Uptime used for incentive schedules when the configured one is unusable.
pub const DEFAULT_UPTIME: Duration = Duration::from_nanos(1);

/// Uptimes the pool incentive mechanism understands.
pub const SUPPORTED_UPTIMES: [Duration; 6] = [
    Duration::from_nanos(1),
    Duration::from_secs(60),
    Duration::from_secs(3_600),
    Duration::from_secs(86_400),
    Duration::from_secs(7 * 86_400),
    Duration::from_secs(14 * 86_400),
];

/// Internal gauge denom for `pool_id`.
pub fn no_lock_internal_denom(pool_id: u64) -> String {
    format!("{}{}", NO_LOCK_INTERNAL_PREFIX, pool_id)
}

/// External gauge denom for `pool_id`.
pub fn no_lock_external_denom(pool_id: u64) -> String {
    format!("{}{}", NO_LOCK_EXTERNAL_PREFIX, pool_id)
}

/// True if `denom` names a synthetic lock.
pub fn is_synthetic_denom(denom: &str) -> bool {
    SYNTHETIC_DENOM_MARKERS.iter().any(|m| denom.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_denoms_are_detected() {
        assert!(is_synthetic_denom("gamm/pool/1/superbonding/val1"));
        assert!(is_synthetic_denom("gamm/pool/1/superunbonding/val1"));
        assert!(!is_synthetic_denom("gamm/pool/1"));
    }

    #[test]
    fn no_lock_denoms_differ_by_ownership() {
        assert_eq!(no_lock_internal_denom(7), "no-lock/i/7");
        assert_eq!(no_lock_external_denom(7), "no-lock/e/7");
    }
}
