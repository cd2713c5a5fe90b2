use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coins::Coins;
use crate::constants::{
    COMMUNITY_POOL_MODULE_NAME, DEFAULT_DISTR_EPOCH_IDENTIFIER,
    DEFAULT_MIN_VALUE_FOR_DISTRIBUTION, DEFAULT_UPTIME, SUPPORTED_UPTIMES,
};
use crate::error::IncentivesError;
use crate::types::{AccountId, Balance};

/// Module parameters. Loaded from JSON by the host, validated, then persisted
/// in the gauge store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Epoch whose end triggers distribution.
    pub distr_epoch_identifier: String,
    /// Durations a `ByDuration` gauge may target.
    pub lockable_durations: Vec<Duration>,
    /// Charged to group creators outside the whitelist.
    pub group_creation_fee: Coins,
    /// Accounts exempt from the group creation fee.
    pub unrestricted_creator_whitelist: Vec<AccountId>,
    /// Uptime used when funding pools from internal gauges.
    pub internal_uptime: Duration,
    /// Uptimes external gauges may request.
    pub authorized_uptimes: Vec<Duration>,
    /// Single-denom amounts below this are not paid out.
    pub min_value_for_distribution: Balance,
    /// Receives creation fees and group dust.
    pub community_pool: AccountId,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            distr_epoch_identifier: DEFAULT_DISTR_EPOCH_IDENTIFIER.to_string(),
            lockable_durations: vec![
                Duration::from_secs(86_400),
                Duration::from_secs(7 * 86_400),
                Duration::from_secs(14 * 86_400),
            ],
            group_creation_fee: Coins::single("stake", 100_000),
            unrestricted_creator_whitelist: Vec::new(),
            internal_uptime: DEFAULT_UPTIME,
            authorized_uptimes: vec![DEFAULT_UPTIME],
            min_value_for_distribution: DEFAULT_MIN_VALUE_FOR_DISTRIBUTION,
            community_pool: AccountId::module(COMMUNITY_POOL_MODULE_NAME),
        }
    }
}

impl Params {
    /// Parse from JSON and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, IncentivesError> {
        let params: Params = serde_json::from_str(json)
            .map_err(|e| IncentivesError::InvalidParams(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), IncentivesError> {
        if self.distr_epoch_identifier.trim().is_empty() {
            return Err(IncentivesError::InvalidParams(
                "distribution epoch identifier is empty".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for d in &self.lockable_durations {
            if d.is_zero() {
                return Err(IncentivesError::InvalidParams(
                    "lockable durations must be positive".into(),
                ));
            }
            if !seen.insert(*d) {
                return Err(IncentivesError::InvalidParams(format!(
                    "duplicate lockable duration {:?}",
                    d
                )));
            }
        }
        for u in &self.authorized_uptimes {
            if !SUPPORTED_UPTIMES.contains(u) {
                return Err(IncentivesError::InvalidParams(format!(
                    "unsupported authorized uptime {:?}",
                    u
                )));
            }
        }
        for (denom, _) in self.group_creation_fee.iter() {
            if denom.trim().is_empty() {
                return Err(IncentivesError::InvalidParams(
                    "group creation fee has an empty denom".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_lockable_duration(&self, d: Duration) -> bool {
        self.lockable_durations.contains(&d)
    }

    pub fn is_whitelisted(&self, account: &AccountId) -> bool {
        self.unrestricted_creator_whitelist.contains(account)
    }

    /// `requested` if the pool mechanism supports it and it is authorized,
    /// otherwise the default uptime.
    pub fn effective_uptime(&self, requested: Duration) -> Duration {
        if requested.is_zero()
            || !SUPPORTED_UPTIMES.contains(&requested)
            || !self.authorized_uptimes.contains(&requested)
        {
            DEFAULT_UPTIME
        } else {
            requested
        }
    }
}
