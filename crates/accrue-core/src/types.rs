use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Token amount in base units. All amount arithmetic is checked `u128`.
pub type Balance = u128;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Monotonic gauge identifier. The first gauge ever created has id 1.
pub type GaugeId = u64;

/// Identifier of a liquidity pool in the external pool registry.
pub type PoolId = u64;

/// Identifier of a lock in the external lock registry.
pub type LockId = u64;

// ── AccountId ────────────────────────────────────────────────────────────────

/// 32-byte account identifier.
///
/// User accounts come from the host ledger. Module-owned accounts (the
/// incentives escrow, the community pool) are derived deterministically from
/// their module name so every replica agrees on them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Address of the module-owned account named `module`:
    /// BLAKE3(b"module/" ‖ name).
    pub fn module(name: &str) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(b"module/");
        h.update(name.as_bytes());
        Self(*h.finalize().as_bytes())
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, bs58::decode::Error> {
        let bytes = bs58::decode(s).into_vec()?;
        let mut arr = [0u8; 32];
        let n = bytes.len().min(32);
        arr[..n].copy_from_slice(&bytes[..n]);
        Ok(Self(arr))
    }
}

// Human-readable formats (JSON params, genesis files) carry the base-58 form;
// binary formats carry the raw bytes.
impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_b58())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            AccountId::from_b58(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(AccountId)
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.to_b58();
        write!(f, "AccountId({})", &s[..s.len().min(8)])
    }
}
