//! Denomination-keyed token multisets.
//!
//! `Coins` keeps its entries sorted by denom and never stores a zero amount,
//! so two `Coins` with equal contents always compare and serialize equal.

use std::collections::BTreeMap;
use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::IncentivesError;
use crate::types::Balance;

/// A single (denom, amount) pair.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Balance,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Balance) -> Self {
        Self { denom: denom.into(), amount }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coins(BTreeMap<String, Balance>);

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_coins<I: IntoIterator<Item = Coin>>(coins: I) -> Result<Self, IncentivesError> {
        let mut out = Self::new();
        for c in coins {
            out.add_coin(&c)?;
        }
        Ok(out)
    }

    /// Single-denom constructor; a zero amount yields empty coins.
    pub fn single(denom: impl Into<String>, amount: Balance) -> Self {
        let mut map = BTreeMap::new();
        if amount > 0 {
            map.insert(denom.into(), amount);
        }
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct denoms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn amount_of(&self, denom: &str) -> Balance {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates `(denom, amount)` in denom order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Balance)> {
        self.0.iter().map(|(d, a)| (d.as_str(), *a))
    }

    pub fn to_vec(&self) -> Vec<Coin> {
        self.iter().map(|(d, a)| Coin::new(d, a)).collect()
    }

    pub fn add_coin(&mut self, coin: &Coin) -> Result<(), IncentivesError> {
        if coin.amount == 0 {
            return Ok(());
        }
        let slot = self.0.entry(coin.denom.clone()).or_insert(0);
        *slot = slot
            .checked_add(coin.amount)
            .ok_or(IncentivesError::AmountOverflow)?;
        Ok(())
    }

    /// In-place entrywise addition.
    pub fn add_assign(&mut self, other: &Coins) -> Result<(), IncentivesError> {
        for (denom, amount) in other.iter() {
            self.add_coin(&Coin::new(denom, amount))?;
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins, IncentivesError> {
        let mut out = self.clone();
        out.add_assign(other)?;
        Ok(out)
    }

    /// Entrywise subtraction. Fails if any entry of `other` exceeds `self`.
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins, IncentivesError> {
        let mut out = self.0.clone();
        for (denom, amount) in other.iter() {
            let have = out.get(denom).copied().unwrap_or(0);
            let rest = have
                .checked_sub(amount)
                .ok_or_else(|| IncentivesError::CoinsUnderflow {
                    denom: denom.to_string(),
                    minuend: have,
                    subtrahend: amount,
                })?;
            if rest == 0 {
                out.remove(denom);
            } else {
                out.insert(denom.to_string(), rest);
            }
        }
        Ok(Coins(out))
    }

    /// Floor-divides every entry by `divisor`, dropping entries that reach zero.
    pub fn quo_floor(&self, divisor: u64) -> Coins {
        if divisor == 0 {
            return Coins::new();
        }
        let d = Balance::from(divisor);
        Coins(
            self.0
                .iter()
                .filter_map(|(denom, amount)| {
                    let q = amount / d;
                    (q > 0).then(|| (denom.clone(), q))
                })
                .collect(),
        )
    }

    /// `floor(self[d] * numerator / denominator)` for every denom.
    pub fn mul_div_floor(
        &self,
        numerator: Balance,
        denominator: Balance,
    ) -> Result<Coins, IncentivesError> {
        if denominator == 0 {
            return Ok(Coins::new());
        }
        let mut out = BTreeMap::new();
        for (denom, amount) in self.iter() {
            let q = mul_div_floor(amount, numerator, denominator)?;
            if q > 0 {
                out.insert(denom.to_string(), q);
            }
        }
        Ok(Coins(out))
    }

    /// True if every entry of `self` is ≤ the matching entry of `other`.
    pub fn is_all_lte(&self, other: &Coins) -> bool {
        self.iter().all(|(d, a)| a <= other.amount_of(d))
    }
}

/// `floor(a * b / c)`. The product is taken in 256 bits, so only a quotient
/// that does not fit in `Balance` is an overflow.
pub fn mul_div_floor(a: Balance, b: Balance, c: Balance) -> Result<Balance, IncentivesError> {
    if c == 0 {
        return Ok(0);
    }
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(IncentivesError::AmountOverflow)?;
    let quotient = product / U256::from(c);
    if quotient > U256::from(Balance::MAX) {
        return Err(IncentivesError::AmountOverflow);
    }
    Ok(quotient.low_u128())
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, a)| format!("{}{}", a, d)).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl From<Coin> for Coins {
    fn from(c: Coin) -> Self {
        Coins::single(c.denom, c.amount)
    }
}
