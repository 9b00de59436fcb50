//! Rate storage.
//!
//! Two implementations of the [`RateStore`](crate::exchange::RateStore)
//! capability sit here: [`MemoryRateStore`] indexes rates by calendar date
//! and directional currency pair; [`UndatedRateStore`] is the legacy shape
//! whose lookups ignore dates. Both guard their state with a single
//! reentrant lock so transaction bodies can nest store calls freely.

pub mod memory;
pub mod undated;

pub use memory::MemoryRateStore;
pub use undated::UndatedRateStore;

use crate::core::currency::CurrencyCode;
use chrono::NaiveDate;
use std::fmt;

/// Directional currency pair indexing a conversion rate.
///
/// `(USD, EUR)` and `(EUR, USD)` are distinct keys; neither is ever
/// derived from the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateKey {
    from: CurrencyCode,
    to: CurrencyCode,
}

impl RateKey {
    pub fn new(from: CurrencyCode, to: CurrencyCode) -> Self {
        Self { from, to }
    }

    pub fn from_currency(&self) -> &CurrencyCode {
        &self.from
    }

    pub fn to_currency(&self) -> &CurrencyCode {
        &self.to
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// One stored rate, as yielded by
/// [`RateStore::each_rate`](crate::exchange::RateStore::each_rate).
#[derive(Debug, Clone, PartialEq)]
pub struct RateEntry {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: f64,
    pub date: NaiveDate,
}
