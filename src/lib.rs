//! # dated-money
//!
//! Date-aware monetary values with historical exchange-rate lookup and
//! conversion.
//!
//! Every monetary value carries an effective calendar date; exchange rates
//! are indexed by date and directional currency pair, and conversion uses
//! the rate effective on the value's own date — exact-date only, with no
//! fallback to nearby dates or reciprocal pairs. Whether the date also
//! participates in equality, hashing and ordering is decided by the
//! [`Policy`](core::policy::Policy) injected into the engine a value is
//! created through.
//!
//! ## Architecture
//!
//! - **core** — Value types: currency codes, calendar dates, policy, the
//!   undated money core and the dated value built on it
//! - **exchange** — The conversion engine, its rate-store capability
//!   interface, and the JSON/YAML/binary wire codec
//! - **store** — The two store implementations: date-aware and legacy
//!   undated
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use dated_money::prelude::*;
//!
//! let engine = Arc::new(ExchangeEngine::new());
//! engine.add_rate("USD", "EUR", 1.33, "2024-01-01").unwrap();
//!
//! let usd = DatedMoney::on(100, "USD", "2024-01-01", &engine).unwrap();
//! let eur = usd.exchange_to("EUR").unwrap();
//! assert_eq!(eur.fractional(), 133);
//!
//! // The same value dated one day later has no rate: conversion fails,
//! // comparison is unordered.
//! let next_day = usd.with_date("2024-01-02").unwrap();
//! assert!(next_day.exchange_to("EUR").is_err());
//! assert_eq!(next_day.partial_cmp(&eur), None);
//! ```

pub mod core;
pub mod exchange;
pub mod store;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::currency::CurrencyCode;
    pub use crate::core::date::{resolve_effective_date, DateInput, DateProvider};
    pub use crate::core::dated::DatedMoney;
    pub use crate::core::money::Money;
    pub use crate::core::policy::Policy;
    pub use crate::exchange::{ExchangeEngine, ExchangeError, Format, RateStore};
    pub use crate::store::{MemoryRateStore, UndatedRateStore};
}
