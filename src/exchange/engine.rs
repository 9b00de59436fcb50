use crate::core::currency::{CurrencyCode, UnknownCurrency};
use crate::core::date::{parse_date, DateInput, InvalidDate};
use crate::core::dated::DatedMoney;
use crate::core::policy::Policy;
use crate::exchange::codec::{
    self, pair_key, split_pair_key, CodecError, Format, RateSheet, UnsupportedFormat,
};
use crate::store::{MemoryRateStore, RateEntry};
use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Failure of an exchange operation.
///
/// `UnknownRate` is the one recoverable case: conversion surfaces it as an
/// error and ordering treats it as "unordered". Everything else is fatal
/// to the operation that raised it.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    UnknownCurrency(#[from] UnknownCurrency),
    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),
    #[error("no conversion rate known for {from} -> {to} on {date}")]
    UnknownRate {
        from: CurrencyCode,
        to: CurrencyCode,
        date: NaiveDate,
    },
    #[error("rate for {from} -> {to} must be positive and finite, got {rate}")]
    InvalidRate {
        from: CurrencyCode,
        to: CurrencyCode,
        rate: f64,
    },
    #[error("malformed rate key {key:?}: expected \"<FROM>_TO_<TO>\"")]
    InvalidRateKey { key: String },
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("converted amount {amount} does not fit in minor units")]
    AmountOverflow { amount: Decimal },
    #[error("failed to write exported rates: {0}")]
    Io(#[from] io::Error),
}

/// Date-indexed rate storage consumed by [`ExchangeEngine`].
///
/// This is the capability boundary between the engine and its store.
/// Exactly two implementations exist — [`MemoryRateStore`] (date-aware)
/// and [`UndatedRateStore`](crate::store::UndatedRateStore) (legacy,
/// date-agnostic) — and the choice is made once, at engine construction.
///
/// Implementations guard all state with a single reentrant lock: every
/// method may be called from inside a [`transaction`](RateStore::transaction)
/// body without deadlocking, and the lock is released on every exit path,
/// panics included.
pub trait RateStore: Send + Sync {
    /// Store (or silently overwrite) the rate for `(date, from → to)`.
    /// Returns the stored rate.
    fn add_rate(&self, from: CurrencyCode, to: CurrencyCode, rate: f64, date: NaiveDate) -> f64;

    /// Exact-match lookup. No nearest-date fallback, no reciprocal
    /// derivation: a missing entry is `None` even if the opposite
    /// direction or an adjacent date is present.
    fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode, date: NaiveDate) -> Option<f64>;

    /// Visit every stored entry once. Each call is a fresh traversal.
    /// Visiting order is deterministic but an implementation artifact;
    /// treat it as unordered.
    fn each_rate(&self, visit: &mut dyn FnMut(RateEntry));

    /// Run `body` while holding the store's lock once.
    fn transaction(
        &self,
        body: &mut dyn FnMut() -> Result<(), ExchangeError>,
    ) -> Result<(), ExchangeError>;
}

/// Rounding applied to the raw product of a conversion.
#[derive(Clone, Default)]
pub enum Rounding {
    /// Round half away from zero (half-up for positive amounts).
    #[default]
    HalfUp,
    /// Caller-supplied rounding. Expected to return an integral value;
    /// any remaining fraction is truncated when narrowing to minor units.
    Custom(Arc<dyn Fn(Decimal) -> Decimal + Send + Sync>),
}

impl Rounding {
    pub fn from_fn(f: impl Fn(Decimal) -> Decimal + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    fn apply(&self, amount: Decimal) -> Decimal {
        match self {
            Self::HalfUp => amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            Self::Custom(f) => f(amount),
        }
    }
}

impl fmt::Debug for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfUp => f.write_str("Rounding::HalfUp"),
            Self::Custom(_) => f.write_str("Rounding::Custom(..)"),
        }
    }
}

/// Date-sensitive currency conversion over a [`RateStore`].
///
/// The engine is the stringly-typed surface of the crate: it normalizes
/// currency codes and dates before anything reaches the store, converts
/// monetary values using the rate effective on the value's own date, and
/// moves whole rate sheets in and out through the wire codec.
///
/// Engines are shared behind `Arc`; every [`DatedMoney`] holds one and
/// reads its [`Policy`] from it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use dated_money::core::dated::DatedMoney;
/// use dated_money::exchange::ExchangeEngine;
///
/// let engine = Arc::new(ExchangeEngine::new());
/// engine.add_rate("USD", "EUR", 1.33, "2024-01-01").unwrap();
///
/// let usd = DatedMoney::on(100, "USD", "2024-01-01", &engine).unwrap();
/// let eur = usd.exchange_to("EUR").unwrap();
/// assert_eq!(eur.fractional(), 133);
/// assert_eq!(eur.currency().as_str(), "EUR");
/// ```
pub struct ExchangeEngine {
    store: Arc<dyn RateStore>,
    policy: Policy,
    rounding: Rounding,
}

impl ExchangeEngine {
    /// Engine over a fresh date-aware in-memory store, default policy,
    /// half-up rounding.
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryRateStore::new()),
            policy: Policy::new(),
            rounding: Rounding::HalfUp,
        }
    }

    /// Select the store implementation (date-aware or legacy undated).
    pub fn with_store(mut self, store: Arc<dyn RateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the default half-up rounding. The closure receives the raw
    /// product `fractional × rate` and is applied to every conversion this
    /// engine performs.
    pub fn with_rounding(mut self, f: impl Fn(Decimal) -> Decimal + Send + Sync + 'static) -> Self {
        self.rounding = Rounding::from_fn(f);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn RateStore> {
        &self.store
    }

    /// Normalize and store a rate. Returns the stored rate.
    pub fn add_rate(
        &self,
        from: &str,
        to: &str,
        rate: f64,
        date: impl Into<DateInput>,
    ) -> Result<f64, ExchangeError> {
        let date = parse_date(date)?;
        self.add_rate_normalized(from, to, rate, date)
    }

    /// Exact-match rate lookup after normalization.
    pub fn get_rate(
        &self,
        from: &str,
        to: &str,
        date: impl Into<DateInput>,
    ) -> Result<Option<f64>, ExchangeError> {
        let from = CurrencyCode::parse(from)?;
        let to = CurrencyCode::parse(to)?;
        let date = parse_date(date)?;
        Ok(self.store.get_rate(&from, &to, date))
    }

    /// Convert `money` into `to`, using the rate effective on the value's
    /// own date.
    ///
    /// Converting into the value's own currency returns it unchanged. A
    /// missing rate is [`ExchangeError::UnknownRate`], naming both
    /// currencies and the exact date.
    pub fn convert(&self, money: &DatedMoney, to: &str) -> Result<DatedMoney, ExchangeError> {
        let to = CurrencyCode::parse(to)?;
        self.convert_normalized(money, to)
    }

    pub(crate) fn convert_normalized(
        &self,
        money: &DatedMoney,
        to: CurrencyCode,
    ) -> Result<DatedMoney, ExchangeError> {
        if &to == money.currency() {
            return Ok(money.clone());
        }
        let date = money.date();
        let rate = self
            .store
            .get_rate(money.currency(), &to, date)
            .ok_or_else(|| ExchangeError::UnknownRate {
                from: money.currency().clone(),
                to: to.clone(),
                date,
            })?;
        let factor =
            Decimal::from_f64_retain(rate).ok_or_else(|| ExchangeError::InvalidRate {
                from: money.currency().clone(),
                to: to.clone(),
                rate,
            })?;
        let rounded = self.rounding.apply(Decimal::from(money.fractional()) * factor);
        let fractional = rounded
            .to_i64()
            .ok_or(ExchangeError::AmountOverflow { amount: rounded })?;
        Ok(money.dup_with(fractional, to))
    }

    /// Decode `payload` and merge every entry into the store.
    ///
    /// The payload is parsed fully before anything is written, so a parse
    /// failure mutates nothing. Applying the parsed entries runs inside
    /// one store transaction; a failure partway through (unknown currency,
    /// malformed key, bad date) aborts the rest but leaves the entries
    /// already applied in place.
    pub fn import_rates(&self, format: Format, payload: &[u8]) -> Result<&Self, ExchangeError> {
        if format == Format::Binary {
            warn!(
                "importing rates from the binary format; it is not safe for \
                 attacker-controlled payloads, prefer json or yaml"
            );
        }
        let sheet = codec::decode(format, payload)?;
        self.store.transaction(&mut || {
            for (date_key, pair_rates) in &sheet {
                let date = parse_date(date_key.as_str())?;
                for (key, rate) in pair_rates {
                    let (from, to) = split_pair_key(key).ok_or_else(|| {
                        ExchangeError::InvalidRateKey { key: key.clone() }
                    })?;
                    self.add_rate_normalized(from, to, *rate, date)?;
                }
            }
            Ok(())
        })?;
        debug!("imported {} dated rate groups ({format})", sheet.len());
        Ok(self)
    }

    /// Encode the whole table in `format`.
    pub fn export_rates(&self, format: Format) -> Result<Vec<u8>, ExchangeError> {
        let sheet = self.rates()?;
        Ok(codec::encode(format, &sheet)?)
    }

    /// Encode the whole table and write it to `destination`.
    pub fn export_rates_to(
        &self,
        format: Format,
        destination: &mut dyn io::Write,
    ) -> Result<(), ExchangeError> {
        let bytes = self.export_rates(format)?;
        destination.write_all(&bytes)?;
        Ok(())
    }

    /// Snapshot of the table in wire shape, read under one lock
    /// acquisition.
    pub fn rates(&self) -> Result<RateSheet, ExchangeError> {
        let mut sheet = RateSheet::new();
        self.store.transaction(&mut || {
            self.store.each_rate(&mut |entry| {
                sheet
                    .entry(entry.date.to_string())
                    .or_default()
                    .insert(pair_key(&entry.from, &entry.to), entry.rate);
            });
            Ok(())
        })?;
        Ok(sheet)
    }

    fn add_rate_normalized(
        &self,
        from: &str,
        to: &str,
        rate: f64,
        date: NaiveDate,
    ) -> Result<f64, ExchangeError> {
        let from = CurrencyCode::parse(from)?;
        let to = CurrencyCode::parse(to)?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ExchangeError::InvalidRate { from, to, rate });
        }
        debug!("rate {from} -> {to} = {rate} on {date}");
        Ok(self.store.add_rate(from, to, rate, date))
    }
}

impl Default for ExchangeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExchangeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeEngine")
            .field("policy", &self.policy)
            .field("rounding", &self.rounding)
            .finish_non_exhaustive()
    }
}
