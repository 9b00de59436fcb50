use crate::core::currency::{CurrencyCode, UnknownCurrency};
use crate::core::date::{parse_date, DateInput, InvalidDate};
use crate::core::money::Money;
use crate::exchange::{ExchangeEngine, ExchangeError};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Failure constructing a monetary value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error(transparent)]
    Currency(#[from] UnknownCurrency),
    #[error(transparent)]
    Date(#[from] InvalidDate),
}

/// A monetary value with an effective calendar date.
///
/// Wraps the undated [`Money`] core, adds the date, and carries a handle
/// to the [`ExchangeEngine`] it was created through. The engine supplies
/// the default date at construction, performs conversion for
/// [`exchange_to`](Self::exchange_to), and its
/// [`Policy`](crate::core::policy::Policy) decides whether the date
/// participates in equality, hashing and ordering.
///
/// Values are immutable once built; "changing" the date means building a
/// sibling via [`with_date`](Self::with_date).
///
/// Comparing or hashing values whose engines disagree on
/// `date_determines_equality` is unsupported: each value consults its own
/// policy, so keep values that meet in one collection on one policy.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use dated_money::core::dated::DatedMoney;
/// use dated_money::exchange::ExchangeEngine;
///
/// let engine = Arc::new(ExchangeEngine::new());
/// let a = DatedMoney::on(2000, "USD", "2024-01-01", &engine).unwrap();
/// let b = DatedMoney::on(2000, "USD", "2024-06-30", &engine).unwrap();
/// // Dates do not affect equality under the default policy.
/// assert_eq!(a, b);
/// ```
#[derive(Clone)]
pub struct DatedMoney {
    core: Money,
    date: NaiveDate,
    engine: Arc<ExchangeEngine>,
}

impl DatedMoney {
    /// Build a value dated by the engine policy's default-date provider,
    /// evaluated now.
    pub fn new(
        fractional: i64,
        currency: &str,
        engine: &Arc<ExchangeEngine>,
    ) -> Result<Self, MoneyError> {
        let currency = CurrencyCode::parse(currency)?;
        let date = engine.policy().default_date().resolve();
        Ok(Self {
            core: Money::new(fractional, currency),
            date,
            engine: Arc::clone(engine),
        })
    }

    /// Build a value with an explicit effective date.
    pub fn on(
        fractional: i64,
        currency: &str,
        date: impl Into<DateInput>,
        engine: &Arc<ExchangeEngine>,
    ) -> Result<Self, MoneyError> {
        let currency = CurrencyCode::parse(currency)?;
        let date = parse_date(date)?;
        Ok(Self {
            core: Money::new(fractional, currency),
            date,
            engine: Arc::clone(engine),
        })
    }

    /// Wrap an existing undated core with a date.
    pub fn from_money(
        money: Money,
        date: impl Into<DateInput>,
        engine: &Arc<ExchangeEngine>,
    ) -> Result<Self, InvalidDate> {
        Ok(Self {
            core: money,
            date: parse_date(date)?,
            engine: Arc::clone(engine),
        })
    }

    pub fn fractional(&self) -> i64 {
        self.core.fractional()
    }

    pub fn currency(&self) -> &CurrencyCode {
        self.core.currency()
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The undated value core.
    pub fn money(&self) -> &Money {
        &self.core
    }

    pub fn engine(&self) -> &Arc<ExchangeEngine> {
        &self.engine
    }

    pub fn is_zero(&self) -> bool {
        self.core.is_zero()
    }

    /// The same value on another date. Returns `self` untouched when the
    /// date is unchanged.
    pub fn with_date(self, date: impl Into<DateInput>) -> Result<Self, InvalidDate> {
        let date = parse_date(date)?;
        if date == self.date {
            Ok(self)
        } else {
            Ok(Self { date, ..self })
        }
    }

    /// Clone-with-overrides: a sibling value with a new amount and
    /// currency, keeping this value's date and engine. Conversion results
    /// are produced through here so they preserve the value's shape.
    pub fn dup_with(&self, fractional: i64, currency: CurrencyCode) -> Self {
        Self {
            core: Money::new(fractional, currency),
            date: self.date,
            engine: Arc::clone(&self.engine),
        }
    }

    /// Convert into `currency` using this value's engine and the rate
    /// effective on this value's own date.
    pub fn exchange_to(&self, currency: &str) -> Result<Self, ExchangeError> {
        self.engine.convert(self, currency)
    }
}

impl PartialEq for DatedMoney {
    fn eq(&self, other: &Self) -> bool {
        // Zero equals zero whatever the currency, date or policy.
        if self.is_zero() && other.is_zero() {
            return true;
        }
        if self.engine.policy().date_determines_equality() {
            self.fractional() == other.fractional()
                && self.currency() == other.currency()
                && self.date == other.date
        } else {
            self.core == other.core
        }
    }
}

impl Eq for DatedMoney {}

impl Hash for DatedMoney {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fractional().hash(state);
        if !self.is_zero() {
            self.currency().hash(state);
            if self.engine.policy().date_determines_equality() {
                self.date.hash(state);
            }
        }
    }
}

impl PartialOrd for DatedMoney {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_zero() || other.is_zero() {
            return Some(self.fractional().cmp(&other.fractional()));
        }
        // Convert the other operand into this currency; its own date
        // drives the rate lookup. Both currencies are already valid, so
        // the only reachable failure is a missing rate, which makes the
        // pair unordered.
        let converted = match other.exchange_to(self.currency().as_str()) {
            Ok(converted) => converted,
            Err(_) => return None,
        };
        if self.engine.policy().date_determines_equality() {
            Some((self.fractional(), self.date).cmp(&(converted.fractional(), converted.date)))
        } else {
            Some(self.fractional().cmp(&converted.fractional()))
        }
    }
}

/// Zero-sentinel comparison: a value compares against the integer zero by
/// sign alone; any other integer is unordered.
impl PartialEq<i64> for DatedMoney {
    fn eq(&self, other: &i64) -> bool {
        *other == 0 && self.is_zero()
    }
}

impl PartialEq<DatedMoney> for i64 {
    fn eq(&self, other: &DatedMoney) -> bool {
        other == self
    }
}

impl PartialOrd<i64> for DatedMoney {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        if *other != 0 {
            return None;
        }
        Some(self.fractional().cmp(&0))
    }
}

impl PartialOrd<DatedMoney> for i64 {
    fn partial_cmp(&self, other: &DatedMoney) -> Option<Ordering> {
        other.partial_cmp(self).map(Ordering::reverse)
    }
}

impl fmt::Debug for DatedMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatedMoney")
            .field("fractional", &self.fractional())
            .field("currency", &self.currency().as_str())
            .field("date", &self.date)
            .finish()
    }
}

impl fmt::Display for DatedMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.core, f)
    }
}
