use crate::core::currency::CurrencyCode;
use crate::exchange::{ExchangeError, RateStore};
use crate::store::{RateEntry, RateKey};
use chrono::NaiveDate;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

/// Legacy rate store without a historical dimension.
///
/// The counterpart of [`MemoryRateStore`](crate::store::MemoryRateStore):
/// it keys rates by currency pair only. Adding a rate overwrites the
/// pair's previous value regardless of date, and lookups return the
/// single stored rate for any date asked. Each pair remembers the date it
/// was last written so iteration and export still produce the dated wire
/// shape.
///
/// Use it for integrations whose upstream rate source has no history —
/// selected once, at engine construction.
pub struct UndatedRateStore {
    rates: ReentrantMutex<RefCell<BTreeMap<RateKey, (f64, NaiveDate)>>>,
}

impl UndatedRateStore {
    pub fn new() -> Self {
        Self {
            rates: ReentrantMutex::new(RefCell::new(BTreeMap::new())),
        }
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        let guard = self.rates.lock();
        let len = guard.borrow().len();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let guard = self.rates.lock();
        guard.borrow_mut().clear();
    }
}

impl Default for UndatedRateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UndatedRateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndatedRateStore")
            .field("pairs", &self.len())
            .finish()
    }
}

impl RateStore for UndatedRateStore {
    fn add_rate(&self, from: CurrencyCode, to: CurrencyCode, rate: f64, date: NaiveDate) -> f64 {
        let guard = self.rates.lock();
        guard
            .borrow_mut()
            .insert(RateKey::new(from, to), (rate, date));
        rate
    }

    fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode, _date: NaiveDate) -> Option<f64> {
        let guard = self.rates.lock();
        let rate = guard
            .borrow()
            .get(&RateKey::new(from.clone(), to.clone()))
            .map(|(rate, _)| *rate);
        rate
    }

    fn each_rate(&self, visit: &mut dyn FnMut(RateEntry)) {
        let guard = self.rates.lock();
        let entries: Vec<RateEntry> = guard
            .borrow()
            .iter()
            .map(|(key, (rate, date))| RateEntry {
                from: key.from_currency().clone(),
                to: key.to_currency().clone(),
                rate: *rate,
                date: *date,
            })
            .collect();
        for entry in entries {
            visit(entry);
        }
    }

    fn transaction(
        &self,
        body: &mut dyn FnMut() -> Result<(), ExchangeError>,
    ) -> Result<(), ExchangeError> {
        let _guard = self.rates.lock();
        body()
    }
}
