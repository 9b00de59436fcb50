use crate::core::currency::CurrencyCode;
use crate::exchange::{ExchangeError, RateStore};
use crate::store::{RateEntry, RateKey};
use chrono::NaiveDate;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

type RateMap = BTreeMap<NaiveDate, BTreeMap<RateKey, f64>>;

/// Date-aware in-memory rate table.
///
/// Rates are indexed by calendar date, then by directional currency pair;
/// at most one rate exists per `(date, pair)` and a later add overwrites
/// it. Lookups are exact-date only.
///
/// All state sits behind one reentrant lock, so `transaction` bodies may
/// call back into the store (or open nested transactions) without
/// deadlocking. Map borrows are scoped to a single operation and never
/// held across a callback.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use dated_money::core::currency::CurrencyCode;
/// use dated_money::exchange::RateStore;
/// use dated_money::store::MemoryRateStore;
///
/// let store = MemoryRateStore::new();
/// let usd = CurrencyCode::parse("USD").unwrap();
/// let eur = CurrencyCode::parse("EUR").unwrap();
/// let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
///
/// store.add_rate(usd.clone(), eur.clone(), 1.33, day);
/// assert_eq!(store.get_rate(&usd, &eur, day), Some(1.33));
/// assert_eq!(store.get_rate(&eur, &usd, day), None);
/// ```
pub struct MemoryRateStore {
    rates: ReentrantMutex<RefCell<RateMap>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self {
            rates: ReentrantMutex::new(RefCell::new(RateMap::new())),
        }
    }

    /// Number of stored `(date, pair)` entries.
    pub fn len(&self) -> usize {
        let guard = self.rates.lock();
        let len = guard.borrow().values().map(BTreeMap::len).sum();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored rate.
    pub fn clear(&self) {
        let guard = self.rates.lock();
        guard.borrow_mut().clear();
    }
}

impl Default for MemoryRateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryRateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRateStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl RateStore for MemoryRateStore {
    fn add_rate(&self, from: CurrencyCode, to: CurrencyCode, rate: f64, date: NaiveDate) -> f64 {
        let guard = self.rates.lock();
        guard
            .borrow_mut()
            .entry(date)
            .or_default()
            .insert(RateKey::new(from, to), rate);
        rate
    }

    fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode, date: NaiveDate) -> Option<f64> {
        let guard = self.rates.lock();
        let rate = guard
            .borrow()
            .get(&date)
            .and_then(|pairs| pairs.get(&RateKey::new(from.clone(), to.clone())))
            .copied();
        rate
    }

    fn each_rate(&self, visit: &mut dyn FnMut(RateEntry)) {
        let guard = self.rates.lock();
        // Snapshot before visiting so the callback may touch the store.
        let entries: Vec<RateEntry> = guard
            .borrow()
            .iter()
            .flat_map(|(date, pairs)| {
                pairs.iter().map(move |(key, rate)| RateEntry {
                    from: key.from_currency().clone(),
                    to: key.to_currency().clone(),
                    rate: *rate,
                    date: *date,
                })
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn currency(code: &str) -> CurrencyCode {
        CurrencyCode::parse(code).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_add_then_get_returns_exactly_stored() {
        let store = MemoryRateStore::new();
        store.add_rate(currency("USD"), currency("EUR"), 1.33, day(2024, 1, 1));
        assert_eq!(
            store.get_rate(&currency("USD"), &currency("EUR"), day(2024, 1, 1)),
            Some(1.33)
        );
    }

    #[test]
    fn test_overwrite_keeps_only_newest() {
        let store = MemoryRateStore::new();
        store.add_rate(currency("USD"), currency("EUR"), 1.33, day(2024, 1, 1));
        store.add_rate(currency("USD"), currency("EUR"), 1.41, day(2024, 1, 1));
        assert_eq!(
            store.get_rate(&currency("USD"), &currency("EUR"), day(2024, 1, 1)),
            Some(1.41)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_exact_date_lookup_only() {
        let store = MemoryRateStore::new();
        store.add_rate(currency("USD"), currency("EUR"), 1.33, day(2024, 1, 1));
        assert_eq!(
            store.get_rate(&currency("USD"), &currency("EUR"), day(2024, 1, 2)),
            None
        );
        assert_eq!(
            store.get_rate(&currency("EUR"), &currency("USD"), day(2024, 1, 1)),
            None
        );
    }

    #[test]
    fn test_each_rate_visits_everything_and_restarts() {
        let store = MemoryRateStore::new();
        store.add_rate(currency("USD"), currency("EUR"), 1.33, day(2024, 1, 1));
        store.add_rate(currency("EUR"), currency("USD"), 0.75, day(2024, 1, 1));
        store.add_rate(currency("USD"), currency("JPY"), 151.4, day(2024, 1, 2));

        let mut seen = Vec::new();
        store.each_rate(&mut |entry| seen.push(entry));
        assert_eq!(seen.len(), 3);

        // A fresh call produces a fresh traversal.
        let mut again = Vec::new();
        store.each_rate(&mut |entry| again.push(entry));
        assert_eq!(seen, again);
    }

    #[test]
    fn test_each_rate_callback_may_reenter_store() {
        let store = MemoryRateStore::new();
        store.add_rate(currency("USD"), currency("EUR"), 1.33, day(2024, 1, 1));
        store.each_rate(&mut |entry| {
            // Reading (and even writing) from inside the visit callback
            // must not deadlock or panic.
            assert_eq!(store.get_rate(&entry.from, &entry.to, entry.date), Some(entry.rate));
            store.add_rate(entry.to.clone(), entry.from.clone(), 1.0 / entry.rate, entry.date);
        });
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_transaction_is_reentrant() {
        let store = MemoryRateStore::new();
        let result = store.transaction(&mut || {
            store.add_rate(currency("USD"), currency("EUR"), 1.33, day(2024, 1, 1));
            store.transaction(&mut || {
                assert_eq!(
                    store.get_rate(&currency("USD"), &currency("EUR"), day(2024, 1, 1)),
                    Some(1.33)
                );
                Ok(())
            })
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_transaction_releases_lock_on_error() {
        let store = MemoryRateStore::new();
        let usd = currency("USD");
        let eur = currency("EUR");
        let failed: Result<(), ExchangeError> = store.transaction(&mut || {
            store.add_rate(usd.clone(), eur.clone(), 1.33, day(2024, 1, 1));
            Err(ExchangeError::UnknownRate {
                from: usd.clone(),
                to: eur.clone(),
                date: day(2024, 1, 1),
            })
        });
        assert!(failed.is_err());
        // Lock is free again and the pre-error write is still there.
        assert_eq!(store.get_rate(&usd, &eur, day(2024, 1, 1)), Some(1.33));
    }

    #[test]
    fn test_transaction_releases_lock_on_panic() {
        let store = Arc::new(MemoryRateStore::new());
        let poisoned = Arc::clone(&store);
        let result = std::thread::spawn(move || {
            poisoned.transaction(&mut || panic!("boom"))
        })
        .join();
        assert!(result.is_err());
        // The lock was released by the unwinding thread.
        store.add_rate(currency("USD"), currency("EUR"), 1.33, day(2024, 1, 1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() {
        let store = Arc::new(MemoryRateStore::new());
        let mut handles = Vec::new();
        for i in 0..8u32 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let date = day(2024, 1, 1 + i);
                store.add_rate(currency("USD"), currency("EUR"), 1.0 + f64::from(i), date);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
