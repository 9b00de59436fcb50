use chrono::{DateTime, Local, NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Raised when an input cannot be interpreted as a calendar date.
///
/// Construction-time and fatal: a monetary value never carries an
/// unresolved or missing date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{input:?} cannot be interpreted as a calendar date")]
pub struct InvalidDate {
    pub input: String,
}

/// An input that can be turned into a calendar date.
///
/// Accepted forms:
/// - a [`NaiveDate`], taken as-is;
/// - a UTC timestamp, truncated to its day;
/// - a string: ISO `YYYY-MM-DD`, or an RFC 3339 timestamp truncated to
///   its day.
#[derive(Debug, Clone)]
pub enum DateInput {
    Day(NaiveDate),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl From<NaiveDate> for DateInput {
    fn from(date: NaiveDate) -> Self {
        Self::Day(date)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Interpret an input as a calendar date.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use dated_money::core::date::parse_date;
///
/// let day = parse_date("2024-01-01").unwrap();
/// assert_eq!(day, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
/// assert!(parse_date("not a date").is_err());
/// ```
pub fn parse_date(input: impl Into<DateInput>) -> Result<NaiveDate, InvalidDate> {
    match input.into() {
        DateInput::Day(date) => Ok(date),
        DateInput::Timestamp(ts) => Ok(ts.date_naive()),
        DateInput::Text(text) => {
            let trimmed = text.trim();
            if let Ok(date) = trimmed.parse::<NaiveDate>() {
                return Ok(date);
            }
            if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(ts.date_naive());
            }
            Err(InvalidDate { input: text })
        }
    }
}

/// Source of the default effective date for values constructed without an
/// explicit one. Evaluated at construction time, not at configuration time.
#[derive(Clone)]
pub enum DateProvider {
    /// The current local calendar day.
    Today,
    /// A fixed date.
    Fixed(NaiveDate),
    /// A caller-supplied zero-argument provider.
    Dynamic(Arc<dyn Fn() -> NaiveDate + Send + Sync>),
}

impl DateProvider {
    pub fn from_fn(f: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    /// Produce the date this provider currently stands for.
    pub fn resolve(&self) -> NaiveDate {
        match self {
            Self::Today => Local::now().date_naive(),
            Self::Fixed(date) => *date,
            Self::Dynamic(f) => f(),
        }
    }
}

impl Default for DateProvider {
    fn default() -> Self {
        Self::Today
    }
}

impl fmt::Debug for DateProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => f.write_str("DateProvider::Today"),
            Self::Fixed(date) => write!(f, "DateProvider::Fixed({date})"),
            Self::Dynamic(_) => f.write_str("DateProvider::Dynamic(..)"),
        }
    }
}

/// Resolve the effective date of a monetary value.
///
/// This is the single contract external integration code (ORM field
/// bindings and the like) consumes: an explicit input wins and must be a
/// valid date; absence falls back to the provider.
pub fn resolve_effective_date(
    explicit: Option<DateInput>,
    fallback: &DateProvider,
) -> Result<NaiveDate, InvalidDate> {
    match explicit {
        Some(input) => parse_date(input),
        None => Ok(fallback.resolve()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_naive_date_passthrough() {
        let date = day(2024, 3, 15);
        assert_eq!(parse_date(date).unwrap(), date);
    }

    #[test]
    fn test_parse_timestamp_truncates_to_day() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap();
        assert_eq!(parse_date(ts).unwrap(), day(2024, 3, 15));
    }

    #[test]
    fn test_parse_iso_string() {
        assert_eq!(parse_date("2024-01-01").unwrap(), day(2024, 1, 1));
        assert_eq!(parse_date(" 2024-01-01 ").unwrap(), day(2024, 1, 1));
    }

    #[test]
    fn test_parse_rfc3339_string_truncates() {
        assert_eq!(
            parse_date("2024-01-01T18:30:00+02:00").unwrap(),
            day(2024, 1, 1)
        );
    }

    #[test]
    fn test_unparseable_input_is_fatal() {
        let err = parse_date("first of never").unwrap_err();
        assert!(err.to_string().contains("first of never"));
        assert!(parse_date("2024-13-45").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_provider_fixed() {
        let provider = DateProvider::Fixed(day(2020, 6, 1));
        assert_eq!(provider.resolve(), day(2020, 6, 1));
    }

    #[test]
    fn test_provider_dynamic_evaluated_per_call() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let provider = DateProvider::from_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            day(2024, 1, 1 + n)
        });
        assert_eq!(provider.resolve(), day(2024, 1, 1));
        assert_eq!(provider.resolve(), day(2024, 1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_provider_today_matches_local_day() {
        let today = Local::now().date_naive();
        assert_eq!(DateProvider::Today.resolve(), today);
    }

    #[test]
    fn test_resolve_effective_date_explicit_wins() {
        let fallback = DateProvider::Fixed(day(2000, 1, 1));
        let resolved = resolve_effective_date(Some("2024-02-29".into()), &fallback).unwrap();
        assert_eq!(resolved, day(2024, 2, 29));
    }

    #[test]
    fn test_resolve_effective_date_falls_back() {
        let fallback = DateProvider::Fixed(day(2000, 1, 1));
        assert_eq!(
            resolve_effective_date(None, &fallback).unwrap(),
            day(2000, 1, 1)
        );
    }

    #[test]
    fn test_resolve_effective_date_invalid_explicit_fails() {
        let fallback = DateProvider::Fixed(day(2000, 1, 1));
        assert!(resolve_effective_date(Some("garbage".into()), &fallback).is_err());
    }
}
