use crate::core::date::DateProvider;

/// Configuration governing date-aware value semantics.
///
/// The policy is injected into an [`ExchangeEngine`](crate::exchange::ExchangeEngine)
/// at construction and is immutable afterwards; values built through that
/// engine share it. Changing a policy means building an engine with a
/// different one, which keeps concurrent and multi-tenant use
/// deterministic.
///
/// # Examples
///
/// ```
/// use dated_money::core::policy::Policy;
///
/// let policy = Policy::new().with_date_equality(true);
/// assert!(policy.date_determines_equality());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Policy {
    date_determines_equality: bool,
    default_date: DateProvider,
    default_date_column: Option<String>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the effective date participates in equality, hashing and
    /// ordering. Defaults to `false`.
    pub fn with_date_equality(mut self, enabled: bool) -> Self {
        self.date_determines_equality = enabled;
        self
    }

    /// The default-date source for values constructed without an explicit
    /// date. Defaults to [`DateProvider::Today`].
    pub fn with_default_date(mut self, provider: DateProvider) -> Self {
        self.default_date = provider;
        self
    }

    /// Name of the collaborator-supplied field holding a value's date.
    /// Advisory only: consumed by external persistence integrations via
    /// [`resolve_effective_date`](crate::core::date::resolve_effective_date),
    /// never read by the core itself.
    pub fn with_default_date_column(mut self, column: impl Into<String>) -> Self {
        self.default_date_column = Some(column.into());
        self
    }

    pub fn date_determines_equality(&self) -> bool {
        self.date_determines_equality
    }

    pub fn default_date(&self) -> &DateProvider {
        &self.default_date
    }

    pub fn default_date_column(&self) -> Option<&str> {
        self.default_date_column.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_defaults() {
        let policy = Policy::new();
        assert!(!policy.date_determines_equality());
        assert!(policy.default_date_column().is_none());
        assert!(matches!(policy.default_date(), DateProvider::Today));
    }

    #[test]
    fn test_builder_chain() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let policy = Policy::new()
            .with_date_equality(true)
            .with_default_date(DateProvider::Fixed(day))
            .with_default_date_column("booked_on");
        assert!(policy.date_determines_equality());
        assert_eq!(policy.default_date().resolve(), day);
        assert_eq!(policy.default_date_column(), Some("booked_on"));
    }
}
