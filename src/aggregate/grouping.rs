//! Group-by and sum over `DatedRecord` snapshots

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use log::{debug, warn};

use super::record::{DatedRecord, GroupKey};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::money::Money;
use crate::period::PeriodRange;

/// Group value used when a record has no value for a grouped dimension
pub const DEFAULT_UNASSIGNED_LABEL: &str = "unassigned";

/// Sums record amounts per group key
///
/// Records missing a grouped dimension are kept under the unassigned label.
/// Each group must be single-currency. Output maps have no defined order.
#[derive(Debug, Clone)]
pub struct Aggregator {
    unassigned_label: String,
}

impl Aggregator {
    pub fn new(unassigned_label: impl Into<String>) -> Self {
        Self {
            unassigned_label: unassigned_label.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.unassigned_label.clone())
    }

    pub fn unassigned_label(&self) -> &str {
        &self.unassigned_label
    }

    /// Group key of one record; the flag is true if any dimension fell back
    pub fn key_for<S: AsRef<str>>(&self, record: &DatedRecord, group_by: &[S]) -> (GroupKey, bool) {
        let mut fell_back = false;
        let parts = group_by
            .iter()
            .map(|dim| match record.dimension(dim.as_ref()) {
                Some(value) => value.to_string(),
                None => {
                    fell_back = true;
                    self.unassigned_label.clone()
                }
            })
            .collect();
        (GroupKey(parts), fell_back)
    }

    /// Partition records by key without reducing them
    pub fn group<'a, S: AsRef<str>>(
        &self,
        records: &'a [DatedRecord],
        group_by: &[S],
    ) -> HashMap<GroupKey, Vec<&'a DatedRecord>> {
        let mut groups: HashMap<GroupKey, Vec<&'a DatedRecord>> = HashMap::new();
        let mut unassigned = 0usize;
        for record in records {
            let (key, fell_back) = self.key_for(record, group_by);
            if fell_back {
                unassigned += 1;
            }
            groups.entry(key).or_default().push(record);
        }
        self.log_unassigned(unassigned, group_by);
        groups
    }

    /// Sum amounts per group key
    pub fn aggregate<S: AsRef<str>>(
        &self,
        records: &[DatedRecord],
        group_by: &[S],
    ) -> EngineResult<HashMap<GroupKey, Money>> {
        let mut totals: HashMap<GroupKey, Money> = HashMap::new();
        let mut unassigned = 0usize;

        for record in records {
            let (key, fell_back) = self.key_for(record, group_by);
            if fell_back {
                unassigned += 1;
            }
            match totals.entry(key) {
                Entry::Occupied(mut entry) => {
                    let group = entry.key().to_string();
                    entry.get().ensure_same_currency(&record.amount, &group)?;
                    let total = entry.get_mut();
                    total.value = total
                        .value
                        .checked_add(record.amount.value)
                        .ok_or(EngineError::ArithmeticOverflow("aggregation"))?;
                }
                Entry::Vacant(entry) => {
                    entry.insert(record.amount.clone());
                }
            }
        }

        self.log_unassigned(unassigned, group_by);
        debug!("aggregated {} records into {} groups", records.len(), totals.len());
        Ok(totals)
    }

    /// Aggregate only the records dated inside `range`
    pub fn aggregate_in_period<S: AsRef<str>>(
        &self,
        records: &[DatedRecord],
        range: &PeriodRange,
        group_by: &[S],
    ) -> EngineResult<HashMap<GroupKey, Money>> {
        self.aggregate(&filter_period(records, range), group_by)
    }

    /// Totals per calendar month, keyed by the first day of the month
    ///
    /// All records must share one currency.
    pub fn monthly_totals(&self, records: &[DatedRecord]) -> EngineResult<BTreeMap<NaiveDate, Money>> {
        let mut totals: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        let first = match records.first() {
            Some(first) => first,
            None => return Ok(totals),
        };

        for record in records {
            first.amount.ensure_same_currency(&record.amount, "monthly totals")?;
            let month = NaiveDate::from_ymd_opt(record.date.year(), record.date.month(), 1)
                .ok_or_else(|| EngineError::invalid_input("date", record.date.to_string()))?;
            let total = totals
                .entry(month)
                .or_insert_with(|| Money::zero(record.amount.currency.clone()));
            total.value = total
                .value
                .checked_add(record.amount.value)
                .ok_or(EngineError::ArithmeticOverflow("monthly totals"))?;
        }
        Ok(totals)
    }

    fn log_unassigned<S: AsRef<str>>(&self, count: usize, group_by: &[S]) {
        if count > 0 {
            let dims: Vec<&str> = group_by.iter().map(AsRef::as_ref).collect();
            warn!(
                "{} record(s) missing a value for [{}], grouped under {:?}",
                count,
                dims.join(", "),
                self.unassigned_label
            );
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_UNASSIGNED_LABEL)
    }
}

/// Records whose date falls inside the inclusive range
pub fn filter_period(records: &[DatedRecord], range: &PeriodRange) -> Vec<DatedRecord> {
    records
        .iter()
        .filter(|r| range.contains(r.date))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(d: NaiveDate, value: Decimal, currency: &str, category: &str) -> DatedRecord {
        DatedRecord::new(d, Money::new(value, Currency::new(currency).unwrap()), category)
    }

    fn sample() -> Vec<DatedRecord> {
        vec![
            rec(date(2024, 1, 5), dec!(100), "USD", "travel").with_dimension("project", "apollo"),
            rec(date(2024, 1, 20), dec!(50.25), "USD", "travel").with_dimension("project", "gemini"),
            rec(date(2024, 2, 2), dec!(300), "USD", "software").with_dimension("project", "apollo"),
            rec(date(2024, 2, 9), dec!(19.75), "USD", "travel"),
        ]
    }

    #[test]
    fn test_group_by_category() {
        let totals = Aggregator::default().aggregate(&sample(), &["category"]).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&GroupKey::single("travel")].value, dec!(170.00));
        assert_eq!(totals[&GroupKey::single("software")].value, dec!(300));
    }

    #[test]
    fn test_missing_dimension_goes_to_unassigned() {
        let records = sample();
        let totals = Aggregator::default().aggregate(&records, &["category", "project"]).unwrap();

        let unassigned: GroupKey = ["travel", "unassigned"].into_iter().collect();
        assert_eq!(totals[&unassigned].value, dec!(19.75));

        // Nothing is dropped from the grand total
        let grand: Decimal = totals.values().map(|m| m.value).sum();
        let input: Decimal = records.iter().map(|r| r.amount.value).sum();
        assert_eq!(grand, input);
    }

    #[test]
    fn test_custom_unassigned_label() {
        let aggregator = Aggregator::new("(none)");
        assert_eq!(aggregator.unassigned_label(), "(none)");
        let totals = aggregator.aggregate(&sample(), &["project"]).unwrap();
        assert_eq!(totals[&GroupKey::single("(none)")].value, dec!(19.75));
    }

    #[test]
    fn test_group_by_name_ignores_case() {
        let totals = Aggregator::default().aggregate(&sample(), &["Project"]).unwrap();
        assert_eq!(totals[&GroupKey::single("apollo")].value, dec!(400));
        assert_eq!(totals[&GroupKey::single("unassigned")].value, dec!(19.75));
    }

    #[test]
    fn test_aggregation_overflow() {
        let records = vec![
            rec(date(2024, 1, 1), Decimal::MAX, "USD", "travel"),
            rec(date(2024, 1, 2), Decimal::MAX, "USD", "travel"),
        ];
        let err = Aggregator::default().aggregate(&records, &["category"]).unwrap_err();
        assert!(matches!(err, EngineError::ArithmeticOverflow("aggregation")));
    }

    #[test]
    fn test_empty_group_by_is_grand_total() {
        let totals = Aggregator::default().aggregate(&sample(), &[] as &[&str]).unwrap();
        assert_eq!(totals[&GroupKey::total()].value, dec!(470.00));
    }

    #[test]
    fn test_mixed_currency_in_group_fails() {
        let mut records = sample();
        records.push(rec(date(2024, 3, 1), dec!(5), "EUR", "software"));
        let err = Aggregator::default().aggregate(&records, &["category"]).unwrap_err();
        match err {
            EngineError::MixedCurrency { group, expected, found } => {
                assert_eq!(group, "software");
                assert_eq!(expected, "USD");
                assert_eq!(found, "EUR");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_currencies_may_differ_between_groups() {
        let records = vec![
            rec(date(2024, 1, 1), dec!(1), "USD", "us-office"),
            rec(date(2024, 1, 1), dec!(2), "EUR", "eu-office"),
        ];
        let totals = Aggregator::default().aggregate(&records, &["category"]).unwrap();
        assert_eq!(totals[&GroupKey::single("eu-office")].currency.as_str(), "EUR");
    }

    #[test]
    fn test_aggregate_in_period() {
        let january = PeriodRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        let totals = Aggregator::default()
            .aggregate_in_period(&sample(), &january, &["category"])
            .unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[&GroupKey::single("travel")].value, dec!(150.25));
    }

    #[test]
    fn test_monthly_totals_sorted() {
        let totals = Aggregator::default().monthly_totals(&sample()).unwrap();
        let months: Vec<NaiveDate> = totals.keys().copied().collect();
        assert_eq!(months, vec![date(2024, 1, 1), date(2024, 2, 1)]);
        assert_eq!(totals[&date(2024, 2, 1)].value, dec!(319.75));
    }

    #[test]
    fn test_group_keeps_records() {
        let records = sample();
        let groups = Aggregator::default().group(&records, &["project"]);
        assert_eq!(groups[&GroupKey::single("apollo")].len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let records = sample();
        let agg = Aggregator::default();
        let first = agg.aggregate(&records, &["category", "project"]).unwrap();
        let second = agg.aggregate(&records, &["category", "project"]).unwrap();
        assert_eq!(first, second);
    }
}
