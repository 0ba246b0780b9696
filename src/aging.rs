//! Receivables aging
//!
//! A receivable's bucket is a pure function of `as_of - due_date` in whole
//! days. Upper bounds are inclusive: day 30 is still `1-30`, day 31 starts
//! `31-60`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregator, DatedRecord, GroupKey};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::money::{Currency, Money, RoundingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    D1To30,
    D31To60,
    D61To90,
    D90Plus,
}

impl AgingBucket {
    /// Buckets in ascending lateness
    pub const ALL: [AgingBucket; 5] = [
        AgingBucket::Current,
        AgingBucket::D1To30,
        AgingBucket::D31To60,
        AgingBucket::D61To90,
        AgingBucket::D90Plus,
    ];

    /// Bucket for a receivable due on `due_date`, seen from `as_of`
    pub fn classify(due_date: NaiveDate, as_of: NaiveDate) -> Self {
        Self::from_days_late(days_late(due_date, as_of))
    }

    pub fn from_days_late(days: i64) -> Self {
        match days {
            i64::MIN..=0 => AgingBucket::Current,
            1..=30 => AgingBucket::D1To30,
            31..=60 => AgingBucket::D31To60,
            61..=90 => AgingBucket::D61To90,
            _ => AgingBucket::D90Plus,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::D1To30 => "1-30",
            AgingBucket::D31To60 => "31-60",
            AgingBucket::D61To90 => "61-90",
            AgingBucket::D90Plus => "90+",
        }
    }

    pub fn is_overdue(&self) -> bool {
        *self != AgingBucket::Current
    }

    fn index(&self) -> usize {
        match self {
            AgingBucket::Current => 0,
            AgingBucket::D1To30 => 1,
            AgingBucket::D31To60 => 2,
            AgingBucket::D61To90 => 3,
            AgingBucket::D90Plus => 4,
        }
    }
}

impl fmt::Display for AgingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whole days between due date and `as_of`; negative when not yet due
pub fn days_late(due_date: NaiveDate, as_of: NaiveDate) -> i64 {
    as_of.signed_duration_since(due_date).num_days()
}

/// Outstanding amounts of one group, split by bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingBreakdown {
    pub key: GroupKey,
    /// One amount per bucket, in `AgingBucket::ALL` order
    pub buckets: [Money; 5],
    pub total: Money,
    /// Everything outside the current bucket
    pub overdue: Money,
    pub receivable_count: usize,
}

impl AgingBreakdown {
    fn empty(key: GroupKey, currency: &Currency) -> Self {
        let zero = Money::zero(currency.clone());
        Self {
            key,
            buckets: [zero.clone(), zero.clone(), zero.clone(), zero.clone(), zero.clone()],
            total: zero.clone(),
            overdue: zero,
            receivable_count: 0,
        }
    }

    pub fn amount(&self, bucket: AgingBucket) -> &Money {
        &self.buckets[bucket.index()]
    }

    fn add(&mut self, bucket: AgingBucket, amount: &Money) -> EngineResult<()> {
        let group = self.key.to_string();
        self.total.ensure_same_currency(amount, &group)?;

        let slot = &mut self.buckets[bucket.index()];
        *slot = slot.checked_add(amount)?;
        self.total = self.total.checked_add(amount)?;
        if bucket.is_overdue() {
            self.overdue = self.overdue.checked_add(amount)?;
        }
        self.receivable_count += 1;
        Ok(())
    }
}

/// Aging of a receivables snapshot, one breakdown per group, sorted by key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub groups: Vec<AgingBreakdown>,
    #[serde(skip)]
    rounding: RoundingPolicy,
}

impl AgingReport {
    pub fn group(&self, key: &GroupKey) -> Option<&AgingBreakdown> {
        self.groups.iter().find(|g| &g.key == key)
    }

    /// Sum of every group; `None` for an empty report
    pub fn totals(&self) -> EngineResult<Option<AgingBreakdown>> {
        let first = match self.groups.first() {
            Some(first) => first,
            None => return Ok(None),
        };
        let mut totals = AgingBreakdown::empty(GroupKey::total(), &first.total.currency);
        for group in &self.groups {
            totals.total.ensure_same_currency(&group.total, "aging totals")?;
            for bucket in AgingBucket::ALL {
                let slot = &mut totals.buckets[bucket.index()];
                *slot = slot.checked_add(group.amount(bucket))?;
            }
            totals.total = totals.total.checked_add(&group.total)?;
            totals.overdue = totals.overdue.checked_add(&group.overdue)?;
            totals.receivable_count += group.receivable_count;
        }
        Ok(Some(totals))
    }

    /// Share of all receivables that is overdue, 0 when nothing is outstanding
    pub fn overdue_percent(&self) -> EngineResult<f64> {
        match self.totals()? {
            Some(t) if !t.total.is_zero() => self.rounding.percent(t.overdue.value, t.total.value),
            _ => Ok(0.0),
        }
    }

    /// Overdue share when every group is in one currency, `None` otherwise
    pub fn overdue_percent_if_single_currency(&self) -> EngineResult<Option<f64>> {
        match self.overdue_percent() {
            Ok(pct) => Ok(Some(pct)),
            Err(EngineError::MixedCurrency { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Classify every receivable (record date = due date) and total per group
///
/// Credit notes and overpayments arrive as negative amounts and net against
/// the bucket of their own date.
pub fn aging_report<S: AsRef<str>>(
    records: &[DatedRecord],
    as_of: NaiveDate,
    group_by: &[S],
    config: &EngineConfig,
) -> EngineResult<AgingReport> {
    let aggregator = Aggregator::from_config(config);
    let mut groups: BTreeMap<GroupKey, AgingBreakdown> = BTreeMap::new();

    for (key, members) in aggregator.group(records, group_by) {
        let currency = match members.first() {
            Some(first) => first.amount.currency.clone(),
            None => continue,
        };
        let mut breakdown = AgingBreakdown::empty(key.clone(), &currency);
        for record in members {
            breakdown.add(AgingBucket::classify(record.date, as_of), &record.amount)?;
        }
        groups.insert(key, breakdown);
    }

    debug!("aging as of {}: {} records in {} groups", as_of, records.len(), groups.len());
    Ok(AgingReport {
        as_of,
        groups: groups.into_values().collect(),
        rounding: config.rounding,
    })
}
