//! Flat input records and grouping keys

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Dimension name that refers to `DatedRecord::category` rather than a map entry
pub const CATEGORY_DIMENSION: &str = "category";

/// A dated amount with a category and free-form dimensions
///
/// Budget lines, cost lines, receivables (date = due date) and cash-flow
/// projections all arrive in this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedRecord {
    pub date: NaiveDate,
    pub amount: Money,
    pub category: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
}

impl DatedRecord {
    pub fn new(date: NaiveDate, amount: Money, category: impl Into<String>) -> Self {
        Self {
            date,
            amount,
            category: category.into(),
            dimensions: BTreeMap::new(),
        }
    }

    /// Builder-style dimension setter
    pub fn with_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(key.into(), value.into());
        self
    }

    /// Value of a dimension, `None` when absent or blank
    ///
    /// Names match case-insensitively, so `--group-by Project` finds a
    /// `project` column.
    pub fn dimension(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        let value = if name.eq_ignore_ascii_case(CATEGORY_DIMENSION) {
            Some(self.category.as_str())
        } else {
            self.dimensions
                .get(name)
                .or_else(|| {
                    self.dimensions
                        .iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(name))
                        .map(|(_, value)| value)
                })
                .map(String::as_str)
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Tuple of dimension values identifying one group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey(pub Vec<String>);

impl GroupKey {
    /// Key used when grouping by no dimensions at all
    pub fn total() -> Self {
        GroupKey(Vec::new())
    }

    pub fn single(value: impl Into<String>) -> Self {
        GroupKey(vec![value.into()])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("total")
        } else {
            f.write_str(&self.0.join(" / "))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for GroupKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        GroupKey(iter.into_iter().map(Into::into).collect())
    }
}
