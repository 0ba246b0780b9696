//! Baseline-vs-actual variance and budget-vs-actual reporting

use std::collections::BTreeSet;

use log::debug;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregator, DatedRecord, GroupKey};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::money::{Money, RoundingPolicy};

/// Default half-width of the "within expectation" band, in percentage points
pub const DEFAULT_VARIANCE_THRESHOLD: Decimal = dec!(5);

/// Outcome of comparing an actual amount with its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceResult {
    pub baseline: Money,
    pub actual: Money,
    /// `actual - baseline`, exact
    pub variance_amount: Money,
    /// `variance_amount / baseline * 100`, or 0 when the baseline is zero
    pub variance_percent: f64,
}

/// Display classification of a variance percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceBand {
    WithinExpectation,
    OverBudget,
    UnderBudget,
}

impl VarianceBand {
    pub fn label(&self) -> &'static str {
        match self {
            VarianceBand::WithinExpectation => "within expectation",
            VarianceBand::OverBudget => "over budget",
            VarianceBand::UnderBudget => "under budget",
        }
    }
}

/// Band configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarianceThresholds {
    /// `|variance_percent|` strictly below this is within expectation
    pub within_expectation_percent: Decimal,
}

impl Default for VarianceThresholds {
    fn default() -> Self {
        Self {
            within_expectation_percent: DEFAULT_VARIANCE_THRESHOLD,
        }
    }
}

impl VarianceThresholds {
    pub fn validate(&self) -> EngineResult<()> {
        if self.within_expectation_percent.is_sign_negative() {
            return Err(EngineError::invalid_input(
                "within_expectation_percent",
                "must not be negative",
            ));
        }
        Ok(())
    }

    /// Band of an unrounded variance percentage
    ///
    /// Callers should pass the exact ratio, not the 2-dp display value: a
    /// true 4.996% is within a 5% band even though it displays as 5.00.
    pub fn classify(&self, variance_percent: Decimal) -> VarianceBand {
        if variance_percent.is_zero() || variance_percent.abs() < self.within_expectation_percent {
            VarianceBand::WithinExpectation
        } else if variance_percent.is_sign_positive() {
            VarianceBand::OverBudget
        } else {
            VarianceBand::UnderBudget
        }
    }
}

/// One group of a budget-vs-actual report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub key: GroupKey,
    pub result: VarianceResult,
    pub band: VarianceBand,
}

/// Totals across all lines of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceSummary {
    pub overall: VarianceResult,
    pub band: VarianceBand,
}

/// Budget-vs-actual comparison, one line per group, sorted by key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetVsActualReport {
    pub lines: Vec<VarianceLine>,
    /// `None` when there are no lines or they span several currencies
    pub summary: Option<VarianceSummary>,
}

/// Computes variances with the configured rounding and bands
#[derive(Debug, Clone)]
pub struct VarianceCalculator {
    rounding: RoundingPolicy,
    thresholds: VarianceThresholds,
    aggregator: Aggregator,
}

impl VarianceCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rounding: config.rounding,
            thresholds: config.variance.clone(),
            aggregator: Aggregator::from_config(config),
        }
    }

    /// Compare `actual` against `baseline`
    ///
    /// A zero baseline yields a 0% variance; the absolute amount is still
    /// reported.
    pub fn compare(&self, baseline: &Money, actual: &Money) -> EngineResult<VarianceResult> {
        let variance_amount = actual.checked_sub(baseline).map_err(|e| match e {
            EngineError::MixedCurrency { expected, found, .. } => EngineError::MixedCurrency {
                group: "variance".to_string(),
                expected: found,
                found: expected,
            },
            other => other,
        })?;

        let variance_percent = if baseline.is_zero() {
            0.0
        } else {
            self.rounding.percent(variance_amount.value, baseline.value)?
        };

        Ok(VarianceResult {
            baseline: baseline.clone(),
            actual: actual.clone(),
            variance_amount,
            variance_percent,
        })
    }

    /// Band from the exact `variance_amount / baseline`, not the rounded percent
    pub fn band(&self, result: &VarianceResult) -> VarianceBand {
        let baseline = result.baseline.value;
        let exact = if baseline.is_zero() {
            Some(Decimal::ZERO)
        } else {
            result
                .variance_amount
                .value
                .checked_div(baseline)
                .and_then(|r| r.checked_mul(dec!(100)))
        };
        let percent = exact
            .or_else(|| Decimal::from_f64(result.variance_percent))
            .unwrap_or_default();
        self.thresholds.classify(percent)
    }

    /// Group budget and actual records the same way and compare each group
    ///
    /// Keys present on one side only are compared against zero.
    pub fn budget_vs_actual<S: AsRef<str>>(
        &self,
        budget: &[DatedRecord],
        actual: &[DatedRecord],
        group_by: &[S],
    ) -> EngineResult<BudgetVsActualReport> {
        let budget_totals = self.aggregator.aggregate(budget, group_by)?;
        let actual_totals = self.aggregator.aggregate(actual, group_by)?;

        let keys: BTreeSet<&GroupKey> = budget_totals.keys().chain(actual_totals.keys()).collect();
        let mut lines = Vec::with_capacity(keys.len());

        for key in keys {
            let (baseline, spent) = match (budget_totals.get(key), actual_totals.get(key)) {
                (Some(b), Some(a)) => {
                    b.ensure_same_currency(a, &key.to_string())?;
                    (b.clone(), a.clone())
                }
                (Some(b), None) => (b.clone(), Money::zero(b.currency.clone())),
                (None, Some(a)) => (Money::zero(a.currency.clone()), a.clone()),
                (None, None) => continue,
            };
            let result = self.compare(&baseline, &spent)?;
            let band = self.band(&result);
            lines.push(VarianceLine {
                key: key.clone(),
                result,
                band,
            });
        }

        let summary = self.summarize(&lines)?;
        debug!("budget vs actual: {} lines", lines.len());
        Ok(BudgetVsActualReport { lines, summary })
    }

    fn summarize(&self, lines: &[VarianceLine]) -> EngineResult<Option<VarianceSummary>> {
        let currency = match lines.first() {
            Some(line) => line.result.baseline.currency.clone(),
            None => return Ok(None),
        };
        if lines.iter().any(|l| l.result.baseline.currency != currency) {
            debug!("budget vs actual spans several currencies, no overall summary");
            return Ok(None);
        }
        let total_budget = Money::try_sum(&currency, lines.iter().map(|l| &l.result.baseline), "report total")?;
        let total_actual = Money::try_sum(&currency, lines.iter().map(|l| &l.result.actual), "report total")?;
        let overall = self.compare(&total_budget, &total_actual)?;
        let band = self.band(&overall);
        Ok(Some(VarianceSummary { overall, band }))
    }
}

impl Default for VarianceCalculator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
