//! Fixed-cost coverage and percentage-of-completion
//!
//! Undercoverage is the part of fixed costs that billable revenue does not
//! offset. POC blends an hours ratio and a cost ratio against budget; the
//! blend weights default to an unweighted 50/50 average.

use std::collections::BTreeSet;

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregator, DatedRecord, GroupKey};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::money::{Money, RoundingPolicy};

/// Coverage of fixed costs by billable amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub fixed_costs: Money,
    pub billable_amount: Money,
    /// `billable / fixed * 100`; 100 when there are no fixed costs. Not capped.
    pub coverage_percent: f64,
    /// `max(0, fixed - billable)`
    pub undercovered_amount: Money,
}

impl CoverageResult {
    pub fn is_fully_covered(&self) -> bool {
        self.undercovered_amount.is_zero()
    }
}

/// Inputs for percentage of completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocInput {
    pub worked_hours: Decimal,
    pub budgeted_hours: Decimal,
    pub incurred_cost: Money,
    pub budgeted_cost: Money,
}

/// Percentage of completion, all values in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocResult {
    pub hours_based_poc: f64,
    pub cost_based_poc: f64,
    pub overall_poc: f64,
}

/// Blend weights for the overall POC (must sum to 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PocWeights {
    pub hours_weight: Decimal,
    pub cost_weight: Decimal,
}

impl Default for PocWeights {
    fn default() -> Self {
        Self {
            hours_weight: dec!(0.5),
            cost_weight: dec!(0.5),
        }
    }
}

impl PocWeights {
    /// Weights with `hours_weight` on hours and the remainder on cost
    pub fn hours_weighted(hours_weight: Decimal) -> EngineResult<Self> {
        let cost_weight = Decimal::ONE
            .checked_sub(hours_weight)
            .ok_or(EngineError::ArithmeticOverflow("poc weights"))?;
        let weights = Self {
            hours_weight,
            cost_weight,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.hours_weight.is_sign_negative() || self.cost_weight.is_sign_negative() {
            return Err(EngineError::invalid_input("poc weights", "must not be negative"));
        }
        if self.hours_weight.checked_add(self.cost_weight) != Some(Decimal::ONE) {
            return Err(EngineError::invalid_input(
                "poc weights",
                format!("{} + {} does not sum to 1", self.hours_weight, self.cost_weight),
            ));
        }
        Ok(())
    }
}

/// Coverage and POC with configured rounding and weights
#[derive(Debug, Clone)]
pub struct CoverageCalculator {
    rounding: RoundingPolicy,
    weights: PocWeights,
    aggregator: Aggregator,
}

impl CoverageCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rounding: config.rounding,
            weights: config.poc.clone(),
            aggregator: Aggregator::from_config(config),
        }
    }

    pub fn undercoverage(&self, fixed_costs: &Money, billable_amount: &Money) -> EngineResult<CoverageResult> {
        require_non_negative("fixed_costs", fixed_costs.value)?;
        require_non_negative("billable_amount", billable_amount.value)?;
        fixed_costs.ensure_same_currency(billable_amount, "coverage")?;

        let coverage_percent = if fixed_costs.is_zero() {
            100.0
        } else {
            self.rounding.percent(billable_amount.value, fixed_costs.value)?
        };
        let undercovered_amount = fixed_costs.checked_sub(billable_amount)?.max_zero();

        Ok(CoverageResult {
            fixed_costs: fixed_costs.clone(),
            billable_amount: billable_amount.clone(),
            coverage_percent,
            undercovered_amount,
        })
    }

    pub fn percentage_of_completion(&self, input: &PocInput) -> EngineResult<PocResult> {
        require_non_negative("worked_hours", input.worked_hours)?;
        require_non_negative("budgeted_hours", input.budgeted_hours)?;
        require_non_negative("incurred_cost", input.incurred_cost.value)?;
        require_non_negative("budgeted_cost", input.budgeted_cost.value)?;
        input.budgeted_cost.ensure_same_currency(&input.incurred_cost, "percentage of completion")?;

        let hours = raw_ratio_percent(input.worked_hours, input.budgeted_hours)?;
        let cost = raw_ratio_percent(input.incurred_cost.value, input.budgeted_cost.value)?;
        let overall = hours
            .checked_mul(self.weights.hours_weight)
            .zip(cost.checked_mul(self.weights.cost_weight))
            .and_then(|(h, c)| h.checked_add(c))
            .ok_or(EngineError::ArithmeticOverflow("poc blend"))?;

        Ok(PocResult {
            hours_based_poc: self.rounding.percent_value(hours)?,
            cost_based_poc: self.rounding.percent_value(cost)?,
            overall_poc: self.rounding.percent_value(overall)?,
        })
    }

    /// Coverage per group, e.g. per department or month
    ///
    /// Groups present on one side only are compared against zero.
    pub fn coverage_by_group<S: AsRef<str>>(
        &self,
        fixed_costs: &[DatedRecord],
        billable: &[DatedRecord],
        group_by: &[S],
    ) -> EngineResult<Vec<(GroupKey, CoverageResult)>> {
        let fixed_totals = self.aggregator.aggregate(fixed_costs, group_by)?;
        let billable_totals = self.aggregator.aggregate(billable, group_by)?;
        let keys: BTreeSet<&GroupKey> = fixed_totals.keys().chain(billable_totals.keys()).collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let (fixed, billed) = match (fixed_totals.get(key), billable_totals.get(key)) {
                (Some(f), Some(b)) => {
                    f.ensure_same_currency(b, &key.to_string())?;
                    (f.clone(), b.clone())
                }
                (Some(f), None) => (f.clone(), Money::zero(f.currency.clone())),
                (None, Some(b)) => (Money::zero(b.currency.clone()), b.clone()),
                (None, None) => continue,
            };
            results.push((key.clone(), self.undercoverage(&fixed, &billed)?));
        }
        debug!("coverage computed for {} groups", results.len());
        Ok(results)
    }
}

impl Default for CoverageCalculator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn require_non_negative(field: &str, value: Decimal) -> EngineResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(EngineError::invalid_input(field, format!("{} is negative", value)));
    }
    Ok(())
}

/// Unrounded `num / den * 100`, 0 for a zero denominator
fn raw_ratio_percent(num: Decimal, den: Decimal) -> EngineResult<Decimal> {
    if den.is_zero() {
        return Ok(Decimal::ZERO);
    }
    num.checked_div(den)
        .and_then(|r| r.checked_mul(dec!(100)))
        .ok_or(EngineError::ArithmeticOverflow("completion ratio"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn usd(value: Decimal) -> Money {
        Money::new(value, Currency::new("USD").unwrap())
    }

    fn poc_input(worked: Decimal, budgeted: Decimal, incurred: Decimal, budget_cost: Decimal) -> PocInput {
        PocInput {
            worked_hours: worked,
            budgeted_hours: budgeted,
            incurred_cost: usd(incurred),
            budgeted_cost: usd(budget_cost),
        }
    }

    #[test]
    fn test_undercoverage() {
        let result = CoverageCalculator::default()
            .undercoverage(&usd(dec!(100000)), &usd(dec!(60000)))
            .unwrap();
        assert_eq!(result.undercovered_amount.value, dec!(40000));
        assert_abs_diff_eq!(result.coverage_percent, 60.0, epsilon = 1e-9);
        assert!(!result.is_fully_covered());
    }

    #[test]
    fn test_overcovered_is_not_capped() {
        let result = CoverageCalculator::default()
            .undercoverage(&usd(dec!(50000)), &usd(dec!(80000)))
            .unwrap();
        assert!(result.undercovered_amount.is_zero());
        assert_abs_diff_eq!(result.coverage_percent, 160.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_fixed_costs_is_fully_covered() {
        let result = CoverageCalculator::default()
            .undercoverage(&usd(Decimal::ZERO), &usd(Decimal::ZERO))
            .unwrap();
        assert_eq!(result.coverage_percent, 100.0);
        assert!(result.is_fully_covered());
    }

    #[test]
    fn test_negative_coverage_inputs_rejected() {
        let calc = CoverageCalculator::default();
        assert!(matches!(
            calc.undercoverage(&usd(dec!(-1)), &usd(dec!(5))).unwrap_err(),
            EngineError::InvalidInput { ref field, .. } if field == "fixed_costs"
        ));
        assert!(calc.undercoverage(&usd(dec!(1)), &usd(dec!(-5))).is_err());
    }

    #[test]
    fn test_poc_default_blend() {
        let result = CoverageCalculator::default()
            .percentage_of_completion(&poc_input(dec!(500), dec!(1000), dec!(40000), dec!(100000)))
            .unwrap();
        assert_abs_diff_eq!(result.hours_based_poc, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.cost_based_poc, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.overall_poc, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_poc_custom_weights() {
        let config = EngineConfig {
            poc: PocWeights::hours_weighted(dec!(0.25)).unwrap(),
            ..EngineConfig::default()
        };
        let result = CoverageCalculator::new(&config)
            .percentage_of_completion(&poc_input(dec!(500), dec!(1000), dec!(40000), dec!(100000)))
            .unwrap();
        // 0.25 * 50 + 0.75 * 40
        assert_abs_diff_eq!(result.overall_poc, 42.5, epsilon = 1e-9);
    }

    #[test]
    fn test_poc_zero_budgets() {
        let result = CoverageCalculator::default()
            .percentage_of_completion(&poc_input(dec!(12), Decimal::ZERO, dec!(300), Decimal::ZERO))
            .unwrap();
        assert_eq!(result.hours_based_poc, 0.0);
        assert_eq!(result.cost_based_poc, 0.0);
        assert_eq!(result.overall_poc, 0.0);
    }

    #[test]
    fn test_poc_negative_hours_rejected() {
        let err = CoverageCalculator::default()
            .percentage_of_completion(&poc_input(dec!(-1), dec!(10), dec!(0), dec!(10)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { ref field, .. } if field == "worked_hours"));
    }

    #[test]
    fn test_weights_validation() {
        assert!(PocWeights::hours_weighted(dec!(1.2)).is_err());
        assert!(PocWeights { hours_weight: dec!(0.5), cost_weight: dec!(0.6) }.validate().is_err());
        assert!(PocWeights::hours_weighted(dec!(1)).is_ok());
    }

    #[test]
    fn test_coverage_by_group() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let fixed = vec![
            DatedRecord::new(day, usd(dec!(1000)), "rent").with_dimension("department", "ops"),
            DatedRecord::new(day, usd(dec!(500)), "rent").with_dimension("department", "sales"),
        ];
        let billable = vec![
            DatedRecord::new(day, usd(dec!(1200)), "fees").with_dimension("department", "ops"),
            DatedRecord::new(day, usd(dec!(100)), "fees").with_dimension("department", "sales"),
        ];

        let results = CoverageCalculator::default()
            .coverage_by_group(&fixed, &billable, &["department"])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, GroupKey::single("ops"));
        assert!(results[0].1.is_fully_covered());
        assert_eq!(results[1].1.undercovered_amount.value, dec!(400));
        assert_abs_diff_eq!(results[1].1.coverage_percent, 20.0, epsilon = 1e-9);
    }
}
