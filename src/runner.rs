//! Runner for repeated and batch analytics
//!
//! Loads configuration once and builds calculators from it on demand, so
//! callers can run many computations without re-reading JSON or env vars.

use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::aggregate::DatedRecord;
use crate::aging::{aging_report, AgingReport};
use crate::cash::{CashFlow, CashPositionProjector, CashPositionReport};
use crate::config::EngineConfig;
use crate::coverage::{CoverageCalculator, CoverageResult, PocInput, PocResult};
use crate::error::EngineResult;
use crate::money::Money;
use crate::variance::{BudgetVsActualReport, VarianceCalculator, VarianceResult};

/// One account's inputs for a batch cash-position run
#[derive(Debug, Clone)]
pub struct CashAccount {
    pub name: String,
    pub opening_balance: Money,
    pub flows: Vec<CashFlow>,
}

/// Pre-configured analytics runner
///
/// # Example
/// ```ignore
/// let runner = AnalyticsRunner::from_json_path(Path::new("engine.json"))?;
/// for account in &accounts {
///     let report = runner.cash_position(&account.opening_balance, &account.flows, as_of)?;
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnalyticsRunner {
    config: EngineConfig,
}

impl AnalyticsRunner {
    /// Runner with the reference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner with a validated configuration
    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load a JSON config file and apply `ENGINE_*` overrides
    pub fn from_json_path(path: &Path) -> EngineResult<Self> {
        let config = EngineConfig::from_json_path(path)?.with_env_overrides()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variance(&self, baseline: &Money, actual: &Money) -> EngineResult<VarianceResult> {
        VarianceCalculator::new(&self.config).compare(baseline, actual)
    }

    pub fn budget_vs_actual<S: AsRef<str>>(
        &self,
        budget: &[DatedRecord],
        actual: &[DatedRecord],
        group_by: &[S],
    ) -> EngineResult<BudgetVsActualReport> {
        VarianceCalculator::new(&self.config).budget_vs_actual(budget, actual, group_by)
    }

    pub fn coverage(&self, fixed_costs: &Money, billable_amount: &Money) -> EngineResult<CoverageResult> {
        CoverageCalculator::new(&self.config).undercoverage(fixed_costs, billable_amount)
    }

    pub fn poc(&self, input: &PocInput) -> EngineResult<PocResult> {
        CoverageCalculator::new(&self.config).percentage_of_completion(input)
    }

    pub fn aging<S: AsRef<str>>(
        &self,
        receivables: &[DatedRecord],
        as_of: NaiveDate,
        group_by: &[S],
    ) -> EngineResult<AgingReport> {
        aging_report(receivables, as_of, group_by, &self.config)
    }

    /// Aging of the same receivables at several dates, in parallel
    pub fn aging_snapshots<S: AsRef<str> + Sync>(
        &self,
        receivables: &[DatedRecord],
        dates: &[NaiveDate],
        group_by: &[S],
    ) -> EngineResult<Vec<AgingReport>> {
        dates
            .par_iter()
            .map(|&as_of| aging_report(receivables, as_of, group_by, &self.config))
            .collect()
    }

    pub fn cash_position(
        &self,
        opening: &Money,
        flows: &[CashFlow],
        as_of: NaiveDate,
    ) -> EngineResult<CashPositionReport> {
        CashPositionProjector::new(&self.config).position_matrix(opening, flows, as_of)
    }

    /// Position matrices for many independent accounts, in parallel
    ///
    /// Results keep the order of `accounts`; the first failing account aborts
    /// the batch.
    pub fn cash_positions_batch(
        &self,
        accounts: &[CashAccount],
        as_of: NaiveDate,
    ) -> EngineResult<Vec<(String, CashPositionReport)>> {
        let projector = CashPositionProjector::new(&self.config);
        accounts
            .par_iter()
            .map(|account| {
                projector
                    .position_matrix(&account.opening_balance, &account.flows, as_of)
                    .map(|report| (account.name.clone(), report))
            })
            .collect()
    }
}
