//! Profit Analytics - financial aggregation and variance-analysis engine
//!
//! This library provides:
//! - Named period resolution (current month/quarter/year, next 30 days, ...)
//! - Receivables aging by group with inclusive bucket boundaries
//! - Group-by aggregation of dated records with explicit currency checks
//! - Budget-vs-actual variance, undercoverage and percentage of completion
//! - Cash-position projection across horizons and scenarios
//! - CSV loading and a batch runner

pub mod error;
pub mod money;
pub mod period;
pub mod aggregate;
pub mod aging;
pub mod variance;
pub mod coverage;
pub mod cash;
pub mod config;
pub mod loader;
pub mod runner;

// Re-export commonly used types
pub use error::{EngineError, EngineResult};
pub use money::{Currency, Money, RoundingPolicy};
pub use period::{PeriodRange, PeriodToken};
pub use aggregate::{Aggregator, DatedRecord, GroupKey};
pub use aging::{AgingBucket, AgingReport};
pub use variance::{VarianceCalculator, VarianceResult};
pub use coverage::{CoverageCalculator, CoverageResult, PocInput, PocResult};
pub use cash::{CashFlow, CashPositionProjector, CashScenario, Horizon};
pub use config::EngineConfig;
pub use runner::AnalyticsRunner;
