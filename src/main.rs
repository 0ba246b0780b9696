//! Profit Analytics CLI
//!
//! Command-line front end for period resolution, aging, budget-vs-actual,
//! coverage, percentage of completion and cash-position projection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use profit_analytics::aggregate::filter_period;
use profit_analytics::aging::AgingBucket;
use profit_analytics::loader::{load_cash_flows, load_records};
use profit_analytics::period::resolve;
use profit_analytics::{AnalyticsRunner, Currency, EngineConfig, Money, PeriodToken, PocInput};

#[derive(Debug, Parser)]
#[command(name = "profit-analytics", version, about = "Financial aggregation and variance analysis")]
struct Cli {
    /// JSON engine configuration; ENGINE_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a named period to a date range
    Period {
        token: PeriodToken,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Aging report for a receivables CSV (date = due date)
    Aging {
        receivables: PathBuf,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, value_delimiter = ',')]
        group_by: Vec<String>,
    },
    /// Budget vs actual by group
    Variance {
        #[arg(long)]
        budget: PathBuf,
        #[arg(long)]
        actual: PathBuf,
        #[arg(long, value_delimiter = ',', default_value = "category")]
        group_by: Vec<String>,
        /// Restrict both files to a named period
        #[arg(long)]
        period: Option<PeriodToken>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Fixed-cost coverage by billable amounts
    Coverage {
        #[arg(long)]
        fixed_costs: Decimal,
        #[arg(long)]
        billable: Decimal,
        #[arg(long, default_value = "EUR")]
        currency: Currency,
    },
    /// Percentage of completion
    Poc {
        #[arg(long)]
        worked_hours: Decimal,
        #[arg(long)]
        budgeted_hours: Decimal,
        #[arg(long)]
        incurred_cost: Decimal,
        #[arg(long)]
        budgeted_cost: Decimal,
        #[arg(long, default_value = "EUR")]
        currency: Currency,
    },
    /// Cash position for every horizon and scenario
    Cash {
        flows: PathBuf,
        #[arg(long)]
        opening: Decimal,
        #[arg(long)]
        currency: Currency,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let config = config
        .with_env_overrides()
        .context("Invalid ENGINE_* override")?;
    let runner = AnalyticsRunner::with_config(config)?;

    match cli.command {
        Command::Period { token, as_of } => {
            let range = resolve(token, as_of.unwrap_or_else(today))?;
            emit(cli.json, &range, || println!("{}: {}", token, range))?;
        }
        Command::Aging { receivables, as_of, group_by } => {
            let records = load_records(&receivables)
                .with_context(|| format!("Failed to load {}", receivables.display()))?;
            let report = runner.aging(&records, as_of.unwrap_or_else(today), &group_by)?;
            let overdue = report.overdue_percent_if_single_currency()?;
            emit(cli.json, &report, || {
                print!("{:<24}", "Group");
                for bucket in AgingBucket::ALL {
                    print!(" {:>14}", bucket.label());
                }
                println!(" {:>14}", "total");
                println!("{}", "-".repeat(24 + 15 * 6));
                for group in &report.groups {
                    print!("{:<24}", group.key.to_string());
                    for bucket in AgingBucket::ALL {
                        print!(" {:>14}", group.amount(bucket).value);
                    }
                    println!(" {:>14}", group.total.value);
                }
                match overdue {
                    Some(pct) => println!("\nAs of {}: {:.2}% overdue", report.as_of, pct),
                    None => println!("\nAs of {}: groups span several currencies, no overall overdue share", report.as_of),
                }
            })?;
        }
        Command::Variance { budget, actual, group_by, period, as_of } => {
            let mut budget_records = load_records(&budget)
                .with_context(|| format!("Failed to load {}", budget.display()))?;
            let mut actual_records = load_records(&actual)
                .with_context(|| format!("Failed to load {}", actual.display()))?;
            if let Some(token) = period {
                let range = resolve(token, as_of.unwrap_or_else(today))?;
                budget_records = filter_period(&budget_records, &range);
                actual_records = filter_period(&actual_records, &range);
            }
            let report = runner.budget_vs_actual(&budget_records, &actual_records, &group_by)?;
            emit(cli.json, &report, || {
                println!("{:<30} {:>14} {:>14} {:>14} {:>9}  {}",
                    "Group", "Budget", "Actual", "Variance", "Var %", "Status");
                println!("{}", "-".repeat(105));
                for line in &report.lines {
                    println!("{:<30} {:>14} {:>14} {:>14} {:>8.2}%  {}",
                        line.key.to_string(),
                        line.result.baseline.value,
                        line.result.actual.value,
                        line.result.variance_amount.value,
                        line.result.variance_percent,
                        line.band.label());
                }
                if let Some(summary) = &report.summary {
                    println!("{}", "-".repeat(105));
                    println!("{:<30} {:>14} {:>14} {:>14} {:>8.2}%  {}",
                        "total",
                        summary.overall.baseline.value,
                        summary.overall.actual.value,
                        summary.overall.variance_amount.value,
                        summary.overall.variance_percent,
                        summary.band.label());
                }
            })?;
        }
        Command::Coverage { fixed_costs, billable, currency } => {
            let result = runner.coverage(
                &Money::new(fixed_costs, currency.clone()),
                &Money::new(billable, currency),
            )?;
            emit(cli.json, &result, || {
                println!("Fixed costs:   {}", result.fixed_costs);
                println!("Billable:      {}", result.billable_amount);
                println!("Coverage:      {:.2}%", result.coverage_percent);
                println!("Undercovered:  {}", result.undercovered_amount);
            })?;
        }
        Command::Poc { worked_hours, budgeted_hours, incurred_cost, budgeted_cost, currency } => {
            let input = PocInput {
                worked_hours,
                budgeted_hours,
                incurred_cost: Money::new(incurred_cost, currency.clone()),
                budgeted_cost: Money::new(budgeted_cost, currency),
            };
            let result = runner.poc(&input)?;
            emit(cli.json, &result, || {
                println!("Hours-based POC: {:.2}%", result.hours_based_poc);
                println!("Cost-based POC:  {:.2}%", result.cost_based_poc);
                println!("Overall POC:     {:.2}%", result.overall_poc);
            })?;
        }
        Command::Cash { flows, opening, currency, as_of } => {
            let cash_flows = load_cash_flows(&flows)
                .with_context(|| format!("Failed to load {}", flows.display()))?;
            let opening = Money::new(opening, currency);
            let report = runner.cash_position(&opening, &cash_flows, as_of.unwrap_or_else(today))?;
            emit(cli.json, &report, || {
                println!("Opening balance {} as of {}", report.opening_balance, report.as_of);
                println!("{:>8} {:>14} {:>16} {:>16}", "Horizon", "Scenario", "Base", "Projected");
                println!("{}", "-".repeat(57));
                for cell in &report.cells {
                    println!("{:>8} {:>14} {:>16} {:>16}",
                        cell.horizon.to_string(),
                        cell.scenario.as_str(),
                        cell.base_position.value,
                        cell.projected.value);
                }
            })?;
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Print `value` as JSON, or run the table printer
fn emit<T: Serialize>(json: bool, value: &T, table: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    } else {
        table();
    }
    Ok(())
}
