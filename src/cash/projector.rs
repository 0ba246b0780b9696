//! Roll an opening balance forward through projected flows
//!
//! The base position is `opening + inflows - outflows` for flows dated in
//! `[as_of, as_of + horizon]`. Flows before `as_of` are assumed to be in the
//! opening balance already. A scenario multiplier is then applied to the
//! base result as a whole, never to individual flows.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::flow::{CashFlow, DIRECTION_DIMENSION};
use crate::aggregate::{Aggregator, DatedRecord, GroupKey, CATEGORY_DIMENSION};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::money::{Money, RoundingPolicy};
use crate::period::PeriodRange;

/// Supported projection horizons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Horizon {
    Days7,
    Days30,
    Days90,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Days7, Horizon::Days30, Horizon::Days90];

    pub fn days(&self) -> u32 {
        match self {
            Horizon::Days7 => 7,
            Horizon::Days30 => 30,
            Horizon::Days90 => 90,
        }
    }

    /// Inclusive window starting at `as_of`
    pub fn window(&self, as_of: NaiveDate) -> EngineResult<PeriodRange> {
        let end = as_of
            .checked_add_days(Days::new(u64::from(self.days())))
            .ok_or_else(|| EngineError::invalid_input("as_of", "horizon runs past the calendar"))?;
        PeriodRange::new(as_of, end)
    }
}

impl TryFrom<u32> for Horizon {
    type Error = EngineError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(Horizon::Days7),
            30 => Ok(Horizon::Days30),
            90 => Ok(Horizon::Days90),
            other => Err(EngineError::invalid_input(
                "horizon",
                format!("{} days is not one of 7, 30, 90", other),
            )),
        }
    }
}

impl From<Horizon> for u32 {
    fn from(horizon: Horizon) -> Self {
        horizon.days()
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

/// Named projection scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashScenario {
    Base,
    Optimistic,
    Conservative,
}

impl CashScenario {
    pub const ALL: [CashScenario; 3] = [CashScenario::Base, CashScenario::Optimistic, CashScenario::Conservative];

    pub fn as_str(&self) -> &'static str {
        match self {
            CashScenario::Base => "base",
            CashScenario::Optimistic => "optimistic",
            CashScenario::Conservative => "conservative",
        }
    }
}

impl FromStr for CashScenario {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CashScenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.as_str() == wanted)
            .ok_or_else(|| EngineError::invalid_input("scenario", format!("unknown scenario {:?}", s)))
    }
}

impl fmt::Display for CashScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiplier applied to the base position for each scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioMultipliers {
    pub base: Decimal,
    pub optimistic: Decimal,
    pub conservative: Decimal,
}

impl Default for ScenarioMultipliers {
    fn default() -> Self {
        Self {
            base: dec!(1.0),
            optimistic: dec!(1.15),
            conservative: dec!(0.80),
        }
    }
}

impl ScenarioMultipliers {
    pub fn multiplier(&self, scenario: CashScenario) -> Decimal {
        match scenario {
            CashScenario::Base => self.base,
            CashScenario::Optimistic => self.optimistic,
            CashScenario::Conservative => self.conservative,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        for scenario in CashScenario::ALL {
            if self.multiplier(scenario).is_sign_negative() {
                return Err(EngineError::invalid_input(
                    format!("{} multiplier", scenario),
                    "must not be negative",
                ));
            }
        }
        Ok(())
    }
}

/// One horizon/scenario cell of a position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashPositionCell {
    pub horizon: Horizon,
    pub scenario: CashScenario,
    /// Unadjusted `opening + inflows - outflows`
    pub base_position: Money,
    /// Base position times the scenario multiplier, rounded
    pub projected: Money,
}

/// Every horizon x scenario combination for one opening balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashPositionReport {
    pub as_of: NaiveDate,
    pub opening_balance: Money,
    /// Ordered by horizon, then scenario
    pub cells: Vec<CashPositionCell>,
}

impl CashPositionReport {
    pub fn get(&self, horizon: Horizon, scenario: CashScenario) -> Option<&CashPositionCell> {
        self.cells
            .iter()
            .find(|cell| cell.horizon == horizon && cell.scenario == scenario)
    }
}

/// Stateless cash-position projector
///
/// Holds only configuration; every call is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct CashPositionProjector {
    multipliers: ScenarioMultipliers,
    rounding: RoundingPolicy,
    aggregator: Aggregator,
}

impl CashPositionProjector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            multipliers: config.scenarios.clone(),
            rounding: config.rounding,
            aggregator: Aggregator::from_config(config),
        }
    }

    pub fn multipliers(&self) -> &ScenarioMultipliers {
        &self.multipliers
    }

    /// Opening balance rolled forward through the flows inside the horizon
    pub fn base_position(
        &self,
        opening: &Money,
        flows: &[CashFlow],
        as_of: NaiveDate,
        horizon: Horizon,
    ) -> EngineResult<Money> {
        let window = horizon.window(as_of)?;
        let mut balance = opening.clone();
        let mut counted = 0usize;

        for flow in flows {
            flow.validate()?;
            opening.ensure_same_currency(&flow.record.amount, "cash position")?;
            if !window.contains(flow.record.date) {
                continue;
            }
            balance = balance.checked_add(&flow.signed_amount())?;
            counted += 1;
        }

        debug!(
            "cash position {} as of {}: {} of {} flows in window",
            horizon,
            as_of,
            counted,
            flows.len()
        );
        Ok(balance)
    }

    /// Projected balance for one horizon under one scenario
    pub fn project(
        &self,
        opening: &Money,
        flows: &[CashFlow],
        as_of: NaiveDate,
        horizon: Horizon,
        scenario: CashScenario,
    ) -> EngineResult<Money> {
        let base = self.base_position(opening, flows, as_of, horizon)?;
        self.apply_scenario(&base, scenario)
    }

    fn apply_scenario(&self, base: &Money, scenario: CashScenario) -> EngineResult<Money> {
        Ok(base.scale(self.multipliers.multiplier(scenario))?.rounded(&self.rounding))
    }

    /// All nine horizon/scenario cells, ordered by horizon then scenario
    ///
    /// Runs on the calling thread; the base position is rolled forward once
    /// per horizon and shared by its three scenarios.
    pub fn position_matrix(
        &self,
        opening: &Money,
        flows: &[CashFlow],
        as_of: NaiveDate,
    ) -> EngineResult<CashPositionReport> {
        let mut cells = Vec::with_capacity(Horizon::ALL.len() * CashScenario::ALL.len());
        for horizon in Horizon::ALL {
            let base_position = self.base_position(opening, flows, as_of, horizon)?;
            for scenario in CashScenario::ALL {
                let projected = self.apply_scenario(&base_position, scenario)?;
                cells.push(CashPositionCell {
                    horizon,
                    scenario,
                    base_position: base_position.clone(),
                    projected,
                });
            }
        }

        for cell in cells.iter().filter(|c| c.scenario == CashScenario::Base) {
            if cell.base_position.is_negative() {
                warn!("projected cash goes negative within {}: {}", cell.horizon, cell.base_position);
            }
        }

        Ok(CashPositionReport {
            as_of,
            opening_balance: opening.clone(),
            cells,
        })
    }

    /// Flow totals grouped by (direction, category)
    pub fn cash_flow_by_type(&self, flows: &[CashFlow]) -> EngineResult<HashMap<GroupKey, Money>> {
        for flow in flows {
            flow.validate()?;
        }
        let tagged: Vec<DatedRecord> = flows.iter().map(CashFlow::tagged_record).collect();
        self.aggregator
            .aggregate(&tagged, &[DIRECTION_DIMENSION, CATEGORY_DIMENSION])
    }
}

impl Default for CashPositionProjector {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn usd(value: Decimal) -> Money {
        Money::new(value, Currency::new("USD").unwrap())
    }

    fn flow_in(d: NaiveDate, value: Decimal, category: &str) -> CashFlow {
        CashFlow::inflow(DatedRecord::new(d, usd(value), category))
    }

    fn flow_out(d: NaiveDate, value: Decimal, category: &str) -> CashFlow {
        CashFlow::outflow(DatedRecord::new(d, usd(value), category))
    }

    fn as_of() -> NaiveDate {
        date(2024, 3, 1)
    }

    #[test]
    fn test_optimistic_projection() {
        let flows = vec![
            flow_in(date(2024, 3, 10), dec!(20000), "receivables"),
            flow_out(date(2024, 3, 15), dec!(5000), "payables"),
        ];
        let projector = CashPositionProjector::default();
        let opening = usd(dec!(100000));

        let base = projector.base_position(&opening, &flows, as_of(), Horizon::Days30).unwrap();
        assert_eq!(base.value, dec!(115000));

        let projected = projector
            .project(&opening, &flows, as_of(), Horizon::Days30, CashScenario::Optimistic)
            .unwrap();
        assert_eq!(projected.value, dec!(132250));

        let conservative = projector
            .project(&opening, &flows, as_of(), Horizon::Days30, CashScenario::Conservative)
            .unwrap();
        assert_eq!(conservative.value, dec!(92000));
    }

    #[test]
    fn test_horizon_window_is_inclusive() {
        let flows = vec![
            flow_in(date(2024, 3, 8), dec!(100), "on the 7th day"),
            flow_in(date(2024, 3, 9), dec!(1000), "outside 7 days"),
            flow_in(date(2024, 2, 29), dec!(5000), "before as-of"),
        ];
        let projector = CashPositionProjector::default();
        let base = projector
            .base_position(&usd(dec!(0)), &flows, as_of(), Horizon::Days7)
            .unwrap();
        assert_eq!(base.value, dec!(100));
    }

    #[test]
    fn test_configured_multipliers() {
        let config = EngineConfig {
            scenarios: ScenarioMultipliers {
                optimistic: dec!(1.5),
                ..ScenarioMultipliers::default()
            },
            ..EngineConfig::default()
        };
        let projected = CashPositionProjector::new(&config)
            .project(&usd(dec!(1000)), &[], as_of(), Horizon::Days90, CashScenario::Optimistic)
            .unwrap();
        assert_eq!(projected.value, dec!(1500));
    }

    #[test]
    fn test_negative_flow_rejected() {
        let flows = vec![flow_in(date(2024, 3, 2), dec!(-10), "refund")];
        let err = CashPositionProjector::default()
            .project(&usd(dec!(0)), &flows, as_of(), Horizon::Days7, CashScenario::Base)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[test]
    fn test_flow_currency_must_match_opening() {
        let flows = vec![CashFlow::inflow(DatedRecord::new(
            date(2024, 3, 2),
            Money::new(dec!(10), Currency::new("EUR").unwrap()),
            "sales",
        ))];
        let err = CashPositionProjector::default()
            .project(&usd(dec!(0)), &flows, as_of(), Horizon::Days7, CashScenario::Base)
            .unwrap_err();
        assert!(matches!(err, EngineError::MixedCurrency { .. }));
    }

    #[test]
    fn test_horizon_parsing() {
        assert_eq!(Horizon::try_from(30).unwrap(), Horizon::Days30);
        assert!(Horizon::try_from(60).is_err());
        assert_eq!("Conservative".parse::<CashScenario>().unwrap(), CashScenario::Conservative);
        assert!("pessimistic".parse::<CashScenario>().is_err());
    }

    #[test]
    fn test_position_matrix() {
        let flows = vec![
            flow_in(date(2024, 3, 5), dec!(1000), "receivables"),
            flow_out(date(2024, 3, 20), dec!(400), "payroll"),
            flow_in(date(2024, 5, 1), dec!(2000), "receivables"),
        ];
        let report = CashPositionProjector::default()
            .position_matrix(&usd(dec!(10000)), &flows, as_of())
            .unwrap();

        assert_eq!(report.cells.len(), 9);
        assert_eq!(report.cells[0].horizon, Horizon::Days7);
        assert_eq!(report.cells[0].scenario, CashScenario::Base);

        let week = report.get(Horizon::Days7, CashScenario::Base).unwrap();
        assert_eq!(week.projected.value, dec!(11000));
        let month = report.get(Horizon::Days30, CashScenario::Base).unwrap();
        assert_eq!(month.projected.value, dec!(10600));
        let quarter = report.get(Horizon::Days90, CashScenario::Conservative).unwrap();
        assert_eq!(quarter.base_position.value, dec!(12600));
        assert_eq!(quarter.projected.value, dec!(10080));
    }

    #[test]
    fn test_matrix_shares_base_per_horizon() {
        let flows = vec![flow_out(date(2024, 3, 2), dec!(250), "rent")];
        let projector = CashPositionProjector::default();
        let report = projector.position_matrix(&usd(dec!(1000)), &flows, as_of()).unwrap();

        for horizon in Horizon::ALL {
            for scenario in CashScenario::ALL {
                let cell = report.get(horizon, scenario).unwrap();
                assert_eq!(cell.base_position.value, dec!(750));
                let expected = dec!(750) * projector.multipliers().multiplier(scenario);
                assert_eq!(cell.projected.value, expected.round_dp(2));
            }
        }
        let order: Vec<(Horizon, CashScenario)> = report.cells.iter().map(|c| (c.horizon, c.scenario)).collect();
        assert_eq!(order[3], (Horizon::Days30, CashScenario::Base));
        assert_eq!(order[8], (Horizon::Days90, CashScenario::Conservative));
    }

    #[test]
    fn test_projection_is_repeatable() {
        let flows = vec![flow_in(date(2024, 3, 3), dec!(123.45), "sales")];
        let projector = CashPositionProjector::default();
        let a = projector.position_matrix(&usd(dec!(99.99)), &flows, as_of()).unwrap();
        let b = projector.position_matrix(&usd(dec!(99.99)), &flows, as_of()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cash_flow_by_type() {
        let flows = vec![
            flow_in(date(2024, 3, 5), dec!(1000), "receivables"),
            flow_in(date(2024, 3, 6), dec!(500), "receivables"),
            flow_out(date(2024, 3, 20), dec!(400), "payroll"),
        ];
        let totals = CashPositionProjector::default().cash_flow_by_type(&flows).unwrap();
        let inflows: GroupKey = ["inflow", "receivables"].into_iter().collect();
        let payroll: GroupKey = ["outflow", "payroll"].into_iter().collect();
        assert_eq!(totals[&inflows].value, dec!(1500));
        assert_eq!(totals[&payroll].value, dec!(400));
    }
}
