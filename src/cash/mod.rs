//! Treasury cash-position projection under named scenarios

mod flow;
mod projector;

pub use flow::{CashFlow, FlowDirection, DIRECTION_DIMENSION};
pub use projector::{
    CashPositionCell, CashPositionProjector, CashPositionReport, CashScenario, Horizon,
    ScenarioMultipliers,
};
