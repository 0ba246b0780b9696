//! Projected cash movements

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::DatedRecord;
use crate::error::{EngineError, EngineResult};
use crate::money::Money;

/// Dimension name under which the flow direction is exposed for grouping
pub const DIRECTION_DIMENSION: &str = "direction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    Inflow,
    Outflow,
}

impl FlowDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowDirection::Inflow => "inflow",
            FlowDirection::Outflow => "outflow",
        }
    }
}

impl FromStr for FlowDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inflow" | "in" => Ok(FlowDirection::Inflow),
            "outflow" | "out" => Ok(FlowDirection::Outflow),
            other => Err(EngineError::invalid_input(
                DIRECTION_DIMENSION,
                format!("{:?} is neither inflow nor outflow", other),
            )),
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dated record tagged as money coming in or going out
///
/// The amount is non-negative; the direction carries the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub direction: FlowDirection,
    pub record: DatedRecord,
}

impl CashFlow {
    pub fn inflow(record: DatedRecord) -> Self {
        Self { direction: FlowDirection::Inflow, record }
    }

    pub fn outflow(record: DatedRecord) -> Self {
        Self { direction: FlowDirection::Outflow, record }
    }

    pub fn validate(&self) -> EngineResult<()> {
        let value = self.record.amount.value;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(EngineError::invalid_input(
                "cash flow amount",
                format!("{} {} on {} is negative", self.direction, value, self.record.date),
            ));
        }
        Ok(())
    }

    /// Amount with inflows positive and outflows negative
    pub fn signed_amount(&self) -> Money {
        let mut amount = self.record.amount.clone();
        if self.direction == FlowDirection::Outflow {
            amount.value = -amount.value;
        }
        amount
    }

    /// The underlying record with its direction added as a dimension
    pub fn tagged_record(&self) -> DatedRecord {
        self.record
            .clone()
            .with_dimension(DIRECTION_DIMENSION, self.direction.as_str())
    }
}
