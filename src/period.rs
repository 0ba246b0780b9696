//! Named reporting periods resolved against a reference date
//!
//! Dashboards filter by tokens such as `current-quarter`; this module turns a
//! token plus "today" into a concrete inclusive date range.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Inclusive date range (`start <= end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        if start > end {
            return Err(EngineError::invalid_input(
                "period",
                format!("start {} is after end {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered, both ends included
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

/// Period names understood by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodToken {
    CurrentMonth,
    CurrentQuarter,
    CurrentYear,
    /// Reference date plus 30 days of plain day arithmetic
    Next30Days,
    PreviousMonth,
    /// Jan 1 of the reference year up to the reference date
    YearToDate,
}

impl PeriodToken {
    pub const ALL: [PeriodToken; 6] = [
        PeriodToken::CurrentMonth,
        PeriodToken::CurrentQuarter,
        PeriodToken::CurrentYear,
        PeriodToken::Next30Days,
        PeriodToken::PreviousMonth,
        PeriodToken::YearToDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodToken::CurrentMonth => "current-month",
            PeriodToken::CurrentQuarter => "current-quarter",
            PeriodToken::CurrentYear => "current-year",
            PeriodToken::Next30Days => "next-30-days",
            PeriodToken::PreviousMonth => "previous-month",
            PeriodToken::YearToDate => "year-to-date",
        }
    }
}

impl FromStr for PeriodToken {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        PeriodToken::ALL
            .iter()
            .copied()
            .find(|token| token.as_str() == wanted)
            .ok_or_else(|| EngineError::InvalidPeriodToken(s.to_string()))
    }
}

impl fmt::Display for PeriodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a token against `reference`
pub fn resolve(token: PeriodToken, reference: NaiveDate) -> EngineResult<PeriodRange> {
    let year = reference.year();
    let range = match token {
        PeriodToken::CurrentMonth => {
            PeriodRange::new(first_of_month(year, reference.month())?, last_day_of_month(year, reference.month())?)?
        }
        PeriodToken::CurrentQuarter => {
            let first_month = reference.month0() / 3 * 3 + 1;
            PeriodRange::new(first_of_month(year, first_month)?, last_day_of_month(year, first_month + 2)?)?
        }
        PeriodToken::CurrentYear => {
            PeriodRange::new(first_of_month(year, 1)?, last_day_of_month(year, 12)?)?
        }
        PeriodToken::Next30Days => {
            let end = reference
                .checked_add_days(Days::new(30))
                .ok_or_else(|| EngineError::invalid_input("reference", "date out of range"))?;
            PeriodRange::new(reference, end)?
        }
        PeriodToken::PreviousMonth => {
            let (prev_year, prev_month) = if reference.month() == 1 {
                (year - 1, 12)
            } else {
                (year, reference.month() - 1)
            };
            PeriodRange::new(first_of_month(prev_year, prev_month)?, last_day_of_month(prev_year, prev_month)?)?
        }
        PeriodToken::YearToDate => PeriodRange::new(first_of_month(year, 1)?, reference)?,
    };

    debug!("resolved {} at {} to {}", token, reference, range);
    Ok(range)
}

/// Parse `name` and resolve it
pub fn resolve_named(name: &str, reference: NaiveDate) -> EngineResult<PeriodRange> {
    resolve(name.parse()?, reference)
}

fn first_of_month(year: i32, month: u32) -> EngineResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::invalid_input("date", format!("no such month {}-{}", year, month)))
}

/// Last calendar day of a month (handles leap years)
pub fn last_day_of_month(year: i32, month: u32) -> EngineResult<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    first_of_month(next_year, next_month)?
        .pred_opt()
        .ok_or_else(|| EngineError::invalid_input("date", format!("no such month {}-{}", year, month)))
}
