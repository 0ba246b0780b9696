//! Load dated records and cash flows from CSV
//!
//! Required columns: `date` (YYYY-MM-DD), `amount`, `currency`, `category`.
//! Cash-flow files also need `direction` (inflow | outflow). Any other column
//! becomes a grouping dimension; blank cells are treated as missing.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use rust_decimal::Decimal;

use crate::aggregate::{DatedRecord, CATEGORY_DIMENSION};
use crate::cash::{CashFlow, FlowDirection, DIRECTION_DIMENSION};
use crate::error::{EngineError, EngineResult};
use crate::money::{Currency, Money};

const DATE_COLUMN: &str = "date";
const AMOUNT_COLUMN: &str = "amount";
const CURRENCY_COLUMN: &str = "currency";

/// Column positions resolved once from the header row
struct Columns {
    date: usize,
    amount: usize,
    currency: usize,
    category: usize,
    direction: Option<usize>,
    /// (name, position) of every other column
    dimensions: Vec<(String, usize)>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, with_direction: bool) -> EngineResult<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |wanted: &str| {
            names
                .iter()
                .position(|n| n == wanted)
                .ok_or_else(|| EngineError::Load(format!("missing required column {:?}", wanted)))
        };

        let date = find(DATE_COLUMN)?;
        let amount = find(AMOUNT_COLUMN)?;
        let currency = find(CURRENCY_COLUMN)?;
        let category = find(CATEGORY_DIMENSION)?;
        let direction = if with_direction {
            Some(find(DIRECTION_DIMENSION)?)
        } else {
            None
        };

        let reserved = [Some(date), Some(amount), Some(currency), Some(category), direction];
        let dimensions = names
            .iter()
            .enumerate()
            .filter(|(i, _)| !reserved.contains(&Some(*i)))
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Ok(Self {
            date,
            amount,
            currency,
            category,
            direction,
            dimensions,
        })
    }

    fn record(&self, row: &StringRecord, line: usize) -> EngineResult<DatedRecord> {
        let cell = move |i: usize| row.get(i).unwrap_or("").trim();

        let date = NaiveDate::from_str(cell(self.date))
            .map_err(|e| row_error(line, DATE_COLUMN, format!("{:?}: {}", cell(self.date), e)))?;
        let value = Decimal::from_str(cell(self.amount))
            .map_err(|e| row_error(line, AMOUNT_COLUMN, format!("{:?}: {}", cell(self.amount), e)))?;
        let currency = Currency::new(cell(self.currency)).map_err(|e| row_error(line, CURRENCY_COLUMN, e.to_string()))?;

        let mut record = DatedRecord::new(date, Money::new(value, currency), cell(self.category));
        for (name, i) in &self.dimensions {
            let value = cell(*i);
            if !value.is_empty() {
                record = record.with_dimension(name.clone(), value);
            }
        }
        Ok(record)
    }

    fn cash_flow(&self, row: &StringRecord, line: usize) -> EngineResult<CashFlow> {
        let record = self.record(row, line)?;
        let raw = self.direction.and_then(|i| row.get(i)).unwrap_or("");
        let direction = FlowDirection::from_str(raw).map_err(|e| row_error(line, DIRECTION_DIMENSION, e.to_string()))?;
        let flow = CashFlow { direction, record };
        flow.validate().map_err(|e| row_error(line, AMOUNT_COLUMN, e.to_string()))?;
        Ok(flow)
    }
}

fn row_error(line: usize, column: &str, reason: String) -> EngineError {
    EngineError::invalid_input(format!("row {} column {}", line, column), reason)
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new().trim(Trim::Headers).flexible(true).from_reader(input)
}

/// Load dated records from a CSV file
pub fn load_records<P: AsRef<Path>>(path: P) -> EngineResult<Vec<DatedRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| EngineError::Load(format!("{}: {}", path.display(), e)))?;
    let records = load_records_from_reader(file)?;
    debug!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Load dated records from any reader; row numbers in errors are 1-based data rows
pub fn load_records_from_reader<R: Read>(input: R) -> EngineResult<Vec<DatedRecord>> {
    let mut reader = reader(input);
    let columns = Columns::from_headers(reader.headers()?, false)?;
    let mut records = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let row = result?;
        records.push(columns.record(&row, i + 1)?);
    }
    Ok(records)
}

/// Load projected cash flows from a CSV file
pub fn load_cash_flows<P: AsRef<Path>>(path: P) -> EngineResult<Vec<CashFlow>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| EngineError::Load(format!("{}: {}", path.display(), e)))?;
    let flows = load_cash_flows_from_reader(file)?;
    debug!("loaded {} cash flows from {}", flows.len(), path.display());
    Ok(flows)
}

pub fn load_cash_flows_from_reader<R: Read>(input: R) -> EngineResult<Vec<CashFlow>> {
    let mut reader = reader(input);
    let columns = Columns::from_headers(reader.headers()?, true)?;
    let mut flows = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let row = result?;
        flows.push(columns.cash_flow(&row, i + 1)?);
    }
    Ok(flows)
}
