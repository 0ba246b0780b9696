//! Grouping and reduction of dated records into keyed totals

mod record;
mod grouping;

pub use record::{DatedRecord, GroupKey, CATEGORY_DIMENSION};
pub use grouping::{filter_period, Aggregator, DEFAULT_UNASSIGNED_LABEL};
