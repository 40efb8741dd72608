use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, FixedOffset};

use crate::{
    constants::{CASE_DATE, CASE_ID, END_TIMESTAMP, START_TIMESTAMP},
    table::{check_columns, AttributeValue, EventTable},
};

use super::{column, AggregationError};

///
/// Pre-processing step of a [`CaseAggView`](super::CaseAggView)
///
/// Auxiliary operations transform a table into a _new_ table and never modify their input.
pub trait AuxOp: Debug {
    /// Columns that must be present in the input table
    fn required_columns(&self) -> &'static [&'static str];

    /// Transform the table, assuming all required columns are present
    fn transform(&self, table: &EventTable) -> Result<EventTable, AggregationError>;

    /// Validate the required columns, then transform the table
    fn apply(&self, table: &EventTable) -> Result<EventTable, AggregationError> {
        check_columns(table, self.required_columns())?;
        self.transform(table)
    }
}

fn as_date(value: &AttributeValue) -> AttributeValue {
    value
        .to_timestamp()
        .map(AttributeValue::Date)
        .unwrap_or(AttributeValue::None())
}

///
/// Parse `START_TIMESTAMP` and `END_TIMESTAMP` into dates (unparseable values become missing)
///
/// If the table has no `END_TIMESTAMP` column, it is created as a copy of the start timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeTimestampsOp;

impl AuxOp for NormalizeTimestampsOp {
    fn required_columns(&self) -> &'static [&'static str] {
        &[START_TIMESTAMP]
    }

    fn transform(&self, table: &EventTable) -> Result<EventTable, AggregationError> {
        let start_col = column(table, START_TIMESTAMP)?;
        let starts: Vec<AttributeValue> =
            table.rows().iter().map(|r| as_date(r.get(start_col))).collect();
        let ends: Vec<AttributeValue> = match table.column_index(END_TIMESTAMP) {
            Some(end_col) => table.rows().iter().map(|r| as_date(r.get(end_col))).collect(),
            None => starts.clone(),
        };
        Ok(table
            .with_column(START_TIMESTAMP, starts)?
            .with_column(END_TIMESTAMP, ends)?)
    }
}

///
/// Add a column holding the date (`YYYY-MM-DD`) of the earliest start timestamp of each case
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveCaseStartDateOp {
    target_col: String,
}

impl Default for DeriveCaseStartDateOp {
    fn default() -> Self {
        Self::new(CASE_DATE)
    }
}

impl DeriveCaseStartDateOp {
    /// Create a new operation writing to `target_col`
    pub fn new(target_col: impl Into<String>) -> Self {
        Self {
            target_col: target_col.into(),
        }
    }

    /// Name of the derived column
    pub fn target_col(&self) -> &str {
        &self.target_col
    }
}

impl AuxOp for DeriveCaseStartDateOp {
    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID, START_TIMESTAMP]
    }

    fn transform(&self, table: &EventTable) -> Result<EventTable, AggregationError> {
        let case_col = column(table, CASE_ID)?;
        let start_col = column(table, START_TIMESTAMP)?;
        let mut case_start: HashMap<&AttributeValue, DateTime<FixedOffset>> = HashMap::new();
        for row in table.rows() {
            if let Some(ts) = row.get(start_col).to_timestamp() {
                case_start
                    .entry(row.get(case_col))
                    .and_modify(|min| *min = (*min).min(ts))
                    .or_insert(ts);
            }
        }
        let dates: Vec<AttributeValue> = table
            .rows()
            .iter()
            .map(|row| {
                let case = row.get(case_col);
                if case.is_none() {
                    return AttributeValue::None();
                }
                case_start
                    .get(case)
                    .map(|ts| AttributeValue::String(ts.date_naive().format("%Y-%m-%d").to_string()))
                    .unwrap_or(AttributeValue::None())
            })
            .collect();
        Ok(table.with_column(&self.target_col, dates)?)
    }
}
