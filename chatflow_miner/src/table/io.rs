//! CSV Import and Export for Event Tables
use std::{fmt::Display, fs::File, io::Read, io::Write, path::Path};

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACTIVITY, AGENT, CASE_ID, END_TIMESTAMP, REQUIRED_COLUMNS, START_TIMESTAMP,
};

use super::{check_columns, parse_timestamp, AttributeValue, EventTable, MissingColumnsError, TableError};

/// Error while importing or exporting an [`EventTable`] as CSV
#[derive(Debug)]
pub enum TableIOError {
    /// IO error (e.g., file not found)
    Io(std::io::Error),
    /// Malformed CSV input or failed CSV write
    Csv(csv::Error),
    /// Input lacks required columns
    MissingColumns(MissingColumnsError),
    /// Rows could not be assembled into a table
    Table(TableError),
}

impl Display for TableIOError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableIOError::Io(e) => write!(f, "IO Error: {e}"),
            TableIOError::Csv(e) => write!(f, "CSV Error: {e}"),
            TableIOError::MissingColumns(e) => write!(f, "Invalid format: {e}"),
            TableIOError::Table(e) => write!(f, "Table Error: {e}"),
        }
    }
}

impl std::error::Error for TableIOError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TableIOError::Io(e) => Some(e),
            TableIOError::Csv(e) => Some(e),
            TableIOError::MissingColumns(e) => Some(e),
            TableIOError::Table(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for TableIOError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for TableIOError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<MissingColumnsError> for TableIOError {
    fn from(e: MissingColumnsError) -> Self {
        Self::MissingColumns(e)
    }
}

impl From<TableError> for TableIOError {
    fn from(e: TableError) -> Self {
        Self::Table(e)
    }
}

///
/// Options for loading an [`EventTable`] from CSV
///
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvLoadOptions {
    /// Field delimiter (a single ASCII character)
    pub delimiter: char,
    /// Optional date format to try first when parsing timestamp columns
    pub date_format: Option<String>,
    /// Log a warning for every unparseable timestamp
    pub verbose: bool,
}

impl Default for CsvLoadOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            date_format: None,
            verbose: false,
        }
    }
}

/// Columns that are always kept as String values (no type inference)
const LABEL_COLUMNS: [&str; 3] = [CASE_ID, ACTIVITY, AGENT];

///
/// Infer a typed [`AttributeValue`] from a raw CSV cell
///
/// Empty cells become [`AttributeValue::None`]. Otherwise integers, floats and booleans are
/// recognized, falling back to a String.
pub fn infer_value(raw: &str) -> AttributeValue {
    let raw = raw.trim();
    if raw.is_empty() {
        return AttributeValue::None();
    }
    if let Ok(i) = raw.parse::<i64>() {
        return AttributeValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return AttributeValue::Float(f);
        }
    }
    match raw.to_lowercase().as_str() {
        "true" => AttributeValue::Boolean(true),
        "false" => AttributeValue::Boolean(false),
        _ => AttributeValue::String(raw.to_string()),
    }
}

fn parse_cell(column: &str, raw: &str, options: &CsvLoadOptions) -> AttributeValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return AttributeValue::None();
    }
    if column == START_TIMESTAMP || column == END_TIMESTAMP {
        return parse_timestamp(trimmed, options.date_format.as_deref(), options.verbose)
            .map(AttributeValue::Date)
            .unwrap_or(AttributeValue::None());
    }
    if LABEL_COLUMNS.contains(&column) {
        return AttributeValue::String(trimmed.to_string());
    }
    infer_value(trimmed)
}

///
/// Import an [`EventTable`] from a CSV reader
///
/// The header row must contain all required columns (`CASE_ID`, `ACTIVITY`,
/// `START_TIMESTAMP`, `END_TIMESTAMP`). Timestamps are parsed best-effort; rows where a
/// required value is missing after parsing are dropped (and logged), not fatal.
pub fn import_event_table_csv_reader<R: Read>(
    reader: R,
    options: &CsvLoadOptions,
) -> Result<EventTable, TableIOError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter as u8)
        .has_headers(true)
        .from_reader(reader);
    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = EventTable::new(columns.clone())?;
    check_columns(&table, &REQUIRED_COLUMNS)?;
    let required_positions: Vec<usize> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();

    let mut dropped = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        let values: Vec<AttributeValue> = columns
            .iter()
            .zip(record.iter())
            .map(|(col, raw)| parse_cell(col, raw, options))
            .collect();
        if required_positions.iter().any(|&p| values[p].is_none()) {
            dropped += 1;
            continue;
        }
        table.push_row(values)?;
    }
    if dropped > 0 {
        tracing::warn!(
            dropped,
            kept = table.len(),
            "Dropped rows with missing required values"
        );
    }
    tracing::debug!(rows = table.len(), columns = table.columns().len(), "Loaded event table");
    Ok(table)
}

///
/// Import an [`EventTable`] from a CSV file
///
/// See [`import_event_table_csv_reader`]
pub fn import_event_table_csv_path<P: AsRef<Path>>(
    path: P,
    options: &CsvLoadOptions,
) -> Result<EventTable, TableIOError> {
    let file = File::open(path)?;
    import_event_table_csv_reader(file, options)
}

///
/// Export an [`EventTable`] as CSV (with header row)
///
/// Dates are written in RFC 3339, missing values as empty cells.
pub fn export_event_table_csv<W: Write>(
    writer: W,
    table: &EventTable,
) -> Result<(), TableIOError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.columns())?;
    for row in table.rows() {
        csv_writer.write_record(row.values.iter().map(|v| v.to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}
