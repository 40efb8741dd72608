#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]

#![allow(clippy::needless_doctest_main)]

#![doc = include_str!("../README.md")]

/// Column names and agent labels of chatbot event tables
pub mod constants;

///
/// Event tables ([`EventTable`]), CSV import/export and the [`event_table!`] macro
///
pub mod table;

///
/// Composable row filters ([`Filter`])
///
pub mod filters;

///
/// Lazy, immutable event log views ([`EventLogView`])
///
pub mod event_log;

///
/// Per-case aggregations (variants, dates, durations)
///
pub mod aggregations;

///
/// Process model discovery, rendering, evaluation and the model registry
///
pub mod process_models;

/// Test helpers
#[cfg(test)]
pub(crate) mod utils;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use table::{AttributeValue, EventTable};

#[doc(inline)]
pub use table::io::{import_event_table_csv_path, CsvLoadOptions};

#[doc(inline)]
pub use filters::Filter;

#[doc(inline)]
pub use event_log::EventLogView;

#[doc(inline)]
pub use aggregations::CaseAggView;

#[doc(inline)]
pub use process_models::{ProcessModelRegistry, ProcessModelView};
