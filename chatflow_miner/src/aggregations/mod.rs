//! Case Aggregations
//!
//! Per-case aggregations run in two phases: a global `prepare` over the whole (pre-processed)
//! table, then one `compute_case` call per case. [`CaseAggView`] chains auxiliary
//! pre-processing operations ([`AuxOp`]) with one [`CaseAggregator`].
use std::fmt::Display;

use crate::table::{EventTable, MissingColumnsError, TableError};

mod aggregators;
mod aux_ops;
mod base;
mod models;
mod registry;
mod view;

#[doc(inline)]
pub use aggregators::{
    CaseDateAggregator, CaseDurationAggregator, CaseVariantAggregator, VariantState,
};
#[doc(inline)]
pub use aux_ops::{AuxOp, DeriveCaseStartDateOp, NormalizeTimestampsOp};
#[doc(inline)]
pub use base::{
    BoxedAggregator, CaseAggregator, CaseMap, CaseRows, DynCaseAggregator, PreparedAggregator,
};
#[doc(inline)]
pub use models::{CaseValue, VariantInfo};
#[doc(inline)]
pub use registry::{
    build_aggregator_from_spec, deserialize_aggregator, AggregatorFactory, AggregatorRegistry,
};
#[doc(inline)]
pub use view::CaseAggView;

/// Errors of the case aggregation pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// The (transformed) table lacks required columns
    MissingColumns(MissingColumnsError),
    /// [`CaseAggView::compute`] was called without an aggregator
    NoAggregator,
    /// Malformed declarative specification or invalid aggregator arguments
    InvalidSpec(String),
    /// The declarative specification names an unregistered aggregator
    UnknownAggregator(String),
    /// A case was not seen during the prepare phase
    UnknownCase(String),
    /// An auxiliary operation produced an invalid table
    Table(TableError),
}

impl Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::MissingColumns(e) => write!(f, "{e}"),
            AggregationError::NoAggregator => {
                write!(f, "No aggregator set (use `with_aggregator` first)")
            }
            AggregationError::InvalidSpec(msg) => write!(f, "Invalid aggregator spec: {msg}"),
            AggregationError::UnknownAggregator(name) => {
                write!(f, "Unsupported aggregator: {name}")
            }
            AggregationError::UnknownCase(case) => {
                write!(f, "Case {case} was not part of the prepared table")
            }
            AggregationError::Table(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AggregationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregationError::MissingColumns(e) => Some(e),
            AggregationError::Table(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MissingColumnsError> for AggregationError {
    fn from(e: MissingColumnsError) -> Self {
        Self::MissingColumns(e)
    }
}

impl From<TableError> for AggregationError {
    fn from(e: TableError) -> Self {
        Self::Table(e)
    }
}

fn column(table: &EventTable, name: &str) -> Result<usize, AggregationError> {
    table.column_index(name).ok_or_else(|| {
        AggregationError::MissingColumns(MissingColumnsError {
            missing: vec![name.to_string()],
        })
    })
}
