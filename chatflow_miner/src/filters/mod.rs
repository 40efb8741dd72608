//! Filter Algebra
//!
//! Filters compute a boolean keep-mask aligned to the row index of an [`EventTable`].
//! Leaf filters declare the columns they need; combinators ([`Filter::And`], [`Filter::Or`],
//! [`Filter::Not`]) only combine the masks of their children.
//!
//! ```rust
//! use chatflow_miner::{event_table, filters::{self, AgentFilter, CaseHasActivityFilter, Filter}};
//!
//! let table = event_table!(
//!     ["CASE_ID", "ACTIVITY", "AGENT"];
//!     ["c1", "greet", "ai"],
//!     ["c1", "ask", "human"],
//!     ["c2", "greet", "ai"],
//! );
//! let only_ai: Filter = AgentFilter::new("ai", false).unwrap().into();
//! let asked: Filter = CaseHasActivityFilter::new("ask").into();
//! let filter = filters::and(only_ai, filters::not(asked));
//! assert_eq!(filter.apply(&table).unwrap().row_indices(), vec![2]);
//! ```
use std::{collections::BTreeSet, fmt::Display};

use crate::table::{check_columns, EventTable, MaskAlignmentError, MissingColumnsError, RowMask};

mod builtins;
pub mod spec;

#[doc(inline)]
pub use builtins::{
    AgentFilter, CaseFilter, CaseHasActivityFilter, DirectlyFollowsFilter,
    EventuallyFollowsFilter, TimeWindowFilter, TimeWindowMode,
};
#[doc(inline)]
pub use spec::FilterSpec;

/// Errors while constructing or applying a [`Filter`]
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The table lacks columns required by a leaf filter
    MissingColumns(MissingColumnsError),
    /// A mask is not aligned to the row index of the table
    MisalignedMask(MaskAlignmentError),
    /// Invalid constructor argument (e.g., unknown agent or time window mode)
    InvalidArgument(String),
}

impl Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::MissingColumns(e) => write!(f, "{e}"),
            FilterError::MisalignedMask(e) => write!(f, "{e}"),
            FilterError::InvalidArgument(msg) => write!(f, "Invalid filter argument: {msg}"),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::MissingColumns(e) => Some(e),
            FilterError::MisalignedMask(e) => Some(e),
            FilterError::InvalidArgument(_) => None,
        }
    }
}

impl From<MissingColumnsError> for FilterError {
    fn from(e: MissingColumnsError) -> Self {
        Self::MissingColumns(e)
    }
}

impl From<MaskAlignmentError> for FilterError {
    fn from(e: MaskAlignmentError) -> Self {
        Self::MisalignedMask(e)
    }
}

/// Position of a column, reported as [`FilterError::MissingColumns`] if absent
pub(crate) fn column(table: &EventTable, name: &str) -> Result<usize, FilterError> {
    table.column_index(name).ok_or_else(|| {
        FilterError::MissingColumns(MissingColumnsError {
            missing: vec![name.to_string()],
        })
    })
}

///
/// A predicate over single rows (or whole cases) of an [`EventTable`]
///
pub trait LeafFilter: std::fmt::Debug {
    /// Columns that must be present for this filter
    fn required_columns(&self) -> &'static [&'static str];

    ///
    /// Compute the mask, assuming all required columns are present
    ///
    /// Use [`LeafFilter::mask`] instead, which validates the columns first.
    fn compute_mask(&self, table: &EventTable) -> Result<RowMask, FilterError>;

    ///
    /// Compute the keep-mask of this filter
    ///
    /// Fails with [`FilterError::MissingColumns`] (naming all missing columns) before any row is
    /// inspected.
    fn mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        check_columns(table, self.required_columns())?;
        let mask = self.compute_mask(table)?;
        mask.check_aligned(table)?;
        Ok(mask)
    }
}

///
/// Filter tree over an [`EventTable`]
///
/// Leaves are the built-in filters, inner nodes combine the masks of their children.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// See [`AgentFilter`]
    Agent(AgentFilter),
    /// See [`CaseHasActivityFilter`]
    CaseHasActivity(CaseHasActivityFilter),
    /// See [`TimeWindowFilter`]
    TimeWindow(TimeWindowFilter),
    /// See [`CaseFilter`]
    Case(CaseFilter),
    /// See [`DirectlyFollowsFilter`]
    DirectlyFollows(DirectlyFollowsFilter),
    /// See [`EventuallyFollowsFilter`]
    EventuallyFollows(EventuallyFollowsFilter),
    /// Rows kept by both children
    And(Box<Filter>, Box<Filter>),
    /// Rows kept by at least one child
    Or(Box<Filter>, Box<Filter>),
    /// Rows not kept by the child
    Not(Box<Filter>),
}

/// Combine two filters with logical AND
pub fn and(left: Filter, right: Filter) -> Filter {
    Filter::And(Box::new(left), Box::new(right))
}

/// Combine two filters with logical OR
pub fn or(left: Filter, right: Filter) -> Filter {
    Filter::Or(Box::new(left), Box::new(right))
}

/// Negate a filter
pub fn not(inner: Filter) -> Filter {
    Filter::Not(Box::new(inner))
}

impl Filter {
    /// `self AND other`
    pub fn and(self, other: Filter) -> Filter {
        and(self, other)
    }

    /// `self OR other`
    pub fn or(self, other: Filter) -> Filter {
        or(self, other)
    }

    /// `NOT self`
    pub fn negated(self) -> Filter {
        not(self)
    }

    fn as_leaf(&self) -> Option<&dyn LeafFilter> {
        match self {
            Filter::Agent(f) => Some(f),
            Filter::CaseHasActivity(f) => Some(f),
            Filter::TimeWindow(f) => Some(f),
            Filter::Case(f) => Some(f),
            Filter::DirectlyFollows(f) => Some(f),
            Filter::EventuallyFollows(f) => Some(f),
            Filter::And(..) | Filter::Or(..) | Filter::Not(..) => None,
        }
    }

    ///
    /// Union of the required columns of all leaves of this filter tree
    ///
    pub fn required_columns(&self) -> BTreeSet<&'static str> {
        match self {
            Filter::And(l, r) | Filter::Or(l, r) => {
                let mut cols = l.required_columns();
                cols.extend(r.required_columns());
                cols
            }
            Filter::Not(inner) => inner.required_columns(),
            leaf => leaf
                .as_leaf()
                .map(|f| f.required_columns().iter().copied().collect())
                .unwrap_or_default(),
        }
    }

    ///
    /// Compute the keep-mask of this filter for `table`
    ///
    pub fn mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        match self {
            Filter::And(l, r) => Ok(l.mask(table)?.and(&r.mask(table)?)?),
            Filter::Or(l, r) => Ok(l.mask(table)?.or(&r.mask(table)?)?),
            Filter::Not(inner) => Ok(inner.mask(table)?.negate()),
            leaf => match leaf.as_leaf() {
                Some(f) => f.mask(table),
                None => Ok(RowMask::constant(table, true)),
            },
        }
    }

    ///
    /// Return a new table with the rows kept by this filter (input is not modified)
    ///
    pub fn apply(&self, table: &EventTable) -> Result<EventTable, FilterError> {
        let mask = self.mask(table)?;
        Ok(table.select(&mask)?)
    }
}

macro_rules! leaf_into_filter {
    ($($leaf:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$leaf> for Filter {
                fn from(value: $leaf) -> Self {
                    Filter::$variant(value)
                }
            }
        )*
    };
}

leaf_into_filter!(
    AgentFilter => Agent,
    CaseHasActivityFilter => CaseHasActivity,
    TimeWindowFilter => TimeWindow,
    CaseFilter => Case,
    DirectlyFollowsFilter => DirectlyFollows,
    EventuallyFollowsFilter => EventuallyFollows,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::AGENT, event_table};

    fn table() -> EventTable {
        event_table!(
            ["CASE_ID", "ACTIVITY", "START_TIMESTAMP", "END_TIMESTAMP", "AGENT"];
            ["c1", "greet", "2024-01-01 10:00:00", "2024-01-01 10:00:01", "ai"],
            ["c1", "ask", "2024-01-01 10:01:00", "2024-01-01 10:01:30", "human"],
            ["c2", "greet", "2024-01-02 10:00:00", "2024-01-02 10:00:01", "ai"],
            ["c2", "handover", "2024-01-02 10:05:00", "2024-01-02 10:05:00", "syst"],
        )
    }

    #[test]
    fn and_or_not_combine_masks() {
        let table = table();
        let ai: Filter = AgentFilter::new("ai", false).unwrap().into();
        let c1: Filter = CaseFilter::new(["c1"]).into();
        assert_eq!(
            ai.clone().and(c1.clone()).mask(&table).unwrap().decisions(),
            &[true, false, false, false]
        );
        assert_eq!(
            ai.clone().or(c1.clone()).mask(&table).unwrap().decisions(),
            &[true, true, true, false]
        );
        assert_eq!(
            not(ai).mask(&table).unwrap().decisions(),
            &[false, true, false, true]
        );
    }

    #[test]
    fn filter_and_its_negation_keep_nothing() {
        let table = table();
        let f: Filter = CaseHasActivityFilter::new("ask").into();
        let contradiction = and(f.clone(), f.negated());
        assert!(contradiction.apply(&table).unwrap().is_empty());
    }

    #[test]
    fn missing_columns_propagate_through_combinators() {
        let table = event_table!(["CASE_ID", "ACTIVITY"]; ["c1", "greet"]);
        let f = or(
            CaseFilter::new(["c1"]).into(),
            not(AgentFilter::new("human", true).unwrap().into()),
        );
        match f.mask(&table) {
            Err(FilterError::MissingColumns(e)) => assert_eq!(e.missing, vec![AGENT]),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn required_columns_are_united() {
        let f = and(
            AgentFilter::new("ai", true).unwrap().into(),
            DirectlyFollowsFilter::new("a", "b").into(),
        );
        let cols: Vec<_> = f.required_columns().into_iter().collect();
        assert_eq!(cols, vec!["ACTIVITY", "AGENT", "CASE_ID", "START_TIMESTAMP"]);
    }

    #[test]
    fn apply_does_not_modify_input() {
        let table = table();
        let before = table.clone();
        let out = Filter::from(CaseFilter::new(["c2"])).apply(&table).unwrap();
        assert_eq!(out.row_indices(), vec![2, 3]);
        assert_eq!(table, before);
    }
}
