//! Event Tables
//!
//! Flat, row-oriented event data: every row maps a fixed set of named columns to
//! [`AttributeValue`]s and carries a stable row index that survives filtering
//! and other transformations.
mod attribute_value;
pub mod io;
pub mod macros;
pub mod timestamp_utils;

use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use attribute_value::AttributeValue;
#[doc(inline)]
pub use timestamp_utils::parse_timestamp;

///
/// Error raised when a table lacks columns required by an operation
///
/// Always carries _all_ missing column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumnsError {
    /// Names of the missing columns (in declaration order of the requirement)
    pub missing: Vec<String>,
}

impl Display for MissingColumnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Missing columns: {}", self.missing.join(", "))
    }
}

impl std::error::Error for MissingColumnsError {}

///
/// Check that all `required` columns are present in `table`
///
/// Shared by filters, auxiliary operations and aggregators, so that schema errors are
/// raised before any row is inspected.
pub fn check_columns(table: &EventTable, required: &[&str]) -> Result<(), MissingColumnsError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingColumnsError { missing })
    }
}

/// Errors while constructing or modifying an [`EventTable`]
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    /// A row does not have exactly one value per column
    RowWidthMismatch {
        /// Number of columns of the table
        expected: usize,
        /// Number of values in the row
        found: usize,
    },
    /// The same column name was given twice
    DuplicateColumn(String),
    /// A new column does not have exactly one value per row
    ColumnLengthMismatch {
        /// Number of rows of the table
        expected: usize,
        /// Number of values given for the column
        found: usize,
    },
}

impl Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::RowWidthMismatch { expected, found } => {
                write!(f, "Row has {found} values, but the table has {expected} columns")
            }
            TableError::DuplicateColumn(c) => write!(f, "Duplicate column: {c}"),
            TableError::ColumnLengthMismatch { expected, found } => {
                write!(f, "Column has {found} values, but the table has {expected} rows")
            }
        }
    }
}

impl std::error::Error for TableError {}

///
/// A single event (row) of an [`EventTable`]
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Stable row index (assigned once, preserved by filtering)
    pub index: usize,
    /// One value per column of the owning table
    pub values: Vec<AttributeValue>,
}

impl EventRow {
    /// Value at column position `col`
    pub fn get(&self, col: usize) -> &AttributeValue {
        &self.values[col]
    }
}

///
/// Ordered collection of events with a fixed column set
///
/// Invariant: every row has exactly one value per column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventTable {
    columns: Vec<String>,
    rows: Vec<EventRow>,
}

impl EventTable {
    /// Create a new table with the given columns and no rows
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].contains(c) {
                return Err(TableError::DuplicateColumn(c.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a table from columns and row values
    ///
    /// Row indices are assigned in the given order, starting at 0.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<AttributeValue>>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns)?;
        for values in rows {
            table.push_row(values)?;
        }
        Ok(table)
    }

    /// Append a row, assigning the next free row index
    pub fn push_row(&mut self, values: Vec<AttributeValue>) -> Result<(), TableError> {
        if values.len() != self.columns.len() {
            return Err(TableError::RowWidthMismatch {
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        let index = self.rows.last().map(|r| r.index + 1).unwrap_or_default();
        self.rows.push(EventRow { index, values });
        Ok(())
    }

    /// Column names (in order)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Checks if the table has a column with the given name
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// All rows (in order)
    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Checks if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row indices of all rows (in order)
    pub fn row_indices(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.index).collect()
    }

    /// Value of `row` in the column named `column`
    pub fn value<'a>(&self, row: &'a EventRow, column: &str) -> Option<&'a AttributeValue> {
        self.column_index(column).map(|c| row.get(c))
    }

    /// All values of a column (in row order)
    pub fn column_values<'a>(
        &'a self,
        column: &str,
    ) -> Option<impl Iterator<Item = &'a AttributeValue> + 'a> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| r.get(col)))
    }

    /// Returns a new table holding the first `n` rows
    pub fn head(&self, n: usize) -> EventTable {
        EventTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    ///
    /// Returns a new table restricted to the rows selected by `mask`
    ///
    /// The mask must be aligned to this table (see [`RowMask::check_aligned`]).
    /// Row indices and row order are preserved.
    pub fn select(&self, mask: &RowMask) -> Result<EventTable, MaskAlignmentError> {
        mask.check_aligned(self)?;
        Ok(EventTable {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .zip(mask.keep.iter())
                .filter(|(_, keep)| **keep)
                .map(|(r, _)| r.clone())
                .collect(),
        })
    }

    ///
    /// Returns a new table where column `name` holds `values`
    ///
    /// Replaces the column if it already exists, otherwise appends it.
    pub fn with_column(
        &self,
        name: &str,
        values: Vec<AttributeValue>,
    ) -> Result<EventTable, TableError> {
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLengthMismatch {
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        let mut out = self.clone();
        match out.column_index(name) {
            Some(col) => {
                for (row, v) in out.rows.iter_mut().zip(values) {
                    row.values[col] = v;
                }
            }
            None => {
                out.columns.push(name.to_string());
                for (row, v) in out.rows.iter_mut().zip(values) {
                    row.values.push(v);
                }
            }
        }
        Ok(out)
    }

    ///
    /// Group rows by the value of the column at position `col`
    ///
    /// Groups are returned in order of first appearance; rows inside a group keep table order.
    /// Rows with a missing ([`AttributeValue::None`]) key are not part of any group.
    pub fn group_by(&self, col: usize) -> Vec<(&AttributeValue, Vec<&EventRow>)> {
        let mut positions: HashMap<&AttributeValue, usize> = HashMap::new();
        let mut groups: Vec<(&AttributeValue, Vec<&EventRow>)> = Vec::new();
        for row in &self.rows {
            let key = row.get(col);
            if key.is_none() {
                continue;
            }
            match positions.get(key) {
                Some(&pos) => groups[pos].1.push(row),
                None => {
                    positions.insert(key, groups.len());
                    groups.push((key, vec![row]));
                }
            }
        }
        groups
    }

    ///
    /// Group rows by case (column `case_col`) and order the rows of each case by timestamp
    ///
    /// Rows are sorted by the timestamp in column `ts_col` (missing or unparseable timestamps
    /// last), ties keep table order.
    pub fn traces(&self, case_col: usize, ts_col: usize) -> Vec<(&AttributeValue, Vec<&EventRow>)> {
        let mut groups = self.group_by(case_col);
        for (_, rows) in groups.iter_mut() {
            rows.sort_by_cached_key(|row| {
                let ts = row.get(ts_col).to_timestamp();
                (ts.is_none(), ts, row.index)
            });
        }
        groups
    }
}

/// Error raised when a [`RowMask`] is not aligned to the table it is applied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskAlignmentError {
    /// Number of rows of the table
    pub table_rows: usize,
    /// Number of entries in the mask
    pub mask_rows: usize,
}

impl Display for MaskAlignmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Mask index does not match the table index ({} mask entries for {} rows)",
            self.mask_rows, self.table_rows
        )
    }
}

impl std::error::Error for MaskAlignmentError {}

///
/// Boolean keep-decision per row, aligned to the row index of a table
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMask {
    index: Vec<usize>,
    keep: Vec<bool>,
}

impl RowMask {
    /// A mask with the same decision for every row of `table`
    pub fn constant(table: &EventTable, value: bool) -> Self {
        Self {
            index: table.row_indices(),
            keep: vec![value; table.len()],
        }
    }

    /// Create a mask from one decision per row of `table` (in row order)
    pub fn from_decisions(
        table: &EventTable,
        keep: Vec<bool>,
    ) -> Result<Self, MaskAlignmentError> {
        if keep.len() != table.len() {
            return Err(MaskAlignmentError {
                table_rows: table.len(),
                mask_rows: keep.len(),
            });
        }
        Ok(Self {
            index: table.row_indices(),
            keep,
        })
    }

    /// Create a mask by evaluating `f` on every row of `table`
    pub fn from_fn(table: &EventTable, f: impl FnMut(&EventRow) -> bool) -> Self {
        Self {
            index: table.row_indices(),
            keep: table.rows().iter().map(f).collect(),
        }
    }

    /// Row indices the decisions refer to
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Decisions (in row order)
    pub fn decisions(&self) -> &[bool] {
        &self.keep
    }

    /// Number of kept rows
    pub fn count_kept(&self) -> usize {
        self.keep.iter().filter(|k| **k).count()
    }

    /// Number of decisions
    pub fn len(&self) -> usize {
        self.keep.len()
    }

    /// Checks if the mask has no decisions at all
    pub fn is_empty(&self) -> bool {
        self.keep.is_empty()
    }

    /// Checks that this mask has exactly the row index of `table`
    pub fn check_aligned(&self, table: &EventTable) -> Result<(), MaskAlignmentError> {
        let aligned = self.keep.len() == table.len()
            && self
                .index
                .iter()
                .zip(table.rows().iter())
                .all(|(i, r)| *i == r.index);
        if aligned {
            Ok(())
        } else {
            Err(MaskAlignmentError {
                table_rows: table.len(),
                mask_rows: self.keep.len(),
            })
        }
    }

    fn combine(
        &self,
        other: &RowMask,
        op: impl Fn(bool, bool) -> bool,
    ) -> Result<RowMask, MaskAlignmentError> {
        if self.index != other.index {
            return Err(MaskAlignmentError {
                table_rows: self.keep.len(),
                mask_rows: other.keep.len(),
            });
        }
        Ok(RowMask {
            index: self.index.clone(),
            keep: self
                .keep
                .iter()
                .zip(other.keep.iter())
                .map(|(a, b)| op(*a, *b))
                .collect(),
        })
    }

    /// Row-wise logical AND (both masks must share the same index)
    pub fn and(&self, other: &RowMask) -> Result<RowMask, MaskAlignmentError> {
        self.combine(other, |a, b| a && b)
    }

    /// Row-wise logical OR (both masks must share the same index)
    pub fn or(&self, other: &RowMask) -> Result<RowMask, MaskAlignmentError> {
        self.combine(other, |a, b| a || b)
    }

    /// Row-wise logical NOT
    pub fn negate(&self) -> RowMask {
        RowMask {
            index: self.index.clone(),
            keep: self.keep.iter().map(|k| !k).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_table;

    fn sample() -> EventTable {
        event_table!(
            ["CASE_ID", "ACTIVITY"];
            ["A", "greet"],
            ["B", "greet"],
            ["A", "reply"],
            [AttributeValue::None(), "orphan"],
        )
    }

    #[test]
    fn rows_get_consecutive_indices() {
        let table = sample();
        assert_eq!(table.row_indices(), vec![0, 1, 2, 3]);
        assert_eq!(table.columns(), &["CASE_ID".to_string(), "ACTIVITY".to_string()]);
    }

    #[test]
    fn row_width_is_enforced() {
        let mut table = EventTable::new(["CASE_ID", "ACTIVITY"]).unwrap();
        let err = table.push_row(vec!["A".into()]).unwrap_err();
        assert_eq!(
            err,
            TableError::RowWidthMismatch {
                expected: 2,
                found: 1
            }
        );
        assert!(matches!(
            EventTable::new(["A", "A"]),
            Err(TableError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn check_columns_reports_all_missing() {
        let table = sample();
        let err = check_columns(&table, &["CASE_ID", "START_TIMESTAMP", "AGENT"]).unwrap_err();
        assert_eq!(err.missing, vec!["START_TIMESTAMP", "AGENT"]);
        assert!(check_columns(&table, &["ACTIVITY"]).is_ok());
    }

    #[test]
    fn select_keeps_order_and_indices() {
        let table = sample();
        let mask = RowMask::from_decisions(&table, vec![false, true, true, false]).unwrap();
        let selected = table.select(&mask).unwrap();
        assert_eq!(selected.row_indices(), vec![1, 2]);
        // Masks of the selection are not aligned with the original table anymore
        let sub_mask = RowMask::constant(&selected, true);
        assert!(table.select(&sub_mask).is_err());
    }

    #[test]
    fn group_by_keeps_first_seen_order_and_skips_missing_keys() {
        let table = sample();
        let groups = table.group_by(0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, &AttributeValue::from("A"));
        assert_eq!(
            groups[0].1.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(groups[1].0, &AttributeValue::from("B"));
    }

    #[test]
    fn with_column_appends_or_replaces() {
        let table = sample();
        let added = table
            .with_column("N", (0..4).map(|i: i64| i.into()).collect())
            .unwrap();
        assert_eq!(added.columns().len(), 3);
        assert_eq!(table.columns().len(), 2);
        let replaced = added
            .with_column("N", vec![AttributeValue::None(); 4])
            .unwrap();
        assert_eq!(replaced.columns().len(), 3);
        assert!(replaced.rows()[0].get(2).is_none());
        assert!(table.with_column("X", vec![]).is_err());
    }

    #[test]
    fn mask_combinators() {
        let table = sample();
        let a = RowMask::from_decisions(&table, vec![true, true, false, false]).unwrap();
        let b = RowMask::from_decisions(&table, vec![true, false, true, false]).unwrap();
        assert_eq!(a.and(&b).unwrap().decisions(), &[true, false, false, false]);
        assert_eq!(a.or(&b).unwrap().decisions(), &[true, true, true, false]);
        assert_eq!(a.negate().decisions(), &[false, false, true, true]);
        assert_eq!(a.count_kept(), 2);
    }
}
