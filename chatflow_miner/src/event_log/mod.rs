//! Lazy Event Log Views
use std::{fmt::Display, io::Write, path::Path, sync::Arc};

use crate::{
    constants::CASE_ID,
    filters::{column, Filter, FilterError},
    table::{
        io::{export_event_table_csv, TableIOError},
        EventTable, RowMask,
    },
};

/// Error while materializing and exporting an [`EventLogView`]
#[derive(Debug)]
pub enum ViewExportError {
    /// Computing the view failed
    Filter(FilterError),
    /// Writing the result failed
    Export(TableIOError),
}

impl Display for ViewExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewExportError::Filter(e) => write!(f, "Could not compute view: {e}"),
            ViewExportError::Export(e) => write!(f, "Could not export view: {e}"),
        }
    }
}

impl std::error::Error for ViewExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewExportError::Filter(e) => Some(e),
            ViewExportError::Export(e) => Some(e),
        }
    }
}

impl From<FilterError> for ViewExportError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

impl From<TableIOError> for ViewExportError {
    fn from(e: TableIOError) -> Self {
        Self::Export(e)
    }
}

///
/// Immutable, lazy view over an [`EventTable`]
///
/// A view holds the base table and an ordered list of [`Filter`]s. Adding filters returns a
/// _new_ view; nothing is evaluated until [`EventLogView::compute`] is called, which returns the
/// rows kept by _all_ filters (in original row order). Results are not cached.
///
/// ```rust
/// use chatflow_miner::{event_log::EventLogView, event_table, filters::CaseFilter};
///
/// let view = EventLogView::new(event_table!(
///     ["CASE_ID", "ACTIVITY"];
///     ["c1", "greet"],
///     ["c2", "greet"],
/// ));
/// let only_c2 = view.filter(CaseFilter::new(["c2"]).into());
/// assert_eq!(view.compute().unwrap().len(), 2);
/// assert_eq!(only_c2.compute().unwrap().row_indices(), vec![1]);
/// ```
#[derive(Debug, Clone)]
pub struct EventLogView {
    base: Arc<EventTable>,
    filters: Vec<Filter>,
}

impl EventLogView {
    /// Create a new view without filters
    pub fn new(base: EventTable) -> Self {
        Self::from_shared(Arc::new(base))
    }

    /// Create a new view without filters over an already shared table
    pub fn from_shared(base: Arc<EventTable>) -> Self {
        Self {
            base,
            filters: Vec::new(),
        }
    }

    /// The (unfiltered) base table
    pub fn base(&self) -> &EventTable {
        &self.base
    }

    /// The filters of this view (in order)
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Returns a new view with `filter` appended
    pub fn filter(&self, filter: Filter) -> EventLogView {
        self.filter_all([filter])
    }

    /// Returns a new view with all `filters` appended (in order)
    pub fn filter_all(&self, filters: impl IntoIterator<Item = Filter>) -> EventLogView {
        let mut new_filters = self.filters.clone();
        new_filters.extend(filters);
        EventLogView {
            base: Arc::clone(&self.base),
            filters: new_filters,
        }
    }

    ///
    /// Materialize the view
    ///
    /// Returns a fresh table holding the rows kept by every filter. Without filters, the result
    /// equals the base table.
    pub fn compute(&self) -> Result<EventTable, FilterError> {
        if self.filters.is_empty() {
            return Ok(self.base.as_ref().clone());
        }
        let mut mask = RowMask::constant(&self.base, true);
        for f in &self.filters {
            mask = mask.and(&f.mask(&self.base)?)?;
        }
        let out = self.base.select(&mask)?;
        tracing::debug!(
            filters = self.filters.len(),
            base_rows = self.base.len(),
            kept_rows = out.len(),
            "Computed event log view"
        );
        Ok(out)
    }

    /// The first `n` rows of the materialized view
    pub fn head(&self, n: usize) -> Result<EventTable, FilterError> {
        Ok(self.compute()?.head(n))
    }

    /// Number of events (rows) of the materialized view
    pub fn num_events(&self) -> Result<usize, FilterError> {
        Ok(self.compute()?.len())
    }

    /// Number of distinct (non-missing) case identifiers of the materialized view
    pub fn num_cases(&self) -> Result<usize, FilterError> {
        let table = self.compute()?;
        let case_col = column(&table, CASE_ID)?;
        Ok(table.group_by(case_col).len())
    }

    /// Write the materialized view as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ViewExportError> {
        let table = self.compute()?;
        export_event_table_csv(writer, &table)?;
        Ok(())
    }

    /// Write the materialized view as CSV file
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ViewExportError> {
        let file = std::fs::File::create(path).map_err(TableIOError::from)?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}
