use std::{borrow::Cow, sync::Arc};

use crate::{
    constants::CASE_ID,
    table::{check_columns, EventTable},
};

use super::{column, AggregationError, AuxOp, BoxedAggregator, CaseAggregator, CaseMap, CaseRows};

///
/// Immutable, lazy per-case aggregation over an [`EventTable`]
///
/// Auxiliary operations ([`CaseAggView::with_aux`]) and the aggregator
/// ([`CaseAggView::with_aggregator`]) are only run on [`CaseAggView::compute`].
///
/// ```rust
/// use chatflow_miner::{
///     aggregations::{CaseAggView, CaseDateAggregator, NormalizeTimestampsOp},
///     event_table,
/// };
///
/// let table = event_table!(
///     ["CASE_ID", "START_TIMESTAMP"];
///     ["c1", "2024-03-04 09:00:00"],
///     ["c2", "2024-03-05 10:00:00"],
/// );
/// let dates = CaseAggView::new(table)
///     .with_aux(NormalizeTimestampsOp)
///     .with_aggregator(CaseDateAggregator::default())
///     .compute()
///     .unwrap();
/// assert_eq!(dates.get(&"c2".into()), Some(&Some("2024-03-05".to_string())));
/// ```
#[derive(Debug)]
pub struct CaseAggView<A = BoxedAggregator> {
    base: Arc<EventTable>,
    aux_ops: Vec<Arc<dyn AuxOp>>,
    aggregator: Option<Arc<A>>,
}

impl<A> Clone for CaseAggView<A> {
    fn clone(&self) -> Self {
        Self {
            base: Arc::clone(&self.base),
            aux_ops: self.aux_ops.clone(),
            aggregator: self.aggregator.clone(),
        }
    }
}

impl CaseAggView<BoxedAggregator> {
    /// Create a new aggregation view without auxiliary operations or aggregator
    pub fn new(base: EventTable) -> Self {
        Self::from_shared(Arc::new(base))
    }

    /// Create a new aggregation view over an already shared table
    pub fn from_shared(base: Arc<EventTable>) -> Self {
        Self {
            base,
            aux_ops: Vec::new(),
            aggregator: None,
        }
    }
}

impl<A> CaseAggView<A> {
    /// Returns a new view with `op` appended to the auxiliary operations
    pub fn with_aux(&self, op: impl AuxOp + 'static) -> Self {
        let mut view = self.clone();
        view.aux_ops.push(Arc::new(op));
        view
    }

    /// Returns a new view using `aggregator`
    pub fn with_aggregator<B>(&self, aggregator: B) -> CaseAggView<B> {
        CaseAggView {
            base: Arc::clone(&self.base),
            aux_ops: self.aux_ops.clone(),
            aggregator: Some(Arc::new(aggregator)),
        }
    }

    /// The aggregator of this view (if set)
    pub fn aggregator(&self) -> Option<&A> {
        self.aggregator.as_deref()
    }

    /// The (untransformed) base table
    pub fn base(&self) -> &EventTable {
        &self.base
    }
}

impl<A: CaseAggregator> CaseAggView<A> {
    ///
    /// Run the aggregation
    ///
    /// Applies the auxiliary operations in order, validates the aggregator's required columns
    /// against the transformed table, prepares the aggregator once and then computes one value
    /// per case (in order of first appearance).
    ///
    /// Fails with [`AggregationError::NoAggregator`] if no aggregator was set.
    pub fn compute(&self) -> Result<CaseMap<A::Value>, AggregationError> {
        let aggregator = self
            .aggregator
            .as_ref()
            .ok_or(AggregationError::NoAggregator)?;

        let mut table: Cow<'_, EventTable> = Cow::Borrowed(self.base.as_ref());
        for op in &self.aux_ops {
            table = Cow::Owned(op.apply(&table)?);
        }
        check_columns(&table, aggregator.required_columns())?;
        let case_col = column(&table, CASE_ID)?;

        let state = aggregator.prepare(&table)?;
        let mut out = CaseMap::default();
        for (case_id, rows) in table.group_by(case_col) {
            let case = CaseRows {
                case_id,
                rows,
                table: &table,
            };
            let value = aggregator.compute_case(&case, &state)?;
            out.insert(case_id.clone(), value);
        }
        tracing::debug!(
            aggregator = aggregator.name(),
            aux_ops = self.aux_ops.len(),
            cases = out.len(),
            "Computed case aggregation"
        );
        Ok(out)
    }
}
