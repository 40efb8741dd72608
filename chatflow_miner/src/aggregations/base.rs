use std::{collections::HashMap, fmt::Debug};

use serde::{ser::Serializer, Serialize};

use crate::table::{AttributeValue, EventRow, EventTable};

use super::{AggregationError, CaseValue};

///
/// The events of a single case, as passed to [`CaseAggregator::compute_case`]
///
/// Rows keep the order of the (transformed) table.
#[derive(Debug, Clone)]
pub struct CaseRows<'a> {
    /// Case identifier shared by all rows
    pub case_id: &'a AttributeValue,
    /// Rows of the case
    pub rows: Vec<&'a EventRow>,
    /// The table the rows belong to (for column lookups)
    pub table: &'a EventTable,
}

impl<'a> CaseRows<'a> {
    /// Values of `column` for all rows of the case (`None` if the column does not exist)
    pub fn column_values(
        &self,
        column: &str,
    ) -> Option<impl Iterator<Item = &'a AttributeValue> + '_> {
        let col = self.table.column_index(column)?;
        Some(self.rows.iter().map(move |&r| r.get(col)))
    }

    /// Number of events of the case
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Checks if the case has no events
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

///
/// Two-phase per-case aggregation
///
/// [`CaseAggregator::prepare`] is called once per computation on the whole table and may build
/// global state (e.g., variant frequencies). [`CaseAggregator::compute_case`] is then called
/// once per distinct case identifier and must only depend on the case rows and that state.
///
/// Required columns are validated before `prepare` is called.
pub trait CaseAggregator: Debug {
    /// Global state computed by [`CaseAggregator::prepare`]
    type State;
    /// Per-case result
    type Value;

    /// Short name used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Columns that must be present in the (transformed) table
    fn required_columns(&self) -> &'static [&'static str];

    /// Compute global state over the whole table
    fn prepare(&self, table: &EventTable) -> Result<Self::State, AggregationError>;

    /// Compute the value of a single case
    fn compute_case(
        &self,
        case: &CaseRows<'_>,
        state: &Self::State,
    ) -> Result<Self::Value, AggregationError>;
}

///
/// A [`CaseAggregator`] after [`DynCaseAggregator::prepare_boxed`], holding its global state
///
pub trait PreparedAggregator {
    /// Compute the value of a single case
    fn compute_case(&self, case: &CaseRows<'_>) -> Result<CaseValue, AggregationError>;
}

///
/// Object-safe form of [`CaseAggregator`] with results converted to [`CaseValue`]
///
/// Implemented for all built-in aggregators; used for aggregators selected at runtime
/// ([`BoxedAggregator`]).
pub trait DynCaseAggregator: Debug {
    /// Short name used in logs
    fn kind(&self) -> &'static str;
    /// Columns that must be present in the (transformed) table
    fn columns(&self) -> &'static [&'static str];
    /// Run the prepare phase, returning an aggregator bound to its state
    fn prepare_boxed(
        &self,
        table: &EventTable,
    ) -> Result<Box<dyn PreparedAggregator>, AggregationError>;
}

/// A type-erased aggregator, as built from a declarative specification
pub type BoxedAggregator = Box<dyn DynCaseAggregator>;

struct Prepared<A: CaseAggregator> {
    aggregator: A,
    state: A::State,
}

impl<A> PreparedAggregator for Prepared<A>
where
    A: CaseAggregator,
    A::Value: Into<CaseValue>,
{
    fn compute_case(&self, case: &CaseRows<'_>) -> Result<CaseValue, AggregationError> {
        Ok(self.aggregator.compute_case(case, &self.state)?.into())
    }
}

impl<A> DynCaseAggregator for A
where
    A: CaseAggregator + Clone + 'static,
    A::State: 'static,
    A::Value: Into<CaseValue>,
{
    fn kind(&self) -> &'static str {
        self.name()
    }

    fn columns(&self) -> &'static [&'static str] {
        self.required_columns()
    }

    fn prepare_boxed(
        &self,
        table: &EventTable,
    ) -> Result<Box<dyn PreparedAggregator>, AggregationError> {
        let state = self.prepare(table)?;
        Ok(Box::new(Prepared {
            aggregator: self.clone(),
            state,
        }))
    }
}

impl CaseAggregator for BoxedAggregator {
    type State = Box<dyn PreparedAggregator>;
    type Value = CaseValue;

    fn name(&self) -> &'static str {
        self.kind()
    }

    fn required_columns(&self) -> &'static [&'static str] {
        self.columns()
    }

    fn prepare(&self, table: &EventTable) -> Result<Self::State, AggregationError> {
        self.prepare_boxed(table)
    }

    fn compute_case(
        &self,
        case: &CaseRows<'_>,
        state: &Self::State,
    ) -> Result<Self::Value, AggregationError> {
        state.compute_case(case)
    }
}

///
/// Ordered mapping from case identifier to per-case value
///
/// Iteration follows the first appearance of each case in the table.
/// Serializes as a map keyed by the String representation of the case identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseMap<V> {
    entries: Vec<(AttributeValue, V)>,
    index: HashMap<AttributeValue, usize>,
}

impl<V> Default for CaseMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> CaseMap<V> {
    /// Insert (or replace) the value of a case; new cases are appended
    pub fn insert(&mut self, case_id: AttributeValue, value: V) {
        match self.index.get(&case_id) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(case_id.clone(), self.entries.len());
                self.entries.push((case_id, value));
            }
        }
    }

    /// Value of a case
    pub fn get(&self, case_id: &AttributeValue) -> Option<&V> {
        self.index.get(case_id).map(|&pos| &self.entries[pos].1)
    }

    /// Number of cases
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if there are no cases
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(case_id, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&AttributeValue, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Case identifiers in order
    pub fn case_ids(&self) -> impl Iterator<Item = &AttributeValue> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Values in order
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<V> IntoIterator for CaseMap<V> {
    type Item = (AttributeValue, V);
    type IntoIter = std::vec::IntoIter<(AttributeValue, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V> FromIterator<(AttributeValue, V)> for CaseMap<V> {
    fn from_iter<T: IntoIterator<Item = (AttributeValue, V)>>(iter: T) -> Self {
        let mut map = CaseMap::default();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for CaseMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k.to_string(), v)))
    }
}
