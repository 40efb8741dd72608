use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, TimeDelta};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{is_system_agent, ACTIVITY, AGENT, CASE_ID, END_TIMESTAMP, EVENT_ID, START_TIMESTAMP},
    table::{AttributeValue, EventRow, EventTable},
};

use super::{AggregationError, CaseAggregator, CaseRows, VariantInfo};

fn default_joiner() -> String {
    ">".to_string()
}

///
/// Computes the variant (ordered activity sequence) of every case
///
/// Events are ordered by start timestamp (unparseable timestamps last), ties broken by
/// `EVENT_ID` (numeric identifiers before textual ones, if the column exists) and finally by
/// row order. Variant frequencies are computed over the whole table, and display identifiers
/// (`"variant 1"`, `"variant 2"`, ...) are assigned by descending frequency, ties broken by the
/// first occurrence in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaseVariantAggregator {
    /// Drop events of the system agent before building variants
    pub ignore_syst: bool,
    /// Separator between activity labels
    pub joiner: String,
}

impl Default for CaseVariantAggregator {
    fn default() -> Self {
        Self {
            ignore_syst: false,
            joiner: default_joiner(),
        }
    }
}

impl CaseVariantAggregator {
    /// Create a new variant aggregator
    pub fn new(ignore_syst: bool, joiner: impl Into<String>) -> Self {
        Self {
            ignore_syst,
            joiner: joiner.into(),
        }
    }
}

/// Tie-breaker between events with equal start timestamps
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum EventOrdinal {
    Numeric(OrderedFloat<f64>),
    Text(String),
    Missing,
}

impl EventOrdinal {
    fn of(value: Option<&AttributeValue>) -> Self {
        match value {
            None => EventOrdinal::Missing,
            Some(v) if v.is_none() => EventOrdinal::Missing,
            Some(v) => match v.to_number() {
                Some(n) => EventOrdinal::Numeric(OrderedFloat(n)),
                None => EventOrdinal::Text(v.to_string()),
            },
        }
    }
}

///
/// Global state of [`CaseVariantAggregator`]
///
#[derive(Debug, Clone, Default)]
pub struct VariantState {
    case_to_variant: HashMap<AttributeValue, String>,
    variants: HashMap<String, VariantInfo>,
    ranked: Vec<String>,
}

impl VariantState {
    /// All variants, most frequent first
    pub fn ranked(&self) -> impl Iterator<Item = &VariantInfo> {
        self.ranked.iter().filter_map(|v| self.variants.get(v))
    }

    /// Variant information for a variant String
    pub fn get(&self, variant: &str) -> Option<&VariantInfo> {
        self.variants.get(variant)
    }
}

impl CaseVariantAggregator {
    fn variant_of(
        &self,
        rows: &[&EventRow],
        act_col: usize,
        start_col: usize,
        agent_col: Option<usize>,
        event_id_col: Option<usize>,
    ) -> (String, usize) {
        let activities: Vec<String> = rows
            .iter()
            .filter(|row| {
                !(self.ignore_syst
                    && agent_col.is_some_and(|c| is_system_agent(&row.get(c).to_string())))
            })
            .map(|row| {
                let ts = row.get(start_col).to_timestamp();
                let ord = EventOrdinal::of(event_id_col.map(|c| row.get(c)));
                ((ts.is_none(), ts, ord, row.index), row.get(act_col).to_string())
            })
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, act)| act)
            .collect();
        (activities.join(&self.joiner), activities.len())
    }
}

impl CaseAggregator for CaseVariantAggregator {
    type State = VariantState;
    type Value = VariantInfo;

    fn name(&self) -> &'static str {
        "variant"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID, ACTIVITY, START_TIMESTAMP]
    }

    fn prepare(&self, table: &EventTable) -> Result<VariantState, AggregationError> {
        let case_col = super::column(table, CASE_ID)?;
        let act_col = super::column(table, ACTIVITY)?;
        let start_col = super::column(table, START_TIMESTAMP)?;
        let agent_col = table.column_index(AGENT);
        let event_id_col = table.column_index(EVENT_ID);

        let mut state = VariantState::default();
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();
        for (case_id, rows) in table.group_by(case_col) {
            let (variant, length) =
                self.variant_of(&rows, act_col, start_col, agent_col, event_id_col);
            let entry = counts.entry(variant.clone()).or_insert_with(|| {
                first_seen.push(variant.clone());
                (0, length)
            });
            entry.0 += 1;
            state.case_to_variant.insert(case_id.clone(), variant);
        }
        // Stable sort: equal frequencies keep first-occurrence order
        let ranked: Vec<String> = first_seen
            .into_iter()
            .sorted_by_key(|v| std::cmp::Reverse(counts.get(v).map(|c| c.0).unwrap_or_default()))
            .collect();
        for (i, variant) in ranked.iter().enumerate() {
            let (frequency, length) = counts.get(variant).copied().unwrap_or_default();
            state.variants.insert(
                variant.clone(),
                VariantInfo {
                    variant_id: format!("variant {}", i + 1),
                    variant_key: VariantInfo::key_for(variant),
                    variant: variant.clone(),
                    frequency,
                    length,
                },
            );
        }
        state.ranked = ranked;
        Ok(state)
    }

    fn compute_case(
        &self,
        case: &CaseRows<'_>,
        state: &VariantState,
    ) -> Result<VariantInfo, AggregationError> {
        state
            .case_to_variant
            .get(case.case_id)
            .and_then(|v| state.variants.get(v))
            .cloned()
            .ok_or_else(|| AggregationError::UnknownCase(case.case_id.to_string()))
    }
}

fn min_start(case: &CaseRows<'_>) -> Option<DateTime<FixedOffset>> {
    case.column_values(START_TIMESTAMP)?
        .filter_map(|v| v.to_timestamp())
        .min()
}

///
/// Computes the date (`YYYY-MM-DD`) of the earliest start timestamp of every case
///
/// Cases without any parseable start timestamp are mapped to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseDateAggregator {}

impl CaseAggregator for CaseDateAggregator {
    type State = ();
    type Value = Option<String>;

    fn name(&self) -> &'static str {
        "case_date"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID, START_TIMESTAMP]
    }

    fn prepare(&self, _table: &EventTable) -> Result<(), AggregationError> {
        Ok(())
    }

    fn compute_case(
        &self,
        case: &CaseRows<'_>,
        _state: &(),
    ) -> Result<Option<String>, AggregationError> {
        Ok(min_start(case).map(|ts| ts.date_naive().format("%Y-%m-%d").to_string()))
    }
}

///
/// Computes the duration of every case
///
/// The duration spans from the earliest start timestamp to the latest end timestamp, where
/// missing (or unparseable) end timestamps are replaced by the start timestamp of the same
/// event. Cases without valid timestamps have a zero duration; durations are never negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseDurationAggregator {}

impl CaseAggregator for CaseDurationAggregator {
    type State = ();
    type Value = TimeDelta;

    fn name(&self) -> &'static str {
        "case_duration"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID, START_TIMESTAMP]
    }

    fn prepare(&self, _table: &EventTable) -> Result<(), AggregationError> {
        Ok(())
    }

    fn compute_case(&self, case: &CaseRows<'_>, _state: &()) -> Result<TimeDelta, AggregationError> {
        let start_col = super::column(case.table, START_TIMESTAMP)?;
        let end_col = case.table.column_index(END_TIMESTAMP);
        let first = min_start(case);
        let last = case
            .rows
            .iter()
            .filter_map(|row| {
                end_col
                    .and_then(|c| row.get(c).to_timestamp())
                    .or_else(|| row.get(start_col).to_timestamp())
            })
            .max();
        Ok(match (first, last) {
            (Some(first), Some(last)) if last > first => last - first,
            _ => TimeDelta::zero(),
        })
    }
}
