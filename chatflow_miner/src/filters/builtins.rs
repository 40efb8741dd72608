use std::{collections::HashSet, fmt::Display, str::FromStr};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        is_system_agent, ACTIVITY, AGENT, AI_AGENT, CASE_ID, END_TIMESTAMP, HUMAN_AGENT,
        START_TIMESTAMP,
    },
    table::{parse_timestamp, AttributeValue, EventTable, RowMask},
};

use super::{column, FilterError, LeafFilter};

///
/// Keep events of one agent (`ai` or `human`), optionally always keeping system events
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentFilter {
    agent: String,
    include_syst: bool,
}

impl AgentFilter {
    ///
    /// Create a new agent filter
    ///
    /// `agent` is compared case-insensitively and must be `ai` or `human`.
    pub fn new(agent: &str, include_syst: bool) -> Result<Self, FilterError> {
        let agent = agent.trim().to_lowercase();
        if agent != AI_AGENT && agent != HUMAN_AGENT {
            return Err(FilterError::InvalidArgument(format!(
                "agent must be '{AI_AGENT}' or '{HUMAN_AGENT}', got '{agent}'"
            )));
        }
        Ok(Self {
            agent,
            include_syst,
        })
    }

    /// The (lowercase) agent kept by this filter
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Whether system events are always kept
    pub fn include_syst(&self) -> bool {
        self.include_syst
    }
}

impl LeafFilter for AgentFilter {
    fn required_columns(&self) -> &'static [&'static str] {
        &[AGENT]
    }

    fn compute_mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        let agent_col = column(table, AGENT)?;
        Ok(RowMask::from_fn(table, |row| {
            let label = row.get(agent_col).to_lowercase_label();
            label == self.agent || (self.include_syst && is_system_agent(&label))
        }))
    }
}

///
/// Keep _all_ events of every case that contains the given activity at least once
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseHasActivityFilter {
    activity: String,
}

impl CaseHasActivityFilter {
    /// Create a new filter for the given activity (exact match)
    pub fn new(activity: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
        }
    }
}

impl LeafFilter for CaseHasActivityFilter {
    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID, ACTIVITY]
    }

    fn compute_mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        let case_col = column(table, CASE_ID)?;
        let act_col = column(table, ACTIVITY)?;
        let cases: HashSet<&AttributeValue> = table
            .rows()
            .iter()
            .filter(|row| row.get(act_col).to_string() == self.activity)
            .map(|row| row.get(case_col))
            .filter(|case| !case.is_none())
            .collect();
        Ok(RowMask::from_fn(table, |row| cases.contains(row.get(case_col))))
    }
}

///
/// How a [`TimeWindowFilter`] relates event intervals to the window
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindowMode {
    /// Keep events whose interval intersects the window
    #[default]
    Touches,
    /// Keep events whose interval lies completely inside the window
    Inside,
}

impl FromStr for TimeWindowMode {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "touches" => Ok(Self::Touches),
            "inside" => Ok(Self::Inside),
            other => Err(FilterError::InvalidArgument(format!(
                "unknown time window mode '{other}' (expected 'touches' or 'inside')"
            ))),
        }
    }
}

impl Display for TimeWindowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeWindowMode::Touches => write!(f, "touches"),
            TimeWindowMode::Inside => write!(f, "inside"),
        }
    }
}

///
/// Keep events that touch (or lie inside) a time window
///
/// The window is checked against `START_TIMESTAMP` and `END_TIMESTAMP`; if the table has no
/// `END_TIMESTAMP` column, the start timestamp is used as end as well.
/// Either bound may be omitted, in which case only the other half of the predicate applies.
/// Events with missing or unparseable timestamps are never kept (unless the window is
/// unbounded on both sides).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindowFilter {
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
    mode: TimeWindowMode,
}

impl TimeWindowFilter {
    /// Create a new time window filter from (optional) bounds
    pub fn new(
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
        mode: TimeWindowMode,
    ) -> Self {
        Self { start, end, mode }
    }

    ///
    /// Create a new time window filter, parsing the bounds and the mode from Strings
    ///
    /// Fails if a bound is not a valid timestamp or the mode is unknown.
    pub fn from_strs(
        start: Option<&str>,
        end: Option<&str>,
        mode: &str,
    ) -> Result<Self, FilterError> {
        let parse_bound = |bound: Option<&str>| {
            bound
                .map(|s| {
                    parse_timestamp(s.trim(), None, false).map_err(|_| {
                        FilterError::InvalidArgument(format!("invalid window bound '{s}'"))
                    })
                })
                .transpose()
        };
        Ok(Self::new(
            parse_bound(start)?,
            parse_bound(end)?,
            mode.parse::<TimeWindowMode>()?,
        ))
    }

    fn keeps(
        &self,
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
    ) -> bool {
        let (lower_ts, upper_ts) = match self.mode {
            TimeWindowMode::Inside => (start, end),
            TimeWindowMode::Touches => (end, start),
        };
        let after_start = self.start.map_or(true, |b| lower_ts.is_some_and(|t| t >= b));
        let before_end = self.end.map_or(true, |b| upper_ts.is_some_and(|t| t <= b));
        after_start && before_end
    }
}

impl LeafFilter for TimeWindowFilter {
    fn required_columns(&self) -> &'static [&'static str] {
        &[START_TIMESTAMP]
    }

    fn compute_mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        let start_col = column(table, START_TIMESTAMP)?;
        let end_col = table.column_index(END_TIMESTAMP).unwrap_or(start_col);
        Ok(RowMask::from_fn(table, |row| {
            self.keeps(
                row.get(start_col).to_timestamp(),
                row.get(end_col).to_timestamp(),
            )
        }))
    }
}

///
/// Keep events whose case identifier is part of a given set
///
/// An empty set keeps nothing; missing case identifiers never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFilter {
    case_ids: HashSet<AttributeValue>,
}

impl CaseFilter {
    /// Create a new case filter
    pub fn new<V: Into<AttributeValue>>(case_ids: impl IntoIterator<Item = V>) -> Self {
        Self {
            case_ids: case_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// The selected case identifiers
    pub fn case_ids(&self) -> &HashSet<AttributeValue> {
        &self.case_ids
    }
}

impl LeafFilter for CaseFilter {
    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID]
    }

    fn compute_mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        let case_col = column(table, CASE_ID)?;
        Ok(RowMask::from_fn(table, |row| {
            let case = row.get(case_col);
            !case.is_none() && self.case_ids.contains(case)
        }))
    }
}

///
/// Activity sequences of all cases, ordered by start timestamp
///
/// Ties (and events with unparseable start timestamps, which are placed last) keep table order.
fn case_activity_sequences(
    table: &EventTable,
) -> Result<Vec<(&AttributeValue, Vec<String>)>, FilterError> {
    let case_col = column(table, CASE_ID)?;
    let act_col = column(table, ACTIVITY)?;
    let start_col = column(table, START_TIMESTAMP)?;
    Ok(table
        .traces(case_col, start_col)
        .into_iter()
        .map(|(case, rows)| {
            let activities = rows.iter().map(|r| r.get(act_col).to_string()).collect();
            (case, activities)
        })
        .collect())
}

fn keep_cases_where(
    table: &EventTable,
    predicate: impl Fn(&[String]) -> bool,
) -> Result<RowMask, FilterError> {
    let case_col = column(table, CASE_ID)?;
    let cases: HashSet<&AttributeValue> = case_activity_sequences(table)?
        .into_iter()
        .filter(|(_, seq)| predicate(seq))
        .map(|(case, _)| case)
        .collect();
    Ok(RowMask::from_fn(table, |row| cases.contains(row.get(case_col))))
}

///
/// Keep all events of cases in which activity `a` is _directly_ followed by activity `b`
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectlyFollowsFilter {
    a: String,
    b: String,
}

impl DirectlyFollowsFilter {
    /// Create a new directly-follows filter for the pair `(a, b)`
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }
}

impl LeafFilter for DirectlyFollowsFilter {
    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID, ACTIVITY, START_TIMESTAMP]
    }

    fn compute_mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        keep_cases_where(table, |seq| {
            seq.windows(2).any(|w| w[0] == self.a && w[1] == self.b)
        })
    }
}

///
/// Keep all events of cases in which activity `a` _eventually_ (strictly later) is followed by activity `b`
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventuallyFollowsFilter {
    a: String,
    b: String,
}

impl EventuallyFollowsFilter {
    /// Create a new eventually-follows filter for the pair `(a, b)`
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }
}

impl LeafFilter for EventuallyFollowsFilter {
    fn required_columns(&self) -> &'static [&'static str] {
        &[CASE_ID, ACTIVITY, START_TIMESTAMP]
    }

    fn compute_mask(&self, table: &EventTable) -> Result<RowMask, FilterError> {
        keep_cases_where(table, |seq| {
            let first_a = seq.iter().position(|act| *act == self.a);
            first_a.is_some_and(|i| seq[i + 1..].iter().any(|act| *act == self.b))
        })
    }
}
