use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::{HashMap, HashSet};

use crate::{
    constants::{ACTIVITY, CASE_ID, START_TIMESTAMP},
    table::{check_columns, EventTable, MissingColumnsError},
};

use super::{
    image_export::export_dfg_to_dot_graph, image_export::graph_to_dot, quality, GraphvizOptions,
    ModelArtifact, ModelError, ProcessModel, QualityMetrics,
};

/// Activity in a directly-follows graph.
type Activity = String;

/// Columns needed to derive the ordered activity sequences of cases
pub(crate) const TRACE_COLUMNS: &[&str] = &[CASE_ID, ACTIVITY, START_TIMESTAMP];

/// Position of the case, activity and start timestamp columns
pub(crate) fn trace_columns(table: &EventTable) -> Result<(usize, usize, usize), ModelError> {
    check_columns(table, TRACE_COLUMNS)?;
    let col = |name: &str| {
        table.column_index(name).ok_or_else(|| MissingColumnsError {
            missing: vec![name.to_string()],
        })
    };
    Ok((col(CASE_ID)?, col(ACTIVITY)?, col(START_TIMESTAMP)?))
}

/// Ordered activity sequences of all cases of `table`
pub(crate) fn activity_sequences(table: &EventTable) -> Result<Vec<Vec<String>>, ModelError> {
    let (case_col, act_col, start_col) = trace_columns(table)?;
    Ok(table
        .traces(case_col, start_col)
        .into_iter()
        .map(|(_, rows)| rows.iter().map(|r| r.get(act_col).to_string()).collect())
        .collect())
}

/// A directly-follows graph of [`Activity`]s.
/// Graph containing a set of activities, a set of directly-follows relations, a set of start
/// activities, and a set of end activities.
/// Both, the number of occurrences of activities and of directly follows relations are annotated
/// with their frequency.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectlyFollowsGraph {
    /// Activities
    pub activities: HashMap<Activity, u32>,
    /// Directly-follows relations
    #[serde_as(as = "Vec<(_, _)>")]
    pub directly_follows_relations: HashMap<(Activity, Activity), u32>,
    /// Start activities
    pub start_activities: HashSet<Activity>,
    /// End activities
    pub end_activities: HashSet<Activity>,
}

impl DirectlyFollowsGraph {
    /// Create new [`DirectlyFollowsGraph`] with no activities and directly-follows relations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a [`DirectlyFollowsGraph`] from activity sequences (one per case)
    pub fn from_sequences<S: AsRef<str>>(sequences: impl IntoIterator<Item = Vec<S>>) -> Self {
        let mut result = Self::new();
        for seq in sequences {
            result.add_sequence(&seq);
        }
        result
    }

    /// Add the activities and directly-follows relations of one case
    pub fn add_sequence<S: AsRef<str>>(&mut self, sequence: &[S]) {
        let mut last: Option<&str> = None;
        for act in sequence {
            let act: &str = act.as_ref();
            self.add_activity(act.to_string(), 1);
            match last {
                Some(prev) => self.add_df_relation(prev.to_string(), act.to_string(), 1),
                None => self.add_start_activity(act.to_string()),
            }
            last = Some(act);
        }
        if let Some(last) = last {
            self.add_end_activity(last.to_string());
        }
    }

    ///
    /// Construct a [`DirectlyFollowsGraph`] from an [`EventTable`]
    ///
    /// Events of each case are ordered by their start timestamp (ties keep table order).
    pub fn create_from_table(table: &EventTable) -> Result<Self, ModelError> {
        Ok(Self::from_sequences(activity_sequences(table)?))
    }

    /// Add an activity with a frequency.
    ///
    /// If the activity already exists, the frequency count is added to the existing activity.
    pub fn add_activity(&mut self, activity: Activity, frequency: u32) {
        *self.activities.entry(activity).or_default() += frequency;
    }

    /// Adds an activity to the set of start activities.
    pub fn add_start_activity(&mut self, activity: Activity) {
        self.start_activities.insert(activity);
    }

    /// Adds an activity to the set of end activities.
    pub fn add_end_activity(&mut self, activity: Activity) {
        self.end_activities.insert(activity);
    }

    /// Add a directly-follows relation with a frequency.
    ///
    /// If the directly-follows relation already exists, the frequency count is added to the
    /// existing directly-follows relation.
    pub fn add_df_relation(&mut self, from: Activity, to: Activity, frequency: u32) {
        *self.directly_follows_relations.entry((from, to)).or_default() += frequency;
    }

    /// Checks if an activity is already contained in the directly-follows graph.
    pub fn contains_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.activities.contains_key(activity.as_ref())
    }

    /// Checks if an activity is a start activity in the directly-follows graph.
    pub fn is_start_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.start_activities.contains(activity.as_ref())
    }

    /// Checks if an activity is an end activity in the directly-follows graph.
    pub fn is_end_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.end_activities.contains(activity.as_ref())
    }

    /// Checks if a directly-follows relation is already contained in the directly-follows graph.
    pub fn contains_df_relation<S: Into<String>>(&self, (a, b): (S, S)) -> bool {
        self.directly_follows_relations
            .contains_key(&(a.into(), b.into()))
    }

    /// Returns the outgoing activities of an activity in the directly-follows graph.
    pub fn outgoing_activities<S: AsRef<str>>(&self, activity: S) -> HashSet<&Activity> {
        self.directly_follows_relations
            .keys()
            .filter_map(|(x, y)| (x == activity.as_ref()).then_some(y))
            .collect()
    }

    /// Returns the ingoing activities of an activity in the directly-follows graph.
    pub fn ingoing_activities<S: AsRef<str>>(&self, activity: S) -> HashSet<&Activity> {
        self.directly_follows_relations
            .keys()
            .filter_map(|(x, y)| (y == activity.as_ref()).then_some(x))
            .collect()
    }
}

///
/// Frequency directly-follows graph discovery
///
/// ```rust
/// use chatflow_miner::{event_table, process_models::{DFGModel, GraphvizOptions, ProcessModel}};
///
/// let table = event_table!(
///     ["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];
///     ["c1", "greet", "2024-01-01 10:00:00"],
///     ["c1", "answer", "2024-01-01 10:01:00"],
/// );
/// let artifact = DFGModel.compute(&table).unwrap();
/// assert!(artifact.dfg().contains_df_relation(("greet", "answer")));
/// let dot = DFGModel.to_graphviz(&artifact, &GraphvizOptions::default()).unwrap();
/// assert!(dot.contains("greet: 1"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DFGModel;

impl ProcessModel for DFGModel {
    fn name(&self) -> &str {
        "dfg"
    }

    fn compute(&self, table: &EventTable) -> Result<ModelArtifact, ModelError> {
        Ok(DirectlyFollowsGraph::create_from_table(table)?.into())
    }

    fn to_graphviz(
        &self,
        artifact: &ModelArtifact,
        options: &GraphvizOptions,
    ) -> Result<String, ModelError> {
        match artifact {
            ModelArtifact::Dfg(dfg) => Ok(graph_to_dot(&export_dfg_to_dot_graph(dfg, options))),
            other => Err(ModelError::ArtifactMismatch {
                model: self.name().to_string(),
                found: other.kind(),
            }),
        }
    }

    fn quality_metrics(
        &self,
        table: &EventTable,
        artifact: &ModelArtifact,
    ) -> Result<QualityMetrics, ModelError> {
        match artifact {
            ModelArtifact::Dfg(dfg) => quality::evaluate_dfg(table, dfg),
            other => Err(ModelError::ArtifactMismatch {
                model: self.name().to_string(),
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    pub const SAMPLE_JSON_DFG: &str = r#"
{
    "activities": {
        "greet": 3,
        "ask_question": 3,
        "answer": 2
    },
    "directly_follows_relations": [
        [["greet","ask_question"], 3],
        [["ask_question","answer"], 2]
    ],
    "start_activities": ["greet"],
    "end_activities": ["answer", "ask_question"]
}"#;

    use super::*;
    use crate::{
        event_table,
        table::io::{import_event_table_csv_path, CsvLoadOptions},
        utils::test_utils::get_test_data_path,
    };

    #[test]
    fn dfg_from_chat_log() {
        let table = import_event_table_csv_path(
            get_test_data_path().join("chat_log.csv"),
            &CsvLoadOptions::default(),
        )
        .unwrap();
        let dfg = DirectlyFollowsGraph::create_from_table(&table).unwrap();
        assert_eq!(dfg.activities.len(), 8);
        assert_eq!(dfg.activities["ask_question"], 4);
        assert_eq!(dfg.directly_follows_relations[&("greet".to_string(), "ask_question".to_string())], 3);
        assert_eq!(dfg.directly_follows_relations[&("ask_question".to_string(), "answer".to_string())], 3);
        assert_eq!(
            dfg.start_activities,
            HashSet::from(["session_start".to_string(), "greet".to_string()])
        );
        assert_eq!(
            dfg.end_activities,
            HashSet::from(["thank".to_string(), "answer".to_string(), "handover".to_string()])
        );
        assert_eq!(
            dfg.outgoing_activities("ask_question"),
            HashSet::from([&"answer".to_string(), &"clarify".to_string()])
        );
        assert_eq!(dfg.ingoing_activities("session_start").len(), 0);
    }

    #[test]
    fn events_are_ordered_by_start_timestamp() {
        let table = event_table!(
            ["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];
            ["c1", "b", "2024-01-01 10:05:00"],
            ["c1", "a", "2024-01-01 10:00:00"],
            ["c1", "c", "2024-01-01 10:05:00"],
        );
        let dfg = DirectlyFollowsGraph::create_from_table(&table).unwrap();
        assert!(dfg.contains_df_relation(("a", "b")));
        assert!(dfg.contains_df_relation(("b", "c")));
        assert!(dfg.is_start_activity("a"));
        assert!(dfg.is_end_activity("c"));
    }

    #[test]
    fn dfg_requires_trace_columns() {
        let table = event_table!(["CASE_ID", "ACTIVITY"]; ["c1", "a"]);
        match DFGModel.compute(&table) {
            Err(ModelError::MissingColumns(e)) => assert_eq!(e.missing, vec![START_TIMESTAMP]),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn dfg_serde_round_trip() {
        let dfg: DirectlyFollowsGraph = serde_json::from_str(SAMPLE_JSON_DFG).unwrap();
        assert_eq!(dfg.activities["greet"], 3);
        let json = serde_json::to_string(&dfg).unwrap();
        let back: DirectlyFollowsGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dfg);
    }
}
