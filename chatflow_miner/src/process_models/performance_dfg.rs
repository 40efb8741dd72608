use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{constants::END_TIMESTAMP, table::EventTable};

use super::{
    dfg::trace_columns,
    image_export::{export_performance_dfg_to_dot_graph, graph_to_dot},
    quality, DirectlyFollowsGraph, GraphvizOptions, ModelArtifact, ModelError, ProcessModel,
    QualityMetrics,
};

///
/// Directly-follows graph annotated with mean durations (in seconds)
///
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDirectlyFollowsGraph {
    /// Underlying frequency directly-follows graph
    pub frequencies: DirectlyFollowsGraph,
    /// Mean waiting time between the end of the source and the start of the target activity
    ///
    /// Only arcs with at least one pair of valid timestamps are included.
    #[serde_as(as = "Vec<(_, _)>")]
    pub mean_waiting_seconds: HashMap<(String, String), f64>,
    /// Mean duration (end - start) of each activity
    pub mean_sojourn_seconds: HashMap<String, f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        self.sum / f64::from(self.count)
    }
}

fn seconds_between(
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

impl PerformanceDirectlyFollowsGraph {
    ///
    /// Construct a [`PerformanceDirectlyFollowsGraph`] from an [`EventTable`]
    ///
    /// Events of each case are ordered by start timestamp. A missing `END_TIMESTAMP` (column or
    /// value) is replaced by the start timestamp. Negative durations (overlapping events) count
    /// as zero.
    pub fn create_from_table(table: &EventTable) -> Result<Self, ModelError> {
        let (case_col, act_col, start_col) = trace_columns(table)?;
        let end_col = table.column_index(END_TIMESTAMP).unwrap_or(start_col);

        let mut frequencies = DirectlyFollowsGraph::new();
        let mut waiting: HashMap<(String, String), Mean> = HashMap::new();
        let mut sojourn: HashMap<String, Mean> = HashMap::new();
        for (_, rows) in table.traces(case_col, start_col) {
            let mut sequence = Vec::with_capacity(rows.len());
            let mut prev: Option<(String, Option<DateTime<FixedOffset>>)> = None;
            for row in rows {
                let act = row.get(act_col).to_string();
                let start = row.get(start_col).to_timestamp();
                let end = row.get(end_col).to_timestamp().or(start);
                if let (Some(start), Some(end)) = (start, end) {
                    sojourn
                        .entry(act.clone())
                        .or_default()
                        .add(seconds_between(start, end));
                }
                if let Some((prev_act, prev_end)) = prev.take() {
                    if let (Some(prev_end), Some(start)) = (prev_end, start) {
                        waiting
                            .entry((prev_act, act.clone()))
                            .or_default()
                            .add(seconds_between(prev_end, start));
                    }
                }
                prev = Some((act.clone(), end));
                sequence.push(act);
            }
            frequencies.add_sequence(&sequence);
        }

        Ok(Self {
            frequencies,
            mean_waiting_seconds: waiting.into_iter().map(|(k, m)| (k, m.value())).collect(),
            mean_sojourn_seconds: sojourn.into_iter().map(|(k, m)| (k, m.value())).collect(),
        })
    }
}

///
/// Performance directly-follows graph discovery
///
/// Rendered with mean sojourn times on activities and mean waiting times on arcs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceDFGModel;

impl ProcessModel for PerformanceDFGModel {
    fn name(&self) -> &str {
        "performance_dfg"
    }

    fn compute(&self, table: &EventTable) -> Result<ModelArtifact, ModelError> {
        Ok(PerformanceDirectlyFollowsGraph::create_from_table(table)?.into())
    }

    fn to_graphviz(
        &self,
        artifact: &ModelArtifact,
        options: &GraphvizOptions,
    ) -> Result<String, ModelError> {
        match artifact {
            ModelArtifact::PerformanceDfg(perf) => Ok(graph_to_dot(
                &export_performance_dfg_to_dot_graph(perf, options),
            )),
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
            ModelArtifact::PerformanceDfg(perf) => quality::evaluate_dfg(table, &perf.frequencies),
            other => Err(ModelError::ArtifactMismatch {
                model: self.name().to_string(),
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event_table,
        process_models::DFGModel,
        table::io::{import_event_table_csv_path, CsvLoadOptions},
        utils::test_utils::get_test_data_path,
    };

    fn chat_log() -> EventTable {
        import_event_table_csv_path(
            get_test_data_path().join("chat_log.csv"),
            &CsvLoadOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn mean_waiting_and_sojourn_times() {
        let perf = PerformanceDirectlyFollowsGraph::create_from_table(&chat_log()).unwrap();
        let greet_ask = perf.mean_waiting_seconds[&("greet".to_string(), "ask_question".to_string())];
        assert!((greet_ask - 83.0 / 3.0).abs() < 1e-9);
        assert_eq!(perf.mean_sojourn_seconds["greet"], 1.5);
        assert_eq!(perf.mean_sojourn_seconds["escalate"], 10.0);
        assert_eq!(perf.mean_sojourn_seconds["handover"], 0.0);
        assert_eq!(perf.frequencies, DirectlyFollowsGraph::create_from_table(&chat_log()).unwrap());
    }

    #[test]
    fn missing_end_column_means_zero_sojourn() {
        let table = event_table!(
            ["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];
            ["c1", "a", "2024-01-01 10:00:00"],
            ["c1", "b", "2024-01-01 10:00:30"],
            ["c1", "c", "not a date"],
        );
        let perf = PerformanceDirectlyFollowsGraph::create_from_table(&table).unwrap();
        assert_eq!(perf.mean_sojourn_seconds["a"], 0.0);
        assert_eq!(perf.mean_waiting_seconds[&("a".to_string(), "b".to_string())], 30.0);
        // The arc exists, but has no valid timestamps
        assert!(perf.frequencies.contains_df_relation(("b", "c")));
        assert!(!perf.mean_waiting_seconds.contains_key(&("b".to_string(), "c".to_string())));
        assert!(!perf.mean_sojourn_seconds.contains_key("c"));
    }

    #[test]
    fn rendering_requires_matching_artifact() {
        let table = chat_log();
        let artifact = PerformanceDFGModel.compute(&table).unwrap();
        let dot = PerformanceDFGModel
            .to_graphviz(&artifact, &GraphvizOptions::default())
            .unwrap();
        assert!(dot.contains("escalate (10s)"));
        assert!(matches!(
            DFGModel.to_graphviz(&artifact, &GraphvizOptions::default()),
            Err(ModelError::ArtifactMismatch { found: "performance_dfg", .. })
        ));
        let metrics = PerformanceDFGModel.quality_metrics(&table, &artifact).unwrap();
        assert_eq!(metrics.fitness, Some(1.0));
    }
}
