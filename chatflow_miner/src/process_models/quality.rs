use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::table::EventTable;

use super::{dfg::activity_sequences, DirectlyFollowsGraph, ModelError};

///
/// Quality dimensions of a discovered model with respect to an event table
///
/// All values lie in `[0, 1]`; `None` means the metric is not defined for the given input
/// (e.g., log-based metrics on an empty log).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Share of cases that can be replayed on the model
    pub fitness: Option<f64>,
    /// Share of model arcs observed in the log
    pub precision: Option<f64>,
    /// How well the model elements are supported by observations
    pub generalization: Option<f64>,
    /// Structural simplicity of the model
    pub simplicity: Option<f64>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Whether a full activity sequence can be replayed on the graph
fn fits(dfg: &DirectlyFollowsGraph, sequence: &[String]) -> bool {
    let (Some(first), Some(last)) = (sequence.first(), sequence.last()) else {
        return false;
    };
    dfg.is_start_activity(first)
        && dfg.is_end_activity(last)
        && sequence.iter().all(|a| dfg.contains_activity(a))
        && sequence
            .windows(2)
            .all(|w| dfg.directly_follows_relations.contains_key(&(w[0].clone(), w[1].clone())))
}

///
/// Evaluate a [`DirectlyFollowsGraph`] against the cases of an event table
///
/// * fitness: share of cases whose activity sequence starts at a start activity, only uses
///   arcs of the graph and ends at an end activity
/// * precision: share of arcs of the graph that are observed in the table (`1` for a graph
///   without arcs)
/// * generalization: `1 - mean(1 / sqrt(n))` over all activities and arcs of the graph, where
///   `n` is how often the element is observed in the table
/// * simplicity: `1 / (1 + max(0, mean_degree - 2))` over the activities of the graph
///
/// Fitness, precision and generalization are `None` for a table without cases; simplicity
/// is `None` for a graph without activities.
pub fn evaluate_dfg(
    table: &EventTable,
    dfg: &DirectlyFollowsGraph,
) -> Result<QualityMetrics, ModelError> {
    let sequences = activity_sequences(table)?;
    let mut metrics = QualityMetrics {
        simplicity: simplicity(dfg),
        ..Default::default()
    };
    if sequences.is_empty() {
        return Ok(metrics);
    }

    let fitting = sequences.iter().filter(|s| fits(dfg, s)).count();
    metrics.fitness = finite(fitting as f64 / sequences.len() as f64);

    let observed = DirectlyFollowsGraph::from_sequences(sequences);
    metrics.precision = if dfg.directly_follows_relations.is_empty() {
        Some(1.0)
    } else {
        let seen = dfg
            .directly_follows_relations
            .keys()
            .filter(|arc| observed.directly_follows_relations.contains_key(*arc))
            .count();
        finite(seen as f64 / dfg.directly_follows_relations.len() as f64)
    };
    metrics.generalization = generalization(dfg, &observed);

    tracing::debug!(
        fitness = ?metrics.fitness,
        precision = ?metrics.precision,
        generalization = ?metrics.generalization,
        simplicity = ?metrics.simplicity,
        "Evaluated directly-follows graph"
    );
    Ok(metrics)
}

fn generalization(dfg: &DirectlyFollowsGraph, observed: &DirectlyFollowsGraph) -> Option<f64> {
    let penalty = |n: u32| {
        if n == 0 {
            1.0
        } else {
            1.0 / f64::from(n).sqrt()
        }
    };
    let activity_penalties = dfg
        .activities
        .keys()
        .map(|a| penalty(observed.activities.get(a).copied().unwrap_or_default()));
    let arc_penalties = dfg.directly_follows_relations.keys().map(|arc| {
        penalty(
            observed
                .directly_follows_relations
                .get(arc)
                .copied()
                .unwrap_or_default(),
        )
    });
    let penalties: Vec<f64> = activity_penalties.chain(arc_penalties).collect();
    if penalties.is_empty() {
        return None;
    }
    finite(1.0 - penalties.iter().sum::<f64>() / penalties.len() as f64)
}

fn simplicity(dfg: &DirectlyFollowsGraph) -> Option<f64> {
    if dfg.activities.is_empty() {
        return None;
    }
    let mut degrees: HashMap<&str, usize> =
        dfg.activities.keys().map(|a| (a.as_str(), 0)).collect();
    for (from, to) in dfg.directly_follows_relations.keys() {
        *degrees.entry(from.as_str()).or_default() += 1;
        *degrees.entry(to.as_str()).or_default() += 1;
    }
    let mean_degree = degrees.values().sum::<usize>() as f64 / degrees.len() as f64;
    finite(1.0 / (1.0 + (mean_degree - 2.0).max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_table, table::AttributeValue};

    fn log(cases: &[&[&str]]) -> EventTable {
        let mut table = event_table!(["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];);
        for (c, acts) in cases.iter().enumerate() {
            for (i, act) in acts.iter().enumerate() {
                table
                    .push_row(vec![
                        AttributeValue::String(format!("c{c}")),
                        AttributeValue::String(act.to_string()),
                        AttributeValue::String(format!("2024-01-01 10:00:{i:02}")),
                    ])
                    .unwrap();
            }
        }
        table
    }

    fn model(cases: &[&[&str]]) -> DirectlyFollowsGraph {
        DirectlyFollowsGraph::create_from_table(&log(cases)).unwrap()
    }

    #[test]
    fn metrics_of_discovering_log() {
        let abc: &[&str] = &["a", "b", "c"];
        let table = log(&[abc, abc, abc, abc]);
        let metrics = evaluate_dfg(&table, &model(&[abc])).unwrap();
        assert_eq!(metrics.fitness, Some(1.0));
        assert_eq!(metrics.precision, Some(1.0));
        assert_eq!(metrics.generalization, Some(0.5));
        // a -> b -> c: mean degree 4/3
        assert_eq!(metrics.simplicity, Some(1.0));
    }

    #[test]
    fn partially_fitting_log() {
        let dfg = model(&[&["a", "b", "c"]]);
        let metrics = evaluate_dfg(&log(&[&["a", "b", "c"], &["a", "c"]]), &dfg).unwrap();
        assert_eq!(metrics.fitness, Some(0.5));
        assert_eq!(metrics.precision, Some(1.0));

        let metrics = evaluate_dfg(&log(&[&["a", "c"]]), &dfg).unwrap();
        assert_eq!(metrics.fitness, Some(0.0));
        assert_eq!(metrics.precision, Some(0.0));
    }

    #[test]
    fn empty_log_and_empty_model() {
        let empty = log(&[]);
        let metrics = evaluate_dfg(&empty, &model(&[&["a", "b"]])).unwrap();
        assert_eq!(metrics.fitness, None);
        assert_eq!(metrics.precision, None);
        assert_eq!(metrics.generalization, None);
        assert_eq!(metrics.simplicity, Some(1.0));

        let metrics = evaluate_dfg(&empty, &DirectlyFollowsGraph::new()).unwrap();
        assert_eq!(metrics, QualityMetrics::default());
    }

    #[test]
    fn dense_models_are_less_simple() {
        let dfg = model(&[&["a", "b", "a", "c", "b", "c", "a"]]);
        // 3 activities, 6 arcs: mean degree 4
        let simplicity = evaluate_dfg(&log(&[]), &dfg).unwrap().simplicity.unwrap();
        assert!((simplicity - 1.0 / 3.0).abs() < 1e-9);
    }
}
