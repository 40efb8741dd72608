use std::collections::HashMap;

use graphviz_rust::{
    dot_generator::{attr, edge, graph, id, node, node_id, stmt},
    dot_structures::*,
    printer::{DotPrinter, PrinterContext},
};

use super::{DirectlyFollowsGraph, GraphvizOptions, PerformanceDirectlyFollowsGraph};

/// Fill color of an activity node, depending on whether it starts and/or ends cases
fn fill_color(dfg: &DirectlyFollowsGraph, act: &str) -> String {
    if dfg.is_start_activity(act) && dfg.is_end_activity(act) {
        "\"#4B9969:#D4001F\"".into()
    } else if dfg.is_start_activity(act) {
        "\"#4B9969\"".into()
    } else if dfg.is_end_activity(act) {
        "\"#D4001F\"".into()
    } else {
        "\"white\"".into()
    }
}

/// Activities ordered for layout: start activities first, end activities last
fn sorted_activities(dfg: &DirectlyFollowsGraph) -> Vec<(&String, u32)> {
    let mut sorted_acts: Vec<_> = dfg.activities.iter().map(|(a, &f)| (a, f)).collect();
    sorted_acts.sort_by_key(|&(act, _)| {
        let rank = if dfg.is_start_activity(act) {
            0
        } else if dfg.is_end_activity(act) {
            2
        } else {
            1
        };
        (rank, act.as_str())
    });
    sorted_acts
}

///
/// The `max_num_edges` most frequent arcs (ties ordered by source and target activity)
///
pub fn most_frequent_arcs(
    relations: &HashMap<(String, String), u32>,
    max_num_edges: usize,
) -> Vec<(&(String, String), u32)> {
    let mut arcs: Vec<_> = relations.iter().map(|(arc, &f)| (arc, f)).collect();
    arcs.sort_by(|(a, a_freq), (b, b_freq)| b_freq.cmp(a_freq).then_with(|| a.cmp(b)));
    arcs.truncate(max_num_edges);
    arcs
}

fn activity_node(act: &str, label: String, fill_color: String) -> Stmt {
    stmt!(node!(esc act; attr!("label", esc label), attr!("gradientangle", "45"), attr!("shape","box"), attr!("fontsize",12), attr!("style","filled"), attr!("fillcolor",fill_color), attr!("width",1), attr!("height",0.5)))
}

fn graph_options(options: &GraphvizOptions) -> Vec<Stmt> {
    let rankdir = &options.rankdir;
    let bgcolor = &options.bgcolor;
    vec![
        stmt!(attr!("rankdir", esc rankdir)),
        stmt!(attr!("bgcolor", esc bgcolor)),
    ]
}

///
/// Export a [`DirectlyFollowsGraph`] to a DOT graph (used in Graphviz)
///
/// Activity nodes are labeled with their frequency; start activities are colored green, end
/// activities red. Arcs are labeled with their frequency (unless it is `1`); only the
/// [`GraphvizOptions::max_num_edges`] most frequent arcs are included.
pub fn export_dfg_to_dot_graph(dfg: &DirectlyFollowsGraph, options: &GraphvizOptions) -> Graph {
    let activity_nodes: Vec<Stmt> = sorted_activities(dfg)
        .into_iter()
        .map(|(x, y)| activity_node(x, format!("{x}: {y}"), fill_color(dfg, x)))
        .collect();

    let arcs: Vec<Stmt> = most_frequent_arcs(&dfg.directly_follows_relations, options.max_num_edges)
        .into_iter()
        .map(|(dfr, frequency)| {
            let attrs = if frequency == 1 {
                Vec::default()
            } else {
                vec![attr!("label", (format!("{}", frequency)))]
            };
            stmt!(edge!(node_id!(esc dfr.0) => node_id!(esc dfr.1), attrs))
        })
        .collect();

    graph!(strict di id!(esc "dfg"), vec![graph_options(options), activity_nodes, arcs].into_iter().flatten().collect())
}

///
/// Export a [`PerformanceDirectlyFollowsGraph`] to a DOT graph
///
/// Activity nodes are labeled with their mean sojourn time, arcs with the mean waiting time
/// between the two activities.
pub fn export_performance_dfg_to_dot_graph(
    perf: &PerformanceDirectlyFollowsGraph,
    options: &GraphvizOptions,
) -> Graph {
    let dfg = &perf.frequencies;
    let activity_nodes: Vec<Stmt> = sorted_activities(dfg)
        .into_iter()
        .map(|(x, _)| {
            let sojourn = perf.mean_sojourn_seconds.get(x).copied().unwrap_or_default();
            activity_node(x, format!("{x} ({})", format_duration(sojourn)), fill_color(dfg, x))
        })
        .collect();

    let arcs: Vec<Stmt> = most_frequent_arcs(&dfg.directly_follows_relations, options.max_num_edges)
        .into_iter()
        .map(|(dfr, _)| {
            let waiting = perf.mean_waiting_seconds.get(dfr).copied().unwrap_or_default();
            let label = format_duration(waiting);
            stmt!(edge!(node_id!(esc dfr.0) => node_id!(esc dfr.1), vec![attr!("label", esc label)]))
        })
        .collect();

    graph!(strict di id!(esc "performance_dfg"), vec![graph_options(options), activity_nodes, arcs].into_iter().flatten().collect())
}

///
/// Human readable rendering of a duration given in seconds (e.g., `42s`, `3.5m`, `2h`)
///
pub fn format_duration(seconds: f64) -> String {
    let (value, unit) = if seconds < 60.0 {
        (seconds, "s")
    } else if seconds < 3600.0 {
        (seconds / 60.0, "m")
    } else if seconds < 86400.0 {
        (seconds / 3600.0, "h")
    } else {
        (seconds / 86400.0, "d")
    };
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}{unit}")
    } else {
        format!("{rounded:.1}{unit}")
    }
}

///
/// Convert a DOT graph to a String containing the DOT source
///
pub fn graph_to_dot(g: &Graph) -> String {
    g.print(&mut PrinterContext::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dfg() -> DirectlyFollowsGraph {
        DirectlyFollowsGraph::from_sequences(vec![
            vec!["greet", "ask", "answer"],
            vec!["greet", "ask", "answer"],
            vec!["greet", "ask"],
        ])
    }

    #[test]
    fn dot_contains_nodes_and_frequent_arcs() {
        let dot = graph_to_dot(&export_dfg_to_dot_graph(&sample_dfg(), &GraphvizOptions::default()));
        assert!(dot.contains("strict digraph"));
        assert!(dot.contains("greet: 3"));
        assert!(dot.contains("answer: 2"));
        assert!(dot.contains("#4B9969"));
        assert!(!dot.contains("#4B9969:#D4001F"));
        assert!(dot.contains("rankdir=\"LR\""));
        assert!(dot.contains("bgcolor=\"white\""));
    }

    #[test]
    fn options_are_respected() {
        let options = GraphvizOptions {
            bgcolor: "transparent".into(),
            rankdir: "TB".into(),
            max_num_edges: 1,
        };
        let dot = graph_to_dot(&export_dfg_to_dot_graph(&sample_dfg(), &options));
        assert!(dot.contains("rankdir=\"TB\""));
        assert!(dot.contains("bgcolor=\"transparent\""));
        assert_eq!(dot.matches("->").count(), 1);
        assert!(dot.contains("label=3"));
    }

    #[test]
    fn arcs_are_cut_by_frequency() {
        let dfg = sample_dfg();
        let arcs = most_frequent_arcs(&dfg.directly_follows_relations, 5);
        assert_eq!(arcs.len(), 2);
        assert_eq!(arcs[0].0, &("greet".to_string(), "ask".to_string()));
        assert_eq!(arcs[0].1, 3);
        assert!(most_frequent_arcs(&dfg.directly_follows_relations, 0).is_empty());
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(12.25), "12.3s");
        assert_eq!(format_duration(90.0), "1.5m");
        assert_eq!(format_duration(7200.0), "2h");
        assert_eq!(format_duration(172800.0), "2d");
    }
}
