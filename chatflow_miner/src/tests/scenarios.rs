use std::rc::Rc;

use crate::{
    aggregations::{AggregationError, CaseAggView, CaseDurationAggregator, CaseVariantAggregator},
    event_log::EventLogView,
    event_table,
    filters::{DirectlyFollowsFilter, EventuallyFollowsFilter, Filter, TimeWindowFilter},
    import_event_table_csv_path,
    process_models::{
        model_by_name, ErrorPolicy, GraphvizOptions, ProcessModelRegistry, ProcessModelView,
        RegistryError,
    },
    table::{AttributeValue, EventTable},
    utils::test_utils::get_test_data_path,
    CsvLoadOptions,
};

fn sequences_log() -> EventTable {
    event_table!(
        ["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];
        ["adjacent", "A", "2024-01-01 10:00:00"],
        ["adjacent", "B", "2024-01-01 10:01:00"],
        ["adjacent", "A", "2024-01-01 10:02:00"],
        ["adjacent", "C", "2024-01-01 10:03:00"],
        ["gapped", "A", "2024-01-01 11:00:00"],
        ["gapped", "B", "2024-01-01 11:01:00"],
        ["gapped", "C", "2024-01-01 11:02:00"],
    )
}

fn kept_cases(table: &EventTable) -> Vec<String> {
    let col = table.column_index("CASE_ID").unwrap();
    table
        .group_by(col)
        .into_iter()
        .map(|(case, _)| case.to_string())
        .collect()
}

#[test]
fn variants_ignore_system_events() {
    let table = event_table!(
        ["CASE_ID", "ACTIVITY", "START_TIMESTAMP", "AGENT"];
        ["A", "sys", "2024-01-01 10:00:00", "system"],
        ["A", "greet", "2024-01-01 10:00:01", "ai"],
        ["A", "ai_reply", "2024-01-01 10:00:02", "ai"],
        ["B", "greet", "2024-01-01 11:00:00", "ai"],
        ["B", "ai_reply", "2024-01-01 11:00:05", "ai"],
    );
    let variants = CaseAggView::new(table)
        .with_aggregator(CaseVariantAggregator::new(true, ">"))
        .compute()
        .unwrap();
    for case in ["A", "B"] {
        let info = variants.get(&AttributeValue::from(case)).unwrap();
        assert_eq!(info.variant, "greet>ai_reply");
        assert_eq!(info.frequency, 2);
        assert_eq!(info.variant_id, "variant 1");
    }
}

#[test]
fn touching_time_window() {
    let table = event_table!(
        ["CASE_ID", "ACTIVITY", "START_TIMESTAMP", "END_TIMESTAMP"];
        ["c1", "long_chat", "2021-01-01 10:00:00", "2021-01-01 11:00:00"],
        ["c2", "early_chat", "2021-01-01 09:00:00", "2021-01-01 09:30:00"],
    );
    let window: Filter =
        TimeWindowFilter::from_strs(Some("2021-01-01T10:30"), Some("2021-01-01T10:45"), "touches")
            .unwrap()
            .into();
    let kept = window.apply(&table).unwrap();
    assert_eq!(kept_cases(&kept), vec!["c1"]);

    let inside: Filter =
        TimeWindowFilter::from_strs(Some("2021-01-01T10:30"), Some("2021-01-01T10:45"), "inside")
            .unwrap()
            .into();
    assert!(inside.apply(&table).unwrap().is_empty());
}

#[test]
fn directly_and_eventually_follows() {
    let log = EventLogView::new(sequences_log());

    let directly = log
        .filter(DirectlyFollowsFilter::new("A", "C").into())
        .compute()
        .unwrap();
    assert_eq!(kept_cases(&directly), vec!["adjacent"]);
    assert_eq!(directly.len(), 4);

    let eventually = log
        .filter(EventuallyFollowsFilter::new("A", "C").into())
        .compute()
        .unwrap();
    assert_eq!(kept_cases(&eventually), vec!["adjacent", "gapped"]);

    let reversed = log
        .filter(EventuallyFollowsFilter::new("C", "A").into())
        .compute()
        .unwrap();
    assert!(reversed.is_empty());
}

#[test]
fn mixed_placeholder_batch_is_rejected() {
    let view = Rc::new(ProcessModelView::with_shared_model(
        EventLogView::new(sequences_log()),
        model_by_name("dfg").unwrap(),
    ));
    let mut registry = ProcessModelRegistry::new();
    assert_eq!(
        registry.add_many([("a", None), ("b", Some(view))], false),
        Err(RegistryError::InvalidPlaceholderBatch)
    );
    assert!(registry.is_empty());
}

#[test]
fn aggregation_without_aggregator() {
    let view = CaseAggView::new(sequences_log());
    assert!(matches!(view.compute(), Err(AggregationError::NoAggregator)));
}

#[test]
fn chat_log_session() {
    let table = import_event_table_csv_path(
        get_test_data_path().join("chat_log.csv"),
        &CsvLoadOptions::default(),
    )
    .unwrap();
    let log = EventLogView::new(table);

    let mut registry = ProcessModelRegistry::with_placeholder();
    for name in ["dfg", "performance_dfg"] {
        let view = ProcessModelView::with_shared_model(log.clone(), model_by_name(name).unwrap());
        registry.set(name, Some(Rc::new(view))).unwrap();
    }
    assert!(registry.has_placeholder());

    let renderings = registry
        .to_graphviz_map(None, ErrorPolicy::Null, &GraphvizOptions::default())
        .unwrap();
    assert_eq!(renderings.len(), 3);
    assert_eq!(renderings[0], (crate::constants::NEW_MODEL_PLACEHOLDER.to_string(), None));
    assert!(renderings[1..]
        .iter()
        .all(|(_, dot)| dot.as_ref().is_some_and(|d| d.contains("digraph"))));

    let skipped = registry
        .to_graphviz_map(None, ErrorPolicy::Skip, &GraphvizOptions::default())
        .unwrap();
    assert_eq!(skipped.len(), 2);
    assert!(registry
        .to_graphviz_map(None, ErrorPolicy::Raise, &GraphvizOptions::default())
        .is_err());

    let durations = CaseAggView::new(log.compute().unwrap())
        .with_aggregator(CaseDurationAggregator::default())
        .compute()
        .unwrap();
    assert_eq!(durations.len(), log.num_cases().unwrap());
}
