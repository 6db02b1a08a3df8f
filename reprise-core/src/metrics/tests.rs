//! Tests for metrics collection

use super::*;
use serde_json::json;

fn scores(pairs: &[(&str, f64)]) -> Scores {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_new_collector_has_no_active_run() {
    let collector = MetricsCollector::new();
    assert!(!collector.has_active_run());
    assert!(collector.get_latest_run_summary(ORIGINAL_LABEL).is_none());
    assert_eq!(collector.labels().count(), 0);
}

#[test]
fn test_end_run_archives_and_resets() {
    let mut collector = MetricsCollector::new();
    collector.start_run();
    collector.add_result("ToolCalling", scores(&[("tool_count", 3.0)]));
    collector.end_run(ORIGINAL_LABEL);

    assert!(!collector.has_active_run());
    collector.start_run();
    assert!(collector.current().unwrap().is_empty());

    let summary = collector.get_latest_run_summary(ORIGINAL_LABEL).unwrap();
    assert_eq!(summary.evaluators["ToolCalling"]["tool_count"], 3.0);
}

#[test]
fn test_same_label_appends_snapshots() {
    let mut collector = MetricsCollector::new();

    collector.start_run();
    collector.add_result("Setup", scores(&[("complexity", 0.2)]));
    collector.end_run("t1");

    collector.start_run();
    collector.add_result("Setup", scores(&[("complexity", 0.8)]));
    collector.end_run("t1");

    let runs = collector.get_run_results("t1");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].metrics["Setup"]["complexity"], 0.2);
    assert_eq!(runs[1].metrics["Setup"]["complexity"], 0.8);

    let latest = collector.get_latest_run_summary("t1").unwrap();
    assert_eq!(latest.evaluators["Setup"]["complexity"], 0.8);
}

#[test]
fn test_end_run_without_results_archives_empty_snapshot() {
    let mut collector = MetricsCollector::new();
    collector.end_run("empty");
    collector.end_run("empty");

    assert_eq!(collector.get_run_results("empty").len(), 2);
    let summary = collector.get_latest_run_summary("empty").unwrap();
    assert!(summary.evaluators.is_empty());
    assert_eq!(summary.overall_score, 0.0);
}

#[test]
fn test_add_result_merges_keys() {
    let mut collector = MetricsCollector::new();
    collector.start_run();
    collector.add_result("E", scores(&[("a", 1.0), ("b", 2.0)]));
    collector.add_result("E", scores(&[("b", 5.0), ("c", 3.0)]));

    let current = &collector.current().unwrap()["E"];
    assert_eq!(current["a"], 1.0);
    assert_eq!(current["b"], 5.0);
    assert_eq!(current["c"], 3.0);
}

#[test]
fn test_add_raw_result_filters_input() {
    let mut collector = MetricsCollector::new();
    collector.start_run();

    collector.add_raw_result("Bad", &json!([1, 2, 3]));
    collector.add_raw_result("Bad", &json!("nope"));
    collector.add_raw_result("Mixed", &json!({"score": 0.5, "label": "x", "nested": {"a": 1}, "n": 2}));

    let current = collector.current().unwrap();
    assert!(!current.contains_key("Bad"));
    assert_eq!(current["Mixed"].len(), 2);
    assert_eq!(current["Mixed"]["n"], 2.0);
}

#[test]
fn test_overall_score_is_unweighted_mean() {
    let mut collector = MetricsCollector::new();
    collector.start_run();
    collector.add_result("A", scores(&[("x", 1.0), ("y", 0.0)]));
    collector.add_result("B", scores(&[("z", 0.5)]));
    collector.end_run(REPLAYED_LABEL);

    let summary = collector.get_latest_run_summary(REPLAYED_LABEL).unwrap();
    assert!((summary.overall_score - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_all_summaries_cover_every_label() {
    let mut collector = MetricsCollector::new();
    for label in [ORIGINAL_LABEL, REPLAYED_LABEL, "framework-test"] {
        collector.start_run();
        collector.add_result("E", scores(&[("m", 1.0)]));
        collector.end_run(label);
    }

    let summaries = collector.get_all_test_summaries();
    let labels: Vec<_> = summaries.keys().map(String::as_str).collect();
    assert_eq!(labels, vec!["framework-test", "original", "replayed"]);
    assert_eq!(collector.labels().count(), 3);
}
