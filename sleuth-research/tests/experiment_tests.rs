//! A/B experiment behaviour over many draws

use serde_json::Value;
use sleuth_research::{ABTest, ABTestManager, SequenceSource, DEFAULT_MIN_SAMPLES};
use std::collections::BTreeMap;

fn two_variant_test() -> ABTest {
    let variants: BTreeMap<String, Value> = [
        ("A".to_string(), Value::from("comprehensive")),
        ("B".to_string(), Value::from("focused")),
    ]
    .into_iter()
    .collect();
    ABTest::new("planning_strategy", "plan_quality", variants)
}

fn split(a: f64, b: f64) -> BTreeMap<String, f64> {
    [("A".to_string(), a), ("B".to_string(), b)]
        .into_iter()
        .collect()
}

fn frequency_of_a(test: &ABTest, weights: &BTreeMap<String, f64>, seed: u64) -> f64 {
    let mut rng = fastrand::Rng::with_seed(seed);
    let draws = 10_000;
    let hits = (0..draws)
        .filter(|_| test.get_variant(Some(weights), &mut rng).unwrap() == "A")
        .count();
    hits as f64 / draws as f64
}

#[test]
fn test_zero_weight_variant_is_never_drawn() {
    let test = two_variant_test();
    assert_eq!(frequency_of_a(&test, &split(1.0, 0.0), 1), 1.0);
}

#[test]
fn test_draw_frequencies_follow_weights() {
    let test = two_variant_test();

    let seventy = frequency_of_a(&test, &split(0.7, 0.3), 2);
    assert!((seventy - 0.7).abs() < 0.02, "observed {}", seventy);

    // Weights need not sum to one.
    let quarter = frequency_of_a(&test, &split(1.0, 3.0), 3);
    assert!((quarter - 0.25).abs() < 0.02, "observed {}", quarter);
}

#[test]
fn test_default_split_is_uniform() {
    let test = two_variant_test();
    let mut rng = fastrand::Rng::with_seed(4);
    let hits = (0..10_000)
        .filter(|_| test.get_variant(None, &mut rng).unwrap() == "A")
        .count();
    let frequency = hits as f64 / 10_000.0;
    assert!((frequency - 0.5).abs() < 0.02, "observed {}", frequency);
}

#[test]
fn test_invalid_splits_are_rejected() {
    let test = two_variant_test();
    let mut rng = SequenceSource::new(vec![0.5]);

    assert!(test.get_variant(Some(&BTreeMap::new()), &mut rng).is_err());
    assert!(test.get_variant(Some(&split(0.0, 0.0)), &mut rng).is_err());
    assert!(test.get_variant(Some(&split(-1.0, 2.0)), &mut rng).is_err());
    assert!(test.get_variant(Some(&split(f64::NAN, 1.0)), &mut rng).is_err());

    let unknown: BTreeMap<String, f64> = [("C".to_string(), 1.0)].into_iter().collect();
    assert!(test.get_variant(Some(&unknown), &mut rng).is_err());
}

#[test]
fn test_winner_requires_minimum_samples() {
    let mut test = two_variant_test();
    for i in 0..(DEFAULT_MIN_SAMPLES - 1) {
        let variant = if i % 2 == 0 { "A" } else { "B" };
        let value = if variant == "A" { 0.8 } else { 0.4 };
        test.record_result(variant, value, None).unwrap();
    }

    let undecided = test.get_winner(DEFAULT_MIN_SAMPLES);
    assert!(undecided.winner.is_none());
    assert_eq!(
        undecided.reason.as_deref(),
        Some("Insufficient data (need 30 samples, have 29)")
    );

    test.record_result("B", 0.4, None).unwrap();
    let report = test.get_winner(DEFAULT_MIN_SAMPLES);
    assert_eq!(report.winner.as_deref(), Some("A"));
    assert!((report.mean.unwrap() - 0.8).abs() < 1e-9);

    let confidence = report.confidence.unwrap();
    assert!((0.5..=0.95).contains(&confidence));
    assert_eq!(report.all_stats["A"].count, 15);
    assert_eq!(report.all_stats["B"].count, 15);
}

#[test]
fn test_unknown_variant_result_is_rejected() {
    let mut test = two_variant_test();
    assert!(test.record_result("Z", 1.0, None).is_err());
    assert!(test.results().is_empty());
}

#[test]
fn test_manager_reports_every_experiment() {
    let mut manager = ABTestManager::new();
    let variants = |a: &str, b: &str| -> BTreeMap<String, Value> {
        [
            ("A".to_string(), Value::from(a)),
            ("B".to_string(), Value::from(b)),
        ]
        .into_iter()
        .collect()
    };
    manager.create_test("planning_strategy", "plan_quality", variants("comprehensive", "focused"));
    manager.create_test("analysis_depth", "confidence", variants("deep", "standard"));

    let test = manager.get_test_mut("analysis_depth").unwrap();
    test.record_result("B", 0.9, None).unwrap();
    test.record_result("A", 0.6, None).unwrap();

    assert_eq!(
        manager.list_tests(),
        vec!["analysis_depth".to_string(), "planning_strategy".to_string()]
    );

    let winners = manager.winners(2);
    assert_eq!(winners["analysis_depth"].winner.as_deref(), Some("B"));
    assert!(winners["planning_strategy"].winner.is_none());
}
