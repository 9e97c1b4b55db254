//! A/B test: weighted variant selection and winner statistics

use super::random::RandomSource;
use crate::{ResearchError, ResearchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Sample count below which no winner is declared
pub const DEFAULT_MIN_SAMPLES: usize = 30;

/// Variant tag attached to each recorded result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
    #[serde(rename = "control")]
    Control,
}

impl Variant {
    /// Names other than `A` and `B` are tagged as control
    pub fn from_name(name: &str) -> Self {
        match name {
            "A" => Variant::A,
            "B" => Variant::B,
            _ => Variant::Control,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
            Variant::Control => "control",
        }
    }
}

/// A single recorded observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub variant: Variant,
    /// Registered variant name the value was recorded under
    pub variant_name: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Summary statistics for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStats {
    pub mean: f64,
    pub count: usize,
    /// Sample standard deviation (n-1); 0 with fewer than two samples
    pub std: f64,
}

impl VariantStats {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count < 2 {
            0.0
        } else {
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        };
        Some(Self { mean, count, std })
    }
}

/// Outcome of winner determination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerReport {
    pub winner: Option<String>,
    pub mean: Option<f64>,
    /// Relative-margin heuristic in `[0.5, 0.95]`, not a p-value
    pub confidence: Option<f64>,
    pub all_stats: BTreeMap<String, VariantStats>,
    /// Why no winner was declared
    pub reason: Option<String>,
}

impl WinnerReport {
    fn undecided(reason: String) -> Self {
        Self {
            winner: None,
            mean: None,
            confidence: None,
            all_stats: BTreeMap::new(),
            reason: Some(reason),
        }
    }
}

#[derive(Serialize)]
struct ExportedResult<'a> {
    variant: &'a str,
    value: f64,
    timestamp: String,
}

#[derive(Serialize)]
struct Export<'a> {
    test_name: &'a str,
    metric: &'a str,
    results: Vec<ExportedResult<'a>>,
    winner: WinnerReport,
}

/// Compares strategy variants on a single metric
#[derive(Debug, Clone)]
pub struct ABTest {
    name: String,
    metric: String,
    variants: BTreeMap<String, Value>,
    results: Vec<TestResult>,
    variant_stats: BTreeMap<String, Vec<f64>>,
}

impl ABTest {
    pub fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        variants: BTreeMap<String, Value>,
    ) -> Self {
        let variant_stats = variants.keys().map(|k| (k.clone(), Vec::new())).collect();
        Self {
            name: name.into(),
            metric: metric.into(),
            variants,
            results: Vec::new(),
            variant_stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn variants(&self) -> &BTreeMap<String, Value> {
        &self.variants
    }

    /// Configuration registered for a variant
    pub fn variant_config(&self, variant: &str) -> Option<&Value> {
        self.variants.get(variant)
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Raw metric values recorded for a variant
    pub fn values_for(&self, variant: &str) -> &[f64] {
        self.variant_stats
            .get(variant)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Draw one variant name by weighted random selection.
    ///
    /// Without a split every registered variant is equally likely. Each
    /// call is an independent draw. Empty splits, negative or non-finite
    /// weights, weights that sum to zero, and unregistered names are rejected.
    pub fn get_variant(
        &self,
        traffic_split: Option<&BTreeMap<String, f64>>,
        rng: &mut dyn RandomSource,
    ) -> ResearchResult<String> {
        let weights: Vec<(&str, f64)> = match traffic_split {
            Some(split) => split.iter().map(|(k, w)| (k.as_str(), *w)).collect(),
            None => self.variants.keys().map(|k| (k.as_str(), 1.0)).collect(),
        };

        if weights.is_empty() {
            return Err(ResearchError::experiment(format!(
                "Test '{}' has no variants to choose from",
                self.name
            )));
        }

        for (name, weight) in &weights {
            if !self.variants.contains_key(*name) {
                return Err(ResearchError::experiment(format!(
                    "Variant '{}' is not registered in test '{}'",
                    name, self.name
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ResearchError::experiment(format!(
                    "Invalid weight {} for variant '{}'",
                    weight, name
                )));
            }
        }

        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(ResearchError::experiment(format!(
                "Traffic split for test '{}' sums to zero",
                self.name
            )));
        }

        let target = rng.next_f64() * total;
        let mut cumulative = 0.0;
        for (name, weight) in &weights {
            cumulative += weight;
            if target < cumulative {
                return Ok((*name).to_string());
            }
        }

        // Rounding can leave the target at the very top of the range.
        let last = weights
            .iter()
            .rev()
            .find(|(_, w)| *w > 0.0)
            .map(|(name, _)| (*name).to_string())
            .unwrap_or_default();
        Ok(last)
    }

    /// Append an observation for a registered variant.
    pub fn record_result(
        &mut self,
        variant: &str,
        metric_value: f64,
        metadata: Option<HashMap<String, Value>>,
    ) -> ResearchResult<()> {
        let values = self.variant_stats.get_mut(variant).ok_or_else(|| {
            ResearchError::experiment(format!(
                "Cannot record result for unknown variant '{}' in test '{}'",
                variant, self.name
            ))
        })?;
        values.push(metric_value);

        self.results.push(TestResult {
            variant: Variant::from_name(variant),
            variant_name: variant.to_string(),
            metric_name: self.metric.clone(),
            metric_value,
            timestamp: Utc::now(),
            metadata: metadata.unwrap_or_default(),
        });

        debug!(
            test = %self.name,
            variant = variant,
            value = metric_value,
            total = self.results.len(),
            "Recorded experiment result"
        );
        Ok(())
    }

    /// Determine the variant with the highest mean once enough data exists.
    ///
    /// Ties go to the lexicographically smallest variant name.
    pub fn get_winner(&self, min_samples: usize) -> WinnerReport {
        if self.results.len() < min_samples {
            return WinnerReport::undecided(format!(
                "Insufficient data (need {} samples, have {})",
                min_samples,
                self.results.len()
            ));
        }

        let all_stats: BTreeMap<String, VariantStats> = self
            .variant_stats
            .iter()
            .filter_map(|(name, values)| {
                VariantStats::from_values(values).map(|stats| (name.clone(), stats))
            })
            .collect();

        let mut best: Option<(&String, &VariantStats)> = None;
        for (name, stats) in &all_stats {
            match best {
                Some((_, current)) if stats.mean <= current.mean => {}
                _ => best = Some((name, stats)),
            }
        }

        let Some((winner, winner_stats)) = best else {
            return WinnerReport::undecided("No results recorded".to_string());
        };

        let confidence = margin_confidence(winner, winner_stats.mean, &all_stats);

        WinnerReport {
            winner: Some(winner.clone()),
            mean: Some(winner_stats.mean),
            confidence: Some(confidence),
            all_stats: all_stats.clone(),
            reason: None,
        }
    }

    /// Write all results plus the current winner report as JSON.
    pub fn export_results(&self, path: impl AsRef<Path>) -> ResearchResult<()> {
        let export = Export {
            test_name: &self.name,
            metric: &self.metric,
            results: self
                .results
                .iter()
                .map(|r| ExportedResult {
                    variant: r.variant.as_str(),
                    value: r.metric_value,
                    timestamp: r.timestamp.to_rfc3339(),
                })
                .collect(),
            winner: self.get_winner(DEFAULT_MIN_SAMPLES),
        };

        let json = serde_json::to_string_pretty(&export)?;
        std::fs::write(path.as_ref(), json)?;
        info!(test = %self.name, path = %path.as_ref().display(), "Exported experiment results");
        Ok(())
    }
}

/// Mean relative margin of the winner over every other variant, offset by
/// 0.5 and clamped to `[0.5, 0.95]`.
fn margin_confidence(winner: &str, winner_mean: f64, stats: &BTreeMap<String, VariantStats>) -> f64 {
    let margins: Vec<f64> = stats
        .iter()
        .filter(|(name, _)| name.as_str() != winner)
        .map(|(_, other)| (winner_mean - other.mean) / winner_mean.max(0.01))
        .collect();

    if margins.is_empty() {
        return 0.5;
    }

    let avg = margins.iter().sum::<f64>() / margins.len() as f64;
    (0.5 + avg).clamp(0.5, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::random::SequenceSource;

    fn two_variant_test() -> ABTest {
        let mut variants = BTreeMap::new();
        variants.insert("A".to_string(), Value::from("comprehensive"));
        variants.insert("B".to_string(), Value::from("focused"));
        ABTest::new("planning_strategy", "plan_quality", variants)
    }

    #[test]
    fn test_default_split_is_uniform_over_registered_variants() {
        let test = two_variant_test();
        let mut rng = SequenceSource::new(vec![0.1, 0.6]);
        assert_eq!(test.get_variant(None, &mut rng).unwrap(), "A");
        assert_eq!(test.get_variant(None, &mut rng).unwrap(), "B");
    }

    #[test]
    fn test_zero_weight_variant_is_never_drawn() {
        let test = two_variant_test();
        let split: BTreeMap<String, f64> =
            [("A".to_string(), 0.0), ("B".to_string(), 2.0)].into_iter().collect();
        let mut rng = SequenceSource::new(vec![0.0, 0.5, 0.999_999]);
        for _ in 0..3 {
            assert_eq!(test.get_variant(Some(&split), &mut rng).unwrap(), "B");
        }
    }

    #[test]
    fn test_invalid_splits_are_rejected() {
        let test = two_variant_test();
        let mut rng = SequenceSource::new(vec![0.5]);

        let empty = BTreeMap::new();
        assert!(test.get_variant(Some(&empty), &mut rng).is_err());

        let negative: BTreeMap<String, f64> =
            [("A".to_string(), -1.0), ("B".to_string(), 2.0)].into_iter().collect();
        assert!(test.get_variant(Some(&negative), &mut rng).is_err());

        let zero: BTreeMap<String, f64> =
            [("A".to_string(), 0.0), ("B".to_string(), 0.0)].into_iter().collect();
        assert!(test.get_variant(Some(&zero), &mut rng).is_err());

        let unknown: BTreeMap<String, f64> = [("Z".to_string(), 1.0)].into_iter().collect();
        assert!(test.get_variant(Some(&unknown), &mut rng).is_err());
    }

    #[test]
    fn test_record_result_rejects_unknown_variant() {
        let mut test = two_variant_test();
        assert!(test.record_result("C", 1.0, None).is_err());
        assert!(test.results().is_empty());

        test.record_result("A", 0.4, None).unwrap();
        assert_eq!(test.values_for("A"), &[0.4]);
        assert_eq!(test.results()[0].variant, Variant::A);
        assert_eq!(test.results()[0].metric_name, "plan_quality");
    }

    #[test]
    fn test_winner_statistics() {
        let mut test = two_variant_test();
        for value in [0.8, 1.0, 0.9] {
            test.record_result("A", value, None).unwrap();
        }
        test.record_result("B", 0.45, None).unwrap();

        let report = test.get_winner(4);
        assert_eq!(report.winner.as_deref(), Some("A"));
        assert!((report.mean.unwrap() - 0.9).abs() < 1e-9);

        let a = &report.all_stats["A"];
        assert_eq!(a.count, 3);
        assert!((a.std - 0.1).abs() < 1e-9);
        assert_eq!(report.all_stats["B"].std, 0.0);

        // margin = (0.9 - 0.45) / 0.9 = 0.5, so 0.5 + 0.5 clamps to 0.95
        assert!((report.confidence.unwrap() - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_small_margin_confidence() {
        let mut test = two_variant_test();
        test.record_result("A", 1.0, None).unwrap();
        test.record_result("B", 0.9, None).unwrap();

        let report = test.get_winner(2);
        assert!((report.confidence.unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_single_variant_confidence_is_half() {
        let mut test = two_variant_test();
        test.record_result("B", 0.7, None).unwrap();

        let report = test.get_winner(1);
        assert_eq!(report.winner.as_deref(), Some("B"));
        assert_eq!(report.confidence, Some(0.5));
        assert!(!report.all_stats.contains_key("A"));
    }

    #[test]
    fn test_tie_goes_to_smallest_name() {
        let mut test = two_variant_test();
        test.record_result("B", 0.5, None).unwrap();
        test.record_result("A", 0.5, None).unwrap();

        assert_eq!(test.get_winner(2).winner.as_deref(), Some("A"));
    }

    #[test]
    fn test_insufficient_data() {
        let mut test = two_variant_test();
        test.record_result("A", 1.0, None).unwrap();

        let report = test.get_winner(DEFAULT_MIN_SAMPLES);
        assert!(report.winner.is_none());
        assert_eq!(
            report.reason.as_deref(),
            Some("Insufficient data (need 30 samples, have 1)")
        );
    }

    #[test]
    fn test_export_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        let mut test = two_variant_test();
        test.record_result("A", 0.6, None).unwrap();
        test.export_results(&path).unwrap();

        let exported: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported["test_name"], "planning_strategy");
        assert_eq!(exported["metric"], "plan_quality");
        assert_eq!(exported["results"][0]["variant"], "A");
        assert_eq!(exported["results"][0]["value"], 0.6);
        assert!(exported["winner"]["winner"].is_null());
    }
}
