//! Registry of named A/B tests owned by one pipeline run

use super::ab_test::{ABTest, WinnerReport};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

/// Name to test registry. Constructed per pipeline instance and passed by
/// reference; there is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct ABTestManager {
    active_tests: BTreeMap<String, ABTest>,
}

impl ABTestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test, replacing any existing test with the same name.
    ///
    /// Re-registering is idempotent setup, not an error; prior results for
    /// that name are discarded.
    pub fn create_test(
        &mut self,
        name: &str,
        metric: &str,
        variants: BTreeMap<String, Value>,
    ) -> &mut ABTest {
        let test = ABTest::new(name, metric, variants);
        match self.active_tests.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                debug!(test = name, "Replacing existing experiment");
                entry.insert(test);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(test),
        }
    }

    pub fn get_test(&self, name: &str) -> Option<&ABTest> {
        self.active_tests.get(name)
    }

    pub fn get_test_mut(&mut self, name: &str) -> Option<&mut ABTest> {
        self.active_tests.get_mut(name)
    }

    /// Registered test names in sorted order
    pub fn list_tests(&self) -> Vec<String> {
        self.active_tests.keys().cloned().collect()
    }

    /// Winner report for every registered test
    pub fn winners(&self, min_samples: usize) -> BTreeMap<String, WinnerReport> {
        self.active_tests
            .iter()
            .map(|(name, test)| (name.clone(), test.get_winner(min_samples)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(a: &str, b: &str) -> BTreeMap<String, Value> {
        [("A".to_string(), Value::from(a)), ("B".to_string(), Value::from(b))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_create_get_and_list() {
        let mut manager = ABTestManager::new();
        manager.create_test("planning_strategy", "plan_quality", variants("comprehensive", "focused"));
        manager.create_test("analysis_depth", "confidence", variants("deep", "standard"));

        assert_eq!(manager.list_tests(), vec!["analysis_depth", "planning_strategy"]);
        assert_eq!(manager.get_test("analysis_depth").unwrap().metric(), "confidence");
        assert!(manager.get_test("missing").is_none());
    }

    #[test]
    fn test_create_overwrites_silently() {
        let mut manager = ABTestManager::new();
        manager
            .create_test("t", "m", variants("x", "y"))
            .record_result("A", 1.0, None)
            .unwrap();

        manager.create_test("t", "other", variants("x", "y"));
        let test = manager.get_test("t").unwrap();
        assert_eq!(test.metric(), "other");
        assert!(test.results().is_empty());
        assert_eq!(manager.list_tests().len(), 1);
    }
}
