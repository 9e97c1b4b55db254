//! A/B experiments for tuning strategy choices

pub mod ab_test;
pub mod manager;
pub mod random;

pub use ab_test::{ABTest, TestResult, Variant, VariantStats, WinnerReport, DEFAULT_MIN_SAMPLES};
pub use manager::ABTestManager;
pub use random::{seeded_rng, RandomSource, SequenceSource};
