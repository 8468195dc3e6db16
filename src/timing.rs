//! Per-stage elapsed-time samples.
//!
//! Pages run concurrently, so this is the one piece of mutable state the
//! chains share. Appends are order-independent; only successful stage
//! invocations are recorded.

use crate::output::Stage;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// Elapsed durations per stage, one sample per successful invocation.
#[derive(Debug, Default)]
pub struct StageTiming {
    samples: Mutex<HashMap<Stage, Vec<Duration>>>,
}

impl StageTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one successful invocation of `stage`.
    pub fn record(&self, stage: Stage, elapsed: Duration) {
        let mut samples = self
            .samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        samples.entry(stage).or_default().push(elapsed);
    }

    /// Number of samples recorded for `stage`.
    pub fn count(&self, stage: Stage) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&stage)
            .map_or(0, Vec::len)
    }

    /// Mean duration in seconds; `0.0` when the stage never succeeded.
    pub fn average_secs(&self, stage: Stage) -> f64 {
        let samples = self
            .samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match samples.get(&stage) {
            Some(v) if !v.is_empty() => {
                let total: f64 = v.iter().map(Duration::as_secs_f64).sum();
                total / v.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Average seconds for every page stage, keyed by stage name.
    pub fn summary(&self) -> BTreeMap<String, f64> {
        Stage::ALL
            .iter()
            .map(|&s| (s.as_str().to_string(), self.average_secs(s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stage_averages_to_zero() {
        let timing = StageTiming::new();
        assert_eq!(timing.average_secs(Stage::Reorder), 0.0);
        assert_eq!(timing.count(Stage::Reorder), 0);
        let summary = timing.summary();
        assert_eq!(summary.len(), 4);
        assert!(summary.values().all(|&v| v == 0.0));
    }

    #[test]
    fn average_over_samples() {
        let timing = StageTiming::new();
        timing.record(Stage::Enhance, Duration::from_millis(100));
        timing.record(Stage::Enhance, Duration::from_millis(300));
        assert_eq!(timing.count(Stage::Enhance), 2);
        assert!((timing.average_secs(Stage::Enhance) - 0.2).abs() < 1e-9);
        assert_eq!(timing.summary()["enhance"], timing.average_secs(Stage::Enhance));
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let timing = std::sync::Arc::new(StageTiming::new());
        let mut handles = Vec::new();
        for i in 0..16u64 {
            let t = timing.clone();
            handles.push(tokio::spawn(async move {
                t.record(Stage::Extraction, Duration::from_millis(i));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(timing.count(Stage::Extraction), 16);
    }
}
