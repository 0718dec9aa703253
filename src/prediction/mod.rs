//! Next-page prediction from navigation history.

use serde::{Deserialize, Serialize};

use crate::config::PredictionConfig;
use crate::navigation::NavigationLog;

/// Default sample floor; matching edges must strictly exceed it
pub const DEFAULT_MIN_SAMPLES: usize = 3;

/// Default confidence threshold (exclusive)
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Most probable next destination for a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub target: Option<String>,
    /// Share of matching edges that led to the leading destination
    pub confidence: f64,
}

impl PredictionResult {
    pub fn none() -> Self {
        Self {
            target: None,
            confidence: 0.0,
        }
    }

    pub fn is_some(&self) -> bool {
        self.target.is_some()
    }
}

/// Frequency-based predictor over a [`NavigationLog`].
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    min_samples: usize,
    threshold: f64,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES, DEFAULT_THRESHOLD)
    }
}

impl PredictionEngine {
    pub fn new(min_samples: usize, threshold: f64) -> Self {
        Self { min_samples, threshold }
    }

    pub fn from_config(config: &PredictionConfig) -> Self {
        Self::new(config.min_samples, config.threshold)
    }

    /// Predict where `current` leads next.
    ///
    /// Destinations with equal counts keep their first-seen order, so the
    /// earliest recorded one wins a tie.
    pub fn predict(&self, log: &NavigationLog, current: &str) -> PredictionResult {
        let mut tally: Vec<(&str, usize)> = Vec::new();
        let mut total = 0usize;

        for edge in log.outgoing(current) {
            total += 1;
            match tally.iter_mut().find(|(to, _)| *to == edge.to) {
                Some((_, count)) => *count += 1,
                None => tally.push((edge.to.as_str(), 1)),
            }
        }

        if total <= self.min_samples {
            return PredictionResult::none();
        }

        // Stable sort: ties stay in insertion order
        tally.sort_by(|a, b| b.1.cmp(&a.1));
        let Some(&(leader, count)) = tally.first() else {
            return PredictionResult::none();
        };

        let confidence = count as f64 / total as f64;
        if confidence > self.threshold {
            PredictionResult {
                target: Some(leader.to_string()),
                confidence,
            }
        } else {
            PredictionResult {
                target: None,
                confidence,
            }
        }
    }
}
