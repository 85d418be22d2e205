use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProbsimError, Result};

/// Relative importance of the four similarity signals.
///
/// Weights are validated once at configuration load and normalized to sum to 1
/// before every use; the raw values only have to be non-negative with a
/// positive sum.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimilarityWeights {
    pub statement: f64,
    pub solution: f64,
    pub tags: f64,
    pub competition: f64,
}

impl SimilarityWeights {
    pub fn sum(&self) -> f64 {
        self.statement + self.solution + self.tags + self.competition
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("statement", self.statement),
            ("solution", self.solution),
            ("tags", self.tags),
            ("competition", self.competition),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ProbsimError::Config(format!(
                    "similarity weight '{name}' must be a non-negative number, got {value}"
                )));
            }
        }

        if self.sum() <= 0.0 {
            return Err(ProbsimError::Config(
                "similarity weights must not all be zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Scale the weights so they sum to exactly 1.
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        Self {
            statement: self.statement / sum,
            solution: self.solution / sum,
            tags: self.tags / sum,
            competition: self.competition / sum,
        }
    }
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            statement: 0.4,
            solution: 0.3,
            tags: 0.2,
            competition: 0.1,
        }
    }
}

/// Maps competition cluster keys to positions on a bounded difficulty/scope
/// scale (convention: 0–10). Two problems whose positions are close compete in
/// comparable contexts; keys absent from the map never qualify as candidates.
#[derive(Debug, Clone)]
pub struct ClusterMap {
    positions: HashMap<String, f64>,
    scale_max: f64,
}

impl ClusterMap {
    pub fn new(positions: HashMap<String, f64>, scale_max: f64) -> Self {
        Self {
            positions,
            scale_max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn scale_max(&self) -> f64 {
        self.scale_max
    }

    pub fn position(&self, key: &str) -> Option<f64> {
        self.positions.get(key).copied()
    }

    /// All keys whose position lies within `tolerance` of `center`.
    pub fn keys_within(&self, center: f64, tolerance: f64) -> Vec<String> {
        let mut keys: Vec<String> = self
            .positions
            .iter()
            .filter(|(_, pos)| (*pos - center).abs() <= tolerance)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Linear decay over the scale: identical positions score 1.0, positions a
    /// full scale apart score 0.0. Keys missing from the map score 0.0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        match (self.position(a), self.position(b)) {
            (Some(pos_a), Some(pos_b)) => {
                (1.0 - (pos_a - pos_b).abs() / self.scale_max).max(0.0)
            }
            _ => 0.0,
        }
    }
}

/// Per-signal sub-scores retained alongside the final score. The solution
/// component is `None` when either side of the pair has no solution embedding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityComponents {
    pub statement: f64,
    pub solution: Option<f64>,
    pub tags: f64,
    pub competition: f64,
}

/// One scored candidate, ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub target_id: String,
    pub target_label: String,
    pub score: f64,
    pub components: SimilarityComponents,
}

/// A directed edge in the similarity graph, as stored in `similarities`.
///
/// Both directions of a logically symmetric relationship may exist as
/// independent rows, each written when its own source side was processed; the
/// store never reconciles the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub score: f64,
    pub components: SimilarityComponents,
    pub created_at: DateTime<Utc>,
}
