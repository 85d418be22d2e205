use std::collections::HashMap;
use std::env;

use crate::error::{ProbsimError, Result};
use crate::models::{ClusterMap, SimilarityWeights};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Built-in competition ladder: positions on the 0–10 scale for the
/// Czech/Slovak olympiad rounds plus the international tier. Overridable via
/// the `COMPETITION_CLUSTERS` env var (a JSON object of key to position).
const DEFAULT_CLUSTERS: &[(&str, f64)] = &[
    ("mo-z5", 0.5),
    ("mo-z6", 1.0),
    ("mo-z7", 1.5),
    ("mo-z8", 2.0),
    ("mo-z9", 2.5),
    ("mo-c-skolni", 3.5),
    ("mo-c-krajske", 4.5),
    ("mo-b-skolni", 4.0),
    ("mo-b-krajske", 5.0),
    ("mo-a-skolni", 5.0),
    ("mo-a-krajske", 6.5),
    ("mo-a-celostatni", 8.0),
    ("memo", 9.0),
    ("egmo", 9.0),
    ("imo", 10.0),
];

fn parse_cluster_positions() -> HashMap<String, f64> {
    match env::var("COMPETITION_CLUSTERS") {
        Ok(raw) if !raw.is_empty() => match serde_json::from_str::<HashMap<String, f64>>(&raw) {
            Ok(positions) => positions,
            Err(e) => {
                tracing::warn!(
                    "Invalid COMPETITION_CLUSTERS JSON: {}. Using built-in ladder.",
                    e
                );
                default_cluster_positions()
            }
        },
        _ => default_cluster_positions(),
    }
}

fn default_cluster_positions() -> HashMap<String, f64> {
    DEFAULT_CLUSTERS
        .iter()
        .map(|(key, pos)| (key.to_string(), *pos))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingsConfig,
    pub similarity: SimilarityConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    /// Base URL of the embedding service, e.g. `http://localhost:8000`.
    pub base_url: String,
    pub timeout_secs: u64,
    pub dimensions: usize,
}

#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    pub weights: SimilarityWeights,
    /// Cosine similarity a candidate's statement embedding must exceed.
    pub min_statement_similarity: f64,
    /// Hard cap on the candidate pool per source problem.
    pub candidate_limit: u32,
    /// How far apart two cluster positions may be for candidate eligibility.
    pub competition_tolerance: f64,
    pub clusters: ClusterMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:probsim.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            embeddings: EmbeddingsConfig {
                base_url: env::var("EMBEDDING_SERVICE_URL")
                    .unwrap_or_else(|_| "http://localhost:8000".to_string()),
                timeout_secs: parse_env_or("EMBEDDING_TIMEOUT", 30),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 768),
            },
            similarity: SimilarityConfig {
                weights: SimilarityWeights {
                    statement: parse_env_or("SIMILARITY_WEIGHT_STATEMENT", 0.4),
                    solution: parse_env_or("SIMILARITY_WEIGHT_SOLUTION", 0.3),
                    tags: parse_env_or("SIMILARITY_WEIGHT_TAGS", 0.2),
                    competition: parse_env_or("SIMILARITY_WEIGHT_COMPETITION", 0.1),
                },
                min_statement_similarity: parse_env_or("SIMILARITY_MIN_STATEMENT", 0.65),
                candidate_limit: parse_env_or("SIMILARITY_CANDIDATE_LIMIT", 40),
                competition_tolerance: parse_env_or("COMPETITION_TOLERANCE", 2.5),
                clusters: ClusterMap::new(
                    parse_cluster_positions(),
                    parse_env_or("COMPETITION_SCALE_MAX", 10.0),
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Startup validation: any failure here aborts the run before the first
    /// item is touched.
    pub fn validate(&self) -> Result<()> {
        self.similarity.validate()?;

        if self.embeddings.dimensions == 0 {
            return Err(ProbsimError::Config(
                "EMBEDDING_DIMENSIONS must be positive".to_string(),
            ));
        }
        if self.embeddings.timeout_secs == 0 {
            return Err(ProbsimError::Config(
                "EMBEDDING_TIMEOUT must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        if self.clusters.is_empty() {
            return Err(ProbsimError::Config(
                "competition cluster map must not be empty".to_string(),
            ));
        }

        let scale_max = self.clusters.scale_max();
        if !scale_max.is_finite() || scale_max <= 0.0 {
            return Err(ProbsimError::Config(format!(
                "COMPETITION_SCALE_MAX must be a positive number, got {scale_max}"
            )));
        }

        if !self.competition_tolerance.is_finite()
            || self.competition_tolerance < 0.0
            || self.competition_tolerance > scale_max
        {
            return Err(ProbsimError::Config(format!(
                "COMPETITION_TOLERANCE must lie within [0, {scale_max}], got {}",
                self.competition_tolerance
            )));
        }

        if !self.min_statement_similarity.is_finite()
            || !(0.0..=1.0).contains(&self.min_statement_similarity)
        {
            return Err(ProbsimError::Config(format!(
                "SIMILARITY_MIN_STATEMENT must lie within [0, 1], got {}",
                self.min_statement_similarity
            )));
        }

        if self.candidate_limit == 0 {
            return Err(ProbsimError::Config(
                "SIMILARITY_CANDIDATE_LIMIT must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
