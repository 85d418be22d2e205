use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProbsimError, Result};

/// A competition math problem as stored in the `problems` table.
///
/// Embeddings are nullable in the schema: a freshly imported problem has no
/// vectors until the embedding coordinator generates them. Solution text (and
/// therefore its embedding) is optional; plenty of archived problems were
/// imported without a published solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    /// Human-readable label, e.g. "MO 2021 A-I-3".
    pub label: String,
    /// Competition cluster key, e.g. "mo-a-krajske" or "imo".
    pub competition_key: String,
    pub statement: String,
    pub solution: Option<String>,
    pub statement_embedding: Option<Vec<f32>>,
    pub solution_embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    pub fn new(id: String, label: String, competition_key: String, statement: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            label,
            competition_key,
            statement,
            solution: None,
            statement_embedding: None,
            solution_embedding: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The signals the scoring engine needs for one side of a comparison.
///
/// Constructed fresh per batch run from current database state; never cached
/// across runs. The statement embedding is required: features cannot be built
/// for a problem that has not been embedded yet.
#[derive(Debug, Clone)]
pub struct ProblemFeatures {
    pub id: String,
    pub tag_ids: HashSet<String>,
    pub competition_key: String,
    pub statement_embedding: Vec<f32>,
    pub solution_embedding: Option<Vec<f32>>,
}

impl ProblemFeatures {
    pub fn from_problem(problem: Problem, tag_ids: HashSet<String>) -> Result<Self> {
        let statement_embedding = problem.statement_embedding.ok_or_else(|| {
            ProbsimError::Invariant(format!(
                "problem {} has no statement embedding after embedding step",
                problem.id
            ))
        })?;

        Ok(Self {
            id: problem.id,
            tag_ids,
            competition_key: problem.competition_key,
            statement_embedding,
            solution_embedding: problem.solution_embedding,
        })
    }
}

/// One retrieval hit: the candidate's scoring features plus its display label.
#[derive(Debug, Clone)]
pub struct SimilarityCandidate {
    pub label: String,
    pub features: ProblemFeatures,
}
