use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Problem, ProblemFeatures, SimilarityCandidate, SimilarityEdge, SimilarityResult};

/// Read and embedding-write operations over problems.
#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get_problem(&self, id: &str) -> Result<Option<Problem>>;
    async fn get_problem_tags(&self, id: &str) -> Result<HashSet<String>>;

    /// Next `count` source problems for a batch run, oldest first.
    async fn pick_batch(&self, count: u32) -> Result<Vec<String>>;

    async fn update_statement_embedding(&self, id: &str, embedding: &[f32]) -> Result<()>;
    async fn update_solution_embedding(&self, id: &str, embedding: &[f32]) -> Result<()>;

    /// Bounded candidate pool for one source problem. Candidates must share a
    /// tag with the source, sit within the eligible competition keys, and beat
    /// `min_similarity` on statement cosine similarity; never includes the
    /// source itself.
    async fn find_candidates(
        &self,
        source: &ProblemFeatures,
        eligible_keys: &[String],
        min_similarity: f64,
        limit: u32,
    ) -> Result<Vec<SimilarityCandidate>>;
}

/// Persistence of directed similarity edges.
///
/// The relationship is symmetric at the application level, but each direction
/// is computed and stored only when its own side is processed as a source.
/// Nothing here reconciles the two directions: `remove_similarity` deletes one
/// row, and the reverse edge (if present) survives until its own side is
/// recomputed or removed.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Delete all outgoing edges of `source_id`, then insert one edge per
    /// result. Idempotent; the only bulk write path used by the batch runner.
    async fn replace_similarities(
        &self,
        source_id: &str,
        results: &[SimilarityResult],
    ) -> Result<u64>;

    async fn get_outgoing(&self, problem_id: &str) -> Result<Vec<SimilarityEdge>>;
    async fn has_any_similarities(&self, problem_id: &str) -> Result<bool>;
    async fn remove_similarity(&self, source_id: &str, target_id: &str) -> Result<bool>;
    async fn clear_similarities(&self, problem_id: &str) -> Result<u64>;
}

/// A complete backend combining both store traits.
pub trait SimilarityBackend: ProblemStore + SimilarityStore {}

impl<T: ProblemStore + SimilarityStore> SimilarityBackend for T {}
