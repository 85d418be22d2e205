use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SimilarityConfig;
use crate::db::SimilarityBackend;
use crate::embeddings::{EmbeddingCoordinator, EmbeddingProvider};
use crate::error::{ProbsimError, Result};
use crate::models::{ProblemFeatures, SimilarityResult};
use crate::similarity::{scoring, CandidateFinder};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Number of source problems to process.
    pub count: u32,
    /// Skip problems that already have outgoing edges.
    pub skip_processed: bool,
    /// Ensure embeddings but do not score or persist.
    pub embeddings_only: bool,
    /// Regenerate embeddings even when present.
    pub force_regenerate: bool,
}

/// Terminal state of one source problem within a batch run. Errors become the
/// fourth state (failed) in the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped,
    EmbeddingsOnly,
    Scored { edges: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub selected: usize,
    pub scored: u64,
    pub skipped: u64,
    pub embeddings_only: u64,
    pub failed: u64,
    pub edges_created: u64,
}

/// Sequential batch runner: one source problem is fully processed
/// (embeddings, candidates, scoring, persistence) before the next begins.
/// Failure is isolated per problem; a failing item never aborts the run.
pub struct SimilarityBatchRunner {
    db: Arc<dyn SimilarityBackend>,
    coordinator: EmbeddingCoordinator,
    config: SimilarityConfig,
}

impl SimilarityBatchRunner {
    pub fn new(
        db: Arc<dyn SimilarityBackend>,
        provider: Arc<dyn EmbeddingProvider>,
        config: SimilarityConfig,
    ) -> Self {
        let coordinator = EmbeddingCoordinator::new(db.clone(), provider);
        Self {
            db,
            coordinator,
            config,
        }
    }

    pub async fn run(
        &self,
        options: &BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let ids = self.db.pick_batch(options.count).await?;
        let mut summary = RunSummary {
            selected: ids.len(),
            ..Default::default()
        };

        if ids.is_empty() {
            info!("No problems selected, nothing to do");
            return Ok(summary);
        }

        info!(count = ids.len(), "Starting similarity batch");

        for id in &ids {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping before next problem");
                break;
            }

            match self.process_one(id, options).await {
                Ok(ItemOutcome::Skipped) => {
                    debug!(problem_id = %id, "Already processed, skipping");
                    summary.skipped += 1;
                }
                Ok(ItemOutcome::EmbeddingsOnly) => {
                    debug!(problem_id = %id, "Embeddings ensured, scoring skipped");
                    summary.embeddings_only += 1;
                }
                Ok(ItemOutcome::Scored { edges }) => {
                    debug!(problem_id = %id, edges, "Similarities stored");
                    summary.scored += 1;
                    summary.edges_created += edges;
                }
                Err(e) => {
                    error!(problem_id = %id, error = %e, "Failed to process problem");
                    summary.failed += 1;
                }
            }
        }

        info!(
            scored = summary.scored,
            skipped = summary.skipped,
            embeddings_only = summary.embeddings_only,
            failed = summary.failed,
            edges_created = summary.edges_created,
            "Similarity batch complete"
        );

        Ok(summary)
    }

    /// Transition function for one source problem.
    async fn process_one(&self, problem_id: &str, options: &BatchOptions) -> Result<ItemOutcome> {
        if options.skip_processed && self.db.has_any_similarities(problem_id).await? {
            return Ok(ItemOutcome::Skipped);
        }

        self.coordinator
            .ensure_embeddings(problem_id, options.force_regenerate)
            .await?;

        if options.embeddings_only {
            return Ok(ItemOutcome::EmbeddingsOnly);
        }

        let problem = self
            .db
            .get_problem(problem_id)
            .await?
            .ok_or_else(|| ProbsimError::NotFound(format!("Problem not found: {problem_id}")))?;
        let tags = self.db.get_problem_tags(problem_id).await?;
        let features = ProblemFeatures::from_problem(problem, tags)?;

        let finder = CandidateFinder::new(&self.config);
        let candidates = finder.find(&*self.db, &features).await?;
        debug!(
            problem_id,
            candidates = candidates.len(),
            "Scoring candidate pool"
        );

        let results: Vec<SimilarityResult> = candidates
            .iter()
            .map(|candidate| {
                scoring::score(
                    &features,
                    candidate,
                    &self.config.weights,
                    &self.config.clusters,
                )
            })
            .collect();

        let edges = self.db.replace_similarities(problem_id, &results).await?;
        Ok(ItemOutcome::Scored { edges })
    }
}
