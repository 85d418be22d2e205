use std::sync::Arc;

use crate::db::SimilarityBackend;
use crate::error::{ProbsimError, Result};

use super::provider::{EmbedRole, EmbeddingProvider};

/// Makes sure a problem carries the vectors the scoring engine needs before
/// any comparison is attempted.
pub struct EmbeddingCoordinator {
    db: Arc<dyn SimilarityBackend>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingCoordinator {
    pub fn new(db: Arc<dyn SimilarityBackend>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, provider }
    }

    /// Generate and persist any missing embeddings for one problem.
    ///
    /// Fast path: statement embedding present, solution embedding present
    /// whenever solution text exists, and no force flag. That path returns
    /// without any network call. Otherwise the provider is called once per needed text
    /// field with role `passage`. Provider errors propagate; retrying is the
    /// batch runner's decision, not ours.
    pub async fn ensure_embeddings(&self, problem_id: &str, force_regenerate: bool) -> Result<()> {
        let problem = self
            .db
            .get_problem(problem_id)
            .await?
            .ok_or_else(|| ProbsimError::NotFound(format!("Problem not found: {problem_id}")))?;

        let needs_statement = force_regenerate || problem.statement_embedding.is_none();
        let needs_solution =
            problem.solution.is_some() && (force_regenerate || problem.solution_embedding.is_none());

        if !needs_statement && !needs_solution {
            tracing::trace!(problem_id, "Embeddings already present");
            return Ok(());
        }

        if needs_statement {
            let embedding = self.embed_one(&problem.statement).await?;
            self.db
                .update_statement_embedding(problem_id, &embedding)
                .await?;
            tracing::debug!(problem_id, "Statement embedding stored");
        }

        if needs_solution {
            // needs_solution implies solution text exists
            let solution = problem.solution.as_deref().unwrap_or_default();
            let embedding = self.embed_one(solution).await?;
            self.db
                .update_solution_embedding(problem_id, &embedding)
                .await?;
            tracing::debug!(problem_id, "Solution embedding stored");
        }

        Ok(())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self
            .provider
            .embed(&[text.to_string()], EmbedRole::Passage)
            .await?;

        vectors
            .into_iter()
            .next()
            .ok_or_else(|| ProbsimError::Embedding("No embedding returned".to_string()))
    }
}
