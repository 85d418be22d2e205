use crate::config::SimilarityConfig;
use crate::db::SimilarityBackend;
use crate::error::Result;
use crate::models::{ProblemFeatures, SimilarityCandidate};

/// Retrieval policy for one source problem: turns the cluster map and
/// tolerance into an eligible key set, then delegates the bounded three-filter
/// query to the store.
pub struct CandidateFinder<'a> {
    config: &'a SimilarityConfig,
}

impl<'a> CandidateFinder<'a> {
    pub fn new(config: &'a SimilarityConfig) -> Self {
        Self { config }
    }

    pub async fn find(
        &self,
        db: &dyn SimilarityBackend,
        source: &ProblemFeatures,
    ) -> Result<Vec<SimilarityCandidate>> {
        if source.tag_ids.is_empty() {
            tracing::debug!(problem_id = %source.id, "No tags, candidate pool is empty");
            return Ok(Vec::new());
        }

        let Some(center) = self.config.clusters.position(&source.competition_key) else {
            tracing::debug!(
                problem_id = %source.id,
                competition_key = %source.competition_key,
                "Competition key not in cluster map, candidate pool is empty"
            );
            return Ok(Vec::new());
        };

        let eligible_keys = self
            .config
            .clusters
            .keys_within(center, self.config.competition_tolerance);

        db.find_candidates(
            source,
            &eligible_keys,
            self.config.min_statement_similarity,
            self.config.candidate_limit,
        )
        .await
    }
}
