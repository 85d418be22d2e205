use std::collections::HashSet;

use async_trait::async_trait;

use crate::db::connection::Database;
use crate::db::repository::{ProblemRepository, SimilarityRepository};
use crate::db::traits::{ProblemStore, SimilarityStore};
use crate::error::Result;
use crate::models::{Problem, ProblemFeatures, SimilarityCandidate, SimilarityEdge, SimilarityResult};

/// Store implementation over libsql. Every call opens a fresh short-lived
/// connection; no transaction spans more than one call.
pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProblemStore for LibSqlBackend {
    async fn get_problem(&self, id: &str) -> Result<Option<Problem>> {
        let conn = self.db.connect()?;
        ProblemRepository::get_by_id(&conn, id).await
    }

    async fn get_problem_tags(&self, id: &str) -> Result<HashSet<String>> {
        let conn = self.db.connect()?;
        ProblemRepository::get_tags(&conn, id).await
    }

    async fn pick_batch(&self, count: u32) -> Result<Vec<String>> {
        let conn = self.db.connect()?;
        ProblemRepository::pick_batch(&conn, count).await
    }

    async fn update_statement_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        let conn = self.db.connect()?;
        ProblemRepository::update_statement_embedding(&conn, id, embedding).await
    }

    async fn update_solution_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        let conn = self.db.connect()?;
        ProblemRepository::update_solution_embedding(&conn, id, embedding).await
    }

    async fn find_candidates(
        &self,
        source: &ProblemFeatures,
        eligible_keys: &[String],
        min_similarity: f64,
        limit: u32,
    ) -> Result<Vec<SimilarityCandidate>> {
        let conn = self.db.connect()?;
        ProblemRepository::find_candidates(&conn, source, eligible_keys, min_similarity, limit)
            .await
    }
}

#[async_trait]
impl SimilarityStore for LibSqlBackend {
    async fn replace_similarities(
        &self,
        source_id: &str,
        results: &[SimilarityResult],
    ) -> Result<u64> {
        let conn = self.db.connect()?;
        SimilarityRepository::replace(&conn, source_id, results).await
    }

    async fn get_outgoing(&self, problem_id: &str) -> Result<Vec<SimilarityEdge>> {
        let conn = self.db.connect()?;
        SimilarityRepository::get_outgoing(&conn, problem_id).await
    }

    async fn has_any_similarities(&self, problem_id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        SimilarityRepository::has_any(&conn, problem_id).await
    }

    async fn remove_similarity(&self, source_id: &str, target_id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        SimilarityRepository::remove_directional(&conn, source_id, target_id).await
    }

    async fn clear_similarities(&self, problem_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        SimilarityRepository::clear(&conn, problem_id).await
    }
}
