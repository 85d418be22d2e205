use std::sync::Arc;

use tracing::info;

use crate::db::SimilarityBackend;
use crate::error::Result;
use crate::models::SimilarityEdge;

/// An outgoing edge paired with the target's label for display. The label is
/// `None` when the target problem has since been deleted.
#[derive(Debug, Clone)]
pub struct ListedEdge {
    pub edge: SimilarityEdge,
    pub target_label: Option<String>,
}

/// Interactive maintenance over the similarity graph: list, directional
/// remove, and clear. Removing an edge deletes one direction only; the
/// reverse edge, if stored, stays in place.
pub struct MaintenanceService {
    db: Arc<dyn SimilarityBackend>,
}

impl MaintenanceService {
    pub fn new(db: Arc<dyn SimilarityBackend>) -> Self {
        Self { db }
    }

    pub async fn list(&self, problem_id: &str) -> Result<Vec<ListedEdge>> {
        let edges = self.db.get_outgoing(problem_id).await?;

        let mut listed = Vec::with_capacity(edges.len());
        for edge in edges {
            let target_label = self
                .db
                .get_problem(&edge.target_id)
                .await?
                .map(|problem| problem.label);
            listed.push(ListedEdge { edge, target_label });
        }

        Ok(listed)
    }

    pub async fn remove(&self, source_id: &str, target_id: &str) -> Result<bool> {
        let removed = self.db.remove_similarity(source_id, target_id).await?;
        if removed {
            info!(source_id, target_id, "Similarity edge removed");
        }
        Ok(removed)
    }

    pub async fn clear(&self, problem_id: &str) -> Result<u64> {
        let cleared = self.db.clear_similarities(problem_id).await?;
        info!(problem_id, cleared, "Outgoing similarity edges cleared");
        Ok(cleared)
    }
}
