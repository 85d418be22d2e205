use chrono::{DateTime, Utc};
use libsql::{params, Connection};
use nanoid::nanoid;

use crate::error::Result;
use crate::models::{SimilarityComponents, SimilarityEdge, SimilarityResult};

pub struct SimilarityRepository;

impl SimilarityRepository {
    /// Replace the source problem's entire outgoing edge set with `results`.
    ///
    /// Delete-then-insert keeps the operation idempotent: re-running with the
    /// same results yields the same stored rows (modulo row ids).
    pub async fn replace(
        conn: &Connection,
        source_id: &str,
        results: &[SimilarityResult],
    ) -> Result<u64> {
        conn.execute(
            "DELETE FROM similarities WHERE source_id = ?1",
            params![source_id],
        )
        .await?;

        for result in results {
            conn.execute(
                r#"
                INSERT INTO similarities (
                    id, source_id, target_id, score,
                    statement_score, solution_score, tag_score, competition_score,
                    created_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
                )
                "#,
                params![
                    nanoid!(),
                    source_id,
                    result.target_id.clone(),
                    result.score,
                    result.components.statement,
                    result.components.solution,
                    result.components.tags,
                    result.components.competition,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await?;
        }

        Ok(results.len() as u64)
    }

    pub async fn get_outgoing(conn: &Connection, source_id: &str) -> Result<Vec<SimilarityEdge>> {
        let mut rows = conn
            .query(
                r#"
                SELECT id, source_id, target_id, score,
                       statement_score, solution_score, tag_score, competition_score,
                       created_at
                FROM similarities
                WHERE source_id = ?1
                ORDER BY score DESC
                "#,
                params![source_id],
            )
            .await?;

        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            edges.push(Self::row_to_edge(&row)?);
        }

        Ok(edges)
    }

    pub async fn has_any(conn: &Connection, source_id: &str) -> Result<bool> {
        let mut rows = conn
            .query(
                "SELECT 1 FROM similarities WHERE source_id = ?1 LIMIT 1",
                params![source_id],
            )
            .await?;

        Ok(rows.next().await?.is_some())
    }

    /// Delete exactly one directed edge. The reverse edge, if any, is left
    /// alone: each direction is owned by its own source-side run.
    pub async fn remove_directional(
        conn: &Connection,
        source_id: &str,
        target_id: &str,
    ) -> Result<bool> {
        let affected = conn
            .execute(
                "DELETE FROM similarities WHERE source_id = ?1 AND target_id = ?2",
                params![source_id, target_id],
            )
            .await?;

        Ok(affected > 0)
    }

    pub async fn clear(conn: &Connection, source_id: &str) -> Result<u64> {
        let affected = conn
            .execute(
                "DELETE FROM similarities WHERE source_id = ?1",
                params![source_id],
            )
            .await?;

        Ok(affected)
    }

    fn row_to_edge(row: &libsql::Row) -> Result<SimilarityEdge> {
        Ok(SimilarityEdge {
            id: row.get(0)?,
            source_id: row.get(1)?,
            target_id: row.get(2)?,
            score: row.get(3)?,
            components: SimilarityComponents {
                statement: row.get(4)?,
                solution: row.get(5)?,
                tags: row.get(6)?,
                competition: row.get(7)?,
            },
            created_at: DateTime::parse_from_rfc3339(&row.get::<String>(8)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
