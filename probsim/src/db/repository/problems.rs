use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::db::vector::decode_embedding;
use crate::error::Result;
use crate::models::{Problem, ProblemFeatures, SimilarityCandidate};

pub struct ProblemRepository;

impl ProblemRepository {
    pub async fn create(conn: &Connection, problem: &Problem) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO problems (
                id, label, competition_key, statement, solution, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7
            )
            "#,
            params![
                problem.id.clone(),
                problem.label.clone(),
                problem.competition_key.clone(),
                problem.statement.clone(),
                problem.solution.clone(),
                problem.created_at.to_rfc3339(),
                problem.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn add_tags(conn: &Connection, problem_id: &str, tag_ids: &[&str]) -> Result<()> {
        for tag_id in tag_ids {
            conn.execute(
                "INSERT OR IGNORE INTO problem_tags (problem_id, tag_id) VALUES (?1, ?2)",
                params![problem_id, *tag_id],
            )
            .await?;
        }

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Problem>> {
        let mut rows = conn
            .query(
                "SELECT id, label, competition_key, statement, solution,
                        statement_embedding, solution_embedding, created_at, updated_at
                 FROM problems WHERE id = ?1",
                params![id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_problem(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_tags(conn: &Connection, problem_id: &str) -> Result<HashSet<String>> {
        let mut rows = conn
            .query(
                "SELECT tag_id FROM problem_tags WHERE problem_id = ?1",
                params![problem_id],
            )
            .await?;

        let mut tags = HashSet::new();
        while let Some(row) = rows.next().await? {
            tags.insert(row.get::<String>(0)?);
        }

        Ok(tags)
    }

    async fn get_tags_for_many(
        conn: &Connection,
        problem_ids: &[String],
    ) -> Result<HashMap<String, HashSet<String>>> {
        if problem_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; problem_ids.len()].join(", ");
        let sql = format!(
            "SELECT problem_id, tag_id FROM problem_tags WHERE problem_id IN ({placeholders})"
        );
        let params: Vec<libsql::Value> = problem_ids
            .iter()
            .map(|id| libsql::Value::from(id.clone()))
            .collect();

        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let mut result: HashMap<String, HashSet<String>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let problem_id: String = row.get(0)?;
            let tag_id: String = row.get(1)?;
            result.entry(problem_id).or_default().insert(tag_id);
        }

        Ok(result)
    }

    /// Select the next `count` source problems, oldest first. Skip semantics
    /// are applied per item by the batch runner, not here.
    pub async fn pick_batch(conn: &Connection, count: u32) -> Result<Vec<String>> {
        let mut rows = conn
            .query(
                "SELECT id FROM problems ORDER BY created_at ASC, id ASC LIMIT ?1",
                params![count],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }

        Ok(ids)
    }

    pub async fn update_statement_embedding(
        conn: &Connection,
        problem_id: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let embedding_json = serde_json::to_string(embedding)?;

        conn.execute(
            "UPDATE problems SET statement_embedding = vector32(?2), updated_at = ?3 WHERE id = ?1",
            params![problem_id, embedding_json, Utc::now().to_rfc3339()],
        )
        .await?;

        Ok(())
    }

    pub async fn update_solution_embedding(
        conn: &Connection,
        problem_id: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let embedding_json = serde_json::to_string(embedding)?;

        conn.execute(
            "UPDATE problems SET solution_embedding = vector32(?2), updated_at = ?3 WHERE id = ?1",
            params![problem_id, embedding_json, Utc::now().to_rfc3339()],
        )
        .await?;

        Ok(())
    }

    /// The three-filter candidate query: competition key in the eligible set,
    /// at least one shared tag, statement cosine similarity above the
    /// threshold. Strongest vector matches win when the pool exceeds `limit`.
    pub async fn find_candidates(
        conn: &Connection,
        source: &ProblemFeatures,
        eligible_keys: &[String],
        min_similarity: f64,
        limit: u32,
    ) -> Result<Vec<SimilarityCandidate>> {
        if eligible_keys.is_empty() || source.tag_ids.is_empty() {
            return Ok(Vec::new());
        }

        let embedding_json = serde_json::to_string(&source.statement_embedding)?;
        let key_placeholders = vec!["?"; eligible_keys.len()].join(", ");
        let tag_placeholders = vec!["?"; source.tag_ids.len()].join(", ");

        let sql = format!(
            r#"
            SELECT p.id, p.label, p.competition_key, p.statement_embedding, p.solution_embedding,
                   1 - vector_distance_cos(p.statement_embedding, vector32(?)) AS score
            FROM problems p
            WHERE p.id <> ?
              AND p.statement_embedding IS NOT NULL
              AND p.competition_key IN ({key_placeholders})
              AND EXISTS (
                  SELECT 1 FROM problem_tags pt
                  WHERE pt.problem_id = p.id AND pt.tag_id IN ({tag_placeholders})
              )
              AND 1 - vector_distance_cos(p.statement_embedding, vector32(?)) > ?
            ORDER BY score DESC
            LIMIT ?
            "#
        );

        let mut params: Vec<libsql::Value> = Vec::new();
        params.push(libsql::Value::from(embedding_json.clone()));
        params.push(libsql::Value::from(source.id.clone()));
        for key in eligible_keys {
            params.push(libsql::Value::from(key.clone()));
        }
        for tag_id in &source.tag_ids {
            params.push(libsql::Value::from(tag_id.clone()));
        }
        params.push(libsql::Value::from(embedding_json));
        params.push(libsql::Value::from(min_similarity));
        params.push(libsql::Value::from(limit as i64));

        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;

        struct CandidateRow {
            id: String,
            label: String,
            competition_key: String,
            statement_blob: Vec<u8>,
            solution_blob: Option<Vec<u8>>,
        }

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await? {
            hits.push(CandidateRow {
                id: row.get(0)?,
                label: row.get(1)?,
                competition_key: row.get(2)?,
                statement_blob: row.get::<Vec<u8>>(3)?,
                solution_blob: row.get::<Option<Vec<u8>>>(4)?,
            });
        }

        let candidate_ids: Vec<String> = hits.iter().map(|hit| hit.id.clone()).collect();
        let mut tags_by_id = Self::get_tags_for_many(conn, &candidate_ids).await?;

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            let statement_embedding = decode_embedding(&hit.statement_blob)?;
            let solution_embedding = hit
                .solution_blob
                .as_deref()
                .map(decode_embedding)
                .transpose()?;

            candidates.push(SimilarityCandidate {
                label: hit.label,
                features: ProblemFeatures {
                    tag_ids: tags_by_id.remove(&hit.id).unwrap_or_default(),
                    id: hit.id,
                    competition_key: hit.competition_key,
                    statement_embedding,
                    solution_embedding,
                },
            });
        }

        Ok(candidates)
    }

    fn row_to_problem(row: &libsql::Row) -> Result<Problem> {
        Ok(Problem {
            id: row.get(0)?,
            label: row.get(1)?,
            competition_key: row.get(2)?,
            statement: row.get(3)?,
            solution: row.get(4)?,
            statement_embedding: row
                .get::<Option<Vec<u8>>>(5)?
                .as_deref()
                .map(decode_embedding)
                .transpose()?,
            solution_embedding: row
                .get::<Option<Vec<u8>>>(6)?
                .as_deref()
                .map(decode_embedding)
                .transpose()?,
            created_at: DateTime::parse_from_rfc3339(&row.get::<String>(7)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(8)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> Connection {
        let conn = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE problems (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                competition_key TEXT NOT NULL,
                statement TEXT NOT NULL,
                solution TEXT,
                statement_embedding F32_BLOB(4),
                solution_embedding F32_BLOB(4),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE problem_tags (
                problem_id TEXT NOT NULL,
                tag_id TEXT NOT NULL,
                PRIMARY KEY (problem_id, tag_id)
            );
            "#,
        )
        .await
        .unwrap();

        conn
    }

    fn test_problem(id: &str, competition_key: &str) -> Problem {
        Problem::new(
            id.to_string(),
            format!("Problem {id}"),
            competition_key.to_string(),
            format!("Statement of {id}"),
        )
    }

    async fn seed(
        conn: &Connection,
        id: &str,
        competition_key: &str,
        tags: &[&str],
        embedding: &[f32],
    ) {
        ProblemRepository::create(conn, &test_problem(id, competition_key))
            .await
            .unwrap();
        ProblemRepository::add_tags(conn, id, tags).await.unwrap();
        ProblemRepository::update_statement_embedding(conn, id, embedding)
            .await
            .unwrap();
    }

    fn source_features(id: &str, competition_key: &str, tags: &[&str]) -> ProblemFeatures {
        ProblemFeatures {
            id: id.to_string(),
            tag_ids: tags.iter().map(|t| t.to_string()).collect(),
            competition_key: competition_key.to_string(),
            statement_embedding: vec![1.0, 0.0, 0.0, 0.0],
            solution_embedding: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let conn = setup_test_db().await;

        let mut problem = test_problem("p1", "mo-a-krajske");
        problem.solution = Some("Solution text".to_string());
        ProblemRepository::create(&conn, &problem).await.unwrap();

        let fetched = ProblemRepository::get_by_id(&conn, "p1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.label, "Problem p1");
        assert_eq!(fetched.competition_key, "mo-a-krajske");
        assert_eq!(fetched.solution.as_deref(), Some("Solution text"));
        assert!(fetched.statement_embedding.is_none());
        assert!(fetched.solution_embedding.is_none());
    }

    #[tokio::test]
    async fn test_embeddings_round_trip_through_vector_column() {
        let conn = setup_test_db().await;
        ProblemRepository::create(&conn, &test_problem("p1", "imo"))
            .await
            .unwrap();

        ProblemRepository::update_statement_embedding(&conn, "p1", &[1.0, 0.5, 0.0, -0.5])
            .await
            .unwrap();
        ProblemRepository::update_solution_embedding(&conn, "p1", &[0.0, 1.0, 0.0, 0.0])
            .await
            .unwrap();

        let fetched = ProblemRepository::get_by_id(&conn, "p1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            fetched.statement_embedding,
            Some(vec![1.0, 0.5, 0.0, -0.5])
        );
        assert_eq!(fetched.solution_embedding, Some(vec![0.0, 1.0, 0.0, 0.0]));
    }

    #[tokio::test]
    async fn test_get_tags() {
        let conn = setup_test_db().await;
        ProblemRepository::create(&conn, &test_problem("p1", "imo"))
            .await
            .unwrap();
        ProblemRepository::add_tags(&conn, "p1", &["number-theory", "induction"])
            .await
            .unwrap();

        let tags = ProblemRepository::get_tags(&conn, "p1").await.unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("number-theory"));
        assert!(tags.contains("induction"));
    }

    #[tokio::test]
    async fn test_pick_batch_oldest_first() {
        let conn = setup_test_db().await;

        let mut p1 = test_problem("p1", "imo");
        p1.created_at = Utc::now() - chrono::Duration::hours(2);
        let mut p2 = test_problem("p2", "imo");
        p2.created_at = Utc::now() - chrono::Duration::hours(1);
        ProblemRepository::create(&conn, &p2).await.unwrap();
        ProblemRepository::create(&conn, &p1).await.unwrap();

        let ids = ProblemRepository::pick_batch(&conn, 10).await.unwrap();
        assert_eq!(ids, vec!["p1".to_string(), "p2".to_string()]);

        let ids = ProblemRepository::pick_batch(&conn, 1).await.unwrap();
        assert_eq!(ids, vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn test_find_candidates_applies_all_filters() {
        let conn = setup_test_db().await;

        // Shares tag, eligible key, strong vector match
        seed(&conn, "match", "mo-a-krajske", &["algebra"], &[1.0, 0.0, 0.0, 0.0]).await;
        // Wrong competition key
        seed(&conn, "far-cluster", "mo-z5", &["algebra"], &[1.0, 0.0, 0.0, 0.0]).await;
        // No shared tag
        seed(&conn, "no-tag", "mo-a-krajske", &["geometry"], &[1.0, 0.0, 0.0, 0.0]).await;
        // Orthogonal embedding
        seed(&conn, "weak", "mo-a-krajske", &["algebra"], &[0.0, 1.0, 0.0, 0.0]).await;

        let source = source_features("source", "mo-a-krajske", &["algebra"]);
        let eligible = vec!["mo-a-krajske".to_string(), "mo-a-celostatni".to_string()];

        let candidates =
            ProblemRepository::find_candidates(&conn, &source, &eligible, 0.5, 10)
                .await
                .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].features.id, "match");
        assert_eq!(candidates[0].label, "Problem match");
        assert!(candidates[0].features.tag_ids.contains("algebra"));
        assert_eq!(candidates[0].features.statement_embedding, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_find_candidates_excludes_source_itself() {
        let conn = setup_test_db().await;
        seed(&conn, "source", "imo", &["algebra"], &[1.0, 0.0, 0.0, 0.0]).await;

        let source = source_features("source", "imo", &["algebra"]);
        let candidates = ProblemRepository::find_candidates(
            &conn,
            &source,
            &["imo".to_string()],
            0.0,
            10,
        )
        .await
        .unwrap();

        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_find_candidates_caps_pool_by_strongest_match() {
        let conn = setup_test_db().await;

        seed(&conn, "strong", "imo", &["algebra"], &[1.0, 0.0, 0.0, 0.0]).await;
        seed(&conn, "medium", "imo", &["algebra"], &[0.9, 0.435, 0.0, 0.0]).await;
        seed(&conn, "weaker", "imo", &["algebra"], &[0.8, 0.6, 0.0, 0.0]).await;

        let source = source_features("source", "imo", &["algebra"]);
        let candidates = ProblemRepository::find_candidates(
            &conn,
            &source,
            &["imo".to_string()],
            0.5,
            2,
        )
        .await
        .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].features.id, "strong");
        assert_eq!(candidates[1].features.id, "medium");
    }

    #[tokio::test]
    async fn test_find_candidates_empty_inputs_short_circuit() {
        let conn = setup_test_db().await;
        seed(&conn, "other", "imo", &["algebra"], &[1.0, 0.0, 0.0, 0.0]).await;

        let source = source_features("source", "imo", &["algebra"]);
        let no_keys =
            ProblemRepository::find_candidates(&conn, &source, &[], 0.0, 10)
                .await
                .unwrap();
        assert!(no_keys.is_empty());

        let untagged = source_features("source", "imo", &[]);
        let no_tags = ProblemRepository::find_candidates(
            &conn,
            &untagged,
            &["imo".to_string()],
            0.0,
            10,
        )
        .await
        .unwrap();
        assert!(no_tags.is_empty());
    }
}
