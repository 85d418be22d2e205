use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Problems table with vector embeddings
        CREATE TABLE IF NOT EXISTS problems (
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            competition_key TEXT NOT NULL,
            statement TEXT NOT NULL,
            solution TEXT,
            statement_embedding F32_BLOB(768),
            solution_embedding F32_BLOB(768),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_problems_competition_key ON problems(competition_key);
        CREATE INDEX IF NOT EXISTS idx_problems_created_at ON problems(created_at);

        -- Tag membership produced by the upstream tagging workflow
        CREATE TABLE IF NOT EXISTS problem_tags (
            problem_id TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            PRIMARY KEY (problem_id, tag_id),
            FOREIGN KEY (problem_id) REFERENCES problems(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_problem_tags_tag_id ON problem_tags(tag_id);

        -- Directed similarity edges, one row per direction
        CREATE TABLE IF NOT EXISTS similarities (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            score REAL NOT NULL,
            statement_score REAL NOT NULL,
            solution_score REAL,
            tag_score REAL NOT NULL,
            competition_score REAL NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (source_id, target_id),
            CHECK (source_id <> target_id),
            FOREIGN KEY (source_id) REFERENCES problems(id) ON DELETE CASCADE,
            FOREIGN KEY (target_id) REFERENCES problems(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_similarities_source_id ON similarities(source_id);
        CREATE INDEX IF NOT EXISTS idx_similarities_target_id ON similarities(target_id);
        "#,
    )
    .await?;

    create_vector_indexes(conn).await?;

    Ok(())
}

async fn create_vector_indexes(conn: &Connection) -> Result<()> {
    let index_exists: bool = conn
        .query(
            "SELECT 1 FROM sqlite_master WHERE type='index' AND name='problems_statement_embedding_idx'",
            (),
        )
        .await?
        .next()
        .await?
        .is_some();

    if !index_exists {
        if let Err(e) = conn
            .execute(
                "CREATE INDEX IF NOT EXISTS problems_statement_embedding_idx ON problems(libsql_vector_idx(statement_embedding))",
                (),
            )
            .await
        {
            tracing::warn!("Vector index creation failed for problems (may already exist): {e}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();

        init_schema(&conn).await.unwrap();
        init_schema(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
                (),
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            tables.push(row.get::<String>(0).unwrap());
        }

        assert!(tables.contains(&"problems".to_string()));
        assert!(tables.contains(&"problem_tags".to_string()));
        assert!(tables.contains(&"similarities".to_string()));
    }

    #[tokio::test]
    async fn test_similarities_reject_self_pairs() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        init_schema(&conn).await.unwrap();

        let result = conn
            .execute(
                "INSERT INTO similarities (id, source_id, target_id, score, statement_score, tag_score, competition_score, created_at)
                 VALUES ('e1', 'p1', 'p1', 0.9, 0.9, 0.5, 1.0, '2024-01-01T00:00:00Z')",
                (),
            )
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_similarities_enforce_unique_pair() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        init_schema(&conn).await.unwrap();

        conn.execute(
            "INSERT INTO similarities (id, source_id, target_id, score, statement_score, tag_score, competition_score, created_at)
             VALUES ('e1', 'p1', 'p2', 0.9, 0.9, 0.5, 1.0, '2024-01-01T00:00:00Z')",
            (),
        )
        .await
        .unwrap();

        let duplicate = conn
            .execute(
                "INSERT INTO similarities (id, source_id, target_id, score, statement_score, tag_score, competition_score, created_at)
                 VALUES ('e2', 'p1', 'p2', 0.8, 0.8, 0.4, 1.0, '2024-01-01T00:00:00Z')",
                (),
            )
            .await;

        assert!(duplicate.is_err());
    }
}
