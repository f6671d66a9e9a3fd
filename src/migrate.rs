use anyhow::Result;
use sqlx::SqlitePool;

/// Create the vector index schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per (namespace, chunk id); inserts never overwrite
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            namespace TEXT NOT NULL,
            id TEXT NOT NULL,
            chunk_type TEXT NOT NULL,
            path TEXT NOT NULL,
            language TEXT,
            name TEXT,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (namespace, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_type ON vectors(namespace, chunk_type)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_language ON vectors(language)")
        .execute(pool)
        .await?;

    Ok(())
}
