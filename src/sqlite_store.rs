//! SQLite-backed [`VectorStore`] implementation.
//!
//! Embeddings are stored as little-endian `f32` BLOBs in the `vectors`
//! table. Queries select the rows passing the filter in SQL and rank them
//! with a cosine scan in Rust.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use repo_intake_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use repo_intake_core::models::ChunkType;
use repo_intake_core::store::{rank_matches, VectorFilter, VectorMatch, VectorRecord, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<VectorRecord> {
    let chunk_type: String = row.get("chunk_type");
    let blob: Vec<u8> = row.get("embedding");
    Ok(VectorRecord {
        id: row.get("id"),
        namespace: row.get("namespace"),
        embedding: blob_to_vec(&blob),
        chunk_type: chunk_type.parse::<ChunkType>().map_err(|e| anyhow!(e))?,
        path: row.get("path"),
        language: row.get("language"),
        name: row.get("name"),
        start_line: row.get::<i64, _>("start_line") as usize,
        end_line: row.get::<i64, _>("end_line") as usize,
        content: row.get("content"),
        content_hash: row.get("content_hash"),
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(&self, records: &[VectorRecord]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO vectors (namespace, id, chunk_type, path, language, name,
                                               start_line, end_line, content, content_hash,
                                               dims, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.namespace)
            .bind(&record.id)
            .bind(record.chunk_type.as_str())
            .bind(&record.path)
            .bind(&record.language)
            .bind(&record.name)
            .bind(record.start_line as i64)
            .bind(record.end_line as i64)
            .bind(&record.content)
            .bind(&record.content_hash)
            .bind(record.embedding.len() as i64)
            .bind(vec_to_blob(&record.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn query(&self, vector: &[f32], filter: &VectorFilter, limit: usize) -> Result<Vec<VectorMatch>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT namespace, id, chunk_type, path, language, name, start_line, end_line, \
             content, content_hash, embedding FROM vectors WHERE dims = ",
        );
        qb.push_bind(vector.len() as i64);
        if let Some(ns) = &filter.namespace {
            qb.push(" AND namespace = ").push_bind(ns.clone());
        }
        if let Some(t) = filter.chunk_type {
            qb.push(" AND chunk_type = ").push_bind(t.as_str());
        }
        if let Some(lang) = &filter.language {
            qb.push(" AND language = ").push_bind(lang.clone());
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = row_to_record(row)?;
            matches.push(VectorMatch {
                score: cosine_similarity(vector, &record.embedding),
                record,
            });
        }
        rank_matches(&mut matches);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM vectors WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn delete_ids(&self, namespace: &str, ids: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0usize;
        for id in ids {
            let result = sqlx::query("DELETE FROM vectors WHERE namespace = ? AND id = ?")
                .bind(namespace)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn count(&self, namespace: Option<&str>) -> Result<usize> {
        let count: i64 = match namespace {
            Some(ns) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE namespace = ?")
                    .bind(ns)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::{db, migrate};

    async fn store(dir: &tempfile::TempDir) -> SqliteVectorStore {
        let config = IndexConfig {
            db_path: dir.path().join("vectors.sqlite"),
            ..Default::default()
        };
        let pool = db::connect(&config).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteVectorStore::new(pool)
    }

    fn record(ns: &str, id: &str, embedding: Vec<f32>, chunk_type: ChunkType) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            namespace: ns.to_string(),
            embedding,
            chunk_type,
            path: "src/lib.rs".to_string(),
            language: Some("rust".to_string()),
            name: Some(id.to_string()),
            start_line: 3,
            end_line: 9,
            content: format!("fn {}() {{}}", id),
            content_hash: "h".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_once_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let records = vec![
            record("acme/app", "a", vec![1.0, 0.0], ChunkType::Function),
            record("acme/app", "b", vec![0.0, 1.0], ChunkType::Class),
            record("other/repo", "a", vec![1.0, 0.0], ChunkType::Function),
        ];
        assert_eq!(store.insert(&records).await.unwrap(), 3);
        assert_eq!(store.insert(&records[..1]).await.unwrap(), 0);
        assert_eq!(store.count(Some("acme/app")).await.unwrap(), 2);
        assert_eq!(store.count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_query_filters_and_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store
            .insert(&[
                record("acme/app", "a", vec![1.0, 0.0], ChunkType::Function),
                record("acme/app", "b", vec![0.7, 0.7], ChunkType::Function),
                record("acme/app", "c", vec![1.0, 0.1], ChunkType::Class),
            ])
            .await
            .unwrap();

        let filter = VectorFilter {
            namespace: Some("acme/app".into()),
            chunk_type: Some(ChunkType::Function),
            language: None,
        };
        let matches = store.query(&[1.0, 0.0], &filter, 10).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.record.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
        assert_eq!(matches[0].record.start_line, 3);
        assert_eq!(matches[0].record.chunk_type, ChunkType::Function);
    }

    #[tokio::test]
    async fn test_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store
            .insert(&[
                record("acme/app", "a", vec![1.0], ChunkType::Function),
                record("acme/app", "b", vec![1.0], ChunkType::Function),
                record("other/repo", "a", vec![1.0], ChunkType::Function),
            ])
            .await
            .unwrap();
        let deleted = store
            .delete_ids("acme/app", &["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.delete_namespace("acme/app").await.unwrap(), 1);
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store(&dir).await;
            store
                .insert(&[record("acme/app", "a", vec![1.0, 0.0], ChunkType::Function)])
                .await
                .unwrap();
            store.pool().close().await;
        }
        let store = store(&dir).await;
        assert_eq!(store.count(Some("acme/app")).await.unwrap(), 1);
    }
}
