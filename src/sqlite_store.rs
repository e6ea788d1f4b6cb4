//! SQLite-backed [`VectorStore`].
//!
//! Units live in `text_units`, their embeddings in `unit_vectors` as
//! little-endian f32 BLOBs. Search is brute-force cosine similarity over the
//! stored vectors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use ragbot_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use ragbot_core::models::{ScoredUnit, SourceKind, TextUnit};
use ragbot_core::store::{rank, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert_unit(&self, unit: &TextUnit, vector: &[f32], model: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM text_units WHERE source_id = ?")
                .bind(&unit.source_id)
                .fetch_optional(&mut *tx)
                .await?;
        let unit_id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        sqlx::query(
            r#"
            INSERT INTO text_units (id, source_kind, source_id, content, content_hash, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                source_kind = excluded.source_kind,
                content = excluded.content,
                content_hash = excluded.content_hash,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&unit_id)
        .bind(unit.source_kind.as_str())
        .bind(&unit.source_id)
        .bind(&unit.content)
        .bind(content_hash(&unit.content))
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO unit_vectors (unit_id, model, dims, embedding)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(unit_id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                embedding = excluded.embedding
            "#,
        )
        .bind(&unit_id)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<ScoredUnit>> {
        let rows = sqlx::query(
            r#"
            SELECT u.source_kind, u.source_id, u.content, v.embedding
            FROM unit_vectors v
            JOIN text_units u ON u.id = v.unit_id
            WHERE (?1 IS NULL OR u.source_id = ?1)
            "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind: String = row.get("source_kind");
            let source_kind = kind
                .parse::<SourceKind>()
                .with_context(|| format!("corrupt source_kind in text_units: {}", kind))?;
            let blob: Vec<u8> = row.get("embedding");
            candidates.push(ScoredUnit {
                unit: TextUnit {
                    content: row.get("content"),
                    source_kind,
                    source_id: row.get("source_id"),
                },
                score: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
            });
        }

        Ok(rank(candidates, limit))
    }

    async fn source_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT source_id FROM text_units ORDER BY source_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM text_units")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("t.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    #[tokio::test]
    async fn upsert_and_search() {
        let (_tmp, store) = store().await;
        store
            .upsert_unit(
                &TextUnit::new("grades", SourceKind::Csv, "sample.csv"),
                &[0.0, 1.0],
                "m",
            )
            .await
            .unwrap();
        store
            .upsert_unit(
                &TextUnit::new("report", SourceKind::Pdf, "sample.pdf"),
                &[1.0, 0.0],
                "m",
            )
            .await
            .unwrap();

        let hits = store.search(&[0.9, 0.1], 3, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].unit.source_kind, SourceKind::Pdf);
        assert_eq!(hits[0].unit.content, "report");

        let scoped = store.search(&[0.9, 0.1], 3, Some("sample.csv")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].unit.source_id, "sample.csv");
    }

    #[tokio::test]
    async fn reindexing_replaces_unit() {
        let (_tmp, store) = store().await;
        let unit = TextUnit::new("v1", SourceKind::Docx, "resume.docx");
        store.upsert_unit(&unit, &[1.0, 0.0], "m").await.unwrap();
        let unit = TextUnit::new("v2", SourceKind::Docx, "resume.docx");
        store.upsert_unit(&unit, &[0.0, 1.0], "m").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&[0.0, 1.0], 3, None).await.unwrap();
        assert_eq!(hits[0].unit.content, "v2");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(store.source_ids().await.unwrap(), vec!["resume.docx"]);
    }
}
