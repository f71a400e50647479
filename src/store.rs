//! SQLite-backed vector store.
//!
//! Embedded chunks live in a single `vectors` table partitioned by the
//! per-user namespace column. Similarity search is brute-force: fetch the
//! namespace's rows, score them with cosine similarity in Rust, sort, and
//! truncate. At demo scale a namespace holds at most a few thousand chunks,
//! so there is no ANN index.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{VectorMatch, VectorRecord};

/// Insert or replace a batch of vector records in one transaction.
pub async fn upsert_vectors(pool: &SqlitePool, records: &[VectorRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO vectors (id, namespace, source, chunk_index, text, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.namespace)
        .bind(&record.source)
        .bind(record.chunk_index)
        .bind(&record.text)
        .bind(vec_to_blob(&record.embedding))
        .bind(&record.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Return the `k` chunks in `namespace` most similar to `query_vec`.
///
/// Rows from other namespaces are never considered. Ties break on id so
/// the ordering is deterministic.
pub async fn top_k(
    pool: &SqlitePool,
    namespace: &str,
    query_vec: &[f32],
    k: i64,
) -> Result<Vec<VectorMatch>> {
    let rows = sqlx::query(
        "SELECT id, source, chunk_index, text, embedding FROM vectors WHERE namespace = ?",
    )
    .bind(namespace)
    .fetch_all(pool)
    .await?;

    let mut matches: Vec<VectorMatch> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let embedding = blob_to_vec(&blob);
            VectorMatch {
                id: row.get("id"),
                score: cosine_similarity(query_vec, &embedding),
                text: row.get("text"),
                source: row.get("source"),
                chunk_index: row.get("chunk_index"),
            }
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    matches.truncate(k.max(0) as usize);
    Ok(matches)
}

/// Number of stored vectors in `namespace`.
pub async fn count_vectors(pool: &SqlitePool, namespace: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE namespace = ?")
        .bind(namespace)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete every vector in `namespace`; returns the number of rows removed.
pub async fn delete_namespace(pool: &SqlitePool, namespace: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM vectors WHERE namespace = ?")
        .bind(namespace)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
