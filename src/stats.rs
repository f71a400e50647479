//! Namespace statistics and administration.
//!
//! Backs `qb stats` / `qb delete` and the corresponding HTTP endpoints:
//! how many chunks a user's namespace holds, at what dimensionality, and
//! wiping the namespace outright.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::namespace::derive_namespace;
use crate::store;

/// Summary of one user's namespace.
#[derive(Debug, Serialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub total_vectors: i64,
    /// Dimensionality of the stored embeddings; `0` for an empty namespace.
    pub dimension: usize,
}

pub async fn namespace_stats(pool: &SqlitePool, namespace: &str) -> Result<NamespaceStats> {
    let total_vectors = store::count_vectors(pool, namespace).await?;

    // Measure dimension from a stored row rather than trusting config;
    // the namespace may predate a provider change.
    let blob: Option<Vec<u8>> =
        sqlx::query_scalar("SELECT embedding FROM vectors WHERE namespace = ? LIMIT 1")
            .bind(namespace)
            .fetch_optional(pool)
            .await?;

    let dimension = blob.map(|b| b.len() / 4).unwrap_or(0);

    Ok(NamespaceStats {
        namespace: namespace.to_string(),
        total_vectors,
        dimension,
    })
}

pub async fn run_stats(config: &Config, email: &str) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::ensure_schema(&pool).await?;

    let namespace = derive_namespace(email);
    let stats = namespace_stats(&pool, &namespace).await?;

    println!("stats {}", email);
    println!("  namespace: {}", stats.namespace);
    println!("  vectors:   {}", stats.total_vectors);
    println!("  dimension: {}", stats.dimension);

    // Per-file breakdown
    let source_rows = sqlx::query(
        r#"
        SELECT source, COUNT(*) AS chunk_count
        FROM vectors
        WHERE namespace = ?
        GROUP BY source
        ORDER BY chunk_count DESC, source ASC
        "#,
    )
    .bind(&namespace)
    .fetch_all(&pool)
    .await?;

    if !source_rows.is_empty() {
        println!();
        println!("  {:<40} {:>8}", "SOURCE", "CHUNKS");
        for row in &source_rows {
            let source: String = row.get("source");
            let chunk_count: i64 = row.get("chunk_count");
            println!("  {:<40} {:>8}", source, chunk_count);
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_delete(config: &Config, email: &str) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::ensure_schema(&pool).await?;

    let namespace = derive_namespace(email);
    let removed = store::delete_namespace(&pool, &namespace).await?;

    println!("deleted namespace {}", namespace);
    println!("  vectors removed: {}", removed);

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VectorRecord;
    use tempfile::TempDir;

    async fn test_pool(dir: &TempDir) -> SqlitePool {
        let pool = db::connect(&dir.path().join("test.sqlite")).await.unwrap();
        migrate::ensure_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_stats_empty_namespace() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;

        let stats = namespace_stats(&pool, "nobody").await.unwrap();
        assert_eq!(stats.total_vectors, 0);
        assert_eq!(stats.dimension, 0);
        assert_eq!(stats.namespace, "nobody");
    }

    #[tokio::test]
    async fn test_stats_counts_and_measures_dimension() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;

        let records: Vec<VectorRecord> = (0..3)
            .map(|i| VectorRecord {
                id: format!("id-{}", i),
                namespace: "ns1".to_string(),
                source: "doc.txt".to_string(),
                chunk_index: i,
                text: format!("chunk {}", i),
                embedding: vec![0.1, 0.2, 0.3, 0.4],
                created_at: "2024-01-01T00:00:00Z".to_string(),
            })
            .collect();
        store::upsert_vectors(&pool, &records).await.unwrap();

        let stats = namespace_stats(&pool, "ns1").await.unwrap();
        assert_eq!(stats.total_vectors, 3);
        assert_eq!(stats.dimension, 4);
    }
}
