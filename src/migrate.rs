use anyhow::Result;
use sqlx::sqlite::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the vectors table and its indexes if they do not exist.
///
/// Called lazily by every entry point that touches the store, so a fresh
/// database works without a separate setup step. `qb init` runs it
/// eagerly for deployments that want the file in place up front.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            id TEXT PRIMARY KEY,
            namespace TEXT NOT NULL,
            source TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_namespace ON vectors(namespace)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    ensure_schema(&pool).await?;
    pool.close().await;

    println!("initialized: {}", config.db.path.display());
    Ok(())
}
