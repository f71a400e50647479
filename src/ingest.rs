//! Batch file ingestion.
//!
//! Coordinates the full flow per file: text extraction → chunking →
//! embedding → storage, fanned out concurrently across the batch. Failures
//! are isolated per file, so one corrupt PDF never sinks the rest of an
//! upload.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::extract;
use crate::migrate;
use crate::models::VectorRecord;
use crate::namespace::derive_namespace;
use crate::store;

/// One uploaded file: its name and raw bytes.
pub struct FileInput {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Outcome of a batch ingest, returned verbatim by the HTTP API.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub successful_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
    pub total_chunks: usize,
    pub namespace: String,
}

#[derive(Debug, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

/// Ingest one file into `namespace`; returns the number of chunks stored.
///
/// A file that extracts to no chunks (whitespace-only text) succeeds with
/// zero chunks and writes nothing.
pub async fn ingest_file(
    config: &Config,
    pool: &SqlitePool,
    namespace: &str,
    file: FileInput,
) -> Result<usize> {
    let FileInput { filename, bytes } = file;

    // PDF parsing can panic on malformed input; spawn_blocking contains it
    // as a JoinError instead of taking the task down.
    let extract_name = filename.clone();
    let text =
        tokio::task::spawn_blocking(move || extract::extract_text(&extract_name, &bytes))
            .await
            .map_err(|e| anyhow!("Text extraction panicked: {}", e))??;

    let chunks = chunk_text(&text, config.chunking.chunk_size);
    let embeddings = embedding::embed_texts(&config.embedding, &chunks).await?;

    if embeddings.len() != chunks.len() {
        bail!(
            "Embedding count mismatch: {} chunks, {} embeddings",
            chunks.len(),
            embeddings.len()
        );
    }

    let created_at = Utc::now().to_rfc3339();
    let records: Vec<VectorRecord> = chunks
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (text, embedding))| VectorRecord {
            id: Uuid::new_v4().to_string(),
            namespace: namespace.to_string(),
            source: filename.clone(),
            chunk_index: i as i64,
            text,
            embedding,
            created_at: created_at.clone(),
        })
        .collect();

    let count = records.len();
    store::upsert_vectors(pool, &records).await?;
    Ok(count)
}

/// Ingest a batch of files for one user, concurrently.
///
/// Derives the user's namespace once and fans the files out with
/// `join_all`. Per-file errors land in `failed_files`; the batch itself
/// always produces a summary.
pub async fn ingest_batch(
    config: &Config,
    pool: &SqlitePool,
    email: &str,
    files: Vec<FileInput>,
) -> BatchSummary {
    let namespace = derive_namespace(email);

    let futures: Vec<_> = files
        .into_iter()
        .map(|file| {
            let namespace = namespace.clone();
            async move {
                let filename = file.filename.clone();
                let result = ingest_file(config, pool, &namespace, file).await;
                (filename, result)
            }
        })
        .collect();

    let mut summary = BatchSummary {
        successful_files: Vec::new(),
        failed_files: Vec::new(),
        total_chunks: 0,
        namespace,
    };

    for (filename, result) in join_all(futures).await {
        match result {
            Ok(chunks) => {
                summary.successful_files.push(filename);
                summary.total_chunks += chunks;
            }
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "ingest failed");
                summary.failed_files.push(FailedFile {
                    filename,
                    error: e.to_string(),
                });
            }
        }
    }

    summary
}

pub async fn run_ingest(config: &Config, email: &str, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        bail!("No files provided");
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        files.push(FileInput { filename, bytes });
    }

    let pool = db::connect(&config.db.path).await?;
    migrate::ensure_schema(&pool).await?;

    let summary = ingest_batch(config, &pool, email, files).await;

    println!("ingest {}", email);
    println!("  namespace: {}", summary.namespace);
    println!("  files ingested: {}", summary.successful_files.len());
    println!("  chunks written: {}", summary.total_chunks);
    for failed in &summary.failed_files {
        println!("  failed: {} ({})", failed.filename, failed.error);
    }

    pool.close().await;

    if summary.successful_files.is_empty() && !summary.failed_files.is_empty() {
        bail!("All files failed to ingest");
    }

    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ApiServerConfig, AuthServerConfig, ChunkingConfig, DbConfig, EmbeddingConfig, LlmConfig,
        RetrievalConfig, SessionsConfig,
    };
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            db: DbConfig {
                path: dir.path().join("test.sqlite"),
            },
            sessions: SessionsConfig {
                dir: dir.path().join("sessions"),
            },
            chunking: ChunkingConfig { chunk_size: 1000 },
            retrieval: RetrievalConfig { top_k: 3 },
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig {
                provider: "gemini".to_string(),
                model: String::new(),
                url: None,
                api_key: None,
                max_retries: 0,
                timeout_secs: 5,
            },
            api: ApiServerConfig {
                bind: "127.0.0.1:0".to_string(),
                auth_base_url: "http://127.0.0.1:5000".to_string(),
            },
            auth: AuthServerConfig {
                bind: "127.0.0.1:0".to_string(),
                ui_base_url: "http://127.0.0.1:8000".to_string(),
                client_id: None,
                client_secret: None,
                auth_url: "https://example.com/auth".to_string(),
                token_url: "https://example.com/token".to_string(),
                userinfo_url: "https://example.com/userinfo".to_string(),
                redirect_url: "http://127.0.0.1:5000/callback".to_string(),
            },
        }
    }

    async fn test_pool(config: &Config) -> SqlitePool {
        let pool = db::connect(&config.db.path).await.unwrap();
        migrate::ensure_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_whitespace_file_succeeds_with_zero_chunks() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = test_pool(&config).await;

        // No chunks means the (disabled) embedding provider is never hit.
        let file = FileInput {
            filename: "blank.txt".to_string(),
            bytes: b"   \n\t  \n".to_vec(),
        };
        let count = ingest_file(&config, &pool, "ns1", file).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(store::count_vectors(&pool, "ns1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_provider_fails_nonempty_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = test_pool(&config).await;

        let file = FileInput {
            filename: "notes.txt".to_string(),
            bytes: b"some actual words here".to_vec(),
        };
        let err = ingest_file(&config, &pool, "ns1", file).await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = test_pool(&config).await;

        let files = vec![
            FileInput {
                filename: "blank.txt".to_string(),
                bytes: b"  ".to_vec(),
            },
            FileInput {
                filename: "photo.png".to_string(),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            },
        ];

        let summary = ingest_batch(&config, &pool, "alice@example.com", files).await;
        assert_eq!(summary.successful_files, vec!["blank.txt"]);
        assert_eq!(summary.failed_files.len(), 1);
        assert_eq!(summary.failed_files[0].filename, "photo.png");
        assert!(summary.failed_files[0].error.contains("Unsupported file type"));
        assert_eq!(summary.total_chunks, 0);
    }

    #[tokio::test]
    async fn test_batch_namespace_derived_from_email() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = test_pool(&config).await;

        let summary = ingest_batch(&config, &pool, "alice@example.com", Vec::new()).await;
        assert_eq!(summary.namespace, derive_namespace("alice@example.com"));
        assert!(summary.namespace.starts_with("alice-example-com-"));
    }
}
