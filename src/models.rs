//! Core data models used throughout QueryBridge.
//!
//! These types represent the embedded chunks and retrieval results that flow
//! through the ingestion and query pipeline.

/// An embedded chunk as stored in the vectors table.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    /// Per-user namespace derived from the owner's email.
    pub namespace: String,
    /// Originating filename.
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub embedding: Vec<f32>,
    /// RFC 3339 timestamp of ingestion.
    pub created_at: String,
}

/// A scored chunk returned from similarity search.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub source: String,
    pub chunk_index: i64,
}
