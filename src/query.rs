//! RAG query pipeline.
//!
//! Embeds the question, retrieves the user's nearest chunks, and generates
//! an answer grounded in them. When a session id accompanies the query, the
//! exchange is appended to the session transcript: the user turn before
//! generation, the assistant turn after, so a generation failure still
//! leaves the question on record.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::llm;
use crate::migrate;
use crate::models::VectorMatch;
use crate::namespace::derive_namespace;
use crate::session::{Message, SessionRecord, SessionStore};
use crate::store;

/// Result of answering a query.
#[derive(Debug, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    /// Newline-joined text of the retrieved chunks.
    pub context: String,
    /// Number of chunks retrieved.
    pub matches: usize,
}

fn build_context(matches: &[VectorMatch]) -> String {
    matches
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer `query` against the namespace derived from `email`.
pub async fn answer_query(
    config: &Config,
    pool: &SqlitePool,
    email: &str,
    query: &str,
) -> Result<QueryOutcome> {
    let namespace = derive_namespace(email);

    let query_vec = embedding::embed_query(&config.embedding, query).await?;
    let matches = store::top_k(pool, &namespace, &query_vec, config.retrieval.top_k).await?;

    let context = build_context(&matches);
    let answer = llm::generate_answer(&config.llm, &context, query).await?;

    Ok(QueryOutcome {
        answer,
        context,
        matches: matches.len(),
    })
}

/// Append the user turn to an existing session transcript.
///
/// Returns the updated record for the follow-up assistant turn, or `None`
/// when no transcript exists for the id. Write failures are logged and
/// swallowed; a broken transcript must not block the answer.
fn append_user_turn(
    sessions: &SessionStore,
    session_id: &str,
    query: &str,
) -> Option<SessionRecord> {
    let mut record = match sessions.load(session_id) {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load session transcript");
            return None;
        }
    };

    record.messages.push(Message {
        role: "user".to_string(),
        content: query.to_string(),
    });

    if let Err(e) = sessions.save(&record) {
        tracing::warn!(error = %e, "failed to save session transcript");
    }

    Some(record)
}

fn append_assistant_turn(sessions: &SessionStore, mut record: SessionRecord, answer: &str) {
    record.messages.push(Message {
        role: "assistant".to_string(),
        content: answer.to_string(),
    });

    if let Err(e) = sessions.save(&record) {
        tracing::warn!(error = %e, "failed to save session transcript");
    }
}

/// Answer a query, recording the exchange in a session transcript when a
/// session id is supplied and a transcript exists for it.
pub async fn answer_query_with_session(
    config: &Config,
    pool: &SqlitePool,
    sessions: &SessionStore,
    email: &str,
    query: &str,
    session_id: Option<&str>,
) -> Result<QueryOutcome> {
    let record = session_id.and_then(|sid| append_user_turn(sessions, sid, query));

    let outcome = answer_query(config, pool, email, query).await?;

    if let Some(record) = record {
        append_assistant_turn(sessions, record, &outcome.answer);
    }

    Ok(outcome)
}

pub async fn run_query(
    config: &Config,
    email: &str,
    query: &str,
    session: Option<&str>,
) -> Result<()> {
    config.require_llm()?;

    let pool = db::connect(&config.db.path).await?;
    migrate::ensure_schema(&pool).await?;
    let sessions = SessionStore::new(&config.sessions.dir)?;

    let outcome =
        answer_query_with_session(config, &pool, &sessions, email, query, session).await?;

    println!("query {}", email);
    println!("  namespace: {}", derive_namespace(email));
    println!("  matches: {}", outcome.matches);
    println!();
    println!("{}", outcome.answer);

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_store(dir: &TempDir, session_id: &str) -> SessionStore {
        let store = SessionStore::new(dir.path()).unwrap();
        store
            .save(&SessionRecord {
                email: "alice@example.com".to_string(),
                session_id: session_id.to_string(),
                authenticated: true,
                user_id: "google-123".to_string(),
                messages: Vec::new(),
            })
            .unwrap();
        store
    }

    #[test]
    fn test_build_context_joins_with_newlines() {
        let matches = vec![
            VectorMatch {
                id: "a".to_string(),
                score: 0.9,
                text: "first chunk".to_string(),
                source: "doc.txt".to_string(),
                chunk_index: 0,
            },
            VectorMatch {
                id: "b".to_string(),
                score: 0.5,
                text: "second chunk".to_string(),
                source: "doc.txt".to_string(),
                chunk_index: 1,
            },
        ];
        assert_eq!(build_context(&matches), "first chunk\nsecond chunk");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_append_user_turn_persists() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, "sid1");

        let record = append_user_turn(&store, "sid1", "what is this?").unwrap();
        assert_eq!(record.messages.len(), 1);

        let loaded = store.load("sid1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].role, "user");
        assert_eq!(loaded.messages[0].content, "what is this?");
    }

    #[test]
    fn test_append_user_turn_unknown_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(append_user_turn(&store, "missing", "q").is_none());
    }

    #[test]
    fn test_append_assistant_turn_keeps_order() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, "sid1");

        let record = append_user_turn(&store, "sid1", "question").unwrap();
        append_assistant_turn(&store, record, "answer");

        let loaded = store.load("sid1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].role, "user");
        assert_eq!(loaded.messages[1].role, "assistant");
        assert_eq!(loaded.messages[1].content, "answer");
    }
}
