//! Session persistence and login tracking.
//!
//! Two layers back the auth flow:
//! - [`SessionStore`] — one pretty-printed JSON file per session under the
//!   sessions directory. The chat front-end reads its transcript from here
//!   (via the auth server) and the API server appends to it.
//! - [`LoginSessions`] — the in-memory registry the auth server consults
//!   when verifying a session. Entries expire after one hour.
//!
//! Logout reconciles both layers: the in-memory entry is removed and the
//! session file is overwritten with an empty object, which deserializes to
//! an unauthenticated [`SessionRecord`].

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Login entries expire after one hour.
const LOGIN_TTL_SECS: i64 = 3600;

/// An authorization round-trip must complete within ten minutes.
const PENDING_TTL_SECS: i64 = 600;

/// One chat message in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

/// Session state persisted as a JSON file.
///
/// Every field defaults, so a cleared file (`{}`) deserializes to an
/// unauthenticated record with an empty transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Generate a new session identifier: 32 random bytes, hex-encoded.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Strip everything but `[A-Za-z0-9_-]` so a caller-supplied session id
/// can never escape the sessions directory.
pub fn sanitize_session_id(session_id: &str) -> String {
    session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// File-backed session storage: `{dir}/{sanitized id}.json`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create sessions directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", sanitize_session_id(session_id)))
    }

    /// Write the record to its session file, replacing any previous state.
    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let path = self.path_for(&record.session_id);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        Ok(())
    }

    /// Load a session record; `Ok(None)` when no file exists for the id.
    pub fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let path = self.path_for(session_id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read session file {}", path.display()))
            }
        };
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid session file {}", path.display()))?;
        Ok(Some(record))
    }

    /// Overwrite the session file with an empty object.
    ///
    /// The file stays behind as a logout tombstone rather than being
    /// deleted, so a stale link loads as unauthenticated instead of 404ing.
    pub fn clear(&self, session_id: &str) -> Result<()> {
        let path = self.path_for(session_id);
        std::fs::write(&path, "{}")
            .with_context(|| format!("Failed to clear session file {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoginEntry {
    pub email: String,
    pub user_id: String,
    created_at: i64,
}

/// In-memory registry of active logins, keyed by session id.
#[derive(Default)]
pub struct LoginSessions {
    entries: RwLock<HashMap<String, LoginEntry>>,
}

impl LoginSessions {
    pub async fn insert(&self, session_id: &str, email: &str, user_id: &str) {
        let entry = LoginEntry {
            email: email.to_string(),
            user_id: user_id.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.entries
            .write()
            .await
            .insert(session_id.to_string(), entry);
    }

    /// The entry for `session_id` when it exists, has not expired, and
    /// belongs to `email`.
    pub async fn verify(&self, email: &str, session_id: &str) -> Option<LoginEntry> {
        let now = chrono::Utc::now().timestamp();
        let entries = self.entries.read().await;
        entries
            .get(session_id)
            .filter(|entry| entry.email == email && now - entry.created_at < LOGIN_TTL_SECS)
            .cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<LoginEntry> {
        self.entries.write().await.remove(session_id)
    }

    /// Drop entries older than the login TTL. Run on each `/login`.
    pub async fn purge_expired(&self) {
        self.purge_expired_at(chrono::Utc::now().timestamp()).await;
    }

    async fn purge_expired_at(&self, now: i64) {
        self.entries
            .write()
            .await
            .retain(|_, entry| now - entry.created_at < LOGIN_TTL_SECS);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

struct PendingEntry {
    pkce_verifier: String,
    created_at: i64,
}

/// Authorization requests awaiting their callback, keyed by the CSRF state
/// parameter. Each entry holds the PKCE verifier for the token exchange.
#[derive(Default)]
pub struct PendingLogins {
    entries: RwLock<HashMap<String, PendingEntry>>,
}

impl PendingLogins {
    pub async fn insert(&self, state: &str, pkce_verifier: String) {
        let entry = PendingEntry {
            pkce_verifier,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.entries.write().await.insert(state.to_string(), entry);
    }

    /// Consume the pending entry for `state`.
    ///
    /// Returns the PKCE verifier, or `None` when the state is unknown,
    /// already used, or expired. Either way the entry is gone afterwards,
    /// so a state can never be replayed.
    pub async fn take(&self, state: &str) -> Option<String> {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries.write().await;
        let entry = entries.remove(state)?;
        if now - entry.created_at >= PENDING_TTL_SECS {
            return None;
        }
        Some(entry.pkce_verifier)
    }

    /// Drop authorization requests whose callback never arrived.
    pub async fn purge_expired(&self) {
        self.purge_expired_at(chrono::Utc::now().timestamp()).await;
    }

    async fn purge_expired_at(&self, now: i64) {
        self.entries
            .write()
            .await
            .retain(|_, entry| now - entry.created_at < PENDING_TTL_SECS);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record(session_id: &str) -> SessionRecord {
        SessionRecord {
            email: "alice@example.com".to_string(),
            session_id: session_id.to_string(),
            authenticated: true,
            user_id: "google-123".to_string(),
            messages: vec![
                Message {
                    role: "user".to_string(),
                    content: "what is in my report?".to_string(),
                },
                Message {
                    role: "assistant".to_string(),
                    content: "Revenue grew 12%.".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let record = sample_record("abc123");
        store.save(&record).unwrap();

        let loaded = store.load("abc123").unwrap().unwrap();
        assert_eq!(loaded.email, record.email);
        assert_eq!(loaded.session_id, record.session_id);
        assert!(loaded.authenticated);
        assert_eq!(loaded.user_id, record.user_id);
        assert_eq!(loaded.messages, record.messages);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_clear_leaves_unauthenticated_tombstone() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store.save(&sample_record("abc123")).unwrap();
        store.clear("abc123").unwrap();

        let raw = std::fs::read_to_string(dir.path().join("abc123.json")).unwrap();
        assert_eq!(raw, "{}");

        let loaded = store.load("abc123").unwrap().unwrap();
        assert!(!loaded.authenticated);
        assert!(loaded.email.is_empty());
        assert!(loaded.messages.is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store.save(&sample_record("abc123")).unwrap();

        let mut record = store.load("abc123").unwrap().unwrap();
        record.messages.push(Message {
            role: "user".to_string(),
            content: "and expenses?".to_string(),
        });
        store.save(&record).unwrap();

        let loaded = store.load("abc123").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 3);
        assert_eq!(loaded.messages[0].role, "user");
        assert_eq!(loaded.messages[2].content, "and expenses?");
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(sanitize_session_id("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_session_id("abc-DEF_123"), "abc-DEF_123");
        assert_eq!(sanitize_session_id("a b\tc"), "abc");
    }

    #[test]
    fn test_save_uses_sanitized_filename() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut record = sample_record("../evil");
        record.session_id = "../evil".to_string();
        store.save(&record).unwrap();

        assert!(dir.path().join("evil.json").exists());
        assert!(!dir.path().parent().unwrap().join("evil.json").exists());
    }

    #[test]
    fn test_generate_session_id_shape() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        // Survives sanitization unchanged
        assert_eq!(sanitize_session_id(&a), a);
    }

    #[tokio::test]
    async fn test_login_sessions_verify() {
        let logins = LoginSessions::default();
        logins.insert("sid1", "alice@example.com", "google-123").await;

        let entry = logins.verify("alice@example.com", "sid1").await.unwrap();
        assert_eq!(entry.user_id, "google-123");
        assert!(logins.verify("bob@example.com", "sid1").await.is_none());
        assert!(logins.verify("alice@example.com", "sid2").await.is_none());
    }

    #[tokio::test]
    async fn test_login_sessions_remove() {
        let logins = LoginSessions::default();
        logins.insert("sid1", "alice@example.com", "google-123").await;

        let entry = logins.remove("sid1").await.unwrap();
        assert_eq!(entry.email, "alice@example.com");
        assert!(logins.verify("alice@example.com", "sid1").await.is_none());
        assert!(logins.remove("sid1").await.is_none());
    }

    #[tokio::test]
    async fn test_login_sessions_purge_expired() {
        let logins = LoginSessions::default();
        logins.insert("sid1", "alice@example.com", "google-123").await;
        assert_eq!(logins.len().await, 1);

        // Fresh entries survive a purge
        logins.purge_expired().await;
        assert_eq!(logins.len().await, 1);

        // An hour later they do not
        let later = chrono::Utc::now().timestamp() + LOGIN_TTL_SECS + 1;
        logins.purge_expired_at(later).await;
        assert_eq!(logins.len().await, 0);
    }

    #[tokio::test]
    async fn test_pending_logins_take_consumes() {
        let pending = PendingLogins::default();
        pending.insert("state1", "verifier1".to_string()).await;

        assert_eq!(pending.take("state1").await.as_deref(), Some("verifier1"));
        assert!(pending.take("state1").await.is_none());
        assert!(pending.take("state2").await.is_none());
    }

    #[tokio::test]
    async fn test_pending_logins_purge_expired() {
        let pending = PendingLogins::default();
        pending.insert("state1", "verifier1".to_string()).await;

        pending.purge_expired().await;
        assert_eq!(pending.len().await, 1);

        let later = chrono::Utc::now().timestamp() + PENDING_TTL_SECS + 1;
        pending.purge_expired_at(later).await;
        assert_eq!(pending.len().await, 0);
    }
}
