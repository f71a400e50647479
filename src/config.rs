use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Application configuration, assembled from environment variables.
///
/// The deployment surface is a `.env` file, so there is no config-file
/// layer: [`Config::from_env`] reads the documented variables, applies
/// defaults, and validates the result. Commands that need a credential
/// fail at startup when it is absent (`require_*` helpers).
#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub sessions: SessionsConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub api: ApiServerConfig,
    pub auth: AuthServerConfig,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SessionsConfig {
    /// Directory holding one JSON file per session.
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Character threshold at which a chunk is flushed (`CHUNK_SIZE`).
    pub chunk_size: usize,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query (`TOP_K_RESULTS`).
    pub top_k: i64,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// One of `disabled`, `openai`, `ollama`, `local`.
    pub provider: String,
    pub model: Option<String>,
    /// Vector dimensionality (`VECTOR_DIMENSION`). Required for the openai
    /// and ollama providers; known local models resolve their own.
    pub dims: Option<usize>,
    /// Base URL for the ollama provider.
    pub url: Option<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Model name, falling back to the provider's default.
    pub fn model_or_default(&self) -> &str {
        match self.model.as_deref() {
            Some(m) => m,
            None => match self.provider.as_str() {
                "openai" => "text-embedding-3-small",
                "ollama" => "nomic-embed-text",
                _ => "all-minilm-l6-v2",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// One of `gemini`, `ollama`.
    pub provider: String,
    pub model: String,
    /// Base URL override; defaults to the provider's public endpoint.
    pub url: Option<String>,
    /// `GEMINI_API_KEY`; required when the provider is `gemini`.
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn model_or_default(&self) -> &str {
        if !self.model.is_empty() {
            return &self.model;
        }
        match self.provider.as_str() {
            "ollama" => "llama3",
            _ => "gemini-pro",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind: String,
    /// Auth-server origin baked into the served pages.
    pub auth_base_url: String,
}

#[derive(Debug, Clone)]
pub struct AuthServerConfig {
    pub bind: String,
    /// Front-end origin for post-login and post-logout redirects.
    pub ui_base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_url: String,
}

fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is not a valid number: {}", key, e)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let config = Config {
            db: DbConfig {
                path: PathBuf::from(env_string("QB_DB_PATH", "data/querybridge.sqlite")),
            },
            sessions: SessionsConfig {
                dir: PathBuf::from(env_string("QB_SESSIONS_DIR", "sessions")),
            },
            chunking: ChunkingConfig {
                chunk_size: env_parse("CHUNK_SIZE", 1000usize)?,
            },
            retrieval: RetrievalConfig {
                top_k: env_parse("TOP_K_RESULTS", 3i64)?,
            },
            embedding: EmbeddingConfig {
                provider: env_string("QB_EMBED_PROVIDER", "local"),
                model: env_opt("QB_EMBED_MODEL"),
                dims: env_opt("VECTOR_DIMENSION")
                    .map(|raw| {
                        raw.trim()
                            .parse::<usize>()
                            .with_context(|| "VECTOR_DIMENSION is not a valid number")
                    })
                    .transpose()?,
                url: env_opt("QB_EMBED_URL"),
                batch_size: env_parse("QB_EMBED_BATCH_SIZE", 64usize)?,
                max_retries: env_parse("QB_HTTP_MAX_RETRIES", 5u32)?,
                timeout_secs: env_parse("QB_HTTP_TIMEOUT_SECS", 30u64)?,
            },
            llm: LlmConfig {
                provider: env_string("QB_LLM_PROVIDER", "gemini"),
                model: env_string("QB_LLM_MODEL", ""),
                url: env_opt("QB_LLM_URL"),
                api_key: env_opt("GEMINI_API_KEY"),
                max_retries: env_parse("QB_HTTP_MAX_RETRIES", 5u32)?,
                timeout_secs: env_parse("QB_HTTP_TIMEOUT_SECS", 30u64)?,
            },
            api: ApiServerConfig {
                bind: env_string("QB_API_BIND", "127.0.0.1:8000"),
                auth_base_url: env_string("QB_AUTH_BASE_URL", "http://127.0.0.1:5000"),
            },
            auth: AuthServerConfig {
                bind: env_string("QB_AUTH_BIND", "127.0.0.1:5000"),
                ui_base_url: env_string("QB_UI_BASE_URL", "http://127.0.0.1:8000"),
                client_id: env_opt("GOOGLE_CLIENT_ID"),
                client_secret: env_opt("GOOGLE_CLIENT_SECRET"),
                auth_url: env_string(
                    "QB_OAUTH_AUTH_URL",
                    "https://accounts.google.com/o/oauth2/v2/auth",
                ),
                token_url: env_string("QB_OAUTH_TOKEN_URL", "https://oauth2.googleapis.com/token"),
                userinfo_url: env_string(
                    "QB_OAUTH_USERINFO_URL",
                    "https://openidconnect.googleapis.com/v1/userinfo",
                ),
                redirect_url: env_string(
                    "QB_OAUTH_REDIRECT_URL",
                    "http://127.0.0.1:5000/callback",
                ),
            },
        };

        validate(&config)?;
        Ok(config)
    }

    /// Fail fast when the configured LLM needs a credential that is absent.
    pub fn require_llm(&self) -> Result<()> {
        if self.llm.provider == "gemini" && self.llm.api_key.is_none() {
            bail!("GEMINI_API_KEY environment variable not set");
        }
        Ok(())
    }

    /// Fail fast unless both OAuth client credentials are present.
    pub fn require_oauth(&self) -> Result<(String, String)> {
        let id = self
            .auth
            .client_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLIENT_ID environment variable not set"))?;
        let secret = self
            .auth
            .client_secret
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLIENT_SECRET environment variable not set"))?;
        Ok((id, secret))
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("CHUNK_SIZE must be > 0");
    }

    if config.retrieval.top_k < 1 {
        bail!("TOP_K_RESULTS must be >= 1");
    }

    if config.embedding.dims == Some(0) {
        bail!("VECTOR_DIMENSION must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "gemini" | "ollama" => {}
        other => bail!(
            "Unknown LLM provider: '{}'. Must be gemini or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            db: DbConfig {
                path: PathBuf::from("data/test.sqlite"),
            },
            sessions: SessionsConfig {
                dir: PathBuf::from("sessions"),
            },
            chunking: ChunkingConfig { chunk_size: 1000 },
            retrieval: RetrievalConfig { top_k: 3 },
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig {
                provider: "gemini".to_string(),
                model: String::new(),
                url: None,
                api_key: Some("key".to_string()),
                max_retries: 5,
                timeout_secs: 30,
            },
            api: ApiServerConfig {
                bind: "127.0.0.1:8000".to_string(),
                auth_base_url: "http://127.0.0.1:5000".to_string(),
            },
            auth: AuthServerConfig {
                bind: "127.0.0.1:5000".to_string(),
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

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = base_config();
        config.chunking.chunk_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = base_config();
        config.embedding.provider = "cohere".to_string();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("Unknown embedding provider"));
    }

    #[test]
    fn test_validate_rejects_unknown_llm() {
        let mut config = base_config();
        config.llm.provider = "palm".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_model_defaults_per_provider() {
        let mut embedding = EmbeddingConfig::default();
        embedding.provider = "openai".to_string();
        assert_eq!(embedding.model_or_default(), "text-embedding-3-small");
        embedding.provider = "ollama".to_string();
        assert_eq!(embedding.model_or_default(), "nomic-embed-text");
        embedding.model = Some("custom".to_string());
        assert_eq!(embedding.model_or_default(), "custom");
    }

    #[test]
    fn test_llm_model_default() {
        let llm = LlmConfig {
            provider: "gemini".to_string(),
            model: String::new(),
            url: None,
            api_key: None,
            max_retries: 5,
            timeout_secs: 30,
        };
        assert_eq!(llm.model_or_default(), "gemini-pro");
    }

    #[test]
    fn test_require_llm_without_key() {
        let mut config = base_config();
        config.llm.api_key = None;
        assert!(config.require_llm().is_err());
        config.llm.provider = "ollama".to_string();
        assert!(config.require_llm().is_ok());
    }

    #[test]
    fn test_require_oauth_missing_credentials() {
        let mut config = base_config();
        assert!(config.require_oauth().is_err());
        config.auth.client_id = Some("id".to_string());
        config.auth.client_secret = Some("secret".to_string());
        let (id, secret) = config.require_oauth().unwrap();
        assert_eq!(id, "id");
        assert_eq!(secret, "secret");
    }
}
