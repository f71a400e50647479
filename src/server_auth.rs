//! Auth server: Google OAuth login and session verification.
//!
//! Owns the login flow end to end: serves the sign-in page, redirects to
//! the provider with PKCE, exchanges the callback code, fetches the
//! user's email from the userinfo endpoint, and hands the browser back to
//! the chat front-end with a fresh session id.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Sign-in page |
//! | `GET` | `/login` | Redirect to the provider's consent screen |
//! | `GET` | `/callback` | OAuth redirect target; establishes the session |
//! | `GET` | `/verify-session/{email}` | Check a session id against the login registry |
//! | `GET` | `/session` | Session transcript as stored on disk |
//! | `GET` | `/logout` | Drop the login and clear the session file |
//!
//! Logins live in memory and expire after an hour; the session transcript
//! lives on disk and survives restarts. Logout clears both.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AuthServerConfig, Config};
use crate::session::{
    generate_session_id, sanitize_session_id, LoginSessions, PendingLogins, SessionRecord,
    SessionStore,
};
use crate::ui::LOGIN_PAGE;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to create OAuth client: {0}")]
    ClientCreationFailed(String),
    #[error("Provider returned error: {0}")]
    ProviderDenied(String),
    #[error("Missing authorization code")]
    MissingCode,
    #[error("Invalid or expired state parameter")]
    UnknownState,
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),
    #[error("Userinfo request failed: {0}")]
    UserinfoFailed(String),
    #[error("Userinfo response missing email")]
    MissingEmail,
    #[error("Invalid redirect URL: {0}")]
    BadRedirect(String),
}

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    oauth: Arc<BasicClient>,
    logins: Arc<LoginSessions>,
    pending: Arc<PendingLogins>,
    sessions: SessionStore,
}

fn build_oauth_client(
    auth: &AuthServerConfig,
    client_id: String,
    client_secret: String,
) -> Result<BasicClient, AuthError> {
    let client = BasicClient::new(
        ClientId::new(client_id),
        Some(ClientSecret::new(client_secret)),
        AuthUrl::new(auth.auth_url.clone())
            .map_err(|e| AuthError::ClientCreationFailed(e.to_string()))?,
        Some(
            TokenUrl::new(auth.token_url.clone())
                .map_err(|e| AuthError::ClientCreationFailed(e.to_string()))?,
        ),
    )
    .set_redirect_uri(
        RedirectUrl::new(auth.redirect_url.clone())
            .map_err(|e| AuthError::ClientCreationFailed(e.to_string()))?,
    );

    Ok(client)
}

/// Starts the auth server on `[auth].bind`.
///
/// Requires both OAuth client credentials; there is nothing this server
/// can do without them.
pub async fn run_auth_server(config: &Config) -> anyhow::Result<()> {
    let (client_id, client_secret) = config.require_oauth()?;
    let oauth = build_oauth_client(&config.auth, client_id, client_secret)?;
    let sessions = SessionStore::new(&config.sessions.dir)?;

    let bind_addr = config.auth.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        oauth: Arc::new(oauth),
        logins: Arc::new(LoginSessions::default()),
        pending: Arc::new(PendingLogins::default()),
        sessions,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_index))
        .route("/login", get(handle_login))
        .route("/callback", get(handle_callback))
        .route("/verify-session/{email}", get(handle_verify_session))
        .route("/session", get(handle_session))
        .route("/logout", get(handle_logout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    println!("Auth server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ GET / ============

async fn handle_index() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

// ============ GET /login ============

/// Redirects the browser to the provider's consent screen.
///
/// Also the housekeeping hook: expired logins are purged here, the one
/// endpoint every returning user passes through.
async fn handle_login(State(state): State<AppState>) -> Redirect {
    state.logins.purge_expired().await;
    state.pending.purge_expired().await;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_token) = state
        .oauth
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new(
            "https://www.googleapis.com/auth/userinfo.email".to_string(),
        ))
        .add_scope(Scope::new(
            "https://www.googleapis.com/auth/userinfo.profile".to_string(),
        ))
        .set_pkce_challenge(pkce_challenge)
        .url();

    state
        .pending
        .insert(csrf_token.secret(), pkce_verifier.secret().to_string())
        .await;

    Redirect::temporary(auth_url.as_str())
}

// ============ GET /callback ============

#[derive(Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn handle_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match complete_login(&state, params).await {
        Ok(redirect_url) => Redirect::temporary(&redirect_url).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "authentication failed");
            (
                StatusCode::BAD_REQUEST,
                format!("Authentication failed: {}", e),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

async fn fetch_userinfo(url: &str, access_token: &str) -> Result<UserInfo, AuthError> {
    let client = reqwest::Client::new();
    let resp = client
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| AuthError::UserinfoFailed(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(AuthError::UserinfoFailed(format!(
            "status {}",
            resp.status()
        )));
    }

    resp.json()
        .await
        .map_err(|e| AuthError::UserinfoFailed(e.to_string()))
}

/// Post-login destination on the chat front-end, with the email and
/// session id as properly encoded query parameters.
fn build_chat_redirect(
    ui_base: &str,
    email: &str,
    session_id: &str,
) -> Result<String, AuthError> {
    let mut url = oauth2::url::Url::parse(&format!("{}/chat", ui_base))
        .map_err(|e| AuthError::BadRedirect(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("email", email)
        .append_pair("session", session_id);
    Ok(url.to_string())
}

async fn complete_login(state: &AppState, params: CallbackParams) -> Result<String, AuthError> {
    if let Some(err) = params.error {
        return Err(AuthError::ProviderDenied(err));
    }

    let code = params.code.ok_or(AuthError::MissingCode)?;
    let csrf = params.state.ok_or(AuthError::UnknownState)?;

    // Consume the pending entry; a replayed or forged state dies here.
    let verifier = state
        .pending
        .take(&csrf)
        .await
        .ok_or(AuthError::UnknownState)?;

    let token = state
        .oauth
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(PkceCodeVerifier::new(verifier))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

    let userinfo = fetch_userinfo(
        &state.config.auth.userinfo_url,
        token.access_token().secret(),
    )
    .await?;
    let email = userinfo.email.ok_or(AuthError::MissingEmail)?;

    let session_id = generate_session_id();
    state
        .logins
        .insert(&session_id, &email, &userinfo.sub)
        .await;

    let record = SessionRecord {
        email: email.clone(),
        session_id: session_id.clone(),
        authenticated: true,
        user_id: userinfo.sub,
        messages: Vec::new(),
    };

    // The login stands even when the transcript file cannot be written.
    if let Err(e) = state.sessions.save(&record) {
        tracing::error!(error = %e, "failed to save session file");
    }

    tracing::info!(email = %record.email, "login complete");

    build_chat_redirect(&state.config.auth.ui_base_url, &email, &session_id)
}

// ============ GET /verify-session/{email} ============

#[derive(Deserialize)]
struct SessionQuery {
    #[serde(default)]
    session: Option<String>,
}

async fn handle_verify_session(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Query(q): Query<SessionQuery>,
) -> Response {
    if let Some(session_id) = q.session {
        if let Some(entry) = state.logins.verify(&email, &session_id).await {
            return Json(serde_json::json!({
                "valid": true,
                "user_id": entry.user_id,
            }))
            .into_response();
        }
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "valid": false })),
    )
        .into_response()
}

// ============ GET /session ============

/// Returns the stored session record, transcript included. The chat page
/// uses this to restore history after a reload.
async fn handle_session(
    State(state): State<AppState>,
    Query(q): Query<SessionQuery>,
) -> Response {
    let session_id = match q.session {
        Some(s) => s,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "session parameter is required" })),
            )
                .into_response()
        }
    };

    match state.sessions.load(&session_id) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Session not found" })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load session file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to load session" })),
            )
                .into_response()
        }
    }
}

// ============ GET /logout ============

async fn handle_logout(State(state): State<AppState>, Query(q): Query<SessionQuery>) -> Redirect {
    if let Some(session_id) = q.session {
        if let Some(entry) = state.logins.remove(&session_id).await {
            tracing::info!(email = %entry.email, "logged out");
        }
        // Clear the on-disk transcript too, so the file and the registry
        // agree that this session is over.
        if !sanitize_session_id(&session_id).is_empty() {
            if let Err(e) = state.sessions.clear(&session_id) {
                tracing::warn!(error = %e, "failed to clear session file");
            }
        }
    }

    Redirect::temporary(&state.config.auth.ui_base_url)
}
