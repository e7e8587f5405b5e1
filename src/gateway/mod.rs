//! Axum-based HTTP gateway for registration, tokens and control listings.
//!
//! Routes:
//! - `GET /` liveness, empty body
//! - `POST /api/register` form fields `username`, `password`
//! - `GET /api/token` basic auth `username:password`
//! - `GET /api/{items}/{resultFormat}?top=N` control listing
//!
//! Every error body is JSON `{"Error": <message>}`. Listing errors that
//! describe the request (empty store, bad selector, bad `top`) keep a 200
//! status because existing clients key off the body, not the status.

use crate::auth::{
    AuthError, AuthService, CredentialStore, PasswordHasher, TokenSigner, TokenStatus,
};
use crate::brevet::{Payload, QueryService, SqliteRecordRepository};
use crate::config::{Config, GatewayConfig};
use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub query: Arc<QueryService>,
    /// Require a valid token on listing routes.
    pub protect_listing: bool,
}

impl AppState {
    /// Open the stores named by `config` and wire up the services.
    pub fn from_config(config: &Config) -> Result<Self> {
        let hasher = PasswordHasher::new(config.auth.hash_iterations);
        let credentials = CredentialStore::open(&config.storage.users_db(), hasher)
            .context("Failed to initialize credential store")?;
        let records = SqliteRecordRepository::open(&config.storage.brevet_db())
            .context("Failed to initialize brevet store")?;

        let signer = match config.auth.secret_key.as_deref() {
            Some(secret) => TokenSigner::new(secret),
            None => {
                tracing::warn!(
                    "No secret_key configured; using a random signing secret. \
                     Tokens will not survive a restart."
                );
                TokenSigner::generate()
            }
        };

        Ok(Self {
            auth: Arc::new(AuthService::new(
                Arc::new(credentials),
                signer,
                config.auth.token_ttl_secs,
            )),
            query: Arc::new(QueryService::new(Arc::new(records))),
            protect_listing: config.auth.protect_listing,
        })
    }
}

/// Build the router with body-size and timeout limits applied.
pub fn router(state: AppState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/", get(handle_home))
        .route("/api/register", post(handle_register))
        .route("/api/token", get(handle_token))
        .route("/api/{items}/{result_format}", get(handle_list))
        .fallback(handle_not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ))
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    tracing::info!(
        addr = %local,
        protect_listing = state.protect_listing,
        token_ttl_secs = state.auth.default_ttl_secs(),
        "Brevet API listening"
    );

    let app = router(state, &config.gateway);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Brevet API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> ApiResponse {
    (
        status,
        Json(serde_json::json!({ "Error": message.to_string() })),
    )
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> ApiResponse {
    tracing::error!("{context}: {err}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// GET /: liveness, empty body
async fn handle_home() -> StatusCode {
    StatusCode::OK
}

async fn handle_not_found() -> ApiResponse {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Form body for user registration. Absent fields count as empty.
#[derive(Debug, Default, Deserialize)]
struct RegisterBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// POST /api/register: create a new user account.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Form<RegisterBody>, FormRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Form(b)) => b,
        Err(e) => {
            tracing::debug!("Rejected registration body: {e}");
            return error_response(StatusCode::BAD_REQUEST, AuthError::InvalidInput);
        }
    };

    let username = body.username.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    match state.auth.register(&username, &password) {
        Ok(user) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "location": user.id,
                "username": user.username,
                "date_added": user.created_at.to_rfc3339(),
            })),
        ),
        Err(e @ (AuthError::InvalidInput | AuthError::DuplicateUsername(_))) => {
            error_response(StatusCode::BAD_REQUEST, e)
        }
        Err(e) => internal_error("Registration failed", e),
    }
}

/// GET /api/token: exchange basic-auth credentials for a signed token.
async fn handle_token(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let (username, password) = match decode_basic_auth(&headers) {
        Ok(credentials) => credentials,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    match state.auth.issue_token(&username, &password) {
        Ok(issued) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "token": issued.token,
                "duration": issued.duration,
            })),
        ),
        Err(e @ (AuthError::UserNotFound | AuthError::Unauthorized)) => {
            error_response(StatusCode::UNAUTHORIZED, e)
        }
        Err(e) => internal_error("Token issuance failed", e),
    }
}

/// GET /api/{items}/{result_format}?top=N: list brevet controls.
async fn handle_list(
    State(state): State<AppState>,
    Path((items, result_format)): Path<(String, String)>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let params = match params {
        Ok(Query(pairs)) => pairs,
        Err(e) => {
            tracing::debug!("Ignoring undecodable listing query: {e}");
            Vec::new()
        }
    };
    let top = first_param(&params, "top");

    if state.protect_listing {
        if let Err(resp) = require_token(&state, &headers) {
            return resp.into_response();
        }
    }

    match state
        .query
        .query(&items, &result_format, top)
    {
        Ok(Payload::Json(rows)) => Json(rows).into_response(),
        Ok(Payload::Csv(csv)) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(e) if e.is_payload() => error_response(StatusCode::OK, e).into_response(),
        Err(e) => internal_error("Listing failed", e).into_response(),
    }
}

/// First value of `name`; repeated keys after it are ignored.
fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Validate the caller's token for a protected listing.
fn require_token(state: &AppState, headers: &HeaderMap) -> Result<String, ApiResponse> {
    let token = extract_listing_token(headers)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Missing token"))?;

    match state.auth.verify_token(&token) {
        TokenStatus::Valid { subject } => Ok(subject),
        TokenStatus::Expired => Err(error_response(StatusCode::UNAUTHORIZED, "Token expired")),
        TokenStatus::Invalid => Err(error_response(StatusCode::UNAUTHORIZED, "Invalid token")),
    }
}

/// Read a token from `Bearer <token>` or from the user part of basic auth
/// (`curl -u "<token>:none"`).
fn extract_listing_token(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .trim();
    if let Some(token) = strip_scheme(value, "Bearer") {
        return (!token.is_empty()).then(|| token.to_string());
    }
    decode_basic_auth(headers)
        .ok()
        .map(|(user, _)| user)
        .filter(|user| !user.is_empty())
}

/// Decode `Authorization: Basic base64(user:pass)`.
///
/// A bare base64 value without the `Basic` scheme is accepted too.
fn decode_basic_auth(headers: &HeaderMap) -> Result<(String, String), &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Malformed Authorization header")?
        .trim();
    let encoded = strip_scheme(value, "Basic").unwrap_or(value);

    let decoded = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or("Malformed Authorization header")?;
    let (user, pass) = decoded
        .split_once(':')
        .ok_or("Malformed Authorization header")?;
    Ok((user.to_string(), pass.to_string()))
}

/// Strip an auth scheme prefix, matching the scheme name case-insensitively.
fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (name, rest) = value.split_once(' ')?;
    name.eq_ignore_ascii_case(scheme).then(|| rest.trim())
}
