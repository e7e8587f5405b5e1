//! User registration and token authentication.
//!
//! Provides:
//! - User registration with username/password (PBKDF2-HMAC-SHA256 + per-user salt)
//! - SQLite-backed credential storage with a UNIQUE username constraint
//! - Stateless HMAC-signed tokens carrying the user id and an expiry
//!
//! ## Design Decisions
//! - Tokens are not stored server-side. Verification needs only the signing
//!   secret, so there is no revocation; rotating the secret drops every token.
//! - A token proves identity only. It carries no roles or scopes.

pub mod password;
pub mod service;
pub mod store;
pub mod token;

pub use password::{PasswordHasher, DEFAULT_HASH_ITERATIONS};
pub use service::{AuthService, IssuedToken, DEFAULT_TOKEN_TTL_SECS};
pub use store::{CredentialStore, UserCredential};
pub use token::{TokenClaims, TokenSigner, TokenStatus};

/// Errors from registration and token issuance.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please provide a username and password.")]
    InvalidInput,

    #[error("{0} already in use.")]
    DuplicateUsername(String),

    #[error("User does not exist.")]
    UserNotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("credential store failure: {0}")]
    Store(#[from] anyhow::Error),
}
