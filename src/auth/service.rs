//! Credential verification and token issuance on top of the store.

use super::store::{CredentialStore, UserCredential};
use super::token::{TokenSigner, TokenStatus};
use super::AuthError;
use serde::Serialize;
use std::sync::Arc;

/// Default token lifetime: 10 minutes (seconds).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 600;

/// A freshly issued token and the lifetime it was issued with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    /// Lifetime in seconds.
    pub duration: u64,
}

pub struct AuthService {
    store: Arc<CredentialStore>,
    signer: TokenSigner,
    default_ttl_secs: u64,
}

impl AuthService {
    pub fn new(store: Arc<CredentialStore>, signer: TokenSigner, default_ttl_secs: u64) -> Self {
        Self {
            store,
            signer,
            default_ttl_secs,
        }
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    pub fn register(&self, username: &str, password: &str) -> Result<UserCredential, AuthError> {
        self.store.register(username, password)
    }

    /// Issue a token with the configured default lifetime.
    pub fn issue_token(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        self.issue_token_with_ttl(username, password, self.default_ttl_secs)
    }

    pub fn issue_token_with_ttl(
        &self,
        username: &str,
        password: &str,
        ttl_secs: u64,
    ) -> Result<IssuedToken, AuthError> {
        let user = self
            .store
            .find_by_username(username)?
            .ok_or(AuthError::UserNotFound)?;

        if !self.store.verify_password(username, password)? {
            tracing::warn!(username = %username, "Token request with bad password");
            return Err(AuthError::Unauthorized);
        }

        let token = self.signer.issue(&user.id, ttl_secs);
        tracing::debug!(user_id = %user.id, ttl_secs, "Token issued");
        Ok(IssuedToken {
            token,
            duration: ttl_secs,
        })
    }

    pub fn verify_token(&self, token: &str) -> TokenStatus {
        self.signer.verify(token)
    }
}
