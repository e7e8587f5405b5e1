//! Signed, time-limited identity tokens.
//!
//! Wire form: `base64url(payload) "." base64url(HMAC-SHA256(secret, base64url(payload)))`
//! without padding. The payload is JSON `{"id", "iat", "exp"}` with Unix
//! seconds. The MAC covers the encoded payload text, so changing any byte of
//! the token breaks verification.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Byte length of a generated signing secret.
const GENERATED_SECRET_BYTES: usize = 32;

/// Claims carried inside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub id: String,
    /// Issued-at, Unix seconds.
    pub iat: u64,
    /// Expiry, Unix seconds.
    pub exp: u64,
}

/// Outcome of verifying a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// Signature checks out and the token has not expired.
    Valid { subject: String },
    /// Signature checks out but `exp` has passed.
    Expired,
    /// Malformed, forged or signed with another secret.
    Invalid,
}

impl TokenStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Issues and verifies tokens with one immutable secret.
///
/// The secret is fixed for the lifetime of the signer. Building a signer with
/// a different secret invalidates every token issued by the old one.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Signer with a random secret. Tokens do not survive a restart.
    pub fn generate() -> Self {
        let secret: [u8; GENERATED_SECRET_BYTES] = rand::rng().random();
        Self::new(secret)
    }

    /// Issue a token for `subject` valid for `ttl_secs` from now.
    pub fn issue(&self, subject: &str, ttl_secs: u64) -> String {
        self.issue_at(subject, ttl_secs, epoch_secs())
    }

    pub fn issue_at(&self, subject: &str, ttl_secs: u64, now: u64) -> String {
        let claims = TokenClaims {
            id: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        };
        // Serializing a struct of strings and integers cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(encoded.as_bytes()));
        format!("{encoded}.{signature}")
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> TokenStatus {
        self.verify_at(token, epoch_secs())
    }

    /// Verify a token as of `now`.
    ///
    /// The signature is checked before the payload is even decoded; expiry is
    /// only consulted for authentic tokens.
    pub fn verify_at(&self, token: &str, now: u64) -> TokenStatus {
        let Some(claims) = self.authenticate(token) else {
            return TokenStatus::Invalid;
        };
        if now >= claims.exp {
            return TokenStatus::Expired;
        }
        TokenStatus::Valid { subject: claims.id }
    }

    fn authenticate(&self, token: &str) -> Option<TokenClaims> {
        let (encoded, signature) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let payload = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        serde_json::from_slice(&payload).ok()
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, including empty.
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return Vec::new();
        };
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Current Unix epoch in seconds.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
