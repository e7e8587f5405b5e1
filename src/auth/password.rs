//! Salted, iterated password hashing.
//!
//! Hashes are PBKDF2-HMAC-SHA256 and encoded as
//! `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>` so the iteration count
//! travels with the hash and can be raised without breaking stored users.

use rand::RngExt;
use sha2::Sha256;

/// Default PBKDF2 iteration count for new hashes.
pub const DEFAULT_HASH_ITERATIONS: u32 = 100_000;

/// Salt byte length.
const SALT_BYTES: usize = 16;

/// Derived key length (one SHA-256 block).
const HASH_BYTES: usize = 32;

const SCHEME: &str = "pbkdf2-sha256";

/// Hashes and verifies passwords with a fixed work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let salt: [u8; SALT_BYTES] = rand::rng().random();
        let key = derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(key)
        )
    }

    /// Check `password` against an encoded hash.
    ///
    /// Uses the salt and iteration count stored in `encoded`, not the
    /// hasher's own. Malformed hashes never verify.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some((iterations, salt, expected)) = parse(encoded) else {
            tracing::warn!("Stored password hash is malformed");
            return false;
        };
        let key = derive(password, &salt, iterations);
        constant_time_eq(&key, &expected)
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_BYTES] {
    let mut key = [0u8; HASH_BYTES];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn parse(encoded: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = encoded.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations: u32 = parts.next()?.parse().ok().filter(|n| *n > 0)?;
    let salt = hex::decode(parts.next()?).ok()?;
    let hash = hex::decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.len() != HASH_BYTES {
        return None;
    }
    Some((iterations, salt, hash))
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
