//! Confirmation token issuance.
//!
//! Tokens are 32 random bytes from the OS CSPRNG, encoded as unpadded base64url. Only a
//! salted SHA-256 digest is persisted; the plaintext leaves the process in the
//! confirmation link and nowhere else.

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const TOKEN_BYTES: usize = 32;
const SALT_BYTES: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("secure random source unavailable: {0}")]
    Rng(String),
}

fn random_bytes<const N: usize>() -> Result<[u8; N], TokenError> {
    let mut bytes = [0u8; N];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| TokenError::Rng(err.to_string()))?;
    Ok(bytes)
}

/// Plaintext token. `Debug` is redacted so it cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken(String);

impl IssuedToken {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IssuedToken([redacted])")
    }
}

pub fn generate_token() -> Result<IssuedToken, TokenError> {
    let bytes = random_bytes::<TOKEN_BYTES>()?;
    Ok(IssuedToken(URL_SAFE_NO_PAD.encode(bytes)))
}

/// Salted digest of a token as it is stored alongside the contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDigest {
    salt: String,
    hash: String,
}

impl TokenDigest {
    pub fn from_token(token: &IssuedToken) -> Result<Self, TokenError> {
        let salt = random_bytes::<SALT_BYTES>()?;
        Ok(Self {
            salt: STANDARD.encode(salt),
            hash: STANDARD.encode(salted_hash(&salt, token.expose())),
        })
    }

    /// Constant-time comparison of `candidate` against the stored digest.
    pub fn matches(&self, candidate: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (STANDARD.decode(&self.salt), STANDARD.decode(&self.hash))
        else {
            return false;
        };
        let actual = salted_hash(&salt, candidate);
        actual.ct_eq(expected.as_slice()).into()
    }
}

fn salted_hash(salt: &[u8], token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_url_safe_and_long_enough() {
        let token = generate_token().expect("rng available");
        assert_eq!(token.expose().len(), 43);
        assert!(token
            .expose()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..256)
            .map(|_| generate_token().expect("rng available").expose().to_string())
            .collect();
        assert_eq!(tokens.len(), 256);
    }

    #[test]
    fn digest_matches_only_its_token() {
        let token = generate_token().expect("rng available");
        let other = generate_token().expect("rng available");
        let digest = TokenDigest::from_token(&token).expect("digest");
        assert!(digest.matches(token.expose()));
        assert!(!digest.matches(other.expose()));
        assert!(!digest.matches(""));
    }

    #[test]
    fn digests_are_salted() {
        let token = generate_token().expect("rng available");
        let first = TokenDigest::from_token(&token).expect("digest");
        let second = TokenDigest::from_token(&token).expect("digest");
        assert_ne!(first, second);
        assert!(first.matches(token.expose()) && second.matches(token.expose()));
    }

    #[test]
    fn digest_never_contains_plaintext() {
        let token = generate_token().expect("rng available");
        let digest = TokenDigest::from_token(&token).expect("digest");
        let json = serde_json::to_string(&digest).expect("serializes");
        assert!(!json.contains(token.expose()));
        assert_eq!(format!("{token:?}"), "IssuedToken([redacted])");
    }
}
