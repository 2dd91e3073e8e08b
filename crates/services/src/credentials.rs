//! Password hashing and login tokens.
//!
//! Hashes are stored as `pbkdf2_sha256$<iterations>$<salt>$<digest>` with a
//! hex salt and digest. Derivation runs on the blocking thread pool.

use std::sync::LazyLock;

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::task::{JoinError, spawn_blocking};

const SCHEME: &str = "pbkdf2_sha256";
const ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

/// Checked in place of a real hash for unknown accounts, so a failed login
/// costs the same whether or not the email exists.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| derive_hash("not a real password"));

pub(crate) async fn hash_password(password: String) -> Result<String, JoinError> {
    spawn_blocking(move || derive_hash(&password)).await
}

/// Verify against `stored`, or against a throwaway hash when there is no
/// account. The latter never succeeds.
pub(crate) async fn verify_password(
    stored: Option<String>,
    password: String,
) -> Result<bool, JoinError> {
    spawn_blocking(move || match stored {
        Some(stored) => verify_hash(&stored, &password),
        None => {
            verify_hash(&DUMMY_HASH, &password);
            false
        }
    })
    .await
}

fn derive_hash(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt);
    let salt = hex::encode(salt);
    let digest = derive_key(&salt, password, ITERATIONS);
    format!("{SCHEME}${ITERATIONS}${salt}${digest}")
}

/// Constant-time comparison against a stored hash. Malformed hashes never verify.
fn verify_hash(stored: &str, password: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let actual = derive_key(salt, password, iterations);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn derive_key(salt: &str, password: &str, iterations: u32) -> String {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    hex::encode(key)
}

/// Fresh bearer token handed to the client.
pub(crate) fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Only the digest of a token is persisted.
pub(crate) fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
