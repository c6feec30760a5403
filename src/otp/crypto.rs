//! Code, salt and digest helpers.

use anyhow::{bail, Context, Result};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

const CODE_MIN: u32 = 100_000;
const CODE_SPAN: u32 = 900_000;
// Largest multiple of CODE_SPAN representable in a u32; draws at or above it are rejected.
const CODE_ZONE: u32 = u32::MAX - (u32::MAX % CODE_SPAN);
const MAX_CODE_DRAWS: usize = 16;
pub const SALT_LEN: usize = 8;

/// Cryptographically strong byte source.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely or fail.
    ///
    /// # Errors
    /// Returns an error if the underlying source cannot produce bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .context("failed to read from the OS random source")
    }
}

/// Normalize an email for lookup: trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Deterministic, non-reversible record key for a normalized email.
#[must_use]
pub fn record_key(email_normalized: &str) -> String {
    sha256_hex(email_normalized.as_bytes())
}

/// Uniform 6-digit code in `[100000, 999999]`.
///
/// # Errors
/// Returns an error if the random source fails or keeps producing rejected draws.
pub fn generate_code(random: &dyn RandomSource) -> Result<String> {
    let mut bytes = [0u8; 4];
    for _ in 0..MAX_CODE_DRAWS {
        random
            .fill_bytes(&mut bytes)
            .context("failed to generate otp code")?;
        let draw = u32::from_be_bytes(bytes);
        if draw < CODE_ZONE {
            return Ok(format!("{:06}", CODE_MIN + draw % CODE_SPAN));
        }
    }
    bail!("random source produced no usable otp code draw")
}

/// Fresh per-issuance salt, hex encoded.
///
/// # Errors
/// Returns an error if the random source fails.
pub fn generate_salt(random: &dyn RandomSource) -> Result<String> {
    let mut bytes = [0u8; SALT_LEN];
    random
        .fill_bytes(&mut bytes)
        .context("failed to generate otp salt")?;
    Ok(hex::encode(bytes))
}

/// `hex(sha256(code + salt))`.
#[must_use]
pub fn hash_code(code: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Exact digest comparison without an early exit on the first difference.
#[must_use]
pub fn digests_match(candidate: &str, stored: &str) -> bool {
    let (candidate, stored) = (candidate.as_bytes(), stored.as_bytes());
    candidate.len() == stored.len()
        && candidate
            .iter()
            .zip(stored)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}
