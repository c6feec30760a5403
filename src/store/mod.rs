//! Storage abstractions for OTP records.
//!
//! A store is addressed by the record key (the hex SHA-256 of the normalized
//! email) and offers get-by-key plus a field-level merge-write. Stores do not
//! hold locks across calls; read-check-write sequences in the service are
//! therefore racy by at most the number of concurrent requests.

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use models::{OtpRecord, RecordUpdate};
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Load the record for `key`; `None` when no code was ever issued.
    async fn get(&self, key: &str) -> Result<Option<OtpRecord>>;

    /// Overwrite the fields named by `update` and keep the rest.
    ///
    /// Creates the record when missing, which requires a complete update.
    async fn merge(&self, key: &str, update: &RecordUpdate) -> Result<()>;

    /// Atomically add one failed attempt and return the new count.
    ///
    /// Returns `None` when the record does not exist.
    async fn increment_attempts(&self, key: &str) -> Result<Option<u32>>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<()>;
}
