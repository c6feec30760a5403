//! In-memory store used for local development and tests.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{OtpRecord, OtpStore, RecordUpdate};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, OtpRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<OtpRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn merge(&self, key: &str, update: &RecordUpdate) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(key) {
            update.apply_to(record);
        } else {
            let record = update
                .to_record()
                .context("cannot create an otp record from a partial update")?;
            debug!(record_key = key, "creating otp record");
            records.insert(key.to_string(), record);
        }
        Ok(())
    }

    async fn increment_attempts(&self, key: &str) -> Result<Option<u32>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(key).map(|record| {
            record.attempts = record.attempts.saturating_add(1);
            record.attempts
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
