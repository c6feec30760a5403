//! OTP record and field-level update types.

use chrono::{DateTime, Utc};

/// Persisted state for one normalized email address.
///
/// The plaintext code is never part of the record; only `code_hash`, the
/// digest of `code + salt`, is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpRecord {
    pub email: String,
    pub code_hash: String,
    pub salt: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub resend_count: u32,
    pub last_sent_at: DateTime<Utc>,
    pub consumed: bool,
}

/// Merge-write payload: `Some` overwrites the field, `None` leaves it as stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub email: Option<String>,
    pub code_hash: Option<String>,
    pub salt: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub attempts: Option<u32>,
    pub resend_count: Option<u32>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub consumed: Option<bool>,
}

impl RecordUpdate {
    /// Fields written by a fresh issuance. Attempts reset and the code becomes live.
    #[must_use]
    pub fn issue(
        email: String,
        code_hash: String,
        salt: String,
        expires_at: DateTime<Utc>,
        resend_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            email: Some(email),
            code_hash: Some(code_hash),
            salt: Some(salt),
            expires_at: Some(expires_at),
            attempts: Some(0),
            resend_count: Some(resend_count),
            last_sent_at: Some(now),
            consumed: Some(false),
        }
    }

    #[must_use]
    pub fn attempts(attempts: u32) -> Self {
        Self {
            attempts: Some(attempts),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn consumed() -> Self {
        Self {
            consumed: Some(true),
            ..Self::default()
        }
    }

    /// Overwrite the named fields of an existing record.
    pub fn apply_to(&self, record: &mut OtpRecord) {
        if let Some(email) = &self.email {
            record.email.clone_from(email);
        }
        if let Some(code_hash) = &self.code_hash {
            record.code_hash.clone_from(code_hash);
        }
        if let Some(salt) = &self.salt {
            record.salt.clone_from(salt);
        }
        if let Some(expires_at) = self.expires_at {
            record.expires_at = expires_at;
        }
        if let Some(attempts) = self.attempts {
            record.attempts = attempts;
        }
        if let Some(resend_count) = self.resend_count {
            record.resend_count = resend_count;
        }
        if let Some(last_sent_at) = self.last_sent_at {
            record.last_sent_at = last_sent_at;
        }
        if let Some(consumed) = self.consumed {
            record.consumed = consumed;
        }
    }

    /// Build a new record; only possible when every field is named.
    #[must_use]
    pub fn to_record(&self) -> Option<OtpRecord> {
        Some(OtpRecord {
            email: self.email.clone()?,
            code_hash: self.code_hash.clone()?,
            salt: self.salt.clone()?,
            expires_at: self.expires_at?,
            attempts: self.attempts?,
            resend_count: self.resend_count?,
            last_sent_at: self.last_sent_at?,
            consumed: self.consumed?,
        })
    }
}
