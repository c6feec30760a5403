//! PostgreSQL-backed OTP record store.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Connection, PgPool, Row};
use tracing::{info_span, Instrument};

use super::{OtpRecord, OtpStore, RecordUpdate};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const SELECT_RECORD: &str = r"
    SELECT email, code_hash, salt, expires_at, attempts, resend_count, last_sent_at, consumed
    FROM otp_requests
    WHERE record_key = $1
";

const UPSERT_RECORD: &str = r"
    INSERT INTO otp_requests
        (record_key, email, code_hash, salt, expires_at, attempts, resend_count, last_sent_at, consumed)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (record_key) DO UPDATE SET
        email = EXCLUDED.email,
        code_hash = EXCLUDED.code_hash,
        salt = EXCLUDED.salt,
        expires_at = EXCLUDED.expires_at,
        attempts = EXCLUDED.attempts,
        resend_count = EXCLUDED.resend_count,
        last_sent_at = EXCLUDED.last_sent_at,
        consumed = EXCLUDED.consumed,
        updated_at = NOW()
";

// NULL parameters keep the stored value.
const UPDATE_FIELDS: &str = r"
    UPDATE otp_requests SET
        email = COALESCE($2, email),
        code_hash = COALESCE($3, code_hash),
        salt = COALESCE($4, salt),
        expires_at = COALESCE($5, expires_at),
        attempts = COALESCE($6, attempts),
        resend_count = COALESCE($7, resend_count),
        last_sent_at = COALESCE($8, last_sent_at),
        consumed = COALESCE($9, consumed),
        updated_at = NOW()
    WHERE record_key = $1
";

const INCREMENT_ATTEMPTS: &str = r"
    UPDATE otp_requests
    SET attempts = attempts + 1, updated_at = NOW()
    WHERE record_key = $1
    RETURNING attempts
";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool and make sure the `otp_requests` table exists.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or the schema cannot be applied.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let store = Self::new(pool);
        store.apply_schema().await?;
        Ok(store)
    }

    /// # Errors
    /// Returns an error if the schema statements fail.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .context("failed to apply otp_requests schema")?;
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_count(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("malformed otp record: negative {column}"))
}

fn from_count(value: Option<u32>, column: &str) -> Result<Option<i32>> {
    value
        .map(i32::try_from)
        .transpose()
        .with_context(|| format!("{column} does not fit the column type"))
}

#[async_trait]
impl OtpStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<OtpRecord>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = SELECT_RECORD
        );
        let row = sqlx::query(SELECT_RECORD)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load otp record")?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(OtpRecord {
            email: row.try_get("email")?,
            code_hash: row.try_get("code_hash")?,
            salt: row.try_get("salt")?,
            expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
            attempts: to_count(row.try_get("attempts")?, "attempts")?,
            resend_count: to_count(row.try_get("resend_count")?, "resend_count")?,
            last_sent_at: row.try_get::<DateTime<Utc>, _>("last_sent_at")?,
            consumed: row.try_get("consumed")?,
        }))
    }

    async fn merge(&self, key: &str, update: &RecordUpdate) -> Result<()> {
        // A complete update may create the row; a partial one only touches an existing row.
        let (statement, operation) = if update.to_record().is_some() {
            (UPSERT_RECORD, "UPSERT")
        } else {
            (UPDATE_FIELDS, "UPDATE")
        };
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = operation,
            db.statement = statement
        );
        let result = sqlx::query(statement)
            .bind(key)
            .bind(update.email.as_deref())
            .bind(update.code_hash.as_deref())
            .bind(update.salt.as_deref())
            .bind(update.expires_at)
            .bind(from_count(update.attempts, "attempts")?)
            .bind(from_count(update.resend_count, "resend_count")?)
            .bind(update.last_sent_at)
            .bind(update.consumed)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to merge otp record")?;

        if result.rows_affected() == 0 {
            bail!("cannot create an otp record from a partial update");
        }
        Ok(())
    }

    async fn increment_attempts(&self, key: &str) -> Result<Option<u32>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = INCREMENT_ATTEMPTS
        );
        let row = sqlx::query(INCREMENT_ATTEMPTS)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to increment otp attempts")?;

        row.map(|row| to_count(row.try_get("attempts")?, "attempts"))
            .transpose()
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }
}
