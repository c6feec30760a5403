//! Issue and verify operations.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, instrument, warn, Span};

use super::clock::{Clock, SystemClock};
use super::crypto::{
    digests_match, generate_code, generate_salt, hash_code, normalize_email, record_key, OsRandom,
    RandomSource,
};
use super::error::OtpError;
use super::policy::OtpPolicy;
use crate::delivery::{Mailer, OutboundEmail};
use crate::store::{OtpStore, RecordUpdate};

/// Explicitly constructed OTP service; every collaborator is injected.
pub struct OtpService {
    policy: OtpPolicy,
    store: Arc<dyn OtpStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl OtpService {
    /// Service backed by the system clock and the OS random source.
    #[must_use]
    pub fn new(policy: OtpPolicy, store: Arc<dyn OtpStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            policy,
            store,
            mailer,
            clock: Arc::new(SystemClock),
            random: Arc::new(OsRandom),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    #[must_use]
    pub fn store(&self) -> &dyn OtpStore {
        self.store.as_ref()
    }

    /// Issue (or re-issue) a code for `email` and mail it.
    ///
    /// Throttle and quota rejections leave the stored record untouched. A
    /// delivery failure is reported, but the freshly written record stays valid.
    ///
    /// # Errors
    /// Returns the matching [`OtpError`] for each rejected or failed step.
    #[instrument(skip_all, fields(record_key))]
    pub async fn issue(&self, email: &str) -> Result<(), OtpError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(OtpError::InvalidInput("Email required"));
        }

        let key = record_key(&email);
        Span::current().record("record_key", key.as_str());

        let now = self.clock.now();
        let previous = self.store.get(&key).await?;

        if let Some(previous) = &previous {
            if now - previous.last_sent_at < self.policy.resend_cooldown() {
                debug!("otp resend throttled");
                return Err(OtpError::RateLimited);
            }
        }

        let resend_count = previous
            .as_ref()
            .map_or(0, |previous| previous.resend_count)
            .saturating_add(1);
        if resend_count > self.policy.max_sends() {
            debug!(resend_count, "otp resend quota exhausted");
            return Err(OtpError::QuotaExceeded);
        }

        let code = generate_code(self.random.as_ref())?;
        let salt = generate_salt(self.random.as_ref())?;
        let code_hash = hash_code(&code, &salt);
        let expires_at = self
            .policy
            .code_ttl()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow::anyhow!("otp lifetime overflows the expiry timestamp"))?;

        self.store
            .merge(
                &key,
                &RecordUpdate::issue(email.clone(), code_hash, salt, expires_at, resend_count, now),
            )
            .await
            .context("failed to store otp record")?;

        let message = OutboundEmail {
            from: self.policy.mail_from().to_string(),
            to: email,
            subject: self.policy.mail_subject().to_string(),
            text: self.policy.mail_text(&code),
        };
        if let Err(err) = self.mailer.send(&message).await {
            warn!("otp delivery failed: {err}");
            return Err(OtpError::DeliveryFailed { trace: err.trace() });
        }

        info!(resend_count, "otp issued");
        Ok(())
    }

    /// Check `code` against the live record for `email` and consume it on match.
    ///
    /// # Errors
    /// Returns the matching [`OtpError`] for each rejected or failed step.
    #[instrument(skip_all, fields(record_key))]
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let email = normalize_email(email);
        let code = code.trim();
        if email.is_empty() || code.is_empty() {
            return Err(OtpError::InvalidInput("Missing email or code"));
        }

        let key = record_key(&email);
        Span::current().record("record_key", key.as_str());

        let record = self.store.get(&key).await?.ok_or(OtpError::NotFound)?;

        if record.consumed {
            return Err(OtpError::AlreadyUsed);
        }
        if self.clock.now() > record.expires_at {
            return Err(OtpError::Expired);
        }
        // Exhausted records are rejected before any hashing.
        if record.attempts >= self.policy.max_attempts() {
            return Err(OtpError::TooManyAttempts);
        }

        if self.policy.strict_attempts() {
            let reserved = self
                .store
                .increment_attempts(&key)
                .await?
                .ok_or(OtpError::NotFound)?;
            if reserved > self.policy.max_attempts() {
                return Err(OtpError::TooManyAttempts);
            }
        }

        let candidate = hash_code(code, &record.salt);
        if !digests_match(&candidate, &record.code_hash) {
            if !self.policy.strict_attempts() {
                self.store
                    .merge(&key, &RecordUpdate::attempts(record.attempts.saturating_add(1)))
                    .await
                    .context("failed to record otp attempt")?;
            }
            debug!(attempts = record.attempts + 1, "otp mismatch");
            return Err(OtpError::InvalidCode);
        }

        self.store
            .merge(&key, &RecordUpdate::consumed())
            .await
            .context("failed to consume otp record")?;

        info!("otp verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryError;
    use crate::otp::error::ErrorKind;
    use crate::store::{MemoryStore, OtpRecord};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Mutex;

    const EMAIL: &str = "user@example.com";

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Self {
            let start = Utc
                .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
                .single()
                .unwrap_or_default();
            Self(Mutex::new(start))
        }

        fn advance(&self, by: Duration) {
            if let Ok(mut now) = self.0.lock() {
                *now += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.lock().map(|now| *now).unwrap_or_default()
        }
    }

    /// Counter-based source: every fill yields distinct bytes.
    struct CountingRandom(Mutex<u32>);

    impl RandomSource for CountingRandom {
        fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
            let mut counter = self.0.lock().map_err(|_| anyhow!("poisoned"))?;
            for byte in dest.iter_mut() {
                *counter = counter.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                *byte = counter.to_be_bytes()[1];
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutboundEmail>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                fail: true,
            }
        }

        fn last_code(&self) -> Option<String> {
            let sent = self.sent.lock().ok()?;
            let text = &sent.last()?.text;
            text.split_whitespace()
                .find_map(|word| {
                    let digits = word.trim_end_matches('.');
                    (digits.len() == 6 && digits.chars().all(|c| c.is_ascii_digit()))
                        .then(|| digits.to_string())
                })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().map(|sent| sent.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &OutboundEmail) -> Result<(), DeliveryError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message.clone());
            }
            if self.fail {
                return Err(DeliveryError::Rejected {
                    status: 503,
                    body: "provider unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        service: OtpService,
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new(policy: OtpPolicy) -> Self {
            Self::with_mailer(policy, RecordingMailer::default())
        }

        fn with_mailer(policy: OtpPolicy, mailer: RecordingMailer) -> Self {
            let store = Arc::new(MemoryStore::new());
            let mailer = Arc::new(mailer);
            let clock = Arc::new(ManualClock::new());
            let service = OtpService::new(policy, store.clone(), mailer.clone())
                .with_clock(clock.clone())
                .with_random(Arc::new(CountingRandom(Mutex::new(7))));
            Self {
                service,
                store,
                mailer,
                clock,
            }
        }

        async fn record(&self) -> Result<OtpRecord> {
            self.store
                .get(&record_key(EMAIL))
                .await?
                .ok_or_else(|| anyhow!("record missing"))
        }

        fn code(&self) -> Result<String> {
            self.mailer.last_code().ok_or_else(|| anyhow!("no code sent"))
        }

        fn wrong_code(&self) -> Result<String> {
            let code = self.code()?;
            Ok(if code == "000000" { "111111" } else { "000000" }.to_string())
        }
    }

    fn kind(result: Result<(), OtpError>) -> Option<ErrorKind> {
        result.err().map(|err| err.kind())
    }

    #[tokio::test]
    async fn issue_then_verify_succeeds_exactly_once() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let code = h.code()?;

        h.service.verify(EMAIL, &code).await?;
        assert!(h.record().await?.consumed);

        assert_eq!(
            kind(h.service.verify(EMAIL, &code).await),
            Some(ErrorKind::AlreadyUsed)
        );
        Ok(())
    }

    #[tokio::test]
    async fn issue_stores_digest_not_code() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(" User@Example.com ").await?;
        let code = h.code()?;
        let record = h.record().await?;

        assert_eq!(record.email, EMAIL);
        assert_ne!(record.code_hash, code);
        assert!(!record.code_hash.contains(&code));
        assert_eq!(record.code_hash, hash_code(&code, &record.salt));
        assert_eq!(record.attempts, 0);
        assert_eq!(record.resend_count, 1);
        assert!(!record.consumed);
        assert_eq!(record.expires_at - record.last_sent_at, Duration::minutes(15));
        Ok(())
    }

    #[tokio::test]
    async fn outbound_message_carries_code_to_normalized_address() -> Result<()> {
        let h = Harness::new(OtpPolicy::new().with_mail_from("otp@example.com".to_string()));
        h.service.issue("USER@example.com").await?;
        let sent = h
            .mailer
            .sent
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, EMAIL);
        assert_eq!(sent[0].from, "otp@example.com");
        assert_eq!(sent[0].subject, "Your SpaceCareer OTP");
        Ok(())
    }

    #[tokio::test]
    async fn empty_email_is_invalid_input() {
        let h = Harness::new(OtpPolicy::new());
        assert_eq!(kind(h.service.issue("   ").await), Some(ErrorKind::InvalidInput));
        assert_eq!(kind(h.service.verify("", "123456").await), Some(ErrorKind::InvalidInput));
        assert_eq!(kind(h.service.verify(EMAIL, "  ").await), Some(ErrorKind::InvalidInput));
        assert!(h.store.is_empty().await);
        assert_eq!(h.mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn wrong_code_increments_attempts_by_one() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let wrong = h.wrong_code()?;

        assert_eq!(
            kind(h.service.verify(EMAIL, &wrong).await),
            Some(ErrorKind::InvalidCode)
        );
        assert_eq!(h.record().await?.attempts, 1);
        Ok(())
    }

    #[tokio::test]
    async fn resend_within_cooldown_is_throttled_and_keeps_first_code() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let first = h.record().await?;
        let code = h.code()?;

        h.clock.advance(Duration::seconds(59));
        assert_eq!(kind(h.service.issue(EMAIL).await), Some(ErrorKind::RateLimited));
        assert_eq!(h.record().await?, first);
        assert_eq!(h.mailer.sent_count(), 1);

        h.service.verify(EMAIL, &code).await?;
        Ok(())
    }

    #[tokio::test]
    async fn sixth_issuance_exceeds_quota() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        for _ in 0..5 {
            h.service.issue(EMAIL).await?;
            h.clock.advance(Duration::seconds(60));
        }
        assert_eq!(h.record().await?.resend_count, 5);

        let before = h.record().await?;
        assert_eq!(kind(h.service.issue(EMAIL).await), Some(ErrorKind::QuotaExceeded));
        assert_eq!(h.record().await?, before);
        assert_eq!(h.mailer.sent_count(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn reissue_resets_attempts_and_consumption() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let first_code = h.code()?;
        let wrong = h.wrong_code()?;
        let _ = h.service.verify(EMAIL, &wrong).await;
        h.service.verify(EMAIL, &first_code).await?;

        h.clock.advance(Duration::minutes(2));
        h.service.issue(EMAIL).await?;
        let record = h.record().await?;
        assert_eq!(record.attempts, 0);
        assert!(!record.consumed);
        assert_eq!(record.resend_count, 2);

        h.service.verify(EMAIL, &h.code()?).await?;
        Ok(())
    }

    #[tokio::test]
    async fn expired_code_fails_even_when_correct() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let code = h.code()?;

        h.clock.advance(Duration::minutes(15) + Duration::seconds(1));
        assert_eq!(
            kind(h.service.verify(EMAIL, &code).await),
            Some(ErrorKind::Expired)
        );
        assert!(!h.record().await?.consumed);
        Ok(())
    }

    #[tokio::test]
    async fn code_is_valid_at_the_expiry_instant() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        h.clock.advance(Duration::minutes(15));
        h.service.verify(EMAIL, &h.code()?).await?;
        Ok(())
    }

    #[tokio::test]
    async fn five_failures_exhaust_the_code() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let code = h.code()?;
        let wrong = h.wrong_code()?;

        for _ in 0..5 {
            assert_eq!(
                kind(h.service.verify(EMAIL, &wrong).await),
                Some(ErrorKind::InvalidCode)
            );
        }
        assert_eq!(
            kind(h.service.verify(EMAIL, &code).await),
            Some(ErrorKind::TooManyAttempts)
        );
        let record = h.record().await?;
        assert_eq!(record.attempts, 5);
        assert!(!record.consumed);
        Ok(())
    }

    #[tokio::test]
    async fn verify_without_issue_is_not_found() {
        let h = Harness::new(OtpPolicy::new());
        assert_eq!(
            kind(h.service.verify(EMAIL, "123456").await),
            Some(ErrorKind::NotFound)
        );
    }

    #[tokio::test]
    async fn candidate_code_is_trimmed() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let code = format!(" {} \n", h.code()?);
        h.service.verify("  USER@EXAMPLE.COM", &code).await?;
        Ok(())
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_record_valid() -> Result<()> {
        let h = Harness::with_mailer(OtpPolicy::new(), RecordingMailer::failing());
        let result = h.service.issue(EMAIL).await;
        match result {
            Err(OtpError::DeliveryFailed { trace }) => assert_eq!(trace, "provider unavailable"),
            other => panic!("expected delivery failure, got {other:?}"),
        }

        let record = h.record().await?;
        assert_eq!(record.resend_count, 1);
        h.service.verify(EMAIL, &h.code()?).await?;
        Ok(())
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_an_internal_error() -> Result<()> {
        let h = Harness::new(OtpPolicy::new().with_code_ttl_seconds(i64::MAX));
        assert_eq!(kind(h.service.issue(EMAIL).await), Some(ErrorKind::Internal));
        assert!(h.store.is_empty().await);
        assert_eq!(h.mailer.sent_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn example_scenario() -> Result<()> {
        let h = Harness::new(OtpPolicy::new());
        h.service.issue(EMAIL).await?;
        let record = h.record().await?;
        assert_eq!(
            (record.attempts, record.resend_count, record.consumed),
            (0, 1, false)
        );

        let code = h.code()?;
        let wrong = h.wrong_code()?;
        for _ in 0..3 {
            assert_eq!(
                kind(h.service.verify(EMAIL, &wrong).await),
                Some(ErrorKind::InvalidCode)
            );
        }
        assert_eq!(h.record().await?.attempts, 3);

        h.service.verify(EMAIL, &code).await?;
        let record = h.record().await?;
        assert!(record.consumed);
        assert_eq!(record.attempts, 3);
        assert_eq!(record.resend_count, 1);

        assert_eq!(
            kind(h.service.verify(EMAIL, &code).await),
            Some(ErrorKind::AlreadyUsed)
        );
        Ok(())
    }

    #[tokio::test]
    async fn strict_attempts_reserve_before_comparing() -> Result<()> {
        let h = Harness::new(OtpPolicy::new().with_strict_attempts(true));
        h.service.issue(EMAIL).await?;
        let code = h.code()?;
        let wrong = h.wrong_code()?;

        assert_eq!(
            kind(h.service.verify(EMAIL, &wrong).await),
            Some(ErrorKind::InvalidCode)
        );
        assert_eq!(h.record().await?.attempts, 1);

        h.service.verify(EMAIL, &code).await?;
        let record = h.record().await?;
        assert!(record.consumed);
        // The successful comparison was reserved as an attempt too.
        assert_eq!(record.attempts, 2);
        Ok(())
    }

    /// Lets one concurrent guess land between the read and the reservation.
    struct RacingStore(MemoryStore);

    #[async_trait]
    impl OtpStore for RacingStore {
        async fn get(&self, key: &str) -> Result<Option<OtpRecord>> {
            self.0.get(key).await
        }

        async fn merge(&self, key: &str, update: &RecordUpdate) -> Result<()> {
            self.0.merge(key, update).await
        }

        async fn increment_attempts(&self, key: &str) -> Result<Option<u32>> {
            self.0.increment_attempts(key).await?;
            self.0.increment_attempts(key).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn strict_attempts_refuse_guesses_past_the_limit() -> Result<()> {
        let store = Arc::new(RacingStore(MemoryStore::new()));
        let mailer = Arc::new(RecordingMailer::default());
        let service = OtpService::new(
            OtpPolicy::new().with_strict_attempts(true),
            store.clone(),
            mailer.clone(),
        );
        service.issue(EMAIL).await?;
        let code = mailer.last_code().ok_or_else(|| anyhow!("no code sent"))?;

        let key = record_key(EMAIL);
        store.merge(&key, &RecordUpdate::attempts(4)).await?;

        assert_eq!(
            kind(service.verify(EMAIL, &code).await),
            Some(ErrorKind::TooManyAttempts)
        );
        let record = store.get(&key).await?.ok_or_else(|| anyhow!("record missing"))?;
        assert_eq!(record.attempts, 6);
        assert!(!record.consumed);
        Ok(())
    }
}
