//! Issuance and verification limits.

use chrono::Duration;

const DEFAULT_CODE_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_RESEND_COOLDOWN_SECONDS: i64 = 60;
const DEFAULT_MAX_SENDS: u32 = 5;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAIL_FROM: &str = "SpaceCareer <no-reply@spacecareer.app>";
const MAIL_SUBJECT: &str = "Your SpaceCareer OTP";

#[derive(Clone, Debug)]
pub struct OtpPolicy {
    code_ttl_seconds: i64,
    resend_cooldown_seconds: i64,
    max_sends: u32,
    max_attempts: u32,
    strict_attempts: bool,
    mail_from: String,
}

impl OtpPolicy {
    /// Defaults: 15 minute codes, 60 second resend cooldown, 5 sends, 5 attempts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            resend_cooldown_seconds: DEFAULT_RESEND_COOLDOWN_SECONDS,
            max_sends: DEFAULT_MAX_SENDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            strict_attempts: false,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
        }
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.resend_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_sends(mut self, max_sends: u32) -> Self {
        self.max_sends = max_sends;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Reserve attempts with an atomic store increment before comparing codes.
    #[must_use]
    pub fn with_strict_attempts(mut self, strict: bool) -> Self {
        self.strict_attempts = strict;
        self
    }

    #[must_use]
    pub fn with_mail_from(mut self, mail_from: String) -> Self {
        self.mail_from = mail_from;
        self
    }

    /// `None` when the configured lifetime does not fit a [`Duration`].
    #[must_use]
    pub fn code_ttl(&self) -> Option<Duration> {
        Duration::try_seconds(self.code_ttl_seconds)
    }

    /// Out-of-range cooldowns saturate, which throttles every resend.
    #[must_use]
    pub fn resend_cooldown(&self) -> Duration {
        Duration::try_seconds(self.resend_cooldown_seconds).unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn max_sends(&self) -> u32 {
        self.max_sends
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn strict_attempts(&self) -> bool {
        self.strict_attempts
    }

    #[must_use]
    pub fn mail_from(&self) -> &str {
        &self.mail_from
    }

    #[must_use]
    pub fn mail_subject(&self) -> &str {
        MAIL_SUBJECT
    }

    /// Body of the outbound message carrying the plaintext code.
    ///
    /// Partial minutes round up so the stated lifetime is never shorter than the real one.
    #[must_use]
    pub fn mail_text(&self, code: &str) -> String {
        let minutes = self.code_ttl_seconds.saturating_add(59) / 60;
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        format!("Your OTP is {code}. It expires in {minutes} {unit}. Do not share it.")
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults_and_overrides() {
        let policy = OtpPolicy::new();
        assert_eq!(policy.code_ttl(), Some(Duration::minutes(15)));
        assert_eq!(policy.resend_cooldown(), Duration::seconds(60));
        assert_eq!(policy.max_sends(), 5);
        assert_eq!(policy.max_attempts(), 5);
        assert!(!policy.strict_attempts());
        assert_eq!(policy.mail_from(), DEFAULT_MAIL_FROM);

        let policy = policy
            .with_code_ttl_seconds(300)
            .with_resend_cooldown_seconds(30)
            .with_max_sends(3)
            .with_max_attempts(10)
            .with_strict_attempts(true)
            .with_mail_from("otp@example.com".to_string());

        assert_eq!(policy.code_ttl(), Some(Duration::minutes(5)));
        assert_eq!(policy.resend_cooldown(), Duration::seconds(30));
        assert_eq!(policy.max_sends(), 3);
        assert_eq!(policy.max_attempts(), 10);
        assert!(policy.strict_attempts());
        assert_eq!(policy.mail_from(), "otp@example.com");
    }

    #[test]
    fn mail_text_mentions_code_and_lifetime() {
        let text = OtpPolicy::new().mail_text("123456");
        assert_eq!(
            text,
            "Your OTP is 123456. It expires in 15 minutes. Do not share it."
        );
    }

    #[test]
    fn mail_text_rounds_partial_minutes_up() {
        let text = |seconds| {
            OtpPolicy::new()
                .with_code_ttl_seconds(seconds)
                .mail_text("123456")
        };
        assert!(text(30).contains("expires in 1 minute."));
        assert!(text(60).contains("expires in 1 minute."));
        assert!(text(61).contains("expires in 2 minutes."));
        assert!(text(899).contains("expires in 15 minutes."));
    }

    #[test]
    fn oversized_windows_do_not_panic() {
        let policy = OtpPolicy::new()
            .with_code_ttl_seconds(i64::MAX)
            .with_resend_cooldown_seconds(i64::MAX);
        assert_eq!(policy.code_ttl(), None);
        assert_eq!(policy.resend_cooldown(), Duration::MAX);
    }
}
