use crate::{
    api,
    cli::commands::delivery::MailerKind,
    delivery::{LogMailer, Mailer, ResendMailer},
    otp::{OtpPolicy, OtpService},
    store::{MemoryStore, OtpStore, PgStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub mailer: MailerKind,
    pub resend_api_key: Option<SecretString>,
    pub resend_api_url: Url,
    pub mail_from: String,
    pub mail_timeout_seconds: u64,
    pub otp_ttl_seconds: i64,
    pub otp_resend_cooldown_seconds: i64,
    pub otp_max_sends: u32,
    pub otp_max_attempts: u32,
    pub otp_strict_attempts: bool,
}

impl Args {
    fn policy(&self) -> OtpPolicy {
        OtpPolicy::new()
            .with_code_ttl_seconds(self.otp_ttl_seconds)
            .with_resend_cooldown_seconds(self.otp_resend_cooldown_seconds)
            .with_max_sends(self.otp_max_sends)
            .with_max_attempts(self.otp_max_attempts)
            .with_strict_attempts(self.otp_strict_attempts)
            .with_mail_from(self.mail_from.clone())
    }

    fn mailer(&self) -> Result<Arc<dyn Mailer>> {
        match self.mailer {
            MailerKind::Log => {
                warn!("Using the log mailer, OTP emails are written to the log only");
                Ok(Arc::new(LogMailer))
            }
            MailerKind::Resend => {
                let api_key = self
                    .resend_api_key
                    .clone()
                    .context("missing required argument: --resend-api-key")?;
                let mailer = ResendMailer::new(
                    self.resend_api_url.clone(),
                    api_key,
                    Duration::from_secs(self.mail_timeout_seconds),
                )?;
                Ok(Arc::new(mailer))
            }
        }
    }

    async fn store(&self) -> Result<Arc<dyn OtpStore>> {
        match &self.dsn {
            Some(dsn) => {
                let store = PgStore::connect(dsn)
                    .await
                    .context("Failed to connect to database")?;
                info!("Using PostgreSQL otp store");
                Ok(Arc::new(store))
            }
            None => {
                warn!("No --dsn given, OTP records are kept in memory");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store or mailer cannot be set up, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let policy = args.policy();
    let mailer = args.mailer()?;
    let store = args.store().await?;

    let service = Arc::new(OtpService::new(policy, store, mailer));

    api::new(args.port, service).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(mailer: MailerKind, resend_api_key: Option<&str>) -> Result<Args> {
        Ok(Args {
            port: 8080,
            dsn: None,
            mailer,
            resend_api_key: resend_api_key.map(|key| SecretString::from(key.to_string())),
            resend_api_url: Url::parse(crate::delivery::resend::DEFAULT_API_URL)?,
            mail_from: "OTP <otp@example.com>".to_string(),
            mail_timeout_seconds: 5,
            otp_ttl_seconds: 600,
            otp_resend_cooldown_seconds: 30,
            otp_max_sends: 3,
            otp_max_attempts: 4,
            otp_strict_attempts: true,
        })
    }

    #[test]
    fn policy_follows_args() -> Result<()> {
        let policy = args(MailerKind::Log, None)?.policy();
        assert_eq!(policy.code_ttl(), Some(chrono::Duration::minutes(10)));
        assert_eq!(policy.resend_cooldown(), chrono::Duration::seconds(30));
        assert_eq!(policy.max_sends(), 3);
        assert_eq!(policy.max_attempts(), 4);
        assert!(policy.strict_attempts());
        assert_eq!(policy.mail_from(), "OTP <otp@example.com>");
        Ok(())
    }

    #[test]
    fn resend_mailer_needs_a_key() -> Result<()> {
        assert!(args(MailerKind::Resend, None)?.mailer().is_err());
        assert!(args(MailerKind::Resend, Some("re_123"))?.mailer().is_ok());
        assert!(args(MailerKind::Log, None)?.mailer().is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn missing_dsn_uses_memory_store() -> Result<()> {
        let store = args(MailerKind::Log, None)?.store().await?;
        store.ping().await?;
        assert!(store.get("missing").await?.is_none());
        Ok(())
    }
}
