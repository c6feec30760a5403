use anyhow::{bail, Context, Result};
use clap::{builder::PossibleValuesParser, Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

use crate::{delivery::resend::DEFAULT_API_URL, otp::policy::DEFAULT_MAIL_FROM};

pub const ARG_MAILER: &str = "mailer";
pub const ARG_RESEND_API_KEY: &str = "resend-api-key";
pub const ARG_RESEND_API_URL: &str = "resend-api-url";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MAIL_TIMEOUT_SECONDS: &str = "mail-timeout-seconds";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailerKind {
    Log,
    Resend,
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAILER)
                .long(ARG_MAILER)
                .help("Outbound email sender: log (development) or resend")
                .env("OTPD_MAILER")
                .default_value("log")
                .value_parser(PossibleValuesParser::new(["log", "resend"])),
        )
        .arg(
            Arg::new(ARG_RESEND_API_KEY)
                .long(ARG_RESEND_API_KEY)
                .help("Resend API key, required with --mailer resend")
                .env("OTPD_RESEND_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_RESEND_API_URL)
                .long(ARG_RESEND_API_URL)
                .help("Resend send-email endpoint")
                .env("OTPD_RESEND_API_URL")
                .default_value(DEFAULT_API_URL),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address of OTP emails")
                .env("OTPD_MAIL_FROM")
                .default_value(DEFAULT_MAIL_FROM),
        )
        .arg(
            Arg::new(ARG_MAIL_TIMEOUT_SECONDS)
                .long(ARG_MAIL_TIMEOUT_SECONDS)
                .help("Timeout for a single delivery request in seconds")
                .env("OTPD_MAIL_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub mailer: MailerKind,
    pub resend_api_key: Option<SecretString>,
    pub resend_api_url: Url,
    pub mail_from: String,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse delivery arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the Resend key is missing for the Resend mailer or
    /// the API URL is invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let mailer = match matches.get_one::<String>(ARG_MAILER).map(String::as_str) {
            Some("resend") => MailerKind::Resend,
            _ => MailerKind::Log,
        };

        // Env vars set to "" come through as empty strings.
        let resend_api_key = matches
            .get_one::<String>(ARG_RESEND_API_KEY)
            .filter(|value| !value.trim().is_empty())
            .map(|value| SecretString::from(value.trim().to_string()));

        if mailer == MailerKind::Resend && resend_api_key.is_none() {
            bail!("missing required argument: --{ARG_RESEND_API_KEY}");
        }

        let resend_api_url = matches
            .get_one::<String>(ARG_RESEND_API_URL)
            .map_or(DEFAULT_API_URL, String::as_str);
        let resend_api_url = Url::parse(resend_api_url)
            .with_context(|| format!("invalid --{ARG_RESEND_API_URL}: {resend_api_url}"))?;

        let mail_from = matches
            .get_one::<String>(ARG_MAIL_FROM)
            .cloned()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string());

        let timeout_seconds = matches
            .get_one::<u64>(ARG_MAIL_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(10);

        Ok(Self {
            mailer,
            resend_api_key,
            resend_api_url,
            mail_from,
            timeout_seconds,
        })
    }
}
