use anyhow::Result;
use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};

pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_OTP_RESEND_COOLDOWN_SECONDS: &str = "otp-resend-cooldown-seconds";
pub const ARG_OTP_MAX_SENDS: &str = "otp-max-sends";
pub const ARG_OTP_MAX_ATTEMPTS: &str = "otp-max-attempts";
pub const ARG_OTP_STRICT_ATTEMPTS: &str = "otp-strict-attempts";

const MAX_WINDOW_SECONDS: i64 = 86_400;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("Lifetime of an issued code in seconds (at most one day)")
                .env("OTPD_OTP_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_WINDOW_SECONDS)),
        )
        .arg(
            Arg::new(ARG_OTP_RESEND_COOLDOWN_SECONDS)
                .long(ARG_OTP_RESEND_COOLDOWN_SECONDS)
                .help("Minimum delay between two issuances for the same address (at most one day)")
                .env("OTPD_OTP_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64).range(0..=MAX_WINDOW_SECONDS)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_SENDS)
                .long(ARG_OTP_MAX_SENDS)
                .help("Maximum number of issuances per address")
                .env("OTPD_OTP_MAX_SENDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_ATTEMPTS)
                .long(ARG_OTP_MAX_ATTEMPTS)
                .help("Failed comparisons allowed before a code is exhausted")
                .env("OTPD_OTP_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_OTP_STRICT_ATTEMPTS)
                .long(ARG_OTP_STRICT_ATTEMPTS)
                .help("Reserve each attempt atomically before comparing codes")
                .long_help(
                    "Reserve each attempt with an atomic store increment before comparing codes. Closes the concurrent attempt undercount, but successful comparisons count as attempts too.",
                )
                .env("OTPD_OTP_STRICT_ATTEMPTS")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}

#[derive(Debug)]
pub struct Options {
    pub ttl_seconds: i64,
    pub resend_cooldown_seconds: i64,
    pub max_sends: u32,
    pub max_attempts: u32,
    pub strict_attempts: bool,
}

impl Options {
    /// Parse OTP policy arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let required = |id: &str| -> Result<i64> {
            matches
                .get_one::<i64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let required_u32 = |id: &str| -> Result<u32> {
            matches
                .get_one::<u32>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            ttl_seconds: required(ARG_OTP_TTL_SECONDS)?,
            resend_cooldown_seconds: required(ARG_OTP_RESEND_COOLDOWN_SECONDS)?,
            max_sends: required_u32(ARG_OTP_MAX_SENDS)?,
            max_attempts: required_u32(ARG_OTP_MAX_ATTEMPTS)?,
            strict_attempts: matches.get_flag(ARG_OTP_STRICT_ATTEMPTS),
        })
    }
}
