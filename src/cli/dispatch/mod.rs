//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, currently only the API
//! server with its store, mailer and OTP policy settings.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{delivery, otp};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty());

    let otp_opts = otp::Options::parse(matches)?;
    let delivery_opts = delivery::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        mailer: delivery_opts.mailer,
        resend_api_key: delivery_opts.resend_api_key,
        resend_api_url: delivery_opts.resend_api_url,
        mail_from: delivery_opts.mail_from,
        mail_timeout_seconds: delivery_opts.timeout_seconds,
        otp_ttl_seconds: otp_opts.ttl_seconds,
        otp_resend_cooldown_seconds: otp_opts.resend_cooldown_seconds,
        otp_max_sends: otp_opts.max_sends,
        otp_max_attempts: otp_opts.max_attempts,
        otp_strict_attempts: otp_opts.strict_attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::delivery::MailerKind;

    #[test]
    fn resend_api_key_required() {
        temp_env::with_vars(
            [
                ("OTPD_MAILER", Some("resend")),
                ("OTPD_RESEND_API_KEY", None::<&str>),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["otpd"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --resend-api-key"));
                }
            },
        );
    }

    #[test]
    fn server_args_from_flags() {
        temp_env::with_vars(
            [
                ("OTPD_DSN", None::<&str>),
                ("OTPD_MAILER", None),
                ("OTPD_OTP_STRICT_ATTEMPTS", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec![
                    "otpd",
                    "--port",
                    "3000",
                    "--otp-max-sends",
                    "3",
                    "--otp-strict-attempts",
                ]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 3000);
                    assert!(args.dsn.is_none());
                    assert_eq!(args.mailer, MailerKind::Log);
                    assert_eq!(args.otp_max_sends, 3);
                    assert_eq!(args.otp_max_attempts, 5);
                    assert!(args.otp_strict_attempts);
                }
            },
        );
    }

    #[test]
    fn empty_dsn_env_means_memory_store() {
        temp_env::with_vars([("OTPD_DSN", Some(""))], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["otpd"]);
            if let Ok(Action::Server(args)) = handler(&matches) {
                assert!(args.dsn.is_none());
            }
        });
    }
}
