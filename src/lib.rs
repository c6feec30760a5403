//! # otpd (Email One-Time Passcodes)
//!
//! `otpd` issues and verifies short-lived numeric passcodes that prove control
//! of an email address during signup. It exposes two JSON endpoints:
//!
//! - `POST /send-otp` generates a 6-digit code, stores only a salted SHA-256
//!   digest of it and mails the plaintext to the address.
//! - `POST /verify-otp` recomputes the digest for a candidate code and marks
//!   the stored record as consumed on the first match.
//!
//! ## Abuse Controls
//!
//! - **Throttle:** one issuance per address every 60 seconds.
//! - **Quota:** at most 5 issuances per address (lifetime-cumulative).
//! - **Expiry:** codes are valid for 15 minutes.
//! - **Attempts:** 5 failed comparisons exhaust a code until a new one is issued.
//!
//! ## Storage
//!
//! Records are addressed by `hex(sha256(normalized_email))` so the address is
//! never the lookup key. Writes are field-level merges: fields not named by an
//! update are preserved. There is no locking across requests; two concurrent
//! verifications may both pass the attempt check before either writes, so the
//! attempt limit can be undercounted by the degree of concurrency. Enable
//! `--otp-strict-attempts` to reserve attempts atomically instead.

pub mod api;
pub mod cli;
pub mod delivery;
pub mod otp;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
