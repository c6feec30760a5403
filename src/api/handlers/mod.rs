//! HTTP handlers for the OTP endpoints and service probes.

pub mod health;
pub mod otp;
pub mod types;

pub use self::health::health;
pub use self::otp::{send_otp, verify_otp};
