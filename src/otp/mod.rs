//! Email OTP issuance and verification.

pub mod clock;
pub mod crypto;
pub mod error;
pub mod policy;
pub mod service;

pub use clock::{Clock, SystemClock};
pub use crypto::{OsRandom, RandomSource};
pub use error::{ErrorBody, ErrorKind, OtpError};
pub use policy::OtpPolicy;
pub use service::OtpService;
