//! Outbound email delivery.
//!
//! The OTP service hands a fully rendered message to a `Mailer` and only
//! cares whether delivery succeeded. `LogMailer` is the local development
//! sender; `ResendMailer` posts to the Resend transactional email API.

pub mod log;
pub mod resend;

pub use log::LogMailer;
pub use resend::ResendMailer;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The provider answered with a non-success status.
    #[error("email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("email transport failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Diagnostic returned to callers: the provider's response body when it
    /// answered, the transport error otherwise.
    #[must_use]
    pub fn trace(&self) -> String {
        match self {
            Self::Rejected { body, .. } => body.clone(),
            Self::Transport(err) => err.to_string(),
        }
    }
}

/// Email delivery abstraction used by the OTP service.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or report why it could not be delivered.
    async fn send(&self, message: &OutboundEmail) -> Result<(), DeliveryError>;
}
