use async_trait::async_trait;
use tracing::info;

use super::{DeliveryError, Mailer, OutboundEmail};

/// Local dev sender that logs the message instead of sending real email.
///
/// The log line is the delivery channel here, so it carries the message text.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &OutboundEmail) -> Result<(), DeliveryError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            text = %message.text,
            "email send stub"
        );
        Ok(())
    }
}
