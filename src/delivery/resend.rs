//! Resend (<https://resend.com>) HTTP API sender.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::{DeliveryError, Mailer, OutboundEmail};
use crate::APP_USER_AGENT;

pub const DEFAULT_API_URL: &str = "https://api.resend.com/emails";

#[derive(Serialize, Debug)]
struct SendEmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl<'a> From<&'a OutboundEmail> for SendEmailPayload<'a> {
    fn from(message: &'a OutboundEmail) -> Self {
        Self {
            from: &message.from,
            to: [&message.to],
            subject: &message.subject,
            text: &message.text,
        }
    }
}

pub struct ResendMailer {
    client: Client,
    api_url: Url,
    api_key: SecretString,
}

impl ResendMailer {
    /// Build a sender with a bounded request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: Url, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Error creating reqwest client")?;

        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }
}

impl std::fmt::Debug for ResendMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendMailer")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &OutboundEmail) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.api_url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(&SendEmailPayload::from(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "email accepted by provider");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "email provider rejected message");

        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
