//! Email channel: HTTPS webhook first, direct SMTP second.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;

use crate::config::{EmailConfig, SmtpConfig};
use crate::error::NotifyError;
use crate::provider::{DispatchOutcome, OutboundMessage, Provider, attempt_chain};

/// Posts `{"to","from","subject","text"}` to a generic email webhook.
///
/// First in the chain: an HTTPS webhook works from hosts whose egress
/// blocks SMTP ports outright.
pub struct EmailWebhookProvider {
    client: Client,
    url: Option<String>,
    from: String,
}

impl EmailWebhookProvider {
    pub fn new(client: Client, url: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client,
            url,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Provider for EmailWebhookProvider {
    fn name(&self) -> &'static str {
        "email-webhook"
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn attempt(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let url = self.url.as_deref().ok_or(NotifyError::NotConfigured)?;

        let payload = serde_json::json!({
            "to": to,
            "from": self.from,
            "subject": message.subject.as_deref().unwrap_or_default(),
            "text": message.text,
        });

        let response = self.client.post(url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Sends through an SMTP relay using lettre.
pub struct SmtpProvider {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl SmtpProvider {
    pub fn new(config: Option<&SmtpConfig>, from: impl Into<String>, timeout: Duration) -> Self {
        let transport = config.and_then(|smtp| {
            match AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host) {
                Ok(builder) => Some(
                    builder
                        .credentials(Credentials::new(
                            smtp.username.clone(),
                            smtp.password.clone(),
                        ))
                        .port(smtp.port)
                        .timeout(Some(timeout))
                        .build(),
                ),
                Err(err) => {
                    tracing::warn!(%err, host = %smtp.host, "invalid SMTP relay host, provider disabled");
                    None
                }
            }
        });

        Self {
            transport,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Provider for SmtpProvider {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    async fn attempt(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let transport = self.transport.as_ref().ok_or(NotifyError::NotConfigured)?;

        let from: Mailbox = self
            .from
            .parse()
            .map_err(|err| NotifyError::Mail(format!("invalid from address: {err}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|err| NotifyError::Mail(format!("invalid to address: {err}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_deref().unwrap_or_default())
            .body(message.text.clone())
            .map_err(|err| NotifyError::Mail(err.to_string()))?;

        transport
            .send(email)
            .await
            .map_err(|err| NotifyError::Mail(err.to_string()))?;
        Ok(())
    }
}

/// The email channel: webhook, then SMTP, then logging.
pub struct EmailChannel {
    providers: Vec<Box<dyn Provider>>,
}

impl EmailChannel {
    /// Builds the production chain from configuration.
    pub fn new(
        config: &EmailConfig,
        mail_from: &str,
        client: Client,
        timeout: Duration,
    ) -> Self {
        Self {
            providers: vec![
                Box::new(EmailWebhookProvider::new(
                    client,
                    config.webhook_url.clone(),
                    mail_from,
                )),
                Box::new(SmtpProvider::new(config.smtp.as_ref(), mail_from, timeout)),
            ],
        }
    }

    /// Builds a channel over an explicit provider chain.
    pub fn with_providers(providers: Vec<Box<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// True when at least one provider could deliver. Pure function of
    /// configuration, independent of any send attempt.
    pub fn is_configured(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    /// Tries the chain; the terminal step logs the intended payload so
    /// an operator can follow up by hand.
    pub async fn dispatch(&self, to: &str, message: &OutboundMessage) -> DispatchOutcome {
        if let Some(via) = attempt_chain("email", &self.providers, to, message).await {
            return DispatchOutcome::sent_via(via);
        }

        tracing::info!(
            to,
            subject = message.subject.as_deref().unwrap_or_default(),
            text = %message.text,
            "email not delivered by any provider; payload logged for manual follow-up"
        );
        DispatchOutcome::fallback(None)
    }
}
