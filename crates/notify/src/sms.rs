//! SMS channel: a single webhook provider, logging as the terminal
//! step.

use async_trait::async_trait;
use domain::CanonicalPhone;
use reqwest::Client;

use crate::config::SmsConfig;
use crate::error::NotifyError;
use crate::provider::{DispatchOutcome, OutboundMessage, Provider, attempt_chain};

/// Posts `{"to","from","message"}` to a generic SMS webhook.
pub struct SmsWebhookProvider {
    client: Client,
    url: Option<String>,
    sender: String,
}

impl SmsWebhookProvider {
    pub fn new(client: Client, url: Option<String>, sender: impl Into<String>) -> Self {
        Self {
            client,
            url,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Provider for SmsWebhookProvider {
    fn name(&self) -> &'static str {
        "sms-webhook"
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn attempt(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let url = self.url.as_deref().ok_or(NotifyError::NotConfigured)?;

        let payload = serde_json::json!({
            "to": to,
            "from": self.sender,
            "message": message.text,
        });

        let response = self.client.post(url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// The SMS channel.
pub struct SmsChannel {
    providers: Vec<Box<dyn Provider>>,
}

impl SmsChannel {
    /// Builds the production chain from configuration.
    pub fn new(config: &SmsConfig, client: Client) -> Self {
        Self {
            providers: vec![Box::new(SmsWebhookProvider::new(
                client,
                config.webhook_url.clone(),
                config.sender.clone(),
            ))],
        }
    }

    /// Builds a channel over an explicit provider chain.
    pub fn with_providers(providers: Vec<Box<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// True when at least one provider could deliver.
    pub fn is_configured(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    /// Tries the chain; the terminal step logs the intended payload.
    pub async fn dispatch(&self, to: &CanonicalPhone, message: &OutboundMessage) -> DispatchOutcome {
        if let Some(via) = attempt_chain("sms", &self.providers, to.as_str(), message).await {
            return DispatchOutcome::sent_via(via);
        }

        tracing::info!(to = %to, text = %message.text, "sms not delivered; payload logged for manual follow-up");
        DispatchOutcome::fallback(None)
    }
}
