//! WhatsApp channel: two full gateways, a personal-number text API,
//! and the `wa.me` deep-link fallback.

use std::time::Duration;

use async_trait::async_trait;
use domain::CanonicalPhone;
use reqwest::Client;

use crate::config::{CallMeBotConfig, ChatApiConfig, GreenApiConfig, WhatsAppConfig};
use crate::error::NotifyError;
use crate::provider::{DispatchOutcome, OutboundMessage, Provider, attempt_chain};

/// Pause between consecutive file sends so gateways keep the images in
/// order.
const FILE_SEND_PACING: Duration = Duration::from_millis(500);

/// Builds the credential-free `wa.me` deep link for a pre-filled
/// message. Always possible: it needs only a destination and text.
pub fn wa_link(phone: &CanonicalPhone, text: &str) -> String {
    match reqwest::Url::parse_with_params(
        &format!("https://wa.me/{}", phone.as_str()),
        &[("text", text)],
    ) {
        Ok(url) => url.to_string(),
        // Unreachable with digits-only input; keep the bare link rather
        // than lose the artifact.
        Err(_) => format!("https://wa.me/{}", phone.as_str()),
    }
}

/// Green API-style gateway: `chatId`-addressed text and file-by-URL
/// sends.
pub struct GreenApiProvider {
    client: Client,
    config: Option<GreenApiConfig>,
}

impl GreenApiProvider {
    pub fn new(client: Client, config: Option<GreenApiConfig>) -> Self {
        Self { client, config }
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for GreenApiProvider {
    fn name(&self) -> &'static str {
        "green-api"
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn attempt(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let config = self.config.as_ref().ok_or(NotifyError::NotConfigured)?;
        let chat_id = format!("{to}@c.us");

        let text_url = format!(
            "{}/waInstance{}/sendMessage/{}",
            config.base_url, config.instance_id, config.api_token
        );
        self.post_json(
            &text_url,
            &serde_json::json!({ "chatId": chat_id, "message": message.text }),
        )
        .await?;

        // Images are best-effort on top of a delivered text.
        let file_url = format!(
            "{}/waInstance{}/sendFileByUrl/{}",
            config.base_url, config.instance_id, config.api_token
        );
        for image_url in &message.image_urls {
            let payload = serde_json::json!({
                "chatId": chat_id,
                "urlFile": image_url,
                "fileName": "product.jpg",
                "caption": "",
            });
            if let Err(err) = self.post_json(&file_url, &payload).await {
                tracing::warn!(provider = self.name(), %err, %image_url, "image send failed");
            }
            tokio::time::sleep(FILE_SEND_PACING).await;
        }

        Ok(())
    }
}

/// Chat API-style gateway: `phone`/`body`-addressed text and file
/// sends.
pub struct ChatApiProvider {
    client: Client,
    config: Option<ChatApiConfig>,
}

impl ChatApiProvider {
    pub fn new(client: Client, config: Option<ChatApiConfig>) -> Self {
        Self { client, config }
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for ChatApiProvider {
    fn name(&self) -> &'static str {
        "chat-api"
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn attempt(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let config = self.config.as_ref().ok_or(NotifyError::NotConfigured)?;

        let text_url = format!(
            "{}/instance{}/sendMessage?token={}",
            config.base_url, config.instance, config.token
        );
        self.post_json(
            &text_url,
            &serde_json::json!({ "phone": to, "body": message.text }),
        )
        .await?;

        let file_url = format!(
            "{}/instance{}/sendFile?token={}",
            config.base_url, config.instance, config.token
        );
        for image_url in &message.image_urls {
            let payload = serde_json::json!({
                "phone": to,
                "body": image_url,
                "filename": "product.jpg",
            });
            if let Err(err) = self.post_json(&file_url, &payload).await {
                tracing::warn!(provider = self.name(), %err, %image_url, "image send failed");
            }
            tokio::time::sleep(FILE_SEND_PACING).await;
        }

        Ok(())
    }
}

/// CallMeBot-style "message via my own registered number" API. Text
/// only; success is judged from the response body, not just the status.
pub struct CallMeBotProvider {
    client: Client,
    config: Option<CallMeBotConfig>,
}

impl CallMeBotProvider {
    pub fn new(client: Client, config: Option<CallMeBotConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Provider for CallMeBotProvider {
    fn name(&self) -> &'static str {
        "callmebot"
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn attempt(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        let config = self.config.as_ref().ok_or(NotifyError::NotConfigured)?;

        let response = self
            .client
            .get(format!("{}/whatsapp.php", config.base_url))
            .query(&[
                ("phone", to),
                ("text", message.text.as_str()),
                ("apikey", config.api_key.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::UnexpectedStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        if body.contains("OK") || body.contains("sent") || body.contains("200") {
            Ok(())
        } else {
            Err(NotifyError::Rejected(body))
        }
    }
}

/// The WhatsApp channel. The fallback deep link needs no credentials,
/// so `dispatch` always yields a usable artifact.
pub struct WhatsAppChannel {
    providers: Vec<Box<dyn Provider>>,
}

impl WhatsAppChannel {
    /// Builds the production chain from configuration.
    pub fn new(config: &WhatsAppConfig, client: Client) -> Self {
        Self {
            providers: vec![
                Box::new(GreenApiProvider::new(client.clone(), config.green_api.clone())),
                Box::new(ChatApiProvider::new(client.clone(), config.chat_api.clone())),
                Box::new(CallMeBotProvider::new(client, config.callmebot.clone())),
            ],
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

    /// Tries the chain; on exhaustion returns the `wa.me` deep link for
    /// manual completion.
    pub async fn dispatch(&self, to: &CanonicalPhone, message: &OutboundMessage) -> DispatchOutcome {
        if let Some(via) = attempt_chain("whatsapp", &self.providers, to.as_str(), message).await {
            return DispatchOutcome::sent_via(via);
        }

        let link = wa_link(to, &message.text);
        tracing::info!(to = %to, url = %link, "whatsapp not delivered by any provider; share the deep link manually");
        DispatchOutcome::fallback(Some(link))
    }
}
