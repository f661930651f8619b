//! Notification configuration loaded from environment variables.

use std::time::Duration;

/// SMTP relay credentials for the direct-mail provider.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Email channel configuration. The webhook is preferred when both are
/// present: it survives hosts whose egress blocks SMTP ports.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub webhook_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
}

/// Green API-style WhatsApp gateway (text plus file-by-URL sends).
#[derive(Debug, Clone)]
pub struct GreenApiConfig {
    pub base_url: String,
    pub instance_id: String,
    pub api_token: String,
}

/// Chat API-style WhatsApp gateway (text plus file-by-URL sends).
#[derive(Debug, Clone)]
pub struct ChatApiConfig {
    pub base_url: String,
    pub instance: String,
    pub token: String,
}

/// CallMeBot-style "send via my own registered number" API. Text only.
#[derive(Debug, Clone)]
pub struct CallMeBotConfig {
    pub base_url: String,
    pub api_key: String,
}

/// WhatsApp channel configuration, in chain order.
#[derive(Debug, Clone, Default)]
pub struct WhatsAppConfig {
    pub green_api: Option<GreenApiConfig>,
    pub chat_api: Option<ChatApiConfig>,
    pub callmebot: Option<CallMeBotConfig>,
}

/// SMS channel configuration.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub webhook_url: Option<String>,
    /// Sender id stamped into the webhook payload.
    pub sender: String,
}

/// Configuration for the whole notification subsystem.
///
/// Reads from environment variables:
/// - `STORE_NAME` — display name used in message templates
/// - `FRONTEND_URL` — base for customer tracking links
/// - `PUBLIC_BASE_URL` — base for resolving relative product image paths
/// - `MAIL_FROM` — sender address for outbound email
/// - `ADMIN_NOTIFICATION_EMAILS` — comma-separated admin recipients
/// - `ADMIN_WHATSAPP` — admin WhatsApp number (any dialable form)
/// - `EMAIL_WEBHOOK_URL`, `SMTP_HOST`/`SMTP_PORT`/`SMTP_USERNAME`/`SMTP_PASSWORD`
/// - `GREEN_API_BASE_URL`/`GREEN_API_INSTANCE_ID`/`GREEN_API_TOKEN`
/// - `CHAT_API_BASE_URL`/`CHAT_API_INSTANCE`/`CHAT_API_TOKEN`
/// - `CALLMEBOT_BASE_URL`/`CALLMEBOT_API_KEY`
/// - `SMS_WEBHOOK_URL`, `SMS_SENDER`
/// - `NOTIFY_TIMEOUT_SECS` — per-provider HTTP timeout (default 10)
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub store_name: String,
    pub frontend_url: String,
    pub public_base_url: String,
    pub mail_from: String,
    pub admin_notification_emails: Vec<String>,
    pub admin_whatsapp: Option<String>,
    pub email: EmailConfig,
    pub whatsapp: WhatsAppConfig,
    pub sms: SmsConfig,
    /// Bounded timeout applied to every provider HTTP call.
    pub provider_timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            store_name: "Storefront".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            mail_from: String::new(),
            admin_notification_emails: Vec::new(),
            admin_whatsapp: None,
            email: EmailConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            sms: SmsConfig {
                webhook_url: None,
                sender: "Storefront".to_string(),
            },
            provider_timeout: Duration::from_secs(10),
        }
    }
}

impl NotifyConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults. Providers missing any required value stay unconfigured.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let store_name = env_opt("STORE_NAME").unwrap_or(defaults.store_name);

        let smtp = match (
            env_opt("SMTP_HOST"),
            env_opt("SMTP_USERNAME"),
            env_opt("SMTP_PASSWORD"),
        ) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                host,
                port: env_opt("SMTP_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                username,
                password,
            }),
            _ => None,
        };

        let green_api = match (env_opt("GREEN_API_INSTANCE_ID"), env_opt("GREEN_API_TOKEN")) {
            (Some(instance_id), Some(api_token)) => Some(GreenApiConfig {
                base_url: env_opt("GREEN_API_BASE_URL")
                    .unwrap_or_else(|| "https://api.green-api.com".to_string()),
                instance_id,
                api_token,
            }),
            _ => None,
        };

        let chat_api = match (env_opt("CHAT_API_INSTANCE"), env_opt("CHAT_API_TOKEN")) {
            (Some(instance), Some(token)) => Some(ChatApiConfig {
                base_url: env_opt("CHAT_API_BASE_URL")
                    .unwrap_or_else(|| "https://api.chat-api.com".to_string()),
                instance,
                token,
            }),
            _ => None,
        };

        let callmebot = env_opt("CALLMEBOT_API_KEY").map(|api_key| CallMeBotConfig {
            base_url: env_opt("CALLMEBOT_BASE_URL")
                .unwrap_or_else(|| "https://api.callmebot.com".to_string()),
            api_key,
        });

        Self {
            frontend_url: env_opt("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            public_base_url: env_opt("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            mail_from: env_opt("MAIL_FROM").unwrap_or_default(),
            admin_notification_emails: env_opt("ADMIN_NOTIFICATION_EMAILS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            admin_whatsapp: env_opt("ADMIN_WHATSAPP"),
            email: EmailConfig {
                webhook_url: env_opt("EMAIL_WEBHOOK_URL"),
                smtp,
            },
            whatsapp: WhatsAppConfig {
                green_api,
                chat_api,
                callmebot,
            },
            sms: SmsConfig {
                webhook_url: env_opt("SMS_WEBHOOK_URL"),
                sender: env_opt("SMS_SENDER").unwrap_or_else(|| store_name.clone()),
            },
            provider_timeout: Duration::from_secs(
                env_opt("NOTIFY_TIMEOUT_SECS")
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(10),
            ),
            store_name,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
