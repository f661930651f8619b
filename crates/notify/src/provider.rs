//! The uniform provider contract and the chain walk shared by all
//! channels.

use async_trait::async_trait;

use crate::error::NotifyError;

/// A channel-agnostic message: subject (email only), body text, and
/// optional product image URLs for providers that can send files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: Option<String>,
    pub text: String,
    pub image_urls: Vec<String>,
}

impl OutboundMessage {
    /// A plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            subject: None,
            text: text.into(),
            image_urls: Vec::new(),
        }
    }

    /// Sets the subject line.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches image URLs for file-capable providers.
    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }
}

/// One concrete external service capable of performing a send.
///
/// `attempt` makes exactly one try with a bounded timeout; there is no
/// retry layer on top, the ordered chain of alternatives substitutes
/// for retries. `is_configured` is a pure function of configuration,
/// independent of any send attempt.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name, used in outcomes, logs, and metrics.
    fn name(&self) -> &'static str;

    /// Whether the provider has the credentials/endpoint it needs.
    fn is_configured(&self) -> bool;

    /// Makes a single delivery attempt to `to` (an email address or
    /// canonical phone digits, depending on the channel).
    async fn attempt(&self, to: &str, message: &OutboundMessage) -> Result<(), NotifyError>;
}

/// The result a channel reports for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// True when some provider accepted the message.
    pub sent: bool,
    /// Name of the provider that accepted it.
    pub via: Option<&'static str>,
    /// Manual-action artifact produced by the terminal fallback (a
    /// pre-filled `wa.me` deep link for WhatsApp; absent for channels
    /// whose fallback is logging).
    pub fallback_url: Option<String>,
}

impl DispatchOutcome {
    /// A successful delivery through the named provider.
    pub fn sent_via(provider: &'static str) -> Self {
        Self {
            sent: true,
            via: Some(provider),
            fallback_url: None,
        }
    }

    /// The terminal fallback: nothing delivered, optionally a manual
    /// artifact for the caller.
    pub fn fallback(fallback_url: Option<String>) -> Self {
        Self {
            sent: false,
            via: None,
            fallback_url,
        }
    }
}

/// Walks the chain in order and returns the first provider that
/// accepted the message, or `None` when the chain is exhausted.
/// Unconfigured providers are skipped; failures are logged and counted,
/// never propagated.
pub(crate) async fn attempt_chain(
    channel: &'static str,
    providers: &[Box<dyn Provider>],
    to: &str,
    message: &OutboundMessage,
) -> Option<&'static str> {
    for provider in providers {
        if !provider.is_configured() {
            tracing::debug!(channel, provider = provider.name(), "provider not configured, skipping");
            continue;
        }

        match provider.attempt(to, message).await {
            Ok(()) => {
                metrics::counter!(
                    "notification_attempts_total",
                    "channel" => channel,
                    "provider" => provider.name(),
                    "outcome" => "sent",
                )
                .increment(1);
                tracing::info!(channel, provider = provider.name(), to, "notification sent");
                return Some(provider.name());
            }
            Err(err) => {
                metrics::counter!(
                    "notification_attempts_total",
                    "channel" => channel,
                    "provider" => provider.name(),
                    "outcome" => "failed",
                )
                .increment(1);
                tracing::warn!(
                    channel,
                    provider = provider.name(),
                    %err,
                    "provider attempt failed, trying next in chain"
                );
            }
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Scripted provider for chain tests.
    pub(crate) struct FakeProvider {
        name: &'static str,
        configured: bool,
        succeed: bool,
        pub(crate) calls: Arc<AtomicU32>,
    }

    impl FakeProvider {
        pub(crate) fn succeeding(name: &'static str) -> Self {
            Self {
                name,
                configured: true,
                succeed: true,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        pub(crate) fn failing(name: &'static str) -> Self {
            Self {
                succeed: false,
                ..Self::succeeding(name)
            }
        }

        pub(crate) fn unconfigured(name: &'static str) -> Self {
            Self {
                configured: false,
                ..Self::succeeding(name)
            }
        }

        pub(crate) fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn attempt(&self, _to: &str, _message: &OutboundMessage) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(NotifyError::UnexpectedStatus(500))
            }
        }
    }
}
