//! Notification error types.
//!
//! A [`NotifyError`] never escapes a channel: it only exists so the
//! chain can record one provider's failure and move to the next. The
//! terminal fallback step makes `dispatch` itself infallible.

use thiserror::Error;

/// A single provider attempt's failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The provider is missing credentials or an endpoint.
    #[error("provider not configured")]
    NotConfigured,

    /// The outbound HTTP call failed (connect, timeout, malformed
    /// response).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered outside the 2xx range.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),

    /// The provider answered 2xx but its body reports a failure.
    #[error("gateway rejected message: {0}")]
    Rejected(String),

    /// Building or sending the SMTP message failed.
    #[error("mail error: {0}")]
    Mail(String),
}
