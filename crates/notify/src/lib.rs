//! Best-effort, multi-channel order notifications.
//!
//! Three independent channels (email, WhatsApp, SMS) each hold an
//! ordered chain of providers sharing one uniform
//! [`Provider::attempt`] contract. A dispatch walks the chain, stops at
//! the first success, and finishes with the channel's terminal fallback
//! (a `wa.me` deep link, or logging the payload) so it never fails.
//!
//! The [`OrderEventDispatcher`] fans order-created and status-changed
//! events out across the channels. Every failure inside it is caught,
//! logged, counted, and discarded: notification health has zero
//! bearing on whether an order can be placed or updated.

pub mod config;
pub mod dispatcher;
pub mod email;
pub mod error;
pub mod provider;
pub mod sms;
pub mod template;
pub mod whatsapp;

pub use config::{
    CallMeBotConfig, ChatApiConfig, EmailConfig, GreenApiConfig, NotifyConfig, SmsConfig,
    SmtpConfig, WhatsAppConfig,
};
pub use dispatcher::{DispatchReport, OrderEventDispatcher};
pub use email::EmailChannel;
pub use error::NotifyError;
pub use provider::{DispatchOutcome, OutboundMessage, Provider};
pub use sms::SmsChannel;
pub use template::{ResolvedItem, Templates};
pub use whatsapp::{WhatsAppChannel, wa_link};
