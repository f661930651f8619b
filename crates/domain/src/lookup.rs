//! Read-side capability traits for the notification dispatcher.
//!
//! These are best-effort lookups: implementations log and swallow their
//! own failures and answer `None`, so a broken directory can never take
//! an order transaction down with it.

use async_trait::async_trait;
use common::{ProductId, UserId};

use crate::preferences::NotificationPreferences;

/// Resolves account contact details.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Returns the email address of the given account, if any.
    async fn email_for_user(&self, user_id: UserId) -> Option<String>;
}

/// Product display data embedded in outbound messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub name: String,
    /// Publicly reachable image URL, relative paths already resolved
    /// against the public base URL.
    pub image_url: Option<String>,
}

/// Resolves product display data for order items.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns the display summary for a product, if it still exists.
    async fn summary(&self, product_id: ProductId) -> Option<ProductSummary>;
}

/// Resolves a user's notification preferences.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    /// Returns the stored preferences, or `None` when the user never
    /// saved any (callers fall back to channel defaults).
    async fn preferences_for(&self, user_id: UserId) -> Option<NotificationPreferences>;
}
