use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use common::{OrderId, UserId};
use domain::{NewOrder, NotificationPreferences, Order, OrderItem, OrderStatus, TransitionOutcome};

use crate::Result;

/// Core trait for order persistence.
///
/// Implementations must be thread-safe, and `create_order` must
/// serialize the read-then-assign of the monthly order number against
/// concurrent callers in the same (year, month) scope. No coordination
/// is needed across months; their number spaces are disjoint.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Validates and persists a new order, assigning the next monthly
    /// order number inside the same atomic unit of work as the insert.
    ///
    /// `now` determines both `created_at` and the (year, month) scope
    /// of the sequencer. A sequencing conflict is retried once before
    /// surfacing as [`StoreError::SequencingConflict`](crate::StoreError).
    async fn create_order(&self, draft: NewOrder, now: DateTime<Utc>) -> Result<Order>;

    /// Fetches an order with its items.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Guest order tracking: resolves a monthly order number plus the
    /// phone it was placed with. Tries the phone exactly as stored
    /// first, then falls back to comparing normalized forms. Newest
    /// match wins, since numbers repeat across months.
    async fn find_by_number_and_phone(
        &self,
        order_number: i32,
        phone: &str,
    ) -> Result<Option<Order>>;

    /// Returns a user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Applies a status/tracking update under a row lock and returns
    /// the updated order together with what actually changed.
    async fn update_status(
        &self,
        id: OrderId,
        new_status: OrderStatus,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Order, TransitionOutcome)>;

    /// Administrative deletion; cascades to the order's items.
    async fn delete_order(&self, id: OrderId) -> Result<()>;

    /// Returns a user's stored notification preferences, if any.
    async fn notification_preferences(
        &self,
        user_id: UserId,
    ) -> Result<Option<NotificationPreferences>>;

    /// Creates or replaces a user's notification preferences.
    async fn set_notification_preferences(
        &self,
        user_id: UserId,
        prefs: NotificationPreferences,
    ) -> Result<()>;
}

/// Display name recorded for orders placed without one.
pub(crate) const GUEST_CUSTOMER_NAME: &str = "Guest Customer";

/// Order source recorded when the checkout flow does not say.
pub(crate) const DEFAULT_CHANNEL: &str = "store";

/// The (year, month) scope a creation timestamp falls into.
pub(crate) fn month_scope(now: DateTime<Utc>) -> (i32, u32) {
    (now.year(), now.month())
}

/// Applies creation-time defaults and trimming to a draft.
pub(crate) fn normalize_draft(mut draft: NewOrder) -> NewOrder {
    draft.customer_name = draft
        .customer_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or_else(|| Some(GUEST_CUSTOMER_NAME.to_string()));
    draft.customer_phone = draft.customer_phone.trim().to_string();
    draft.channel = draft
        .channel
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| Some(DEFAULT_CHANNEL.to_string()));
    draft.delivery_location = draft
        .delivery_location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    draft
}

/// Materializes a persisted order from a normalized draft, the assigned
/// identity and monthly number, and the creation timestamp.
pub(crate) fn build_order(draft: &NewOrder, id: OrderId, order_number: i32, now: DateTime<Utc>) -> Order {
    Order {
        id,
        order_number,
        customer_name: draft.customer_name.clone(),
        customer_phone: draft.customer_phone.clone(),
        channel: draft.channel.clone(),
        subtotal: draft.subtotal,
        delivery_option: draft.delivery_option.clone(),
        delivery_fee: draft.delivery_fee,
        delivery_location: draft.delivery_location.clone(),
        user_id: draft.user_id,
        status: OrderStatus::Pending,
        tracking_number: None,
        shipped_at: None,
        delivered_at: None,
        created_at: now,
        items: draft
            .items
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    }
}
