//! The order record, its items, and the transition operation.

mod status;

pub use status::OrderStatus;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::phone;

/// A single line of an order.
///
/// Items are owned exclusively by their order and removed with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates an order line.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns quantity times unit price.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }
}

/// A persisted order.
///
/// Created only through the creation flow (which assigns the monthly
/// `order_number` exactly once) and mutated only through
/// [`Order::apply_transition`] under the store's row transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    /// Monthly sequential number; unique only within the calendar month
    /// of `created_at`, never globally.
    pub order_number: i32,

    /// Optional display name; may itself be an email address, which then
    /// doubles as the customer email for notifications.
    pub customer_name: Option<String>,

    /// Phone exactly as the customer entered it. Normalized on use, not
    /// on storage.
    pub customer_phone: String,

    /// Where the order came from ("store", "whatsapp", ...).
    pub channel: Option<String>,

    pub subtotal: Money,
    pub delivery_option: Option<String>,
    pub delivery_fee: Money,
    pub delivery_location: Option<String>,

    /// Owning account; `None` marks a guest order.
    pub user_id: Option<UserId>,

    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,

    pub items: Vec<OrderItem>,
}

/// What a status/tracking update actually changed.
///
/// The notification dispatcher consumes this to decide which events fire;
/// in particular `shipped_stamped`/`delivered_stamped` are true at most
/// once over an order's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub status_changed: bool,
    pub tracking_updated: bool,
    pub shipped_stamped: bool,
    pub delivered_stamped: bool,
}

impl TransitionOutcome {
    /// True when the generic customer status-update event should fire.
    pub fn notifies_customer(&self) -> bool {
        self.status_changed || self.tracking_updated
    }
}

impl Order {
    /// Total payable for the order.
    pub fn total(&self) -> Money {
        self.subtotal.saturating_add(self.delivery_fee)
    }

    /// True for orders without an owning account.
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    /// Human reference for the order: the monthly number together with
    /// its month and year, e.g. `#12 (Aug 2026)`. The month is required
    /// to disambiguate, since numbers restart every month.
    pub fn reference(&self) -> String {
        format!("#{} ({})", self.order_number, self.created_at.format("%b %Y"))
    }

    /// Returns the customer name when it looks like an email address.
    pub fn name_as_email(&self) -> Option<&str> {
        self.customer_name
            .as_deref()
            .filter(|name| name.contains('@'))
    }

    /// Applies a status/tracking update in place and reports what changed.
    ///
    /// - `shipped_at` is stamped only on the first transition to
    ///   [`OrderStatus::Shipped`]; repeating the transition neither
    ///   re-stamps nor reports `shipped_stamped` again. Same for
    ///   `delivered_at`.
    /// - A non-empty tracking number always overwrites the stored one,
    ///   independent of status.
    /// - Backward transitions are accepted unchecked.
    pub fn apply_transition(
        &mut self,
        new_status: OrderStatus,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        let status_changed = new_status != self.status;

        let tracking = tracking_number.map(str::trim).filter(|t| !t.is_empty());
        let tracking_updated =
            tracking.is_some_and(|t| self.tracking_number.as_deref() != Some(t));

        self.status = new_status;
        if let Some(t) = tracking {
            self.tracking_number = Some(t.to_string());
        }

        let shipped_stamped = new_status == OrderStatus::Shipped && self.shipped_at.is_none();
        if shipped_stamped {
            self.shipped_at = Some(now);
        }

        let delivered_stamped =
            new_status == OrderStatus::Delivered && self.delivered_at.is_none();
        if delivered_stamped {
            self.delivered_at = Some(now);
        }

        TransitionOutcome {
            status_changed,
            tracking_updated,
            shipped_stamped,
            delivered_stamped,
        }
    }
}

/// A single line of an order being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order as submitted by the checkout flow, before persistence.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: Option<String>,
    pub customer_phone: String,
    pub channel: Option<String>,
    pub subtotal: Money,
    pub delivery_option: Option<String>,
    pub delivery_fee: Money,
    pub delivery_location: Option<String>,
    pub user_id: Option<UserId>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Validates the draft before any side effect runs.
    pub fn validate(&self) -> Result<(), OrderError> {
        let raw_phone = self.customer_phone.trim();
        if raw_phone.is_empty() {
            return Err(OrderError::MissingPhone);
        }
        if phone::normalize(raw_phone).is_none() {
            return Err(OrderError::InvalidPhone {
                raw: self.customer_phone.clone(),
            });
        }

        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &self.items {
            if item.quantity < 1 {
                return Err(OrderError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::NegativePrice {
                    price: item.unit_price.amount(),
                });
            }
        }

        if self.subtotal.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "subtotal",
                amount: self.subtotal.amount(),
            });
        }
        if self.delivery_fee.is_negative() {
            return Err(OrderError::NegativeAmount {
                field: "delivery fee",
                amount: self.delivery_fee.amount(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(1),
            order_number: 3,
            customer_name: Some("Aline U.".to_string()),
            customer_phone: "0788123456".to_string(),
            channel: Some("store".to_string()),
            subtotal: Money::new(9000),
            delivery_option: Some("kigali".to_string()),
            delivery_fee: Money::new(1500),
            delivery_location: Some("Kacyiru".to_string()),
            user_id: None,
            status: OrderStatus::Pending,
            tracking_number: None,
            shipped_at: None,
            delivered_at: None,
            created_at: Utc.with_ymd_and_hms(2026, 8, 5, 10, 30, 0).unwrap(),
            items: vec![OrderItem::new(7i64, 2, Money::new(4500))],
        }
    }

    fn sample_draft() -> NewOrder {
        NewOrder {
            customer_name: None,
            customer_phone: "0788123456".to_string(),
            channel: None,
            subtotal: Money::new(4500),
            delivery_option: None,
            delivery_fee: Money::ZERO,
            delivery_location: None,
            user_id: None,
            items: vec![NewOrderItem {
                product_id: ProductId::new(7),
                quantity: 1,
                unit_price: Money::new(4500),
            }],
        }
    }

    #[test]
    fn test_total_is_subtotal_plus_delivery_fee() {
        let order = sample_order();
        assert_eq!(order.total(), Money::new(10500));
        assert!(!order.total().is_negative());
    }

    #[test]
    fn test_reference_carries_month_and_year() {
        let order = sample_order();
        assert_eq!(order.reference(), "#3 (Aug 2026)");
    }

    #[test]
    fn test_name_as_email() {
        let mut order = sample_order();
        assert_eq!(order.name_as_email(), None);
        order.customer_name = Some("aline@example.com".to_string());
        assert_eq!(order.name_as_email(), Some("aline@example.com"));
    }

    #[test]
    fn test_shipped_stamps_once() {
        let mut order = sample_order();
        let t1 = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 0).unwrap();

        let first = order.apply_transition(OrderStatus::Shipped, None, t1);
        assert!(first.status_changed);
        assert!(first.shipped_stamped);
        assert_eq!(order.shipped_at, Some(t1));

        let second = order.apply_transition(OrderStatus::Shipped, None, t2);
        assert!(!second.status_changed);
        assert!(!second.shipped_stamped);
        assert_eq!(order.shipped_at, Some(t1), "second transition must not re-stamp");
    }

    #[test]
    fn test_delivered_stamps_once() {
        let mut order = sample_order();
        let t1 = Utc.with_ymd_and_hms(2026, 8, 8, 12, 0, 0).unwrap();

        let outcome = order.apply_transition(OrderStatus::Delivered, None, t1);
        assert!(outcome.delivered_stamped);
        assert_eq!(order.delivered_at, Some(t1));

        let again = order.apply_transition(OrderStatus::Delivered, None, Utc::now());
        assert!(!again.delivered_stamped);
        assert_eq!(order.delivered_at, Some(t1));
    }

    #[test]
    fn test_tracking_overwrites_independent_of_status() {
        let mut order = sample_order();
        let now = Utc::now();

        let outcome = order.apply_transition(OrderStatus::Pending, Some("DHL-001"), now);
        assert!(!outcome.status_changed);
        assert!(outcome.tracking_updated);
        assert!(outcome.notifies_customer());
        assert_eq!(order.tracking_number.as_deref(), Some("DHL-001"));

        let outcome = order.apply_transition(OrderStatus::Pending, Some("DHL-002"), now);
        assert!(outcome.tracking_updated);
        assert_eq!(order.tracking_number.as_deref(), Some("DHL-002"));
    }

    #[test]
    fn test_same_tracking_does_not_notify() {
        let mut order = sample_order();
        let now = Utc::now();
        order.apply_transition(OrderStatus::Confirmed, Some("DHL-001"), now);

        let outcome = order.apply_transition(OrderStatus::Confirmed, Some("DHL-001"), now);
        assert!(!outcome.status_changed);
        assert!(!outcome.tracking_updated);
        assert!(!outcome.notifies_customer());
    }

    #[test]
    fn test_blank_tracking_is_ignored() {
        let mut order = sample_order();
        let outcome = order.apply_transition(OrderStatus::Confirmed, Some("   "), Utc::now());
        assert!(!outcome.tracking_updated);
        assert_eq!(order.tracking_number, None);
    }

    #[test]
    fn test_backward_transition_is_accepted() {
        let mut order = sample_order();
        let now = Utc::now();
        order.apply_transition(OrderStatus::Delivered, None, now);

        let outcome = order.apply_transition(OrderStatus::Pending, None, now);
        assert!(outcome.status_changed);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.delivered_at.is_some(), "stamp survives backward moves");
    }

    #[test]
    fn test_draft_validation_accepts_good_order() {
        assert_eq!(sample_draft().validate(), Ok(()));
    }

    #[test]
    fn test_draft_validation_rejects_blank_phone() {
        let mut draft = sample_draft();
        draft.customer_phone = "   ".to_string();
        assert_eq!(draft.validate(), Err(OrderError::MissingPhone));
    }

    #[test]
    fn test_draft_validation_rejects_empty_items() {
        let mut draft = sample_draft();
        draft.items.clear();
        assert_eq!(draft.validate(), Err(OrderError::NoItems));
    }

    #[test]
    fn test_draft_validation_rejects_zero_quantity() {
        let mut draft = sample_draft();
        draft.items[0].quantity = 0;
        assert_eq!(
            draft.validate(),
            Err(OrderError::InvalidQuantity { quantity: 0 })
        );
    }

    #[test]
    fn test_draft_validation_rejects_negative_amounts() {
        let mut draft = sample_draft();
        draft.delivery_fee = Money::new(-100);
        assert!(matches!(
            draft.validate(),
            Err(OrderError::NegativeAmount { field: "delivery fee", .. })
        ));
    }

    #[test]
    fn test_line_total() {
        let item = OrderItem::new(1i64, 3, Money::new(2000));
        assert_eq!(item.line_total(), Money::new(6000));
    }
}
