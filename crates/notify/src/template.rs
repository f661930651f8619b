//! Channel message templating.
//!
//! Pure formatting over order data. Monetary values render as whole
//! currency units with no decimals; a monthly order number is always
//! rendered with its month/year, since numbers repeat across months.

use common::Money;
use domain::Order;

use crate::provider::OutboundMessage;

/// An order item with its product name resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl ResolvedItem {
    fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }
}

/// Message templates parameterized by deployment configuration.
#[derive(Debug, Clone)]
pub struct Templates {
    pub store_name: String,
    pub frontend_url: String,
    pub admin_whatsapp: Option<String>,
}

impl Templates {
    fn track_url(&self) -> String {
        format!("{}/track-order", self.frontend_url)
    }

    /// Admin-facing WhatsApp text announcing a new order.
    pub fn admin_new_order_text(&self, order: &Order, items: &[ResolvedItem]) -> String {
        let mut text = String::new();
        text.push_str(&format!("NEW ORDER {}\n", order.reference()));
        text.push_str("================================\n");

        if let Some(name) = order
            .customer_name
            .as_deref()
            .filter(|name| !name.eq_ignore_ascii_case("Guest Customer"))
        {
            text.push_str(&format!("Customer: {name}\n"));
        }
        text.push_str(&format!("Phone: {}\n", order.customer_phone));
        if let Some(channel) = order.channel.as_deref() {
            text.push_str(&format!("Channel: {}\n", channel.to_uppercase()));
        }

        text.push_str("\nItems:\n");
        for (index, item) in items.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", index + 1, item.name));
            text.push_str(&format!("   Qty: {}\n", item.quantity));
            text.push_str(&format!("   Unit: {} RWF\n", item.unit_price));
            text.push_str(&format!("   Subtotal: {} RWF\n", item.line_total()));
        }

        text.push_str(&format!("\nSubtotal: {} RWF\n", order.subtotal));
        self.append_delivery_info(&mut text, order);
        text.push_str(&format!("Total: {} RWF\n", order.total()));
        text.push_str("================================\n");
        text.push_str("Please process this order.");
        text
    }

    /// Admin-facing email mirroring the WhatsApp announcement.
    pub fn admin_new_order_email(&self, order: &Order, items: &[ResolvedItem]) -> OutboundMessage {
        let customer = order.customer_name.as_deref().unwrap_or("Guest");
        let mut body = String::new();
        body.push_str(&format!("New order received: {}\n", order.reference()));
        body.push_str(&format!("Customer: {customer}\n"));
        body.push_str(&format!("Phone: {}\n", order.customer_phone));
        if let Some(channel) = order.channel.as_deref() {
            body.push_str(&format!("Channel: {channel}\n"));
        }
        body.push_str(&format!("Placed at: {}\n", order.created_at.format("%Y-%m-%d %H:%M UTC")));

        body.push_str("\nItems:\n");
        for item in items {
            body.push_str(&format!(
                "- {} | Qty: {} | Unit: {} RWF | Subtotal: {} RWF\n",
                item.name,
                item.quantity,
                item.unit_price,
                item.line_total()
            ));
        }

        body.push_str(&format!("\nSubtotal: {} RWF\n", order.subtotal));
        self.append_delivery_info(&mut body, order);
        body.push_str(&format!("TOTAL: {} RWF\n", order.total()));
        body.push_str("\nPlease process this order promptly.\n");
        if let Some(admin) = self.admin_whatsapp.as_deref() {
            body.push_str(&format!("WhatsApp: {admin}\n"));
        }

        OutboundMessage::text(body)
            .with_subject(format!("New Order {} - {}", order.reference(), customer))
    }

    /// Customer order confirmation email.
    pub fn customer_confirmation_email(&self, order: &Order) -> OutboundMessage {
        let name = order.customer_name.as_deref().unwrap_or("Guest");
        let mut body = String::new();
        body.push_str(&format!("Hello {name},\n\n"));
        body.push_str("Thank you for your order!\n\n");
        body.push_str(&format!("Order {}\n", order.reference()));
        body.push_str(&format!("Subtotal: {} RWF\n", order.subtotal));
        body.push_str(&format!("Delivery Fee: {} RWF\n", order.delivery_fee));
        if let Some(location) = order.delivery_location.as_deref() {
            body.push_str(&format!("Delivery Location: {location}\n"));
        }
        body.push_str(&format!("Total: {} RWF\n\n", order.total()));
        body.push_str("We'll send you updates on your order status.\n\n");
        body.push_str(&self.signature());

        OutboundMessage::text(body).with_subject(format!(
            "Order Confirmation - {} {}",
            self.store_name,
            order.reference()
        ))
    }

    /// Customer email for the first transition to shipped.
    pub fn shipped_email(&self, order: &Order) -> OutboundMessage {
        let name = order.customer_name.as_deref().unwrap_or("Guest");
        let mut body = String::new();
        body.push_str(&format!("Hello {name},\n\n"));
        body.push_str(&format!(
            "Great news! Your order {} has been shipped.\n\n",
            order.reference()
        ));
        if let Some(tracking) = order.tracking_number.as_deref() {
            body.push_str(&format!("Tracking Number: {tracking}\n\n"));
        }
        body.push_str(&format!("Track your order: {}\n\n", self.track_url()));
        body.push_str(&self.signature());

        OutboundMessage::text(body).with_subject(format!(
            "Your Order Has Been Shipped - {} {}",
            self.store_name,
            order.reference()
        ))
    }

    /// Customer email for the first transition to delivered.
    pub fn delivered_email(&self, order: &Order) -> OutboundMessage {
        let name = order.customer_name.as_deref().unwrap_or("Guest");
        let mut body = String::new();
        body.push_str(&format!("Hello {name},\n\n"));
        body.push_str(&format!(
            "Your order {} has been delivered!\n\n",
            order.reference()
        ));
        body.push_str("We hope you love your purchase. If anything is wrong, just reply to this email.\n\n");
        body.push_str(&format!("Thank you for shopping with {}!\n\n", self.store_name));
        body.push_str(&self.signature());

        OutboundMessage::text(body).with_subject(format!(
            "Order Delivered - {} {}",
            self.store_name,
            order.reference()
        ))
    }

    /// Generic customer status update, sent over WhatsApp and SMS.
    pub fn customer_status_text(&self, order: &Order) -> String {
        let mut text = String::new();
        text.push_str(&format!("{}\n", self.store_name));

        if order.status == domain::OrderStatus::Pending {
            text.push_str(&format!("We have received your order {}.\n", order.reference()));
        } else {
            text.push_str(&format!("Order update {}.\n", order.reference()));
        }

        text.push_str(&format!("Status: {}\n", order.status));
        text.push_str(&format!("Total: {} RWF\n", order.total()));
        if let Some(tracking) = order.tracking_number.as_deref() {
            text.push_str(&format!("Tracking: {tracking}\n"));
        }
        text.push_str(&format!("Track: {}", self.track_url()));
        text
    }

    fn append_delivery_info(&self, text: &mut String, order: &Order) {
        let Some(option) = order.delivery_option.as_deref().filter(|o| !o.is_empty()) else {
            return;
        };

        let label = match option.to_ascii_lowercase().as_str() {
            "pickup" => "Pickup",
            "kigali" => "Kigali Delivery",
            "upcountry" => "Upcountry Delivery",
            _ => option,
        };

        if order.delivery_fee.is_zero() {
            text.push_str(&format!("Delivery: {label} (Free)\n"));
        } else {
            text.push_str(&format!("Delivery: {label} ({} RWF)\n", order.delivery_fee));
        }

        let is_pickup = option.eq_ignore_ascii_case("pickup");
        if !is_pickup {
            if let Some(location) = order.delivery_location.as_deref() {
                text.push_str(&format!("Location: {location}\n"));
            }
        }
    }

    fn signature(&self) -> String {
        format!("Best regards,\n{} Team", self.store_name)
    }
}
