//! Order event fan-out across the notification channels.

use std::sync::Arc;

use domain::{
    CanonicalPhone, CustomerDirectory, Order, PreferenceSource, ProductCatalog, TransitionOutcome,
    phone,
};
use reqwest::Client;

use crate::config::NotifyConfig;
use crate::email::EmailChannel;
use crate::error::NotifyError;
use crate::provider::{DispatchOutcome, OutboundMessage};
use crate::sms::SmsChannel;
use crate::template::{ResolvedItem, Templates};
use crate::whatsapp::{WhatsAppChannel, wa_link};

/// Per-channel outcomes of one event dispatch, for logs and tests.
/// Fields stay `None` when the corresponding send was not applicable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub admin_email: Option<DispatchOutcome>,
    pub customer_email: Option<DispatchOutcome>,
    pub admin_whatsapp: Option<DispatchOutcome>,
    pub customer_whatsapp: Option<DispatchOutcome>,
    pub customer_sms: Option<DispatchOutcome>,
}

/// Fans order events out to the channels.
///
/// Both entry points are infallible: every channel already terminates
/// in a fallback, and every lookup here is best-effort. Callers invoke
/// them after the storage transaction commits, off the request's
/// critical path.
pub struct OrderEventDispatcher {
    email: EmailChannel,
    whatsapp: WhatsAppChannel,
    sms: SmsChannel,
    directory: Arc<dyn CustomerDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    preferences: Arc<dyn PreferenceSource>,
    templates: Templates,
    admin_emails: Vec<String>,
    admin_whatsapp: Option<CanonicalPhone>,
    public_base_url: String,
}

impl OrderEventDispatcher {
    /// Builds the dispatcher and its channels from configuration.
    pub fn new(
        config: &NotifyConfig,
        directory: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        preferences: Arc<dyn PreferenceSource>,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .build()?;

        let email = EmailChannel::new(
            &config.email,
            &config.mail_from,
            client.clone(),
            config.provider_timeout,
        );
        let whatsapp = WhatsAppChannel::new(&config.whatsapp, client.clone());
        let sms = SmsChannel::new(&config.sms, client);

        Ok(Self::with_channels(
            config,
            email,
            whatsapp,
            sms,
            directory,
            catalog,
            preferences,
        ))
    }

    /// Builds the dispatcher over explicit channels (used by tests to
    /// inject fake providers).
    pub fn with_channels(
        config: &NotifyConfig,
        email: EmailChannel,
        whatsapp: WhatsAppChannel,
        sms: SmsChannel,
        directory: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        preferences: Arc<dyn PreferenceSource>,
    ) -> Self {
        let admin_whatsapp = config
            .admin_whatsapp
            .as_deref()
            .and_then(|raw| match phone::normalize(raw) {
                Some(canonical) => Some(canonical),
                None => {
                    tracing::warn!(raw, "admin WhatsApp number is not dialable, ignoring");
                    None
                }
            });

        Self {
            email,
            whatsapp,
            sms,
            directory,
            catalog,
            preferences,
            templates: Templates {
                store_name: config.store_name.clone(),
                frontend_url: config.frontend_url.clone(),
                admin_whatsapp: config.admin_whatsapp.clone(),
            },
            admin_emails: config.admin_notification_emails.clone(),
            admin_whatsapp,
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Pre-built admin deep link for a new order, for the caller to
    /// display. Only link construction happens here, no provider
    /// delivery, so it is safe on the response path.
    pub async fn admin_order_link(&self, order: &Order) -> Option<String> {
        let admin = self.admin_whatsapp.as_ref()?;
        let items = self.resolve_items(order).await;
        Some(wa_link(admin, &self.templates.admin_new_order_text(order, &items)))
    }

    /// Fires the order-created notifications: admin email(s), customer
    /// confirmation email when an address is resolvable, and the admin
    /// WhatsApp message with product images. SMS is not part of the
    /// creation flow; it only covers status changes.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, order_number = order.order_number))]
    pub async fn order_created(&self, order: &Order) -> DispatchReport {
        metrics::counter!("order_events_dispatched_total", "event" => "created").increment(1);
        let mut report = DispatchReport::default();

        let items = self.resolve_items(order).await;

        let admin_message = self.templates.admin_new_order_email(order, &items);
        for address in &self.admin_emails {
            report.admin_email = Some(self.email.dispatch(address, &admin_message).await);
        }

        if let Some(address) = self.customer_email(order).await {
            let message = self.templates.customer_confirmation_email(order);
            report.customer_email = Some(self.email.dispatch(&address, &message).await);
        }

        if let Some(admin) = &self.admin_whatsapp {
            let images = self.collect_images(order).await;
            let message = OutboundMessage::text(self.templates.admin_new_order_text(order, &items))
                .with_images(images);
            report.admin_whatsapp = Some(self.whatsapp.dispatch(admin, &message).await);
        }

        report
    }

    /// Fires the status-changed notifications: shipped/delivered
    /// customer emails exactly when this transition stamped the
    /// matching timestamp, plus the generic WhatsApp/SMS status update
    /// for customers who opted in (guests are always in).
    #[tracing::instrument(skip(self, order, outcome), fields(order_id = %order.id, status = %order.status))]
    pub async fn status_changed(&self, order: &Order, outcome: &TransitionOutcome) -> DispatchReport {
        metrics::counter!("order_events_dispatched_total", "event" => "status_changed").increment(1);
        let mut report = DispatchReport::default();

        if outcome.shipped_stamped {
            if let Some(address) = self.customer_email(order).await {
                let message = self.templates.shipped_email(order);
                report.customer_email = Some(self.email.dispatch(&address, &message).await);
            }
        }
        if outcome.delivered_stamped {
            if let Some(address) = self.customer_email(order).await {
                let message = self.templates.delivered_email(order);
                report.customer_email = Some(self.email.dispatch(&address, &message).await);
            }
        }

        if outcome.notifies_customer() && self.sms_updates_enabled(order).await {
            if let Some(customer) = phone::normalize(&order.customer_phone) {
                let text = self.templates.customer_status_text(order);
                report.customer_whatsapp = Some(
                    self.whatsapp
                        .dispatch(&customer, &OutboundMessage::text(text.clone()))
                        .await,
                );
                report.customer_sms = Some(
                    self.sms
                        .dispatch(&customer, &OutboundMessage::text(text))
                        .await,
                );
            } else {
                tracing::warn!(
                    phone = %order.customer_phone,
                    "customer phone not dialable, skipping status update"
                );
            }
        }

        report
    }

    /// Guests always receive status updates; account holders only when
    /// their stored preference opts in (absent record means off).
    async fn sms_updates_enabled(&self, order: &Order) -> bool {
        match order.user_id {
            None => true,
            Some(user_id) => self
                .preferences
                .preferences_for(user_id)
                .await
                .unwrap_or_default()
                .sms_order_updates,
        }
    }

    /// Account email first, then a customer name that is itself an
    /// email address.
    async fn customer_email(&self, order: &Order) -> Option<String> {
        if let Some(user_id) = order.user_id {
            if let Some(address) = self.directory.email_for_user(user_id).await {
                if address.contains('@') {
                    return Some(address);
                }
            }
        }
        order.name_as_email().map(str::to_string)
    }

    async fn resolve_items(&self, order: &Order) -> Vec<ResolvedItem> {
        let mut resolved = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let name = match self.catalog.summary(item.product_id).await {
                Some(summary) => summary.name,
                None => format!("Product #{}", item.product_id),
            };
            resolved.push(ResolvedItem {
                name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }
        resolved
    }

    /// Publicly reachable image URLs for the order's products, with
    /// relative catalog paths resolved against the public base URL.
    async fn collect_images(&self, order: &Order) -> Vec<String> {
        let mut images = Vec::new();
        for item in &order.items {
            let Some(summary) = self.catalog.summary(item.product_id).await else {
                continue;
            };
            let Some(image) = summary.image_url.as_deref().map(str::trim) else {
                continue;
            };
            if image.is_empty() {
                continue;
            }

            let url = if image.starts_with("http") {
                image.to_string()
            } else if let Some(path) = image.strip_prefix('/') {
                format!("{}/{}", self.public_base_url, path)
            } else {
                format!("{}/{}", self.public_base_url, image)
            };
            images.push(url);
        }
        images
    }
}
