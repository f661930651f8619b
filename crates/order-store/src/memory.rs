//! In-memory order store implementation for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{
    CustomerDirectory, NewOrder, NotificationPreferences, Order, OrderStatus, PreferenceSource,
    ProductCatalog, ProductSummary, TransitionOutcome, phone,
};

use crate::error::{Result, StoreError};
use crate::store::{OrderStore, build_order, month_scope, normalize_draft};

#[derive(Debug, Default)]
struct Inner {
    orders: BTreeMap<i64, Order>,
    next_id: i64,
    preferences: HashMap<UserId, NotificationPreferences>,
    user_emails: HashMap<UserId, String>,
    products: HashMap<ProductId, ProductSummary>,
}

/// In-memory order store.
///
/// A single write lock serializes `create_order`, which gives the
/// monthly sequencer the same read-then-assign atomicity the Postgres
/// implementation gets from its advisory lock. Also serves as the
/// seedable customer directory / product catalog / preference source
/// for dispatcher and API tests.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<tokio::sync::RwLock<Inner>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Seeds an account email for `CustomerDirectory` lookups.
    pub async fn insert_user_email(&self, user_id: UserId, email: impl Into<String>) {
        self.inner
            .write()
            .await
            .user_emails
            .insert(user_id, email.into());
    }

    /// Seeds a product for `ProductCatalog` lookups.
    pub async fn insert_product(&self, product_id: ProductId, summary: ProductSummary) {
        self.inner.write().await.products.insert(product_id, summary);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, draft: NewOrder, now: DateTime<Utc>) -> Result<Order> {
        draft.validate()?;
        let draft = normalize_draft(draft);

        let mut inner = self.inner.write().await;

        let scope = month_scope(now);
        let max = inner
            .orders
            .values()
            .filter(|order| month_scope(order.created_at) == scope)
            .map(|order| order.order_number)
            .max()
            .unwrap_or(0);

        inner.next_id += 1;
        let id = OrderId::new(inner.next_id);
        let order = build_order(&draft, id, max + 1, now);
        inner.orders.insert(id.as_i64(), order.clone());

        metrics::counter!("orders_created_total").increment(1);
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id.as_i64()).cloned())
    }

    async fn find_by_number_and_phone(
        &self,
        order_number: i32,
        phone_input: &str,
    ) -> Result<Option<Order>> {
        let raw = phone_input.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let inner = self.inner.read().await;
        let mut candidates: Vec<&Order> = inner
            .orders
            .values()
            .filter(|order| order.order_number == order_number)
            .collect();
        candidates.sort_by_key(|order| std::cmp::Reverse(order.created_at));

        if let Some(direct) = candidates
            .iter()
            .find(|order| order.customer_phone == raw)
        {
            return Ok(Some((*direct).clone()));
        }

        let Some(normalized) = phone::normalize(raw) else {
            return Ok(None);
        };
        Ok(candidates
            .into_iter()
            .find(|order| {
                phone::normalize(&order.customer_phone).as_ref() == Some(&normalized)
            })
            .cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|order| order.user_id == Some(user_id))
            .cloned()
            .collect();
        orders.sort_by_key(|order| std::cmp::Reverse(order.created_at));
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: OrderId,
        new_status: OrderStatus,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Order, TransitionOutcome)> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&id.as_i64())
            .ok_or(StoreError::NotFound(id))?;

        let outcome = order.apply_transition(new_status, tracking_number, now);
        Ok((order.clone(), outcome))
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .orders
            .remove(&id.as_i64())
            .ok_or(StoreError::NotFound(id))?;
        Ok(())
    }

    async fn notification_preferences(
        &self,
        user_id: UserId,
    ) -> Result<Option<NotificationPreferences>> {
        Ok(self.inner.read().await.preferences.get(&user_id).copied())
    }

    async fn set_notification_preferences(
        &self,
        user_id: UserId,
        prefs: NotificationPreferences,
    ) -> Result<()> {
        self.inner.write().await.preferences.insert(user_id, prefs);
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryOrderStore {
    async fn email_for_user(&self, user_id: UserId) -> Option<String> {
        self.inner.read().await.user_emails.get(&user_id).cloned()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryOrderStore {
    async fn summary(&self, product_id: ProductId) -> Option<ProductSummary> {
        self.inner.read().await.products.get(&product_id).cloned()
    }
}

#[async_trait]
impl PreferenceSource for InMemoryOrderStore {
    async fn preferences_for(&self, user_id: UserId) -> Option<NotificationPreferences> {
        self.inner.read().await.preferences.get(&user_id).copied()
    }
}
