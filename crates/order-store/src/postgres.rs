//! PostgreSQL-backed order store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use domain::{
    CustomerDirectory, NewOrder, NotificationPreferences, Order, OrderItem, OrderStatus,
    PreferenceSource, ProductCatalog, ProductSummary, TransitionOutcome, phone,
};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{Result, StoreError};
use crate::store::{OrderStore, build_order, month_scope, normalize_draft};

/// Advisory-lock namespace for the monthly order-number sequencer.
/// The second lock key is `year * 100 + month`, so concurrent creations
/// in the same month serialize while different months never contend.
const SEQUENCER_LOCK_SCOPE: i32 = 0x4f52_4453; // "ORDS"

/// PostgreSQL order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            order_number: row.try_get("order_number")?,
            customer_name: row.try_get("customer_name")?,
            customer_phone: row.try_get("customer_phone")?,
            channel: row.try_get("channel")?,
            subtotal: Money::new(row.try_get("subtotal")?),
            delivery_option: row.try_get("delivery_option")?,
            delivery_fee: Money::new(row.try_get("delivery_fee")?),
            delivery_location: row.try_get("delivery_location")?,
            user_id: row
                .try_get::<Option<i64>, _>("user_id")?
                .map(UserId::new),
            status: status.parse::<OrderStatus>()?,
            tracking_number: row.try_get("tracking_number")?,
            shipped_at: row.try_get("shipped_at")?,
            delivered_at: row.try_get("delivered_at")?,
            created_at: row.try_get("created_at")?,
            items,
        })
    }

    async fn fetch_items<'e, E>(executor: E, order_id: i64) -> Result<Vec<OrderItem>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let rows = sqlx::query(
            "SELECT product_id, quantity, unit_price FROM order_items \
             WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderItem {
                    product_id: ProductId::new(row.try_get("product_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    unit_price: Money::new(row.try_get("unit_price")?),
                })
            })
            .collect()
    }

    async fn order_from_row(&self, row: PgRow) -> Result<Order> {
        let id: i64 = row.try_get("id")?;
        let items = Self::fetch_items(&self.pool, id).await?;
        Self::row_to_order(&row, items)
    }

    async fn try_create(&self, draft: &NewOrder, now: DateTime<Utc>) -> Result<Order> {
        let (year, month) = month_scope(now);

        let mut tx = self.pool.begin().await?;

        // Serialize the read-then-assign for this month against
        // concurrent creations. Released at commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(SEQUENCER_LOCK_SCOPE)
            .bind(year * 100 + month as i32)
            .execute(&mut *tx)
            .await?;

        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(order_number) FROM orders \
             WHERE date_trunc('month', created_at) = date_trunc('month', $1::timestamptz)",
        )
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let order_number = max.unwrap_or(0) + 1;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                order_number, customer_name, customer_phone, channel,
                subtotal, delivery_option, delivery_fee, delivery_location,
                user_id, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(order_number)
        .bind(&draft.customer_name)
        .bind(&draft.customer_phone)
        .bind(&draft.channel)
        .bind(draft.subtotal.amount())
        .bind(&draft.delivery_option)
        .bind(draft.delivery_fee.amount())
        .bind(&draft.delivery_location)
        .bind(draft.user_id.map(|user| user.as_i64()))
        .bind(OrderStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for item in &draft.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(item.product_id.as_i64())
            .bind(item.quantity as i32)
            .bind(item.unit_price.amount())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(build_order(draft, OrderId::new(id), order_number, now))
    }
}

/// True for errors worth one creation retry: serialization failures,
/// deadlocks, and lock wait timeouts.
fn is_sequencing_failure(err: &StoreError) -> bool {
    let StoreError::Database(sqlx::Error::Database(db_err)) = err else {
        return false;
    };
    matches!(
        db_err.code().as_deref(),
        Some("40001") | Some("40P01") | Some("55P03")
    )
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, draft))]
    async fn create_order(&self, draft: NewOrder, now: DateTime<Utc>) -> Result<Order> {
        draft.validate()?;
        let draft = normalize_draft(draft);

        let order = match self.try_create(&draft, now).await {
            Err(err) if is_sequencing_failure(&err) => {
                let (year, month) = month_scope(now);
                metrics::counter!("order_sequencer_retries_total").increment(1);
                tracing::warn!(%err, year, month, "order creation conflicted, retrying once");

                self.try_create(&draft, now).await.map_err(|retry_err| {
                    if is_sequencing_failure(&retry_err) {
                        StoreError::SequencingConflict { year, month }
                    } else {
                        retry_err
                    }
                })?
            }
            other => other?,
        };

        metrics::counter!("orders_created_total").increment(1);
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.order_from_row(row).await?)),
            None => Ok(None),
        }
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

        let direct = sqlx::query(
            "SELECT * FROM orders WHERE order_number = $1 AND customer_phone = $2 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(order_number)
        .bind(raw)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = direct {
            return Ok(Some(self.order_from_row(row).await?));
        }

        let Some(normalized) = phone::normalize(raw) else {
            return Ok(None);
        };

        let candidates = sqlx::query(
            "SELECT * FROM orders WHERE order_number = $1 ORDER BY created_at DESC",
        )
        .bind(order_number)
        .fetch_all(&self.pool)
        .await?;

        for row in candidates {
            let stored: String = row.try_get("customer_phone")?;
            if phone::normalize(&stored).as_ref() == Some(&normalized) {
                return Ok(Some(self.order_from_row(row).await?));
            }
        }
        Ok(None)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = rows
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<std::result::Result<_, sqlx::Error>>()?;

        let item_rows = sqlx::query(
            "SELECT order_id, product_id, quantity, unit_price FROM order_items \
             WHERE order_id = ANY($1) ORDER BY order_id, id",
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let order_id: i64 = row.try_get("order_id")?;
            items_by_order.entry(order_id).or_default().push(OrderItem {
                product_id: ProductId::new(row.try_get("product_id")?),
                quantity: row.try_get::<i32, _>("quantity")? as u32,
                unit_price: Money::new(row.try_get("unit_price")?),
            });
        }

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                Self::row_to_order(row, items_by_order.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        id: OrderId,
        new_status: OrderStatus,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Order, TransitionOutcome)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_i64())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let items = Self::fetch_items(&mut *tx, id.as_i64()).await?;
        let mut order = Self::row_to_order(&row, items)?;
        let outcome = order.apply_transition(new_status, tracking_number, now);

        sqlx::query(
            "UPDATE orders SET status = $1, tracking_number = $2, \
             shipped_at = $3, delivered_at = $4 WHERE id = $5",
        )
        .bind(order.status.as_str())
        .bind(&order.tracking_number)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((order, outcome))
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn notification_preferences(
        &self,
        user_id: UserId,
    ) -> Result<Option<NotificationPreferences>> {
        let row = sqlx::query(
            "SELECT email_order_updates, sms_order_updates FROM user_notifications \
             WHERE user_id = $1",
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(NotificationPreferences {
                email_order_updates: row.try_get("email_order_updates")?,
                sms_order_updates: row.try_get("sms_order_updates")?,
            })
        })
        .transpose()
    }

    async fn set_notification_preferences(
        &self,
        user_id: UserId,
        prefs: NotificationPreferences,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_notifications (user_id, email_order_updates, sms_order_updates)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                email_order_updates = EXCLUDED.email_order_updates,
                sms_order_updates = EXCLUDED.sms_order_updates
            "#,
        )
        .bind(user_id.as_i64())
        .bind(prefs.email_order_updates)
        .bind(prefs.sms_order_updates)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for PostgresOrderStore {
    async fn email_for_user(&self, user_id: UserId) -> Option<String> {
        let result: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
                .bind(user_id.as_i64())
                .fetch_optional(&self.pool)
                .await;

        match result {
            Ok(email) => email,
            Err(err) => {
                tracing::warn!(%err, %user_id, "customer email lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl ProductCatalog for PostgresOrderStore {
    async fn summary(&self, product_id: ProductId) -> Option<ProductSummary> {
        let result = sqlx::query("SELECT name, image FROM products WHERE id = $1")
            .bind(product_id.as_i64())
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(Some(row)) => {
                let name: std::result::Result<String, sqlx::Error> = row.try_get("name");
                let image: std::result::Result<Option<String>, sqlx::Error> =
                    row.try_get("image");
                match (name, image) {
                    (Ok(name), Ok(image_url)) => Some(ProductSummary { name, image_url }),
                    _ => None,
                }
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(%err, %product_id, "product lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl PreferenceSource for PostgresOrderStore {
    async fn preferences_for(&self, user_id: UserId) -> Option<NotificationPreferences> {
        match self.notification_preferences(user_id).await {
            Ok(prefs) => prefs,
            Err(err) => {
                tracing::warn!(%err, %user_id, "notification preference lookup failed");
                None
            }
        }
    }
}
