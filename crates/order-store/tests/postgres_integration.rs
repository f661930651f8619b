//! PostgreSQL integration tests
//!
//! These tests share a single PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::{Money, ProductId, UserId};
use domain::{
    CustomerDirectory, NewOrder, NewOrderItem, NotificationPreferences, OrderStatus,
    PreferenceSource, ProductCatalog,
};
use order_store::{OrderStore, PostgresOrderStore, StoreError};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn store() -> PostgresOrderStore {
    let info = get_container_info().await;
    let pool = PgPool::connect(&info.connection_string).await.unwrap();
    PostgresOrderStore::new(pool)
}

fn draft(phone: &str) -> NewOrder {
    NewOrder {
        customer_name: Some("Integration Customer".to_string()),
        customer_phone: phone.to_string(),
        channel: Some("store".to_string()),
        subtotal: Money::new(9000),
        delivery_option: Some("kigali".to_string()),
        delivery_fee: Money::new(1500),
        delivery_location: Some("Kacyiru".to_string()),
        user_id: None,
        items: vec![
            NewOrderItem {
                product_id: ProductId::new(11),
                quantity: 2,
                unit_price: Money::new(3000),
            },
            NewOrderItem {
                product_id: ProductId::new(12),
                quantity: 1,
                unit_price: Money::new(3000),
            },
        ],
    }
}

#[tokio::test]
async fn create_and_reload_roundtrip() {
    let store = store().await;
    // A quiet corner of the calendar so other tests' months don't interfere.
    let now = Utc.with_ymd_and_hms(2031, 1, 5, 10, 0, 0).unwrap();

    let created = store.create_order(draft("0788111222"), now).await.unwrap();
    assert_eq!(created.order_number, 1);
    assert_eq!(created.status, OrderStatus::Pending);
    assert_eq!(created.items.len(), 2);

    let reloaded = store.order(created.id).await.unwrap().unwrap();
    assert_eq!(reloaded.order_number, created.order_number);
    assert_eq!(reloaded.customer_phone, "0788111222");
    assert_eq!(reloaded.subtotal, Money::new(9000));
    assert_eq!(reloaded.total(), Money::new(10500));
    assert_eq!(reloaded.items, created.items);
    assert_eq!(reloaded.created_at, now);
}

#[tokio::test]
async fn concurrent_creations_are_serialized_per_month() {
    let store = Arc::new(store().await);
    let now = Utc.with_ymd_and_hms(2031, 2, 10, 12, 0, 0).unwrap();

    let concurrent = 16;
    let mut handles = Vec::with_capacity(concurrent);
    for _ in 0..concurrent {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .create_order(draft("0788111333"), now)
                .await
                .unwrap()
                .order_number
        }));
    }

    let mut numbers = Vec::with_capacity(concurrent);
    for handle in handles {
        numbers.push(handle.await.unwrap());
    }
    numbers.sort_unstable();

    let expected: Vec<i32> = (1..=concurrent as i32).collect();
    assert_eq!(numbers, expected, "advisory lock must prevent duplicates and gaps");
}

#[tokio::test]
async fn sequence_resets_at_month_boundary() {
    let store = store().await;
    let march = Utc.with_ymd_and_hms(2031, 3, 31, 23, 0, 0).unwrap();
    let april = Utc.with_ymd_and_hms(2031, 4, 1, 1, 0, 0).unwrap();

    let a = store.create_order(draft("0788111444"), march).await.unwrap();
    let b = store.create_order(draft("0788111444"), march).await.unwrap();
    let c = store.create_order(draft("0788111444"), april).await.unwrap();

    assert_eq!(a.order_number, 1);
    assert_eq!(b.order_number, 2);
    assert_eq!(c.order_number, 1, "April restarts independent of March");
}

#[tokio::test]
async fn shipped_transition_stamps_once_and_updates_tracking() {
    let store = store().await;
    let now = Utc.with_ymd_and_hms(2031, 5, 2, 9, 0, 0).unwrap();
    let created = store.create_order(draft("0788111555"), now).await.unwrap();

    let first_ship = Utc.with_ymd_and_hms(2031, 5, 3, 9, 0, 0).unwrap();
    let (order, outcome) = store
        .update_status(created.id, OrderStatus::Shipped, Some("DHL-100"), first_ship)
        .await
        .unwrap();
    assert!(outcome.status_changed);
    assert!(outcome.shipped_stamped);
    assert_eq!(order.shipped_at, Some(first_ship));
    assert_eq!(order.tracking_number.as_deref(), Some("DHL-100"));

    let second_ship = Utc.with_ymd_and_hms(2031, 5, 4, 9, 0, 0).unwrap();
    let (order, outcome) = store
        .update_status(created.id, OrderStatus::Shipped, Some("DHL-200"), second_ship)
        .await
        .unwrap();
    assert!(!outcome.status_changed);
    assert!(!outcome.shipped_stamped);
    assert!(outcome.tracking_updated, "tracking always overwrites");
    assert_eq!(order.shipped_at, Some(first_ship), "stamp must not move");
    assert_eq!(order.tracking_number.as_deref(), Some("DHL-200"));

    let reloaded = store.order(created.id).await.unwrap().unwrap();
    assert_eq!(reloaded.shipped_at, Some(first_ship));
    assert_eq!(reloaded.tracking_number.as_deref(), Some("DHL-200"));
}

#[tokio::test]
async fn update_status_on_missing_order_is_not_found() {
    let store = store().await;
    let result = store
        .update_status(common::OrderId::new(999_999), OrderStatus::Shipped, None, Utc::now())
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn tracking_lookup_matches_normalized_phone() {
    let store = store().await;
    let now = Utc.with_ymd_and_hms(2031, 6, 2, 9, 0, 0).unwrap();
    let created = store.create_order(draft("0788111666"), now).await.unwrap();

    let found = store
        .find_by_number_and_phone(created.order_number, "+250 788 111 666")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);

    let miss = store
        .find_by_number_and_phone(created.order_number, "0733999999")
        .await
        .unwrap();
    assert!(miss.is_none());
}

#[tokio::test]
async fn delete_cascades_to_items() {
    let store = store().await;
    let now = Utc.with_ymd_and_hms(2031, 7, 2, 9, 0, 0).unwrap();
    let created = store.create_order(draft("0788111777"), now).await.unwrap();

    store.delete_order(created.id).await.unwrap();
    assert!(store.order(created.id).await.unwrap().is_none());

    let orphaned: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE order_id = $1")
            .bind(created.id.as_i64())
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(orphaned, 0, "items must be deleted with their order");
}

#[tokio::test]
async fn preferences_and_directory_lookups() {
    let store = store().await;

    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, name) VALUES ($1, $2) RETURNING id",
    )
    .bind("aline@example.com")
    .bind("Aline U.")
    .fetch_one(store.pool())
    .await
    .unwrap();
    let user = UserId::new(user_id);

    assert_eq!(store.notification_preferences(user).await.unwrap(), None);
    assert_eq!(
        store.email_for_user(user).await.as_deref(),
        Some("aline@example.com")
    );

    let prefs = NotificationPreferences {
        email_order_updates: true,
        sms_order_updates: true,
    };
    store.set_notification_preferences(user, prefs).await.unwrap();
    assert_eq!(store.preferences_for(user).await, Some(prefs));

    // Upsert replaces.
    let prefs = NotificationPreferences {
        email_order_updates: false,
        sms_order_updates: false,
    };
    store.set_notification_preferences(user, prefs).await.unwrap();
    assert_eq!(
        store.notification_preferences(user).await.unwrap(),
        Some(prefs)
    );
}

#[tokio::test]
async fn product_catalog_lookup() {
    let store = store().await;

    let product_id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, image, price) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind("Wax Print Fabric")
    .bind("https://cdn.example.com/fabric.jpg")
    .bind(4500_i64)
    .fetch_one(store.pool())
    .await
    .unwrap();

    let summary = store.summary(ProductId::new(product_id)).await.unwrap();
    assert_eq!(summary.name, "Wax Print Fabric");
    assert_eq!(
        summary.image_url.as_deref(),
        Some("https://cdn.example.com/fabric.jpg")
    );

    assert!(store.summary(ProductId::new(999_999)).await.is_none());
}
