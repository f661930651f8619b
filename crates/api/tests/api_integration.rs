//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use notify::NotifyConfig;
use order_store::InMemoryOrderStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_config(config: NotifyConfig) -> (Router, InMemoryOrderStore) {
    let (state, store) = api::create_default_state(&config).expect("state");
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

fn setup() -> (Router, InMemoryOrderStore) {
    setup_with_config(NotifyConfig::default())
}

fn create_order_body() -> serde_json::Value {
    serde_json::json!({
        "customer_name": "Aline U.",
        "customer_phone": "0788123456",
        "channel": "store",
        "subtotal": 9000,
        "delivery_option": "kigali",
        "delivery_fee": 1500,
        "delivery_location": "Kacyiru",
        "items": [
            { "product_id": 7, "quantity": 2, "unit_price": 4500 }
        ]
    })
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();
    let (status, body) = send_json(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_order_assigns_monthly_number() {
    let (app, _) = setup();

    let (status, body) = send_json(&app, "POST", "/orders", Some(create_order_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["order_number"], 1);
    assert_eq!(body["order"]["status"], "PENDING");
    assert_eq!(body["order"]["total"], 10500);
    assert_eq!(body["order"]["items"][0]["line_total"], 9000);
    assert!(body["order"]["reference"].as_str().unwrap().starts_with("#1 ("));
    // No admin WhatsApp configured: no deep link in the response.
    assert!(body["whatsapp_url"].is_null());

    let (status, body) = send_json(&app, "POST", "/orders", Some(create_order_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["order_number"], 2);
}

#[tokio::test]
async fn test_create_order_returns_admin_deep_link() {
    let config = NotifyConfig {
        admin_whatsapp: Some("0788883986".to_string()),
        ..NotifyConfig::default()
    };
    let (app, _) = setup_with_config(config);

    let (status, body) = send_json(&app, "POST", "/orders", Some(create_order_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let link = body["whatsapp_url"].as_str().expect("deep link expected");
    assert!(link.starts_with("https://wa.me/250788883986?text="));
}

#[tokio::test]
async fn test_create_order_rejects_invalid_input() {
    let (app, store) = setup();

    let mut blank_phone = create_order_body();
    blank_phone["customer_phone"] = serde_json::json!("   ");
    let (status, body) = send_json(&app, "POST", "/orders", Some(blank_phone)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("phone"));

    let mut no_items = create_order_body();
    no_items["items"] = serde_json::json!([]);
    let (status, _) = send_json(&app, "POST", "/orders", Some(no_items)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(store.order_count().await, 0, "rejected before any side effect");
}

#[tokio::test]
async fn test_creation_unaffected_by_failing_providers() {
    // Every provider is configured but points at a dead endpoint; the
    // admin channels are fully wired. Order creation must still
    // succeed untouched.
    let config = NotifyConfig {
        admin_notification_emails: vec!["orders@example.com".to_string()],
        admin_whatsapp: Some("0788883986".to_string()),
        email: notify::EmailConfig {
            webhook_url: Some("http://127.0.0.1:1/mail".to_string()),
            smtp: None,
        },
        whatsapp: notify::WhatsAppConfig {
            green_api: Some(notify::GreenApiConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                instance_id: "42".to_string(),
                api_token: "tok".to_string(),
            }),
            chat_api: None,
            callmebot: None,
        },
        sms: notify::SmsConfig {
            webhook_url: Some("http://127.0.0.1:1/sms".to_string()),
            sender: "Storefront".to_string(),
        },
        ..NotifyConfig::default()
    };
    let (app, store) = setup_with_config(config);

    let (status, body) = send_json(&app, "POST", "/orders", Some(create_order_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["order_number"], 1);
    assert_eq!(store.order_count().await, 1);

    // Status updates are equally unaffected.
    let id = body["order"]["id"].as_i64().unwrap();
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "SHIPPED", "tracking_number": "DHL-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SHIPPED");
}

#[tokio::test]
async fn test_get_missing_order_is_404() {
    let (app, _) = setup();
    let (status, body) = send_json(&app, "GET", "/orders/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_update_status_stamps_shipped_once() {
    let (app, _) = setup();

    let (_, created) = send_json(&app, "POST", "/orders", Some(create_order_body())).await;
    let id = created["order"]["id"].as_i64().unwrap();

    let (status, first) = send_json(
        &app,
        "POST",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "SHIPPED", "tracking_number": "DHL-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "SHIPPED");
    assert_eq!(first["tracking_number"], "DHL-1");
    let stamped = first["shipped_at"].as_str().expect("shipped_at stamped").to_string();

    let (status, second) = send_json(
        &app,
        "POST",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "SHIPPED", "tracking_number": "DHL-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        second["shipped_at"].as_str().unwrap(),
        stamped,
        "second SHIPPED must not re-stamp"
    );
    assert_eq!(second["tracking_number"], "DHL-2", "tracking still overwrites");
}

#[tokio::test]
async fn test_update_status_validates_input() {
    let (app, _) = setup();

    let (_, created) = send_json(&app, "POST", "/orders", Some(create_order_body())).await;
    let id = created["order"]["id"].as_i64().unwrap();

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "REFUNDED" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Unknown order status"));

    let (status, _) = send_json(
        &app,
        "POST",
        "/orders/424242/status",
        Some(serde_json::json!({ "status": "CONFIRMED" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_track_order_by_number_and_phone() {
    let (app, _) = setup();

    send_json(&app, "POST", "/orders", Some(create_order_body())).await;

    let (status, body) = send_json(
        &app,
        "GET",
        "/orders/track?number=1&phone=%2B250788123456",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_number"], 1);
    assert_eq!(body["customer_phone"], "0788123456");

    let (status, _) = send_json(&app, "GET", "/orders/track?number=1&phone=0733999999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_order() {
    let (app, _) = setup();

    let (_, created) = send_json(&app, "POST", "/orders", Some(create_order_body())).await;
    let id = created["order"]["id"].as_i64().unwrap();

    let (status, _) = send_json(&app, "DELETE", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "DELETE", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_order_history() {
    let (app, _) = setup();

    let mut body = create_order_body();
    body["user_id"] = serde_json::json!(9);
    send_json(&app, "POST", "/orders", Some(body.clone())).await;
    send_json(&app, "POST", "/orders", Some(body)).await;
    send_json(&app, "POST", "/orders", Some(create_order_body())).await;

    let (status, orders) = send_json(&app, "GET", "/users/9/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 2);

    let (status, orders) = send_json(&app, "GET", "/users/404/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let (app, _) = setup();
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
