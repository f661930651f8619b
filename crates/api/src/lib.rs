//! HTTP API server for the order backend.
//!
//! Exposes the order lifecycle (create, read, track, status
//! transitions, delete) with structured logging (tracing) and
//! Prometheus metrics. Notification dispatch runs on spawned tasks
//! after storage commits, so channel health never affects request
//! outcomes.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{CustomerDirectory, PreferenceSource, ProductCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use notify::{NotifyConfig, NotifyError, OrderEventDispatcher};
use order_store::{InMemoryOrderStore, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders/track", get(routes::orders::track))
        .route(
            "/orders/{id}",
            get(routes::orders::get).delete(routes::orders::delete),
        )
        .route("/orders/{id}/status", post(routes::orders::update_status))
        .route("/users/{id}/orders", get(routes::orders::list_for_user))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds application state around a store that also serves the
/// read-side lookups for the notification dispatcher.
pub fn create_state<S>(store: S, notify_config: &NotifyConfig) -> Result<Arc<AppState>, NotifyError>
where
    S: OrderStore + CustomerDirectory + ProductCatalog + PreferenceSource + Clone + 'static,
{
    let store = Arc::new(store);
    let dispatcher = OrderEventDispatcher::new(
        notify_config,
        store.clone(),
        store.clone(),
        store.clone(),
    )?;

    Ok(Arc::new(AppState {
        store,
        dispatcher: Arc::new(dispatcher),
    }))
}

/// Default in-memory state for tests and credential-free local runs.
pub fn create_default_state(
    notify_config: &NotifyConfig,
) -> Result<(Arc<AppState>, InMemoryOrderStore), NotifyError> {
    let store = InMemoryOrderStore::new();
    let state = create_state(store.clone(), notify_config)?;
    Ok((state, store))
}
