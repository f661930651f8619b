//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use domain::{NewOrder, NewOrderItem, Order, OrderStatus};
use notify::OrderEventDispatcher;
use order_store::OrderStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub dispatcher: Arc<OrderEventDispatcher>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: Option<String>,
    pub customer_phone: String,
    pub channel: Option<String>,
    pub subtotal: i64,
    pub delivery_option: Option<String>,
    #[serde(default)]
    pub delivery_fee: i64,
    pub delivery_location: Option<String>,
    pub user_id: Option<i64>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: u32,
    pub unit_price: i64,
}

impl CreateOrderRequest {
    fn into_draft(self) -> NewOrder {
        NewOrder {
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            channel: self.channel,
            subtotal: Money::new(self.subtotal),
            delivery_option: self.delivery_option,
            delivery_fee: Money::new(self.delivery_fee),
            delivery_location: self.delivery_location,
            user_id: self.user_id.map(UserId::new),
            items: self
                .items
                .into_iter()
                .map(|item| NewOrderItem {
                    product_id: ProductId::new(item.product_id),
                    quantity: item.quantity,
                    unit_price: Money::new(item.unit_price),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub number: i32,
    pub phone: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub order_number: i32,
    /// Human reference: the monthly number with its month/year.
    pub reference: String,
    pub customer_name: Option<String>,
    pub customer_phone: String,
    pub channel: Option<String>,
    pub status: String,
    pub subtotal: i64,
    pub delivery_option: Option<String>,
    pub delivery_fee: i64,
    pub delivery_location: Option<String>,
    pub total: i64,
    pub user_id: Option<i64>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub quantity: u32,
    pub unit_price: i64,
    pub line_total: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.as_i64(),
            order_number: order.order_number,
            reference: order.reference(),
            status: order.status.to_string(),
            subtotal: order.subtotal.amount(),
            delivery_fee: order.delivery_fee.amount(),
            total: order.total().amount(),
            user_id: order.user_id.map(|id| id.as_i64()),
            items: order
                .items
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.as_i64(),
                    quantity: item.quantity,
                    unit_price: item.unit_price.amount(),
                    line_total: item.line_total().amount(),
                })
                .collect(),
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            channel: order.channel,
            delivery_option: order.delivery_option,
            delivery_location: order.delivery_location,
            tracking_number: order.tracking_number,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub order: OrderResponse,
    /// Pre-built admin deep link for manual follow-up; delivery itself
    /// happens off the request path.
    pub whatsapp_url: Option<String>,
}

// -- Handlers --

/// POST /orders — validate, persist (sequencer inside the store
/// transaction), then fire notifications off the critical path.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let order = state.store.create_order(req.into_draft(), Utc::now()).await?;

    // Only link construction happens before the response goes out.
    let whatsapp_url = state.dispatcher.admin_order_link(&order).await;

    let dispatcher = state.dispatcher.clone();
    let created = order.clone();
    tokio::spawn(async move {
        dispatcher.order_created(&created).await;
    });

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order: order.into(),
            whatsapp_url,
        }),
    ))
}

/// GET /orders/{id} — load one order.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .store
        .order(OrderId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(order.into()))
}

/// GET /orders/track?number=&phone= — guest order tracking by monthly
/// number and phone.
#[tracing::instrument(skip(state, query))]
pub async fn track(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .store
        .find_by_number_and_phone(query.number, &query.phone)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No order #{} for that phone", query.number))
        })?;
    Ok(Json(order.into()))
}

/// GET /users/{id}/orders — order history for an account.
#[tracing::instrument(skip(state))]
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.store.orders_for_user(UserId::new(user_id)).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// POST /orders/{id}/status — run the status transition and fire the
/// matching notifications off the critical path.
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let new_status: OrderStatus = req.status.parse()?;

    let (order, outcome) = state
        .store
        .update_status(
            OrderId::new(id),
            new_status,
            req.tracking_number.as_deref(),
            Utc::now(),
        )
        .await?;

    let dispatcher = state.dispatcher.clone();
    let updated = order.clone();
    tokio::spawn(async move {
        dispatcher.status_changed(&updated, &outcome).await;
    });

    Ok(Json(order.into()))
}

/// DELETE /orders/{id} — administrative deletion, cascades to items.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_order(OrderId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
