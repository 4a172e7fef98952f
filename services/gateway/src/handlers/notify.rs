//! Internal HTTP entry points for workflows running in other processes.
//! Each one forwards to the Notification Emitter and answers 202 with the
//! number of sessions reached.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use types::ids::{OrderId, UserId};
use types::order::OrderStatus;

use crate::error::AppError;
use crate::notifier::Delivery;
use crate::protocol::{
    Announcement, BalanceUpdate, NewOrder, Notification, OrderStatusChange, PaymentCompleted,
    TransactionNotice,
};
use crate::state::AppState;

type Accepted = (StatusCode, Json<Delivery>);

fn accepted(delivery: Delivery) -> Accepted {
    (StatusCode::ACCEPTED, Json(delivery))
}

/// A payload addressed to one user
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForUser<T> {
    pub user_id: UserId,
    #[serde(flatten)]
    pub payload: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusRequest {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub change: OrderStatusChange,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOrderRequest {
    pub vendor_id: UserId,
    #[serde(flatten)]
    pub order: NewOrder,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReadyRequest {
    pub user_id: UserId,
    pub order_id: OrderId,
    pub item_name: String,
    /// `completed` switches to completion wording
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

pub async fn balance(
    State(state): State<AppState>,
    Json(req): Json<ForUser<BalanceUpdate>>,
) -> Result<Accepted, AppError> {
    let delivery = state.notifier.emit_balance_update(&req.user_id, &req.payload)?;
    Ok(accepted(delivery))
}

pub async fn payment(
    State(state): State<AppState>,
    Json(req): Json<ForUser<PaymentCompleted>>,
) -> Result<Accepted, AppError> {
    let delivery = state.notifier.emit_payment_completed(&req.user_id, &req.payload)?;
    Ok(accepted(delivery))
}

pub async fn notification(
    State(state): State<AppState>,
    Json(req): Json<ForUser<Notification>>,
) -> Result<Accepted, AppError> {
    let delivery = state.notifier.emit_notification(&req.user_id, &req.payload)?;
    Ok(accepted(delivery))
}

pub async fn order_status(
    State(state): State<AppState>,
    Json(req): Json<OrderStatusRequest>,
) -> Result<Accepted, AppError> {
    let delivery = state
        .notifier
        .emit_order_status_change(&req.order_id, &req.change)?;
    Ok(accepted(delivery))
}

pub async fn vendor_order(
    State(state): State<AppState>,
    Json(req): Json<VendorOrderRequest>,
) -> Result<Accepted, AppError> {
    let delivery = state
        .notifier
        .emit_new_order_to_vendor(&req.vendor_id, &req.order)?;
    Ok(accepted(delivery))
}

pub async fn order_ready(
    State(state): State<AppState>,
    Json(req): Json<OrderReadyRequest>,
) -> Result<Accepted, AppError> {
    let delivery = match req.status {
        Some(OrderStatus::Completed) => {
            state
                .notifier
                .emit_order_completion(&req.user_id, &req.order_id, &req.item_name)?
        }
        _ => state
            .notifier
            .emit_order_ready(&req.user_id, &req.order_id, &req.item_name)?,
    };
    Ok(accepted(delivery))
}

pub async fn transaction(
    State(state): State<AppState>,
    Json(req): Json<TransactionNotice>,
) -> Result<Accepted, AppError> {
    let delivery = state.notifier.emit_transaction_for_admin(&req)?;
    Ok(accepted(delivery))
}

pub async fn announcement(
    State(state): State<AppState>,
    Json(req): Json<Announcement>,
) -> Result<Accepted, AppError> {
    let delivery = state.notifier.broadcast_announcement(&req)?;
    Ok(accepted(delivery))
}

#[derive(Debug, Deserialize)]
pub struct EvictQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Evicted {
    pub evicted: bool,
}

/// POST /internal/sessions/{user_id}/evict?reason=...
pub async fn evict(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<EvictQuery>,
) -> Result<Json<Evicted>, AppError> {
    let user_id = UserId::parse(&user_id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let reason = query.reason.as_deref().unwrap_or("admin-eviction");

    if !state.manager.evict(&user_id, reason).await {
        return Err(AppError::NotFound(format!("no live session for {user_id}")));
    }
    Ok(Json(Evicted { evicted: true }))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub sessions: usize,
    pub rooms: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let stats = state.manager.stats();
    Json(Health {
        status: if state.manager.is_running() { "ok" } else { "stopped" },
        sessions: stats.sessions,
        rooms: stats.rooms,
    })
}
