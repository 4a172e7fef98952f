//! Wire protocol for the realtime gateway
//!
//! Every frame in both directions is a JSON text frame of the form
//! `{"event": "<name>", "data": {...}}`.
//!
//! Inbound payloads are validated field by field so that a rejection can
//! name the offending field. Outbound payloads are plain serde structs with
//! camelCase keys.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use types::account::Role;
use types::ids::{OrderId, UserId};
use types::order::OrderStatus;

use crate::error::SocketError;

/// Upper bound for free-text fields (vendor messages, announcements)
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Raw inbound frame before the event name is resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, SocketError> {
        serde_json::from_str(text)
            .map_err(|e| SocketError::validation("event", format!("malformed frame: {e}")))
    }
}

/// Every event name the server can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutboundKind {
    Connected,
    Error,
    RoomJoined,
    RoomLeft,
    SessionReplaced,
    TrackingOrders,
    BalanceUpdated,
    PaymentCompleted,
    NewNotification,
    OrderReady,
    OrderStatusChanged,
    NewOrderNotification,
    DashboardUpdate,
    VendorMessage,
    MessageSent,
    AdminAnnouncement,
    SystemAnnouncement,
    NewTransaction,
    ForceDisconnect,
}

impl OutboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundKind::Connected => "connected",
            OutboundKind::Error => "error",
            OutboundKind::RoomJoined => "room-joined",
            OutboundKind::RoomLeft => "room-left",
            OutboundKind::SessionReplaced => "session-replaced",
            OutboundKind::TrackingOrders => "tracking-orders",
            OutboundKind::BalanceUpdated => "balance-updated",
            OutboundKind::PaymentCompleted => "payment-completed",
            OutboundKind::NewNotification => "new-notification",
            OutboundKind::OrderReady => "order-ready",
            OutboundKind::OrderStatusChanged => "order-status-changed",
            OutboundKind::NewOrderNotification => "new-order-notification",
            OutboundKind::DashboardUpdate => "dashboard-update",
            OutboundKind::VendorMessage => "vendor-message",
            OutboundKind::MessageSent => "message-sent",
            OutboundKind::AdminAnnouncement => "admin-announcement",
            OutboundKind::SystemAnnouncement => "system-announcement",
            OutboundKind::NewTransaction => "new-transaction",
            OutboundKind::ForceDisconnect => "force-disconnect",
        }
    }
}

/// One outbound application event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEvent {
    pub event: OutboundKind,
    pub data: Value,
}

impl ServerEvent {
    pub fn new<T: Serialize>(event: OutboundKind, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event,
            data: serde_json::to_value(payload)?,
        })
    }

    /// Like `new`, for the gateway's own payload structs. A serialization
    /// failure is logged and yields a `null` body instead of an error.
    pub fn encode<T: Serialize>(event: OutboundKind, payload: &T) -> Self {
        let data = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::error!(event = event.as_str(), error = %e, "failed to encode event payload");
            Value::Null
        });
        Self { event, data }
    }

    pub fn error(payload: &ErrorPayload) -> Self {
        Self::encode(OutboundKind::Error, payload)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What the writer half of a connection is asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    Close { code: u16, reason: String },
}

/// Body of every `error` event. Hints are only present when set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

impl ErrorPayload {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            limit: None,
            reset_at: None,
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn with_rate_limit(mut self, limit: u32, reset_at: DateTime<Utc>) -> Self {
        self.limit = Some(limit);
        self.reset_at = Some(reset_at);
        self
    }
}

// ---------------------------------------------------------------------------
// Inbound payload validation
// ---------------------------------------------------------------------------

fn object(data: &Value) -> Result<&Map<String, Value>, SocketError> {
    match data {
        Value::Object(map) => Ok(map),
        _ => Err(SocketError::validation("data", "expected an object")),
    }
}

fn optional_str<'a>(data: &'a Value, field: &str) -> Result<Option<&'a str>, SocketError> {
    match object(data)?.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(SocketError::validation(field, "must be a string")),
    }
}

fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, SocketError> {
    optional_str(data, field)?.ok_or_else(|| SocketError::validation(field, "is required"))
}

fn required_user_id(data: &Value, field: &str) -> Result<UserId, SocketError> {
    UserId::parse(required_str(data, field)?)
        .map_err(|e| SocketError::validation(field, e.to_string()))
}

fn required_order_id(data: &Value, field: &str) -> Result<OrderId, SocketError> {
    OrderId::parse(required_str(data, field)?)
        .map_err(|e| SocketError::validation(field, e.to_string()))
}

fn optional_order_id(data: &Value, field: &str) -> Result<Option<OrderId>, SocketError> {
    optional_str(data, field)?
        .map(|raw| {
            OrderId::parse(raw).map_err(|e| SocketError::validation(field, e.to_string()))
        })
        .transpose()
}

fn message_text(raw: &str, field: &str) -> Result<String, SocketError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SocketError::validation(field, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(SocketError::validation(
            field,
            format!("must be at most {MAX_MESSAGE_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// `join-user-room` / `leave-user-room`
#[derive(Debug, Clone, PartialEq)]
pub struct UserRoomRequest {
    pub user_id: UserId,
}

impl TryFrom<&Value> for UserRoomRequest {
    type Error = SocketError;

    fn try_from(data: &Value) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: required_user_id(data, "userId")?,
        })
    }
}

/// `join-order-room` / `leave-order-room`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRoomRequest {
    pub order_id: OrderId,
}

impl TryFrom<&Value> for OrderRoomRequest {
    type Error = SocketError;

    fn try_from(data: &Value) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: required_order_id(data, "orderId")?,
        })
    }
}

/// `update-order-status`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOrderStatusRequest {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// Minutes until the order is expected to be ready
    pub estimated_time: Option<u32>,
    pub message: Option<String>,
}

impl TryFrom<&Value> for UpdateOrderStatusRequest {
    type Error = SocketError;

    fn try_from(data: &Value) -> Result<Self, Self::Error> {
        let order_id = required_order_id(data, "orderId")?;
        let status = required_str(data, "status")?
            .parse::<OrderStatus>()
            .map_err(|e| SocketError::validation("status", e.to_string()))?;
        let estimated_time = match object(data)?.get("estimatedTime") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .and_then(|minutes| u32::try_from(minutes).ok())
                    .ok_or_else(|| {
                        SocketError::validation("estimatedTime", "must be a whole number of minutes")
                    })?,
            ),
        };
        let message = optional_str(data, "message")?
            .map(|raw| message_text(raw, "message"))
            .transpose()?;

        Ok(Self {
            order_id,
            status,
            estimated_time,
            message,
        })
    }
}

/// `send-customer-message`
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMessageRequest {
    pub user_id: UserId,
    pub message: String,
    pub order_id: Option<OrderId>,
}

impl TryFrom<&Value> for CustomerMessageRequest {
    type Error = SocketError;

    fn try_from(data: &Value) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: required_user_id(data, "userId")?,
            message: message_text(required_str(data, "message")?, "message")?,
            order_id: optional_order_id(data, "orderId")?,
        })
    }
}

/// `broadcast-announcement`
#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncementRequest {
    pub message: String,
    pub kind: String,
}

impl TryFrom<&Value> for AnnouncementRequest {
    type Error = SocketError;

    fn try_from(data: &Value) -> Result<Self, Self::Error> {
        Ok(Self {
            message: message_text(required_str(data, "message")?, "message")?,
            kind: optional_str(data, "type")?.unwrap_or("info").to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub user_id: UserId,
    pub user_type: Role,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomChange {
    pub room: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReplaced {
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForceDisconnect {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingOrders {
    pub order_ids: Vec<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdate {
    pub new_balance: Decimal,
    pub old_balance: Decimal,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompleted {
    pub amount: Decimal,
    pub new_balance: Decimal,
    pub payment_method: String,
    pub transaction_id: String,
}

/// Body of `new-notification`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReady {
    pub order_id: OrderId,
    pub item_name: String,
    pub message: String,
}

/// Status change as reported by the order workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChange {
    pub customer_id: UserId,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A freshly placed order as shown on the vendor surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub item_summary: String,
    pub total: Decimal,
    /// Extra fields forwarded untouched to the vendor client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionNotice {
    pub transaction_id: String,
    pub user_id: UserId,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorMessage {
    pub from_vendor: UserId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSent {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub message: String,
    #[serde(rename = "type", default = "default_announcement_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<UserId>,
}

fn default_announcement_kind() -> String {
    "info".to_string()
}
