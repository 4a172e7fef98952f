//! Notification Emitter
//!
//! Push API for order, payment and admin workflows. Every call is
//! fire-and-forget: the durable state change has already happened, so an
//! offline target simply misses the event. Calls never block on delivery and
//! never fail the caller's primary operation; the returned `Result` only
//! tells the caller whether the realtime layer was up.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use types::ids::{OrderId, UserId};
use types::order::OrderStatus;

use crate::manager::ConnectionManager;
use crate::protocol::{
    Announcement, BalanceUpdate, NewOrder, Notification, OrderReady, OrderStatusChange,
    OutboundKind, PaymentCompleted, ServerEvent, TransactionNotice,
};
use crate::rooms::Room;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("realtime layer is not initialized")]
    Uninitialized,

    #[error("failed to encode {event} payload: {source}")]
    Encode {
        event: &'static str,
        source: serde_json::Error,
    },
}

/// Who an outbound notification is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(UserId),
    Room(Room),
    Everyone,
}

/// A typed event plus its target. Built here, handed to the manager, then
/// dropped; there is no receipt and no retry.
#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub target: Target,
    pub event: ServerEvent,
}

/// Sessions reached by one emitter call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub delivered: usize,
}

impl Delivery {
    fn merge(self, other: Delivery) -> Delivery {
        Delivery {
            delivered: self.delivered + other.delivered,
        }
    }
}

/// Customer-facing wording for a status change
pub fn status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Your order has been received",
        OrderStatus::Confirmed => "Your order has been confirmed",
        OrderStatus::Preparing => "Your order is being prepared",
        OrderStatus::Ready => "Your order is ready for pickup",
        OrderStatus::Completed => "Your order has been completed",
        OrderStatus::Cancelled => "Your order has been cancelled",
    }
}

/// Notification `type` for a status change
pub fn status_notification_kind(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Cancelled => "order-cancelled",
        _ => "order-update",
    }
}

#[derive(Clone, Default)]
pub struct NotificationEmitter {
    manager: Option<Arc<ConnectionManager>>,
}

impl NotificationEmitter {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager: Some(manager),
        }
    }

    /// An emitter with no realtime layer behind it. Every call returns
    /// `EmitError::Uninitialized`.
    pub fn detached() -> Self {
        Self { manager: None }
    }

    fn build<T: Serialize>(
        target: Target,
        event: OutboundKind,
        payload: &T,
    ) -> Result<OutboundNotification, EmitError> {
        let event = ServerEvent::new(event, payload).map_err(|source| EmitError::Encode {
            event: event.as_str(),
            source,
        })?;
        Ok(OutboundNotification { target, event })
    }

    /// Hand one notification to the transport layer.
    pub fn dispatch(&self, notification: OutboundNotification) -> Result<Delivery, EmitError> {
        let manager = match &self.manager {
            Some(manager) if manager.is_running() => manager,
            _ => {
                warn!(
                    event = notification.event.event.as_str(),
                    "dropping notification, realtime layer not initialized"
                );
                return Err(EmitError::Uninitialized);
            }
        };

        let delivered = match &notification.target {
            Target::User(user_id) => manager.emit_to_user(user_id, &notification.event),
            Target::Room(room) => manager.emit_to_room(room, &notification.event),
            Target::Everyone => manager.broadcast(&notification.event),
        };

        if delivered == 0 {
            debug!(
                event = notification.event.event.as_str(),
                target = ?notification.target,
                "no live session for notification target"
            );
        }
        Ok(Delivery { delivered })
    }

    fn emit<T: Serialize>(
        &self,
        target: Target,
        event: OutboundKind,
        payload: &T,
    ) -> Result<Delivery, EmitError> {
        let notification = Self::build(target, event, payload).inspect_err(|e| {
            warn!(error = %e, "dropping notification");
        })?;
        self.dispatch(notification)
    }

    /// `balance-updated` → `user-{userId}`
    pub fn emit_balance_update(
        &self,
        user_id: &UserId,
        update: &BalanceUpdate,
    ) -> Result<Delivery, EmitError> {
        self.emit(Target::User(user_id.clone()), OutboundKind::BalanceUpdated, update)
    }

    /// `payment-completed` → `user-{userId}`
    pub fn emit_payment_completed(
        &self,
        user_id: &UserId,
        payment: &PaymentCompleted,
    ) -> Result<Delivery, EmitError> {
        self.emit(
            Target::User(user_id.clone()),
            OutboundKind::PaymentCompleted,
            payment,
        )
    }

    /// `new-notification` → `user-{userId}`
    pub fn emit_notification(
        &self,
        user_id: &UserId,
        notification: &Notification,
    ) -> Result<Delivery, EmitError> {
        self.emit(
            Target::User(user_id.clone()),
            OutboundKind::NewNotification,
            notification,
        )
    }

    /// `order-status-changed` → `order-{orderId}`, plus a `new-notification`
    /// to the order's customer.
    pub fn emit_order_status_change(
        &self,
        order_id: &OrderId,
        change: &OrderStatusChange,
    ) -> Result<Delivery, EmitError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct StatusChanged<'a> {
            order_id: &'a OrderId,
            #[serde(flatten)]
            change: &'a OrderStatusChange,
            timestamp: chrono::DateTime<Utc>,
        }

        let room_delivery = self.emit(
            Target::Room(Room::Order(order_id.clone())),
            OutboundKind::OrderStatusChanged,
            &StatusChanged {
                order_id,
                change,
                timestamp: Utc::now(),
            },
        )?;

        let message = match &change.message {
            Some(extra) => format!("{} - {}", status_message(change.status), extra),
            None => status_message(change.status).to_string(),
        };
        let notification = Notification {
            message,
            kind: status_notification_kind(change.status).to_string(),
            order_id: Some(order_id.clone()),
            data: Some(serde_json::json!({
                "status": change.status,
                "estimatedTime": change.estimated_time,
                "itemSummary": change.item_summary,
            })),
        };
        let customer_delivery = self.emit_notification(&change.customer_id, &notification)?;

        Ok(room_delivery.merge(customer_delivery))
    }

    /// `new-order-notification` → `user-{vendorId}` and `dashboard-update` →
    /// `vendor-dashboard-{vendorId}`. Sent to both so a vendor watching
    /// either surface sees the order.
    pub fn emit_new_order_to_vendor(
        &self,
        vendor_id: &UserId,
        order: &NewOrder,
    ) -> Result<Delivery, EmitError> {
        let direct = self.emit(
            Target::User(vendor_id.clone()),
            OutboundKind::NewOrderNotification,
            order,
        )?;
        let dashboard = self.emit(
            Target::Room(Room::VendorDashboard(vendor_id.clone())),
            OutboundKind::DashboardUpdate,
            &serde_json::json!({
                "type": "new-order",
                "order": order,
            }),
        )?;
        Ok(direct.merge(dashboard))
    }

    fn pickup_message(status: OrderStatus, item_name: &str) -> String {
        format!("{}: {}", status_message(status), item_name)
    }

    /// Only the `order-ready` half of a pickup notice. Used after a status
    /// change has already produced the customer's `new-notification`.
    pub fn emit_ready_signal(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        item_name: &str,
        status: OrderStatus,
    ) -> Result<Delivery, EmitError> {
        self.emit(
            Target::User(user_id.clone()),
            OutboundKind::OrderReady,
            &OrderReady {
                order_id: order_id.clone(),
                item_name: item_name.to_string(),
                message: Self::pickup_message(status, item_name),
            },
        )
    }

    fn emit_pickup(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        item_name: &str,
        status: OrderStatus,
    ) -> Result<Delivery, EmitError> {
        let notification = self.emit_notification(
            user_id,
            &Notification {
                message: Self::pickup_message(status, item_name),
                kind: status_notification_kind(status).to_string(),
                order_id: Some(order_id.clone()),
                data: Some(serde_json::json!({ "status": status, "itemName": item_name })),
            },
        )?;
        let ready = self.emit_ready_signal(user_id, order_id, item_name, status)?;
        Ok(notification.merge(ready))
    }

    /// `new-notification` + `order-ready` → `user-{userId}`
    pub fn emit_order_ready(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        item_name: &str,
    ) -> Result<Delivery, EmitError> {
        self.emit_pickup(user_id, order_id, item_name, OrderStatus::Ready)
    }

    /// Same pair of events as `emit_order_ready`, worded for completion
    pub fn emit_order_completion(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        item_name: &str,
    ) -> Result<Delivery, EmitError> {
        self.emit_pickup(user_id, order_id, item_name, OrderStatus::Completed)
    }

    /// `new-transaction` → `admin-monitoring`
    pub fn emit_transaction_for_admin(
        &self,
        transaction: &TransactionNotice,
    ) -> Result<Delivery, EmitError> {
        self.emit(
            Target::Room(Room::AdminMonitoring),
            OutboundKind::NewTransaction,
            transaction,
        )
    }

    /// `system-announcement` → every live session
    pub fn broadcast_announcement(
        &self,
        announcement: &Announcement,
    ) -> Result<Delivery, EmitError> {
        #[derive(Serialize)]
        struct Stamped<'a> {
            #[serde(flatten)]
            announcement: &'a Announcement,
            timestamp: chrono::DateTime<Utc>,
        }

        self.emit(
            Target::Everyone,
            OutboundKind::SystemAnnouncement,
            &Stamped {
                announcement,
                timestamp: Utc::now(),
            },
        )
    }
}
