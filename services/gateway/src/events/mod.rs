//! Event Router
//!
//! Binds inbound named events to handlers scoped by the caller's role. Each
//! role maps to a fixed table of event names, built once and shared by every
//! session of that role; an event outside the caller's table is unknown, not
//! forbidden.
//!
//! Every frame runs the same gate chain before its handler: rate limit, frame
//! shape, role table, payload shape, then ownership inside the handler. Any
//! failure, including a panic inside a handler, becomes an `error` event for
//! the caller. Nothing here closes the connection.

mod admin;
mod common;
mod customer;
mod vendor;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};
use types::account::Role;
use types::ids::{ConnectionId, OrderId, UserId};
use types::order::OrderRecord;

use crate::config::OrderReadyPolicy;
use crate::directory::OrderDirectory;
use crate::error::SocketError;
use crate::manager::ConnectionManager;
use crate::notifier::{EmitError, NotificationEmitter};
use crate::protocol::{ClientFrame, OutboundKind, ServerEvent};
use crate::rate_limit::RateLimiter;
use crate::session::SessionInfo;

/// Source of "now" for rate limit windows
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundEvent {
    JoinUserRoom,
    LeaveUserRoom,
    JoinOrderRoom,
    LeaveOrderRoom,
    TrackMyOrders,
    UpdateOrderStatus,
    SendCustomerMessage,
    BroadcastAnnouncement,
    MonitorTransactions,
}

impl InboundEvent {
    const BASELINE: [InboundEvent; 4] = [
        InboundEvent::JoinUserRoom,
        InboundEvent::LeaveUserRoom,
        InboundEvent::JoinOrderRoom,
        InboundEvent::LeaveOrderRoom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::JoinUserRoom => "join-user-room",
            InboundEvent::LeaveUserRoom => "leave-user-room",
            InboundEvent::JoinOrderRoom => "join-order-room",
            InboundEvent::LeaveOrderRoom => "leave-order-room",
            InboundEvent::TrackMyOrders => "track-my-orders",
            InboundEvent::UpdateOrderStatus => "update-order-status",
            InboundEvent::SendCustomerMessage => "send-customer-message",
            InboundEvent::BroadcastAnnouncement => "broadcast-announcement",
            InboundEvent::MonitorTransactions => "monitor-transactions",
        }
    }

    fn role_specific(role: Role) -> &'static [InboundEvent] {
        match role {
            Role::Customer => &[InboundEvent::TrackMyOrders],
            Role::Vendor => &[
                InboundEvent::UpdateOrderStatus,
                InboundEvent::SendCustomerMessage,
            ],
            Role::Admin => &[
                InboundEvent::BroadcastAnnouncement,
                InboundEvent::MonitorTransactions,
            ],
        }
    }
}

/// Event name → handler for one role
#[derive(Debug)]
pub struct HandlerTable {
    events: HashMap<&'static str, InboundEvent>,
}

impl HandlerTable {
    pub fn for_role(role: Role) -> Self {
        let events = InboundEvent::BASELINE
            .iter()
            .chain(InboundEvent::role_specific(role))
            .map(|event| (event.name(), *event))
            .collect();
        Self { events }
    }

    pub fn resolve(&self, name: &str) -> Option<InboundEvent> {
        self.events.get(name).copied()
    }
}

/// The session an inbound frame arrived on, with its role's handler table
/// attached.
#[derive(Debug, Clone)]
pub struct Caller {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub role: Role,
    handlers: Arc<HandlerTable>,
}

pub struct EventRouter {
    manager: Arc<ConnectionManager>,
    orders: Arc<dyn OrderDirectory>,
    limiter: Arc<RateLimiter>,
    notifier: NotificationEmitter,
    ready_policy: OrderReadyPolicy,
    tables: HashMap<Role, Arc<HandlerTable>>,
    clock: Clock,
}

impl EventRouter {
    pub fn new(
        manager: Arc<ConnectionManager>,
        orders: Arc<dyn OrderDirectory>,
        limiter: Arc<RateLimiter>,
        notifier: NotificationEmitter,
        ready_policy: OrderReadyPolicy,
    ) -> Self {
        let tables = Role::ALL
            .iter()
            .map(|role| (*role, Arc::new(HandlerTable::for_role(*role))))
            .collect();
        Self {
            manager,
            orders,
            limiter,
            notifier,
            ready_policy,
            tables,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Attach the handler table for a freshly connected session.
    pub fn caller(&self, info: &SessionInfo) -> Caller {
        let handlers = self
            .tables
            .get(&info.role)
            .cloned()
            .unwrap_or_else(|| Arc::new(HandlerTable::for_role(info.role)));
        Caller {
            connection_id: info.connection_id,
            user_id: info.user_id.clone(),
            role: info.role,
            handlers,
        }
    }

    /// Run one inbound text frame and report any failure back to the caller
    /// as an `error` event. Returns false if the frame was rejected.
    pub async fn dispatch(&self, caller: &Caller, text: &str) -> bool {
        match self.handle(caller, text).await {
            Ok(()) => true,
            Err(err) => {
                self.log_rejection(caller, &err);
                self.manager
                    .send_to_connection(caller.connection_id, ServerEvent::error(&err.to_payload()));
                false
            }
        }
    }

    /// Gate chain plus handler, without the error reply.
    pub async fn handle(&self, caller: &Caller, text: &str) -> Result<(), SocketError> {
        if !self.manager.is_live(caller.connection_id) {
            debug!(connection_id = %caller.connection_id, "frame for closed session ignored");
            return Ok(());
        }

        let remaining = self.limiter.check(&caller.user_id, (self.clock)())?;
        let frame = ClientFrame::parse(text)?;
        let event = caller
            .handlers
            .resolve(&frame.event)
            .ok_or_else(|| SocketError::UnknownEvent(frame.event.clone()))?;

        debug!(
            user_id = %caller.user_id,
            event = event.name(),
            remaining,
            "dispatching event"
        );

        AssertUnwindSafe(self.run(caller, event, &frame.data))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(user_id = %caller.user_id, event = event.name(), "event handler panicked");
                Err(SocketError::Internal(format!("{} handler panicked", event.name())))
            })
    }

    async fn run(
        &self,
        caller: &Caller,
        event: InboundEvent,
        data: &Value,
    ) -> Result<(), SocketError> {
        match event {
            InboundEvent::JoinUserRoom => common::join_user_room(self, caller, data),
            InboundEvent::LeaveUserRoom => common::leave_user_room(self, caller, data),
            InboundEvent::JoinOrderRoom => common::join_order_room(self, caller, data).await,
            InboundEvent::LeaveOrderRoom => common::leave_order_room(self, caller, data),
            InboundEvent::TrackMyOrders => customer::track_my_orders(self, caller).await,
            InboundEvent::UpdateOrderStatus => vendor::update_order_status(self, caller, data).await,
            InboundEvent::SendCustomerMessage => {
                vendor::send_customer_message(self, caller, data).await
            }
            InboundEvent::BroadcastAnnouncement => {
                admin::broadcast_announcement(self, caller, data)
            }
            InboundEvent::MonitorTransactions => admin::monitor_transactions(self, caller),
        }
    }

    fn log_rejection(&self, caller: &Caller, err: &SocketError) {
        match err {
            SocketError::Upstream(source) => {
                error!(user_id = %caller.user_id, error = %source, "upstream lookup failed")
            }
            SocketError::Internal(detail) => {
                error!(user_id = %caller.user_id, detail = %detail, "event failed")
            }
            SocketError::RateLimited(_) | SocketError::Ownership(_) => {
                warn!(user_id = %caller.user_id, code = err.code(), "event rejected")
            }
            SocketError::Validation { .. } | SocketError::UnknownEvent(_) => {
                debug!(user_id = %caller.user_id, error = %err, "event rejected")
            }
        }
    }

    /// Send a reply to the caller's own connection.
    fn reply<T: Serialize>(&self, caller: &Caller, kind: OutboundKind, payload: &T) {
        self.manager
            .send_to_connection(caller.connection_id, ServerEvent::encode(kind, payload));
    }

    /// Fetch an order the caller is entitled to act on. A missing order is
    /// reported the same way as someone else's order.
    async fn authorize_order(
        &self,
        caller: &Caller,
        order_id: &OrderId,
    ) -> Result<OrderRecord, SocketError> {
        match self.orders.find_order(order_id).await? {
            Some(order) if order.grants_access(&caller.user_id, caller.role) => Ok(order),
            _ => Err(SocketError::ownership(format!(
                "Not permitted to access order {order_id}"
            ))),
        }
    }
}

impl From<EmitError> for SocketError {
    fn from(err: EmitError) -> Self {
        SocketError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_scoped_by_role() {
        let customer = HandlerTable::for_role(Role::Customer);
        let vendor = HandlerTable::for_role(Role::Vendor);
        let admin = HandlerTable::for_role(Role::Admin);

        for table in [&customer, &vendor, &admin] {
            assert_eq!(table.resolve("join-order-room"), Some(InboundEvent::JoinOrderRoom));
            assert_eq!(table.resolve("leave-user-room"), Some(InboundEvent::LeaveUserRoom));
        }

        assert_eq!(customer.resolve("track-my-orders"), Some(InboundEvent::TrackMyOrders));
        assert_eq!(customer.resolve("update-order-status"), None);
        assert_eq!(vendor.resolve("broadcast-announcement"), None);
        assert_eq!(
            admin.resolve("monitor-transactions"),
            Some(InboundEvent::MonitorTransactions)
        );
        assert_eq!(admin.resolve("track-my-orders"), None);

        let every_event = [
            InboundEvent::JoinUserRoom,
            InboundEvent::LeaveUserRoom,
            InboundEvent::JoinOrderRoom,
            InboundEvent::LeaveOrderRoom,
            InboundEvent::TrackMyOrders,
            InboundEvent::UpdateOrderStatus,
            InboundEvent::SendCustomerMessage,
            InboundEvent::BroadcastAnnouncement,
            InboundEvent::MonitorTransactions,
        ];
        let resolvable = |table: &HandlerTable| {
            every_event
                .iter()
                .filter(|event| table.resolve(event.name()).is_some())
                .count()
        };
        assert_eq!(resolvable(&customer), 5);
        assert_eq!(resolvable(&vendor), 6);
        assert_eq!(resolvable(&admin), 6);
    }
}
