//! Named broadcast groups.
//!
//! Room names on the wire:
//! - `user-{userId}`: every session joins its own on connect
//! - `order-{orderId}`: joined on demand after an ownership check
//! - `vendor-dashboard-{vendorId}`: auto-joined by vendor sessions
//! - `admin-monitoring`: joined on demand by admins

use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use types::ids::{ConnectionId, OrderId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    User(UserId),
    Order(OrderId),
    VendorDashboard(UserId),
    AdminMonitoring,
}

impl Room {
    const USER_PREFIX: &'static str = "user-";
    const ORDER_PREFIX: &'static str = "order-";
    const VENDOR_DASHBOARD_PREFIX: &'static str = "vendor-dashboard-";
    const ADMIN_MONITORING: &'static str = "admin-monitoring";

    pub fn name(&self) -> String {
        match self {
            Room::User(id) => format!("{}{}", Self::USER_PREFIX, id),
            Room::Order(id) => format!("{}{}", Self::ORDER_PREFIX, id),
            Room::VendorDashboard(id) => format!("{}{}", Self::VENDOR_DASHBOARD_PREFIX, id),
            Room::AdminMonitoring => Self::ADMIN_MONITORING.to_string(),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Room → member connections. Empty rooms are dropped.
#[derive(Default)]
pub struct RoomTable {
    rooms: DashMap<Room, HashSet<ConnectionId>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the connection was not already a member
    pub fn join(&self, room: Room, conn: ConnectionId) -> bool {
        self.rooms.entry(room).or_default().insert(conn)
    }

    /// Returns true if the connection was a member
    pub fn leave(&self, room: &Room, conn: ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) => members.remove(&conn),
            None => false,
        };
        self.rooms.remove_if(room, |_, members| members.is_empty());
        removed
    }

    pub fn members(&self, room: &Room) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, room: &Room, conn: ConnectionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&conn))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn clear(&self) {
        self.rooms.clear();
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn user_and_vendor_rooms_never_collide(id in "[a-zA-Z0-9-]{1,24}") {
            let user = Room::User(UserId::new(id.clone()));
            let dashboard = Room::VendorDashboard(UserId::new(id.clone()));
            prop_assert_ne!(user.name(), dashboard.name());
            prop_assert_eq!(Room::Order(OrderId::new(id.clone())).name(), format!("order-{id}"));
        }
    }
}
