//! Order lifecycle types
//!
//! `pending → confirmed → preparing → ready → completed`, with `cancelled`
//! reachable from any non-terminal state. The order service owns transition
//! legality; the gateway only reacts to the status it is told about.

use crate::account::Role;
use crate::errors::TypesError;
use crate::ids::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// No further transitions possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypesError::UnknownStatus(s.to_string()))
    }
}

/// What the order directory knows about an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: UserId,
    pub vendor_id: UserId,
    pub status: OrderStatus,
    /// Short human-readable description, e.g. "2x Chicken Rice"
    pub item_summary: String,
}

impl OrderRecord {
    /// Ownership rule for order-scoped actions: the order's customer, the
    /// order's vendor, or any admin.
    pub fn grants_access(&self, user_id: &UserId, role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Customer => &self.customer_id == user_id,
            Role::Vendor => &self.vendor_id == user_id,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
