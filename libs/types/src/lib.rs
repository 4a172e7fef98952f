//! Types library for the food ordering realtime gateway
//!
//! Shared definitions used by the gateway and by the order/payment services
//! that push notifications through it.
//!
//! # Modules
//! - `ids`: Identifiers (UserId, OrderId, ConnectionId)
//! - `account`: Account roles and directory records
//! - `order`: Order lifecycle and directory records
//! - `errors`: Error taxonomy

pub mod account;
pub mod errors;
pub mod ids;
pub mod order;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::account::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::order::*;
}
