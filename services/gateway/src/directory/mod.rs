//! Lookups against the services that own users and orders.
//!
//! The gateway never stores users or orders itself. It asks these
//! directories at handshake time and before order-scoped actions.

mod http;
mod memory;

pub use http::HttpDirectory;
pub use memory::MemoryDirectory;

use async_trait::async_trait;
use thiserror::Error;
use types::account::UserRecord;
use types::ids::{OrderId, UserId};
use types::order::OrderRecord;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Transport(String),

    #[error("directory returned status {0}")]
    Status(u16),

    #[error("directory response could not be decoded: {0}")]
    Decode(String),

    #[error("directory url is invalid: {0}")]
    InvalidUrl(String),

    #[error("directory unavailable")]
    Unavailable,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when no such user exists
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, DirectoryError>;
}

#[async_trait]
pub trait OrderDirectory: Send + Sync {
    /// `Ok(None)` when no such order exists
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, DirectoryError>;

    /// Orders of this customer that have not reached a terminal status
    async fn active_orders_for(&self, customer: &UserId)
        -> Result<Vec<OrderRecord>, DirectoryError>;
}
