use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use types::account::UserRecord;
use types::ids::{OrderId, UserId};
use types::order::{OrderRecord, OrderStatus};

use super::{DirectoryError, OrderDirectory, UserDirectory};

/// In-process directory for local development and tests.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<UserId, UserRecord>,
    orders: DashMap<OrderId, OrderRecord>,
    unavailable: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_order(&self, order: OrderRecord) {
        self.orders.insert(order.id.clone(), order);
    }

    pub fn set_order_status(&self, id: &OrderId, status: OrderStatus) -> bool {
        match self.orders.get_mut(id) {
            Some(mut order) => {
                order.status = status;
                true
            }
            None => false,
        }
    }

    /// Make every lookup fail, as if the backing service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, DirectoryError> {
        self.ensure_available()?;
        Ok(self.users.get(id).map(|user| user.value().clone()))
    }
}

#[async_trait]
impl OrderDirectory for MemoryDirectory {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, DirectoryError> {
        self.ensure_available()?;
        Ok(self.orders.get(id).map(|order| order.value().clone()))
    }

    async fn active_orders_for(
        &self,
        customer: &UserId,
    ) -> Result<Vec<OrderRecord>, DirectoryError> {
        self.ensure_available()?;
        let mut orders: Vec<OrderRecord> = self
            .orders
            .iter()
            .filter(|order| &order.customer_id == customer && order.is_active())
            .map(|order| order.value().clone())
            .collect();
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(orders)
    }
}
