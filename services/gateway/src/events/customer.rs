use super::{Caller, EventRouter};
use crate::error::SocketError;
use crate::protocol::{OutboundKind, TrackingOrders};
use crate::rooms::Room;

/// Join the room of every order the customer still has open.
pub(super) async fn track_my_orders(
    router: &EventRouter,
    caller: &Caller,
) -> Result<(), SocketError> {
    let orders = router.orders.active_orders_for(&caller.user_id).await?;

    let order_ids: Vec<_> = orders.into_iter().map(|order| order.id).collect();
    for order_id in &order_ids {
        router
            .manager
            .join_room(caller.connection_id, Room::Order(order_id.clone()));
    }

    router.reply(caller, OutboundKind::TrackingOrders, &TrackingOrders { order_ids });
    Ok(())
}
