use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::{Caller, EventRouter};
use crate::error::SocketError;
use crate::protocol::{
    CustomerMessageRequest, MessageSent, OrderStatusChange, OutboundKind, ServerEvent,
    UpdateOrderStatusRequest, VendorMessage,
};

/// Tell the order's participants about a status the order service has
/// already recorded. Transition legality is the order service's concern.
pub(super) async fn update_order_status(
    router: &EventRouter,
    caller: &Caller,
    data: &Value,
) -> Result<(), SocketError> {
    let request = UpdateOrderStatusRequest::try_from(data)?;
    let order = router.authorize_order(caller, &request.order_id).await?;

    let change = OrderStatusChange {
        customer_id: order.customer_id.clone(),
        status: request.status,
        item_summary: Some(order.item_summary.clone()),
        estimated_time: request.estimated_time,
        message: request.message,
    };
    router.notifier.emit_order_status_change(&order.id, &change)?;

    if router.ready_policy.triggers(request.status) {
        router.notifier.emit_ready_signal(
            &order.customer_id,
            &order.id,
            &order.item_summary,
            request.status,
        )?;
    }

    info!(
        vendor_id = %caller.user_id,
        order_id = %order.id,
        status = %request.status,
        "order status pushed"
    );
    Ok(())
}

/// Relay free text to a customer. With an `orderId` the vendor must own the
/// order and the recipient must be its customer.
pub(super) async fn send_customer_message(
    router: &EventRouter,
    caller: &Caller,
    data: &Value,
) -> Result<(), SocketError> {
    let request = CustomerMessageRequest::try_from(data)?;

    if let Some(order_id) = &request.order_id {
        let order = router.authorize_order(caller, order_id).await?;
        if order.customer_id != request.user_id {
            return Err(SocketError::ownership(format!(
                "Order {order_id} does not belong to this customer"
            )));
        }
    }

    let event = ServerEvent::encode(
        OutboundKind::VendorMessage,
        &VendorMessage {
            from_vendor: caller.user_id.clone(),
            message: request.message,
            order_id: request.order_id.clone(),
            timestamp: Utc::now(),
        },
    );
    let delivered = router.manager.emit_to_user(&request.user_id, &event) > 0;

    router.reply(
        caller,
        OutboundKind::MessageSent,
        &MessageSent {
            user_id: request.user_id,
            order_id: request.order_id,
            delivered,
        },
    );
    Ok(())
}
