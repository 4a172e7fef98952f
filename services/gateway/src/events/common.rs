//! Handlers every authenticated role gets.

use serde_json::Value;

use super::{Caller, EventRouter};
use crate::error::SocketError;
use crate::protocol::{OrderRoomRequest, OutboundKind, RoomChange, UserRoomRequest};
use crate::rooms::Room;

pub(super) fn join_user_room(
    router: &EventRouter,
    caller: &Caller,
    data: &Value,
) -> Result<(), SocketError> {
    let request = UserRoomRequest::try_from(data)?;
    if request.user_id != caller.user_id {
        return Err(SocketError::ownership("Cannot join another user's room"));
    }

    let room = Room::User(request.user_id);
    router.manager.join_room(caller.connection_id, room.clone());
    router.reply(caller, OutboundKind::RoomJoined, &RoomChange { room: room.name() });
    Ok(())
}

pub(super) fn leave_user_room(
    router: &EventRouter,
    caller: &Caller,
    data: &Value,
) -> Result<(), SocketError> {
    let request = UserRoomRequest::try_from(data)?;
    let room = Room::User(request.user_id);
    router.manager.leave_room(caller.connection_id, &room);
    router.reply(caller, OutboundKind::RoomLeft, &RoomChange { room: room.name() });
    Ok(())
}

pub(super) async fn join_order_room(
    router: &EventRouter,
    caller: &Caller,
    data: &Value,
) -> Result<(), SocketError> {
    let request = OrderRoomRequest::try_from(data)?;
    let order = router.authorize_order(caller, &request.order_id).await?;

    let room = Room::Order(order.id);
    router.manager.join_room(caller.connection_id, room.clone());
    router.reply(caller, OutboundKind::RoomJoined, &RoomChange { room: room.name() });
    Ok(())
}

pub(super) fn leave_order_room(
    router: &EventRouter,
    caller: &Caller,
    data: &Value,
) -> Result<(), SocketError> {
    let request = OrderRoomRequest::try_from(data)?;
    let room = Room::Order(request.order_id);
    router.manager.leave_room(caller.connection_id, &room);
    router.reply(caller, OutboundKind::RoomLeft, &RoomChange { room: room.name() });
    Ok(())
}
