use serde_json::Value;
use tracing::info;

use super::{Caller, EventRouter};
use crate::error::SocketError;
use crate::protocol::{
    Announcement, AnnouncementRequest, OutboundKind, RoomChange, ServerEvent,
};
use crate::rooms::Room;

/// `admin-announcement` to every live session, the sender included.
pub(super) fn broadcast_announcement(
    router: &EventRouter,
    caller: &Caller,
    data: &Value,
) -> Result<(), SocketError> {
    let request = AnnouncementRequest::try_from(data)?;
    let event = ServerEvent::encode(
        OutboundKind::AdminAnnouncement,
        &Announcement {
            message: request.message,
            kind: request.kind,
            from: Some(caller.user_id.clone()),
        },
    );

    let delivered = router.manager.broadcast(&event);
    info!(admin_id = %caller.user_id, delivered, "admin announcement broadcast");
    Ok(())
}

pub(super) fn monitor_transactions(router: &EventRouter, caller: &Caller) -> Result<(), SocketError> {
    router
        .manager
        .join_room(caller.connection_id, Room::AdminMonitoring);
    router.reply(
        caller,
        OutboundKind::RoomJoined,
        &RoomChange {
            room: Room::AdminMonitoring.name(),
        },
    );
    Ok(())
}
