use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::mpsc;
use types::account::Role;
use types::ids::{ConnectionId, UserId};

use crate::protocol::{Outbound, ServerEvent};
use crate::rooms::Room;

/// Sender half feeding a connection's writer task.
pub type Transport = mpsc::UnboundedSender<Outbound>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Notice sent, close pending
    Evicting,
    Closed,
}

/// Identity of a live session, handed out to callers that must not touch
/// the session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub role: Role,
    pub connected_at: DateTime<Utc>,
}

/// Live binding between an authenticated user and one transport connection.
pub struct Session {
    info: SessionInfo,
    rooms: HashSet<Room>,
    state: SessionState,
    transport: Transport,
}

impl Session {
    pub fn new(user_id: UserId, role: Role, transport: Transport) -> Self {
        Self {
            info: SessionInfo {
                connection_id: ConnectionId::new(),
                user_id,
                role,
                connected_at: Utc::now(),
            },
            rooms: HashSet::new(),
            state: SessionState::Active,
            transport,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn id(&self) -> ConnectionId {
        self.info.connection_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.info.user_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn add_room(&mut self, room: Room) -> bool {
        self.rooms.insert(room)
    }

    pub(crate) fn remove_room(&mut self, room: &Room) -> bool {
        self.rooms.remove(room)
    }

    pub(crate) fn take_rooms(&mut self) -> HashSet<Room> {
        std::mem::take(&mut self.rooms)
    }

    /// Queue an event for the writer. False if the connection is gone or
    /// the session is no longer active.
    pub fn send(&self, event: ServerEvent) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.transport.send(Outbound::Event(event)).is_ok()
    }

    /// Active → Evicting: push the final notice, then ask the writer to close.
    pub fn evict(&mut self, notice: ServerEvent, code: u16, reason: &str) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.state = SessionState::Evicting;
        let _ = self.transport.send(Outbound::Event(notice));
        let _ = self.transport.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
        true
    }

    /// Any state → Closed
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OutboundKind;
    use serde_json::json;

    fn session() -> (Session, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Session::new(UserId::new("u1"), Role::Customer, tx), rx)
    }

    fn event(kind: OutboundKind) -> ServerEvent {
        ServerEvent::new(kind, &json!({})).unwrap()
    }

    #[test]
    fn test_eviction_sends_notice_then_close() {
        let (mut session, mut rx) = session();

        assert!(session.evict(event(OutboundKind::SessionReplaced), 4000, "replaced"));
        assert_eq!(session.state(), SessionState::Evicting);

        match rx.try_recv().unwrap() {
            Outbound::Event(ev) => assert_eq!(ev.event, OutboundKind::SessionReplaced),
            other => panic!("expected notice first, got {other:?}"),
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Close {
                code: 4000,
                reason: "replaced".to_string()
            }
        );

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_no_events_after_eviction() {
        let (mut session, mut rx) = session();
        session.evict(event(OutboundKind::ForceDisconnect), 4000, "admin");
        while rx.try_recv().is_ok() {}

        assert!(!session.send(event(OutboundKind::NewNotification)));
        assert!(!session.evict(event(OutboundKind::ForceDisconnect), 4000, "again"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_fails_when_writer_dropped() {
        let (session, rx) = session();
        drop(rx);
        assert!(!session.send(event(OutboundKind::Connected)));
    }
}
