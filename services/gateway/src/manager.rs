//! Connection Manager
//!
//! Owns every live session, the user → connection registry and room
//! membership. Nothing else mutates these maps.
//!
//! Guarantees at most one live session per user: a second connect for the
//! same user evicts the first (notice, then close) before the new session is
//! registered. Connect and evict for one user are serialized through a
//! per-user async mutex; different users never wait on each other.
//!
//! Lock order is always `sessions` → `rooms`. No map guard is ever held
//! across an await.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use types::account::Role;
use types::ids::{ConnectionId, UserId};

use crate::auth::{Credentials, TokenVerifier};
use crate::directory::UserDirectory;
use crate::error::{AuthError, CLOSE_EVICTED};
use crate::protocol::{Connected, ForceDisconnect, OutboundKind, ServerEvent, SessionReplaced};
use crate::rooms::{Room, RoomTable};
use crate::session::{Session, SessionInfo, Transport};

/// Why a session is being forced out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eviction {
    /// The same user opened a newer session
    Replaced,
    /// Operator action with a caller-supplied reason
    Admin(String),
    Shutdown,
}

impl Eviction {
    fn reason(&self) -> &str {
        match self {
            Eviction::Replaced => "new-session",
            Eviction::Admin(reason) => reason,
            Eviction::Shutdown => "server-shutdown",
        }
    }

    fn notice(&self) -> ServerEvent {
        let reason = self.reason().to_string();
        match self {
            Eviction::Replaced => ServerEvent::encode(
                OutboundKind::SessionReplaced,
                &SessionReplaced {
                    reason,
                    timestamp: Utc::now(),
                },
            ),
            Eviction::Admin(_) | Eviction::Shutdown => {
                ServerEvent::encode(OutboundKind::ForceDisconnect, &ForceDisconnect { reason })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    pub sessions: usize,
    pub rooms: usize,
}

pub struct ConnectionManager {
    verifier: Arc<dyn TokenVerifier>,
    users: Arc<dyn UserDirectory>,
    sessions: DashMap<ConnectionId, Session>,
    registry: DashMap<UserId, ConnectionId>,
    rooms: RoomTable,
    connect_locks: DashMap<UserId, Arc<Mutex<()>>>,
    running: AtomicBool,
}

impl ConnectionManager {
    pub fn new(verifier: Arc<dyn TokenVerifier>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            verifier,
            users,
            sessions: DashMap::new(),
            registry: DashMap::new(),
            rooms: RoomTable::new(),
            connect_locks: DashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Start accepting sessions and emissions.
    pub fn initialize(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("connection manager initialized");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Force out every session and stop accepting new ones.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let ids: Vec<ConnectionId> = self.sessions.iter().map(|s| *s.key()).collect();
        let evicted = ids
            .into_iter()
            .filter(|id| self.evict_connection(*id, &Eviction::Shutdown))
            .count();
        self.registry.clear();
        self.rooms.clear();
        self.connect_locks.clear();
        info!(evicted, "connection manager shut down");
    }

    fn connect_lock(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.connect_locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the per-user lock once nobody else holds or waits on it.
    fn release_connect_lock(&self, user_id: &UserId, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.connect_locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<(UserId, Role), AuthError> {
        let token = credentials.bearer()?;
        let subject = self.verifier.verify(token)?;

        let user = match self.users.find_user(&subject).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::UserNotFound),
            Err(e) => {
                tracing::error!(user_id = %subject, error = %e, "user lookup failed during handshake");
                return Err(AuthError::DirectoryUnavailable);
            }
        };

        if let Some(claimed) = &credentials.claimed_user_id {
            if claimed != &user.id {
                return Err(AuthError::IdentityMismatch);
            }
        }
        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }

        Ok((user.id, user.role))
    }

    /// Authenticate a new transport connection and register its session.
    ///
    /// On failure nothing is registered and the caller closes the transport.
    pub async fn connect(
        &self,
        transport: Transport,
        credentials: Credentials,
    ) -> Result<SessionInfo, AuthError> {
        if !self.is_running() {
            warn!("connection attempt while manager is not running");
            return Err(AuthError::NotAccepting);
        }

        let (user_id, role) = match self.authenticate(&credentials).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(code = e.code(), "handshake rejected");
                return Err(e);
            }
        };

        let lock = self.connect_lock(&user_id);
        let admitted = {
            let _guard = lock.lock().await;
            // Shutdown may have landed while the directory lookup was in flight
            if self.is_running() {
                Ok(self.admit(user_id.clone(), role, transport))
            } else {
                warn!(user_id = %user_id, "manager stopped during handshake");
                Err(AuthError::NotAccepting)
            }
        };
        self.release_connect_lock(&user_id, lock);

        admitted
    }

    /// Replace-then-register. Runs under the user's connect lock.
    fn admit(&self, user_id: UserId, role: Role, transport: Transport) -> SessionInfo {
        if let Some(previous) = self.registry.get(&user_id).map(|entry| *entry.value()) {
            if self.evict_connection(previous, &Eviction::Replaced) {
                info!(user_id = %user_id, connection_id = %previous, "previous session replaced");
            }
        }

        let session = Session::new(user_id.clone(), role, transport);
        let info = session.info().clone();
        let conn = info.connection_id;

        self.sessions.insert(conn, session);
        self.registry.insert(user_id.clone(), conn);

        self.join_room(conn, Room::User(user_id.clone()));
        if role == Role::Vendor {
            self.join_room(conn, Room::VendorDashboard(user_id.clone()));
        }

        self.send_to_connection(
            conn,
            ServerEvent::encode(
                OutboundKind::Connected,
                &Connected {
                    user_id: user_id.clone(),
                    user_type: role,
                    message: "Connected to realtime notifications".to_string(),
                },
            ),
        );

        info!(user_id = %user_id, connection_id = %conn, role = %role, "session registered");
        info
    }

    /// Remove the session behind a closed transport. Idempotent: a no-op if
    /// the session was already evicted, and never touches a newer session's
    /// registry entry.
    pub fn disconnect(&self, conn: ConnectionId) -> bool {
        let Some((_, mut session)) = self.sessions.remove(&conn) else {
            debug!(connection_id = %conn, "disconnect for unknown or evicted session");
            return false;
        };

        self.registry
            .remove_if(session.user_id(), |_, current| *current == conn);
        for room in session.take_rooms() {
            self.rooms.leave(&room, conn);
        }
        session.close();

        info!(user_id = %session.user_id(), connection_id = %conn, "session disconnected");
        true
    }

    pub fn has_session(&self, user_id: &UserId) -> bool {
        self.registry.contains_key(user_id)
    }

    pub fn connection_of(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.registry.get(user_id).map(|entry| *entry.value())
    }

    pub fn is_live(&self, conn: ConnectionId) -> bool {
        self.sessions.contains_key(&conn)
    }

    /// Administrative eviction. Same mechanics as replacement; `reason` is
    /// delivered in `force-disconnect`.
    pub async fn evict(&self, user_id: &UserId, reason: &str) -> bool {
        let lock = self.connect_lock(user_id);
        let evicted = {
            let _guard = lock.lock().await;
            match self.connection_of(user_id) {
                Some(conn) => self.evict_connection(conn, &Eviction::Admin(reason.to_string())),
                None => false,
            }
        };
        self.release_connect_lock(user_id, lock);

        if evicted {
            info!(user_id = %user_id, reason, "session evicted");
        }
        evicted
    }

    /// Active → Evicting → Closed, with registry and rooms cleaned up.
    fn evict_connection(&self, conn: ConnectionId, eviction: &Eviction) -> bool {
        let Some((_, mut session)) = self.sessions.remove(&conn) else {
            return false;
        };

        session.evict(eviction.notice(), CLOSE_EVICTED, eviction.reason());
        self.registry
            .remove_if(session.user_id(), |_, current| *current == conn);
        for room in session.take_rooms() {
            self.rooms.leave(&room, conn);
        }
        session.close();
        true
    }

    /// Returns false if the connection is unknown
    pub fn join_room(&self, conn: ConnectionId, room: Room) -> bool {
        let Some(mut session) = self.sessions.get_mut(&conn) else {
            return false;
        };
        session.add_room(room.clone());
        self.rooms.join(room, conn);
        true
    }

    /// Idempotent; returns true if the connection was a member
    pub fn leave_room(&self, conn: ConnectionId, room: &Room) -> bool {
        let Some(mut session) = self.sessions.get_mut(&conn) else {
            return false;
        };
        session.remove_room(room);
        self.rooms.leave(room, conn)
    }

    pub fn is_member(&self, conn: ConnectionId, room: &Room) -> bool {
        self.rooms.is_member(room, conn)
    }

    pub fn send_to_connection(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.sessions
            .get(&conn)
            .is_some_and(|session| session.send(event))
    }

    /// Deliver to every member of `room`. Returns the number reached.
    pub fn emit_to_room(&self, room: &Room, event: &ServerEvent) -> usize {
        self.rooms
            .members(room)
            .into_iter()
            .filter(|conn| self.send_to_connection(*conn, event.clone()))
            .count()
    }

    pub fn emit_to_user(&self, user_id: &UserId, event: &ServerEvent) -> usize {
        self.emit_to_room(&Room::User(user_id.clone()), event)
    }

    /// Deliver to every live session, regardless of rooms.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let ids: Vec<ConnectionId> = self.sessions.iter().map(|s| *s.key()).collect();
        ids.into_iter()
            .filter(|conn| self.send_to_connection(*conn, event.clone()))
            .count()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            sessions: self.sessions.len(),
            rooms: self.rooms.room_count(),
        }
    }
}
