//! Shared harness: in-memory directory, real JWT verification, channel
//! transports and a controllable clock.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use realtime_gateway::auth::{Claims, Credentials, JwtVerifier};
use realtime_gateway::config::{GatewayConfig, OrderReadyPolicy};
use realtime_gateway::directory::{MemoryDirectory, OrderDirectory};
use realtime_gateway::error::AuthError;
use realtime_gateway::events::{Caller, EventRouter};
use realtime_gateway::manager::ConnectionManager;
use realtime_gateway::notifier::NotificationEmitter;
use realtime_gateway::protocol::{Outbound, OutboundKind, ServerEvent};
use realtime_gateway::rate_limit::{RateLimitConfig, RateLimiter};
use realtime_gateway::session::SessionInfo;
use realtime_gateway::state::AppState;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use types::account::{Role, UserRecord};
use types::ids::{OrderId, UserId};
use types::order::{OrderRecord, OrderStatus};

pub const SECRET: &[u8] = b"integration-secret";

/// Start of a rate limit window
pub const T0: i64 = 1_700_000_040;

pub fn token_for(user: &str) -> String {
    let exp = (Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: user.to_string(),
            exp,
        },
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

pub fn expired_token_for(user: &str) -> String {
    let exp = (Utc::now().timestamp() - 3600) as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: user.to_string(),
            exp,
        },
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn order(id: &str, customer: &str, vendor: &str, status: OrderStatus, items: &str) -> OrderRecord {
    OrderRecord {
        id: OrderId::new(id),
        customer_id: UserId::new(customer),
        vendor_id: UserId::new(vendor),
        status,
        item_summary: items.to_string(),
    }
}

/// Users: customers `alice` and `carol`, vendors `bob` and `vera`, admin
/// `root`, suspended customer `mallory`.
///
/// Orders: `o1` alice/bob preparing, `o2` carol/bob pending, `o3` alice/bob
/// completed, `o4` alice/vera confirmed.
pub fn seeded_directory() -> Arc<MemoryDirectory> {
    let dir = Arc::new(MemoryDirectory::new());
    dir.insert_user(UserRecord::new(UserId::new("alice"), Role::Customer));
    dir.insert_user(UserRecord::new(UserId::new("carol"), Role::Customer));
    dir.insert_user(UserRecord::new(UserId::new("bob"), Role::Vendor));
    dir.insert_user(UserRecord::new(UserId::new("vera"), Role::Vendor));
    dir.insert_user(UserRecord::new(UserId::new("root"), Role::Admin));
    dir.insert_user(UserRecord::new(UserId::new("mallory"), Role::Customer).suspended());

    dir.insert_order(order("o1", "alice", "bob", OrderStatus::Preparing, "2x Chicken Rice"));
    dir.insert_order(order("o2", "carol", "bob", OrderStatus::Pending, "Laksa"));
    dir.insert_order(order("o3", "alice", "bob", OrderStatus::Completed, "Kopi"));
    dir.insert_order(order("o4", "alice", "vera", OrderStatus::Confirmed, "Nasi Lemak"));
    dir
}

pub struct Harness {
    pub state: AppState,
    pub directory: Arc<MemoryDirectory>,
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_limit(60)
    }

    pub fn with_limit(max_events: u32) -> Self {
        let directory = seeded_directory();
        Self::build(directory.clone(), directory, max_events)
    }

    /// Seeded users, with order lookups answered by `orders`.
    pub fn with_orders(orders: Arc<dyn OrderDirectory>) -> Self {
        Self::build(seeded_directory(), orders, 60)
    }

    fn build(directory: Arc<MemoryDirectory>, orders: Arc<dyn OrderDirectory>, max_events: u32) -> Self {
        let now = Arc::new(Mutex::new(Utc.timestamp_opt(T0, 0).unwrap()));

        let manager = Arc::new(ConnectionManager::new(
            Arc::new(JwtVerifier::from_secret(SECRET)),
            directory.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_events,
            ..RateLimitConfig::default()
        }));
        let notifier = NotificationEmitter::new(manager.clone());
        let clock = now.clone();
        let router = EventRouter::new(
            manager.clone(),
            orders,
            limiter.clone(),
            notifier.clone(),
            OrderReadyPolicy::default(),
        )
        .with_clock(move || *clock.lock().unwrap());

        let state = AppState::assemble(manager, Arc::new(router), notifier, limiter);
        state.manager.initialize();

        Self {
            state,
            directory,
            now,
        }
    }

    /// Production wiring from a config, backed by the seeded directory.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let directory = seeded_directory();
        let state = AppState::new(
            config,
            Arc::new(JwtVerifier::from_secret(SECRET)),
            directory.clone(),
            directory.clone(),
        );
        Self {
            state,
            directory,
            now: Arc::new(Mutex::new(Utc::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub async fn try_connect(
        &self,
        credentials: Credentials,
    ) -> (Result<SessionInfo, AuthError>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.state.manager.connect(tx, credentials).await, rx)
    }

    /// Connect `user` and discard the `connected` acknowledgment.
    pub async fn connect(&self, user: &str) -> Client {
        let (info, rx) = self.try_connect(Credentials::new(token_for(user))).await;
        let info = info.unwrap();
        let caller = self.state.router.caller(&info);
        let mut client = Client { info, caller, rx };
        let first = client.events();
        assert_eq!(first.first().map(|e| e.event), Some(OutboundKind::Connected));
        client
    }
}

pub struct Client {
    pub info: SessionInfo,
    pub caller: Caller,
    pub rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Client {
    pub async fn send(&self, harness: &Harness, event: &str, data: Value) -> bool {
        let frame = json!({ "event": event, "data": data }).to_string();
        harness.state.router.dispatch(&self.caller, &frame).await
    }

    /// Everything queued for this connection so far
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn events(&mut self) -> Vec<ServerEvent> {
        self.drain()
            .into_iter()
            .filter_map(|frame| match frame {
                Outbound::Event(event) => Some(event),
                Outbound::Close { .. } => None,
            })
            .collect()
    }

    pub fn kinds(&mut self) -> Vec<OutboundKind> {
        self.events().into_iter().map(|event| event.event).collect()
    }

    /// The single `error` event produced by the last rejected frame
    pub fn expect_error(&mut self) -> Value {
        let events = self.events();
        assert_eq!(events.len(), 1, "expected exactly one frame, got {events:?}");
        assert_eq!(events[0].event, OutboundKind::Error);
        events[0].data.clone()
    }
}
