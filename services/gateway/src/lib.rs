//! Realtime gateway: authenticated WebSocket sessions, role-scoped inbound
//! events and fire-and-forget order notifications.

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod handlers;
pub mod manager;
pub mod notifier;
pub mod protocol;
pub mod rate_limit;
pub mod rooms;
pub mod router;
pub mod session;
pub mod state;
