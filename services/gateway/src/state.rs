use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::auth::{JwtVerifier, TokenVerifier};
use crate::config::GatewayConfig;
use crate::directory::{HttpDirectory, OrderDirectory, UserDirectory};
use crate::events::EventRouter;
use crate::manager::ConnectionManager;
use crate::notifier::NotificationEmitter;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub router: Arc<EventRouter>,
    pub notifier: NotificationEmitter,
    pub rate_limiter: Arc<RateLimiter>,
    sweeper_stop: Arc<Notify>,
}

impl AppState {
    pub fn new(
        config: &GatewayConfig,
        verifier: Arc<dyn TokenVerifier>,
        users: Arc<dyn UserDirectory>,
        orders: Arc<dyn OrderDirectory>,
    ) -> Self {
        let manager = Arc::new(ConnectionManager::new(verifier, users));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let notifier = NotificationEmitter::new(manager.clone());
        let router = EventRouter::new(
            manager.clone(),
            orders,
            rate_limiter.clone(),
            notifier.clone(),
            config.order_ready.clone(),
        );

        Self::assemble(manager, Arc::new(router), notifier, rate_limiter)
    }

    /// Same wiring as `new`, around a router built by the caller.
    pub fn assemble(
        manager: Arc<ConnectionManager>,
        router: Arc<EventRouter>,
        notifier: NotificationEmitter,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            manager,
            router,
            notifier,
            rate_limiter,
            sweeper_stop: Arc::new(Notify::new()),
        }
    }

    /// Production wiring: JWT verification and the HTTP user/order directory.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let directory = Arc::new(HttpDirectory::new(
            Client::new(),
            config.directory_url.clone(),
        ));
        Self::new(
            config,
            Arc::new(JwtVerifier::from_secret(config.jwt_secret.as_bytes())),
            directory.clone(),
            directory,
        )
    }

    /// Begin accepting sessions and start the rate limit sweeper.
    pub fn start(&self) {
        self.manager.initialize();
        tokio::spawn(
            self.rate_limiter
                .clone()
                .run_sweeper(self.sweeper_stop.clone()),
        );
    }

    pub fn shutdown(&self) {
        self.manager.shutdown();
        self.sweeper_stop.notify_one();
        self.rate_limiter.clear();
    }
}
