use clap::Parser;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use types::order::OrderStatus;

use crate::rate_limit::RateLimitConfig;

/// Realtime notification gateway
#[derive(Parser, Clone, Debug)]
#[command(name = "realtime-gateway", version, about = "Realtime notification gateway")]
pub struct Cli {
    /// Address the HTTP and WebSocket listener binds to
    #[arg(long, env = "GATEWAY_BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub bind_address: SocketAddr,

    /// HMAC secret shared with the REST API for signing session tokens
    #[arg(long, env = "GATEWAY_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Base URL of the internal user and order directory
    #[arg(long, env = "GATEWAY_DIRECTORY_URL", default_value = "http://localhost:8081")]
    pub directory_url: String,

    /// Inbound events allowed per user per minute
    #[arg(long, env = "GATEWAY_RATE_LIMIT_PER_MINUTE", default_value_t = 60)]
    pub rate_limit_per_minute: u32,

    /// Seconds between sweeps of expired rate limit windows
    #[arg(long, env = "GATEWAY_RATE_LIMIT_SWEEP_SECS", default_value_t = 60)]
    pub rate_limit_sweep_secs: u64,

    /// Order statuses that trigger a pickup notification
    #[arg(
        long,
        env = "GATEWAY_ORDER_READY_STATUSES",
        value_delimiter = ',',
        default_value = "ready,completed"
    )]
    pub order_ready_statuses: Vec<String>,

    /// Enable structured JSON logging
    #[arg(long, env = "GATEWAY_JSON_LOGS")]
    pub json_logs: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("jwt secret must not be empty")]
    EmptySecret,

    #[error("rate limit must allow at least one event per minute")]
    ZeroRateLimit,

    #[error("rate limit sweep interval must be at least one second")]
    ZeroSweepInterval,

    #[error("unknown order status `{0}` in order-ready statuses")]
    InvalidStatus(String),

    #[error("order-ready statuses must not be empty")]
    NoReadyStatuses,
}

/// Which status updates tell the customer their order can be picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadyPolicy {
    statuses: HashSet<OrderStatus>,
}

impl OrderReadyPolicy {
    pub fn new(statuses: impl IntoIterator<Item = OrderStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }

    pub fn triggers(&self, status: OrderStatus) -> bool {
        self.statuses.contains(&status)
    }

    fn parse(raw: &[String]) -> Result<Self, ConfigError> {
        let statuses = raw
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<OrderStatus>()
                    .map_err(|_| ConfigError::InvalidStatus(s.to_string()))
            })
            .collect::<Result<HashSet<_>, _>>()?;
        if statuses.is_empty() {
            return Err(ConfigError::NoReadyStatuses);
        }
        Ok(Self { statuses })
    }
}

impl Default for OrderReadyPolicy {
    fn default() -> Self {
        Self::new([OrderStatus::Ready, OrderStatus::Completed])
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_address: SocketAddr,
    pub jwt_secret: String,
    pub directory_url: String,
    pub rate_limit: RateLimitConfig,
    pub order_ready: OrderReadyPolicy,
    pub json_logs: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: String::new(),
            directory_url: "http://localhost:8081".to_string(),
            rate_limit: RateLimitConfig::default(),
            order_ready: OrderReadyPolicy::default(),
            json_logs: false,
        }
    }
}

impl Cli {
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.rate_limit_per_minute == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.rate_limit_sweep_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }

        Ok(GatewayConfig {
            bind_address: self.bind_address,
            jwt_secret: self.jwt_secret,
            directory_url: self.directory_url,
            rate_limit: RateLimitConfig {
                max_events: self.rate_limit_per_minute,
                window: Duration::from_secs(60),
                sweep_interval: Duration::from_secs(self.rate_limit_sweep_secs),
            },
            order_ready: OrderReadyPolicy::parse(&self.order_ready_statuses)?,
            json_logs: self.json_logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["realtime-gateway"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--jwt-secret", "s3cret"]).into_config().unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.rate_limit.max_events, 60);
        assert_eq!(config.rate_limit.sweep_interval, Duration::from_secs(60));
        assert!(config.order_ready.triggers(OrderStatus::Ready));
        assert!(config.order_ready.triggers(OrderStatus::Completed));
        assert!(!config.order_ready.triggers(OrderStatus::Preparing));
    }

    #[test]
    fn test_custom_ready_statuses() {
        let config = parse(&["--jwt-secret", "s", "--order-ready-statuses", "Ready"])
            .into_config()
            .unwrap();
        assert!(config.order_ready.triggers(OrderStatus::Ready));
        assert!(!config.order_ready.triggers(OrderStatus::Completed));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert_eq!(
            parse(&["--jwt-secret", " "]).into_config().unwrap_err(),
            ConfigError::EmptySecret
        );
        assert_eq!(
            parse(&["--jwt-secret", "s", "--rate-limit-per-minute", "0"])
                .into_config()
                .unwrap_err(),
            ConfigError::ZeroRateLimit
        );
        assert_eq!(
            parse(&["--jwt-secret", "s", "--order-ready-statuses", "ready,shipped"])
                .into_config()
                .unwrap_err(),
            ConfigError::InvalidStatus("shipped".to_string())
        );
    }
}
