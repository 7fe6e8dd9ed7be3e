use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::filters::RateLimitPolicy;
use crate::logging::DEFAULT_LOG_FILTER;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub instance_id: String,
    /// Upper bound for slow handlers before they fail with a timeout
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("API_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .context("API_PORT must be a valid port number")?,
                instance_id: env::var("INSTANCE_ID")
                    .or_else(|_| env::var("HOSTNAME"))
                    .unwrap_or_else(|_| "unknown".to_string()),
                request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .context("REQUEST_TIMEOUT_MS must be a valid number")?,
            },
            rate_limit: parse_rate_limit(
                &env::var("RATE_LIMIT_MAX_REQUESTS").unwrap_or_else(|_| "100".to_string()),
                &env::var("RATE_LIMIT_WINDOW_SECONDS").unwrap_or_else(|_| "60".to_string()),
            )?,
            logging: LoggingConfig {
                filter: env::var("LOG_FILTER").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }
}

fn parse_rate_limit(max_requests: &str, window_seconds: &str) -> Result<RateLimitPolicy> {
    let policy = RateLimitPolicy {
        max_requests: max_requests
            .parse()
            .context("RATE_LIMIT_MAX_REQUESTS must be a valid number")?,
        window_seconds: window_seconds
            .parse()
            .context("RATE_LIMIT_WINDOW_SECONDS must be a valid number")?,
    };
    policy
        .validate()
        .context("RATE_LIMIT_MAX_REQUESTS and RATE_LIMIT_WINDOW_SECONDS must be positive")?;
    Ok(policy)
}
