//! Configuration management for the carelog service.

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.toml";

/// Service configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Everything except the two secrets has a default. Secrets are never
/// serialized and `Debug` output redacts them.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Database
    /// PostgreSQL connection URL.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default = "default_database_url", alias = "DATABASE_URL")]
    pub database_url: String,
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,
    /// Minimum number of connections to maintain in the pool.
    ///
    /// Environment variable: `DATABASE_MIN_CONNECTIONS`
    #[serde(default = "default_min_connections", alias = "DATABASE_MIN_CONNECTIONS")]
    pub database_min_connections: u32,
    /// Database connection acquire timeout in seconds.
    ///
    /// Environment variable: `DATABASE_CONNECTION_TIMEOUT`
    #[serde(default = "default_acquire_timeout", alias = "DATABASE_CONNECTION_TIMEOUT")]
    pub database_connection_timeout: u64,

    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // Webhooks
    /// Stripe endpoint signing secret (`whsec_...`).
    ///
    /// Environment variable: `STRIPE_WEBHOOK_SECRET`
    #[serde(default, alias = "STRIPE_WEBHOOK_SECRET", skip_serializing)]
    pub stripe_webhook_secret: String,
    /// Allowed distance between the signed timestamp and now, in seconds.
    /// Zero disables the check.
    ///
    /// Environment variable: `WEBHOOK_TOLERANCE_SECONDS`
    #[serde(default = "default_webhook_tolerance", alias = "WEBHOOK_TOLERANCE_SECONDS")]
    pub webhook_tolerance_seconds: u64,
    /// Acknowledge replayed provider events without recording them again.
    ///
    /// Environment variable: `WEBHOOK_IDEMPOTENCY`
    #[serde(default, alias = "WEBHOOK_IDEMPOTENCY")]
    pub webhook_idempotency: bool,

    // Auth
    /// HS256 signing secret for audit reader tokens.
    ///
    /// Environment variable: `JWT_SECRET`
    #[serde(default, alias = "JWT_SECRET", skip_serializing)]
    pub jwt_secret: String,
    /// Required token issuer, if any.
    ///
    /// Environment variable: `JWT_ISSUER`
    #[serde(default, alias = "JWT_ISSUER", skip_serializing_if = "Option::is_none")]
    pub jwt_issuer: Option<String>,
    /// Seconds a token may be past `exp` and still verify.
    ///
    /// Environment variable: `JWT_LEEWAY_SECONDS`
    #[serde(default, alias = "JWT_LEEWAY_SECONDS")]
    pub jwt_leeway_seconds: u64,

    // Logging
    /// Log filter directives.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
    /// Emit logs as JSON lines.
    ///
    /// Environment variable: `LOG_JSON`
    #[serde(default, alias = "LOG_JSON")]
    pub log_json: bool,
}

/// Secrets and verification knobs handed to the request path.
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    /// Stripe endpoint signing secret.
    pub webhook_secret: SecretString,
    /// Signature timestamp tolerance.
    pub webhook_tolerance: Duration,
    /// Skip replayed provider events.
    pub webhook_idempotency: bool,
    /// Token signing secret.
    pub jwt_secret: SecretString,
    /// Required token issuer.
    pub jwt_issuer: Option<String>,
    /// Expiry leeway.
    pub jwt_leeway: Duration,
}

impl Config {
    /// Load configuration from defaults, config file, and environment
    /// variable overrides, then validate it.
    ///
    /// # Errors
    ///
    /// Returns error if a source cannot be parsed or validation fails.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Moves the secrets into [`SecretString`]s for the request path.
    pub fn security_settings(&self) -> SecuritySettings {
        SecuritySettings {
            webhook_secret: SecretString::from(self.stripe_webhook_secret.clone()),
            webhook_tolerance: Duration::from_secs(self.webhook_tolerance_seconds),
            webhook_idempotency: self.webhook_idempotency,
            jwt_secret: SecretString::from(self.jwt_secret.clone()),
            jwt_issuer: self.jwt_issuer.clone().filter(|issuer| !issuer.is_empty()),
            jwt_leeway: Duration::from_secs(self.jwt_leeway_seconds),
        }
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Parse server socket address from host and port configuration.
    ///
    /// # Errors
    ///
    /// Returns error if host and port do not form a socket address.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Get database URL with password masked for logging.
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                if !self.database_url[colon_pos + 1..].starts_with("//") {
                    let mut masked = self.database_url.clone();
                    masked.replace_range(colon_pos + 1..at_pos, "***");
                    return masked;
                }
            }
        }
        self.database_url.clone()
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("database max_connections must be greater than 0");
        }

        if self.database_min_connections > self.database_max_connections {
            anyhow::bail!("database min_connections cannot exceed max_connections");
        }

        if self.stripe_webhook_secret.trim().is_empty() {
            anyhow::bail!("STRIPE_WEBHOOK_SECRET must be set");
        }

        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must be set");
        }

        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url_masked())
            .field("database_max_connections", &self.database_max_connections)
            .field("database_min_connections", &self.database_min_connections)
            .field("database_connection_timeout", &self.database_connection_timeout)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("stripe_webhook_secret", &"[REDACTED]")
            .field("webhook_tolerance_seconds", &self.webhook_tolerance_seconds)
            .field("webhook_idempotency", &self.webhook_idempotency)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .field("rust_log", &self.rust_log)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            database_min_connections: default_min_connections(),
            database_connection_timeout: default_acquire_timeout(),
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            stripe_webhook_secret: String::new(),
            webhook_tolerance_seconds: default_webhook_tolerance(),
            webhook_idempotency: false,
            jwt_secret: String::new(),
            jwt_issuer: None,
            jwt_leeway_seconds: 0,
            rust_log: default_log_level(),
            log_json: false,
        }
    }
}

fn default_database_url() -> String {
    "postgresql://localhost/carelog".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_webhook_tolerance() -> u64 {
    300
}

fn default_log_level() -> String {
    "info,carelog=debug,tower_http=debug".to_string()
}
