//! Configuration management for the order engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with ORDERS__ prefix

use std::net::{AddrParseError, SocketAddr};

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Storage backend configuration
    pub storage: StorageConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Engine policy configuration
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

/// Which order store backs the engine
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying JWT tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// How long a command waits for the per-order lock before giving up
    pub lock_timeout_ms: u64,

    /// Maximum age of an EFT payment proof, in days
    pub proof_max_age_days: i64,

    /// Interval of the overdue lay-buy sweep in seconds; 0 disables it
    pub overdue_sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            proof_max_age_days: 30,
            overdue_sweep_interval_secs: 3_600,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("ORDERS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("storage.backend", "postgres")?
            .set_default("database.url", "postgres://localhost/orders")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("engine.lock_timeout_ms", 5_000)?
            .set_default("engine.proof_max_age_days", 30)?
            .set_default("engine.overdue_sweep_interval_secs", 3_600)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ORDERS__ prefix)
            .add_source(
                Environment::with_prefix("ORDERS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl ServerConfig {
    /// Address the HTTP listener binds to
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
