//! Configuration management for Limitd.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LimitdError, Result};
use crate::storage::ConsistencyMode;

/// Main configuration for the Limitd service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitdConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    "127.0.0.1:50051".parse().unwrap()
}

/// Which backend holds the rate limit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Counters shared across processes via Redis
    Redis,
    /// Counters held in process memory (single-node deployments)
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Redis backend settings, used when `backend = redis`
    #[serde(default)]
    pub redis: RedisConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis: RedisConfig::default(),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Redis
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Prefix prepended to every rate limit key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Increment/expire sequencing; see [`ConsistencyMode`]
    #[serde(default)]
    pub consistency: ConsistencyMode,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            connect_timeout_secs: default_connect_timeout_secs(),
            consistency: ConsistencyMode::default(),
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "ratelimit:".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl LimitdConfig {
    /// Load configuration from an optional file, layered with
    /// `LIMITD_`-prefixed environment variables (e.g.,
    /// `LIMITD_STORAGE__REDIS__URL`).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder
            .add_source(config::Environment::with_prefix("LIMITD").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| LimitdError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LimitdConfig::default();

        assert_eq!(config.server.grpc_addr, default_grpc_addr());
        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(config.storage.redis.key_prefix, "ratelimit:");
        assert_eq!(config.storage.redis.consistency, ConsistencyMode::Relaxed);
        assert_eq!(config.storage.redis.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
server:
  grpc_addr: "0.0.0.0:9000"
storage:
  backend: memory
  redis:
    url: "redis://cache:6380"
    consistency: atomic
"#;

        let config: LimitdConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.grpc_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.redis.url, "redis://cache:6380");
        assert_eq!(config.storage.redis.consistency, ConsistencyMode::Atomic);
        // Unspecified fields keep their defaults.
        assert_eq!(config.storage.redis.key_prefix, "ratelimit:");
    }
}
