use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub threads: ThreadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Node number embedded in generated comment ids, must be below 1024.
    pub node_id: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
}

/// Limits applied to comment threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub max_content_length: usize,
    pub max_depth: i32,
    pub tree_fetch_timeout_ms: u64,
}

impl ThreadConfig {
    pub fn tree_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.tree_fetch_timeout_ms)
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            max_content_length: 10_000,
            max_depth: 50,
            tree_fetch_timeout_ms: 5_000,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = ThreadConfig::default();
        let config = Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/event_threads.db".to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 8),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("SERVER_PORT", 3000),
                node_id: env_or("NODE_ID", 0),
            },
            cache: CacheConfig {
                capacity: env_or("CACHE_CAPACITY", 1000),
            },
            threads: ThreadConfig {
                max_content_length: env_or("COMMENT_MAX_LENGTH", defaults.max_content_length),
                max_depth: env_or("COMMENT_MAX_DEPTH", defaults.max_depth),
                tree_fetch_timeout_ms: env_or(
                    "TREE_FETCH_TIMEOUT_MS",
                    defaults.tree_fetch_timeout_ms,
                ),
            },
        };

        if config.server.node_id >= 1024 {
            anyhow::bail!("NODE_ID must be less than 1024, got {}", config.server.node_id);
        }
        if config.threads.max_depth < 0 {
            anyhow::bail!("COMMENT_MAX_DEPTH must not be negative");
        }
        Ok(config)
    }

    /// Configuration for tests and embedded use: in-memory database,
    /// default limits.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                node_id: 0,
            },
            cache: CacheConfig { capacity: 128 },
            threads: ThreadConfig::default(),
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_defaults() {
        let config = Config::in_memory();
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.threads.max_depth, 50);
        assert_eq!(config.threads.tree_fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.server_address(), "127.0.0.1:0");
    }
}
