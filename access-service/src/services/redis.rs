//! Revocation cache: a deny list of raw token strings with per-entry TTL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use redis::{aio::ConnectionManager, Client};
use std::sync::Arc;

use super::clock::Clock;

const DENIED_MARKER: &str = r#"{"expired":true}"#;

fn revocation_key(token: &str) -> String {
    format!("revoked:{}", token)
}

#[async_trait]
pub trait RevocationCache: Send + Sync {
    /// Deny `token` for `ttl_seconds`. The TTL must outlive the token.
    async fn deny(&self, token: &str, ttl_seconds: i64) -> Result<(), anyhow::Error>;
    async fn is_denied(&self, token: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisRevocationCache {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisRevocationCache {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl RevocationCache for RedisRevocationCache {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }

    async fn deny(&self, token: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();

        redis::cmd("SET")
            .arg(revocation_key(token))
            .arg(DENIED_MARKER)
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke token: {}", e))
    }

    async fn is_denied(&self, token: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();

        let value: Option<String> = redis::cmd("GET")
            .arg(revocation_key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check revocation: {}", e))?;

        Ok(value.is_some())
    }
}

/// In-process cache honouring TTLs against an injected clock.
pub struct MemoryRevocationCache {
    entries: DashMap<String, DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRevocationCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationCache for MemoryRevocationCache {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn deny(&self, token: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let until = self.clock.now() + Duration::seconds(ttl_seconds.max(1));
        self.entries.insert(revocation_key(token), until);
        Ok(())
    }

    async fn is_denied(&self, token: &str) -> Result<bool, anyhow::Error> {
        let key = revocation_key(token);
        let now = self.clock.now();

        let denied = match self.entries.get(&key) {
            Some(until) => *until > now,
            None => return Ok(false),
        };
        if !denied {
            self.entries.remove(&key);
        }
        Ok(denied)
    }
}

/// Cache that fails every call, for exercising degraded paths.
#[derive(Debug, Default)]
pub struct UnavailableRevocationCache;

#[async_trait]
impl RevocationCache for UnavailableRevocationCache {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("revocation cache unavailable"))
    }

    async fn deny(&self, _token: &str, _ttl_seconds: i64) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("revocation cache unavailable"))
    }

    async fn is_denied(&self, _token: &str) -> Result<bool, anyhow::Error> {
        Err(anyhow::anyhow!("revocation cache unavailable"))
    }
}
