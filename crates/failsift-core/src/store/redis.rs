//! Redis-backed history store

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::error::{Error, Result};
use crate::rules::Outcome;

use super::{check_identifier, HistoryStore};

/// History store backed by a Redis list per identifier
///
/// Outcomes are stored as two-valued markers (non-empty for success, empty
/// for failure) so the lists stay cheap to scan. Keys are namespaced with
/// the configured prefix.
#[derive(Clone)]
pub struct RedisHistoryStore {
    pool: Pool,
    key_prefix: String,
}

impl RedisHistoryStore {
    /// Create a new Redis history store from configuration
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let cfg = PoolConfig::from_url(&config.url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Redis(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| Error::Redis(e.to_string()))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Redis(e.to_string()))?;
        Ok(())
    }

    fn key(&self, identifier: &str) -> String {
        format!("{}:{}", self.key_prefix, identifier)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    #[allow(clippy::cast_possible_wrap)]
    async fn record(&self, identifier: &str, outcome: Outcome, limit: usize) -> Result<()> {
        check_identifier(identifier)?;
        let key = self.key(identifier);

        let mut conn = self.pool.get().await.map_err(|e| Error::Redis(e.to_string()))?;

        let _: () = conn
            .lpush(&key, outcome.as_marker())
            .await
            .map_err(|e| Error::Redis(e.to_string()))?;

        // Keep only the newest `limit` entries.
        let _: () = conn
            .ltrim(&key, 0, limit as isize - 1)
            .await
            .map_err(|e| Error::Redis(e.to_string()))?;

        Ok(())
    }

    async fn read(&self, identifier: &str) -> Result<Vec<Outcome>> {
        check_identifier(identifier)?;
        let key = self.key(identifier);

        let mut conn = self.pool.get().await.map_err(|e| Error::Redis(e.to_string()))?;

        let markers: Vec<String> = conn
            .lrange(&key, 0, -1)
            .await
            .map_err(|e| Error::Redis(e.to_string()))?;

        Ok(markers.iter().map(|m| Outcome::from_marker(m)).collect())
    }

    async fn reset(&self, identifier: &str) -> Result<()> {
        check_identifier(identifier)?;
        let key = self.key(identifier);

        let mut conn = self.pool.get().await.map_err(|e| Error::Redis(e.to_string()))?;

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| Error::Redis(e.to_string()))?;

        Ok(())
    }
}
