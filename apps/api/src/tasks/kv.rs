//! Ephemeral key-value seam backed by Redis.
//!
//! Task records are Redis hashes with a per-key TTL; idempotency claims are
//! plain string keys set with `SET NX EX`. Store unavailability surfaces as
//! [`KvError`] and is never interpreted as a task outcome.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;

use crate::metrics;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value backend error: {0}")]
    Backend(String),

    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Writes all fields and sets the expiry in one round-trip.
    async fn create(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> Result<(), KvError>;

    /// All fields of the hash, or `None` if it does not exist (or expired).
    async fn get(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError>;

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), KvError>;

    async fn refresh_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError>;

    /// Sets `key` only if absent. Returns whether this caller won the claim.
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, KvError>;

    async fn release(&self, key: &str) -> Result<(), KvError>;
}

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url)
            .map_err(|e| KvError::Backend(format!("failed to create Redis client: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KvError::Backend(format!("failed to connect to Redis: {e}")))?;
        Ok(Self { conn })
    }
}

fn map_redis_error(err: redis::RedisError, key: &str) -> KvError {
    KvError::Backend(format!("Redis error for key {key}: {err}"))
}

fn ttl_secs(ttl: Duration) -> i64 {
    ttl.as_secs().max(1) as i64
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn create(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(key, fields)
            .ignore()
            .expire(key, ttl_secs(ttl))
            .ignore();
        metrics::redis("hset_expire", pipe.query_async::<_, ()>(&mut conn))
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn get(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = metrics::redis("hgetall", conn.hgetall(key))
            .await
            .map_err(|e| map_redis_error(e, key))?;
        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        metrics::redis("hset", conn.hset::<_, _, _, ()>(key, field, value))
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn refresh_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        metrics::redis("expire", conn.expire::<_, ()>(key, ttl_secs(ttl)))
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg("1").arg("NX").arg("EX").arg(ttl_secs(ttl));
        let reply: Option<String> = metrics::redis("set_nx", cmd.query_async(&mut conn))
            .await
            .map_err(|e| map_redis_error(e, key))?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        metrics::redis("del", conn.del::<_, ()>(key))
            .await
            .map_err(|e| map_redis_error(e, key))
    }
}
