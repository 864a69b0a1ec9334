use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use super::{StoreError, VisitRecord, VisitStore};
use crate::config::Config;

const KEY_PREFIX: &str = "rate_limit:";

/// Redis-backed visit counter. Holds a bounded set of multiplexed
/// connections and hands them out round-robin; reconnect attempts and
/// I/O deadlines are the connection manager's job, not ours.
pub struct RedisVisitStore {
    connections: Vec<ConnectionManager>,
    next: AtomicUsize,
    window: Duration,
}

impl RedisVisitStore {
    /// Connects `redis_pool_size` managed connections and verifies the
    /// server with a PING before accepting traffic.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let url = if config.redis_password.is_empty() {
            format!("redis://{}/{}", config.redis_addr, config.redis_db)
        } else {
            format!(
                "redis://:{}@{}/{}",
                config.redis_password, config.redis_addr, config.redis_db
            )
        };
        let client = Client::open(url)?;

        let mut connections = Vec::with_capacity(config.redis_pool_size);
        for _ in 0..config.redis_pool_size {
            let manager_config = ConnectionManagerConfig::new()
                .set_number_of_retries(config.redis_max_retries)
                .set_connection_timeout(config.redis_idle_timeout())
                .set_response_timeout(config.redis_idle_timeout());
            connections.push(
                client
                    .get_connection_manager_with_config(manager_config)
                    .await?,
            );
        }

        let mut conn = connections[0].clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!("successful Redis connection: {pong}");

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
            window: config.rate_limit_window(),
        })
    }

    fn connection(&self) -> ConnectionManager {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.connections[index % self.connections.len()].clone()
    }
}

#[async_trait]
impl VisitStore for RedisVisitStore {
    async fn touch(&self, key: &str) -> Result<VisitRecord, StoreError> {
        let redis_key = format!("{KEY_PREFIX}{key}");
        let mut conn = self.connection();

        // One round trip. SET NX seeds a fresh window before INCR so the
        // first touch lands on an already-expiring key, and TTL is read
        // last so it reflects whichever window the increment hit. The
        // pipeline is not a transaction; each command is atomic on its
        // own, which is all the contract needs.
        let (count, ttl_secs): (i64, i64) = redis::pipe()
            .cmd("SET")
            .arg(&redis_key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(self.window.as_secs())
            .ignore()
            .incr(&redis_key, 1)
            .ttl(&redis_key)
            .query_async(&mut conn)
            .await?;

        // -2 means the key vanished, -1 means it carries no expiry.
        // Either way the initialize-then-increment protocol was broken.
        if ttl_secs < 0 {
            return Err(StoreError::MissingExpiry(redis_key));
        }

        Ok(VisitRecord {
            count,
            ttl: Duration::from_secs(ttl_secs as u64),
        })
    }
}
