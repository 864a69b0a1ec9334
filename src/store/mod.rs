// Counter store for per-client visit counts.
// All cross-request state lives here; the middleware holds none of its own.

use std::time::Duration;

use async_trait::async_trait;

mod memory;
mod redis;

pub use self::memory::MemoryVisitStore;
pub use self::redis::RedisVisitStore;

/// Outcome of one touch: the post-increment count and the time left
/// until the window expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitRecord {
    pub count: i64,
    pub ttl: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    /// The store reported no expiry for a key every touch initializes
    /// with one. Indicates corruption or tampering; fatal for the request.
    #[error("no expiry on counter key {0}")]
    MissingExpiry(String),
}

/// Capability the admission decision consumes. A single combined
/// operation: initialize-if-absent with the window TTL, increment, and
/// read the remaining TTL, as one unit.
///
/// Splitting this into an existence check plus a conditional set is a
/// check-then-act race: two concurrent first requests can both observe
/// "absent" and both initialize the counter. Implementations must push
/// initialize-if-absent down to an atomic store-side primitive.
#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Records one visit for `key` and returns the resulting count and
    /// remaining window TTL. The count is at least 1; the expiry is set
    /// only when the key is created and never renewed by later touches.
    async fn touch(&self, key: &str) -> Result<VisitRecord, StoreError>;
}
