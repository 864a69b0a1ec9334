use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{StoreError, VisitRecord, VisitStore};

struct Entry {
    count: i64,
    expires_at: Instant,
}

/// In-process visit counter with the same fixed-window semantics as the
/// Redis store. Used by the test suite and for Redis-free local runs.
///
/// Each touch happens under the entry's shard lock, so counts from
/// concurrent touches of one key never collide. Expired entries are
/// reused in place rather than evicted.
pub struct MemoryVisitStore {
    window: Duration,
    entries: DashMap<String, Entry>,
}

impl MemoryVisitStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl VisitStore for MemoryVisitStore {
    async fn touch(&self, key: &str) -> Result<VisitRecord, StoreError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                count: 0,
                expires_at: now + self.window,
            });

        // A lapsed window restarts from scratch, exactly like Redis
        // expiring the key: fresh count, fresh expiry.
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + self.window;
        }
        entry.count += 1;

        Ok(VisitRecord {
            count: entry.count,
            ttl: entry.expires_at - now,
        })
    }
}
