use crate::chain::ChainClient;
use crate::logic::pools::{PoolId, PoolWrapper};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct CacheItem<T> {
    pub data: T,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl<T> CacheItem<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self { data, timestamp: Instant::now(), ttl }
    }

    pub fn is_expired(&self) -> bool {
        self.timestamp.elapsed() > self.ttl
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub fetches: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub evictions: AtomicU64,
    /// Fetched pools with an empty side. Cached anyway, the pathfinder skips them.
    pub zero_liquidity: AtomicU64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 { 0.0 } else { hits as f64 / total as f64 }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheStatsSnapshot {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub evictions: u64,
    pub zero_liquidity: u64,
    pub hit_rate: f64,
}

/// Pool state keyed by pool id, refetched from the chain once an entry outlives its TTL.
///
/// Fail-closed: when a refetch fails or times out the stale entry is dropped and the pool
/// is missing for that cycle. Concurrent misses on the same pool share one fetch.
pub struct PoolDataCache {
    entries: DashMap<PoolId, CacheItem<PoolWrapper>>,
    inflight: DashMap<PoolId, Arc<Mutex<()>>>,
    client: Arc<dyn ChainClient>,
    ttl: Duration,
    fetch_timeout: Duration,
    pub stats: CacheStats,
}

impl PoolDataCache {
    pub fn new(client: Arc<dyn ChainClient>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self { entries: DashMap::new(), inflight: DashMap::new(), client, ttl, fetch_timeout, stats: CacheStats::default() }
    }

    fn fresh(&self, pool_id: &PoolId) -> Option<PoolWrapper> {
        self.entries.get(pool_id).filter(|item| !item.is_expired()).map(|item| item.data.clone())
    }

    /// Cached pool state, fetched on a miss or after expiry. `None` when the fetch fails.
    pub async fn get(&self, pool_id: PoolId) -> Option<PoolWrapper> {
        if let Some(pool) = self.fresh(&pool_id) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Some(pool);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let lock = self.inflight.entry(pool_id).or_default().clone();
        let _guard = lock.lock().await;
        // another task may have refreshed the entry while we waited
        if let Some(pool) = self.fresh(&pool_id) {
            return Some(pool);
        }

        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(self.fetch_timeout, self.client.fetch_pool(&pool_id)).await {
            Ok(Ok(pool)) => {
                if !pool.is_usable() {
                    self.stats.zero_liquidity.fetch_add(1, Ordering::Relaxed);
                    debug!(pool = %pool_id, "fetched pool has an empty side");
                }
                self.entries.insert(pool_id, CacheItem::new(pool.clone(), self.ttl));
                Some(pool)
            }
            Ok(Err(e)) => {
                warn!(pool = %pool_id, error = %e, "pool fetch failed, omitting pool");
                self.drop_stale(&pool_id);
                None
            }
            Err(_) => {
                warn!(pool = %pool_id, timeout = ?self.fetch_timeout, "pool fetch timed out, omitting pool");
                self.drop_stale(&pool_id);
                None
            }
        }
    }

    fn drop_stale(&self, pool_id: &PoolId) {
        self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
        if self.entries.remove(pool_id).is_some() {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Pools for one cycle, fetched concurrently. Failed pools are left out.
    pub async fn get_many(self: &Arc<Self>, pool_ids: &[PoolId]) -> Vec<PoolWrapper> {
        let mut tasks = JoinSet::new();
        for pool_id in pool_ids {
            let cache = Arc::clone(self);
            let pool_id = *pool_id;
            tasks.spawn(async move { cache.get(pool_id).await });
        }

        let mut pools = Vec::with_capacity(pool_ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(pool)) => pools.push(pool),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "pool fetch task failed"),
            }
        }
        pools.sort();
        debug!(requested = pool_ids.len(), loaded = pools.len(), "pools loaded for cycle");
        pools
    }

    pub fn insert(&self, pool: PoolWrapper) {
        self.entries.insert(pool.get_pool_id(), CacheItem::new(pool, self.ttl));
    }

    pub fn invalidate(&self, pool_id: &PoolId) {
        if self.entries.remove(pool_id).is_some() {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drops every entry. Used after an execution timed out and the state it saw is suspect.
    pub fn invalidate_all(&self) {
        let evicted = self.entries.len() as u64;
        self.entries.clear();
        self.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
        debug!(evicted, "pool cache invalidated");
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.inflight.clear();
    }

    pub fn cleanup_expired(&self) {
        self.entries.retain(|_, item| {
            let expired = item.is_expired();
            if expired {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
            !expired
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_stats(&self) -> CacheStatsSnapshot {
        let total_entries = self.entries.len();
        let expired_entries = self.entries.iter().filter(|item| item.is_expired()).count();
        CacheStatsSnapshot {
            total_entries,
            valid_entries: total_entries.saturating_sub(expired_entries),
            expired_entries,
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            fetches: self.stats.fetches.load(Ordering::Relaxed),
            fetch_failures: self.stats.fetch_failures.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            zero_liquidity: self.stats.zero_liquidity.load(Ordering::Relaxed),
            hit_rate: self.stats.hit_rate(),
        }
    }
}
