//! 共享缓存
//!
//! 值以 JSON 文本保存，`None` 序列化为 `null`，作为"资源不存在"的标记与正常结果
//! 使用同一个 TTL。并发的相同请求不会合并，后写入者覆盖先写入者。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{FetchError, FetchResult};
use crate::settings::env_parse;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// 外部同步的键值存储
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String, ttl: Duration);
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// 进程内缓存
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// 写入前清理所有过期条目，未再读取的键也会被回收
    fn put(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }
}

/// 由站点标识与调用参数生成确定的缓存键
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
    let mut key = prefix.to_lowercase();
    for part in parts {
        key.push('_');
        key.push_str(part);
    }
    key
}

/// 缓存协作者，克隆开销很小
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), ttl)
    }

    /// 使用 `CACHE_TTL_SECS` 构建进程内缓存
    pub fn from_env() -> Self {
        let ttl = env_parse::<u64>("CACHE_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);
        Self::in_memory(ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 读取缓存，无法解码的条目视为未命中
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> FetchResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| FetchError::Cache(e.to_string()))?;
        self.store.put(key, raw, self.ttl);
        Ok(())
    }

    /// 命中则直接返回，否则执行 `produce` 并写回其成功结果
    ///
    /// 写回失败只记录警告，不影响返回值。
    pub async fn remember<T, F, Fut>(&self, key: &str, produce: F) -> FetchResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        if let Some(cached) = self.get(key) {
            log::debug!("Cache hit for {}", key);
            return Ok(cached);
        }

        let value = produce().await?;
        if let Err(e) = self.put(key, &value) {
            log::warn!("Failed to write {} back to cache: {}", key, e);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_deterministic() {
        assert_eq!(
            cache_key("VixBluesky.post", &["alice.bsky.social", "3k2"]),
            "vixbluesky.post_alice.bsky.social_3k2"
        );
        assert_eq!(cache_key("a", &[]), "a");
    }

    #[test]
    fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.put("a", "1".to_string(), Duration::from_secs(60));
        cache.put("b", "2".to_string(), Duration::ZERO);

        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entries_are_pruned_on_write() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            cache.put(&format!("stale_{}", i), "null".to_string(), Duration::ZERO);
        }
        cache.put("fresh", "1".to_string(), Duration::from_secs(60));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_remember_caches_absent_marker() {
        let cache = CacheManager::in_memory(Duration::from_secs(60));
        let mut calls = 0;

        let first: Option<String> = cache
            .remember("missing", || {
                calls += 1;
                async { Ok(None) }
            })
            .await
            .unwrap();
        assert_eq!(first, None);

        let second: Option<String> = cache
            .remember("missing", || async { Ok(Some("late".to_string())) })
            .await
            .unwrap();

        assert_eq!(second, None);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_remember_does_not_cache_errors() {
        let cache = CacheManager::in_memory(Duration::from_secs(60));

        let failed: FetchResult<String> = cache
            .remember("k", || async { Err(FetchError::Malformed("bad".into())) })
            .await;
        assert!(failed.is_err());

        let ok: String = cache
            .remember("k", || async { Ok("value".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok, "value");
    }
}
