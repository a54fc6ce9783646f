use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// 带过期时间的键值缓存
///
/// 过期只在读取时检查，读到过期条目会顺带删除；没有后台清理任务。
/// 克隆得到的是同一份缓存的句柄。
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    default_ttl: Duration,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl: self.default_ttl,
        }
    }
}

impl<V: Clone> CacheStore<V> {
    /// 创建新的缓存
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 写入缓存，覆盖同名条目；`ttl` 为空时使用默认时长
    pub async fn set<K: Into<String>>(&self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// 读取未过期的条目
    pub async fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // 条目已过期：升级为写锁后再确认一次，避免删掉刚写入的新值
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                debug!(key, "缓存条目已过期并被移除");
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// 删除条目
    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// 清空缓存
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// 当前占用的条目数（包含尚未被读取淘汰的过期条目）
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_fresh_value() {
        let cache = CacheStore::new(Duration::from_secs(30));
        cache.set("adspower", 1u32, None).await;

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get("adspower").await, Some(1));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_evicted_on_read() {
        let cache = CacheStore::new(Duration::from_secs(30));
        cache.set("adspower", "online".to_string(), None).await;

        tokio::time::advance(Duration::from_secs(31)).await;

        // 未读取前过期条目仍占用内存
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("adspower").await, None);
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.get("adspower").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_is_still_fresh() {
        let cache = CacheStore::new(Duration::from_secs(10));
        cache.set("k", 7u8, None).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k").await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_entry_ttl_and_overwrite() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.set("short", 1u32, Some(Duration::from_secs(5))).await;
        cache.set("long", 2u32, None).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("long").await, Some(2));

        // 覆盖写入同时重置过期时间
        cache.set("long", 3u32, Some(Duration::from_secs(100))).await;
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(cache.get("long").await, Some(3));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.set("a", 1u32, None).await;
        cache.set("b", 2u32, None).await;

        cache.delete("a").await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(2));

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = CacheStore::new(Duration::from_secs(60));
        let handle = cache.clone();
        handle.set("shared", 42u64, None).await;

        assert_eq!(cache.get("shared").await, Some(42));
    }
}
