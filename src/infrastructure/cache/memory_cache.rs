use crate::application::ports::cache::CacheStore;
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 512;

#[derive(Clone)]
struct CacheEntry<T> {
    data: T,
    stored_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// メモリキャッシュサービス
///
/// 容量を超えると最も古く参照されたエントリから追い出す。
pub struct MemoryCacheService<T: Clone> {
    cache: Arc<RwLock<LruCache<String, CacheEntry<T>>>>,
    default_ttl: Duration,
}

impl<T> MemoryCacheService<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 新しいキャッシュサービスを作成
    pub fn new(default_ttl_seconds: u64) -> Self {
        Self::with_capacity(default_ttl_seconds, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(default_ttl_seconds: u64, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            default_ttl: Duration::from_secs(default_ttl_seconds),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// キャッシュにデータを保存
    pub async fn put(&self, key: String, value: T) {
        self.put_with_ttl(key, value, self.default_ttl).await;
    }

    /// 指定したTTLでキャッシュに保存
    pub async fn put_with_ttl(&self, key: String, value: T, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            stored_at: Instant::now(),
            ttl,
        };

        let mut cache = self.cache.write().await;
        cache.put(key, entry);
    }

    /// キャッシュからデータを取得（期限切れはミス）
    pub async fn get(&self, key: &str) -> Option<T> {
        let mut cache = self.cache.write().await;
        let now = Instant::now();

        let lookup = cache
            .get(key)
            .map(|entry| entry.is_fresh(now).then(|| entry.data.clone()));

        match lookup {
            Some(Some(data)) => Some(data),
            Some(None) => {
                cache.pop(key);
                debug!("Cache entry expired: {}", key);
                None
            }
            None => None,
        }
    }

    /// キャッシュから削除
    pub async fn invalidate(&self, key: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(key);
    }

    /// プレフィックスにマッチするキーを削除
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut cache = self.cache.write().await;
        let keys_to_remove: Vec<String> = cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys_to_remove {
            cache.pop(&key);
        }
    }

    /// キャッシュをクリア
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// 期限切れのエントリを削除
    pub async fn cleanup_expired(&self) -> usize {
        let mut cache = self.cache.write().await;
        let now = Instant::now();

        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            cache.pop(key);
        }
        expired.len()
    }

    /// キャッシュサイズを取得
    pub async fn size(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheService<Value> {
    async fn get(&self, key: &str) -> Option<Value> {
        MemoryCacheService::get(self, key).await
    }

    async fn put(&self, key: String, payload: Value) {
        MemoryCacheService::put(self, key, payload).await;
    }

    async fn invalidate(&self, key: &str) {
        MemoryCacheService::invalidate(self, key).await;
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        MemoryCacheService::invalidate_prefix(self, prefix).await;
    }
}
