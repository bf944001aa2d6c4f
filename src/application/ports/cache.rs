use crate::domain::value_objects::CacheKey;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

/// キャッシュアサイド用のキー・バリューストア
///
/// ペイロードは JSON 値で保持するため、型ごとに実装を分ける必要はない。
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn put(&self, key: String, payload: Value);
    async fn invalidate(&self, key: &str);
    /// プレフィックスに一致するキーを全て無効化
    async fn invalidate_prefix(&self, prefix: &str);
}

/// 型付きで取得する。デコードできないエントリはミス扱いにする
pub async fn get_typed<T: DeserializeOwned>(cache: &dyn CacheStore, key: &CacheKey) -> Option<T> {
    let payload = cache.get(key.as_str()).await?;
    match serde_json::from_value(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Discarding undecodable cache entry {}: {}", key, e);
            cache.invalidate(key.as_str()).await;
            None
        }
    }
}

pub async fn put_typed<T: Serialize + Sync>(cache: &dyn CacheStore, key: CacheKey, value: &T) {
    match serde_json::to_value(value) {
        Ok(payload) => cache.put(key.into(), payload).await,
        Err(e) => warn!("Failed to serialize cache entry {}: {}", key, e),
    }
}
