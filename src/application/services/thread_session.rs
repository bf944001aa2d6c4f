use crate::domain::entities::{Post, Reply};
use crate::domain::thread::{ThreadStore, ThreadView};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 永続ストアから読み込んだスレッドのフラットなスナップショット（キャッシュ用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub post: Post,
    pub replies: Vec<Reply>,
}

/// 閲覧中の投稿 1 件分の状態
///
/// 非同期処理の完了後は必ず `is_alive` を確認してからストアを更新する。
pub struct ThreadSession {
    post_id: String,
    store: RwLock<ThreadStore>,
    alive: AtomicBool,
}

impl ThreadSession {
    pub fn new(store: ThreadStore) -> Self {
        Self {
            post_id: store.post_id().to_string(),
            store: RwLock::new(store),
            alive: AtomicBool::new(true),
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ThreadStore> {
        self.store.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, ThreadStore> {
        self.store.write().await
    }

    pub async fn view(&self) -> ThreadView {
        self.store.read().await.view()
    }

    pub async fn post(&self) -> Post {
        self.store.read().await.post().clone()
    }
}
