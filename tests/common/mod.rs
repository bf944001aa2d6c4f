#![allow(dead_code)]

pub mod fixtures;
pub mod gated;
pub mod mocks;

use forum_sync_lib::AppState;
use forum_sync_lib::infrastructure::database::{ConnectionPool, SqliteRepository};
use forum_sync_lib::infrastructure::realtime::InMemoryChangeFeed;
use forum_sync_lib::shared::config::AppConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// 2 つのブラウザセッションが共有する永続ストアと変更通知
pub struct SharedBackend {
    pub repository: Arc<SqliteRepository>,
    pub change_feed: Arc<InMemoryChangeFeed>,
}

impl SharedBackend {
    pub async fn new() -> Self {
        forum_sync_lib::init_logging();
        let change_feed = Arc::new(InMemoryChangeFeed::default());
        let pool = ConnectionPool::from_memory()
            .await
            .expect("in-memory pool");
        let repository = Arc::new(SqliteRepository::with_change_feed(
            pool,
            change_feed.clone(),
        ));
        repository.initialize().await.expect("migrations");
        Self {
            repository,
            change_feed,
        }
    }

    /// ログイン済みのセッションを作る
    pub fn session(&self, user_id: &str) -> AppState {
        let state = AppState::from_parts(
            AppConfig::default(),
            self.repository.clone(),
            self.change_feed.clone(),
        );
        state.identity.login(user_id);
        state
    }

    pub fn anonymous_session(&self) -> AppState {
        AppState::from_parts(
            AppConfig::default(),
            self.repository.clone(),
            self.change_feed.clone(),
        )
    }
}

/// 条件が満たされるまでポーリングする（最大 2 秒）
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
