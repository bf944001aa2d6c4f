use super::ConnectionPool;
use crate::application::ports::change_feed::{ChangeEvent, ChangeKind, ChangeRow};
use crate::infrastructure::realtime::InMemoryChangeFeed;
use crate::shared::error::AppError;
use std::sync::Arc;

mod engagement;
mod mapper;
mod posts;
mod queries;
mod replies;

/// SQLite による永続化
///
/// 変更通知チャネルが設定されている場合、書き込み成功後に変更を配信する。
pub struct SqliteRepository {
    pool: ConnectionPool,
    feed: Option<Arc<InMemoryChangeFeed>>,
}

impl SqliteRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool, feed: None }
    }

    pub fn with_change_feed(pool: ConnectionPool, feed: Arc<InMemoryChangeFeed>) -> Self {
        Self {
            pool,
            feed: Some(feed),
        }
    }

    pub async fn initialize(&self) -> Result<(), AppError> {
        self.pool.migrate().await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool, AppError> {
        let result = sqlx::query("SELECT 1")
            .fetch_one(self.pool.get_pool())
            .await;
        Ok(result.is_ok())
    }

    async fn publish(&self, kind: ChangeKind, row: ChangeRow) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeEvent::new(kind, row)).await;
        }
    }
}
