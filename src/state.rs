use crate::application::services::{EngagementService, RealtimeReconciler, ThreadService};
use crate::infrastructure::cache::MemoryCacheService;
use crate::infrastructure::database::{ConnectionPool, SqliteRepository};
use crate::infrastructure::identity::SessionIdentity;
use crate::infrastructure::realtime::InMemoryChangeFeed;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// アプリケーション全体の状態を管理する構造体
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub repository: Arc<SqliteRepository>,
    pub change_feed: Arc<InMemoryChangeFeed>,
    pub cache: Arc<MemoryCacheService<Value>>,
    pub identity: Arc<SessionIdentity>,
    pub engagement_service: Arc<EngagementService>,
    pub thread_service: Arc<ThreadService>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;
        ensure_database_dir(&config.database.url)?;

        let pool = ConnectionPool::from_config(&config.database).await?;
        let change_feed = Arc::new(InMemoryChangeFeed::new(config.realtime.channel_capacity));
        let repository = Arc::new(SqliteRepository::with_change_feed(
            pool,
            change_feed.clone(),
        ));
        repository.initialize().await?;

        info!("Database initialized at {}", config.database.url);
        Ok(Self::from_parts(config, repository, change_feed))
    }

    /// 永続ストアと変更通知を共有し、キャッシュ・認証・セッションは独立した状態を組み立てる
    pub fn from_parts(
        config: AppConfig,
        repository: Arc<SqliteRepository>,
        change_feed: Arc<InMemoryChangeFeed>,
    ) -> Self {
        let cache = Arc::new(MemoryCacheService::<Value>::with_capacity(
            config.cache.ttl_secs,
            config.cache.capacity,
        ));
        let identity = Arc::new(SessionIdentity::new());

        let engagement_service = Arc::new(EngagementService::new(repository.clone()));
        let reconciler = RealtimeReconciler::new(
            change_feed.clone(),
            repository.clone(),
            repository.clone(),
            repository.clone(),
            identity.clone(),
        );
        let thread_service = Arc::new(ThreadService::new(
            repository.clone(),
            repository.clone(),
            repository.clone(),
            engagement_service.clone(),
            reconciler,
            cache.clone(),
            identity.clone(),
        ));

        Self {
            config,
            repository,
            change_feed,
            cache,
            identity,
            engagement_service,
            thread_service,
        }
    }
}

/// ファイル DB の場合は親ディレクトリを作成する
fn ensure_database_dir(url: &str) -> Result<(), AppError> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::ConfigurationError(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}
