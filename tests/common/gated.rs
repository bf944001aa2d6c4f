use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

use forum_sync_lib::application::ports::repositories::{
    EngagementRepository, PostFilter, PostRepository, ReplyRepository,
};
use forum_sync_lib::application::services::{EngagementService, RealtimeReconciler, ThreadService};
use forum_sync_lib::domain::entities::{EngagementToggle, Post, PostCounters, Reply};
use forum_sync_lib::domain::value_objects::{EngagementKind, TargetType};
use forum_sync_lib::infrastructure::cache::MemoryCacheService;
use forum_sync_lib::infrastructure::database::SqliteRepository;
use forum_sync_lib::infrastructure::identity::SessionIdentity;
use forum_sync_lib::shared::error::AppError;

use super::SharedBackend;

/// 一度だけ呼び出しを止めるゲート
pub struct Gate {
    armed: AtomicBool,
    fail: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl Gate {
    fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// 次の対象呼び出しを止める
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// 止めた呼び出しを、解放後に失敗させる
    pub fn arm_failing(&self) {
        self.fail.store(true, Ordering::SeqCst);
        self.arm();
    }

    /// 対象の呼び出しがゲートに到達するまで待つ
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) -> Result<(), AppError> {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.entered.notify_one();
        self.release.notified().await;
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(AppError::TransientStore("disk I/O error".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedCall {
    GetPost,
    CreateReply,
    CreateToggle,
}

/// 指定した呼び出しをゲートで止められる SQLite リポジトリ
pub struct GatedRepository {
    inner: Arc<SqliteRepository>,
    call: GatedCall,
    gate: Arc<Gate>,
}

impl GatedRepository {
    pub fn new(inner: Arc<SqliteRepository>, call: GatedCall) -> Self {
        Self {
            inner,
            call,
            gate: Arc::new(Gate::new()),
        }
    }

    async fn hold(&self, call: GatedCall) -> Result<(), AppError> {
        if call == self.call {
            self.gate.pass().await
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PostRepository for GatedRepository {
    async fn create_post(&self, post: &Post) -> Result<(), AppError> {
        self.inner.create_post(post).await
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        self.hold(GatedCall::GetPost).await?;
        self.inner.get_post(id).await
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, AppError> {
        self.inner.list_posts(filter).await
    }

    async fn get_post_counters(&self, id: &str) -> Result<Option<PostCounters>, AppError> {
        self.inner.get_post_counters(id).await
    }

    async fn increment_post_views(&self, id: &str) -> Result<Option<u32>, AppError> {
        self.inner.increment_post_views(id).await
    }
}

#[async_trait]
impl ReplyRepository for GatedRepository {
    async fn create_reply(&self, reply: &Reply) -> Result<(), AppError> {
        self.hold(GatedCall::CreateReply).await?;
        self.inner.create_reply(reply).await
    }

    async fn get_reply(&self, id: &str) -> Result<Option<Reply>, AppError> {
        self.inner.get_reply(id).await
    }

    async fn list_replies_by_post(&self, post_id: &str) -> Result<Vec<Reply>, AppError> {
        self.inner.list_replies_by_post(post_id).await
    }

    async fn get_reply_likes(&self, id: &str) -> Result<Option<u32>, AppError> {
        self.inner.get_reply_likes(id).await
    }

    async fn delete_reply(&self, id: &str) -> Result<bool, AppError> {
        self.inner.delete_reply(id).await
    }
}

#[async_trait]
impl EngagementRepository for GatedRepository {
    async fn find_toggle(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<Option<EngagementToggle>, AppError> {
        self.inner
            .find_toggle(user_id, target_type, target_id, kind)
            .await
    }

    async fn create_toggle(&self, toggle: &EngagementToggle) -> Result<bool, AppError> {
        self.hold(GatedCall::CreateToggle).await?;
        self.inner.create_toggle(toggle).await
    }

    async fn delete_toggle(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<bool, AppError> {
        self.inner
            .delete_toggle(user_id, target_type, target_id, kind)
            .await
    }

    async fn list_user_toggles_for_post(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<Vec<EngagementToggle>, AppError> {
        self.inner.list_user_toggles_for_post(user_id, post_id).await
    }

    async fn adjust_counter(
        &self,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
        delta: i64,
    ) -> Result<Option<u32>, AppError> {
        self.inner
            .adjust_counter(target_type, target_id, kind, delta)
            .await
    }

    async fn get_counter(
        &self,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<Option<u32>, AppError> {
        self.inner.get_counter(target_type, target_id, kind).await
    }
}

/// ゲート付きリポジトリを差し込んだログイン済みの ThreadService
pub fn gated_service(
    backend: &SharedBackend,
    user_id: &str,
    call: GatedCall,
) -> (ThreadService, Arc<Gate>) {
    let repository = Arc::new(GatedRepository::new(backend.repository.clone(), call));
    let gate = repository.gate.clone();
    let identity = Arc::new(SessionIdentity::logged_in(user_id));
    let reconciler = RealtimeReconciler::new(
        backend.change_feed.clone(),
        repository.clone(),
        repository.clone(),
        repository.clone(),
        identity.clone(),
    );
    let service = ThreadService::new(
        repository.clone(),
        repository.clone(),
        repository.clone(),
        Arc::new(EngagementService::new(repository)),
        reconciler,
        Arc::new(MemoryCacheService::<Value>::new(300)),
        identity,
    );
    (service, gate)
}
