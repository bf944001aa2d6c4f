use super::engagement_service::EngagementService;
use super::realtime_reconciler::RealtimeReconciler;
use super::thread_session::{ThreadSession, ThreadSnapshot};
use crate::application::ports::cache::{CacheStore, get_typed, put_typed};
use crate::application::ports::identity::IdentityProvider;
use crate::application::ports::repositories::{
    EngagementRepository, PostFilter, PostRepository, ReplyRepository,
};
use crate::domain::entities::{
    EngagementTarget, EngagementToggle, NewPost, Post, Reply, ToggleOutcome,
};
use crate::domain::ranking::rank_posts;
use crate::domain::thread::{ThreadStore, ThreadView};
use crate::domain::value_objects::{CacheKey, CounterField, EngagementKind, TargetType};
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 楽観的更新を巻き戻すための記録
struct OptimisticToggle {
    previous_count: Option<u32>,
    was_engaged: bool,
}

/// スレッド同期の窓口
///
/// 読み込み・一覧・投稿・トグルを受け付け、投稿ごとのセッションとキャッシュ、変更通知の購読を束ねる。
pub struct ThreadService {
    post_repository: Arc<dyn PostRepository>,
    reply_repository: Arc<dyn ReplyRepository>,
    engagement_repository: Arc<dyn EngagementRepository>,
    engagement_service: Arc<EngagementService>,
    reconciler: RealtimeReconciler,
    cache: Arc<dyn CacheStore>,
    identity: Arc<dyn IdentityProvider>,
    sessions: Arc<RwLock<HashMap<String, Arc<ThreadSession>>>>,
}

impl ThreadService {
    pub fn new(
        post_repository: Arc<dyn PostRepository>,
        reply_repository: Arc<dyn ReplyRepository>,
        engagement_repository: Arc<dyn EngagementRepository>,
        engagement_service: Arc<EngagementService>,
        reconciler: RealtimeReconciler,
        cache: Arc<dyn CacheStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            post_repository,
            reply_repository,
            engagement_repository,
            engagement_service,
            reconciler,
            cache,
            identity,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn require_user(&self) -> Result<String, AppError> {
        self.identity
            .current_user_id()
            .ok_or(AppError::AuthenticationRequired)
    }

    /// 開いているセッション（閉じたものは返さない）
    pub async fn session(&self, post_id: &str) -> Option<Arc<ThreadSession>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(post_id)
            .filter(|session| session.is_alive())
            .cloned()
    }

    /// 投稿と返信ツリーを読み込む（キャッシュ優先）
    ///
    /// 既にセッションがある場合は取得した返信を ID で和集合に加える。
    /// キャッシュから得たカウンターは、通知で進んだ値を巻き戻さないよう適用しない。
    pub async fn load_post(&self, post_id: &str) -> Option<ThreadView> {
        // 途中で閉じられたセッションには書き込まない
        let captured = self.session(post_id).await;
        let key = CacheKey::thread(post_id);
        let (snapshot, from_store) = match get_typed::<ThreadSnapshot>(self.cache.as_ref(), &key).await
        {
            Some(snapshot) => {
                debug!("Thread cache hit: {}", post_id);
                (snapshot, false)
            }
            None => match self.fetch_snapshot(post_id).await {
                Ok(Some(snapshot)) => {
                    put_typed(self.cache.as_ref(), key, &snapshot).await;
                    (snapshot, true)
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("Failed to load post {}: {}", post_id, e);
                    return self.view(post_id).await;
                }
            },
        };

        let viewer_toggles = self.fetch_viewer_toggles(post_id).await;
        let session = match captured {
            Some(session) => {
                if !session.is_alive() {
                    debug!("Thread session for post {} closed while loading", post_id);
                    return None;
                }
                Self::merge_into(&session, snapshot, &viewer_toggles, from_store).await;
                session
            }
            None => self.open_session(snapshot, &viewer_toggles, from_store).await,
        };
        Some(session.view().await)
    }

    async fn fetch_snapshot(&self, post_id: &str) -> Result<Option<ThreadSnapshot>, AppError> {
        let Some(post) = self.post_repository.get_post(post_id).await? else {
            return Ok(None);
        };
        let replies = self.reply_repository.list_replies_by_post(post_id).await?;
        Ok(Some(ThreadSnapshot { post, replies }))
    }

    async fn fetch_viewer_toggles(&self, post_id: &str) -> Vec<EngagementToggle> {
        let Some(user_id) = self.identity.current_user_id() else {
            return Vec::new();
        };
        match self
            .engagement_repository
            .list_user_toggles_for_post(&user_id, post_id)
            .await
        {
            Ok(toggles) => toggles,
            Err(e) => {
                warn!("Failed to load engagement state for post {}: {}", post_id, e);
                Vec::new()
            }
        }
    }

    /// セッションを開く。同時に開かれていた場合はそちらへ合流する
    async fn open_session(
        &self,
        snapshot: ThreadSnapshot,
        viewer_toggles: &[EngagementToggle],
        from_store: bool,
    ) -> Arc<ThreadSession> {
        let mut sessions = self.sessions.write().await;
        let existing = sessions
            .get(&snapshot.post.id)
            .filter(|session| session.is_alive())
            .cloned();

        let Some(session) = existing else {
            let post_id = snapshot.post.id.clone();
            let store = ThreadStore::from_records(snapshot.post, snapshot.replies, viewer_toggles);
            let session = Arc::new(ThreadSession::new(store));
            sessions.insert(post_id.clone(), session.clone());
            debug!("Opened thread session for post {}", post_id);
            return session;
        };
        drop(sessions);

        Self::merge_into(&session, snapshot, viewer_toggles, from_store).await;
        session
    }

    async fn merge_into(
        session: &ThreadSession,
        snapshot: ThreadSnapshot,
        viewer_toggles: &[EngagementToggle],
        from_store: bool,
    ) {
        let mut store = session.write().await;
        for reply in snapshot.replies {
            let reply_id = reply.id.clone();
            let likes = reply.likes;
            store.insert_reply(reply);
            if from_store {
                store.update_counter(TargetType::Reply, &reply_id, CounterField::Likes, likes);
            }
        }
        if from_store {
            for field in [CounterField::Likes, CounterField::Views, CounterField::Upvotes] {
                store.update_counter(
                    TargetType::Post,
                    &snapshot.post.id,
                    field,
                    snapshot.post.counter(field),
                );
            }
        }
        for toggle in viewer_toggles {
            store.set_viewer_engagement(toggle.target_type, &toggle.target_id, toggle.kind, true);
        }
    }

    /// 投稿一覧（キャッシュ優先）。開いているセッションの最新カウンターを重ねてから並べる
    ///
    /// 件数制限はカウンターを重ねて並べ直した後に適用する。
    pub async fn list_posts(&self, filter: &PostFilter) -> Vec<Post> {
        let store_filter = PostFilter {
            limit: None,
            ..filter.clone()
        };
        let key = CacheKey::post_list(&store_filter.cache_key());
        let posts = match get_typed::<Vec<Post>>(self.cache.as_ref(), &key).await {
            Some(posts) => posts,
            None => match self.post_repository.list_posts(&store_filter).await {
                Ok(posts) => {
                    put_typed(self.cache.as_ref(), key, &posts).await;
                    posts
                }
                Err(e) => {
                    warn!("Failed to list posts: {}", e);
                    return Vec::new();
                }
            },
        };

        let mut overlaid = Vec::with_capacity(posts.len());
        for mut post in posts {
            if let Some(session) = self.session(&post.id).await {
                post.counters = session.read().await.post().counters;
            }
            overlaid.push(post);
        }
        let mut ranked = rank_posts(overlaid);
        if let Some(limit) = filter.limit {
            ranked.truncate(limit);
        }
        ranked
    }

    pub async fn create_post(&self, draft: NewPost) -> Result<Post, AppError> {
        let user_id = self.require_user()?;
        if draft.title.trim().is_empty() {
            return Err(AppError::ValidationError("Post title is required".to_string()));
        }
        if draft.content.trim().is_empty() {
            return Err(AppError::ValidationError("Post content is required".to_string()));
        }

        let post = draft.into_post(user_id);
        self.post_repository.create_post(&post).await?;
        self.cache
            .invalidate_prefix(CacheKey::post_list_prefix())
            .await;
        info!("Created post {}", post.id);
        Ok(post)
    }

    /// 返信を楽観的に追加してから永続化する。失敗時は追加を取り消す
    pub async fn submit_reply(
        &self,
        post_id: &str,
        content: &str,
        parent_reply_id: Option<&str>,
    ) -> Result<Reply, AppError> {
        let user_id = self.require_user()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationError(
                "Reply content is required".to_string(),
            ));
        }

        let session = self.session(post_id).await;
        if let Some(parent_id) = parent_reply_id {
            self.ensure_reply_parent(post_id, parent_id, session.as_deref())
                .await?;
        }

        let reply = Reply::new(
            post_id.to_string(),
            parent_reply_id.map(str::to_string),
            content.to_string(),
            user_id,
        );

        let session = session.filter(|session| session.is_alive());
        if let Some(session) = &session {
            session.write().await.insert_reply(reply.clone());
        }
        self.invalidate_thread(post_id).await;

        if let Err(e) = self.reply_repository.create_reply(&reply).await {
            warn!("Failed to submit reply to post {}: {}", post_id, e);
            if let Some(session) = session.filter(|session| session.is_alive()) {
                session.write().await.remove_reply(&reply.id);
            }
            return Err(e);
        }
        // 書き込み中に読み込まれた古いスナップショットを捨てる
        self.invalidate_thread(post_id).await;

        info!("Submitted reply {} to post {}", reply.id, post_id);
        Ok(reply)
    }

    /// 返信先が同じ投稿に存在するか確かめる
    async fn ensure_reply_parent(
        &self,
        post_id: &str,
        parent_id: &str,
        session: Option<&ThreadSession>,
    ) -> Result<(), AppError> {
        if let Some(session) = session {
            let store = session.read().await;
            if store.is_deleted(parent_id) {
                return Err(AppError::NotFound(format!("reply {parent_id}")));
            }
            if store.is_attached(parent_id) {
                return Ok(());
            }
        }

        match self.reply_repository.get_reply(parent_id).await? {
            Some(parent) if parent.post_id == post_id => Ok(()),
            Some(parent) => Err(AppError::ValidationError(format!(
                "reply {} belongs to post {}, not {}",
                parent_id, parent.post_id, post_id
            ))),
            None => Err(AppError::NotFound(format!("reply {parent_id}"))),
        }
    }

    pub async fn toggle_like(
        &self,
        target_type: TargetType,
        target_id: &str,
    ) -> Result<ToggleOutcome, AppError> {
        let target = match target_type {
            TargetType::Post => EngagementTarget::post(target_id),
            TargetType::Reply => {
                let post_id = self.resolve_reply_post(target_id).await?;
                EngagementTarget::reply(target_id, post_id)
            }
        };
        self.toggle(target, EngagementKind::Like).await
    }

    pub async fn toggle_upvote(&self, post_id: &str) -> Result<ToggleOutcome, AppError> {
        self.toggle(EngagementTarget::post(post_id), EngagementKind::Upvote)
            .await
    }

    async fn resolve_reply_post(&self, reply_id: &str) -> Result<String, AppError> {
        {
            let sessions = self.sessions.read().await;
            for session in sessions.values() {
                if session.read().await.contains(reply_id) {
                    return Ok(session.post_id().to_string());
                }
            }
        }
        self.reply_repository
            .get_reply(reply_id)
            .await?
            .map(|reply| reply.post_id)
            .ok_or_else(|| AppError::NotFound(format!("reply {reply_id}")))
    }

    async fn toggle(
        &self,
        target: EngagementTarget,
        kind: EngagementKind,
    ) -> Result<ToggleOutcome, AppError> {
        let user_id = self.require_user()?;
        if !kind.supports(target.target_type) {
            return Err(AppError::ValidationError(format!(
                "{} is not supported for {}",
                kind, target.target_type
            )));
        }

        let field = kind.counter_field();
        let session = self.session(&target.post_id).await;
        let optimistic = match &session {
            Some(session) => {
                let mut store = session.write().await;
                let was_engaged = store.has_engaged(target.target_type, &target.target_id, kind);
                let delta = if was_engaged { -1 } else { 1 };
                let previous_count =
                    store.adjust_counter(target.target_type, &target.target_id, field, delta);
                store.set_viewer_engagement(
                    target.target_type,
                    &target.target_id,
                    kind,
                    !was_engaged,
                );
                Some(OptimisticToggle {
                    previous_count,
                    was_engaged,
                })
            }
            None => None,
        };
        self.invalidate_thread(&target.post_id).await;

        let result = self.engagement_service.toggle(&target, kind, &user_id).await;
        if result.is_ok() {
            self.invalidate_thread(&target.post_id).await;
        }

        let Some(session) = session.filter(|session| session.is_alive()) else {
            return result;
        };
        let mut store = session.write().await;
        match &result {
            Ok(outcome) => {
                let change = outcome.counter_change();
                store.update_counter(change.target_type, &change.target_id, change.field, change.value);
                store.set_viewer_engagement(target.target_type, &target.target_id, kind, outcome.active);
            }
            Err(e) => {
                warn!(
                    "Rolling back {} on {} {}: {}",
                    kind, target.target_type, target.target_id, e
                );
                if let Some(optimistic) = optimistic {
                    if let Some(previous) = optimistic.previous_count {
                        store.update_counter(target.target_type, &target.target_id, field, previous);
                    }
                    store.set_viewer_engagement(
                        target.target_type,
                        &target.target_id,
                        kind,
                        optimistic.was_engaged,
                    );
                }
            }
        }
        result
    }

    /// 閲覧数を加算する（未ログインでも可）
    pub async fn record_view(&self, post_id: &str) -> Result<u32, AppError> {
        let views = self
            .post_repository
            .increment_post_views(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?;

        if let Some(session) = self.session(post_id).await {
            session
                .write()
                .await
                .update_counter(TargetType::Post, post_id, CounterField::Views, views);
        }
        self.invalidate_thread(post_id).await;
        Ok(views)
    }

    /// 変更通知の購読を開始する。購読開始までの取りこぼしを埋めるため永続ストアから再同期する
    pub async fn subscribe(&self, post_id: &str) -> Result<(), AppError> {
        let session = match self.session(post_id).await {
            Some(session) => session,
            None => {
                self.load_post(post_id).await;
                self.session(post_id)
                    .await
                    .ok_or_else(|| AppError::NotFound(format!("post {post_id}")))?
            }
        };

        self.reconciler.subscribe(session.clone()).await?;

        match self.fetch_snapshot(post_id).await {
            Ok(Some(snapshot)) => {
                let viewer_toggles = self.fetch_viewer_toggles(post_id).await;
                if !session.is_alive() {
                    debug!("Thread session for post {} closed during resync", post_id);
                    return Err(session_closed(post_id));
                }
                Self::merge_into(&session, snapshot, &viewer_toggles, true).await;
            }
            Ok(None) => warn!("Post {} vanished while subscribing", post_id),
            Err(e) => warn!("Failed to resync post {}: {}", post_id, e),
        }
        Ok(())
    }

    /// セッションを閉じ、購読を解放する。以後に届く応答はストアに書き込まれない
    pub async fn unsubscribe(&self, post_id: &str) -> Result<(), AppError> {
        let removed = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(post_id)
        };
        if let Some(session) = removed {
            session.close();
            debug!("Closed thread session for post {}", post_id);
        }
        self.reconciler.unsubscribe(post_id).await
    }

    /// 現在のセッションの表示（読み込み済みの場合のみ）
    pub async fn view(&self, post_id: &str) -> Option<ThreadView> {
        let session = self.session(post_id).await?;
        Some(session.view().await)
    }

    async fn invalidate_thread(&self, post_id: &str) {
        self.cache.invalidate(CacheKey::thread(post_id).as_str()).await;
        self.cache
            .invalidate_prefix(CacheKey::post_list_prefix())
            .await;
    }
}

fn session_closed(post_id: &str) -> AppError {
    AppError::NotFound(format!("thread session for post {post_id}"))
}
