use super::thread_session::ThreadSession;
use crate::application::ports::change_feed::{
    ChangeEvent, ChangeFeed, ChangeKind, ChangeRow, FeedFilter, SubscriptionId,
};
use crate::application::ports::identity::IdentityProvider;
use crate::application::ports::repositories::{
    EngagementRepository, PostRepository, ReplyRepository,
};
use crate::domain::entities::{EngagementToggle, Reply};
use crate::domain::thread::InsertOutcome;
use crate::domain::value_objects::{CounterField, TargetType};
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    Buffered,
    /// 既に反映済みの行（ローカル変更のエコーなど）
    DuplicateSuppressed,
    Removed,
    CountersRefreshed,
    Ignored,
    /// セッションが閉じられていたため破棄した
    Discarded,
}

struct ActiveSubscription {
    id: SubscriptionId,
    handle: JoinHandle<()>,
}

/// 投稿ごとの変更通知を ThreadStore に畳み込む
///
/// 返信は ID で和集合を取り、カウンターは行から差分を計算せず常に永続ストアの絶対値を読み直す。
#[derive(Clone)]
pub struct RealtimeReconciler {
    feed: Arc<dyn ChangeFeed>,
    post_repository: Arc<dyn PostRepository>,
    reply_repository: Arc<dyn ReplyRepository>,
    engagement_repository: Arc<dyn EngagementRepository>,
    identity: Arc<dyn IdentityProvider>,
    active: Arc<RwLock<HashMap<String, ActiveSubscription>>>,
}

impl RealtimeReconciler {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        post_repository: Arc<dyn PostRepository>,
        reply_repository: Arc<dyn ReplyRepository>,
        engagement_repository: Arc<dyn EngagementRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            feed,
            post_repository,
            reply_repository,
            engagement_repository,
            identity,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// セッションの投稿を購読し、通知を順番に適用するタスクを起動する
    pub async fn subscribe(&self, session: Arc<ThreadSession>) -> Result<(), AppError> {
        let post_id = session.post_id().to_string();
        let mut active = self.active.write().await;
        // 閉じたセッションにはタスクを起動しない
        if !session.is_alive() {
            return Err(AppError::NotFound(format!("thread session for post {post_id}")));
        }
        if active.contains_key(&post_id) {
            debug!("Already subscribed to post {}", post_id);
            return Ok(());
        }

        let subscription = self.feed.subscribe(FeedFilter::post(&post_id)).await?;
        let mut receiver = subscription.receiver;
        let reconciler = self.clone();
        let task_post_id = post_id.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if !session.is_alive() {
                    break;
                }
                match reconciler.apply(&session, event).await {
                    Ok(outcome) => debug!("Reconciled event for post {}: {:?}", task_post_id, outcome),
                    Err(e) => warn!("Failed to reconcile event for post {}: {}", task_post_id, e),
                }
            }
            debug!("Reconciler task for post {} finished", task_post_id);
        });

        info!("Subscribed to post {} ({})", post_id, subscription.id);
        active.insert(
            post_id,
            ActiveSubscription {
                id: subscription.id,
                handle,
            },
        );
        Ok(())
    }

    /// タスクを止め、購読を解放する
    pub async fn unsubscribe(&self, post_id: &str) -> Result<(), AppError> {
        let removed = {
            let mut active = self.active.write().await;
            active.remove(post_id)
        };
        let Some(subscription) = removed else {
            debug!("No active subscription for post {}", post_id);
            return Ok(());
        };

        subscription.handle.abort();
        match self.feed.unsubscribe(subscription.id).await {
            Ok(()) | Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        info!("Unsubscribed from post {}", post_id);
        Ok(())
    }

    pub async fn is_subscribed(&self, post_id: &str) -> bool {
        self.active.read().await.contains_key(post_id)
    }

    /// 変更通知 1 件をストアへ適用する
    pub async fn apply(
        &self,
        session: &ThreadSession,
        event: ChangeEvent,
    ) -> Result<ReconcileOutcome, AppError> {
        if !session.is_alive() {
            return Ok(ReconcileOutcome::Discarded);
        }

        match (event.kind, event.row) {
            (ChangeKind::Insert, ChangeRow::Reply(reply)) => Ok(self.insert_reply(session, reply).await),
            (ChangeKind::Update, ChangeRow::Reply(reply)) => {
                self.refresh_reply(session, reply).await
            }
            (ChangeKind::Delete, ChangeRow::Reply(reply)) => {
                let mut store = session.write().await;
                if store.remove_reply(&reply.id) {
                    Ok(ReconcileOutcome::Removed)
                } else {
                    Ok(ReconcileOutcome::Ignored)
                }
            }
            (ChangeKind::Update, ChangeRow::Post(post)) => {
                self.refresh_post_counters(session, &post.id).await
            }
            (kind, ChangeRow::Post(post)) => {
                debug!("Ignoring {:?} of post {}", kind, post.id);
                Ok(ReconcileOutcome::Ignored)
            }
            (_, ChangeRow::Toggle(toggle)) => self.refresh_toggle(session, toggle).await,
        }
    }

    async fn insert_reply(&self, session: &ThreadSession, reply: Reply) -> ReconcileOutcome {
        let mut store = session.write().await;
        match store.insert_reply(reply) {
            InsertOutcome::Inserted { .. } => ReconcileOutcome::Inserted,
            InsertOutcome::Buffered { .. } => ReconcileOutcome::Buffered,
            InsertOutcome::Duplicate | InsertOutcome::Deleted => {
                ReconcileOutcome::DuplicateSuppressed
            }
            InsertOutcome::ForeignPost => ReconcileOutcome::Ignored,
        }
    }

    async fn refresh_reply(
        &self,
        session: &ThreadSession,
        reply: Reply,
    ) -> Result<ReconcileOutcome, AppError> {
        let reply_id = reply.id.clone();
        let likes = self.reply_repository.get_reply_likes(&reply_id).await?;
        if !session.is_alive() {
            return Ok(ReconcileOutcome::Discarded);
        }
        let Some(likes) = likes else {
            return Ok(ReconcileOutcome::Ignored);
        };

        let mut store = session.write().await;
        // 未着の返信への更新はそのまま和集合に加える
        if !store.contains(&reply_id) {
            store.insert_reply(reply);
        }
        if store.update_counter(TargetType::Reply, &reply_id, CounterField::Likes, likes) {
            Ok(ReconcileOutcome::CountersRefreshed)
        } else {
            Ok(ReconcileOutcome::Ignored)
        }
    }

    async fn refresh_post_counters(
        &self,
        session: &ThreadSession,
        post_id: &str,
    ) -> Result<ReconcileOutcome, AppError> {
        let counters = self.post_repository.get_post_counters(post_id).await?;
        if !session.is_alive() {
            return Ok(ReconcileOutcome::Discarded);
        }
        let Some(counters) = counters else {
            warn!("Post {} disappeared while refreshing counters", post_id);
            return Ok(ReconcileOutcome::Ignored);
        };

        let mut store = session.write().await;
        for field in [CounterField::Likes, CounterField::Views, CounterField::Upvotes] {
            store.update_counter(TargetType::Post, post_id, field, counters.get(field));
        }
        Ok(ReconcileOutcome::CountersRefreshed)
    }

    async fn refresh_toggle(
        &self,
        session: &ThreadSession,
        toggle: EngagementToggle,
    ) -> Result<ReconcileOutcome, AppError> {
        let count = self
            .engagement_repository
            .get_counter(toggle.target_type, &toggle.target_id, toggle.kind)
            .await?;

        let viewer_state = match self.identity.current_user_id() {
            Some(user_id) if user_id == toggle.user_id => Some(
                self.engagement_repository
                    .find_toggle(&user_id, toggle.target_type, &toggle.target_id, toggle.kind)
                    .await?
                    .is_some(),
            ),
            _ => None,
        };

        if !session.is_alive() {
            return Ok(ReconcileOutcome::Discarded);
        }

        let mut store = session.write().await;
        if let Some(engaged) = viewer_state {
            store.set_viewer_engagement(toggle.target_type, &toggle.target_id, toggle.kind, engaged);
        }
        let Some(count) = count else {
            return Ok(ReconcileOutcome::Ignored);
        };
        if store.update_counter(
            toggle.target_type,
            &toggle.target_id,
            toggle.kind.counter_field(),
            count,
        ) {
            Ok(ReconcileOutcome::CountersRefreshed)
        } else {
            Ok(ReconcileOutcome::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{EngagementTarget, Post};
    use crate::domain::thread::ThreadStore;
    use crate::domain::value_objects::EngagementKind;
    use crate::infrastructure::database::{ConnectionPool, SqliteRepository};
    use crate::infrastructure::identity::SessionIdentity;
    use crate::infrastructure::realtime::InMemoryChangeFeed;
    use chrono::Utc;
    use std::time::Duration;

    struct Fixture {
        repo: Arc<SqliteRepository>,
        reconciler: RealtimeReconciler,
        session: Arc<ThreadSession>,
    }

    fn sample_post() -> Post {
        Post::new_with_id(
            "p1".to_string(),
            "title".to_string(),
            "content".to_string(),
            "forum".to_string(),
            "author".to_string(),
            Utc::now(),
        )
    }

    fn reply(id: &str, parent: Option<&str>) -> Reply {
        Reply::new_with_id(
            id.to_string(),
            "p1".to_string(),
            parent.map(str::to_string),
            format!("reply {id}"),
            "u2".to_string(),
            Utc::now(),
        )
    }

    async fn setup() -> Fixture {
        let feed = Arc::new(InMemoryChangeFeed::default());
        let pool = ConnectionPool::from_memory().await.unwrap();
        let repo = Arc::new(SqliteRepository::with_change_feed(pool, feed.clone()));
        repo.initialize().await.unwrap();
        repo.create_post(&sample_post()).await.unwrap();

        let identity = Arc::new(SessionIdentity::logged_in("viewer"));
        let reconciler = RealtimeReconciler::new(
            feed,
            repo.clone(),
            repo.clone(),
            repo.clone(),
            identity,
        );
        let session = Arc::new(ThreadSession::new(ThreadStore::new(sample_post())));
        Fixture {
            repo,
            reconciler,
            session,
        }
    }

    fn insert_event(reply: Reply) -> ChangeEvent {
        ChangeEvent::new(ChangeKind::Insert, ChangeRow::Reply(reply))
    }

    #[tokio::test]
    async fn repeated_reply_insert_is_suppressed() {
        let fx = setup().await;

        let first = fx
            .reconciler
            .apply(&fx.session, insert_event(reply("r1", None)))
            .await
            .unwrap();
        let second = fx
            .reconciler
            .apply(&fx.session, insert_event(reply("r1", None)))
            .await
            .unwrap();

        assert_eq!(first, ReconcileOutcome::Inserted);
        assert_eq!(second, ReconcileOutcome::DuplicateSuppressed);
        assert_eq!(fx.session.view().await.reply_count(), 1);
    }

    #[tokio::test]
    async fn toggle_fact_applies_absolute_counter() {
        let fx = setup().await;
        fx.repo
            .adjust_counter(TargetType::Post, "p1", EngagementKind::Upvote, 1)
            .await
            .unwrap();
        fx.repo
            .adjust_counter(TargetType::Post, "p1", EngagementKind::Upvote, 1)
            .await
            .unwrap();

        let toggle = EngagementToggle::new(
            "someone".to_string(),
            &EngagementTarget::post("p1"),
            EngagementKind::Upvote,
        );
        let event = ChangeEvent::new(ChangeKind::Insert, ChangeRow::Toggle(toggle));

        // 同じ通知を 2 回受けても値は絶対値のまま
        for _ in 0..2 {
            let outcome = fx.reconciler.apply(&fx.session, event.clone()).await.unwrap();
            assert_eq!(outcome, ReconcileOutcome::CountersRefreshed);
        }
        assert_eq!(fx.session.post().await.counters.upvotes, 2);
    }

    #[tokio::test]
    async fn viewer_toggle_fact_refreshes_annotation() {
        let fx = setup().await;
        let toggle = EngagementToggle::new(
            "viewer".to_string(),
            &EngagementTarget::post("p1"),
            EngagementKind::Like,
        );
        fx.repo.create_toggle(&toggle).await.unwrap();

        fx.reconciler
            .apply(
                &fx.session,
                ChangeEvent::new(ChangeKind::Insert, ChangeRow::Toggle(toggle)),
            )
            .await
            .unwrap();

        assert!(fx.session.view().await.viewer_liked);
    }

    #[tokio::test]
    async fn reply_delete_removes_subtree() {
        let fx = setup().await;
        for r in [reply("r1", None), reply("r2", Some("r1"))] {
            fx.reconciler.apply(&fx.session, insert_event(r)).await.unwrap();
        }

        let outcome = fx
            .reconciler
            .apply(
                &fx.session,
                ChangeEvent::new(ChangeKind::Delete, ChangeRow::Reply(reply("r1", None))),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Removed);
        assert_eq!(fx.session.view().await.reply_count(), 0);
    }

    #[tokio::test]
    async fn closed_session_discards_events() {
        let fx = setup().await;
        fx.session.close();

        let outcome = fx
            .reconciler
            .apply(&fx.session, insert_event(reply("r1", None)))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Discarded);
        assert_eq!(fx.session.view().await.reply_count(), 0);
    }

    #[tokio::test]
    async fn subscription_folds_published_replies_until_unsubscribed() {
        let fx = setup().await;
        fx.reconciler.subscribe(fx.session.clone()).await.unwrap();
        assert!(fx.reconciler.is_subscribed("p1").await);

        fx.repo.create_reply(&reply("r1", None)).await.unwrap();

        let mut attempts = 0;
        while fx.session.view().await.reply_count() == 0 && attempts < 50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            attempts += 1;
        }
        assert_eq!(fx.session.view().await.flatten_ids(), vec!["r1"]);

        fx.reconciler.unsubscribe("p1").await.unwrap();
        assert!(!fx.reconciler.is_subscribed("p1").await);
        // 二重解除は何もしない
        fx.reconciler.unsubscribe("p1").await.unwrap();
    }

    #[tokio::test]
    async fn closed_session_is_not_subscribed() {
        let fx = setup().await;
        fx.session.close();

        let err = fx
            .reconciler
            .subscribe(fx.session.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!fx.reconciler.is_subscribed("p1").await);
    }
}
