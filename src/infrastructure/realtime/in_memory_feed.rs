use super::error::{FeedError, Result as FeedResult};
use crate::application::ports::change_feed::{
    ChangeEvent, ChangeFeed, FeedFilter, FeedSubscription, SubscriptionId,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 100;

struct Subscriber {
    filter: FeedFilter,
    sender: mpsc::Sender<ChangeEvent>,
}

/// プロセス内の変更通知チャネル
///
/// リポジトリが書き込み成功後に `publish` し、購読者ごとに到着順で配信する。
pub struct InMemoryChangeFeed {
    subscribers: Arc<RwLock<HashMap<SubscriptionId, Subscriber>>>,
    next_id: AtomicU64,
    channel_capacity: usize,
}

impl InMemoryChangeFeed {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// 条件に一致する購読者へ配信し、配信できた数を返す
    pub async fn publish(&self, event: ChangeEvent) -> usize {
        let targets: Vec<(SubscriptionId, mpsc::Sender<ChangeEvent>)> = {
            let subs = self.subscribers.read().await;
            subs.iter()
                .filter(|(_, sub)| sub.filter.matches(&event))
                .map(|(id, sub)| (*id, sub.sender.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sender) in targets {
            match deliver(id, &sender, event.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Dropping subscriber: {}", e);
                    closed.push(id);
                }
            }
        }

        if !closed.is_empty() {
            let mut subs = self.subscribers.write().await;
            for id in closed {
                subs.remove(&id);
            }
        }

        debug!(
            "Published {:?} on {} to {} subscribers",
            event.kind,
            event.row.table(),
            delivered
        );
        delivered
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    async fn remove(&self, id: SubscriptionId) -> FeedResult<()> {
        let mut subs = self.subscribers.write().await;
        subs.remove(&id)
            .map(|_| ())
            .ok_or(FeedError::SubscriptionNotFound(id))
    }
}

impl Default for InMemoryChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

async fn deliver(
    id: SubscriptionId,
    sender: &mpsc::Sender<ChangeEvent>,
    event: ChangeEvent,
) -> FeedResult<()> {
    sender
        .send(event)
        .await
        .map_err(|_| FeedError::ChannelClosed(id))
}

#[async_trait]
impl ChangeFeed for InMemoryChangeFeed {
    async fn subscribe(&self, filter: FeedFilter) -> Result<FeedSubscription, AppError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        {
            let mut subs = self.subscribers.write().await;
            subs.insert(id, Subscriber { filter, sender: tx });
        }
        debug!("Feed subscription {} opened", id);
        Ok(FeedSubscription { id, receiver: rx })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), AppError> {
        self.remove(id).await?;
        debug!("Feed subscription {} closed", id);
        Ok(())
    }
}
