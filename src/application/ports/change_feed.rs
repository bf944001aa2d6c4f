use crate::domain::entities::{EngagementToggle, Post, Reply};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// 変更された行。テーブルはバリアントで表す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum ChangeRow {
    Post(Post),
    Reply(Reply),
    Toggle(EngagementToggle),
}

impl ChangeRow {
    /// 行が属する投稿の ID
    pub fn post_id(&self) -> &str {
        match self {
            ChangeRow::Post(post) => &post.id,
            ChangeRow::Reply(reply) => &reply.post_id,
            ChangeRow::Toggle(toggle) => &toggle.post_id,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            ChangeRow::Post(_) => "posts",
            ChangeRow::Reply(_) => "replies",
            ChangeRow::Toggle(_) => "engagement_toggles",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub row: ChangeRow,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, row: ChangeRow) -> Self {
        Self { kind, row }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub post_id: Option<String>,
}

impl FeedFilter {
    pub fn post(post_id: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id.into()),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match &self.post_id {
            Some(post_id) => event.row.post_id() == post_id,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug)]
pub struct FeedSubscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::Receiver<ChangeEvent>,
}

/// 変更通知チャネル
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: FeedFilter) -> Result<FeedSubscription, AppError>;
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), AppError>;
}
