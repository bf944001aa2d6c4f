use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 投稿、または別の返信にぶら下がる返信（フラットなレコード）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub post_id: String,
    pub parent_reply_id: Option<String>,
    pub content: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub likes: u32,
}

impl Reply {
    pub fn new(
        post_id: String,
        parent_reply_id: Option<String>,
        content: String,
        author_id: String,
    ) -> Self {
        Self::new_with_id(
            uuid::Uuid::new_v4().to_string(),
            post_id,
            parent_reply_id,
            content,
            author_id,
            Utc::now(),
        )
    }

    pub fn new_with_id(
        id: String,
        post_id: String,
        parent_reply_id: Option<String>,
        content: String,
        author_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            post_id,
            parent_reply_id: parent_reply_id.filter(|parent| !parent.trim().is_empty()),
            content,
            author_id,
            created_at,
            likes: 0,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_reply_id.is_none()
    }
}
