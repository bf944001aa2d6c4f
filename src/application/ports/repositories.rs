use crate::domain::entities::{EngagementToggle, Post, PostCounters, Reply};
use crate::domain::value_objects::{EngagementKind, TargetType};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 投稿一覧の絞り込み条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author_id: Option<String>,
    pub pinned_only: bool,
    pub limit: Option<usize>,
}

impl PostFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// キャッシュキーに使う安定した文字列表現
    pub fn cache_key(&self) -> String {
        format!(
            "category={}|tag={}|author={}|pinned={}|limit={}",
            self.category.as_deref().unwrap_or("*"),
            self.tag.as_deref().unwrap_or("*"),
            self.author_id.as_deref().unwrap_or("*"),
            self.pinned_only,
            self.limit.map(|l| l.to_string()).unwrap_or_else(|| "*".to_string()),
        )
    }

    pub fn matches(&self, post: &Post) -> bool {
        if let Some(category) = &self.category {
            if &post.category != category {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !post.tags.contains(tag) {
                return false;
            }
        }
        if let Some(author_id) = &self.author_id {
            if &post.author_id != author_id {
                return false;
            }
        }
        !self.pinned_only || post.pinned
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create_post(&self, post: &Post) -> Result<(), AppError>;
    async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError>;
    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, AppError>;
    async fn get_post_counters(&self, id: &str) -> Result<Option<PostCounters>, AppError>;
    /// 閲覧数を 1 増やし、更新後の値を返す
    async fn increment_post_views(&self, id: &str) -> Result<Option<u32>, AppError>;
}

#[async_trait]
pub trait ReplyRepository: Send + Sync {
    async fn create_reply(&self, reply: &Reply) -> Result<(), AppError>;
    async fn get_reply(&self, id: &str) -> Result<Option<Reply>, AppError>;
    /// 作成順（同時刻は挿入順）で返す
    async fn list_replies_by_post(&self, post_id: &str) -> Result<Vec<Reply>, AppError>;
    async fn get_reply_likes(&self, id: &str) -> Result<Option<u32>, AppError>;
    async fn delete_reply(&self, id: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait EngagementRepository: Send + Sync {
    async fn find_toggle(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<Option<EngagementToggle>, AppError>;

    /// 行を作成できた場合 true（既に存在すれば false）
    async fn create_toggle(&self, toggle: &EngagementToggle) -> Result<bool, AppError>;

    /// 行を削除できた場合 true
    async fn delete_toggle(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<bool, AppError>;

    async fn list_user_toggles_for_post(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<Vec<EngagementToggle>, AppError>;

    /// カウンターを delta だけ増減し（下限 0）、更新後の値を返す
    async fn adjust_counter(
        &self,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
        delta: i64,
    ) -> Result<Option<u32>, AppError>;

    async fn get_counter(
        &self,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<Option<u32>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_distinguishes_filters() {
        let all = PostFilter::all();
        let forum = PostFilter::category("forum");
        let tagged = PostFilter::category("forum").with_tag("rust");
        assert_ne!(all.cache_key(), forum.cache_key());
        assert_ne!(forum.cache_key(), tagged.cache_key());
        assert_eq!(forum.cache_key(), PostFilter::category("forum").cache_key());
    }

    #[test]
    fn filter_matches_category_tag_and_pinned() {
        let post = Post::new("t".into(), "c".into(), "forum".into(), "u1".into())
            .with_tags(["rust"])
            .pinned(true);

        assert!(PostFilter::all().matches(&post));
        assert!(PostFilter::category("forum").with_tag("rust").matches(&post));
        assert!(!PostFilter::category("marketplace").matches(&post));
        assert!(!PostFilter::all().with_tag("go").matches(&post));

        let pinned_only = PostFilter {
            pinned_only: true,
            ..PostFilter::default()
        };
        assert!(pinned_only.matches(&post));
    }
}
