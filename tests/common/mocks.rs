use async_trait::async_trait;
use mockall::mock;

use forum_sync_lib::application::ports::repositories::{EngagementRepository, ReplyRepository};
use forum_sync_lib::domain::entities::{EngagementToggle, Reply};
use forum_sync_lib::domain::value_objects::{EngagementKind, TargetType};
use forum_sync_lib::shared::error::AppError;

mock! {
    pub ReplyStore {}

    #[async_trait]
    impl ReplyRepository for ReplyStore {
        async fn create_reply(&self, reply: &Reply) -> Result<(), AppError>;
        async fn get_reply(&self, id: &str) -> Result<Option<Reply>, AppError>;
        async fn list_replies_by_post(&self, post_id: &str) -> Result<Vec<Reply>, AppError>;
        async fn get_reply_likes(&self, id: &str) -> Result<Option<u32>, AppError>;
        async fn delete_reply(&self, id: &str) -> Result<bool, AppError>;
    }
}

mock! {
    pub EngagementStore {}

    #[async_trait]
    impl EngagementRepository for EngagementStore {
        async fn find_toggle(
            &self,
            user_id: &str,
            target_type: TargetType,
            target_id: &str,
            kind: EngagementKind,
        ) -> Result<Option<EngagementToggle>, AppError>;
        async fn create_toggle(&self, toggle: &EngagementToggle) -> Result<bool, AppError>;
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
}

pub type MockReplyRepository = MockReplyStore;
pub type MockEngagementRepository = MockEngagementStore;
