use super::SqliteRepository;
use super::mapper::{map_count_row, map_post_row, map_reply_row, map_toggle_row};
use super::queries::{
    ADJUST_POST_LIKES, ADJUST_POST_UPVOTES, ADJUST_REPLY_LIKES, DELETE_TOGGLE, INSERT_TOGGLE,
    SELECT_POST_LIKES, SELECT_POST_UPVOTES, SELECT_REPLY_LIKES, SELECT_TOGGLE,
    SELECT_TOGGLES_BY_USER_AND_POST,
};
use crate::application::ports::change_feed::{ChangeKind, ChangeRow};
use crate::application::ports::repositories::EngagementRepository;
use crate::domain::entities::EngagementToggle;
use crate::domain::value_objects::{EngagementKind, TargetType};
use crate::shared::error::AppError;
use async_trait::async_trait;

fn unsupported(target_type: TargetType, kind: EngagementKind) -> AppError {
    AppError::ValidationError(format!("{kind} is not supported for {target_type}"))
}

#[async_trait]
impl EngagementRepository for SqliteRepository {
    async fn find_toggle(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<Option<EngagementToggle>, AppError> {
        let row = sqlx::query(SELECT_TOGGLE)
            .bind(user_id)
            .bind(target_type.as_str())
            .bind(target_id)
            .bind(kind.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|row| map_toggle_row(&row)).transpose()
    }

    async fn create_toggle(&self, toggle: &EngagementToggle) -> Result<bool, AppError> {
        let result = sqlx::query(INSERT_TOGGLE)
            .bind(&toggle.user_id)
            .bind(toggle.target_type.as_str())
            .bind(&toggle.target_id)
            .bind(toggle.kind.as_str())
            .bind(&toggle.post_id)
            .bind(toggle.created_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            self.publish(ChangeKind::Insert, ChangeRow::Toggle(toggle.clone()))
                .await;
        }
        Ok(inserted)
    }

    async fn delete_toggle(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(DELETE_TOGGLE)
            .bind(user_id)
            .bind(target_type.as_str())
            .bind(target_id)
            .bind(kind.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let toggle = map_toggle_row(&row)?;
        self.publish(ChangeKind::Delete, ChangeRow::Toggle(toggle))
            .await;
        Ok(true)
    }

    async fn list_user_toggles_for_post(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<Vec<EngagementToggle>, AppError> {
        let rows = sqlx::query(SELECT_TOGGLES_BY_USER_AND_POST)
            .bind(user_id)
            .bind(post_id)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.iter().map(map_toggle_row).collect()
    }

    async fn adjust_counter(
        &self,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
        delta: i64,
    ) -> Result<Option<u32>, AppError> {
        match (target_type, kind) {
            (TargetType::Post, _) => {
                let query = match kind {
                    EngagementKind::Like => ADJUST_POST_LIKES,
                    EngagementKind::Upvote => ADJUST_POST_UPVOTES,
                };
                let row = sqlx::query(query)
                    .bind(target_id)
                    .bind(delta)
                    .fetch_optional(self.pool.get_pool())
                    .await?;
                let Some(row) = row else {
                    return Ok(None);
                };
                let post = map_post_row(&row)?;
                let count = post.counter(kind.counter_field());
                self.publish(ChangeKind::Update, ChangeRow::Post(post)).await;
                Ok(Some(count))
            }
            (TargetType::Reply, EngagementKind::Like) => {
                let row = sqlx::query(ADJUST_REPLY_LIKES)
                    .bind(target_id)
                    .bind(delta)
                    .fetch_optional(self.pool.get_pool())
                    .await?;
                let Some(row) = row else {
                    return Ok(None);
                };
                let reply = map_reply_row(&row)?;
                let count = reply.likes;
                self.publish(ChangeKind::Update, ChangeRow::Reply(reply))
                    .await;
                Ok(Some(count))
            }
            (TargetType::Reply, EngagementKind::Upvote) => Err(unsupported(target_type, kind)),
        }
    }

    async fn get_counter(
        &self,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
    ) -> Result<Option<u32>, AppError> {
        let query = match (target_type, kind) {
            (TargetType::Post, EngagementKind::Like) => SELECT_POST_LIKES,
            (TargetType::Post, EngagementKind::Upvote) => SELECT_POST_UPVOTES,
            (TargetType::Reply, EngagementKind::Like) => SELECT_REPLY_LIKES,
            (TargetType::Reply, EngagementKind::Upvote) => {
                return Err(unsupported(target_type, kind));
            }
        };

        let row = sqlx::query(query)
            .bind(target_id)
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|row| map_count_row(&row)).transpose()
    }
}
