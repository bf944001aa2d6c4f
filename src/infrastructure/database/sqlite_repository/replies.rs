use super::SqliteRepository;
use super::mapper::{map_count_row, map_reply_row};
use super::queries::{
    DELETE_REPLY, INSERT_REPLY, SELECT_REPLIES_BY_POST, SELECT_REPLY_BY_ID, SELECT_REPLY_LIKES,
};
use crate::application::ports::change_feed::{ChangeKind, ChangeRow};
use crate::application::ports::repositories::ReplyRepository;
use crate::domain::entities::Reply;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
impl ReplyRepository for SqliteRepository {
    async fn create_reply(&self, reply: &Reply) -> Result<(), AppError> {
        sqlx::query(INSERT_REPLY)
            .bind(&reply.id)
            .bind(&reply.post_id)
            .bind(reply.parent_reply_id.as_deref())
            .bind(&reply.content)
            .bind(&reply.author_id)
            .bind(reply.created_at.timestamp_millis())
            .bind(i64::from(reply.likes))
            .execute(self.pool.get_pool())
            .await?;

        self.publish(ChangeKind::Insert, ChangeRow::Reply(reply.clone()))
            .await;
        Ok(())
    }

    async fn get_reply(&self, id: &str) -> Result<Option<Reply>, AppError> {
        let row = sqlx::query(SELECT_REPLY_BY_ID)
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|row| map_reply_row(&row)).transpose()
    }

    async fn list_replies_by_post(&self, post_id: &str) -> Result<Vec<Reply>, AppError> {
        let rows = sqlx::query(SELECT_REPLIES_BY_POST)
            .bind(post_id)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.iter().map(map_reply_row).collect()
    }

    async fn get_reply_likes(&self, id: &str) -> Result<Option<u32>, AppError> {
        let row = sqlx::query(SELECT_REPLY_LIKES)
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|row| map_count_row(&row)).transpose()
    }

    async fn delete_reply(&self, id: &str) -> Result<bool, AppError> {
        let Some(reply) = self.get_reply(id).await? else {
            return Ok(false);
        };

        let result = sqlx::query(DELETE_REPLY)
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.publish(ChangeKind::Delete, ChangeRow::Reply(reply)).await;
        Ok(true)
    }
}
