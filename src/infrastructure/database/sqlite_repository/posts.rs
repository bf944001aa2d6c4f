use super::SqliteRepository;
use super::mapper::{map_counters_row, map_post_row, serialize_tags};
use super::queries::{
    INCREMENT_POST_VIEWS, INSERT_POST, SELECT_POST_BY_ID, SELECT_POST_COUNTERS, select_posts_base,
};
use crate::application::ports::change_feed::{ChangeKind, ChangeRow};
use crate::application::ports::repositories::{PostFilter, PostRepository};
use crate::domain::entities::{Post, PostCounters};
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};

#[async_trait]
impl PostRepository for SqliteRepository {
    async fn create_post(&self, post: &Post) -> Result<(), AppError> {
        let tags_json = serialize_tags(&post.tags)?;

        sqlx::query(INSERT_POST)
            .bind(&post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.category)
            .bind(&post.author_id)
            .bind(&tags_json)
            .bind(post.created_at.timestamp_millis())
            .bind(i64::from(post.counters.likes))
            .bind(i64::from(post.counters.views))
            .bind(i64::from(post.counters.upvotes))
            .bind(post.pinned)
            .execute(self.pool.get_pool())
            .await?;

        self.publish(ChangeKind::Insert, ChangeRow::Post(post.clone()))
            .await;
        Ok(())
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let row = sqlx::query(SELECT_POST_BY_ID)
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;

        match row {
            Some(row) => Ok(Some(map_post_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, AppError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(select_posts_base());

        if let Some(category) = &filter.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(author_id) = &filter.author_id {
            builder.push(" AND author_id = ").push_bind(author_id.clone());
        }
        if let Some(tag) = &filter.tag {
            builder
                .push(" AND EXISTS (SELECT 1 FROM json_each(posts.tags) WHERE json_each.value = ")
                .push_bind(tag.clone())
                .push(")");
        }
        if filter.pinned_only {
            builder.push(" AND pinned = 1");
        }
        builder.push(" ORDER BY upvotes DESC, created_at ASC, id ASC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(self.pool.get_pool()).await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(map_post_row(&row)?);
        }
        Ok(posts)
    }

    async fn get_post_counters(&self, id: &str) -> Result<Option<PostCounters>, AppError> {
        let row = sqlx::query(SELECT_POST_COUNTERS)
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|row| map_counters_row(&row)).transpose()
    }

    async fn increment_post_views(&self, id: &str) -> Result<Option<u32>, AppError> {
        let row = sqlx::query(INCREMENT_POST_VIEWS)
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let post = map_post_row(&row)?;
        let views = post.counters.views;
        self.publish(ChangeKind::Update, ChangeRow::Post(post)).await;
        Ok(Some(views))
    }
}
