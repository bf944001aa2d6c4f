use crate::domain::entities::{EngagementToggle, Post, PostCounters, Reply};
use crate::domain::value_objects::{EngagementKind, TargetType};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::{Row, sqlite::SqliteRow};
use std::collections::BTreeSet;
use tracing::warn;

/// SQLite の INTEGER を非負のカウンター値へ
pub(super) fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

pub(super) fn serialize_tags(tags: &BTreeSet<String>) -> Result<String, AppError> {
    Ok(serde_json::to_string(tags)?)
}

fn deserialize_tags(tags_json: &str) -> BTreeSet<String> {
    if tags_json.trim().is_empty() {
        return BTreeSet::new();
    }
    match serde_json::from_str(tags_json) {
        Ok(tags) => tags,
        Err(e) => {
            warn!("Ignoring malformed tags column {:?}: {}", tags_json, e);
            BTreeSet::new()
        }
    }
}

pub(super) fn map_post_row(row: &SqliteRow) -> Result<Post, AppError> {
    let id: String = row.try_get("id")?;
    let title: String = row.try_get("title")?;
    let content: String = row.try_get("content")?;
    let category: String = row.try_get("category")?;
    let author_id: String = row.try_get("author_id")?;
    let tags_json: String = row.try_get("tags").unwrap_or_default();
    let created_at: i64 = row.try_get("created_at")?;
    let pinned: bool = row.try_get("pinned")?;

    let mut post = Post::new_with_id(
        id,
        title,
        content,
        category,
        author_id,
        to_datetime(created_at),
    )
    .pinned(pinned);
    post.tags = deserialize_tags(&tags_json);
    post.counters = map_counters_row(row)?;
    Ok(post)
}

pub(super) fn map_counters_row(row: &SqliteRow) -> Result<PostCounters, AppError> {
    let likes: i64 = row.try_get("likes")?;
    let views: i64 = row.try_get("views")?;
    let upvotes: i64 = row.try_get("upvotes")?;
    Ok(PostCounters {
        likes: to_count(likes),
        views: to_count(views),
        upvotes: to_count(upvotes),
    })
}

pub(super) fn map_reply_row(row: &SqliteRow) -> Result<Reply, AppError> {
    let created_at: i64 = row.try_get("created_at")?;
    let likes: i64 = row.try_get("likes")?;

    let mut reply = Reply::new_with_id(
        row.try_get("id")?,
        row.try_get("post_id")?,
        row.try_get("parent_reply_id")?,
        row.try_get("content")?,
        row.try_get("author_id")?,
        to_datetime(created_at),
    );
    reply.likes = to_count(likes);
    Ok(reply)
}

pub(super) fn map_toggle_row(row: &SqliteRow) -> Result<EngagementToggle, AppError> {
    let target_type: String = row.try_get("target_type")?;
    let kind: String = row.try_get("kind")?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(EngagementToggle {
        user_id: row.try_get("user_id")?,
        target_type: target_type
            .parse::<TargetType>()
            .map_err(AppError::SerializationError)?,
        target_id: row.try_get("target_id")?,
        kind: kind
            .parse::<EngagementKind>()
            .map_err(AppError::SerializationError)?,
        post_id: row.try_get("post_id")?,
        created_at: to_datetime(created_at),
    })
}

pub(super) fn map_count_row(row: &SqliteRow) -> Result<u32, AppError> {
    let count: i64 = row.try_get("count")?;
    Ok(to_count(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_tags_fall_back_to_empty_set() {
        assert!(deserialize_tags("not json").is_empty());
        assert!(deserialize_tags("").is_empty());
        assert_eq!(
            deserialize_tags(r#"["rust","sqlx"]"#).into_iter().collect::<Vec<_>>(),
            vec!["rust".to_string(), "sqlx".to_string()]
        );
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(to_count(-3), 0);
        assert_eq!(to_count(12), 12);
        assert_eq!(to_count(i64::MAX), u32::MAX);
    }
}
