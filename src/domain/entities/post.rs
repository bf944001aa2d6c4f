use crate::domain::value_objects::CounterField;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounters {
    pub likes: u32,
    pub views: u32,
    pub upvotes: u32,
}

impl PostCounters {
    pub fn get(&self, field: CounterField) -> u32 {
        match field {
            CounterField::Likes => self.likes,
            CounterField::Views => self.views,
            CounterField::Upvotes => self.upvotes,
        }
    }

    pub fn set(&mut self, field: CounterField, value: u32) {
        match field {
            CounterField::Likes => self.likes = value,
            CounterField::Views => self.views = value,
            CounterField::Upvotes => self.upvotes = value,
        }
    }
}

/// スレッドのルートとなる投稿
///
/// 返信ツリーは保持しない。ツリーは `ThreadStore` が投稿単位で組み立てる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub author_id: String,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub counters: PostCounters,
    pub pinned: bool,
}

impl Post {
    pub fn new(title: String, content: String, category: String, author_id: String) -> Self {
        Self::new_with_id(
            uuid::Uuid::new_v4().to_string(),
            title,
            content,
            category,
            author_id,
            Utc::now(),
        )
    }

    pub fn new_with_id(
        id: String,
        title: String,
        content: String,
        category: String,
        author_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            content,
            category,
            author_id,
            tags: BTreeSet::new(),
            created_at,
            counters: PostCounters::default(),
            pinned: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .filter_map(|tag| {
                let tag: String = tag.into();
                let trimmed = tag.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect();
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn counter(&self, field: CounterField) -> u32 {
        self.counters.get(field)
    }
}

/// 投稿フォームから渡される新規投稿
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub pinned: bool,
}

impl NewPost {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category: category.into(),
            tags: Vec::new(),
            pinned: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn into_post(self, author_id: String) -> Post {
        Post::new(self.title, self.content, self.category, author_id)
            .with_tags(self.tags)
            .pinned(self.pinned)
    }
}
