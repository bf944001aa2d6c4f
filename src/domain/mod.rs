pub mod entities;
pub mod ranking;
pub mod thread;
pub mod value_objects;

pub use entities::{
    CounterChange, EngagementTarget, EngagementToggle, NewPost, Post, PostCounters, Reply,
    ToggleOutcome,
};
pub use ranking::rank_posts;
pub use thread::{InsertOutcome, ReplyView, ThreadStore, ThreadView};
pub use value_objects::{CacheKey, CounterField, EngagementKind, TargetType};
