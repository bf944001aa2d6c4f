use chrono::{DateTime, Duration, TimeZone, Utc};
use forum_sync_lib::domain::entities::{NewPost, Post, Reply};

pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn new_post(title: &str) -> NewPost {
    NewPost::new(title, format!("Body of {title}"), "forum").with_tags(["test", "fixture"])
}

pub fn post_at(id: &str, upvotes: u32, offset_secs: i64) -> Post {
    let mut post = Post::new_with_id(
        id.to_string(),
        format!("Post {id}"),
        "content".to_string(),
        "forum".to_string(),
        "author".to_string(),
        base_time() + Duration::seconds(offset_secs),
    );
    post.counters.upvotes = upvotes;
    post
}

pub fn reply_to(post_id: &str, id: &str, parent: Option<&str>) -> Reply {
    Reply::new_with_id(
        id.to_string(),
        post_id.to_string(),
        parent.map(str::to_string),
        format!("Reply {id}"),
        "replier".to_string(),
        base_time(),
    )
}
