use crate::domain::entities::Post;
use std::cmp::Ordering;

/// 投稿一覧の並び順
///
/// アップボート数の降順、同数なら作成日時の昇順、最後に ID の昇順。
pub fn compare_posts(a: &Post, b: &Post) -> Ordering {
    b.counters
        .upvotes
        .cmp(&a.counters.upvotes)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn rank_posts(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(compare_posts);
    posts
}
