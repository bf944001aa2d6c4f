const POST_COLUMNS: &str =
    "id, title, content, category, author_id, tags, created_at, likes, views, upvotes, pinned";

pub(super) const INSERT_POST: &str = r#"
    INSERT INTO posts (
        id, title, content, category, author_id, tags, created_at, likes, views, upvotes, pinned
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

pub(super) const SELECT_POST_BY_ID: &str = r#"
    SELECT id, title, content, category, author_id, tags, created_at, likes, views, upvotes, pinned
    FROM posts
    WHERE id = ?1
"#;

pub(super) const SELECT_POST_COUNTERS: &str = r#"
    SELECT likes, views, upvotes
    FROM posts
    WHERE id = ?1
"#;

pub(super) const INCREMENT_POST_VIEWS: &str = r#"
    UPDATE posts
    SET views = views + 1
    WHERE id = ?1
    RETURNING id, title, content, category, author_id, tags, created_at, likes, views, upvotes, pinned
"#;

pub(super) const ADJUST_POST_LIKES: &str = r#"
    UPDATE posts
    SET likes = MAX(likes + ?2, 0)
    WHERE id = ?1
    RETURNING id, title, content, category, author_id, tags, created_at, likes, views, upvotes, pinned
"#;

pub(super) const ADJUST_POST_UPVOTES: &str = r#"
    UPDATE posts
    SET upvotes = MAX(upvotes + ?2, 0)
    WHERE id = ?1
    RETURNING id, title, content, category, author_id, tags, created_at, likes, views, upvotes, pinned
"#;

pub(super) const SELECT_POST_LIKES: &str = "SELECT likes AS count FROM posts WHERE id = ?1";
pub(super) const SELECT_POST_UPVOTES: &str = "SELECT upvotes AS count FROM posts WHERE id = ?1";

pub(super) const INSERT_REPLY: &str = r#"
    INSERT INTO replies (id, post_id, parent_reply_id, content, author_id, created_at, likes)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

pub(super) const SELECT_REPLY_BY_ID: &str = r#"
    SELECT id, post_id, parent_reply_id, content, author_id, created_at, likes
    FROM replies
    WHERE id = ?1
"#;

pub(super) const SELECT_REPLIES_BY_POST: &str = r#"
    SELECT id, post_id, parent_reply_id, content, author_id, created_at, likes
    FROM replies
    WHERE post_id = ?1
    ORDER BY created_at ASC, rowid ASC
"#;

pub(super) const SELECT_REPLY_LIKES: &str = "SELECT likes AS count FROM replies WHERE id = ?1";

pub(super) const DELETE_REPLY: &str = r#"
    DELETE FROM replies
    WHERE id = ?1
"#;

pub(super) const ADJUST_REPLY_LIKES: &str = r#"
    UPDATE replies
    SET likes = MAX(likes + ?2, 0)
    WHERE id = ?1
    RETURNING id, post_id, parent_reply_id, content, author_id, created_at, likes
"#;

pub(super) const SELECT_TOGGLE: &str = r#"
    SELECT user_id, target_type, target_id, kind, post_id, created_at
    FROM engagement_toggles
    WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3 AND kind = ?4
"#;

pub(super) const INSERT_TOGGLE: &str = r#"
    INSERT INTO engagement_toggles (user_id, target_type, target_id, kind, post_id, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(user_id, target_type, target_id, kind) DO NOTHING
"#;

pub(super) const DELETE_TOGGLE: &str = r#"
    DELETE FROM engagement_toggles
    WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3 AND kind = ?4
    RETURNING user_id, target_type, target_id, kind, post_id, created_at
"#;

pub(super) const SELECT_TOGGLES_BY_USER_AND_POST: &str = r#"
    SELECT user_id, target_type, target_id, kind, post_id, created_at
    FROM engagement_toggles
    WHERE user_id = ?1 AND post_id = ?2
    ORDER BY created_at ASC
"#;

/// 一覧取得のベース。条件は QueryBuilder で後ろに足す
pub(super) fn select_posts_base() -> String {
    format!("SELECT {POST_COLUMNS} FROM posts WHERE 1 = 1")
}
