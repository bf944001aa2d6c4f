use crate::domain::entities::{Post, Reply};
use serde::{Deserialize, Serialize};

/// ThreadStore から組み立てたネスト済みのスレッド表示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadView {
    pub post: Post,
    pub viewer_liked: bool,
    pub viewer_upvoted: bool,
    pub replies: Vec<ReplyView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyView {
    pub reply: Reply,
    pub viewer_liked: bool,
    /// 親返信が未着のまま表示されている（整合性が取れていない）
    pub orphaned: bool,
    pub replies: Vec<ReplyView>,
}

impl ThreadView {
    /// 表示中の返信総数（孤児を含む）
    pub fn reply_count(&self) -> usize {
        self.replies.iter().map(ReplyView::subtree_len).sum()
    }

    pub fn find(&self, reply_id: &str) -> Option<&ReplyView> {
        self.replies.iter().find_map(|node| node.find(reply_id))
    }

    pub fn top_level_ids(&self) -> Vec<&str> {
        self.replies
            .iter()
            .map(|node| node.reply.id.as_str())
            .collect()
    }

    /// 深さ優先（行きがけ順）で返信 ID を列挙
    pub fn flatten_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        for node in &self.replies {
            node.collect_ids(&mut ids);
        }
        ids
    }
}

impl ReplyView {
    fn subtree_len(&self) -> usize {
        1 + self.replies.iter().map(ReplyView::subtree_len).sum::<usize>()
    }

    fn find(&self, reply_id: &str) -> Option<&ReplyView> {
        if self.reply.id == reply_id {
            return Some(self);
        }
        self.replies.iter().find_map(|node| node.find(reply_id))
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        ids.push(self.reply.id.as_str());
        for child in &self.replies {
            child.collect_ids(ids);
        }
    }

    pub fn child_ids(&self) -> Vec<&str> {
        self.replies
            .iter()
            .map(|node| node.reply.id.as_str())
            .collect()
    }
}
