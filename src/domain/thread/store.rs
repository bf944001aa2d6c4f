use super::view::{ReplyView, ThreadView};
use crate::domain::entities::{EngagementToggle, Post, Reply};
use crate::domain::value_objects::{CounterField, EngagementKind, TargetType};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ParentKey {
    Root,
    Reply(String),
}

type ViewerKey = (TargetType, String, EngagementKind);

#[derive(Debug, Clone)]
struct PendingSlot {
    missing_parent: String,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// ツリーに追加された。`reattached` は同時に接続できた保留中の子孫の数
    Inserted { reattached: usize },
    /// 親が未着のため保留バッファに入った
    Buffered { missing_parent: String },
    /// 同じ ID が既に存在する
    Duplicate,
    /// 削除済み ID の遅延エコー
    Deleted,
    /// 別の投稿の返信
    ForeignPost,
}

impl InsertOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate)
    }
}

#[derive(Debug, Clone)]
pub struct ThreadStore {
    post: Post,
    replies: HashMap<String, Reply>,
    children: HashMap<ParentKey, Vec<String>>,
    pending: HashMap<String, Vec<Reply>>,
    pending_index: HashMap<String, PendingSlot>,
    tombstones: HashSet<String>,
    viewer: HashSet<ViewerKey>,
    next_seq: u64,
}

impl ThreadStore {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            replies: HashMap::new(),
            children: HashMap::new(),
            pending: HashMap::new(),
            pending_index: HashMap::new(),
            tombstones: HashSet::new(),
            viewer: HashSet::new(),
            next_seq: 0,
        }
    }

    /// フラットなレコードからツリーを組み立てる
    pub fn from_records(
        post: Post,
        replies: Vec<Reply>,
        viewer_toggles: &[EngagementToggle],
    ) -> Self {
        let mut store = Self::new(post);
        for reply in replies {
            store.insert_reply(reply);
        }
        for toggle in viewer_toggles {
            store.set_viewer_engagement(toggle.target_type, &toggle.target_id, toggle.kind, true);
        }
        store
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn post_id(&self) -> &str {
        &self.post.id
    }

    /// 接続済みか保留中のいずれかに ID が存在するか
    pub fn contains(&self, reply_id: &str) -> bool {
        self.replies.contains_key(reply_id) || self.pending_index.contains_key(reply_id)
    }

    pub fn is_attached(&self, reply_id: &str) -> bool {
        self.replies.contains_key(reply_id)
    }

    pub fn is_deleted(&self, reply_id: &str) -> bool {
        self.tombstones.contains(reply_id)
    }

    pub fn get_reply(&self, reply_id: &str) -> Option<&Reply> {
        if let Some(reply) = self.replies.get(reply_id) {
            return Some(reply);
        }
        let slot = self.pending_index.get(reply_id)?;
        self.pending
            .get(&slot.missing_parent)?
            .iter()
            .find(|reply| reply.id == reply_id)
    }

    /// 接続済みと保留中を合わせた返信数
    pub fn len(&self) -> usize {
        self.replies.len() + self.pending_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.pending_index.len()
    }

    /// 返信を冪等に追加する
    pub fn insert_reply(&mut self, reply: Reply) -> InsertOutcome {
        if reply.post_id != self.post.id {
            warn!(
                "Ignoring reply {} for post {} in thread {}",
                reply.id, reply.post_id, self.post.id
            );
            return InsertOutcome::ForeignPost;
        }
        if self.tombstones.contains(&reply.id) {
            debug!("Suppressed insert of deleted reply {}", reply.id);
            return InsertOutcome::Deleted;
        }
        if self.contains(&reply.id) {
            debug!("Suppressed duplicate reply {}", reply.id);
            return InsertOutcome::Duplicate;
        }

        let parent_key = match reply.parent_reply_id.as_deref() {
            None => ParentKey::Root,
            Some(parent_id) if self.replies.contains_key(parent_id) => {
                ParentKey::Reply(parent_id.to_string())
            }
            Some(parent_id) if self.tombstones.contains(parent_id) => {
                debug!(
                    "Dropping reply {} under deleted parent {}",
                    reply.id, parent_id
                );
                self.tombstones.insert(reply.id.clone());
                return InsertOutcome::Deleted;
            }
            Some(parent_id) => {
                let missing_parent = parent_id.to_string();
                self.buffer(reply, missing_parent.clone());
                return InsertOutcome::Buffered { missing_parent };
            }
        };

        let reattached = self.attach(parent_key, reply);
        InsertOutcome::Inserted { reattached }
    }

    fn buffer(&mut self, reply: Reply, missing_parent: String) {
        debug!(
            "Buffering reply {} until parent {} arrives",
            reply.id, missing_parent
        );
        let seq = self.bump_seq();
        self.pending_index.insert(
            reply.id.clone(),
            PendingSlot {
                missing_parent: missing_parent.clone(),
                seq,
            },
        );
        self.pending.entry(missing_parent).or_default().push(reply);
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// 子リストの末尾に接続し、この返信を待っていた保留分を連鎖的に接続する
    fn attach(&mut self, parent_key: ParentKey, reply: Reply) -> usize {
        let mut worklist = vec![reply.id.clone()];
        self.children
            .entry(parent_key)
            .or_default()
            .push(reply.id.clone());
        self.replies.insert(reply.id.clone(), reply);

        let mut reattached = 0;
        while let Some(parent_id) = worklist.pop() {
            let Some(waiting) = self.pending.remove(&parent_id) else {
                continue;
            };
            for child in waiting {
                self.pending_index.remove(&child.id);
                self.children
                    .entry(ParentKey::Reply(parent_id.clone()))
                    .or_default()
                    .push(child.id.clone());
                worklist.push(child.id.clone());
                self.replies.insert(child.id.clone(), child);
                reattached += 1;
            }
        }

        if reattached > 0 {
            debug!("Reattached {} buffered replies", reattached);
        }
        reattached
    }

    /// カウンターを絶対値で置き換える。対象が無ければログを残して何もしない
    pub fn update_counter(
        &mut self,
        target_type: TargetType,
        target_id: &str,
        field: CounterField,
        value: u32,
    ) -> bool {
        if !field.applies_to(target_type) {
            warn!(
                "Counter {} is not tracked for {} {}",
                field, target_type, target_id
            );
            return false;
        }

        match self.counter_slot(target_type, target_id, field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => {
                warn!(
                    "Counter update skipped: {} {} not found in thread {}",
                    target_type, target_id, self.post.id
                );
                false
            }
        }
    }

    /// 楽観的な増減。戻り値は巻き戻し用の変更前の値
    pub fn adjust_counter(
        &mut self,
        target_type: TargetType,
        target_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Option<u32> {
        if !field.applies_to(target_type) {
            return None;
        }
        let slot = self.counter_slot(target_type, target_id, field)?;
        let previous = *slot;
        let next = (i64::from(previous) + delta).clamp(0, i64::from(u32::MAX));
        *slot = next as u32;
        Some(previous)
    }

    pub fn counter(
        &self,
        target_type: TargetType,
        target_id: &str,
        field: CounterField,
    ) -> Option<u32> {
        if !field.applies_to(target_type) {
            return None;
        }
        match target_type {
            TargetType::Post => (target_id == self.post.id).then(|| self.post.counter(field)),
            TargetType::Reply => self.get_reply(target_id).map(|reply| reply.likes),
        }
    }

    fn counter_slot(
        &mut self,
        target_type: TargetType,
        target_id: &str,
        field: CounterField,
    ) -> Option<&mut u32> {
        match target_type {
            TargetType::Post => {
                if target_id != self.post.id {
                    return None;
                }
                Some(match field {
                    CounterField::Likes => &mut self.post.counters.likes,
                    CounterField::Views => &mut self.post.counters.views,
                    CounterField::Upvotes => &mut self.post.counters.upvotes,
                })
            }
            TargetType::Reply => self.reply_mut(target_id).map(|reply| &mut reply.likes),
        }
    }

    fn reply_mut(&mut self, reply_id: &str) -> Option<&mut Reply> {
        if self.replies.contains_key(reply_id) {
            return self.replies.get_mut(reply_id);
        }
        let slot = self.pending_index.get(reply_id)?;
        self.pending
            .get_mut(&slot.missing_parent)?
            .iter_mut()
            .find(|reply| reply.id == reply_id)
    }

    pub fn set_viewer_engagement(
        &mut self,
        target_type: TargetType,
        target_id: &str,
        kind: EngagementKind,
        active: bool,
    ) {
        let key = (target_type, target_id.to_string(), kind);
        if active {
            self.viewer.insert(key);
        } else {
            self.viewer.remove(&key);
        }
    }

    pub fn has_engaged(&self, target_type: TargetType, target_id: &str, kind: EngagementKind) -> bool {
        self.viewer
            .contains(&(target_type, target_id.to_string(), kind))
    }

    /// 返信とその子孫を取り除き、遅れて届く挿入を抑止するため墓標を残す
    pub fn remove_reply(&mut self, reply_id: &str) -> bool {
        self.tombstones.insert(reply_id.to_string());

        let mut removed = false;
        if let Some(reply) = self.replies.remove(reply_id) {
            let parent_key = match reply.parent_reply_id {
                Some(parent_id) => ParentKey::Reply(parent_id),
                None => ParentKey::Root,
            };
            if let Some(siblings) = self.children.get_mut(&parent_key) {
                siblings.retain(|id| id != reply_id);
            }
            removed = true;
        } else if let Some(slot) = self.pending_index.remove(reply_id) {
            if let Some(waiting) = self.pending.get_mut(&slot.missing_parent) {
                waiting.retain(|reply| reply.id != reply_id);
                if waiting.is_empty() {
                    self.pending.remove(&slot.missing_parent);
                }
            }
            removed = true;
        }

        // 子孫（接続済み・保留中の両方）も取り除く
        let mut worklist = vec![reply_id.to_string()];
        while let Some(parent_id) = worklist.pop() {
            if let Some(child_ids) = self.children.remove(&ParentKey::Reply(parent_id.clone())) {
                for child_id in child_ids {
                    self.replies.remove(&child_id);
                    self.tombstones.insert(child_id.clone());
                    worklist.push(child_id);
                    removed = true;
                }
            }
            if let Some(waiting) = self.pending.remove(&parent_id) {
                for child in waiting {
                    self.pending_index.remove(&child.id);
                    self.tombstones.insert(child.id.clone());
                    worklist.push(child.id);
                    removed = true;
                }
            }
        }

        if !removed {
            debug!("Reply {} was not present; recorded tombstone only", reply_id);
        }
        removed
    }

    /// 親が未着のまま保留されている返信（到着順）
    pub fn orphans(&self) -> Vec<&Reply> {
        let mut slots: Vec<(&String, &PendingSlot)> = self.pending_index.iter().collect();
        slots.sort_by_key(|(_, slot)| slot.seq);
        slots
            .into_iter()
            .filter_map(|(id, _)| self.get_reply(id))
            .collect()
    }

    /// ネストしたツリー表示を組み立てる
    ///
    /// 保留中の返信は、兄弟の後ろにトップレベルの孤児として並べる。
    pub fn view(&self) -> ThreadView {
        let mut replies = self.render_children(&ParentKey::Root);

        let mut rendered: HashSet<&str> = HashSet::new();
        for orphan in self.orphans() {
            // 親も保留中なら、その親の下に入れ子で表示される
            let parent_pending = self
                .pending_index
                .get(&orphan.id)
                .is_some_and(|slot| self.pending_index.contains_key(&slot.missing_parent));
            if !parent_pending {
                replies.push(self.render_orphan(orphan, &mut rendered));
            }
        }
        // 保留同士で循環している分も落とさずに表示する
        for orphan in self.orphans() {
            if !rendered.contains(orphan.id.as_str()) {
                replies.push(self.render_orphan(orphan, &mut rendered));
            }
        }

        ThreadView {
            post: self.post.clone(),
            viewer_liked: self.has_engaged(TargetType::Post, &self.post.id, EngagementKind::Like),
            viewer_upvoted: self.has_engaged(
                TargetType::Post,
                &self.post.id,
                EngagementKind::Upvote,
            ),
            replies,
        }
    }

    fn render_children(&self, parent_key: &ParentKey) -> Vec<ReplyView> {
        let Some(child_ids) = self.children.get(parent_key) else {
            return Vec::new();
        };
        child_ids
            .iter()
            .filter_map(|id| self.replies.get(id))
            .map(|reply| ReplyView {
                reply: reply.clone(),
                viewer_liked: self.has_engaged(TargetType::Reply, &reply.id, EngagementKind::Like),
                orphaned: false,
                replies: self.render_children(&ParentKey::Reply(reply.id.clone())),
            })
            .collect()
    }

    fn render_orphan<'a>(&'a self, reply: &'a Reply, rendered: &mut HashSet<&'a str>) -> ReplyView {
        rendered.insert(reply.id.as_str());
        let mut nested = Vec::new();
        if let Some(waiting) = self.pending.get(&reply.id) {
            for child in waiting {
                if !rendered.contains(child.id.as_str()) {
                    nested.push(self.render_orphan(child, rendered));
                }
            }
        }
        ReplyView {
            reply: reply.clone(),
            viewer_liked: self.has_engaged(TargetType::Reply, &reply.id, EngagementKind::Like),
            orphaned: true,
            replies: nested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const POST_ID: &str = "post-1";

    fn sample_post() -> Post {
        Post::new_with_id(
            POST_ID.to_string(),
            "Looking for a cofounder".to_string(),
            "body".to_string(),
            "cofounders".to_string(),
            "author-1".to_string(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    fn reply(id: &str, parent: Option<&str>) -> Reply {
        Reply::new_with_id(
            id.to_string(),
            POST_ID.to_string(),
            parent.map(str::to_string),
            format!("content of {id}"),
            "author-2".to_string(),
            Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
        )
    }

    #[test]
    fn builds_nested_tree_from_flat_records() {
        let store = ThreadStore::from_records(
            sample_post(),
            vec![
                reply("r1", None),
                reply("r2", Some("r1")),
                reply("r3", None),
                reply("r4", Some("r2")),
            ],
            &[],
        );

        let view = store.view();
        assert_eq!(view.top_level_ids(), vec!["r1", "r3"]);
        assert_eq!(view.flatten_ids(), vec!["r1", "r2", "r4", "r3"]);
        assert!(view.replies.iter().all(|node| !node.orphaned));
    }

    #[test]
    fn duplicate_insert_keeps_single_node_and_order() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("r1", None));
        store.insert_reply(reply("r2", None));

        let outcome = store.insert_reply(reply("r1", None));

        assert_eq!(outcome, InsertOutcome::Duplicate);
        assert_eq!(store.len(), 2);
        assert_eq!(store.view().top_level_ids(), vec!["r1", "r2"]);
    }

    #[test]
    fn siblings_keep_arrival_order() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("parent", None));
        for id in ["c3", "c1", "c2"] {
            store.insert_reply(reply(id, Some("parent")));
        }

        let view = store.view();
        let parent = view.find("parent").expect("parent rendered");
        assert_eq!(parent.child_ids(), vec!["c3", "c1", "c2"]);
    }

    #[test]
    fn orphan_is_buffered_and_reattached_when_parent_arrives() {
        let mut store = ThreadStore::new(sample_post());

        let outcome = store.insert_reply(reply("child", Some("parent")));
        assert_eq!(
            outcome,
            InsertOutcome::Buffered {
                missing_parent: "parent".to_string()
            }
        );

        let view = store.view();
        let orphan = view.find("child").expect("orphan surfaced");
        assert!(orphan.orphaned);

        let outcome = store.insert_reply(reply("parent", None));
        assert_eq!(outcome, InsertOutcome::Inserted { reattached: 1 });
        assert_eq!(store.pending_len(), 0);

        let view = store.view();
        assert_eq!(view.top_level_ids(), vec!["parent"]);
        let parent = view.find("parent").expect("parent rendered");
        assert_eq!(parent.child_ids(), vec!["child"]);
        assert!(!parent.replies[0].orphaned);
    }

    #[test]
    fn buffered_chain_reattaches_transitively() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("grandchild", Some("child")));
        store.insert_reply(reply("child", Some("root")));

        let view = store.view();
        assert_eq!(view.top_level_ids(), vec!["child"]);
        assert_eq!(view.flatten_ids(), vec!["child", "grandchild"]);

        let outcome = store.insert_reply(reply("root", None));
        assert_eq!(outcome, InsertOutcome::Inserted { reattached: 2 });
        assert_eq!(store.view().flatten_ids(), vec!["root", "child", "grandchild"]);
    }

    #[test]
    fn duplicate_of_buffered_reply_is_suppressed() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("child", Some("missing")));
        assert!(store.insert_reply(reply("child", Some("missing"))).is_duplicate());
        assert_eq!(store.pending_len(), 1);
    }

    #[test]
    fn self_referencing_reply_is_surfaced_not_lost() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("loop", Some("loop")));

        let view = store.view();
        assert_eq!(view.reply_count(), 1);
        assert!(view.find("loop").expect("surfaced").orphaned);
    }

    #[test]
    fn foreign_post_reply_is_rejected() {
        let mut store = ThreadStore::new(sample_post());
        let mut foreign = reply("r1", None);
        foreign.post_id = "other".to_string();
        assert_eq!(store.insert_reply(foreign), InsertOutcome::ForeignPost);
        assert!(store.is_empty());
    }

    #[test]
    fn update_counter_on_missing_target_is_noop() {
        let mut store = ThreadStore::new(sample_post());
        assert!(!store.update_counter(TargetType::Reply, "ghost", CounterField::Likes, 3));
        assert!(!store.update_counter(TargetType::Post, "other", CounterField::Upvotes, 3));
        assert_eq!(store.post().counters.upvotes, 0);
    }

    #[test]
    fn update_counter_replaces_absolute_value() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("r1", None));

        assert!(store.update_counter(TargetType::Post, POST_ID, CounterField::Upvotes, 7));
        assert!(store.update_counter(TargetType::Reply, "r1", CounterField::Likes, 2));
        assert!(store.update_counter(TargetType::Reply, "r1", CounterField::Likes, 2));

        assert_eq!(store.counter(TargetType::Post, POST_ID, CounterField::Upvotes), Some(7));
        assert_eq!(store.counter(TargetType::Reply, "r1", CounterField::Likes), Some(2));
    }

    #[test]
    fn replies_do_not_track_upvotes() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("r1", None));
        assert!(!store.update_counter(TargetType::Reply, "r1", CounterField::Upvotes, 1));
    }

    #[test]
    fn adjust_counter_saturates_at_zero() {
        let mut store = ThreadStore::new(sample_post());
        let previous = store.adjust_counter(TargetType::Post, POST_ID, CounterField::Likes, -1);
        assert_eq!(previous, Some(0));
        assert_eq!(store.post().counters.likes, 0);

        store.adjust_counter(TargetType::Post, POST_ID, CounterField::Likes, 1);
        assert_eq!(store.post().counters.likes, 1);
    }

    #[test]
    fn pending_reply_counter_can_be_updated() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("child", Some("missing")));
        assert!(store.update_counter(TargetType::Reply, "child", CounterField::Likes, 4));
        assert_eq!(store.get_reply("child").map(|r| r.likes), Some(4));
    }

    #[test]
    fn remove_reply_drops_subtree_and_suppresses_late_echo() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("r1", None));
        store.insert_reply(reply("r2", Some("r1")));
        store.insert_reply(reply("r3", None));
        assert!(store.is_attached("r2"));

        assert!(store.remove_reply("r1"));
        assert_eq!(store.view().flatten_ids(), vec!["r3"]);
        assert!(store.is_deleted("r1"));
        assert!(store.is_deleted("r2"));
        assert!(!store.is_attached("r2"));
        assert!(!store.is_deleted("r3"));

        assert_eq!(store.insert_reply(reply("r1", None)), InsertOutcome::Deleted);
        assert_eq!(store.insert_reply(reply("r2", Some("r1"))), InsertOutcome::Deleted);
    }

    #[test]
    fn reply_under_deleted_parent_is_dropped() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("r1", None));
        store.remove_reply("r1");

        assert_eq!(store.insert_reply(reply("late", Some("r1"))), InsertOutcome::Deleted);
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn buffered_orphan_is_known_but_not_attached() {
        let mut store = ThreadStore::new(sample_post());
        store.insert_reply(reply("child", Some("parent")));

        assert!(store.contains("child"));
        assert!(!store.is_attached("child"));

        store.insert_reply(reply("parent", None));
        assert!(store.is_attached("child"));
    }

    #[test]
    fn delete_before_insert_converges() {
        let mut store = ThreadStore::new(sample_post());
        assert!(!store.remove_reply("r1"));
        assert_eq!(store.insert_reply(reply("r1", None)), InsertOutcome::Deleted);
        assert!(store.is_empty());
    }

    #[test]
    fn viewer_annotations_follow_toggle_records() {
        let toggle = EngagementToggle {
            user_id: "viewer".to_string(),
            target_type: TargetType::Reply,
            target_id: "r1".to_string(),
            kind: EngagementKind::Like,
            post_id: POST_ID.to_string(),
            created_at: Utc::now(),
        };
        let store = ThreadStore::from_records(sample_post(), vec![reply("r1", None)], &[toggle]);

        let view = store.view();
        assert!(view.find("r1").expect("reply").viewer_liked);
        assert!(!view.viewer_liked);
        assert!(!view.viewer_upvoted);
    }
}
