use crate::domain::value_objects::{CounterField, EngagementKind, TargetType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// いいね・アップボートの対象
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngagementTarget {
    pub target_type: TargetType,
    pub target_id: String,
    /// 対象が属する投稿（投稿自体なら同じ ID）
    pub post_id: String,
}

impl EngagementTarget {
    pub fn post(post_id: impl Into<String>) -> Self {
        let post_id = post_id.into();
        Self {
            target_type: TargetType::Post,
            target_id: post_id.clone(),
            post_id,
        }
    }

    pub fn reply(reply_id: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Reply,
            target_id: reply_id.into(),
            post_id: post_id.into(),
        }
    }
}

/// ユーザーと対象の関係。行の存在そのものが「エンゲージ済み」を意味する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementToggle {
    pub user_id: String,
    pub target_type: TargetType,
    pub target_id: String,
    pub kind: EngagementKind,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

impl EngagementToggle {
    pub fn new(user_id: String, target: &EngagementTarget, kind: EngagementKind) -> Self {
        Self {
            user_id,
            target_type: target.target_type,
            target_id: target.target_id.clone(),
            kind,
            post_id: target.post_id.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn target(&self) -> EngagementTarget {
        EngagementTarget {
            target_type: self.target_type,
            target_id: self.target_id.clone(),
            post_id: self.post_id.clone(),
        }
    }
}

/// カウンターの絶対値による更新通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterChange {
    pub target_type: TargetType,
    pub target_id: String,
    pub field: CounterField,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub target_type: TargetType,
    pub target_id: String,
    pub kind: EngagementKind,
    pub active: bool,
    pub new_count: u32,
}

impl ToggleOutcome {
    pub fn counter_change(&self) -> CounterChange {
        CounterChange {
            target_type: self.target_type,
            target_id: self.target_id.clone(),
            field: self.kind.counter_field(),
            value: self.new_count,
        }
    }
}
