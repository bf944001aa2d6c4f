use serde::{Deserialize, Serialize};
use std::fmt;

use super::TargetType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    Likes,
    Views,
    Upvotes,
}

impl CounterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterField::Likes => "likes",
            CounterField::Views => "views",
            CounterField::Upvotes => "upvotes",
        }
    }

    /// Reply が保持するカウンターは likes のみ
    pub fn applies_to(&self, target_type: TargetType) -> bool {
        match target_type {
            TargetType::Post => true,
            TargetType::Reply => matches!(self, CounterField::Likes),
        }
    }
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
