use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{CounterField, TargetType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Like,
    Upvote,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Upvote => "upvote",
        }
    }

    /// トグルが増減させるカウンター
    pub fn counter_field(&self) -> CounterField {
        match self {
            EngagementKind::Like => CounterField::Likes,
            EngagementKind::Upvote => CounterField::Upvotes,
        }
    }

    pub fn supports(&self, target_type: TargetType) -> bool {
        self.counter_field().applies_to(target_type)
    }
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngagementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(EngagementKind::Like),
            "upvote" => Ok(EngagementKind::Upvote),
            other => Err(format!("Unknown engagement kind: {other}")),
        }
    }
}
