use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// エンゲージメントの対象となるエンティティ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Post,
    Reply,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Post => "post",
            TargetType::Reply => "reply",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(TargetType::Post),
            "reply" => Ok(TargetType::Reply),
            other => Err(format!("Unknown target type: {other}")),
        }
    }
}
