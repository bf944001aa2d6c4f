use std::fmt;

const POST_LIST_PREFIX: &str = "posts:list:";
const THREAD_PREFIX: &str = "posts:thread:";

/// キャッシュアサイド層で使うキー
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn post_list(filter_key: &str) -> Self {
        Self(format!("{POST_LIST_PREFIX}{filter_key}"))
    }

    pub fn thread(post_id: &str) -> Self {
        Self(format!("{THREAD_PREFIX}{post_id}"))
    }

    /// 全ての一覧キャッシュに共通するプレフィックス
    pub fn post_list_prefix() -> &'static str {
        POST_LIST_PREFIX
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<CacheKey> for String {
    fn from(value: CacheKey) -> Self {
        value.0
    }
}
