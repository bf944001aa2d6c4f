use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/forum.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            cache: CacheConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300, // 5 minutes
            capacity: 512,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        // 既定値
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FORUM_DATABASE_URL") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.database.url = v.to_string();
            }
        }
        if let Some(value) = env_parse::<u32>("FORUM_DB_MAX_CONNECTIONS") {
            cfg.database.max_connections = value.max(1);
        }

        // キャッシュ設定
        if let Some(value) = env_parse::<u64>("FORUM_CACHE_TTL_SECS") {
            cfg.cache.ttl_secs = value;
        }
        if let Some(value) = env_parse::<usize>("FORUM_CACHE_CAPACITY") {
            cfg.cache.capacity = value.max(1);
        }

        if let Some(value) = env_parse::<usize>("FORUM_REALTIME_CHANNEL_CAPACITY") {
            cfg.realtime.channel_capacity = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.cache.ttl_secs == 0 {
            return Err("Cache ttl_secs must be greater than 0".to_string());
        }
        if self.cache.capacity == 0 {
            return Err("Cache capacity must be greater than 0".to_string());
        }
        if self.realtime.channel_capacity == 0 {
            return Err("Realtime channel_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}
