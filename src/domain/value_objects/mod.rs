pub mod cache_key;
pub mod counter_field;
pub mod engagement_kind;
pub mod target_type;

pub use cache_key::CacheKey;
pub use counter_field::CounterField;
pub use engagement_kind::EngagementKind;
pub use target_type::TargetType;
