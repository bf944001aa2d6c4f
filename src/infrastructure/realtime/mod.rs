pub mod error;
pub mod in_memory_feed;

pub use error::FeedError;
pub use in_memory_feed::InMemoryChangeFeed;
