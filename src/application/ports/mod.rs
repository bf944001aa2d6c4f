pub mod cache;
pub mod change_feed;
pub mod identity;
pub mod repositories;
