pub mod cache;
pub mod database;
pub mod identity;
pub mod realtime;
