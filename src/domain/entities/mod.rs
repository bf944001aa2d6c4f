pub mod engagement;
pub mod post;
pub mod reply;

pub use engagement::{CounterChange, EngagementTarget, EngagementToggle, ToggleOutcome};
pub use post::{NewPost, Post, PostCounters};
pub use reply::Reply;
