use crate::application::ports::change_feed::SubscriptionId;
use crate::shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    #[error("Subscriber channel closed: {0}")]
    ChannelClosed(SubscriptionId),
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::SubscriptionNotFound(_) => AppError::NotFound(err.to_string()),
            FeedError::ChannelClosed(_) => AppError::Internal(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
