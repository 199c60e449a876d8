use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content::{Content, ContentId, MarketplaceId};
use crate::domain::request::CustomerId;
use crate::domain::targeting::TargetingGroup;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),
    #[error("lookup backend failure: {0}")]
    Backend(String),
}

/// Source of candidate content for a marketplace.
///
/// Implementations return candidates in a stable order for the duration of one
/// call; the order decides ties between equally scored candidates.
#[async_trait]
pub trait ContentLookup: Send + Sync {
    async fn get(&self, marketplace_id: &MarketplaceId) -> Result<Vec<Content>, LookupError>;
}

/// Source of targeting groups for one content item. Content without groups
/// yields an empty list, not an error.
#[async_trait]
pub trait TargetingGroupLookup: Send + Sync {
    async fn get(&self, content_id: &ContentId) -> Result<Vec<TargetingGroup>, LookupError>;
}

#[async_trait]
pub trait CustomerSegmentSource: Send + Sync {
    async fn segments_for(&self, customer_id: &CustomerId) -> Result<Vec<String>, LookupError>;
}
