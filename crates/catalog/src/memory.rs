use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use adsel_core::domain::content::{Content, ContentId, MarketplaceId};
use adsel_core::domain::request::CustomerId;
use adsel_core::domain::targeting::TargetingGroup;
use adsel_core::lookup::{
    ContentLookup, CustomerSegmentSource, LookupError, TargetingGroupLookup,
};

/// Content keyed by marketplace. Candidates come back in insertion order.
#[derive(Default)]
pub struct InMemoryContentLookup {
    contents: RwLock<HashMap<String, Vec<Content>>>,
}

impl InMemoryContentLookup {
    pub fn from_contents(contents: impl IntoIterator<Item = Content>) -> Self {
        let mut by_marketplace: HashMap<String, Vec<Content>> = HashMap::new();
        for content in contents {
            by_marketplace.entry(content.marketplace_id.0.clone()).or_default().push(content);
        }
        Self { contents: RwLock::new(by_marketplace) }
    }

    pub async fn insert(&self, content: Content) {
        let mut contents = self.contents.write().await;
        contents.entry(content.marketplace_id.0.clone()).or_default().push(content);
    }

    pub async fn content_count(&self) -> usize {
        self.contents.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ContentLookup for InMemoryContentLookup {
    async fn get(&self, marketplace_id: &MarketplaceId) -> Result<Vec<Content>, LookupError> {
        let contents = self.contents.read().await;
        Ok(contents.get(&marketplace_id.0).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryTargetingGroupLookup {
    groups: RwLock<HashMap<String, Vec<TargetingGroup>>>,
}

impl InMemoryTargetingGroupLookup {
    pub fn from_groups(groups: impl IntoIterator<Item = TargetingGroup>) -> Self {
        let mut by_content: HashMap<String, Vec<TargetingGroup>> = HashMap::new();
        for group in groups {
            by_content.entry(group.content_id.0.clone()).or_default().push(group);
        }
        Self { groups: RwLock::new(by_content) }
    }

    pub async fn insert(&self, group: TargetingGroup) {
        let mut groups = self.groups.write().await;
        groups.entry(group.content_id.0.clone()).or_default().push(group);
    }

    pub async fn group_count(&self) -> usize {
        self.groups.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl TargetingGroupLookup for InMemoryTargetingGroupLookup {
    async fn get(&self, content_id: &ContentId) -> Result<Vec<TargetingGroup>, LookupError> {
        let groups = self.groups.read().await;
        Ok(groups.get(&content_id.0).cloned().unwrap_or_default())
    }
}

/// Segment memberships per customer. Unknown customers belong to no segment.
#[derive(Default)]
pub struct InMemorySegmentSource {
    segments: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemorySegmentSource {
    pub fn from_memberships(memberships: HashMap<String, Vec<String>>) -> Self {
        Self { segments: RwLock::new(memberships) }
    }

    pub async fn assign(&self, customer_id: impl Into<String>, segment: impl Into<String>) {
        let mut segments = self.segments.write().await;
        segments.entry(customer_id.into()).or_default().push(segment.into());
    }
}

#[async_trait]
impl CustomerSegmentSource for InMemorySegmentSource {
    async fn segments_for(&self, customer_id: &CustomerId) -> Result<Vec<String>, LookupError> {
        let segments = self.segments.read().await;
        Ok(segments.get(&customer_id.0).cloned().unwrap_or_default())
    }
}
