use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketplaceId(pub String);

impl MarketplaceId {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MarketplaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One candidate creative that can be rendered on a marketplace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub marketplace_id: MarketplaceId,
    pub body: String,
}

impl Content {
    pub fn new(
        id: impl Into<String>,
        marketplace_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: ContentId(id.into()),
            marketplace_id: MarketplaceId(marketplace_id.into()),
            body: body.into(),
        }
    }
}
