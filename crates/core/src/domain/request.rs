use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::content::MarketplaceId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RequestContextInner {
    request_id: String,
    customer_id: CustomerId,
    marketplace_id: MarketplaceId,
}

/// Read-only view of the request shared by every predicate evaluation.
///
/// Clones share the same allocation, so handing a copy to each spawned
/// evaluation task does not copy the identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    inner: Arc<RequestContextInner>,
}

impl RequestContext {
    pub fn new(customer_id: CustomerId, marketplace_id: MarketplaceId) -> Self {
        Self::with_request_id(Uuid::new_v4().to_string(), customer_id, marketplace_id)
    }

    pub fn with_request_id(
        request_id: impl Into<String>,
        customer_id: CustomerId,
        marketplace_id: MarketplaceId,
    ) -> Self {
        Self {
            inner: Arc::new(RequestContextInner {
                request_id: request_id.into(),
                customer_id,
                marketplace_id,
            }),
        }
    }

    /// Correlation id attached to logs and audit events for this request.
    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.inner.customer_id
    }

    pub fn marketplace_id(&self) -> &MarketplaceId {
        &self.inner.marketplace_id
    }
}
