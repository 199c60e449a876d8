use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::content::ContentId;
use crate::targeting::predicate::TargetingPredicate;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetingGroupId(pub String);

impl fmt::Display for TargetingGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bundle of predicates and the click-through rate earned when all of them
/// hold for a request.
#[derive(Clone, Debug)]
pub struct TargetingGroup {
    pub id: TargetingGroupId,
    pub content_id: ContentId,
    pub click_through_rate: f64,
    pub predicates: Vec<Arc<dyn TargetingPredicate>>,
}

impl TargetingGroup {
    pub fn new(
        id: impl Into<String>,
        content_id: ContentId,
        click_through_rate: f64,
        predicates: Vec<Arc<dyn TargetingPredicate>>,
    ) -> Self {
        Self { id: TargetingGroupId(id.into()), content_id, click_through_rate, predicates }
    }

    /// Negative and non-finite rates cannot take part in ranking.
    pub fn has_rankable_score(&self) -> bool {
        self.click_through_rate.is_finite() && self.click_through_rate >= 0.0
    }
}
