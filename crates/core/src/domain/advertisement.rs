use serde::Serialize;
use uuid::Uuid;

use crate::domain::content::Content;
use crate::domain::targeting::TargetingGroupId;

/// The content chosen for a request together with the score that won it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneratedAdvertisement {
    pub id: Uuid,
    pub content: Content,
    pub click_through_rate: f64,
    pub targeting_group_id: TargetingGroupId,
}

impl GeneratedAdvertisement {
    pub fn new(
        content: Content,
        click_through_rate: f64,
        targeting_group_id: TargetingGroupId,
    ) -> Self {
        Self { id: Uuid::new_v4(), content, click_through_rate, targeting_group_id }
    }
}

/// Outcome of one selection call. `Empty` means no advertisement could be
/// selected; callers match on it instead of checking for a missing value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectionResult {
    Selected(GeneratedAdvertisement),
    Empty,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn advertisement(&self) -> Option<&GeneratedAdvertisement> {
        match self {
            Self::Selected(advertisement) => Some(advertisement),
            Self::Empty => None,
        }
    }
}
