use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::request::RequestContext;

/// Outcome of a single predicate evaluation.
///
/// `Error` is kept distinct from `False` so failures stay diagnosable; both make
/// the owning targeting group ineligible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum PredicateResult {
    True,
    False,
    Error(String),
}

impl PredicateResult {
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Flips `True` and `False`; errors stay errors.
    pub fn invert(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Error(reason) => Self::Error(reason),
        }
    }
}

impl From<bool> for PredicateResult {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

#[async_trait]
pub trait TargetingPredicate: fmt::Debug + Send + Sync {
    /// Short label used in logs and audit metadata.
    fn describe(&self) -> String;

    async fn evaluate(&self, context: &RequestContext) -> PredicateResult;
}

#[cfg(test)]
mod tests {
    use super::PredicateResult;

    #[test]
    fn invert_keeps_errors() {
        assert_eq!(PredicateResult::True.invert(), PredicateResult::False);
        assert_eq!(PredicateResult::False.invert(), PredicateResult::True);
        assert_eq!(
            PredicateResult::Error("segment service down".to_owned()).invert(),
            PredicateResult::Error("segment service down".to_owned())
        );
    }

    #[test]
    fn only_true_is_true() {
        assert!(PredicateResult::from(true).is_true());
        assert!(!PredicateResult::from(false).is_true());
        assert!(!PredicateResult::Error("boom".to_owned()).is_true());
        assert!(PredicateResult::Error("boom".to_owned()).is_error());
    }
}
