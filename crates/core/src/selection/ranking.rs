use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::content::Content;
use crate::domain::targeting::TargetingGroupId;

/// Rule applied when several candidates share the highest effective score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest candidate in content lookup order.
    #[default]
    FirstFetched,
    /// Latest candidate in content lookup order.
    LastFetched,
    /// Lexicographically smallest content id, independent of lookup order.
    LowestContentId,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first_fetched" => Ok(Self::FirstFetched),
            "last_fetched" => Ok(Self::LastFetched),
            "lowest_content_id" => Ok(Self::LowestContentId),
            other => Err(format!(
                "unsupported tie break `{other}` (expected first_fetched|last_fetched|lowest_content_id)"
            )),
        }
    }
}

/// A candidate with a defined effective score.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    /// Index of the content in the lookup result.
    pub position: usize,
    pub content: Content,
    pub score: f64,
    pub targeting_group_id: TargetingGroupId,
}

/// Picks the candidate with the strictly highest score, resolving ties with
/// `tie_break`. Returns `None` for an empty slate.
pub fn pick_winner<I>(candidates: I, tie_break: TieBreak) -> Option<ScoredCandidate>
where
    I: IntoIterator<Item = ScoredCandidate>,
{
    candidates.into_iter().fold(None, |best, candidate| match best {
        None => Some(candidate),
        Some(current) => {
            if prefers(&candidate, &current, tie_break) {
                Some(candidate)
            } else {
                Some(current)
            }
        }
    })
}

fn prefers(challenger: &ScoredCandidate, incumbent: &ScoredCandidate, tie_break: TieBreak) -> bool {
    match challenger.score.total_cmp(&incumbent.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match tie_break {
            TieBreak::FirstFetched => challenger.position < incumbent.position,
            TieBreak::LastFetched => challenger.position > incumbent.position,
            TieBreak::LowestContentId => {
                (&challenger.content.id, challenger.position)
                    < (&incumbent.content.id, incumbent.position)
            }
        },
    }
}
