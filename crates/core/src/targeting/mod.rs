pub mod evaluator;
pub mod pool;
pub mod predicate;
pub mod predicates;

pub use evaluator::{GroupEvaluation, PredicateEvaluator, PredicateFailure, PredicateOutcome};
pub use pool::{JobFailure, WorkerPool};
pub use predicate::{PredicateResult, TargetingPredicate};
pub use predicates::{Always, CustomerIn, CustomerInSegment, MarketplaceIs, Not};
