pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lookup;
pub mod selection;
pub mod targeting;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::advertisement::{GeneratedAdvertisement, SelectionResult};
pub use domain::content::{Content, ContentId, MarketplaceId};
pub use domain::request::{CustomerId, RequestContext};
pub use domain::targeting::{TargetingGroup, TargetingGroupId};
pub use errors::{Collaborator, InterfaceError, SelectionError};
pub use lookup::{ContentLookup, CustomerSegmentSource, LookupError, TargetingGroupLookup};
pub use selection::{SelectionEngine, SelectionSettings, TieBreak};
pub use targeting::{
    PredicateEvaluator, PredicateResult, TargetingPredicate, WorkerPool,
};
