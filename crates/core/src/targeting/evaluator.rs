use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::domain::request::RequestContext;
use crate::domain::targeting::{TargetingGroup, TargetingGroupId};
use crate::targeting::pool::{JobFailure, WorkerPool};
use crate::targeting::predicate::PredicateResult;

pub const DEFAULT_PREDICATE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PredicateFailure {
    #[error("predicate reported an error: {0}")]
    Errored(String),
    #[error("predicate did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("predicate panicked: {0}")]
    Panicked(String),
    #[error("predicate evaluation was cancelled")]
    Cancelled,
}

impl From<JobFailure> for PredicateFailure {
    fn from(value: JobFailure) -> Self {
        match value {
            JobFailure::Panicked(message) => Self::Panicked(message),
            JobFailure::Cancelled | JobFailure::PoolClosed => Self::Cancelled,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredicateOutcome {
    pub predicate: String,
    pub result: PredicateResult,
}

/// Per-predicate results for one targeting group, in predicate order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupEvaluation {
    pub group_id: TargetingGroupId,
    pub outcomes: Vec<PredicateOutcome>,
}

impl GroupEvaluation {
    /// True iff every predicate held. A group without predicates is eligible.
    pub fn is_eligible(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_true())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PredicateOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_error())
    }
}

/// Decides targeting group eligibility by running the group's predicates
/// concurrently on a shared [`WorkerPool`].
///
/// Predicates that error, panic or exceed the timeout count as false for the
/// group and are reported to the audit sink; they never fail the caller.
#[derive(Clone)]
pub struct PredicateEvaluator {
    pool: WorkerPool,
    timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl PredicateEvaluator {
    pub fn new(pool: WorkerPool, timeout: Duration) -> Self {
        Self { pool, timeout, audit: Arc::new(TracingAuditSink) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn evaluate(&self, group: &TargetingGroup, context: &RequestContext) -> bool {
        self.evaluate_detailed(group, context).await.is_eligible()
    }

    pub async fn evaluate_detailed(
        &self,
        group: &TargetingGroup,
        context: &RequestContext,
    ) -> GroupEvaluation {
        if group.predicates.is_empty() {
            return GroupEvaluation { group_id: group.id.clone(), outcomes: Vec::new() };
        }

        let limit = self.timeout;
        let jobs = group
            .predicates
            .iter()
            .map(|predicate| {
                let predicate = Arc::clone(predicate);
                let context = context.clone();
                async move {
                    match tokio::time::timeout(limit, predicate.evaluate(&context)).await {
                        Ok(PredicateResult::Error(reason)) => {
                            Err(PredicateFailure::Errored(reason))
                        }
                        Ok(result) => Ok(result),
                        Err(_) => Err(PredicateFailure::TimedOut(limit)),
                    }
                }
            })
            .collect::<Vec<_>>();

        let joined = self.pool.run_all(jobs).await;

        let outcomes = group
            .predicates
            .iter()
            .zip(joined)
            .map(|(predicate, joined)| {
                let label = predicate.describe();
                let result = match joined.map_err(PredicateFailure::from).and_then(|inner| inner) {
                    Ok(result) => result,
                    Err(failure) => {
                        self.report_failure(group, context, &label, &failure);
                        PredicateResult::Error(failure.to_string())
                    }
                };
                PredicateOutcome { predicate: label, result }
            })
            .collect();

        GroupEvaluation { group_id: group.id.clone(), outcomes }
    }

    fn report_failure(
        &self,
        group: &TargetingGroup,
        context: &RequestContext,
        predicate: &str,
        failure: &PredicateFailure,
    ) {
        warn!(
            event_name = "targeting.predicate_failed",
            correlation_id = context.request_id(),
            content_id = %group.content_id,
            targeting_group_id = %group.id,
            predicate,
            error = %failure,
            "predicate evaluation failed; treating as false"
        );
        self.audit.emit(
            AuditEvent::new(
                context,
                "targeting.predicate_failed",
                AuditCategory::Targeting,
                AuditOutcome::Failed,
            )
            .with_metadata("content_id", group.content_id.0.clone())
            .with_metadata("targeting_group_id", group.id.0.clone())
            .with_metadata("predicate", predicate)
            .with_metadata("reason", failure.to_string()),
        );
    }
}
