use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::config::EngineConfig;
use crate::domain::advertisement::{GeneratedAdvertisement, SelectionResult};
use crate::domain::content::{Content, MarketplaceId};
use crate::domain::request::{CustomerId, RequestContext};
use crate::domain::targeting::TargetingGroup;
use crate::errors::SelectionError;
use crate::lookup::{ContentLookup, TargetingGroupLookup};
use crate::selection::ranking::{pick_winner, ScoredCandidate, TieBreak};
use crate::targeting::evaluator::PredicateEvaluator;
use crate::targeting::pool::WorkerPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionSettings {
    pub tie_break: TieBreak,
    /// Candidates scored at the same time within one call.
    pub candidate_concurrency: usize,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self { tie_break: TieBreak::FirstFetched, candidate_concurrency: 8 }
    }
}

impl From<&EngineConfig> for SelectionSettings {
    fn from(config: &EngineConfig) -> Self {
        Self { tie_break: config.tie_break, candidate_concurrency: config.candidate_concurrency }
    }
}

/// Picks the eligible content with the highest click-through rate for a
/// customer on a marketplace.
///
/// The engine holds no per-request state; one instance can serve concurrent
/// callers, which then share the evaluator's worker pool.
pub struct SelectionEngine {
    contents: Arc<dyn ContentLookup>,
    targeting_groups: Arc<dyn TargetingGroupLookup>,
    evaluator: PredicateEvaluator,
    settings: SelectionSettings,
    audit: Arc<dyn AuditSink>,
}

impl SelectionEngine {
    pub fn new(
        contents: Arc<dyn ContentLookup>,
        targeting_groups: Arc<dyn TargetingGroupLookup>,
        evaluator: PredicateEvaluator,
    ) -> Self {
        Self {
            contents,
            targeting_groups,
            evaluator,
            settings: SelectionSettings::default(),
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn from_config(
        config: &EngineConfig,
        contents: Arc<dyn ContentLookup>,
        targeting_groups: Arc<dyn TargetingGroupLookup>,
    ) -> Self {
        let evaluator = PredicateEvaluator::new(
            WorkerPool::new(config.worker_pool_size),
            Duration::from_millis(config.predicate_timeout_ms),
        );
        Self::new(contents, targeting_groups, evaluator)
            .with_settings(SelectionSettings::from(config))
    }

    pub fn with_settings(mut self, settings: SelectionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Routes both selection and predicate failure events to `audit`.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.evaluator = self.evaluator.with_audit_sink(Arc::clone(&audit));
        self.audit = audit;
        self
    }

    pub fn settings(&self) -> SelectionSettings {
        self.settings
    }

    pub fn evaluator(&self) -> &PredicateEvaluator {
        &self.evaluator
    }

    pub async fn select_advertisement(
        &self,
        customer_id: &str,
        marketplace_id: &str,
    ) -> Result<SelectionResult, SelectionError> {
        let context = RequestContext::new(
            CustomerId(customer_id.to_owned()),
            MarketplaceId(marketplace_id.to_owned()),
        );
        self.select(&context).await
    }

    pub async fn select(
        &self,
        context: &RequestContext,
    ) -> Result<SelectionResult, SelectionError> {
        if context.marketplace_id().is_empty() {
            warn!(
                event_name = "selection.missing_marketplace",
                correlation_id = context.request_id(),
                customer_id = %context.customer_id(),
                "marketplace id cannot be empty; returning empty advertisement"
            );
            self.emit_empty(context, "missing_marketplace");
            return Ok(SelectionResult::Empty);
        }

        let contents = match self.contents.get(context.marketplace_id()).await {
            Ok(contents) => contents,
            Err(source) => {
                let error =
                    SelectionError::content_lookup(context.marketplace_id().0.clone(), source);
                self.emit_failure(context, &error);
                return Err(error);
            }
        };
        if contents.is_empty() {
            debug!(
                event_name = "selection.no_candidates",
                correlation_id = context.request_id(),
                marketplace_id = %context.marketplace_id(),
                "no content for marketplace"
            );
            self.emit_empty(context, "no_candidates");
            return Ok(SelectionResult::Empty);
        }
        let candidate_count = contents.len();

        let scored = futures::stream::iter(contents.into_iter().enumerate())
            .map(|(position, content)| self.score_candidate(position, content, context))
            .buffered(self.settings.candidate_concurrency.max(1))
            .try_collect::<Vec<_>>()
            .await;
        let scored = match scored {
            Ok(scored) => scored,
            Err(error) => {
                self.emit_failure(context, &error);
                return Err(error);
            }
        };

        let Some(winner) = pick_winner(scored.into_iter().flatten(), self.settings.tie_break)
        else {
            debug!(
                event_name = "selection.no_eligible_candidates",
                correlation_id = context.request_id(),
                marketplace_id = %context.marketplace_id(),
                candidate_count,
                "no candidate had an eligible targeting group"
            );
            self.emit_empty(context, "no_eligible_candidates");
            return Ok(SelectionResult::Empty);
        };

        info!(
            event_name = "selection.completed",
            correlation_id = context.request_id(),
            marketplace_id = %context.marketplace_id(),
            content_id = %winner.content.id,
            targeting_group_id = %winner.targeting_group_id,
            click_through_rate = winner.score,
            candidate_count,
            "advertisement selected"
        );
        self.audit.emit(
            AuditEvent::new(
                context,
                "selection.completed",
                AuditCategory::Selection,
                AuditOutcome::Success,
            )
            .with_metadata("content_id", winner.content.id.0.clone())
            .with_metadata("targeting_group_id", winner.targeting_group_id.0.clone())
            .with_metadata("click_through_rate", winner.score.to_string())
            .with_metadata("candidate_count", candidate_count.to_string()),
        );

        Ok(SelectionResult::Selected(GeneratedAdvertisement::new(
            winner.content,
            winner.score,
            winner.targeting_group_id,
        )))
    }

    /// Effective score of one candidate: the best rate among its eligible
    /// targeting groups, or `None` when no group is eligible.
    async fn score_candidate(
        &self,
        position: usize,
        content: Content,
        context: &RequestContext,
    ) -> Result<Option<ScoredCandidate>, SelectionError> {
        let groups = self.targeting_groups.get(&content.id).await.map_err(|source| {
            SelectionError::targeting_group_lookup(content.id.0.clone(), source)
        })?;

        let mut groups = groups
            .into_iter()
            .filter(|group| {
                let rankable = group.has_rankable_score();
                if !rankable {
                    warn!(
                        event_name = "selection.unrankable_group",
                        correlation_id = context.request_id(),
                        content_id = %content.id,
                        targeting_group_id = %group.id,
                        click_through_rate = group.click_through_rate,
                        "targeting group score is negative or not finite; skipping"
                    );
                }
                rankable
            })
            .collect::<Vec<TargetingGroup>>();
        // Highest rate first, so the first eligible group sets the effective score.
        groups.sort_by(|a, b| b.click_through_rate.total_cmp(&a.click_through_rate));

        for group in &groups {
            if self.evaluator.evaluate(group, context).await {
                debug!(
                    event_name = "selection.candidate_scored",
                    correlation_id = context.request_id(),
                    content_id = %content.id,
                    targeting_group_id = %group.id,
                    click_through_rate = group.click_through_rate,
                    "candidate eligible"
                );
                return Ok(Some(ScoredCandidate {
                    position,
                    score: group.click_through_rate,
                    targeting_group_id: group.id.clone(),
                    content,
                }));
            }
        }

        Ok(None)
    }

    fn emit_empty(&self, context: &RequestContext, reason: &str) {
        self.audit.emit(
            AuditEvent::new(
                context,
                "selection.empty",
                AuditCategory::Selection,
                AuditOutcome::Rejected,
            )
            .with_metadata("reason", reason),
        );
    }

    fn emit_failure(&self, context: &RequestContext, error: &SelectionError) {
        warn!(
            event_name = "selection.failed",
            correlation_id = context.request_id(),
            marketplace_id = %context.marketplace_id(),
            error = %error,
            "advertisement selection failed"
        );
        self.audit.emit(
            AuditEvent::new(
                context,
                "selection.failed",
                AuditCategory::Lookup,
                AuditOutcome::Failed,
            )
            .with_metadata("error", error.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::audit::InMemoryAuditSink;
    use crate::domain::advertisement::SelectionResult;
    use crate::domain::content::{Content, ContentId, MarketplaceId};
    use crate::domain::request::RequestContext;
    use crate::domain::targeting::TargetingGroup;
    use crate::errors::{Collaborator, SelectionError};
    use crate::lookup::{ContentLookup, LookupError, TargetingGroupLookup};
    use crate::selection::ranking::TieBreak;
    use crate::targeting::evaluator::PredicateEvaluator;
    use crate::targeting::pool::WorkerPool;
    use crate::targeting::predicate::{PredicateResult, TargetingPredicate};
    use crate::targeting::predicates::{Always, CustomerIn};

    use super::{SelectionEngine, SelectionSettings};

    #[derive(Default)]
    struct FakeContents {
        by_marketplace: HashMap<String, Vec<Content>>,
        failure: Option<LookupError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentLookup for FakeContents {
        async fn get(&self, marketplace_id: &MarketplaceId) -> Result<Vec<Content>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            Ok(self.by_marketplace.get(&marketplace_id.0).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct FakeGroups {
        by_content: HashMap<String, Vec<TargetingGroup>>,
        failing_content: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TargetingGroupLookup for FakeGroups {
        async fn get(&self, content_id: &ContentId) -> Result<Vec<TargetingGroup>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_content.as_deref() == Some(content_id.0.as_str()) {
                return Err(LookupError::Unavailable("targeting store offline".to_owned()));
            }
            Ok(self.by_content.get(&content_id.0).cloned().unwrap_or_default())
        }
    }

    #[derive(Debug)]
    struct AlwaysErrors;

    #[async_trait]
    impl TargetingPredicate for AlwaysErrors {
        fn describe(&self) -> String {
            "always_errors".to_owned()
        }

        async fn evaluate(&self, _context: &RequestContext) -> PredicateResult {
            PredicateResult::Error("rule engine fault".to_owned())
        }
    }

    fn content(id: &str) -> Content {
        Content::new(id, "M1", format!("<div>{id}</div>"))
    }

    fn group(id: &str, content_id: &str, rate: f64, eligible: bool) -> TargetingGroup {
        TargetingGroup::new(
            id,
            ContentId(content_id.to_owned()),
            rate,
            vec![Arc::new(Always(eligible)) as Arc<dyn TargetingPredicate>],
        )
    }

    fn group_with(
        id: &str,
        content_id: &str,
        rate: f64,
        predicates: Vec<Arc<dyn TargetingPredicate>>,
    ) -> TargetingGroup {
        TargetingGroup::new(id, ContentId(content_id.to_owned()), rate, predicates)
    }

    struct Fixture {
        contents: Arc<FakeContents>,
        groups: Arc<FakeGroups>,
        sink: InMemoryAuditSink,
        engine: SelectionEngine,
    }

    fn fixture(contents: FakeContents, groups: FakeGroups) -> Fixture {
        fixture_with(contents, groups, SelectionSettings::default())
    }

    fn fixture_with(
        contents: FakeContents,
        groups: FakeGroups,
        settings: SelectionSettings,
    ) -> Fixture {
        let contents = Arc::new(contents);
        let groups = Arc::new(groups);
        let sink = InMemoryAuditSink::default();
        let evaluator = PredicateEvaluator::new(WorkerPool::new(4), Duration::from_millis(100));
        let engine = SelectionEngine::new(
            Arc::clone(&contents) as Arc<dyn ContentLookup>,
            Arc::clone(&groups) as Arc<dyn TargetingGroupLookup>,
            evaluator,
        )
        .with_settings(settings)
        .with_audit_sink(Arc::new(sink.clone()));
        Fixture { contents, groups, sink, engine }
    }

    fn marketplace(contents: Vec<Content>) -> FakeContents {
        FakeContents {
            by_marketplace: HashMap::from([("M1".to_owned(), contents)]),
            ..FakeContents::default()
        }
    }

    fn groups(entries: Vec<TargetingGroup>) -> FakeGroups {
        let mut by_content: HashMap<String, Vec<TargetingGroup>> = HashMap::new();
        for entry in entries {
            by_content.entry(entry.content_id.0.clone()).or_default().push(entry);
        }
        FakeGroups { by_content, ..FakeGroups::default() }
    }

    fn winner_id(result: &SelectionResult) -> Option<&str> {
        result.advertisement().map(|advertisement| advertisement.content.id.0.as_str())
    }

    #[tokio::test]
    async fn empty_marketplace_returns_empty_without_lookups() {
        let fx = fixture(
            marketplace(vec![content("C1")]),
            groups(vec![group("TG-1", "C1", 0.5, true)]),
        );

        let result = fx.engine.select_advertisement("cust-1", "").await.expect("select");

        assert_eq!(result, SelectionResult::Empty);
        assert_eq!(fx.contents.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.groups.calls.load(Ordering::SeqCst), 0);
        let empty = fx.sink.events_of_type("selection.empty");
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].metadata["reason"], "missing_marketplace");
    }

    #[tokio::test]
    async fn highest_eligible_rate_wins() {
        let fx = fixture(
            marketplace(vec![content("C1"), content("C2"), content("C3")]),
            groups(vec![
                group("TG-1", "C1", 0.8, true),
                group("TG-2", "C2", 0.95, true),
                group("TG-3", "C3", 0.99, false),
            ]),
        );

        let result = fx.engine.select_advertisement("cust-1", "M1").await.expect("select");

        let advertisement = result.advertisement().expect("selected");
        assert_eq!(advertisement.content.id.0, "C2");
        assert_eq!(advertisement.click_through_rate, 0.95);
        assert_eq!(advertisement.targeting_group_id.0, "TG-2");
        assert_eq!(fx.sink.events_of_type("selection.completed").len(), 1);
    }

    #[tokio::test]
    async fn marketplace_without_content_is_empty() {
        let fx = fixture(FakeContents::default(), FakeGroups::default());

        let result = fx.engine.select_advertisement("cust-1", "M1").await.expect("select");

        assert!(result.is_empty());
        assert_eq!(fx.contents.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.groups.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn customer_failing_every_predicate_gets_empty() {
        let only_vip =
            || vec![Arc::new(CustomerIn::new(["vip-1"])) as Arc<dyn TargetingPredicate>];
        let fx = fixture(
            marketplace(vec![content("C1"), content("C2")]),
            groups(vec![
                group_with("TG-1", "C1", 0.7, only_vip()),
                group_with("TG-2", "C1", 0.2, only_vip()),
                group_with("TG-3", "C2", 0.9, only_vip()),
            ]),
        );

        let result = fx.engine.select_advertisement("X", "M1").await.expect("select");

        assert!(result.is_empty());
        let empty = fx.sink.events_of_type("selection.empty");
        assert_eq!(empty[0].metadata["reason"], "no_eligible_candidates");
    }

    #[tokio::test]
    async fn equal_scores_pick_first_fetched_on_every_run() {
        let fx = fixture(
            marketplace(vec![content("C1"), content("C2")]),
            groups(vec![group("TG-1", "C1", 0.9, true), group("TG-2", "C2", 0.9, true)]),
        );

        for _ in 0..20 {
            let result = fx.engine.select_advertisement("cust-1", "M1").await.expect("select");
            assert_eq!(winner_id(&result), Some("C1"));
        }
    }

    #[tokio::test]
    async fn tie_break_is_configurable() {
        let fx = fixture_with(
            marketplace(vec![content("C2"), content("C1")]),
            groups(vec![group("TG-1", "C1", 0.9, true), group("TG-2", "C2", 0.9, true)]),
            SelectionSettings { tie_break: TieBreak::LowestContentId, candidate_concurrency: 2 },
        );

        let result = fx.engine.select_advertisement("cust-1", "M1").await.expect("select");

        assert_eq!(winner_id(&result), Some("C1"));
    }

    #[tokio::test]
    async fn effective_score_is_best_eligible_group() {
        let fx = fixture(
            marketplace(vec![content("C1"), content("C2")]),
            groups(vec![
                group("TG-1", "C1", 0.99, false),
                group("TG-2", "C1", 0.3, true),
                group("TG-3", "C1", 0.6, true),
                group("TG-4", "C2", 0.5, true),
            ]),
        );

        let result = fx.engine.select_advertisement("cust-1", "M1").await.expect("select");

        let advertisement = result.advertisement().expect("selected");
        assert_eq!(advertisement.content.id.0, "C1");
        assert_eq!(advertisement.click_through_rate, 0.6);
        assert_eq!(advertisement.targeting_group_id.0, "TG-3");
    }

    #[tokio::test]
    async fn group_without_predicates_is_eligible() {
        let fx = fixture(
            marketplace(vec![content("C1")]),
            groups(vec![group_with("TG-1", "C1", 0.4, Vec::new())]),
        );

        let result = fx.engine.select_advertisement("anyone", "M1").await.expect("select");

        assert_eq!(winner_id(&result), Some("C1"));
    }

    #[tokio::test]
    async fn content_without_groups_is_not_a_candidate() {
        let fx = fixture(
            marketplace(vec![content("C1"), content("C2")]),
            groups(vec![group("TG-2", "C2", 0.1, true)]),
        );

        let result = fx.engine.select_advertisement("cust-1", "M1").await.expect("select");

        assert_eq!(winner_id(&result), Some("C2"));
    }

    #[tokio::test]
    async fn erroring_predicate_ranks_like_false_predicate() {
        let erroring = fixture(
            marketplace(vec![content("C1"), content("C2")]),
            groups(vec![
                group_with("TG-1", "C1", 0.9, vec![Arc::new(AlwaysErrors)]),
                group("TG-2", "C2", 0.5, true),
            ]),
        );
        let falsy = fixture(
            marketplace(vec![content("C1"), content("C2")]),
            groups(vec![group("TG-1", "C1", 0.9, false), group("TG-2", "C2", 0.5, true)]),
        );

        let with_error =
            erroring.engine.select_advertisement("cust-1", "M1").await.expect("select");
        let with_false = falsy.engine.select_advertisement("cust-1", "M1").await.expect("select");

        assert_eq!(winner_id(&with_error), Some("C2"));
        assert_eq!(winner_id(&with_error), winner_id(&with_false));
        assert_eq!(erroring.sink.events_of_type("targeting.predicate_failed").len(), 1);
        assert!(falsy.sink.events_of_type("targeting.predicate_failed").is_empty());
    }

    #[tokio::test]
    async fn unrankable_scores_are_skipped() {
        let fx = fixture(
            marketplace(vec![content("C1"), content("C2")]),
            groups(vec![
                group("TG-1", "C1", f64::NAN, true),
                group("TG-2", "C1", -1.0, true),
                group("TG-3", "C2", 0.01, true),
            ]),
        );

        let result = fx.engine.select_advertisement("cust-1", "M1").await.expect("select");

        assert_eq!(winner_id(&result), Some("C2"));
    }

    #[tokio::test]
    async fn content_lookup_failure_propagates() {
        let fx = fixture(
            FakeContents {
                failure: Some(LookupError::Unavailable("content store offline".to_owned())),
                ..FakeContents::default()
            },
            FakeGroups::default(),
        );

        let error = fx.engine.select_advertisement("cust-1", "M1").await.expect_err("must fail");

        assert!(matches!(
            error,
            SelectionError::Lookup { collaborator: Collaborator::ContentLookup, ref key, .. }
                if key == "M1"
        ));
        assert_eq!(fx.sink.events_of_type("selection.failed").len(), 1);
    }

    #[tokio::test]
    async fn targeting_group_lookup_failure_fails_the_whole_call() {
        let mut failing = groups(vec![group("TG-1", "C1", 0.9, true)]);
        failing.failing_content = Some("C2".to_owned());
        let fx = fixture(marketplace(vec![content("C1"), content("C2")]), failing);

        let error = fx.engine.select_advertisement("cust-1", "M1").await.expect_err("must fail");

        assert!(matches!(
            error,
            SelectionError::Lookup {
                collaborator: Collaborator::TargetingGroupLookup,
                ref key,
                ..
            } if key == "C2"
        ));
    }

    #[tokio::test]
    async fn concurrent_callers_share_the_engine() {
        let fx = fixture(
            marketplace(vec![content("C1"), content("C2"), content("C3")]),
            groups(vec![
                group_with("TG-1", "C1", 0.9, vec![Arc::new(CustomerIn::new(["alice"]))]),
                group_with("TG-2", "C2", 0.8, vec![Arc::new(CustomerIn::new(["bob"]))]),
                group("TG-3", "C3", 0.1, true),
            ]),
        );

        let (alice, bob, carol) = tokio::join!(
            fx.engine.select_advertisement("alice", "M1"),
            fx.engine.select_advertisement("bob", "M1"),
            fx.engine.select_advertisement("carol", "M1"),
        );

        assert_eq!(winner_id(&alice.expect("alice")), Some("C1"));
        assert_eq!(winner_id(&bob.expect("bob")), Some("C2"));
        assert_eq!(winner_id(&carol.expect("carol")), Some("C3"));
        assert_eq!(fx.engine.evaluator().pool().available_slots(), 4);
    }
}
