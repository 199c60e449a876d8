use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::content::MarketplaceId;
use crate::domain::request::{CustomerId, RequestContext};
use crate::lookup::CustomerSegmentSource;
use crate::targeting::predicate::{PredicateResult, TargetingPredicate};

#[derive(Clone, Debug)]
pub struct MarketplaceIs {
    pub marketplace_id: MarketplaceId,
}

impl MarketplaceIs {
    pub fn new(marketplace_id: impl Into<String>) -> Self {
        Self { marketplace_id: MarketplaceId(marketplace_id.into()) }
    }
}

#[async_trait]
impl TargetingPredicate for MarketplaceIs {
    fn describe(&self) -> String {
        format!("marketplace_is({})", self.marketplace_id)
    }

    async fn evaluate(&self, context: &RequestContext) -> PredicateResult {
        (context.marketplace_id() == &self.marketplace_id).into()
    }
}

#[derive(Clone, Debug)]
pub struct CustomerIn {
    pub customers: BTreeSet<String>,
}

impl CustomerIn {
    pub fn new<I, S>(customers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { customers: customers.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl TargetingPredicate for CustomerIn {
    fn describe(&self) -> String {
        format!("customer_in({} ids)", self.customers.len())
    }

    async fn evaluate(&self, context: &RequestContext) -> PredicateResult {
        self.customers.contains(&context.customer_id().0).into()
    }
}

/// Holds when the customer belongs to `segment` according to a remote source.
/// A failing source yields `PredicateResult::Error`.
pub struct CustomerInSegment {
    pub segment: String,
    source: Arc<dyn CustomerSegmentSource>,
}

impl CustomerInSegment {
    pub fn new(segment: impl Into<String>, source: Arc<dyn CustomerSegmentSource>) -> Self {
        Self { segment: segment.into(), source }
    }

    async fn lookup(&self, customer_id: &CustomerId) -> PredicateResult {
        match self.source.segments_for(customer_id).await {
            Ok(segments) => segments.iter().any(|segment| segment == &self.segment).into(),
            Err(error) => PredicateResult::Error(error.to_string()),
        }
    }
}

impl fmt::Debug for CustomerInSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomerInSegment").field("segment", &self.segment).finish_non_exhaustive()
    }
}

#[async_trait]
impl TargetingPredicate for CustomerInSegment {
    fn describe(&self) -> String {
        format!("customer_in_segment({})", self.segment)
    }

    async fn evaluate(&self, context: &RequestContext) -> PredicateResult {
        self.lookup(context.customer_id()).await
    }
}

/// Inverse of another predicate.
#[derive(Clone, Debug)]
pub struct Not {
    pub inner: Arc<dyn TargetingPredicate>,
}

impl Not {
    pub fn new(inner: Arc<dyn TargetingPredicate>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TargetingPredicate for Not {
    fn describe(&self) -> String {
        format!("not({})", self.inner.describe())
    }

    async fn evaluate(&self, context: &RequestContext) -> PredicateResult {
        self.inner.evaluate(context).await.invert()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Always(pub bool);

#[async_trait]
impl TargetingPredicate for Always {
    fn describe(&self) -> String {
        format!("always({})", self.0)
    }

    async fn evaluate(&self, _context: &RequestContext) -> PredicateResult {
        self.0.into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::domain::content::MarketplaceId;
    use crate::domain::request::{CustomerId, RequestContext};
    use crate::lookup::{CustomerSegmentSource, LookupError};
    use crate::targeting::predicate::{PredicateResult, TargetingPredicate};

    use super::{Always, CustomerIn, CustomerInSegment, MarketplaceIs, Not};

    struct FixedSegments(Result<Vec<String>, LookupError>);

    #[async_trait]
    impl CustomerSegmentSource for FixedSegments {
        async fn segments_for(
            &self,
            _customer_id: &CustomerId,
        ) -> Result<Vec<String>, LookupError> {
            self.0.clone()
        }
    }

    fn context(customer: &str, marketplace: &str) -> RequestContext {
        RequestContext::new(
            CustomerId(customer.to_owned()),
            MarketplaceId(marketplace.to_owned()),
        )
    }

    #[tokio::test]
    async fn marketplace_and_customer_predicates_match_context() {
        let ctx = context("cust-1", "M1");

        assert_eq!(MarketplaceIs::new("M1").evaluate(&ctx).await, PredicateResult::True);
        assert_eq!(MarketplaceIs::new("M2").evaluate(&ctx).await, PredicateResult::False);
        assert_eq!(
            CustomerIn::new(["cust-1", "cust-9"]).evaluate(&ctx).await,
            PredicateResult::True
        );
        assert_eq!(CustomerIn::new(["cust-9"]).evaluate(&ctx).await, PredicateResult::False);
    }

    #[tokio::test]
    async fn segment_predicate_reports_source_failure_as_error() {
        let ctx = context("cust-1", "M1");
        let member = CustomerInSegment::new(
            "prime",
            Arc::new(FixedSegments(Ok(vec!["prime".to_owned(), "student".to_owned()]))),
        );
        let outsider =
            CustomerInSegment::new("prime", Arc::new(FixedSegments(Ok(vec!["student".to_owned()]))));
        let broken = CustomerInSegment::new(
            "prime",
            Arc::new(FixedSegments(Err(LookupError::Unavailable("segments".to_owned())))),
        );

        assert_eq!(member.evaluate(&ctx).await, PredicateResult::True);
        assert_eq!(outsider.evaluate(&ctx).await, PredicateResult::False);
        assert!(broken.evaluate(&ctx).await.is_error());
        assert!(format!("{broken:?}").contains("prime"));
    }

    #[tokio::test]
    async fn not_inverts_inner_result() {
        let ctx = context("cust-1", "M1");
        let not_m1 = Not::new(Arc::new(MarketplaceIs::new("M1")));

        assert_eq!(not_m1.evaluate(&ctx).await, PredicateResult::False);
        assert_eq!(not_m1.describe(), "not(marketplace_is(M1))");
        assert_eq!(Not::new(Arc::new(Always(false))).evaluate(&ctx).await, PredicateResult::True);
    }
}
