use crate::fixture::{parse_catalog, Catalog, CatalogError, CatalogFormat};

pub const DEMO_CATALOG_TOML: &str = include_str!("../fixtures/demo.toml");

/// Deterministic catalog for local runs and smoke checks.
pub fn demo_catalog() -> Result<Catalog, CatalogError> {
    parse_catalog(DEMO_CATALOG_TOML, CatalogFormat::Toml)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use adsel_core::selection::SelectionEngine;
    use adsel_core::targeting::{PredicateEvaluator, WorkerPool};
    use adsel_core::SelectionResult;

    use super::demo_catalog;

    fn engine() -> SelectionEngine {
        let catalog = demo_catalog().expect("demo catalog parses");
        SelectionEngine::new(
            catalog.content_lookup(),
            catalog.targeting_group_lookup(),
            PredicateEvaluator::new(WorkerPool::new(4), Duration::from_millis(250)),
        )
    }

    fn winner(result: &SelectionResult) -> (String, f64) {
        let advertisement = result.advertisement().expect("expected a selection");
        (advertisement.content.id.0.clone(), advertisement.click_through_rate)
    }

    #[test]
    fn demo_catalog_counts() {
        let catalog = demo_catalog().expect("demo catalog parses");

        assert_eq!(catalog.content_count, 4);
        assert_eq!(catalog.targeting_group_count, 5);
    }

    #[tokio::test]
    async fn prime_customers_get_the_highest_rate() {
        let result = engine().select_advertisement("cust-prime", "M1").await.expect("select");

        assert_eq!(winner(&result), ("C2".to_owned(), 0.95));
    }

    #[tokio::test]
    async fn readers_fall_back_to_their_best_eligible_group() {
        let result = engine().select_advertisement("cust-basic", "M1").await.expect("select");

        assert_eq!(winner(&result), ("C1".to_owned(), 0.8));
    }

    #[tokio::test]
    async fn strangers_only_match_unconditional_groups() {
        let result = engine().select_advertisement("cust-unknown", "M1").await.expect("select");

        assert_eq!(winner(&result), ("C2".to_owned(), 0.3));
    }

    #[tokio::test]
    async fn blocked_customers_and_unknown_marketplaces_get_nothing() {
        let engine = engine();

        let blocked = engine.select_advertisement("cust-blocked", "M2").await.expect("select");
        let elsewhere = engine.select_advertisement("cust-prime", "M9").await.expect("select");

        assert!(blocked.is_empty());
        assert!(elsewhere.is_empty());
    }
}
