use adsel_catalog::{demo_catalog, load_catalog, Catalog, CatalogError};
use adsel_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use adsel_core::domain::content::MarketplaceId;
use adsel_core::domain::request::{CustomerId, RequestContext};
use adsel_core::selection::{SelectionEngine, TieBreak};
use adsel_core::SelectionResult;
use serde_json::json;

use crate::commands::CommandResult;
use crate::SelectArgs;

const COMMAND: &str = "select";

pub fn run(args: &SelectArgs) -> CommandResult {
    let tie_break = match args.tie_break.as_deref().map(str::parse::<TieBreak>).transpose() {
        Ok(tie_break) => tie_break,
        Err(error) => return CommandResult::failure(COMMAND, "config_validation", error, 2),
    };

    let overrides = ConfigOverrides {
        worker_pool_size: args.workers,
        tie_break,
        catalog_path: args.catalog.clone(),
        ..ConfigOverrides::default()
    };
    let options = LoadOptions { config_path: args.config.clone(), require_file: false, overrides };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let catalog = match open_catalog(&config) {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure(COMMAND, "catalog_load", error.to_string(), 4);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let engine = SelectionEngine::from_config(
        &config.engine,
        catalog.content_lookup(),
        catalog.targeting_group_lookup(),
    );
    let context = RequestContext::new(
        CustomerId(args.customer.clone()),
        MarketplaceId(args.marketplace.clone()),
    );

    match runtime.block_on(engine.select(&context)) {
        Ok(result) => {
            let message = match &result {
                SelectionResult::Selected(advertisement) => format!(
                    "selected content `{}` at click-through rate {}",
                    advertisement.content.id, advertisement.click_through_rate
                ),
                SelectionResult::Empty => "no advertisement selected".to_string(),
            };
            let data = serde_json::to_value(&result)
                .ok()
                .map(|result| json!({ "request_id": context.request_id(), "result": result }));
            CommandResult::success_with_data(COMMAND, message, data)
        }
        Err(error) => {
            let interface = error.into_interface(context.request_id());
            CommandResult::failure(
                COMMAND,
                interface.error_class(),
                format!(
                    "{} ({interface}) [correlation_id={}]",
                    interface.user_message(),
                    context.request_id()
                ),
                5,
            )
        }
    }
}

pub(crate) fn open_catalog(config: &AppConfig) -> Result<Catalog, CatalogError> {
    match config.catalog.path.as_deref() {
        Some(path) => load_catalog(path),
        None => demo_catalog(),
    }
}
