use adsel_catalog::{demo_catalog, Catalog};
use adsel_core::config::{AppConfig, LoadOptions};
use adsel_core::selection::SelectionEngine;
use anyhow::{bail, Context};
use serde::Serialize;

use crate::commands::{escape_json, select::open_catalog, CommandResult};

const SMOKE_CUSTOMER: &str = "cust-prime";
const SMOKE_MARKETPLACE: &str = "M1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(into_check("catalog_load", check_catalog(&config)));
            checks.push(into_check("engine_smoke", check_engine(&config)));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["catalog_load", "engine_smoke"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn into_check(name: &'static str, result: anyhow::Result<String>) -> DoctorCheck {
    match result {
        Ok(details) => DoctorCheck { name, status: CheckStatus::Pass, details },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: format!("{error:#}") },
    }
}

fn check_catalog(config: &AppConfig) -> anyhow::Result<String> {
    let catalog = open_catalog(config).context("failed to load catalog")?;
    let source = config
        .catalog
        .path
        .as_ref()
        .map(|path| format!("`{}`", path.display()))
        .unwrap_or_else(|| "built-in demo".to_string());

    Ok(format!(
        "{source} catalog holds {} content item(s) and {} targeting group(s)",
        catalog.content_count, catalog.targeting_group_count
    ))
}

/// Runs one selection against the demo catalog with the configured engine
/// settings, exercising the predicate worker pool end to end.
fn check_engine(config: &AppConfig) -> anyhow::Result<String> {
    let catalog: Catalog = demo_catalog().context("failed to build demo catalog")?;
    let engine = SelectionEngine::from_config(
        &config.engine,
        catalog.content_lookup(),
        catalog.targeting_group_lookup(),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    let result = runtime
        .block_on(engine.select_advertisement(SMOKE_CUSTOMER, SMOKE_MARKETPLACE))
        .context("demo selection failed")?;

    let Some(advertisement) = result.advertisement() else {
        bail!("demo selection returned no advertisement for `{SMOKE_CUSTOMER}`");
    };

    Ok(format!(
        "selected `{}` at {} using {} predicate worker(s)",
        advertisement.content.id,
        advertisement.click_through_rate,
        engine.evaluator().pool().size()
    ))
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
