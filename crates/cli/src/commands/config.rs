use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use adsel_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in demo>".to_string());

    let fields: [(&str, String, &[&str]); 7] = [
        (
            "engine.worker_pool_size",
            config.engine.worker_pool_size.to_string(),
            &["ADSEL_ENGINE_WORKER_POOL_SIZE"],
        ),
        (
            "engine.predicate_timeout_ms",
            config.engine.predicate_timeout_ms.to_string(),
            &["ADSEL_ENGINE_PREDICATE_TIMEOUT_MS"],
        ),
        (
            "engine.candidate_concurrency",
            config.engine.candidate_concurrency.to_string(),
            &["ADSEL_ENGINE_CANDIDATE_CONCURRENCY"],
        ),
        (
            "engine.tie_break",
            format!("{:?}", config.engine.tie_break),
            &["ADSEL_ENGINE_TIE_BREAK"],
        ),
        ("catalog.path", catalog_path, &["ADSEL_CATALOG_PATH"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["ADSEL_LOGGING_LEVEL", "ADSEL_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["ADSEL_LOGGING_FORMAT", "ADSEL_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in fields {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("adsel.toml"), PathBuf::from("config/adsel.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
