use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selection::ranking::TieBreak;
use crate::targeting::evaluator::DEFAULT_PREDICATE_TIMEOUT;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub worker_pool_size: usize,
    pub predicate_timeout_ms: u64,
    pub candidate_concurrency: usize,
    pub tie_break: TieBreak,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub worker_pool_size: Option<usize>,
    pub predicate_timeout_ms: Option<u64>,
    pub candidate_concurrency: Option<usize>,
    pub tie_break: Option<TieBreak>,
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 10,
            predicate_timeout_ms: DEFAULT_PREDICATE_TIMEOUT.as_millis() as u64,
            candidate_concurrency: 8,
            tie_break: TieBreak::FirstFetched,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            catalog: CatalogConfig { path: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("adsel.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(worker_pool_size) = engine.worker_pool_size {
                self.engine.worker_pool_size = worker_pool_size;
            }
            if let Some(predicate_timeout_ms) = engine.predicate_timeout_ms {
                self.engine.predicate_timeout_ms = predicate_timeout_ms;
            }
            if let Some(candidate_concurrency) = engine.candidate_concurrency {
                self.engine.candidate_concurrency = candidate_concurrency;
            }
            if let Some(tie_break) = engine.tie_break {
                self.engine.tie_break = tie_break;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ADSEL_ENGINE_WORKER_POOL_SIZE") {
            self.engine.worker_pool_size = parse_usize("ADSEL_ENGINE_WORKER_POOL_SIZE", &value)?;
        }
        if let Some(value) = read_env("ADSEL_ENGINE_PREDICATE_TIMEOUT_MS") {
            self.engine.predicate_timeout_ms =
                parse_u64("ADSEL_ENGINE_PREDICATE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("ADSEL_ENGINE_CANDIDATE_CONCURRENCY") {
            self.engine.candidate_concurrency =
                parse_usize("ADSEL_ENGINE_CANDIDATE_CONCURRENCY", &value)?;
        }
        if let Some(value) = read_env("ADSEL_ENGINE_TIE_BREAK") {
            self.engine.tie_break = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "ADSEL_ENGINE_TIE_BREAK".to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(value) = read_env("ADSEL_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        let log_level = read_env("ADSEL_LOGGING_LEVEL").or_else(|| read_env("ADSEL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("ADSEL_LOGGING_FORMAT").or_else(|| read_env("ADSEL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(worker_pool_size) = overrides.worker_pool_size {
            self.engine.worker_pool_size = worker_pool_size;
        }
        if let Some(predicate_timeout_ms) = overrides.predicate_timeout_ms {
            self.engine.predicate_timeout_ms = predicate_timeout_ms;
        }
        if let Some(candidate_concurrency) = overrides.candidate_concurrency {
            self.engine.candidate_concurrency = candidate_concurrency;
        }
        if let Some(tie_break) = overrides.tie_break {
            self.engine.tie_break = tie_break;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine(&self.engine)?;
        validate_catalog(&self.catalog)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("adsel.toml"), PathBuf::from("config/adsel.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.worker_pool_size == 0 || engine.worker_pool_size > 1024 {
        return Err(ConfigError::Validation(
            "engine.worker_pool_size must be in range 1..=1024".to_string(),
        ));
    }

    if engine.predicate_timeout_ms == 0 || engine.predicate_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "engine.predicate_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    if engine.candidate_concurrency == 0 || engine.candidate_concurrency > 256 {
        return Err(ConfigError::Validation(
            "engine.candidate_concurrency must be in range 1..=256".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if let Some(path) = &catalog.path {
        let supported = matches!(
            path.extension().and_then(|extension| extension.to_str()),
            Some("toml") | Some("json")
        );
        if !supported {
            return Err(ConfigError::Validation(
                "catalog.path must point to a `.toml` or `.json` file".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    catalog: Option<CatalogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    worker_pool_size: Option<usize>,
    predicate_timeout_ms: Option<u64>,
    candidate_concurrency: Option<usize>,
    tie_break: Option<TieBreak>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
