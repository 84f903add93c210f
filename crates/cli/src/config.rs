//! Runtime configuration for `taxwise`.
//!
//! Settings come from an optional TOML file and from the environment; an
//! environment variable always wins over the file.
//!
//! # Example
//!
//! ```toml
//! anthropic_api_key = "sk-ant-..."
//! model = "claude-sonnet-4-20250514"
//! search_url = "http://localhost:6333"
//! state_dir = ".taxwise/sessions"
//! port = 8080
//! planner = "generative"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// File read when `--config` is not given, if it exists.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "taxwise.toml";

pub(crate) const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub(crate) const DEFAULT_STATE_DIR: &str = ".taxwise/sessions";
pub(crate) const DEFAULT_PORT: u16 = 8080;
/// Requests per minute per IP for `taxwise serve`.
pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("missing required configuration: {key}")]
    Missing { key: &'static str },
    #[error("could not read '{}': {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error("could not parse '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// How deduction plans are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum PlannerKind {
    /// Ask the text generator, falling back to the catalog.
    Generative,
    /// The fixed catalog plan; no generation call.
    Catalog,
}

/// Shape of `taxwise.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    anthropic_api_key: Option<String>,
    anthropic_url: Option<String>,
    model: Option<String>,
    search_url: Option<String>,
    search_api_key: Option<String>,
    state_dir: Option<PathBuf>,
    port: Option<u16>,
    planner: Option<PlannerKind>,
    api_key: Option<String>,
    rate_limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) anthropic_api_key: Option<String>,
    /// Override for the generation API base URL.
    pub(crate) anthropic_url: Option<String>,
    pub(crate) model: String,
    pub(crate) search_url: Option<String>,
    pub(crate) search_api_key: Option<String>,
    pub(crate) state_dir: PathBuf,
    pub(crate) port: u16,
    pub(crate) planner: PlannerKind,
    /// Key required by `taxwise serve` clients. None = no auth.
    pub(crate) api_key: Option<String>,
    pub(crate) rate_limit: u64,
}

/// Settings every LLM-backed command needs.
#[derive(Debug, Clone)]
pub(crate) struct ServiceSettings {
    pub(crate) api_key: String,
    pub(crate) search_url: String,
}

impl Config {
    /// Load from `path` (or `taxwise.toml` if present) and the environment.
    pub(crate) fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let file = match path {
            Some(path) => read_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    read_file(default)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Config::resolve(file, |key| std::env::var(key).ok())
    }

    fn resolve(
        file: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        let env = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let port = match env("TAXWISE_PORT") {
            Some(v) => parse_number("TAXWISE_PORT", v)?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };
        let rate_limit = match env("TAXWISE_RATE_LIMIT") {
            Some(v) => parse_number("TAXWISE_RATE_LIMIT", v)?,
            None => file.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT),
        };
        let planner = match env("TAXWISE_PLANNER").as_deref() {
            Some("generative") => PlannerKind::Generative,
            Some("catalog") => PlannerKind::Catalog,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TAXWISE_PLANNER",
                    value: other.to_string(),
                })
            }
            None => file.planner.unwrap_or(PlannerKind::Generative),
        };

        Ok(Config {
            anthropic_api_key: env("ANTHROPIC_API_KEY").or(file.anthropic_api_key),
            anthropic_url: env("TAXWISE_ANTHROPIC_URL").or(file.anthropic_url),
            model: env("TAXWISE_MODEL")
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            search_url: env("TAXWISE_SEARCH_URL").or(file.search_url),
            search_api_key: env("TAXWISE_SEARCH_API_KEY").or(file.search_api_key),
            state_dir: env("TAXWISE_STATE_DIR")
                .map(PathBuf::from)
                .or(file.state_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
            port,
            planner,
            api_key: env("TAXWISE_API_KEY").or(file.api_key),
            rate_limit,
        })
    }

    /// The generation and search settings, or the first missing key.
    pub(crate) fn service_settings(&self) -> Result<ServiceSettings, ConfigError> {
        let api_key = self
            .anthropic_api_key
            .clone()
            .ok_or(ConfigError::Missing {
                key: "ANTHROPIC_API_KEY",
            })?;
        let search_url = self.search_url.clone().ok_or(ConfigError::Missing {
            key: "TAXWISE_SEARCH_URL",
        })?;
        Ok(ServiceSettings {
            api_key,
            search_url,
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    match value.parse() {
        Ok(n) => Ok(n),
        Err(_) => Err(ConfigError::Invalid { key, value }),
    }
}
