//! Configuration resolution for foodlens-sr
//!
//! Per-field priority: command line → `FOODLENS_*` environment variable →
//! TOML config file → compiled default. The TOML file location itself
//! resolves as `--config` → `FOODLENS_CONFIG` → `./foodlens.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use foodlens_common::{Error, Result};
use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 5370;
const DEFAULT_DATABASE: &str = "foodlens.db";
const DEFAULT_REGISTRY_BASE_URL: &str = "https://world.openfoodfacts.org";
const DEFAULT_SEARCH_BASE_URL: &str = "https://world.openfoodfacts.org";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TESSERACT_COMMAND: &str = "tesseract";
const DEFAULT_USER_AGENT: &str = "FoodLens/0.1.0 (https://github.com/foodlens/foodlens)";

const DEFAULT_REGISTRY_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_OCR_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_VISION_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_REQUEST_BUDGET_MS: u64 = 30_000;

/// Command-line values that override every other configuration tier
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

/// TOML config file shape (all fields optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub database: Option<String>,
    pub registry_base_url: Option<String>,
    pub search_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub gemini_model: Option<String>,
    pub tesseract_command: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeouts: TomlTimeouts,
}

/// Timeout overrides in milliseconds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlTimeouts {
    pub registry_ms: Option<u64>,
    pub search_ms: Option<u64>,
    pub ocr_ms: Option<u64>,
    pub vision_ms: Option<u64>,
    pub request_budget_ms: Option<u64>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database: PathBuf,
    pub registry_base_url: String,
    pub search_base_url: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    /// Absent key disables the vision fallback stage
    pub gemini_api_key: Option<String>,
    pub tesseract_command: String,
    pub user_agent: String,
    pub registry_timeout: Duration,
    pub search_timeout: Duration,
    pub ocr_timeout: Duration,
    pub vision_timeout: Duration,
    /// Overall budget for one resolution across all stages
    pub request_budget: Duration,
}

impl Config {
    /// Resolve the full configuration from all tiers
    pub fn load(cli: CliOverrides) -> Result<Config> {
        let toml_config = load_toml_config(cli.config_file.as_deref())?;

        let port = cli
            .port
            .or_else(|| env_u16("FOODLENS_PORT"))
            .or(toml_config.port)
            .unwrap_or(DEFAULT_PORT);

        let database = cli
            .database
            .or_else(|| std::env::var("FOODLENS_DATABASE").ok().map(PathBuf::from))
            .or_else(|| toml_config.database.clone().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));

        let registry_base_url = resolve_string(
            "FOODLENS_REGISTRY_BASE_URL",
            toml_config.registry_base_url.clone(),
            DEFAULT_REGISTRY_BASE_URL,
        );
        let search_base_url = resolve_string(
            "FOODLENS_SEARCH_BASE_URL",
            toml_config.search_base_url.clone(),
            DEFAULT_SEARCH_BASE_URL,
        );
        let gemini_base_url = resolve_string(
            "FOODLENS_GEMINI_BASE_URL",
            toml_config.gemini_base_url.clone(),
            DEFAULT_GEMINI_BASE_URL,
        );
        let gemini_model = resolve_string(
            "FOODLENS_GEMINI_MODEL",
            toml_config.gemini_model.clone(),
            DEFAULT_GEMINI_MODEL,
        );
        let tesseract_command = resolve_string(
            "FOODLENS_TESSERACT_COMMAND",
            toml_config.tesseract_command.clone(),
            DEFAULT_TESSERACT_COMMAND,
        );
        let user_agent = resolve_string(
            "FOODLENS_USER_AGENT",
            toml_config.user_agent.clone(),
            DEFAULT_USER_AGENT,
        );

        let gemini_api_key = resolve_gemini_api_key(&toml_config);

        let timeouts = &toml_config.timeouts;
        let registry_timeout = resolve_ms(
            "FOODLENS_REGISTRY_TIMEOUT_MS",
            timeouts.registry_ms,
            DEFAULT_REGISTRY_TIMEOUT_MS,
        );
        let search_timeout = resolve_ms(
            "FOODLENS_SEARCH_TIMEOUT_MS",
            timeouts.search_ms,
            DEFAULT_SEARCH_TIMEOUT_MS,
        );
        let ocr_timeout = resolve_ms(
            "FOODLENS_OCR_TIMEOUT_MS",
            timeouts.ocr_ms,
            DEFAULT_OCR_TIMEOUT_MS,
        );
        let vision_timeout = resolve_ms(
            "FOODLENS_VISION_TIMEOUT_MS",
            timeouts.vision_ms,
            DEFAULT_VISION_TIMEOUT_MS,
        );
        let request_budget = resolve_ms(
            "FOODLENS_REQUEST_BUDGET_MS",
            timeouts.request_budget_ms,
            DEFAULT_REQUEST_BUDGET_MS,
        );

        Ok(Config {
            port,
            database,
            registry_base_url,
            search_base_url,
            gemini_base_url,
            gemini_model,
            gemini_api_key,
            tesseract_command,
            user_agent,
            registry_timeout,
            search_timeout,
            ocr_timeout,
            vision_timeout,
            request_budget,
        })
    }
}

/// Locate and parse the TOML config file, if any
///
/// A path given explicitly (CLI or env) must exist and parse; the implicit
/// `./foodlens.toml` is optional.
fn load_toml_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    let explicit = cli_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("FOODLENS_CONFIG").ok().map(PathBuf::from));

    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => {
            let implicit = PathBuf::from("foodlens.toml");
            if !implicit.exists() {
                return Ok(TomlConfig::default());
            }
            implicit
        }
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

fn resolve_string(env_name: &str, toml_value: Option<String>, default: &str) -> String {
    if let Ok(value) = std::env::var(env_name) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    match toml_value {
        Some(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn resolve_ms(env_name: &str, toml_value: Option<u64>, default: u64) -> Duration {
    let ms = env_u64(env_name).or(toml_value).unwrap_or(default);
    Duration::from_millis(ms)
}

fn env_u16(env_name: &str) -> Option<u16> {
    let raw = std::env::var(env_name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}: {:?}", env_name, raw);
            None
        }
    }
}

fn env_u64(env_name: &str) -> Option<u64> {
    let raw = std::env::var(env_name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}: {:?}", env_name, raw);
            None
        }
    }
}

/// Resolve the Gemini API key from ENV → TOML
///
/// The key is optional: without it the vision stage reports a soft failure
/// and the chain ends at text search.
fn resolve_gemini_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var("FOODLENS_GEMINI_API_KEY")
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .gemini_api_key
        .clone()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Gemini API key found in environment and TOML. Using environment (highest priority).");
    }

    if let Some(key) = env_key {
        info!("Gemini API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("Gemini API key loaded from TOML config");
        return Some(key);
    }

    warn!("Gemini API key not configured; vision fallback disabled. Set FOODLENS_GEMINI_API_KEY or gemini_api_key in foodlens.toml.");
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
