//! Configuration loading and resolution
//!
//! Settings are resolved from several tiers, highest priority first:
//! 1. Command-line arguments (applied by the binary after resolution)
//! 2. Environment variables (`GAMELOG_*`)
//! 3. TOML config file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SPREADSHEET_PATH: &str = "data/games.xlsx";
pub const DEFAULT_PREFERRED_SHEET: &str = "Raw Data";
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://api.rawg.io/api";
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 4;
pub const DEFAULT_MAX_CONCURRENT: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;
pub const DEFAULT_CACHE_PATH: &str = "meta_cache.sqlite";
pub const DEFAULT_CACHE_MAX_AGE_DAYS: u64 = 30;
pub const DEFAULT_POLITENESS_DELAY_MS: u64 = 300;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

const SECONDS_PER_DAY: u64 = 86_400;

// ============================================================================
// TOML bootstrap file
// ============================================================================

/// Configuration as written in `config.toml`
///
/// Every value is optional; anything left out falls through to the
/// environment or the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub spreadsheet: SpreadsheetToml,
    #[serde(default)]
    pub catalog: CatalogToml,
    #[serde(default)]
    pub cache: CacheToml,
    #[serde(default)]
    pub enrich: EnrichToml,
    #[serde(default)]
    pub server: ServerToml,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-field header candidate overrides, keyed by canonical field name
    #[serde(default)]
    pub columns: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpreadsheetToml {
    pub path: Option<PathBuf>,
    /// Empty string disables the preference (first sheet is always used)
    pub preferred_sheet: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogToml {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub requests_per_second: Option<u32>,
    pub max_concurrent: Option<usize>,
    pub max_retries: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub backoff_unit_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheToml {
    pub path: Option<PathBuf>,
    pub max_age_days: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichToml {
    pub politeness_delay_ms: Option<u64>,
    pub platform_aware_keys: Option<bool>,
    pub auto_enrich_on_startup: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerToml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    parse_toml_config(&content)
}

/// Parse TOML config text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Locate the config file
///
/// An explicit path (CLI flag or `GAMELOG_CONFIG`) must exist. Otherwise the
/// user config directory is checked; `None` means run on defaults.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let user_config = dirs::config_dir().map(|d| d.join("gamelog").join("config.toml"));
    match user_config {
        Some(path) if path.exists() => Ok(Some(path)),
        _ => Ok(None),
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub spreadsheet: SpreadsheetSettings,
    pub catalog: CatalogSettings,
    pub cache: CacheSettings,
    pub enrich: EnrichSettings,
    pub server: ServerSettings,
    pub logging: LoggingConfig,
    pub columns: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct SpreadsheetSettings {
    pub path: PathBuf,
    pub preferred_sheet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub requests_per_second: u32,
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub timeout: Duration,
    pub backoff_unit: Duration,
}

impl CatalogSettings {
    /// Trailing delay paid after every request to stay under the rps ceiling
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(1) / self.requests_per_second.max(1)
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub path: PathBuf,
    pub max_age: Duration,
}

#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub politeness_delay: Duration,
    pub platform_aware_keys: bool,
    pub auto_enrich_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(&TomlConfig::default(), |_| None).expect("built-in defaults are valid")
    }
}

impl Settings {
    /// Resolve settings from the TOML file and the process environment
    pub fn from_environment(toml_config: &TomlConfig) -> Result<Self> {
        Self::resolve(toml_config, |name| std::env::var(name).ok())
    }

    /// Resolve settings from the TOML file and an environment lookup
    ///
    /// Environment values win over TOML values; both win over defaults.
    pub fn resolve<F>(toml_config: &TomlConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_string = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let spreadsheet_path = env_string("GAMELOG_SPREADSHEET_PATH")
            .map(PathBuf::from)
            .or_else(|| toml_config.spreadsheet.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SPREADSHEET_PATH));

        // Present-but-empty disables the preference, so read env without the filter
        let preferred_sheet = match env("GAMELOG_PREFERRED_SHEET")
            .or_else(|| toml_config.spreadsheet.preferred_sheet.clone())
        {
            Some(name) if name.trim().is_empty() => None,
            Some(name) => Some(name.trim().to_string()),
            None => Some(DEFAULT_PREFERRED_SHEET.to_string()),
        };

        let catalog = &toml_config.catalog;
        let api_key = env_string("GAMELOG_CATALOG_API_KEY")
            .or_else(|| catalog.api_key.clone())
            .filter(|key| !key.trim().is_empty());

        let max_age_days: u64 = parse_env(&env_string, "GAMELOG_CACHE_MAX_AGE_DAYS")?
            .or(toml_config.cache.max_age_days)
            .unwrap_or(DEFAULT_CACHE_MAX_AGE_DAYS);
        let max_age_secs = max_age_days.checked_mul(SECONDS_PER_DAY).ok_or_else(|| {
            Error::Config(format!("cache.max_age_days is too large: {}", max_age_days))
        })?;

        let settings = Settings {
            spreadsheet: SpreadsheetSettings {
                path: spreadsheet_path,
                preferred_sheet,
            },
            catalog: CatalogSettings {
                base_url: env_string("GAMELOG_CATALOG_BASE_URL")
                    .or_else(|| catalog.base_url.clone())
                    .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_key,
                requests_per_second: parse_env(&env_string, "GAMELOG_CATALOG_RPS")?
                    .or(catalog.requests_per_second)
                    .unwrap_or(DEFAULT_REQUESTS_PER_SECOND),
                max_concurrent: parse_env(&env_string, "GAMELOG_CATALOG_MAX_CONCURRENT")?
                    .or(catalog.max_concurrent)
                    .unwrap_or(DEFAULT_MAX_CONCURRENT),
                max_retries: parse_env(&env_string, "GAMELOG_CATALOG_MAX_RETRIES")?
                    .or(catalog.max_retries)
                    .unwrap_or(DEFAULT_MAX_RETRIES),
                timeout: Duration::from_secs(
                    parse_env(&env_string, "GAMELOG_CATALOG_TIMEOUT_SECS")?
                        .or(catalog.timeout_secs)
                        .unwrap_or(DEFAULT_TIMEOUT_SECS),
                ),
                backoff_unit: Duration::from_millis(
                    catalog.backoff_unit_ms.unwrap_or(DEFAULT_BACKOFF_UNIT_MS),
                ),
            },
            cache: CacheSettings {
                path: env_string("GAMELOG_CACHE_PATH")
                    .map(PathBuf::from)
                    .or_else(|| toml_config.cache.path.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
                max_age: Duration::from_secs(max_age_secs),
            },
            enrich: EnrichSettings {
                politeness_delay: Duration::from_millis(
                    toml_config
                        .enrich
                        .politeness_delay_ms
                        .unwrap_or(DEFAULT_POLITENESS_DELAY_MS),
                ),
                platform_aware_keys: toml_config.enrich.platform_aware_keys.unwrap_or(false),
                auto_enrich_on_startup: toml_config.enrich.auto_enrich_on_startup.unwrap_or(true),
            },
            server: ServerSettings {
                host: toml_config
                    .server
                    .host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: toml_config.server.port.unwrap_or(DEFAULT_PORT),
            },
            logging: toml_config.logging.clone(),
            columns: toml_config.columns.clone(),
        };

        settings.validate()?;
        debug!(spreadsheet = ?settings.spreadsheet, "Settings resolved");
        Ok(settings)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.spreadsheet.path.as_os_str().is_empty() {
            return Err(Error::Config("spreadsheet.path must not be empty".to_string()));
        }
        if self.cache.path.as_os_str().is_empty() {
            return Err(Error::Config("cache.path must not be empty".to_string()));
        }
        if self.catalog.requests_per_second == 0 {
            return Err(Error::Config(
                "catalog.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.catalog.max_concurrent == 0 {
            return Err(Error::Config(
                "catalog.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.catalog.timeout.is_zero() {
            return Err(Error::Config("catalog.timeout_secs must be at least 1".to_string()));
        }
        if self.cache.max_age.is_zero() {
            return Err(Error::Config("cache.max_age_days must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Log the effective configuration without secrets
    pub fn log_summary(&self) {
        info!("Spreadsheet: {}", self.spreadsheet.path.display());
        info!(
            "Preferred sheet: {}",
            self.spreadsheet.preferred_sheet.as_deref().unwrap_or("(first sheet)")
        );
        info!("Cache database: {}", self.cache.path.display());
        info!(
            base_url = %self.catalog.base_url,
            rps = self.catalog.requests_per_second,
            max_concurrent = self.catalog.max_concurrent,
            max_retries = self.catalog.max_retries,
            api_key_configured = self.catalog.api_key.is_some(),
            "Catalog client configuration"
        );
    }
}

fn parse_env<T, F>(env: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?} is invalid: {}", name, raw, e))),
        None => Ok(None),
    }
}
