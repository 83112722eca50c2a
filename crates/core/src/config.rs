use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::DEFAULT_SITE_HOST;
use crate::signing::SignMethod;

pub const DEFAULT_GATEWAY_URL: &str = "https://api-sg.aliexpress.com/rest";
pub const DEFAULT_PRODUCT_BASE_URL: &str = "https://www.aliexpress.com";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub marketplace: MarketplaceConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct MarketplaceConfig {
    pub app_key: String,
    pub app_secret: SecretString,
    pub tracking_id: String,
    pub target_currency: String,
    pub target_language: String,
    pub gateway_url: String,
    pub sign_method: SignMethod,
    pub site_host: String,
    pub product_base_url: String,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub ttl_hours: u64,
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub expand_short_links: bool,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug)]
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
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub tracking_id: Option<String>,
    pub target_currency: Option<String>,
    pub target_language: Option<String>,
    pub gateway_url: Option<String>,
    pub sign_method: Option<SignMethod>,
    pub cache_ttl_hours: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub expand_short_links: Option<bool>,
    pub log_level: Option<String>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            marketplace: MarketplaceConfig {
                app_key: String::new(),
                app_secret: String::new().into(),
                tracking_id: String::new(),
                target_currency: "USD".to_string(),
                target_language: "en".to_string(),
                gateway_url: DEFAULT_GATEWAY_URL.to_string(),
                sign_method: SignMethod::default(),
                site_host: DEFAULT_SITE_HOST.to_string(),
                product_base_url: DEFAULT_PRODUCT_BASE_URL.to_string(),
            },
            cache: CacheConfig { ttl_hours: 24, sweep_interval_secs: 3600 },
            http: HttpConfig { timeout_secs: 20, expand_short_links: false },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
    /// Layers defaults, the config file, environment variables and explicit
    /// overrides (later layers win), then validates the result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("affilink.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(marketplace) = patch.marketplace {
            if let Some(app_key) = marketplace.app_key {
                self.marketplace.app_key = app_key;
            }
            if let Some(app_secret_value) = marketplace.app_secret {
                self.marketplace.app_secret = secret_value(app_secret_value);
            }
            if let Some(tracking_id) = marketplace.tracking_id {
                self.marketplace.tracking_id = tracking_id;
            }
            if let Some(target_currency) = marketplace.target_currency {
                self.marketplace.target_currency = target_currency;
            }
            if let Some(target_language) = marketplace.target_language {
                self.marketplace.target_language = target_language;
            }
            if let Some(gateway_url) = marketplace.gateway_url {
                self.marketplace.gateway_url = gateway_url;
            }
            if let Some(sign_method) = marketplace.sign_method {
                self.marketplace.sign_method = sign_method;
            }
            if let Some(site_host) = marketplace.site_host {
                self.marketplace.site_host = site_host;
            }
            if let Some(product_base_url) = marketplace.product_base_url {
                self.marketplace.product_base_url = product_base_url;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(ttl_hours) = cache.ttl_hours {
                self.cache.ttl_hours = ttl_hours;
            }
            if let Some(sweep_interval_secs) = cache.sweep_interval_secs {
                self.cache.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(http) = patch.http {
            if let Some(timeout_secs) = http.timeout_secs {
                self.http.timeout_secs = timeout_secs;
            }
            if let Some(expand_short_links) = http.expand_short_links {
                self.http.expand_short_links = expand_short_links;
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
        if let Some(value) = read_env_with_alias("AFFILINK_APP_KEY", "APP_KEY") {
            self.marketplace.app_key = value;
        }
        if let Some(value) = read_env_with_alias("AFFILINK_APP_SECRET", "APP_SECRET") {
            self.marketplace.app_secret = secret_value(value);
        }
        if let Some(value) = read_env_with_alias("AFFILINK_TRACKING_ID", "TRACKING_ID") {
            self.marketplace.tracking_id = value;
        }
        if let Some(value) = read_env_with_alias("AFFILINK_TARGET_CURRENCY", "CURRENCY") {
            self.marketplace.target_currency = value;
        }
        if let Some(value) = read_env("AFFILINK_TARGET_LANGUAGE") {
            self.marketplace.target_language = value;
        }
        if let Some(value) = read_env("AFFILINK_GATEWAY_URL") {
            self.marketplace.gateway_url = value;
        }
        if let Some(value) = read_env("AFFILINK_SIGN_METHOD") {
            self.marketplace.sign_method =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "AFFILINK_SIGN_METHOD".to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = read_env("AFFILINK_SITE_HOST") {
            self.marketplace.site_host = value;
        }
        if let Some(value) = read_env("AFFILINK_PRODUCT_BASE_URL") {
            self.marketplace.product_base_url = value;
        }

        if let Some(value) = read_env("AFFILINK_CACHE_TTL_HOURS") {
            self.cache.ttl_hours = parse_u64("AFFILINK_CACHE_TTL_HOURS", &value)?;
        } else if let Some(value) = read_env("CACHE_TTL_HOURS") {
            self.cache.ttl_hours = parse_u64("CACHE_TTL_HOURS", &value)?;
        }
        if let Some(value) = read_env("AFFILINK_CACHE_SWEEP_INTERVAL_SECS") {
            self.cache.sweep_interval_secs =
                parse_u64("AFFILINK_CACHE_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("AFFILINK_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_u64("AFFILINK_HTTP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AFFILINK_HTTP_EXPAND_SHORT_LINKS") {
            self.http.expand_short_links = parse_bool("AFFILINK_HTTP_EXPAND_SHORT_LINKS", &value)?;
        }

        if let Some(value) = read_env_with_alias("AFFILINK_LOGGING_LEVEL", "AFFILINK_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env_with_alias("AFFILINK_LOGGING_FORMAT", "AFFILINK_LOG_FORMAT")
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(app_key) = overrides.app_key {
            self.marketplace.app_key = app_key;
        }
        if let Some(app_secret) = overrides.app_secret {
            self.marketplace.app_secret = secret_value(app_secret);
        }
        if let Some(tracking_id) = overrides.tracking_id {
            self.marketplace.tracking_id = tracking_id;
        }
        if let Some(target_currency) = overrides.target_currency {
            self.marketplace.target_currency = target_currency;
        }
        if let Some(target_language) = overrides.target_language {
            self.marketplace.target_language = target_language;
        }
        if let Some(gateway_url) = overrides.gateway_url {
            self.marketplace.gateway_url = gateway_url;
        }
        if let Some(sign_method) = overrides.sign_method {
            self.marketplace.sign_method = sign_method;
        }
        if let Some(ttl_hours) = overrides.cache_ttl_hours {
            self.cache.ttl_hours = ttl_hours;
        }
        if let Some(timeout_secs) = overrides.http_timeout_secs {
            self.http.timeout_secs = timeout_secs;
        }
        if let Some(expand_short_links) = overrides.expand_short_links {
            self.http.expand_short_links = expand_short_links;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    fn normalize(&mut self) {
        let marketplace = &mut self.marketplace;
        marketplace.app_key = marketplace.app_key.trim().to_string();
        marketplace.tracking_id = marketplace.tracking_id.trim().to_string();
        marketplace.target_currency = marketplace.target_currency.trim().to_ascii_uppercase();
        marketplace.target_language = marketplace.target_language.trim().to_ascii_lowercase();
        marketplace.site_host = marketplace.site_host.trim().to_ascii_lowercase();
        marketplace.product_base_url =
            marketplace.product_base_url.trim().trim_end_matches('/').to_string();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_marketplace(&self.marketplace)?;
        validate_cache(&self.cache)?;
        validate_http(&self.http)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The file [`AppConfig::load`] would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("affilink.toml"), PathBuf::from("config/affilink.toml")]
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

fn validate_marketplace(marketplace: &MarketplaceConfig) -> Result<(), ConfigError> {
    if marketplace.app_key.is_empty() {
        return Err(ConfigError::Validation(
            "marketplace.app_key is required. Get it from the affiliate portal > App Management"
                .to_string(),
        ));
    }
    if marketplace.app_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "marketplace.app_secret is required. Get it from the affiliate portal > App Management"
                .to_string(),
        ));
    }
    if marketplace.tracking_id.is_empty() {
        return Err(ConfigError::Validation(
            "marketplace.tracking_id is required. Create one in the affiliate portal > Tracking ID"
                .to_string(),
        ));
    }

    let currency = &marketplace.target_currency;
    if currency.len() != 3 || !currency.bytes().all(|byte| byte.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "marketplace.target_currency must be a three-letter currency code, got `{currency}`"
        )));
    }
    if marketplace.target_language.is_empty() {
        return Err(ConfigError::Validation(
            "marketplace.target_language must not be empty".to_string(),
        ));
    }

    validate_http_url("marketplace.gateway_url", &marketplace.gateway_url)?;
    validate_http_url("marketplace.product_base_url", &marketplace.product_base_url)?;

    if marketplace.site_host.is_empty() || marketplace.site_host.contains('/') {
        return Err(ConfigError::Validation(
            "marketplace.site_host must be a bare host name such as `aliexpress.com`".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|error| ConfigError::Validation(format!("{key} is not a valid URL: {error}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}

const MAX_CACHE_TTL_HOURS: u64 = 24 * 365;

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.ttl_hours == 0 || cache.ttl_hours > MAX_CACHE_TTL_HOURS {
        return Err(ConfigError::Validation(format!(
            "cache.ttl_hours must be in range 1..={MAX_CACHE_TTL_HOURS}"
        )));
    }
    if cache.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "cache.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.timeout_secs == 0 || http.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "http.timeout_secs must be in range 1..=120".to_string(),
        ));
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

/// Prefixed name wins; the bare name matches the variables the bot used before.
fn read_env_with_alias(key: &str, alias: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(alias))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    marketplace: Option<MarketplacePatch>,
    cache: Option<CachePatch>,
    http: Option<HttpPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketplacePatch {
    app_key: Option<String>,
    app_secret: Option<String>,
    tracking_id: Option<String>,
    target_currency: Option<String>,
    target_language: Option<String>,
    gateway_url: Option<String>,
    sign_method: Option<SignMethod>,
    site_host: Option<String>,
    product_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    ttl_hours: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpPatch {
    timeout_secs: Option<u64>,
    expand_short_links: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
