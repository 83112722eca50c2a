use std::env;
use std::fs;
use std::path::Path;

use affilink_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_OK};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: EXIT_CONFIG,
                output: format!("config validation failed: {error}"),
            };
        }
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec![
        "effective config (source precedence: override > env > file > default):".to_string()
    ];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: EXIT_OK, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let marketplace = &config.marketplace;
    vec![
        Field {
            key: "marketplace.app_key",
            value: marketplace.app_key.clone(),
            env_keys: &["AFFILINK_APP_KEY", "APP_KEY"],
        },
        Field {
            key: "marketplace.app_secret",
            value: redact_secret(marketplace.app_secret.expose_secret()),
            env_keys: &["AFFILINK_APP_SECRET", "APP_SECRET"],
        },
        Field {
            key: "marketplace.tracking_id",
            value: marketplace.tracking_id.clone(),
            env_keys: &["AFFILINK_TRACKING_ID", "TRACKING_ID"],
        },
        Field {
            key: "marketplace.target_currency",
            value: marketplace.target_currency.clone(),
            env_keys: &["AFFILINK_TARGET_CURRENCY", "CURRENCY"],
        },
        Field {
            key: "marketplace.target_language",
            value: marketplace.target_language.clone(),
            env_keys: &["AFFILINK_TARGET_LANGUAGE"],
        },
        Field {
            key: "marketplace.gateway_url",
            value: marketplace.gateway_url.clone(),
            env_keys: &["AFFILINK_GATEWAY_URL"],
        },
        Field {
            key: "marketplace.sign_method",
            value: marketplace.sign_method.to_string(),
            env_keys: &["AFFILINK_SIGN_METHOD"],
        },
        Field {
            key: "marketplace.site_host",
            value: marketplace.site_host.clone(),
            env_keys: &["AFFILINK_SITE_HOST"],
        },
        Field {
            key: "marketplace.product_base_url",
            value: marketplace.product_base_url.clone(),
            env_keys: &["AFFILINK_PRODUCT_BASE_URL"],
        },
        Field {
            key: "cache.ttl_hours",
            value: config.cache.ttl_hours.to_string(),
            env_keys: &["AFFILINK_CACHE_TTL_HOURS", "CACHE_TTL_HOURS"],
        },
        Field {
            key: "cache.sweep_interval_secs",
            value: config.cache.sweep_interval_secs.to_string(),
            env_keys: &["AFFILINK_CACHE_SWEEP_INTERVAL_SECS"],
        },
        Field {
            key: "http.timeout_secs",
            value: config.http.timeout_secs.to_string(),
            env_keys: &["AFFILINK_HTTP_TIMEOUT_SECS"],
        },
        Field {
            key: "http.expand_short_links",
            value: config.http.expand_short_links.to_string(),
            env_keys: &["AFFILINK_HTTP_EXPAND_SHORT_LINKS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["AFFILINK_LOGGING_LEVEL", "AFFILINK_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["AFFILINK_LOGGING_FORMAT", "AFFILINK_LOG_FORMAT"],
        },
    ]
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
    if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
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

/// Blank values are ignored by the loader, so they are not a source either.
fn env_is_set(key: &str) -> bool {
    env::var(key).is_ok_and(|value| !value.trim().is_empty())
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

/// Keeps only the last four characters of long secrets, enough to tell keys apart.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < 16 {
        return "<redacted>".to_string();
    }

    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
