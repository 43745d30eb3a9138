use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use upkeep_core::config::{AppConfig, LoadOptions};

struct ConfigFile {
    path: PathBuf,
    doc: Value,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file = detect_config_path().and_then(|path| load_config_file(&path));
    let entries = effective_entries(&config);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, value, env_key)| {
        render_line(key, &value, field_source(key, env_key, file.as_ref()))
    }));
    lines.join("\n")
}

fn effective_entries(config: &AppConfig) -> Vec<(&'static str, String, &'static str)> {
    let email_api_key = match config.email.api_key.as_ref() {
        Some(key) => redact_secret(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        ("database.url", config.database.url.clone(), "UPKEEP_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "UPKEEP_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "UPKEEP_DATABASE_TIMEOUT_SECS",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "UPKEEP_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "UPKEEP_SERVER_PORT"),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            "UPKEEP_SERVER_HEALTH_CHECK_PORT",
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "UPKEEP_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        (
            "agreement.timezone",
            config.agreement.timezone.name().to_string(),
            "UPKEEP_AGREEMENT_TIMEZONE",
        ),
        ("agreement.currency", config.agreement.currency.clone(), "UPKEEP_AGREEMENT_CURRENCY"),
        (
            "agreement.company_name",
            config.agreement.company_name.clone(),
            "UPKEEP_AGREEMENT_COMPANY_NAME",
        ),
        (
            "documents.template_dir",
            config.documents.template_dir.display().to_string(),
            "UPKEEP_DOCUMENTS_TEMPLATE_DIR",
        ),
        (
            "documents.output_dir",
            config.documents.output_dir.display().to_string(),
            "UPKEEP_DOCUMENTS_OUTPUT_DIR",
        ),
        ("email.enabled", config.email.enabled.to_string(), "UPKEEP_EMAIL_ENABLED"),
        (
            "email.endpoint",
            config.email.endpoint.clone().unwrap_or_else(|| "<unset>".to_string()),
            "UPKEEP_EMAIL_ENDPOINT",
        ),
        ("email.api_key", email_api_key, "UPKEEP_EMAIL_API_KEY"),
        ("email.from_address", config.email.from_address.clone(), "UPKEEP_EMAIL_FROM_ADDRESS"),
        (
            "email.internal_recipient",
            config.email.internal_recipient.clone().unwrap_or_else(|| "<unset>".to_string()),
            "UPKEEP_EMAIL_INTERNAL_RECIPIENT",
        ),
        ("email.timeout_secs", config.email.timeout_secs.to_string(), "UPKEEP_EMAIL_TIMEOUT_SECS"),
        ("logging.level", config.logging.level.clone(), "UPKEEP_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "UPKEEP_LOGGING_FORMAT"),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("upkeep.toml"), PathBuf::from("config/upkeep.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file(path: &Path) -> Option<ConfigFile> {
    let raw = fs::read_to_string(path).ok()?;
    let doc = raw.parse::<Value>().ok()?;
    Some(ConfigFile { path: path.to_path_buf(), doc })
}

fn field_source(key_path: &str, env_key: &str, file: Option<&ConfigFile>) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(file) = file {
        if contains_path(&file.doc, key_path) {
            return format!("file ({})", file.path.display());
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

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
