//! Enricher configuration helpers.
//!
//! The config names the order-table columns, the accepted order-id shapes,
//! the classification pattern used by the position-level fallback and the
//! status code to label table. Everything the engine treats as business
//! data lives here instead of in code.
use crate::key::NormalizedKey;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

const DEFAULT_KEY_FIELD: &str = "numero_commande";
const DEFAULT_CLASSIFICATION_FIELD: &str = "classification_interimaire";
const DEFAULT_STATUS_FIELD: &str = "statut";
const DEFAULT_STATUS_DESCRIPTION_FIELD: &str = "statut_description";
const DEFAULT_CLASSIFICATION_PATTERN: &str = r"^[A-E]\d{1,2}$";
const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// Accepted order-id shape: a literal prefix followed by exactly `digits` digits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OrderIdPattern {
    pub prefix: String,
    pub digits: usize,
}

impl OrderIdPattern {
    /// Match against a normalized (upper-cased) key.
    pub fn matches(&self, key: &NormalizedKey) -> bool {
        let prefix = self.prefix.to_uppercase();
        let Some(rest) = key.as_str().strip_prefix(prefix.as_str()) else {
            return false;
        };
        rest.len() == self.digits && rest.bytes().all(|byte| byte.is_ascii_digit())
    }
}

/// Pack-owned enricher config, stored as pretty JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct EnricherConfig {
    pub schema_version: u32,
    /// Order-table column holding the order number.
    pub key_field: String,
    pub classification_field: String,
    pub status_field: String,
    pub status_description_field: String,
    pub order_id_patterns: Vec<OrderIdPattern>,
    /// Position levels matching this pattern may be copied into the coefficient.
    pub classification_pattern: String,
    /// Status code -> label used when the record carries no description.
    pub status_labels: BTreeMap<String, String>,
    /// Bound of the modified / unmatched id samples in the run summary.
    pub sample_limit: usize,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        default_config()
    }
}

/// Configuration rejected before any document is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported enricher config schema_version {0}")]
    UnsupportedSchema(u32),
    #[error("{0} must be non-empty")]
    EmptyField(&'static str),
    #[error("order_id_patterns[{index}]: {reason}")]
    InvalidOrderIdPattern { index: usize, reason: String },
    #[error("classification_pattern is not a valid regex: {0}")]
    InvalidClassificationPattern(#[from] regex::Error),
}

/// Build the default config used when no `--config` is given.
pub fn default_config() -> EnricherConfig {
    let status_labels = [("OP", "Opérateur"), ("6A", "Ouvriers")]
        .into_iter()
        .map(|(code, label)| (code.to_string(), label.to_string()))
        .collect();
    EnricherConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        key_field: DEFAULT_KEY_FIELD.to_string(),
        classification_field: DEFAULT_CLASSIFICATION_FIELD.to_string(),
        status_field: DEFAULT_STATUS_FIELD.to_string(),
        status_description_field: DEFAULT_STATUS_DESCRIPTION_FIELD.to_string(),
        order_id_patterns: vec![OrderIdPattern {
            prefix: "RT".to_string(),
            digits: 6,
        }],
        classification_pattern: DEFAULT_CLASSIFICATION_PATTERN.to_string(),
        status_labels,
        sample_limit: DEFAULT_SAMPLE_LIMIT,
    }
}

/// Render the default config as pretty JSON.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&default_config()).context("serialize config stub")
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<EnricherConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: EnricherConfig =
        serde_json::from_slice(&bytes).context("parse enricher config JSON")?;
    validate_config(&config).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// Load `path` when given, otherwise fall back to the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<EnricherConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(default_config()),
    }
}

/// Write `config` as pretty JSON, refusing to clobber unless `force`.
pub fn write_config(path: &Path, config: &EnricherConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize enricher config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate schema version, column names, id patterns and the classification regex.
pub fn validate_config(config: &EnricherConfig) -> Result<(), ConfigError> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::UnsupportedSchema(config.schema_version));
    }
    let columns = [
        ("key_field", &config.key_field),
        ("classification_field", &config.classification_field),
        ("status_field", &config.status_field),
        ("status_description_field", &config.status_description_field),
    ];
    for (label, value) in columns {
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyField(label));
        }
    }
    if config.order_id_patterns.is_empty() {
        return Err(ConfigError::EmptyField("order_id_patterns"));
    }
    for (index, pattern) in config.order_id_patterns.iter().enumerate() {
        if pattern.prefix.trim().is_empty() || pattern.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidOrderIdPattern {
                index,
                reason: "prefix must be non-empty and contain no whitespace".to_string(),
            });
        }
        if pattern.digits == 0 {
            return Err(ConfigError::InvalidOrderIdPattern {
                index,
                reason: "digits must be at least 1".to_string(),
            });
        }
    }
    compile_classification_pattern(config)?;
    Ok(())
}

pub fn compile_classification_pattern(config: &EnricherConfig) -> Result<Regex, ConfigError> {
    Ok(Regex::new(&config.classification_pattern)?)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
