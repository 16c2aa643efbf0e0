//! Runtime configuration.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `STOREFRONT_LOG_FORMAT` | `json` or `pretty` | `json` |
//! | `STOREFRONT_DEFAULT_CATEGORIES` | comma-separated category names seeded at bootstrap | empty |
//! | `STOREFRONT_CURRENCY` | three-letter ISO code used when displaying amounts | `USD` |

use thiserror::Error;

use storefront_observability::{LogFormat, UnknownLogFormat};

pub const LOG_FORMAT_VAR: &str = "STOREFRONT_LOG_FORMAT";
pub const DEFAULT_CATEGORIES_VAR: &str = "STOREFRONT_DEFAULT_CATEGORIES";
pub const CURRENCY_VAR: &str = "STOREFRONT_CURRENCY";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("STOREFRONT_LOG_FORMAT: {0}")]
    LogFormat(#[from] UnknownLogFormat),

    #[error("STOREFRONT_CURRENCY: '{0}' is not a three-letter currency code")]
    Currency(String),

    #[error("STOREFRONT_DEFAULT_CATEGORIES: category '{0}' is listed twice")]
    DuplicateCategory(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontConfig {
    pub log_format: LogFormat,
    pub default_categories: Vec<String>,
    pub currency: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            default_categories: Vec::new(),
            currency: "USD".to_string(),
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(LOG_FORMAT_VAR) {
            config.log_format = raw.parse()?;
        }

        if let Some(raw) = get(CURRENCY_VAR) {
            let code = raw.trim().to_ascii_uppercase();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::Currency(raw));
            }
            config.currency = code;
        }

        if let Some(raw) = get(DEFAULT_CATEGORIES_VAR) {
            for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                if config
                    .default_categories
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(name))
                {
                    return Err(ConfigError::DuplicateCategory(name.to_string()));
                }
                config.default_categories.push(name.to_string());
            }
        }

        Ok(config)
    }
}
