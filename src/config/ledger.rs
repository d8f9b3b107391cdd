use std::path::{Component, PathBuf};

use crate::config::helpers::{EnvLookup, optional_env, parse_bool_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// How the same-day sequence of a new base id is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseIdStrategy {
    /// Count of existing records whose base id carries the date, plus one.
    Count,
    /// Highest existing same-day sequence, plus one.
    MaxPlusOne,
}

impl BaseIdStrategy {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "max_plus_one" | "max-plus-one" | "max" => Ok(Self::MaxPlusOne),
            other => Err(ConfigError::InvalidValue {
                key: "LEDGER_BASE_ID_STRATEGY".to_string(),
                message: format!("unsupported strategy '{other}'"),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::MaxPlusOne => "max_plus_one",
        }
    }
}

/// Activity log controls.
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    pub enabled: bool,
    /// Absolute path of the JSON-lines log file.
    pub path: PathBuf,
    pub hash_chain: bool,
}

/// Resolved runtime configuration for the ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    pub currency: String,
    /// Name recorded in the activity log when nobody signs in.
    pub operator: String,
    /// PIN to sign in with; the signed-in user replaces `operator`.
    pub pin: Option<String>,
    pub require_pin: bool,
    pub base_id_strategy: BaseIdStrategy,
    pub activity: ActivityConfig,
    pub settings: Settings,
}

/// Default data directory: the platform data dir, or `./data` without one.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ledgerdesk"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn validate_activity_path(raw: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "LEDGER_ACTIVITY_PATH".to_string(),
            message: "activity log path must not be empty".to_string(),
        });
    }

    let raw_path = PathBuf::from(trimmed);
    if raw_path.is_absolute() {
        return Err(ConfigError::InvalidValue {
            key: "LEDGER_ACTIVITY_PATH".to_string(),
            message: "activity log path must be relative to the data directory".to_string(),
        });
    }

    let mut normalized = PathBuf::new();
    for component in raw_path.components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ConfigError::InvalidValue {
                    key: "LEDGER_ACTIVITY_PATH".to_string(),
                    message: "activity log path must not contain '..' components".to_string(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::InvalidValue {
                    key: "LEDGER_ACTIVITY_PATH".to_string(),
                    message: "activity log path must be relative to the data directory"
                        .to_string(),
                });
            }
        }
    }

    if normalized.components().count() < 2 || !normalized.starts_with("logs") {
        return Err(ConfigError::InvalidValue {
            key: "LEDGER_ACTIVITY_PATH".to_string(),
            message: "activity log path must be under 'logs/' and include a filename".to_string(),
        });
    }

    Ok(normalized)
}

impl LedgerConfig {
    /// Resolve from the process environment layered over `settings`.
    pub fn resolve(data_dir: PathBuf, settings: &Settings) -> Result<Self, ConfigError> {
        Self::resolve_with(data_dir, settings, &crate::config::helpers::process_env)
    }

    pub(crate) fn resolve_with(
        data_dir: PathBuf,
        settings: &Settings,
        env: EnvLookup<'_>,
    ) -> Result<Self, ConfigError> {
        let strategy_raw = parse_string_env(
            env,
            "LEDGER_BASE_ID_STRATEGY",
            settings.base_id_strategy.clone(),
        );
        let base_id_strategy = BaseIdStrategy::from_str(&strategy_raw)?;

        let currency = parse_string_env(env, "LEDGER_CURRENCY", settings.currency.clone());
        if currency.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                key: "LEDGER_CURRENCY".to_string(),
                message: format!("currency code '{currency}' must not contain spaces"),
            });
        }

        let activity_path = {
            let raw = optional_env(env, "LEDGER_ACTIVITY_PATH")
                .unwrap_or_else(|| settings.activity.path.clone());
            data_dir.join(validate_activity_path(&raw)?)
        };

        Ok(Self {
            currency,
            operator: parse_string_env(env, "LEDGER_OPERATOR", settings.operator.clone()),
            pin: optional_env(env, "LEDGER_PIN"),
            require_pin: parse_bool_env(env, "LEDGER_REQUIRE_PIN", settings.require_pin)?,
            base_id_strategy,
            activity: ActivityConfig {
                enabled: parse_bool_env(env, "LEDGER_ACTIVITY_ENABLED", settings.activity.enabled)?,
                path: activity_path,
                hash_chain: parse_bool_env(
                    env,
                    "LEDGER_ACTIVITY_HASH_CHAIN",
                    settings.activity.hash_chain,
                )?,
            },
            settings: settings.clone(),
            data_dir,
        })
    }

    /// Configuration rooted at `data_dir` with default settings and no
    /// environment overrides.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let settings = Settings::default();
        Self {
            currency: settings.currency.clone(),
            operator: settings.operator.clone(),
            pin: None,
            require_pin: false,
            base_id_strategy: BaseIdStrategy::Count,
            activity: ActivityConfig {
                enabled: false,
                path: data_dir.join(&settings.activity.path),
                hash_chain: settings.activity.hash_chain,
            },
            settings,
            data_dir,
        }
    }
}
