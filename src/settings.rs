//! Business settings persisted next to the data files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const SETTINGS_FILE: &str = "settings.toml";

/// Company and operator defaults used when minting and rendering documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub company_name: String,
    pub default_prepared_by: String,
    pub default_approved_by: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub currency: String,
    pub bank_account: String,
    pub operator: String,
    /// Refuse to open the ledger without a signed-in user.
    pub require_pin: bool,
    pub base_id_strategy: String,
    pub activity: ActivitySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySettings {
    pub enabled: bool,
    pub path: String,
    pub hash_chain: bool,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "logs/activity.jsonl".to_string(),
            hash_chain: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            company_name: "Newton Smart Home".to_string(),
            default_prepared_by: "Sales Team".to_string(),
            default_approved_by: "Manager".to_string(),
            contact_email: "info@newtonsmarthome.com".to_string(),
            contact_phone: "+971 52 779 0975".to_string(),
            currency: "AED".to_string(),
            bank_account: String::new(),
            operator: "System".to_string(),
            require_pin: false,
            base_id_strategy: "count".to_string(),
            activity: ActivitySettings::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML, filling absent keys with defaults.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load `settings.toml` from `dir`.
    ///
    /// A missing file yields defaults. An unreadable or malformed file also
    /// yields defaults, with a warning, so the ledger always starts.
    pub fn load_from_dir(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings {:?}: {}", path, e);
                return Self::default();
            }
        };
        match Self::from_toml(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring invalid settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Write settings as TOML into `dir`, creating it if needed.
    pub fn save_to_dir(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::InvalidValue {
            key: "LEDGER_DATA_DIR".to_string(),
            message: format!("cannot create {}: {}", dir.display(), e),
        })?;
        let body =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, body).map_err(|e| ConfigError::InvalidValue {
            key: "LEDGER_DATA_DIR".to_string(),
            message: format!("cannot write {}: {}", path.display(), e),
        })?;
        Ok(path)
    }
}
