//! Environment lookups shared by config resolvers.

use crate::error::ConfigError;

/// Source of environment values. Production reads the process environment;
/// tests pass a map.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Read an env var, treating blank values as unset.
pub fn optional_env(env: EnvLookup<'_>, key: &str) -> Option<String> {
    env(key).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn parse_string_env(env: EnvLookup<'_>, key: &str, default: String) -> String {
    optional_env(env, key).unwrap_or(default)
}

pub fn parse_bool_env(env: EnvLookup<'_>, key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(env, key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{other}'"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{optional_env, parse_bool_env};
    use crate::error::ConfigError;

    #[test]
    fn blank_values_count_as_unset() {
        let vars = HashMap::from([("A".to_string(), "   ".to_string())]);
        let env = |key: &str| vars.get(key).cloned();
        assert_eq!(optional_env(&env, "A"), None);
        assert_eq!(optional_env(&env, "B"), None);
    }

    #[test]
    fn parse_bool_env_accepts_common_spellings() {
        let vars = HashMap::from([
            ("ON".to_string(), "Yes".to_string()),
            ("OFF".to_string(), "0".to_string()),
            ("BAD".to_string(), "maybe".to_string()),
        ]);
        let env = |key: &str| vars.get(key).cloned();
        assert!(parse_bool_env(&env, "ON", false).expect("bool"));
        assert!(!parse_bool_env(&env, "OFF", true).expect("bool"));
        assert!(parse_bool_env(&env, "MISSING", true).expect("bool"));

        let err = parse_bool_env(&env, "BAD", true).expect_err("must reject");
        let ConfigError::InvalidValue { key, .. } = err else {
            panic!("expected InvalidValue");
        };
        assert_eq!(key, "BAD");
    }
}
