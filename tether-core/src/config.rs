//! Runtime Configuration
//!
//! Settings that shape how templates are read and how deferred input is
//! scheduled. Every field has a default, so a partial JSON document is a
//! valid configuration.

use serde::Deserialize;

use crate::error::Result;

/// Template and scheduling settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attribute prefix that marks a directive (`v-` in `v-model`).
    pub prefix: String,

    /// Delay used by `v-model.debounce` when no explicit delay is given.
    pub debounce_ms: u64,

    /// Defer compilation until [`ViewModel::mount`](crate::ViewModel::mount).
    pub lazy: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "v-".to_string(),
            debounce_ms: 300,
            lazy: false,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.prefix, "v-");
        assert_eq!(config.debounce_ms, 300);
        assert!(!config.lazy);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "prefix": "x-" }"#).unwrap();
        assert_eq!(config.prefix, "x-");
        assert_eq!(config.debounce_ms, 300);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Config::from_json("{ prefix: ").is_err());
    }
}
