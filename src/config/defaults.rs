//! Built-in settings (layer 1)
//!
//! Hardcoded values for every setting.

use serde::{Deserialize, Serialize};

use esp_config_store::DEFAULT_MAX_ENTRIES;

/// Built-in default settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Store backend (default: "file")
    pub store_backend: String,

    /// Partition file for the file backend (default: ".esp-config/nvs.json")
    pub store_path: String,

    /// Partition capacity in entries (default: 512)
    pub max_entries: usize,

    /// Log filter when ESP_CONFIG_LOG is unset (default: "warn")
    pub log_level: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            store_backend: "file".to_string(),
            store_path: ".esp-config/nvs.json".to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
            log_level: "warn".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "store": {
                "backend": self.store_backend,
                "path": self.store_path,
                "max_entries": self.max_entries
            },
            "defaults": {},
            "log": {
                "level": self.log_level
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.store_backend, "file");
        assert_eq!(defaults.store_path, ".esp-config/nvs.json");
        assert_eq!(defaults.max_entries, 512);
        assert_eq!(defaults.log_level, "warn");
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["store"]["backend"], "file");
        assert_eq!(value["store"]["max_entries"], 512);
        assert!(value["defaults"].as_object().unwrap().is_empty());
        assert_eq!(value["log"]["level"], "warn");
    }
}
