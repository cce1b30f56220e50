//! Layered CLI settings
//!
//! Four layers, later ones winning:
//! 1. Built-in settings
//! 2. Host file (~/.config/esp-config/config.toml)
//! 3. Project file (esp-config.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    host_config_path, ConfigError, DefaultsSettings, EffectiveSettings, LogSettings, Settings,
    SettingsOrigin, SettingsSource, StoreBackend, StoreSettings, MAX_ENTRIES_LIMIT,
};
pub use merge::{apply_layer, merge_layers};

/// Project settings file looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "esp-config.toml";
