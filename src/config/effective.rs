//! Effective settings with full provenance
//!
//! The merged settings plus a record of every file or flag set that
//! contributed to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use esp_config_store::{FileStore, MemoryStore, OverrideStore};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::defaults::{DefaultsTable, TableError, EXAMPLE_TABLE};

/// Schema version for effective settings
pub const SCHEMA_VERSION: u32 = 1;

/// Largest accepted partition capacity
pub const MAX_ENTRIES_LIMIT: usize = 65_535;

/// Origin of a settings layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    Host,
    Project,
    Cli,
}

impl SettingsOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsOrigin::Builtin => "builtin",
            SettingsOrigin::Host => "host",
            SettingsOrigin::Project => "project",
            SettingsOrigin::Cli => "cli",
        }
    }
}

/// A contributing settings layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSource {
    pub origin: SettingsOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Override store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON partition file on disk
    File,
    /// Process-local store, discarded on exit
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::File => "file",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefaultsSettings {
    /// TOML defaults table; the built-in example table when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Typed view of the merged settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub store: StoreSettings,
    #[serde(default)]
    pub defaults: DefaultsSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Build the configured override store. File faults show up on use.
    pub fn open_store(&self) -> Box<dyn OverrideStore> {
        match self.store.backend {
            StoreBackend::File => Box::new(FileStore::new(&self.store.path, self.store.max_entries)),
            StoreBackend::Memory => Box::new(MemoryStore::with_capacity(self.store.max_entries)),
        }
    }

    /// Load the configured defaults table
    pub fn load_defaults(&self) -> Result<DefaultsTable, TableError> {
        match &self.defaults.path {
            Some(path) => DefaultsTable::load(path),
            None => Ok(EXAMPLE_TABLE.clone()),
        }
    }
}

/// Effective settings with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub schema_version: u32,

    /// When these settings were computed
    pub created_at: DateTime<Utc>,

    pub settings: Settings,

    /// Contributing layers in precedence order
    pub sources: Vec<SettingsSource>,
}

impl EffectiveSettings {
    /// Build effective settings from layers. Missing files are skipped.
    pub fn build(
        host_path: Option<&Path>,
        project_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![SettingsSource {
            origin: SettingsOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [(SettingsOrigin::Host, host_path), (SettingsOrigin::Project, project_path)] {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(SettingsSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let settings: Settings = serde_json::from_value(merge_layers(layers))
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        validate(&settings)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            settings,
            sources,
        })
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable rendering of the settings and their sources
    pub fn to_human(&self) -> String {
        let s = &self.settings;
        let defaults = match &s.defaults.path {
            Some(path) => path.display().to_string(),
            None => "(built-in example table)".to_string(),
        };

        let mut out = format!(
            "store.backend     = {}\nstore.path        = {}\nstore.max_entries = {}\ndefaults.path     = {}\nlog.level         = {}\n\nsources:\n",
            s.store.backend.as_str(),
            s.store.path.display(),
            s.store.max_entries,
            defaults,
            s.log.level,
        );
        for source in &self.sources {
            let origin = source.origin.as_str();
            match (&source.path, &source.digest) {
                (Some(path), Some(digest)) => {
                    out.push_str(&format!("  {} {} sha256:{}\n", origin, path, digest))
                }
                _ => out.push_str(&format!("  {}\n", origin)),
            }
        }
        out
    }
}

/// `~/.config/esp-config/config.toml`, when HOME is set
pub fn host_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config/esp-config/config.toml"))
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8 in {}: {}", path.display(), e)))?;

    let toml_value: toml::Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    Ok((toml_to_json(toml_value), digest))
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    let max = settings.store.max_entries;
    if max == 0 || max > MAX_ENTRIES_LIMIT {
        return Err(ConfigError::ValidationError(format!(
            "store.max_entries must be in [1, {}], got {}",
            MAX_ENTRIES_LIMIT, max
        )));
    }
    if settings.store.backend == StoreBackend::File && settings.store.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "store.path must not be empty for the file backend".to_string(),
        ));
    }
    Ok(())
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
