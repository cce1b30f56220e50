//! Summary of effective configuration values
//!
//! Walks every entry of the defaults table and resolves it through the
//! resolver, recording the effective value and where it came from.

use serde::Serialize;

use esp_config_store::{Encoding, OverrideStore};

use crate::resolver::{Resolver, Source};

/// One resolved key
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub key: String,
    pub encoding: Encoding,
    #[serde(flatten)]
    pub state: EntryState,
}

/// Result of resolving one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryState {
    Resolved { value: String, source: Source },
    Error { message: String },
}

/// Resolved keys of one namespace, in table order
#[derive(Debug, Clone, Serialize)]
pub struct SummaryNamespace {
    pub name: String,
    pub entries: Vec<SummaryEntry>,
}

/// Effective values of every key known to the defaults table
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub namespaces: Vec<SummaryNamespace>,
}

impl Summary {
    /// Resolve every (namespace, key, encoding) in the resolver's table
    pub fn collect<S: OverrideStore>(resolver: &Resolver<'_, S>) -> Self {
        let namespaces = resolver
            .defaults()
            .namespaces()
            .iter()
            .map(|ns| SummaryNamespace {
                name: ns.name().to_string(),
                entries: ns
                    .entries()
                    .iter()
                    .map(|entry| SummaryEntry {
                        key: entry.key().to_string(),
                        encoding: entry.encoding(),
                        state: resolve(resolver, ns.name(), entry.key(), entry.encoding()),
                    })
                    .collect(),
            })
            .collect();

        Self { namespaces }
    }

    /// Number of keys whose effective value comes from the override store
    pub fn override_count(&self) -> usize {
        self.namespaces
            .iter()
            .flat_map(|ns| &ns.entries)
            .filter(|e| matches!(e.state, EntryState::Resolved { source: Source::Override, .. }))
            .count()
    }

    /// Human-readable rendering, one namespace header followed by its keys
    pub fn to_human(&self) -> String {
        let mut out = String::new();
        for ns in &self.namespaces {
            out.push_str(&ns.name);
            out.push('\n');
            for entry in &ns.entries {
                match &entry.state {
                    EntryState::Resolved { value, source } => {
                        out.push_str(&format!("  {} : {} ({})\n", entry.key, value, source));
                    }
                    EntryState::Error { message } => {
                        out.push_str(&format!("  {} : <error: {}>\n", entry.key, message));
                    }
                }
            }
        }
        out
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn resolve<S: OverrideStore>(
    resolver: &Resolver<'_, S>,
    namespace: &str,
    key: &str,
    encoding: Encoding,
) -> EntryState {
    let resolved = match encoding {
        Encoding::I32 => resolver
            .get_i32(namespace, key)
            .map(|v| (v.value.to_string(), v.source)),
        // Size query first, then a fetch into an exactly sized buffer
        Encoding::Str => resolver
            .get_string(namespace, key)
            .map(|v| (v.value, v.source)),
        Encoding::Blob => resolver
            .get_blob_vec(namespace, key)
            .map(|v| (render_blob(&v.value), v.source)),
        other => {
            return EntryState::Error {
                message: format!("unsupported encoding {}", other),
            }
        }
    };

    match resolved {
        Ok((value, source)) => EntryState::Resolved { value, source },
        Err(e) => EntryState::Error {
            message: e.to_string(),
        },
    }
}

/// Printable UTF-8 is shown as text, anything else as `hex:` digits
pub fn render_blob(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("hex:{}", hex::encode(bytes)),
    }
}
