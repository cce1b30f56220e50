//! Defaults table file
//!
//! Tables can also be declared in TOML, for host tooling that has no
//! compiled-in table:
//!
//! ```toml
//! [[namespace]]
//! name = "example"
//!
//! [[namespace.entry]]
//! key = "i32"
//! type = "i32"
//! value = 12345
//!
//! [[namespace.entry]]
//! key = "blob"
//! type = "blob"
//! value = "hex:616263646566"
//! ```
//!
//! Blob values are UTF-8 text, `hex:` prefixed hex, or an array of bytes.

use std::collections::HashSet;
use std::path::Path;

use esp_config_store::partition::validate_name;
use esp_config_store::Encoding;
use serde::Deserialize;
use tracing::warn;

use super::table::DefaultsTable;
use super::value::{DefaultValue, Entry, Namespace};

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default, rename = "namespace")]
    namespaces: Vec<NamespaceSpec>,
}

#[derive(Debug, Deserialize)]
struct NamespaceSpec {
    name: String,
    #[serde(default, rename = "entry")]
    entries: Vec<EntrySpec>,
}

#[derive(Debug, Deserialize)]
struct EntrySpec {
    key: String,
    #[serde(rename = "type")]
    encoding: String,
    value: toml::Value,
}

/// Errors that can occur when loading a defaults table file
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to read defaults table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid name '{0}': names must be 1 to 15 bytes")]
    InvalidName(String),

    #[error("Duplicate namespace: '{0}'")]
    DuplicateNamespace(String),

    #[error("'{namespace}/{key}': unknown type '{name}'")]
    UnknownEncoding {
        namespace: String,
        key: String,
        name: String,
    },

    #[error("'{namespace}/{key}': type {encoding} is reserved and not implemented")]
    Reserved {
        namespace: String,
        key: String,
        encoding: Encoding,
    },

    #[error("'{namespace}/{key}': invalid {encoding} value: {reason}")]
    InvalidValue {
        namespace: String,
        key: String,
        encoding: Encoding,
        reason: String,
    },
}

impl DefaultsTable {
    /// Load a table from a TOML file
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a table from a TOML string
    pub fn parse(content: &str) -> Result<Self, TableError> {
        let file: TableFile = toml::from_str(content)?;

        let mut names = HashSet::new();
        let mut namespaces = Vec::with_capacity(file.namespaces.len());
        for decl in file.namespaces {
            validate_name(&decl.name).map_err(|_| TableError::InvalidName(decl.name.clone()))?;
            if !names.insert(decl.name.clone()) {
                return Err(TableError::DuplicateNamespace(decl.name));
            }

            let entries = decl
                .entries
                .into_iter()
                .map(|entry| build_entry(&decl.name, entry))
                .collect::<Result<Vec<_>, _>>()?;
            namespaces.push(Namespace::new(decl.name, entries));
        }

        let table = DefaultsTable::new(namespaces);
        for (namespace, key, encoding) in table.duplicates() {
            warn!(%namespace, %key, %encoding, "duplicate default; only the first declaration is used");
        }
        Ok(table)
    }
}

fn build_entry(namespace: &str, decl: EntrySpec) -> Result<Entry, TableError> {
    validate_name(&decl.key).map_err(|_| TableError::InvalidName(decl.key.clone()))?;

    let encoding: Encoding = decl
        .encoding
        .parse()
        .map_err(|_| TableError::UnknownEncoding {
            namespace: namespace.to_string(),
            key: decl.key.clone(),
            name: decl.encoding.clone(),
        })?;
    if !encoding.is_implemented() {
        return Err(TableError::Reserved {
            namespace: namespace.to_string(),
            key: decl.key,
            encoding,
        });
    }

    let invalid = |reason: String| TableError::InvalidValue {
        namespace: namespace.to_string(),
        key: decl.key.clone(),
        encoding,
        reason,
    };

    let value = match (encoding, &decl.value) {
        (Encoding::I32, toml::Value::Integer(i)) => i32::try_from(*i)
            .map(DefaultValue::I32)
            .map_err(|_| invalid(format!("{} is out of range", i)))?,
        (Encoding::Str, toml::Value::String(s)) => DefaultValue::Str(s.clone().into()),
        (Encoding::Blob, toml::Value::String(s)) => {
            DefaultValue::Blob(parse_blob_literal(s).map_err(invalid)?.into())
        }
        (Encoding::Blob, toml::Value::Array(items)) => {
            let bytes = items
                .iter()
                .map(|item| {
                    item.as_integer()
                        .and_then(|i| u8::try_from(i).ok())
                        .ok_or_else(|| format!("{} is not a byte", item))
                })
                .collect::<Result<Vec<u8>, String>>()
                .map_err(invalid)?;
            DefaultValue::Blob(bytes.into())
        }
        (_, other) => return Err(invalid(format!("unexpected {}", other.type_str()))),
    };

    Ok(Entry::new(decl.key, value))
}

/// Parse a blob literal: `hex:` prefixed hex digits, otherwise the UTF-8 bytes
pub fn parse_blob_literal(literal: &str) -> Result<Vec<u8>, String> {
    match literal.strip_prefix("hex:") {
        Some(digits) => hex::decode(digits).map_err(|e| format!("invalid hex: {}", e)),
        None => Ok(literal.as_bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = r#"
[[namespace]]
name = "example"

[[namespace.entry]]
key = "i32"
type = "i32"
value = 12345

[[namespace.entry]]
key = "str"
type = "str"
value = "abcdef"

[[namespace.entry]]
key = "blob"
type = "blob"
value = "hex:616263646566"

[[namespace]]
name = "radio"

[[namespace.entry]]
key = "mac"
type = "blob"
value = [0, 27, 68, 17, 58, 183]
"#;

    #[test]
    fn test_parse_table() {
        let table = DefaultsTable::parse(TABLE).unwrap();
        assert_eq!(table.namespaces().len(), 2);
        assert_eq!(table.get_i32("example", "i32"), Some(12345));
        assert_eq!(
            table.lookup("example", "str", Encoding::Str),
            Some(&DefaultValue::Str("abcdef".into()))
        );
        assert_eq!(
            table.lookup("example", "blob", Encoding::Blob),
            Some(&DefaultValue::Blob(b"abcdef".to_vec().into()))
        );
        assert_eq!(table.get_blob("radio", "mac", None).map(|f| f.size), Some(6));
    }

    #[test]
    fn test_load_file() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", TABLE).unwrap();

        let table = DefaultsTable::load(temp.path()).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_reserved_encoding_rejected() {
        let toml = r#"
[[namespace]]
name = "app"
[[namespace.entry]]
key = "big"
type = "u64"
value = 1
"#;
        let err = DefaultsTable::parse(toml).unwrap_err();
        assert!(matches!(err, TableError::Reserved { encoding: Encoding::U64, .. }));
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let toml = r#"
[[namespace]]
name = "app"
[[namespace.entry]]
key = "ratio"
type = "float"
value = 1.5
"#;
        let err = DefaultsTable::parse(toml).unwrap_err();
        assert!(err.to_string().contains("unknown type 'float'"));
    }

    #[test]
    fn test_i32_out_of_range() {
        let toml = r#"
[[namespace]]
name = "app"
[[namespace.entry]]
key = "big"
type = "i32"
value = 4294967296
"#;
        let err = DefaultsTable::parse(toml).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_value_kind_mismatch() {
        let toml = r#"
[[namespace]]
name = "app"
[[namespace.entry]]
key = "name"
type = "str"
value = 3
"#;
        let err = DefaultsTable::parse(toml).unwrap_err();
        assert!(matches!(err, TableError::InvalidValue { .. }));
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let toml = r#"
[[namespace]]
name = "app"
[[namespace]]
name = "app"
"#;
        let err = DefaultsTable::parse(toml).unwrap_err();
        assert!(matches!(err, TableError::DuplicateNamespace(ns) if ns == "app"));
    }

    #[test]
    fn test_long_key_rejected() {
        let toml = r#"
[[namespace]]
name = "app"
[[namespace.entry]]
key = "a_key_that_is_too_long"
type = "i32"
value = 1
"#;
        let err = DefaultsTable::parse(toml).unwrap_err();
        assert!(matches!(err, TableError::InvalidName(_)));
    }

    #[test]
    fn test_parse_blob_literal() {
        assert_eq!(parse_blob_literal("abc").unwrap(), b"abc");
        assert_eq!(parse_blob_literal("hex:00ff").unwrap(), vec![0x00, 0xff]);
        assert!(parse_blob_literal("hex:zz").is_err());
    }
}
