//! Defaults table lookup
//!
//! Lookup is a linear scan: namespaces by exact name, then that namespace's
//! entries by exact key and encoding. The first match in declaration order
//! wins, including when the table holds duplicate triples.

use std::borrow::Cow;

use esp_config_store::{copy_blob, copy_str, Encoding};

use super::value::{DefaultValue, Entry, Namespace};
use crate::fetch::Fetch;

/// Immutable table of compiled-in defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultsTable {
    namespaces: Cow<'static, [Namespace]>,
}

impl DefaultsTable {
    pub const fn from_static(namespaces: &'static [Namespace]) -> Self {
        Self {
            namespaces: Cow::Borrowed(namespaces),
        }
    }

    pub fn new(namespaces: Vec<Namespace>) -> Self {
        Self {
            namespaces: Cow::Owned(namespaces),
        }
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.entries().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (namespace, entry) pair in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&Namespace, &Entry)> {
        self.namespaces
            .iter()
            .flat_map(|ns| ns.entries().iter().map(move |entry| (ns, entry)))
    }

    /// Find the default for (namespace, key, encoding).
    ///
    /// A key declared under a different encoding does not match.
    pub fn lookup(&self, namespace: &str, key: &str, encoding: Encoding) -> Option<&DefaultValue> {
        self.namespaces
            .iter()
            .filter(|ns| ns.name() == namespace)
            .find_map(|ns| ns.find(key, encoding))
            .map(Entry::value)
    }

    pub fn get_i32(&self, namespace: &str, key: &str) -> Option<i32> {
        self.lookup(namespace, key, Encoding::I32)
            .and_then(DefaultValue::as_i32)
    }

    /// Size query (`dest` = None) or bounded string copy into `dest`
    pub fn get_str(&self, namespace: &str, key: &str, dest: Option<&mut [u8]>) -> Option<Fetch> {
        let bytes = self.lookup(namespace, key, Encoding::Str)?.as_bytes()?;
        Some(match dest {
            None => Fetch::size_query(bytes.len()),
            Some(dest) => {
                copy_str(bytes, dest);
                Fetch::buffered(bytes.len(), dest.len())
            }
        })
    }

    /// Size query (`dest` = None) or blob copy into `dest`.
    ///
    /// A destination shorter than the blob receives a truncated prefix; the
    /// returned [`Fetch`] reports it.
    pub fn get_blob(&self, namespace: &str, key: &str, dest: Option<&mut [u8]>) -> Option<Fetch> {
        let bytes = self.lookup(namespace, key, Encoding::Blob)?.as_bytes()?;
        Some(match dest {
            None => Fetch::size_query(bytes.len()),
            Some(dest) => {
                copy_blob(bytes, dest);
                Fetch::buffered(bytes.len(), dest.len())
            }
        })
    }

    /// (namespace, key, encoding) triples declared more than once.
    ///
    /// Only the first declaration is ever returned by [`lookup`](Self::lookup).
    pub fn duplicates(&self) -> Vec<(String, String, Encoding)> {
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for (ns, entry) in self.iter() {
            let triple = (ns.name(), entry.key(), entry.encoding());
            if !seen.insert(triple) {
                dupes.push((ns.name().to_string(), entry.key().to_string(), entry.encoding()));
            }
        }
        dupes
    }
}
