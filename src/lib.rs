//! esp-config - two-tier configuration resolution
//!
//! Typed values (i32, string, blob) addressed by namespace and key are read
//! from a writable override store first and fall back to a defaults table
//! fixed at build time. Writes only ever touch the override store.

pub mod config;
pub mod defaults;
pub mod fetch;
pub mod resolver;
pub mod summary;

pub use esp_config_store as store;

pub use defaults::{DefaultValue, DefaultsTable, Entry, Namespace, EXAMPLE_TABLE};
pub use esp_config_store::{Encoding, FileStore, MemoryStore, OverrideStore, StoreError};
pub use fetch::{Fetch, FetchMode};
pub use resolver::{Outcome, ResolveError, Resolved, Resolver, Source, Sourced};
pub use summary::Summary;
