//! Compiled-in defaults
//!
//! The immutable last tier of resolution. A [`DefaultsTable`] is built once
//! (usually as a `static`) and handed to the resolver by reference.

mod example;
mod loader;
mod table;
mod value;

pub use example::EXAMPLE_TABLE;
pub use loader::{parse_blob_literal, TableError};
pub use table::DefaultsTable;
pub use value::{DefaultValue, Entry, Namespace};
