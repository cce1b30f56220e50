//! Built-in example table
//!
//! One namespace showing each implemented encoding. Applications declare
//! their own table the same way.

use super::table::DefaultsTable;
use super::value::{Entry, Namespace};

const EXAMPLE_ENTRIES: &[Entry] = &[
    Entry::i32("i32", 12345),
    Entry::str("str", "abcdef"),
    Entry::blob("blob", b"abcdef"),
];

const EXAMPLE_NAMESPACES: &[Namespace] = &[Namespace::from_static("example", EXAMPLE_ENTRIES)];

/// Defaults used when no table is configured
pub static EXAMPLE_TABLE: DefaultsTable = DefaultsTable::from_static(EXAMPLE_NAMESPACES);
