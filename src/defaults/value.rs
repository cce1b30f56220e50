//! Default values, entries and namespaces
//!
//! Everything here can be built in `const` context, so a table of defaults
//! can live in a `static` and cost nothing at startup.

use std::borrow::Cow;

use esp_config_store::Encoding;

/// A default payload. The variant is the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    I32(i32),
    Str(Cow<'static, str>),
    Blob(Cow<'static, [u8]>),
}

impl DefaultValue {
    pub fn encoding(&self) -> Encoding {
        match self {
            DefaultValue::I32(_) => Encoding::I32,
            DefaultValue::Str(_) => Encoding::Str,
            DefaultValue::Blob(_) => Encoding::Blob,
        }
    }

    /// Byte length of the payload.
    ///
    /// Strings report their UTF-8 length without any terminator.
    pub fn size(&self) -> usize {
        match self {
            DefaultValue::I32(_) => std::mem::size_of::<i32>(),
            DefaultValue::Str(s) => s.len(),
            DefaultValue::Blob(b) => b.len(),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            DefaultValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DefaultValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a string or blob payload
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DefaultValue::Str(s) => Some(s.as_bytes()),
            DefaultValue::Blob(b) => Some(b),
            DefaultValue::I32(_) => None,
        }
    }
}

/// One key of a namespace with its default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: Cow<'static, str>,
    value: DefaultValue,
}

impl Entry {
    pub const fn i32(key: &'static str, value: i32) -> Self {
        Self {
            key: Cow::Borrowed(key),
            value: DefaultValue::I32(value),
        }
    }

    pub const fn str(key: &'static str, value: &'static str) -> Self {
        Self {
            key: Cow::Borrowed(key),
            value: DefaultValue::Str(Cow::Borrowed(value)),
        }
    }

    pub const fn blob(key: &'static str, value: &'static [u8]) -> Self {
        Self {
            key: Cow::Borrowed(key),
            value: DefaultValue::Blob(Cow::Borrowed(value)),
        }
    }

    pub fn new(key: impl Into<Cow<'static, str>>, value: DefaultValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &DefaultValue {
        &self.value
    }

    pub fn encoding(&self) -> Encoding {
        self.value.encoding()
    }
}

/// A named group of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    name: Cow<'static, str>,
    entries: Cow<'static, [Entry]>,
}

impl Namespace {
    pub const fn from_static(name: &'static str, entries: &'static [Entry]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            entries: Cow::Borrowed(entries),
        }
    }

    pub fn new(name: impl Into<Cow<'static, str>>, entries: Vec<Entry>) -> Self {
        Self {
            name: name.into(),
            entries: Cow::Owned(entries),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// First entry matching both key and encoding
    pub fn find(&self, key: &str, encoding: Encoding) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.key() == key && e.encoding() == encoding)
    }
}
