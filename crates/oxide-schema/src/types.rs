//! Host type descriptors.
//!
//! A [`TypeDescriptor`] names a column type in host terms, independent of any
//! database dialect. Each dialect maps descriptors to its native column type
//! strings and back; the mapping is stable rather than bijective: a round
//! trip through a dialect may change the exact descriptor (lengths get
//! defaulted, timezone awareness may be dropped) but never its
//! [`SemanticClass`].

use serde::{Deserialize, Serialize};

/// A dialect-independent description of a column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDescriptor {
    /// True/false.
    Boolean,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Single-precision floating point.
    Float32,
    /// Double-precision floating point.
    Float64,
    /// Exact decimal. Unspecified precision/scale fall back to the dialect's
    /// documented defaults.
    Decimal {
        /// Total number of digits.
        precision: Option<u8>,
        /// Digits to the right of the decimal point.
        scale: Option<u8>,
    },
    /// Variable-length character string. An unspecified length maps to each
    /// dialect's documented bounded default, never to "unlimited".
    VarString {
        /// Maximum length in characters.
        length: Option<u32>,
        /// Whether the column must hold full Unicode text.
        unicode: bool,
    },
    /// Fixed-length character string.
    FixedString {
        /// Exact length in characters.
        length: u32,
        /// Whether the column must hold full Unicode text.
        unicode: bool,
    },
    /// Unbounded character data.
    Text,
    /// Variable-length binary data.
    VarBinary {
        /// Maximum length in bytes.
        length: Option<u32>,
    },
    /// Unbounded binary data.
    Blob,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time without timezone.
    DateTime,
    /// Date and time with timezone offset.
    DateTimeTz,
    /// Universally unique identifier.
    Uuid,
    /// JSON document.
    Json,
}

/// Coarse grouping of descriptors used to state the round-trip guarantee.
///
/// Two descriptors in the same class are interchangeable for storage
/// purposes: a variable-length string stays a variable-length string, a
/// UUID comes back as a fixed-width character token on engines without a
/// native UUID type, and a JSON document comes back as character data on
/// engines without a native JSON type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticClass {
    /// True/false.
    Boolean,
    /// Signed integers of any width.
    Integer,
    /// Binary floating point of any width.
    Float,
    /// Exact decimals.
    Decimal,
    /// Variable-length character data, bounded or not, including JSON
    /// documents on engines that store them as text.
    VarChar,
    /// Fixed-width character data, including UUIDs on engines that store
    /// them as `CHAR(36)`.
    FixedChar,
    /// Binary data, bounded or not.
    Binary,
    /// Calendar dates.
    Date,
    /// Times of day.
    Time,
    /// Points in time, with or without timezone.
    DateTime,
}

impl TypeDescriptor {
    /// Shorthand for a variable-length Unicode string of the given length.
    #[must_use]
    pub const fn varstring(length: u32) -> Self {
        Self::VarString {
            length: Some(length),
            unicode: true,
        }
    }

    /// Shorthand for a decimal with explicit precision and scale.
    #[must_use]
    pub const fn decimal(precision: u8, scale: u8) -> Self {
        Self::Decimal {
            precision: Some(precision),
            scale: Some(scale),
        }
    }

    /// Returns the semantic class of this descriptor.
    #[must_use]
    pub const fn semantic_class(&self) -> SemanticClass {
        match self {
            Self::Boolean => SemanticClass::Boolean,
            Self::Int16 | Self::Int32 | Self::Int64 => SemanticClass::Integer,
            Self::Float32 | Self::Float64 => SemanticClass::Float,
            Self::Decimal { .. } => SemanticClass::Decimal,
            Self::VarString { .. } | Self::Text | Self::Json => SemanticClass::VarChar,
            Self::FixedString { .. } | Self::Uuid => SemanticClass::FixedChar,
            Self::VarBinary { .. } | Self::Blob => SemanticClass::Binary,
            Self::Date => SemanticClass::Date,
            Self::Time => SemanticClass::Time,
            Self::DateTime | Self::DateTimeTz => SemanticClass::DateTime,
        }
    }

    /// Returns true if this descriptor can hold values of `other` without
    /// narrowing (same semantic class).
    #[must_use]
    pub fn same_class(&self, other: &Self) -> bool {
        self.semantic_class() == other.semantic_class()
    }
}

/// A caller-supplied override of the native column type.
///
/// The textual form is either a plain type token, which applies to every
/// dialect, or a `{dialect:token,dialect:token,...}` map. A map without an
/// entry for the active dialect resolves to nothing and the mapping fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeTypeOverride {
    /// One type token used for every dialect.
    Plain(String),
    /// Per-dialect type tokens, keyed by dialect name.
    PerDialect(Vec<(String, String)>),
}

impl NativeTypeOverride {
    /// Parses the textual override form.
    ///
    /// `{sqlite:TEXT, postgres:JSONB}` becomes a per-dialect map; anything
    /// not wrapped in braces is a plain token.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let Some(body) = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        else {
            return Self::Plain(trimmed.to_string());
        };

        let mut entries = Vec::new();
        for part in split_top_level(body) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.split_once(':') {
                Some((dialect, token)) => entries
                    .push((dialect.trim().to_lowercase(), token.trim().to_string())),
                None => entries.push((String::new(), part.to_string())),
            }
        }
        Self::PerDialect(entries)
    }

    /// Resolves the override for the given dialect name.
    ///
    /// Returns `None` when a per-dialect map has no entry for `dialect`.
    #[must_use]
    pub fn resolve(&self, dialect: &str) -> Option<&str> {
        match self {
            Self::Plain(token) => Some(token.as_str()),
            Self::PerDialect(entries) => entries
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(dialect))
                .map(|(_, token)| token.as_str()),
        }
    }
}

/// Splits `body` on commas that are not nested inside parentheses, so
/// `mysql:DECIMAL(10,2),sqlite:NUMERIC` yields two entries.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Splits a native type string like `VARCHAR(255)` or `NUMERIC(18,6)` into
/// its base name and up to two numeric arguments.
///
/// The base name is lowercased; whitespace around every part is ignored.
/// Malformed argument lists yield the whole string as the base name so the
/// caller can fall back to a conservative mapping.
#[must_use]
pub fn split_native_type(native: &str) -> (String, Option<u32>, Option<u32>) {
    let trimmed = native.trim();
    let Some(open) = trimmed.find('(') else {
        return (trimmed.to_lowercase(), None, None);
    };
    let Some(rest) = trimmed[open + 1..].strip_suffix(')') else {
        return (trimmed.to_lowercase(), None, None);
    };

    let base = trimmed[..open].trim().to_lowercase();
    let mut args = rest.split(',').map(str::trim);
    let first = args.next().and_then(|a| a.parse::<u32>().ok());
    let second = args.next().and_then(|a| a.parse::<u32>().ok());
    (base, first, second)
}
