//! Database dialect implementations.
//!
//! A dialect bundles three things: a static [`Capabilities`] record, the
//! identifier/literal formatting rules, and the bidirectional type catalog
//! between [`TypeDescriptor`]s and native column type strings. Everything
//! here is pure: no I/O, no connection, no state beyond static facts.

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::model::{Column, DefaultValue};
use crate::types::TypeDescriptor;

/// Kinds of schema objects the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A table.
    Table,
    /// A column of an existing table.
    Column,
    /// A secondary index.
    Index,
    /// A primary key constraint.
    PrimaryKey,
    /// A foreign key constraint.
    ForeignKey,
    /// A unique constraint.
    UniqueConstraint,
    /// A check constraint.
    CheckConstraint,
    /// A default constraint.
    DefaultConstraint,
    /// A view.
    View,
}

/// Kinds of changes that can be requested against a schema object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Add the object (a nullable or defaulted column, an index, ...).
    Add,
    /// Add a non-nullable column to an existing table.
    AddRequired,
    /// Drop the object.
    Drop,
    /// Rename the object.
    Rename,
    /// Change a column's data type.
    AlterType,
    /// Change a column's nullability.
    AlterNullability,
    /// Change a column's default.
    AlterDefault,
}

/// Static facts about a backend, consulted to decide between an in-place
/// ALTER and a full table recreation. One immutable instance per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether the backend has schemas/namespaces for objects.
    pub supports_schemas: bool,
    /// Whether CHECK constraints are supported at all.
    pub supports_check_constraints: bool,
    /// Whether DDL participates in transactions and can be rolled back.
    pub supports_transactional_ddl: bool,
    /// Whether foreign keys are enforced at write time (and therefore need
    /// to be deferred or disabled around a table rebuild).
    pub enforces_foreign_keys_on_write: bool,
    /// Maximum identifier length accepted by the backend.
    pub max_identifier_length: usize,
}

/// Identifies one of the supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialectKind {
    /// SQLite.
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    Mysql,
    /// Microsoft SQL Server.
    Mssql,
}

impl DialectKind {
    /// Returns the dialect name as used in native type override maps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
        }
    }
}

/// Returns the dialect implementation for the given kind.
#[must_use]
pub fn dialect_for(kind: DialectKind) -> &'static dyn SqlDialect {
    match kind {
        DialectKind::Sqlite => &SqliteDialect,
        DialectKind::Postgres => &PostgresDialect,
        DialectKind::Mysql => &MysqlDialect,
        DialectKind::Mssql => &MssqlDialect,
    }
}

/// A backend's SQL syntax and capability set.
pub trait SqlDialect: Send + Sync {
    /// Returns the dialect kind.
    fn kind(&self) -> DialectKind;

    /// Returns the dialect name.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the static capability record.
    fn capabilities(&self) -> &'static Capabilities;

    /// Returns whether the given change can be expressed as a direct ALTER
    /// (or equivalent single statement) instead of a table recreation.
    fn can_alter_in_place(&self, object: ObjectKind, change: ChangeKind) -> bool;

    /// Quotes an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedIdentifier`] for empty identifiers,
    /// identifiers containing NUL bytes, or identifiers exceeding the
    /// dialect's maximum length.
    fn quote_identifier(&self, name: &str) -> Result<String>;

    /// Quotes a string literal, doubling embedded quotes.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Renders a typed default value as SQL text.
    fn format_default(&self, value: &DefaultValue) -> Option<String> {
        match value {
            DefaultValue::None => None,
            DefaultValue::Null => Some("NULL".to_string()),
            DefaultValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            DefaultValue::Integer(i) => Some(i.to_string()),
            DefaultValue::Float(f) => Some(f.to_string()),
            DefaultValue::String(s) => Some(self.quote_literal(s)),
            DefaultValue::Expression(expr) => Some(expr.clone()),
        }
    }

    /// Maps a type descriptor to this dialect's native column type string.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::TypeMapping`] when the descriptor has no
    /// representation for this dialect.
    fn to_native_type(&self, ty: &TypeDescriptor) -> Result<String>;

    /// Parses a native column type string back into a descriptor.
    ///
    /// Unknown types map to [`TypeDescriptor::Text`] so introspection never
    /// fails on exotic columns.
    fn from_native_type(&self, native: &str) -> TypeDescriptor;

    /// Returns the native column type for `column`, honouring any override.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::TypeMapping`] when a per-dialect override map
    /// has no entry for this dialect, or the descriptor itself cannot be
    /// mapped.
    fn column_native_type(&self, column: &Column) -> Result<String> {
        if let Some(over) = &column.native_override {
            return over.resolve(self.name()).map(str::to_string).ok_or_else(|| {
                SchemaError::TypeMapping {
                    dialect: self.name(),
                    column: column.name.clone(),
                    message: "native type override has no entry for this dialect".to_string(),
                }
            });
        }
        self.to_native_type(&column.ty)
    }

    /// Returns the clause marking a column as auto-incrementing.
    fn auto_increment_sql(&self) -> &'static str;

    /// Returns the statement disabling write-time foreign key enforcement,
    /// if this dialect needs one around a table rebuild.
    fn disable_foreign_keys_sql(&self) -> Option<&'static str> {
        None
    }

    /// Returns the statement re-enabling write-time foreign key enforcement.
    fn enable_foreign_keys_sql(&self) -> Option<&'static str> {
        None
    }
}

/// Validates an identifier against the dialect-independent rules, then
/// quotes it with the given delimiters, doubling the closing delimiter.
pub(crate) fn quote_with(
    name: &str,
    open: char,
    close: char,
    max_len: usize,
) -> Result<String> {
    if name.is_empty() {
        return Err(SchemaError::MalformedIdentifier {
            name: name.to_string(),
            message: "identifier is empty".to_string(),
        });
    }
    if name.contains('\0') {
        return Err(SchemaError::MalformedIdentifier {
            name: name.to_string(),
            message: "identifier contains a NUL byte".to_string(),
        });
    }
    if name.len() > max_len {
        return Err(SchemaError::MalformedIdentifier {
            name: name.to_string(),
            message: format!("identifier exceeds {max_len} bytes"),
        });
    }
    let escaped = name.replace(close, &format!("{close}{close}"));
    Ok(format!("{open}{escaped}{close}"))
}

/// Quotes `schema.name`, or just `name` when no schema applies.
///
/// # Errors
///
/// Propagates [`SchemaError::MalformedIdentifier`] from either part.
pub fn qualified_name(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    name: &str,
) -> Result<String> {
    let quoted = dialect.quote_identifier(name)?;
    match schema {
        Some(s) if dialect.capabilities().supports_schemas => {
            Ok(format!("{}.{}", dialect.quote_identifier(s)?, quoted))
        }
        _ => Ok(quoted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SemanticClass;

    fn all_dialects() -> [&'static dyn SqlDialect; 4] {
        [
            dialect_for(DialectKind::Sqlite),
            dialect_for(DialectKind::Postgres),
            dialect_for(DialectKind::Mysql),
            dialect_for(DialectKind::Mssql),
        ]
    }

    fn all_descriptors() -> Vec<TypeDescriptor> {
        vec![
            TypeDescriptor::Boolean,
            TypeDescriptor::Int16,
            TypeDescriptor::Int32,
            TypeDescriptor::Int64,
            TypeDescriptor::Float32,
            TypeDescriptor::Float64,
            TypeDescriptor::Decimal {
                precision: None,
                scale: None,
            },
            TypeDescriptor::decimal(10, 2),
            TypeDescriptor::VarString {
                length: None,
                unicode: true,
            },
            TypeDescriptor::varstring(255),
            TypeDescriptor::FixedString {
                length: 8,
                unicode: false,
            },
            TypeDescriptor::Text,
            TypeDescriptor::VarBinary { length: Some(64) },
            TypeDescriptor::VarBinary { length: None },
            TypeDescriptor::Blob,
            TypeDescriptor::Date,
            TypeDescriptor::Time,
            TypeDescriptor::DateTime,
            TypeDescriptor::DateTimeTz,
            TypeDescriptor::Uuid,
            TypeDescriptor::Json,
        ]
    }

    #[test]
    fn test_round_trip_preserves_semantic_class() {
        for dialect in all_dialects() {
            for descriptor in all_descriptors() {
                let native = dialect.to_native_type(&descriptor).unwrap();
                let back = dialect.from_native_type(&native);
                assert_eq!(
                    back.semantic_class(),
                    descriptor.semantic_class(),
                    "{} mapped {descriptor:?} -> {native} -> {back:?}",
                    dialect.name()
                );
            }
        }
    }

    #[test]
    fn test_unknown_native_type_is_text() {
        for dialect in all_dialects() {
            assert_eq!(
                dialect.from_native_type("frobnicator").semantic_class(),
                SemanticClass::VarChar
            );
        }
    }

    #[test]
    fn test_quoting_rules() {
        let sqlite = dialect_for(DialectKind::Sqlite);
        let mysql = dialect_for(DialectKind::Mysql);
        let mssql = dialect_for(DialectKind::Mssql);
        assert_eq!(sqlite.quote_identifier("orders").unwrap(), "\"orders\"");
        assert_eq!(
            sqlite.quote_identifier("or\"ders").unwrap(),
            "\"or\"\"ders\""
        );
        assert_eq!(mysql.quote_identifier("orders").unwrap(), "`orders`");
        assert_eq!(mysql.quote_identifier("or`ders").unwrap(), "`or``ders`");
        assert_eq!(mssql.quote_identifier("orders").unwrap(), "[orders]");
        assert_eq!(mssql.quote_identifier("or]ders").unwrap(), "[or]]ders]");
    }

    #[test]
    fn test_malformed_identifiers_rejected() {
        for dialect in all_dialects() {
            assert!(dialect.quote_identifier("").is_err());
            assert!(dialect.quote_identifier("a\0b").is_err());
            let long = "x".repeat(dialect.capabilities().max_identifier_length + 1);
            assert!(dialect.quote_identifier(&long).is_err());
        }
    }

    #[test]
    fn test_qualified_name_respects_schema_support() {
        let pg = dialect_for(DialectKind::Postgres);
        let sqlite = dialect_for(DialectKind::Sqlite);
        assert_eq!(
            qualified_name(pg, Some("sales"), "orders").unwrap(),
            "\"sales\".\"orders\""
        );
        assert_eq!(
            qualified_name(sqlite, Some("sales"), "orders").unwrap(),
            "\"orders\""
        );
    }

    #[test]
    fn test_capability_split() {
        let mssql = dialect_for(DialectKind::Mssql);
        let sqlite = dialect_for(DialectKind::Sqlite);
        assert!(mssql.can_alter_in_place(ObjectKind::Column, ChangeKind::AlterType));
        assert!(!sqlite.can_alter_in_place(ObjectKind::Column, ChangeKind::AlterType));
        assert!(sqlite.can_alter_in_place(ObjectKind::Column, ChangeKind::Rename));
        assert!(!sqlite.can_alter_in_place(ObjectKind::ForeignKey, ChangeKind::Add));
        assert!(sqlite.can_alter_in_place(ObjectKind::Index, ChangeKind::Add));
    }

    #[test]
    fn test_default_formatting_per_dialect() {
        let pg = dialect_for(DialectKind::Postgres);
        let sqlite = dialect_for(DialectKind::Sqlite);
        assert_eq!(
            pg.format_default(&DefaultValue::Bool(true)),
            Some("TRUE".to_string())
        );
        assert_eq!(
            sqlite.format_default(&DefaultValue::Bool(true)),
            Some("1".to_string())
        );
        assert_eq!(
            sqlite.format_default(&DefaultValue::String("it's".to_string())),
            Some("'it''s'".to_string())
        );
        assert_eq!(sqlite.format_default(&DefaultValue::None), None);
    }
}
