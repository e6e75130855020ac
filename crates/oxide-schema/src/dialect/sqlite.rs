//! SQLite dialect.
//!
//! SQLite has almost no in-place ALTER support: columns can be added (when
//! nullable or defaulted) and renamed natively, tables and indexes can be
//! created, dropped and renamed, and everything else requires the table
//! recreation strategy. Declared column types are stored verbatim, which is
//! what lets the type catalog round-trip through introspection.

use crate::error::{Result, SchemaError};
use crate::model::Column;
use crate::types::{split_native_type, TypeDescriptor};

use super::{quote_with, Capabilities, ChangeKind, DialectKind, ObjectKind, SqlDialect};

/// Default length for variable strings with no explicit length.
const DEFAULT_STRING_LENGTH: u32 = 255;
/// Default precision/scale for decimals with no explicit facets.
const DEFAULT_DECIMAL: (u8, u8) = (18, 6);

static CAPABILITIES: Capabilities = Capabilities {
    supports_schemas: false,
    supports_check_constraints: true,
    supports_transactional_ddl: true,
    enforces_foreign_keys_on_write: true,
    max_identifier_length: 128,
};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn can_alter_in_place(&self, object: ObjectKind, change: ChangeKind) -> bool {
        match object {
            ObjectKind::Table | ObjectKind::View => true,
            ObjectKind::Index => matches!(change, ChangeKind::Add | ChangeKind::Drop),
            ObjectKind::Column => matches!(change, ChangeKind::Add | ChangeKind::Rename),
            // Unique constraints are expressed as unique indexes.
            ObjectKind::UniqueConstraint => matches!(change, ChangeKind::Add | ChangeKind::Drop),
            ObjectKind::PrimaryKey
            | ObjectKind::ForeignKey
            | ObjectKind::CheckConstraint
            | ObjectKind::DefaultConstraint => false,
        }
    }

    fn quote_identifier(&self, name: &str) -> Result<String> {
        quote_with(name, '"', '"', CAPABILITIES.max_identifier_length)
    }

    fn to_native_type(&self, ty: &TypeDescriptor) -> Result<String> {
        Ok(match ty {
            TypeDescriptor::Boolean => "BOOLEAN".to_string(),
            TypeDescriptor::Int16 => "SMALLINT".to_string(),
            TypeDescriptor::Int32 => "INTEGER".to_string(),
            TypeDescriptor::Int64 => "BIGINT".to_string(),
            TypeDescriptor::Float32 => "REAL".to_string(),
            TypeDescriptor::Float64 => "DOUBLE".to_string(),
            TypeDescriptor::Decimal { precision, scale } => format!(
                "NUMERIC({},{})",
                precision.unwrap_or(DEFAULT_DECIMAL.0),
                scale.unwrap_or(DEFAULT_DECIMAL.1)
            ),
            TypeDescriptor::VarString { length, .. } => {
                format!("VARCHAR({})", length.unwrap_or(DEFAULT_STRING_LENGTH))
            }
            TypeDescriptor::FixedString { length, .. } => format!("CHAR({length})"),
            TypeDescriptor::Text => "TEXT".to_string(),
            // Length is not enforceable; all binary data is a BLOB.
            TypeDescriptor::VarBinary { .. } | TypeDescriptor::Blob => "BLOB".to_string(),
            TypeDescriptor::Date => "DATE".to_string(),
            TypeDescriptor::Time => "TIME".to_string(),
            TypeDescriptor::DateTime | TypeDescriptor::DateTimeTz => "DATETIME".to_string(),
            TypeDescriptor::Uuid => "UUID".to_string(),
            TypeDescriptor::Json => "JSON".to_string(),
        })
    }

    fn from_native_type(&self, native: &str) -> TypeDescriptor {
        let (base, first, second) = split_native_type(native);
        match base.as_str() {
            "boolean" | "bool" => TypeDescriptor::Boolean,
            "smallint" => TypeDescriptor::Int16,
            "int" | "integer" | "mediumint" | "tinyint" => TypeDescriptor::Int32,
            "bigint" => TypeDescriptor::Int64,
            "real" | "float" => TypeDescriptor::Float32,
            "double" | "double precision" => TypeDescriptor::Float64,
            "numeric" | "decimal" => TypeDescriptor::Decimal {
                precision: first.map(|p| p.min(u32::from(u8::MAX)) as u8),
                scale: second.map(|s| s.min(u32::from(u8::MAX)) as u8),
            },
            "varchar" | "nvarchar" | "character varying" => TypeDescriptor::VarString {
                length: first,
                unicode: true,
            },
            "char" | "nchar" | "character" => TypeDescriptor::FixedString {
                length: first.unwrap_or(1),
                unicode: true,
            },
            "blob" | "binary" | "varbinary" => TypeDescriptor::Blob,
            "date" => TypeDescriptor::Date,
            "time" => TypeDescriptor::Time,
            "datetime" | "timestamp" => TypeDescriptor::DateTime,
            "uuid" => TypeDescriptor::Uuid,
            "json" | "jsonb" => TypeDescriptor::Json,
            _ => TypeDescriptor::Text,
        }
    }

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
        // Rowid aliasing requires the exact INTEGER type name.
        if column.auto_increment {
            return Ok("INTEGER".to_string());
        }
        self.to_native_type(&column.ty)
    }

    fn auto_increment_sql(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn disable_foreign_keys_sql(&self) -> Option<&'static str> {
        Some("PRAGMA foreign_keys = OFF")
    }

    fn enable_foreign_keys_sql(&self) -> Option<&'static str> {
        Some("PRAGMA foreign_keys = ON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_types() {
        let d = SqliteDialect;
        assert_eq!(
            d.to_native_type(&TypeDescriptor::varstring(80)).unwrap(),
            "VARCHAR(80)"
        );
        assert_eq!(
            d.to_native_type(&TypeDescriptor::VarString {
                length: None,
                unicode: true
            })
            .unwrap(),
            "VARCHAR(255)"
        );
        assert_eq!(
            d.to_native_type(&TypeDescriptor::decimal(10, 2)).unwrap(),
            "NUMERIC(10,2)"
        );
        assert_eq!(d.to_native_type(&TypeDescriptor::Uuid).unwrap(), "UUID");
    }

    #[test]
    fn test_parse_native_types() {
        let d = SqliteDialect;
        assert_eq!(d.from_native_type("VARCHAR(80)"), TypeDescriptor::varstring(80));
        assert_eq!(
            d.from_native_type("NUMERIC(10,2)"),
            TypeDescriptor::decimal(10, 2)
        );
        assert_eq!(d.from_native_type("BLOB"), TypeDescriptor::Blob);
        assert_eq!(d.from_native_type(""), TypeDescriptor::Text);
    }

    #[test]
    fn test_auto_increment_forces_integer() {
        let d = SqliteDialect;
        let col = Column::new("id", TypeDescriptor::Int64)
            .primary_key()
            .auto_increment();
        assert_eq!(d.column_native_type(&col).unwrap(), "INTEGER");
    }

    #[test]
    fn test_override_wins() {
        let d = SqliteDialect;
        let col = Column::new("payload", TypeDescriptor::Json).native_type("{sqlite:TEXT}");
        assert_eq!(d.column_native_type(&col).unwrap(), "TEXT");
    }

    #[test]
    fn test_override_without_entry_fails() {
        let d = SqliteDialect;
        let col = Column::new("payload", TypeDescriptor::Json).native_type("{postgres:JSONB}");
        assert!(d.column_native_type(&col).is_err());
    }
}
