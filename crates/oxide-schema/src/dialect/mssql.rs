//! Microsoft SQL Server dialect.
//!
//! The full-ALTER backend: every change the engine models is expressible as
//! a direct statement, so the recreation strategy is never required here.

use crate::error::Result;
use crate::types::{split_native_type, TypeDescriptor};

use super::{quote_with, Capabilities, ChangeKind, DialectKind, ObjectKind, SqlDialect};

const DEFAULT_STRING_LENGTH: u32 = 255;
const DEFAULT_DECIMAL: (u8, u8) = (18, 6);
const DEFAULT_BINARY_LENGTH: u32 = 8000;

static CAPABILITIES: Capabilities = Capabilities {
    supports_schemas: true,
    supports_check_constraints: true,
    supports_transactional_ddl: true,
    enforces_foreign_keys_on_write: true,
    max_identifier_length: 128,
};

/// SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl SqlDialect for MssqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mssql
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn can_alter_in_place(&self, _object: ObjectKind, _change: ChangeKind) -> bool {
        true
    }

    fn quote_identifier(&self, name: &str) -> Result<String> {
        quote_with(name, '[', ']', CAPABILITIES.max_identifier_length)
    }

    fn to_native_type(&self, ty: &TypeDescriptor) -> Result<String> {
        Ok(match ty {
            TypeDescriptor::Boolean => "BIT".to_string(),
            TypeDescriptor::Int16 => "SMALLINT".to_string(),
            TypeDescriptor::Int32 => "INT".to_string(),
            TypeDescriptor::Int64 => "BIGINT".to_string(),
            TypeDescriptor::Float32 => "REAL".to_string(),
            TypeDescriptor::Float64 => "FLOAT".to_string(),
            TypeDescriptor::Decimal { precision, scale } => format!(
                "DECIMAL({},{})",
                precision.unwrap_or(DEFAULT_DECIMAL.0),
                scale.unwrap_or(DEFAULT_DECIMAL.1)
            ),
            TypeDescriptor::VarString { length, unicode } => {
                let len = length.unwrap_or(DEFAULT_STRING_LENGTH);
                if *unicode {
                    format!("NVARCHAR({len})")
                } else {
                    format!("VARCHAR({len})")
                }
            }
            TypeDescriptor::FixedString { length, unicode } => {
                if *unicode {
                    format!("NCHAR({length})")
                } else {
                    format!("CHAR({length})")
                }
            }
            TypeDescriptor::Text => "NVARCHAR(MAX)".to_string(),
            TypeDescriptor::VarBinary { length } => {
                format!("VARBINARY({})", length.unwrap_or(DEFAULT_BINARY_LENGTH))
            }
            TypeDescriptor::Blob => "VARBINARY(MAX)".to_string(),
            TypeDescriptor::Date => "DATE".to_string(),
            TypeDescriptor::Time => "TIME".to_string(),
            TypeDescriptor::DateTime => "DATETIME2".to_string(),
            TypeDescriptor::DateTimeTz => "DATETIMEOFFSET".to_string(),
            TypeDescriptor::Uuid => "UNIQUEIDENTIFIER".to_string(),
            // No native JSON type; documents are stored as Unicode text.
            TypeDescriptor::Json => "NVARCHAR(MAX)".to_string(),
        })
    }

    fn from_native_type(&self, native: &str) -> TypeDescriptor {
        let lower = native.trim().to_lowercase();
        if lower.contains("(max)") {
            return if lower.starts_with("varbinary") {
                TypeDescriptor::Blob
            } else {
                TypeDescriptor::Text
            };
        }

        let (base, first, second) = split_native_type(native);
        match base.as_str() {
            "bit" => TypeDescriptor::Boolean,
            "tinyint" | "smallint" => TypeDescriptor::Int16,
            "int" => TypeDescriptor::Int32,
            "bigint" => TypeDescriptor::Int64,
            "real" => TypeDescriptor::Float32,
            "float" => TypeDescriptor::Float64,
            "decimal" | "numeric" => TypeDescriptor::Decimal {
                precision: first.map(|p| p.min(u32::from(u8::MAX)) as u8),
                scale: second.map(|s| s.min(u32::from(u8::MAX)) as u8),
            },
            "money" => TypeDescriptor::decimal(19, 4),
            "smallmoney" => TypeDescriptor::decimal(10, 4),
            "nvarchar" => TypeDescriptor::VarString {
                length: first,
                unicode: true,
            },
            "varchar" => TypeDescriptor::VarString {
                length: first,
                unicode: false,
            },
            "nchar" => TypeDescriptor::FixedString {
                length: first.unwrap_or(1),
                unicode: true,
            },
            "char" => TypeDescriptor::FixedString {
                length: first.unwrap_or(1),
                unicode: false,
            },
            "text" | "ntext" => TypeDescriptor::Text,
            "binary" | "varbinary" => TypeDescriptor::VarBinary { length: first },
            "image" => TypeDescriptor::Blob,
            "date" => TypeDescriptor::Date,
            "time" => TypeDescriptor::Time,
            "datetime" | "datetime2" | "smalldatetime" => TypeDescriptor::DateTime,
            "datetimeoffset" => TypeDescriptor::DateTimeTz,
            "uniqueidentifier" => TypeDescriptor::Uuid,
            _ => TypeDescriptor::Text,
        }
    }

    fn auto_increment_sql(&self) -> &'static str {
        "IDENTITY(1,1)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_types() {
        let d = MssqlDialect;
        assert_eq!(
            d.to_native_type(&TypeDescriptor::varstring(100)).unwrap(),
            "NVARCHAR(100)"
        );
        assert_eq!(
            d.to_native_type(&TypeDescriptor::Text).unwrap(),
            "NVARCHAR(MAX)"
        );
        assert_eq!(
            d.to_native_type(&TypeDescriptor::Uuid).unwrap(),
            "UNIQUEIDENTIFIER"
        );
    }

    #[test]
    fn test_parse_native_types() {
        let d = MssqlDialect;
        assert_eq!(d.from_native_type("nvarchar(max)"), TypeDescriptor::Text);
        assert_eq!(d.from_native_type("varbinary(max)"), TypeDescriptor::Blob);
        assert_eq!(d.from_native_type("bit"), TypeDescriptor::Boolean);
        assert_eq!(d.from_native_type("money"), TypeDescriptor::decimal(19, 4));
    }

    #[test]
    fn test_everything_alters_in_place() {
        let d = MssqlDialect;
        assert!(d.can_alter_in_place(ObjectKind::Column, ChangeKind::AlterType));
        assert!(d.can_alter_in_place(ObjectKind::CheckConstraint, ChangeKind::Drop));
    }
}
