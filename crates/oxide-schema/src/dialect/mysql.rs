//! MySQL dialect.
//!
//! Modeled on MySQL 5.7: most column changes are a single `ALTER TABLE ...
//! MODIFY`, but CHECK constraints are parsed and silently ignored by the
//! server, so they are unsupported here, and dropping a primary key that
//! contains an auto-increment column is not expressible in place.

use crate::error::Result;
use crate::types::{split_native_type, TypeDescriptor};

use super::{quote_with, Capabilities, ChangeKind, DialectKind, ObjectKind, SqlDialect};

const DEFAULT_STRING_LENGTH: u32 = 255;
const DEFAULT_DECIMAL: (u8, u8) = (18, 6);
const DEFAULT_BINARY_LENGTH: u32 = 255;

static CAPABILITIES: Capabilities = Capabilities {
    supports_schemas: true,
    supports_check_constraints: false,
    supports_transactional_ddl: false,
    enforces_foreign_keys_on_write: true,
    max_identifier_length: 64,
};

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl SqlDialect for MysqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn can_alter_in_place(&self, object: ObjectKind, change: ChangeKind) -> bool {
        match object {
            ObjectKind::CheckConstraint => false,
            ObjectKind::PrimaryKey => change == ChangeKind::Add,
            _ => true,
        }
    }

    fn quote_identifier(&self, name: &str) -> Result<String> {
        quote_with(name, '`', '`', CAPABILITIES.max_identifier_length)
    }

    fn to_native_type(&self, ty: &TypeDescriptor) -> Result<String> {
        Ok(match ty {
            TypeDescriptor::Boolean => "TINYINT(1)".to_string(),
            TypeDescriptor::Int16 => "SMALLINT".to_string(),
            TypeDescriptor::Int32 => "INT".to_string(),
            TypeDescriptor::Int64 => "BIGINT".to_string(),
            TypeDescriptor::Float32 => "FLOAT".to_string(),
            TypeDescriptor::Float64 => "DOUBLE".to_string(),
            TypeDescriptor::Decimal { precision, scale } => format!(
                "DECIMAL({},{})",
                precision.unwrap_or(DEFAULT_DECIMAL.0),
                scale.unwrap_or(DEFAULT_DECIMAL.1)
            ),
            TypeDescriptor::VarString { length, .. } => {
                format!("VARCHAR({})", length.unwrap_or(DEFAULT_STRING_LENGTH))
            }
            TypeDescriptor::FixedString { length, .. } => format!("CHAR({length})"),
            TypeDescriptor::Text => "LONGTEXT".to_string(),
            TypeDescriptor::VarBinary { length } => {
                format!("VARBINARY({})", length.unwrap_or(DEFAULT_BINARY_LENGTH))
            }
            TypeDescriptor::Blob => "LONGBLOB".to_string(),
            TypeDescriptor::Date => "DATE".to_string(),
            TypeDescriptor::Time => "TIME".to_string(),
            // Timezone offsets are not representable; store as UTC.
            TypeDescriptor::DateTime | TypeDescriptor::DateTimeTz => "DATETIME".to_string(),
            TypeDescriptor::Uuid => "CHAR(36)".to_string(),
            TypeDescriptor::Json => "JSON".to_string(),
        })
    }

    fn from_native_type(&self, native: &str) -> TypeDescriptor {
        let (base, first, second) = split_native_type(native);
        match base.as_str() {
            "tinyint" if first == Some(1) => TypeDescriptor::Boolean,
            "bool" | "boolean" => TypeDescriptor::Boolean,
            "smallint" | "tinyint" => TypeDescriptor::Int16,
            "int" | "integer" | "mediumint" => TypeDescriptor::Int32,
            "bigint" => TypeDescriptor::Int64,
            "float" => TypeDescriptor::Float32,
            "double" | "double precision" | "real" => TypeDescriptor::Float64,
            "decimal" | "numeric" | "dec" | "fixed" => TypeDescriptor::Decimal {
                precision: first.map(|p| p.min(u32::from(u8::MAX)) as u8),
                scale: second.map(|s| s.min(u32::from(u8::MAX)) as u8),
            },
            "varchar" => TypeDescriptor::VarString {
                length: first,
                unicode: true,
            },
            "char" => TypeDescriptor::FixedString {
                length: first.unwrap_or(1),
                unicode: true,
            },
            "tinytext" | "text" | "mediumtext" | "longtext" => TypeDescriptor::Text,
            "varbinary" => TypeDescriptor::VarBinary { length: first },
            "binary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => TypeDescriptor::Blob,
            "date" => TypeDescriptor::Date,
            "time" => TypeDescriptor::Time,
            "datetime" | "timestamp" => TypeDescriptor::DateTime,
            "json" => TypeDescriptor::Json,
            _ => TypeDescriptor::Text,
        }
    }

    fn auto_increment_sql(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn disable_foreign_keys_sql(&self) -> Option<&'static str> {
        Some("SET FOREIGN_KEY_CHECKS = 0")
    }

    fn enable_foreign_keys_sql(&self) -> Option<&'static str> {
        Some("SET FOREIGN_KEY_CHECKS = 1")
    }
}
