//! PostgreSQL dialect.
//!
//! PostgreSQL covers nearly every change with a direct ALTER. The one gap
//! this model keeps is changing a column's data type: the general case has
//! no implicit cast and needs a rewrite, so it is routed through the table
//! recreation strategy instead of guessing a `USING` clause.

use crate::error::Result;
use crate::model::DefaultValue;
use crate::types::{split_native_type, TypeDescriptor};

use super::{quote_with, Capabilities, ChangeKind, DialectKind, ObjectKind, SqlDialect};

const DEFAULT_STRING_LENGTH: u32 = 255;
const DEFAULT_DECIMAL: (u8, u8) = (18, 6);

static CAPABILITIES: Capabilities = Capabilities {
    supports_schemas: true,
    supports_check_constraints: true,
    supports_transactional_ddl: true,
    enforces_foreign_keys_on_write: true,
    max_identifier_length: 63,
};

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn can_alter_in_place(&self, object: ObjectKind, change: ChangeKind) -> bool {
        !(object == ObjectKind::Column && change == ChangeKind::AlterType)
    }

    fn quote_identifier(&self, name: &str) -> Result<String> {
        quote_with(name, '"', '"', CAPABILITIES.max_identifier_length)
    }

    fn format_default(&self, value: &DefaultValue) -> Option<String> {
        match value {
            DefaultValue::None => None,
            DefaultValue::Null => Some("NULL".to_string()),
            DefaultValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            DefaultValue::Integer(i) => Some(i.to_string()),
            DefaultValue::Float(f) => Some(f.to_string()),
            DefaultValue::String(s) => Some(self.quote_literal(s)),
            DefaultValue::Expression(expr) => Some(expr.clone()),
        }
    }

    fn to_native_type(&self, ty: &TypeDescriptor) -> Result<String> {
        Ok(match ty {
            TypeDescriptor::Boolean => "BOOLEAN".to_string(),
            TypeDescriptor::Int16 => "SMALLINT".to_string(),
            TypeDescriptor::Int32 => "INTEGER".to_string(),
            TypeDescriptor::Int64 => "BIGINT".to_string(),
            TypeDescriptor::Float32 => "REAL".to_string(),
            TypeDescriptor::Float64 => "DOUBLE PRECISION".to_string(),
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
            TypeDescriptor::VarBinary { .. } | TypeDescriptor::Blob => "BYTEA".to_string(),
            TypeDescriptor::Date => "DATE".to_string(),
            TypeDescriptor::Time => "TIME".to_string(),
            TypeDescriptor::DateTime => "TIMESTAMP".to_string(),
            TypeDescriptor::DateTimeTz => "TIMESTAMPTZ".to_string(),
            TypeDescriptor::Uuid => "UUID".to_string(),
            TypeDescriptor::Json => "JSONB".to_string(),
        })
    }

    fn from_native_type(&self, native: &str) -> TypeDescriptor {
        let (base, first, second) = split_native_type(native);
        match base.as_str() {
            "boolean" | "bool" => TypeDescriptor::Boolean,
            "smallint" | "int2" | "smallserial" => TypeDescriptor::Int16,
            "integer" | "int" | "int4" | "serial" => TypeDescriptor::Int32,
            "bigint" | "int8" | "bigserial" => TypeDescriptor::Int64,
            "real" | "float4" => TypeDescriptor::Float32,
            "double precision" | "float8" => TypeDescriptor::Float64,
            "numeric" | "decimal" => TypeDescriptor::Decimal {
                precision: first.map(|p| p.min(u32::from(u8::MAX)) as u8),
                scale: second.map(|s| s.min(u32::from(u8::MAX)) as u8),
            },
            "varchar" | "character varying" => TypeDescriptor::VarString {
                length: first,
                unicode: true,
            },
            "char" | "character" | "bpchar" => TypeDescriptor::FixedString {
                length: first.unwrap_or(1),
                unicode: true,
            },
            "text" | "name" => TypeDescriptor::Text,
            "bytea" => TypeDescriptor::Blob,
            "date" => TypeDescriptor::Date,
            "time" | "time without time zone" => TypeDescriptor::Time,
            "timestamp" | "timestamp without time zone" => TypeDescriptor::DateTime,
            "timestamptz" | "timestamp with time zone" => TypeDescriptor::DateTimeTz,
            "uuid" => TypeDescriptor::Uuid,
            "json" | "jsonb" => TypeDescriptor::Json,
            _ => TypeDescriptor::Text,
        }
    }

    fn auto_increment_sql(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    fn disable_foreign_keys_sql(&self) -> Option<&'static str> {
        Some("SET CONSTRAINTS ALL DEFERRED")
    }

    fn enable_foreign_keys_sql(&self) -> Option<&'static str> {
        Some("SET CONSTRAINTS ALL IMMEDIATE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_types() {
        let d = PostgresDialect;
        assert_eq!(
            d.to_native_type(&TypeDescriptor::Float64).unwrap(),
            "DOUBLE PRECISION"
        );
        assert_eq!(d.to_native_type(&TypeDescriptor::Json).unwrap(), "JSONB");
        assert_eq!(
            d.to_native_type(&TypeDescriptor::VarString {
                length: None,
                unicode: true
            })
            .unwrap(),
            "VARCHAR(255)"
        );
    }

    #[test]
    fn test_parse_native_types() {
        let d = PostgresDialect;
        assert_eq!(
            d.from_native_type("character varying(120)"),
            TypeDescriptor::varstring(120)
        );
        assert_eq!(
            d.from_native_type("timestamp with time zone"),
            TypeDescriptor::DateTimeTz
        );
        assert_eq!(d.from_native_type("bigserial"), TypeDescriptor::Int64);
    }

    #[test]
    fn test_alter_type_requires_recreation() {
        let d = PostgresDialect;
        assert!(!d.can_alter_in_place(ObjectKind::Column, ChangeKind::AlterType));
        assert!(d.can_alter_in_place(ObjectKind::Column, ChangeKind::AlterNullability));
        assert!(d.can_alter_in_place(ObjectKind::ForeignKey, ChangeKind::Add));
    }
}
