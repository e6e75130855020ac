//! Dialect-aware schema model, type catalog, and DDL rendering.
//!
//! `oxide-schema` is the pure half of the schema synchronization engine:
//! plain value types describing tables, columns, indexes, constraints and
//! views, a bidirectional type catalog per dialect, and deterministic DDL
//! rendering. Nothing in this crate touches a connection; the live half
//! lives in `oxide-schema-sync`.
//!
//! # Architecture
//!
//! - **Model** - `Table`, `Column`, `Index`, constraint and `View` value
//!   types with builder methods and internal-consistency validation
//! - **Types** - host type descriptors with semantic classes and
//!   per-dialect native type overrides
//! - **Dialect** - static capabilities, identifier/literal formatting, and
//!   the type catalog for SQLite, PostgreSQL, MySQL and SQL Server
//! - **Emit** - one render function per (object kind, operation), each
//!   returning a statement plus its prerequisite statements
//!
//! # Example
//!
//! ```rust
//! use oxide_schema::prelude::*;
//!
//! let table = Table::new("orders")
//!     .column(Column::new("id", TypeDescriptor::Int64).primary_key().auto_increment())
//!     .column(Column::new("amount", TypeDescriptor::decimal(18, 6)).not_null());
//! table.validate().expect("definition is consistent");
//!
//! let dialect = dialect_for(DialectKind::Sqlite);
//! let rendered = emit::render_create_table(dialect, &table).expect("renders");
//! assert!(rendered.statement.starts_with("CREATE TABLE"));
//! ```

pub mod dialect;
pub mod emit;
pub mod error;
pub mod model;
pub mod types;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{
        dialect_for, qualified_name, Capabilities, ChangeKind, DialectKind, MssqlDialect,
        MysqlDialect, ObjectKind, PostgresDialect, SqlDialect, SqliteDialect,
    };
    pub use crate::emit::{self, ConstraintDropKind, Rendered};
    pub use crate::error::{Result, SchemaError};
    pub use crate::model::{
        CheckConstraint, Column, DefaultConstraint, DefaultValue, ForeignKey, ForeignKeyAction,
        ForeignKeyBuilder, Index, IndexColumn, PrimaryKey, SortOrder, Table, UniqueConstraint,
        View,
    };
    pub use crate::types::{NativeTypeOverride, SemanticClass, TypeDescriptor};
}
