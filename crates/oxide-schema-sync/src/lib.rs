//! Idempotent, dialect-aware schema synchronization.
//!
//! `oxide-schema-sync` takes the plain schema definitions from
//! `oxide-schema` and reconciles a live database against them: it checks
//! what exists, creates what is missing, and - on dialects that cannot
//! express a change through in-place ALTER - rebuilds tables around the new
//! definition while preserving every row.
//!
//! # Architecture
//!
//! - **Executor** - the minimal connection abstraction the engine needs:
//!   execute, query, begin/commit/rollback. A `sqlx` SQLite implementation
//!   is bundled; any connection can be adapted.
//! - **Introspect** - reads live catalog state back into model types
//! - **Sync** - `ensure_*` / `drop_*` / `get_*` / `list_tables` per object
//!   kind, each reporting whether it performed work
//! - **Recreate** - the snapshot / stage / copy / swap / verify sequence
//!   for changes with no direct ALTER
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schema::prelude::*;
//! use oxide_schema_sync::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SyncError> {
//!     let executor = SqliteExecutor::connect("sqlite::memory:").await?;
//!     let mut sync = SchemaSync::new(executor, DialectKind::Sqlite);
//!
//!     let orders = Table::new("orders")
//!         .column(Column::new("id", TypeDescriptor::Int64).primary_key().auto_increment())
//!         .column(Column::new("amount", TypeDescriptor::decimal(18, 6)).not_null());
//!
//!     assert!(sync.ensure_table(&orders).await?);   // created
//!     assert!(!sync.ensure_table(&orders).await?);  // already there
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod executor;
pub mod introspect;
pub mod recreate;
pub mod sync;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, SyncError};
    pub use crate::executor::{Executor, ExecutorError, OpOptions, Row, SqlValue, SqliteExecutor};
    pub use crate::introspect::Introspector;
    pub use crate::recreate::TableDelta;
    pub use crate::sync::SchemaSync;
}
