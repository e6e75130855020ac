//! Live catalog introspection.
//!
//! Reads tables, columns, indexes, constraints and views from a live
//! database into the model types, applying the dialect's type catalog so
//! that a created-then-introspected table differs from its definition only
//! in the ways the engine can normalize. "Not found" is `Ok(None)`, never
//! an error, and nothing is cached across calls: the whole point of these
//! reads is deciding whether to run DDL, and stale answers are worse than
//! slow ones.

mod info_schema;
mod sqlite;

use oxide_schema::dialect::{DialectKind, SqlDialect};
use oxide_schema::model::{Table, View};

use crate::error::{Result, SyncError};
use crate::executor::{Executor, Row};

pub(crate) use sqlite::parse_default;

/// Reads live schema state through an [`Executor`].
pub struct Introspector<'a, E: Executor> {
    executor: &'a mut E,
    dialect: &'static dyn SqlDialect,
}

pub(crate) async fn run_query<E: Executor>(
    executor: &mut E,
    sql: &str,
    object: &str,
) -> Result<Vec<Row>> {
    executor
        .query(sql)
        .await
        .map_err(|err| SyncError::Backend {
            object: object.to_string(),
            statement: sql.to_string(),
            message: err.message,
        })
}

impl<'a, E: Executor> Introspector<'a, E> {
    /// Creates an introspector over the given executor and dialect.
    pub fn new(executor: &'a mut E, dialect: &'static dyn SqlDialect) -> Self {
        Self { executor, dialect }
    }

    /// Returns whether the table exists.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the catalog query fails.
    pub async fn table_exists(&mut self, schema: Option<&str>, name: &str) -> Result<bool> {
        match self.dialect.kind() {
            DialectKind::Sqlite => sqlite::table_exists(self.executor, self.dialect, name).await,
            _ => info_schema::table_exists(self.executor, self.dialect, schema, name).await,
        }
    }

    /// Reads the full definition of a table, or `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_table(&mut self, schema: Option<&str>, name: &str) -> Result<Option<Table>> {
        match self.dialect.kind() {
            DialectKind::Sqlite => sqlite::get_table(self.executor, self.dialect, name).await,
            _ => info_schema::get_table(self.executor, self.dialect, schema, name).await,
        }
    }

    /// Returns whether the named index exists.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the catalog query fails.
    pub async fn index_exists(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<bool> {
        match self.dialect.kind() {
            DialectKind::Sqlite => sqlite::index_exists(self.executor, self.dialect, name).await,
            _ => info_schema::index_exists(self.executor, self.dialect, schema, table, name).await,
        }
    }

    /// Returns whether the table has a column with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn column_exists(
        &mut self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<bool> {
        let Some(live) = self.get_table(schema, table).await? else {
            return Ok(false);
        };
        Ok(live.get_column(column).is_some())
    }

    /// Returns whether the table carries a constraint with the given name.
    ///
    /// On SQLite, unique constraints added after creation are unique
    /// indexes, so index names count as constraint names there.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn constraint_exists(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<bool> {
        let Some(live) = self.get_table(schema, table).await? else {
            return Ok(false);
        };
        let named = live
            .foreign_keys
            .iter()
            .map(|fk| fk.name.as_str())
            .chain(live.unique_constraints.iter().map(|u| u.name.as_str()))
            .chain(live.check_constraints.iter().map(|c| c.name.as_str()))
            .chain(live.default_constraints.iter().map(|d| d.name.as_str()))
            .chain(
                live.primary_key
                    .as_ref()
                    .and_then(|pk| pk.name.as_deref()),
            )
            .any(|n| n.eq_ignore_ascii_case(name));
        if named {
            return Ok(true);
        }
        if self.dialect.kind() == DialectKind::Sqlite {
            return sqlite::index_exists(self.executor, self.dialect, name).await;
        }
        Ok(false)
    }

    /// Reads a view definition, or `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the catalog query fails.
    pub async fn get_view(&mut self, schema: Option<&str>, name: &str) -> Result<Option<View>> {
        match self.dialect.kind() {
            DialectKind::Sqlite => sqlite::get_view(self.executor, self.dialect, name).await,
            _ => info_schema::get_view(self.executor, self.dialect, schema, name).await,
        }
    }

    /// Returns whether the view exists.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the catalog query fails.
    pub async fn view_exists(&mut self, schema: Option<&str>, name: &str) -> Result<bool> {
        Ok(self.get_view(schema, name).await?.is_some())
    }

    /// Lists user table names, optionally filtered to names containing the
    /// given substring.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the catalog query fails.
    pub async fn list_tables(
        &mut self,
        schema: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Vec<String>> {
        let names = match self.dialect.kind() {
            DialectKind::Sqlite => sqlite::list_tables(self.executor, self.dialect).await?,
            _ => info_schema::list_tables(self.executor, self.dialect, schema).await?,
        };
        Ok(match filter {
            Some(f) => {
                let needle = f.to_lowercase();
                names
                    .into_iter()
                    .filter(|n| n.to_lowercase().contains(&needle))
                    .collect()
            }
            None => names,
        })
    }
}
