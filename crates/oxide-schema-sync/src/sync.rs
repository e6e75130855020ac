//! The synchronization engine.
//!
//! One [`SchemaSync`] call is a single, unparallelized sequence of queries
//! and statements against one caller-supplied executor. Creation is
//! strictly additive: `ensure_*` never alters an object that already
//! exists, it only reports `false`. Changes that the active dialect cannot
//! express as a direct ALTER are routed through the table recreation
//! sequence, which runs inside a transaction the engine opens itself
//! unless the caller already holds one.

use tracing::{debug, info, warn};

use oxide_schema::dialect::{
    dialect_for, qualified_name, ChangeKind, DialectKind, ObjectKind, SqlDialect,
};
use oxide_schema::emit::{self, ConstraintDropKind, Rendered};
use oxide_schema::model::{
    CheckConstraint, Column, DefaultConstraint, DefaultValue, ForeignKey, Index, PrimaryKey,
    Table, UniqueConstraint, View,
};

use crate::error::{Result, SyncError};
use crate::executor::{Executor, ExecutorError, OpOptions, Row, SqlValue};
use crate::introspect::Introspector;
use crate::recreate::{self, RecreationPlan, TableDelta};

fn backend(object: &str, statement: &str, err: ExecutorError) -> SyncError {
    SyncError::Backend {
        object: object.to_string(),
        statement: statement.to_string(),
        message: err.message,
    }
}

/// Synchronizes in-memory schema definitions against a live database.
pub struct SchemaSync<E: Executor> {
    executor: E,
    dialect: &'static dyn SqlDialect,
    options: OpOptions,
}

impl<E: Executor> SchemaSync<E> {
    /// Creates an engine over the given executor and dialect.
    pub fn new(executor: E, kind: DialectKind) -> Self {
        Self {
            executor,
            dialect: dialect_for(kind),
            options: OpOptions::default(),
        }
    }

    /// Sets the per-operation options (statement timeout, cancellation).
    #[must_use]
    pub fn with_options(mut self, options: OpOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the active dialect.
    #[must_use]
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    /// Returns the underlying executor.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Consumes the engine, returning the executor.
    pub fn into_inner(self) -> E {
        self.executor
    }

    fn guard(&self, object: &str) -> Result<()> {
        if self.options.is_cancelled() {
            return Err(SyncError::Cancelled {
                object: object.to_string(),
            });
        }
        Ok(())
    }

    async fn run_sql(&mut self, sql: &str, object: &str) -> Result<u64> {
        self.guard(object)?;
        debug!(sql = %sql, "executing");
        let limit = self.options.statement_timeout;
        let fut = self.executor.execute(sql);
        let outcome = match limit {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(SyncError::Backend {
                        object: object.to_string(),
                        statement: sql.to_string(),
                        message: format!("statement timed out after {}ms", limit.as_millis()),
                    })
                }
            },
            None => fut.await,
        };
        outcome.map_err(|err| backend(object, sql, err))
    }

    async fn run_rendered(&mut self, rendered: &Rendered, object: &str) -> Result<()> {
        for sql in rendered.in_order() {
            self.run_sql(sql, object).await?;
        }
        Ok(())
    }

    async fn query_sql(&mut self, sql: &str, object: &str) -> Result<Vec<Row>> {
        self.guard(object)?;
        debug!(sql = %sql, "querying");
        self.executor
            .query(sql)
            .await
            .map_err(|err| backend(object, sql, err))
    }

    fn introspector(&mut self) -> Introspector<'_, E> {
        Introspector::new(&mut self.executor, self.dialect)
    }

    // ------------------------------------------------------------------
    // Schemas
    // ------------------------------------------------------------------

    /// Ensures the schema/namespace exists. A no-op (returning `false`) on
    /// dialects without schema support.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a statement fails.
    pub async fn ensure_schema(&mut self, name: &str) -> Result<bool> {
        let object = format!("schema '{name}'");
        self.guard(&object)?;
        if !self.dialect.capabilities().supports_schemas {
            return Ok(false);
        }
        let sql = format!(
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = {}",
            self.dialect.quote_literal(name)
        );
        if !self.query_sql(&sql, &object).await?.is_empty() {
            return Ok(false);
        }
        let rendered = emit::render_create_schema(self.dialect, name)?;
        self.run_rendered(&rendered, &object).await?;
        info!(schema = %name, "schema created");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Ensures the table exists. Returns `true` when it was created, and
    /// `false` when a table of that name already exists - in which case
    /// its live definition is left untouched even if it differs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for inconsistent definitions or
    /// foreign keys referencing missing tables (checked before any
    /// statement runs), and [`SyncError::Backend`] when a statement fails.
    pub async fn ensure_table(&mut self, table: &Table) -> Result<bool> {
        let object = format!("table '{}'", table.name);
        self.guard(&object)?;
        table.validate()?;
        self.check_foreign_key_targets(table.schema.as_deref(), &table.name, &table.foreign_keys)
            .await?;

        if self
            .introspector()
            .table_exists(table.schema.as_deref(), &table.name)
            .await?
        {
            info!(table = %table.name, "table already exists, leaving it untouched");
            return Ok(false);
        }

        let rendered = emit::render_create_table(self.dialect, table)?;
        self.run_rendered(&rendered, &object).await?;
        for rendered in emit::render_table_indexes(self.dialect, table)? {
            self.run_rendered(&rendered, &object).await?;
        }
        info!(table = %table.name, "table created");
        Ok(true)
    }

    /// Drops the table when it exists, reporting whether it did.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the statement fails.
    pub async fn drop_table(&mut self, schema: Option<&str>, name: &str) -> Result<bool> {
        let object = format!("table '{name}'");
        self.guard(&object)?;
        if !self.introspector().table_exists(schema, name).await? {
            return Ok(false);
        }
        let rendered = emit::render_drop_table(self.dialect, schema, name)?;
        self.run_rendered(&rendered, &object).await?;
        info!(table = %name, "table dropped");
        Ok(true)
    }

    /// Reads the live definition of a table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_table(&mut self, schema: Option<&str>, name: &str) -> Result<Option<Table>> {
        self.guard(&format!("table '{name}'"))?;
        self.introspector().get_table(schema, name).await
    }

    /// Lists live tables, optionally filtered by a name substring.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn list_tables(
        &mut self,
        schema: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Vec<Table>> {
        self.guard("table list")?;
        let names = self.introspector().list_tables(schema, filter).await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            if let Some(table) = self.introspector().get_table(schema, &name).await? {
                tables.push(table);
            }
        }
        Ok(tables)
    }

    /// Renames a table, preferring the dialect's native rename.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the source is missing or the
    /// target name is taken, [`SyncError::Backend`] when a statement fails.
    pub async fn rename_table(
        &mut self,
        schema: Option<&str>,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        let object = format!("table '{old_name}'");
        self.guard(&object)?;
        if !self.introspector().table_exists(schema, old_name).await? {
            return Err(SyncError::validation(&object, "table does not exist"));
        }
        if self.introspector().table_exists(schema, new_name).await? {
            return Err(SyncError::validation(
                &object,
                format!("cannot rename: '{new_name}' already exists"),
            ));
        }
        let rendered = emit::render_rename_table(self.dialect, schema, old_name, new_name)?;
        self.run_rendered(&rendered, &object).await?;
        info!(table = %old_name, renamed_to = %new_name, "table renamed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    /// Ensures the column exists on the table. Uses a direct ALTER where
    /// the dialect supports it and the recreation sequence otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table is missing,
    /// [`SyncError::DataLoss`] when a non-nullable column has no default
    /// to back-fill existing rows, [`SyncError::Backend`] on statement
    /// failure.
    pub async fn ensure_column(
        &mut self,
        schema: Option<&str>,
        table: &str,
        column: &Column,
    ) -> Result<bool> {
        let object = format!("column '{table}.{}'", column.name);
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        if live.get_column(&column.name).is_some() {
            return Ok(false);
        }

        let change = if column.nullable {
            ChangeKind::Add
        } else {
            ChangeKind::AddRequired
        };
        if self.dialect.can_alter_in_place(ObjectKind::Column, change) {
            let rendered = emit::render_add_column(self.dialect, schema, table, column)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().add_column(column.clone());
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, column = %column.name, "column added");
        Ok(true)
    }

    /// Drops the column when it exists, reporting whether it did.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table is missing,
    /// [`SyncError::Backend`] on statement failure.
    pub async fn drop_column(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<bool> {
        let object = format!("column '{table}.{name}'");
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        if live.get_column(name).is_none() {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::Column, ChangeKind::Drop)
        {
            let rendered = emit::render_drop_column(self.dialect, schema, table, name)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().drop_column(name);
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, column = %name, "column dropped");
        Ok(true)
    }

    /// Renames a column, preferring the dialect's native rename statement
    /// since that path carries no data-loss risk.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the source column is missing
    /// or the new name is taken, [`SyncError::Backend`] on statement
    /// failure.
    pub async fn rename_column(
        &mut self,
        schema: Option<&str>,
        table: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        let object = format!("column '{table}.{old_name}'");
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        if live.get_column(old_name).is_none() {
            return Err(SyncError::validation(&object, "column does not exist"));
        }
        if live.get_column(new_name).is_some() {
            return Err(SyncError::validation(
                &object,
                format!("cannot rename: column '{new_name}' already exists"),
            ));
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::Column, ChangeKind::Rename)
        {
            let rendered =
                emit::render_rename_column(self.dialect, schema, table, old_name, new_name)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().rename_column(old_name, new_name);
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, column = %old_name, renamed_to = %new_name, "column renamed");
        Ok(())
    }

    /// Brings an existing column to the target definition. Returns `false`
    /// when the live column already matches.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the column is missing,
    /// [`SyncError::Backend`] on statement failure.
    pub async fn alter_column(
        &mut self,
        schema: Option<&str>,
        table: &str,
        target: &Column,
    ) -> Result<bool> {
        let object = format!("column '{table}.{}'", target.name);
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        let Some(current) = live.get_column(&target.name) else {
            return Err(SyncError::validation(&object, "column does not exist"));
        };

        let mut changes = Vec::new();
        if self.dialect.column_native_type(current)? != self.dialect.column_native_type(target)? {
            changes.push(ChangeKind::AlterType);
        }
        if current.nullable != target.nullable {
            changes.push(ChangeKind::AlterNullability);
        }
        if self.dialect.format_default(&current.default)
            != self.dialect.format_default(&target.default)
        {
            changes.push(ChangeKind::AlterDefault);
        }
        if changes.is_empty() {
            return Ok(false);
        }

        let in_place = changes
            .iter()
            .all(|change| self.dialect.can_alter_in_place(ObjectKind::Column, *change));
        if in_place {
            let rendered = emit::render_alter_column(self.dialect, schema, table, target)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().alter_column(target.clone());
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, column = %target.name, "column altered");
        Ok(true)
    }

    /// Reads a live column definition.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_column(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<Option<Column>> {
        Ok(self
            .get_table(schema, table)
            .await?
            .and_then(|t| t.get_column(name).cloned()))
    }

    // ------------------------------------------------------------------
    // Indexes
    // ------------------------------------------------------------------

    /// Ensures the index exists, reporting whether it was created.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table or an indexed
    /// column is missing, [`SyncError::Backend`] on statement failure.
    pub async fn ensure_index(
        &mut self,
        schema: Option<&str>,
        table: &str,
        index: &Index,
    ) -> Result<bool> {
        let object = format!("index '{}'", index.name);
        self.guard(&object)?;
        if index.columns.is_empty() {
            return Err(SyncError::validation(&object, "index has no columns"));
        }
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        for column in &index.columns {
            if live.get_column(&column.name).is_none() {
                return Err(SyncError::validation(
                    &object,
                    format!("index references unknown column '{}'", column.name),
                ));
            }
        }
        if self
            .introspector()
            .index_exists(schema, table, &index.name)
            .await?
        {
            return Ok(false);
        }
        let rendered = emit::render_create_index(self.dialect, schema, table, index)?;
        self.run_rendered(&rendered, &object).await?;
        info!(table = %table, index = %index.name, "index created");
        Ok(true)
    }

    /// Drops the index when it exists, reporting whether it did.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the statement fails.
    pub async fn drop_index(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<bool> {
        let object = format!("index '{name}'");
        self.guard(&object)?;
        if !self.introspector().index_exists(schema, table, name).await? {
            return Ok(false);
        }
        let rendered = emit::render_drop_index(self.dialect, schema, table, name)?;
        self.run_rendered(&rendered, &object).await?;
        info!(table = %table, index = %name, "index dropped");
        Ok(true)
    }

    /// Reads a live index definition.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_index(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<Option<Index>> {
        Ok(self.get_table(schema, table).await?.and_then(|t| {
            t.indexes
                .iter()
                .find(|i| i.name.eq_ignore_ascii_case(name))
                .cloned()
        }))
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    async fn check_foreign_key_targets(
        &mut self,
        schema: Option<&str>,
        table: &str,
        foreign_keys: &[ForeignKey],
    ) -> Result<()> {
        for fk in foreign_keys {
            if fk.references_table.eq_ignore_ascii_case(table) {
                continue;
            }
            let target_schema = fk.references_schema.as_deref().or(schema);
            let exists = self
                .introspector()
                .table_exists(target_schema, &fk.references_table)
                .await?;
            if !exists {
                return Err(SyncError::validation(
                    format!("table '{table}'"),
                    format!(
                        "foreign key '{}' references missing table '{}'",
                        fk.name, fk.references_table
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Ensures the table has a primary key over the given columns,
    /// reporting whether one was added. A table that already has any
    /// primary key is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table or a key column is
    /// missing, [`SyncError::Backend`] on statement failure.
    pub async fn ensure_primary_key(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: Option<&str>,
        columns: &[String],
    ) -> Result<bool> {
        let object = format!("primary key on '{table}'");
        self.guard(&object)?;
        if columns.is_empty() {
            return Err(SyncError::validation(&object, "primary key has no columns"));
        }
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        for column in columns {
            if live.get_column(column).is_none() {
                return Err(SyncError::validation(
                    &object,
                    format!("references unknown column '{column}'"),
                ));
            }
        }
        if !live.primary_key_columns().is_empty() {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::PrimaryKey, ChangeKind::Add)
        {
            let rendered =
                emit::render_add_primary_key(self.dialect, schema, table, name, columns)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().set_primary_key(PrimaryKey {
                name: name.map(str::to_string),
                columns: columns.to_vec(),
            });
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, "primary key added");
        Ok(true)
    }

    /// Removes the table's primary key, reporting whether one existed.
    ///
    /// On dialects that drop the key in place the introspected constraint
    /// name is used, falling back to the `<table>_pkey` convention when
    /// the backend did not expose one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table is missing,
    /// [`SyncError::Backend`] on statement failure.
    pub async fn drop_primary_key(&mut self, schema: Option<&str>, table: &str) -> Result<bool> {
        let object = format!("primary key on '{table}'");
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        if live.primary_key_columns().is_empty() {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::PrimaryKey, ChangeKind::Drop)
        {
            let name = live
                .primary_key
                .as_ref()
                .and_then(|pk| pk.name.clone())
                .unwrap_or_else(|| format!("{table}_pkey"));
            let rendered = emit::render_drop_constraint(
                self.dialect,
                schema,
                table,
                &name,
                ConstraintDropKind::PrimaryKey,
            )?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().drop_primary_key();
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, "primary key dropped");
        Ok(true)
    }

    /// Reads the live primary key, explicit or inferred from column flags.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_primary_key(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKey>> {
        Ok(self.get_table(schema, table).await?.and_then(|t| {
            let columns = t.primary_key_columns();
            if columns.is_empty() {
                return None;
            }
            match t.primary_key {
                Some(pk) => Some(pk),
                None => Some(PrimaryKey {
                    name: None,
                    columns,
                }),
            }
        }))
    }

    /// Ensures the foreign key exists, reporting whether it was created.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table, a source column
    /// or the referenced table is missing (checked before any statement
    /// runs), [`SyncError::Backend`] on statement failure.
    pub async fn ensure_foreign_key(
        &mut self,
        schema: Option<&str>,
        table: &str,
        fk: &ForeignKey,
    ) -> Result<bool> {
        let object = format!("foreign key '{}'", fk.name);
        self.guard(&object)?;
        if fk.columns.is_empty() || fk.columns.len() != fk.references_columns.len() {
            return Err(SyncError::validation(
                &object,
                format!(
                    "maps {} columns to {} referenced columns",
                    fk.columns.len(),
                    fk.references_columns.len()
                ),
            ));
        }
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        for column in &fk.columns {
            if live.get_column(column).is_none() {
                return Err(SyncError::validation(
                    &object,
                    format!("references unknown column '{column}'"),
                ));
            }
        }
        self.check_foreign_key_targets(schema, table, std::slice::from_ref(fk))
            .await?;
        if self
            .introspector()
            .constraint_exists(schema, table, &fk.name)
            .await?
        {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::ForeignKey, ChangeKind::Add)
        {
            let rendered = emit::render_add_foreign_key(self.dialect, schema, table, fk)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().add_foreign_key(fk.clone());
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, constraint = %fk.name, "foreign key added");
        Ok(true)
    }

    /// Drops the foreign key when it exists, reporting whether it did.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table is missing,
    /// [`SyncError::Backend`] on statement failure.
    pub async fn drop_foreign_key(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<bool> {
        let object = format!("foreign key '{name}'");
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        if !live
            .foreign_keys
            .iter()
            .any(|fk| fk.name.eq_ignore_ascii_case(name))
        {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::ForeignKey, ChangeKind::Drop)
        {
            let rendered = emit::render_drop_constraint(
                self.dialect,
                schema,
                table,
                name,
                ConstraintDropKind::ForeignKey,
            )?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().drop_constraint(name);
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, constraint = %name, "foreign key dropped");
        Ok(true)
    }

    /// Reads a live foreign key definition.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_foreign_key(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<Option<ForeignKey>> {
        Ok(self.get_table(schema, table).await?.and_then(|t| {
            t.foreign_keys
                .iter()
                .find(|fk| fk.name.eq_ignore_ascii_case(name))
                .cloned()
        }))
    }

    /// Ensures the unique constraint exists, reporting whether it was
    /// created. On SQLite this is expressed as a unique index.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table or a constrained
    /// column is missing, [`SyncError::Backend`] on statement failure.
    pub async fn ensure_unique_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        unique: &UniqueConstraint,
    ) -> Result<bool> {
        let object = format!("unique constraint '{}'", unique.name);
        self.guard(&object)?;
        if unique.columns.is_empty() {
            return Err(SyncError::validation(&object, "constraint has no columns"));
        }
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        for column in &unique.columns {
            if live.get_column(column).is_none() {
                return Err(SyncError::validation(
                    &object,
                    format!("references unknown column '{column}'"),
                ));
            }
        }
        if self
            .introspector()
            .constraint_exists(schema, table, &unique.name)
            .await?
        {
            return Ok(false);
        }

        let rendered = emit::render_add_unique(self.dialect, schema, table, unique)?;
        self.run_rendered(&rendered, &object).await?;
        info!(table = %table, constraint = %unique.name, "unique constraint added");
        Ok(true)
    }

    /// Drops the unique constraint when it exists, reporting whether it
    /// did. A SQLite constraint declared at creation time has no index to
    /// drop and is removed through recreation instead.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table is missing,
    /// [`SyncError::Backend`] on statement failure.
    pub async fn drop_unique_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<bool> {
        let object = format!("unique constraint '{name}'");
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };

        if self.dialect.kind() == DialectKind::Sqlite {
            if self.introspector().index_exists(schema, table, name).await? {
                let rendered = emit::render_drop_constraint(
                    self.dialect,
                    schema,
                    table,
                    name,
                    ConstraintDropKind::Unique,
                )?;
                self.run_rendered(&rendered, &object).await?;
            } else if live
                .unique_constraints
                .iter()
                .any(|u| u.name.eq_ignore_ascii_case(name))
            {
                let delta = TableDelta::new().drop_constraint(name);
                self.recreate_table(schema, table, &delta).await?;
            } else {
                return Ok(false);
            }
            info!(table = %table, constraint = %name, "unique constraint dropped");
            return Ok(true);
        }

        if !live
            .unique_constraints
            .iter()
            .any(|u| u.name.eq_ignore_ascii_case(name))
        {
            return Ok(false);
        }
        let rendered = emit::render_drop_constraint(
            self.dialect,
            schema,
            table,
            name,
            ConstraintDropKind::Unique,
        )?;
        self.run_rendered(&rendered, &object).await?;
        info!(table = %table, constraint = %name, "unique constraint dropped");
        Ok(true)
    }

    /// Reads a live unique constraint definition. Single-column UNIQUE
    /// flags expressed on a column are not reported here.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_unique_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<Option<UniqueConstraint>> {
        Ok(self.get_table(schema, table).await?.and_then(|t| {
            t.unique_constraints
                .iter()
                .find(|u| u.name.eq_ignore_ascii_case(name))
                .cloned()
        }))
    }

    /// Ensures the check constraint exists, reporting whether it was
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the dialect does not support
    /// check constraints or the table is missing, [`SyncError::Backend`]
    /// on statement failure.
    pub async fn ensure_check_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        check: &CheckConstraint,
    ) -> Result<bool> {
        let object = format!("check constraint '{}'", check.name);
        self.guard(&object)?;
        if !self.dialect.capabilities().supports_check_constraints {
            return Err(SyncError::validation(
                &object,
                format!("{} does not support check constraints", self.dialect.name()),
            ));
        }
        if !self.introspector().table_exists(schema, table).await? {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        }
        if self
            .introspector()
            .constraint_exists(schema, table, &check.name)
            .await?
        {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::CheckConstraint, ChangeKind::Add)
        {
            let rendered = emit::render_add_check(self.dialect, schema, table, check)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().add_check_constraint(check.clone());
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, constraint = %check.name, "check constraint added");
        Ok(true)
    }

    /// Drops the check constraint when it exists, reporting whether it
    /// did.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table is missing,
    /// [`SyncError::Backend`] on statement failure.
    pub async fn drop_check_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<bool> {
        let object = format!("check constraint '{name}'");
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        if !live
            .check_constraints
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::CheckConstraint, ChangeKind::Drop)
        {
            let rendered = emit::render_drop_constraint(
                self.dialect,
                schema,
                table,
                name,
                ConstraintDropKind::Check,
            )?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let delta = TableDelta::new().drop_constraint(name);
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, constraint = %name, "check constraint dropped");
        Ok(true)
    }

    /// Reads a live check constraint definition.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_check_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<Option<CheckConstraint>> {
        Ok(self.get_table(schema, table).await?.and_then(|t| {
            t.check_constraints
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .cloned()
        }))
    }

    /// Ensures the column carries the given default, reporting whether it
    /// was added. An existing default (named or inline) is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table or column is
    /// missing, [`SyncError::Backend`] on statement failure.
    pub async fn ensure_default_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        default: &DefaultConstraint,
    ) -> Result<bool> {
        let object = format!("default constraint '{}'", default.name);
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        let Some(column) = live.get_column(&default.column) else {
            return Err(SyncError::validation(
                &object,
                format!("references unknown column '{}'", default.column),
            ));
        };
        let already_present = !column.default.is_none()
            || live
                .default_constraints
                .iter()
                .any(|d| d.name.eq_ignore_ascii_case(&default.name));
        if already_present {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::DefaultConstraint, ChangeKind::Add)
        {
            let rendered = emit::render_add_default(
                self.dialect,
                schema,
                table,
                &default.name,
                &default.column,
                &default.value,
            )?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let mut replacement = column.clone();
            replacement.default = default.value.clone();
            let delta = TableDelta::new().alter_column(replacement);
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, column = %default.column, "default added");
        Ok(true)
    }

    /// Removes the default from a column, reporting whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the table or column is
    /// missing, [`SyncError::Backend`] on statement failure.
    pub async fn drop_default(
        &mut self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<bool> {
        let object = format!("default on '{table}.{column}'");
        self.guard(&object)?;
        let Some(live) = self.introspector().get_table(schema, table).await? else {
            return Err(SyncError::validation(
                &object,
                format!("table '{table}' does not exist"),
            ));
        };
        let Some(live_column) = live.get_column(column) else {
            return Err(SyncError::validation(&object, "column does not exist"));
        };
        let named = live
            .default_constraints
            .iter()
            .find(|d| d.column.eq_ignore_ascii_case(column))
            .map(|d| d.name.clone());
        if live_column.default.is_none() && named.is_none() {
            return Ok(false);
        }

        if self
            .dialect
            .can_alter_in_place(ObjectKind::DefaultConstraint, ChangeKind::Drop)
        {
            let name = named.unwrap_or_else(|| format!("df_{table}_{column}"));
            let rendered =
                emit::render_drop_default(self.dialect, schema, table, &name, column)?;
            self.run_rendered(&rendered, &object).await?;
        } else {
            let mut replacement = live_column.clone();
            replacement.default = DefaultValue::None;
            let delta = TableDelta::new().alter_column(replacement);
            self.recreate_table(schema, table, &delta).await?;
        }
        info!(table = %table, column = %column, "default removed");
        Ok(true)
    }

    /// Reads a live named default constraint. Only dialects that give
    /// defaults their own catalog identity report anything here; on the
    /// others the default is visible on [`Column::default`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a catalog query fails.
    pub async fn get_default_constraint(
        &mut self,
        schema: Option<&str>,
        table: &str,
        name: &str,
    ) -> Result<Option<DefaultConstraint>> {
        Ok(self.get_table(schema, table).await?.and_then(|t| {
            t.default_constraints
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(name))
                .cloned()
        }))
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Ensures the view exists, reporting whether it was created. An
    /// existing view's definition is never replaced implicitly.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when a statement fails.
    pub async fn ensure_view(&mut self, view: &View) -> Result<bool> {
        let object = format!("view '{}'", view.name);
        self.guard(&object)?;
        if self
            .introspector()
            .view_exists(view.schema.as_deref(), &view.name)
            .await?
        {
            info!(view = %view.name, "view already exists, leaving it untouched");
            return Ok(false);
        }
        let rendered = emit::render_create_view(self.dialect, view)?;
        self.run_rendered(&rendered, &object).await?;
        info!(view = %view.name, "view created");
        Ok(true)
    }

    /// Drops the view when it exists, reporting whether it did.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the statement fails.
    pub async fn drop_view(&mut self, schema: Option<&str>, name: &str) -> Result<bool> {
        let object = format!("view '{name}'");
        self.guard(&object)?;
        if !self.introspector().view_exists(schema, name).await? {
            return Ok(false);
        }
        let rendered = emit::render_drop_view(self.dialect, schema, name)?;
        self.run_rendered(&rendered, &object).await?;
        info!(view = %name, "view dropped");
        Ok(true)
    }

    /// Reads a live view definition.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the catalog query fails.
    pub async fn get_view(&mut self, schema: Option<&str>, name: &str) -> Result<Option<View>> {
        self.guard(&format!("view '{name}'"))?;
        self.introspector().get_view(schema, name).await
    }

    // ------------------------------------------------------------------
    // Recreation
    // ------------------------------------------------------------------

    async fn count_rows(&mut self, schema: Option<&str>, name: &str, object: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            qualified_name(self.dialect, schema, name)?
        );
        let rows = self.query_sql(&sql, object).await?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .unwrap_or(0))
    }

    /// Rebuilds the table around the delta's outcome: snapshot, stage a
    /// temporary table, copy the surviving rows, swap, recreate indexes
    /// and verify. The whole sequence runs inside a transaction the
    /// engine opens itself unless the caller already holds one; any
    /// failure rolls back to the original table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DataLoss`] when the delta would silently lose
    /// data, [`SyncError::RecreationIntegrity`] when post-swap
    /// verification fails, [`SyncError::Backend`] on statement failure.
    pub async fn recreate_table(
        &mut self,
        schema: Option<&str>,
        name: &str,
        delta: &TableDelta,
    ) -> Result<()> {
        let object = format!("table '{name}'");
        self.guard(&object)?;
        let Some(snapshot) = self.introspector().get_table(schema, name).await? else {
            return Err(SyncError::validation(&object, "table does not exist"));
        };
        let plan = recreate::plan(&snapshot, delta)?;
        self.check_foreign_key_targets(schema, name, &plan.target.foreign_keys)
            .await?;

        let mut temp = recreate::temp_name(name);
        while self.introspector().table_exists(schema, &temp).await? {
            temp = recreate::temp_name(name);
        }

        let row_count = self.count_rows(schema, name, &object).await?;
        info!(table = %name, staging = %temp, rows = row_count, "rebuilding table");

        let capabilities = self.dialect.capabilities();
        if capabilities.enforces_foreign_keys_on_write {
            if let Some(sql) = self.dialect.disable_foreign_keys_sql() {
                self.run_sql(sql, &object).await?;
            }
        }

        let owns_tx = !self.executor.in_transaction();
        if owns_tx {
            self.executor
                .begin()
                .await
                .map_err(|err| backend(&object, "BEGIN", err))?;
        }

        let steps = self
            .recreate_steps(schema, name, &temp, &plan, row_count)
            .await;
        let result = match steps {
            Ok(()) if owns_tx => self
                .executor
                .commit()
                .await
                .map_err(|err| backend(&object, "COMMIT", err)),
            Ok(()) => Ok(()),
            Err(err) => {
                if owns_tx {
                    if let Err(rollback_err) = self.executor.rollback().await {
                        warn!(error = %rollback_err, "rollback after failed rebuild also failed");
                    }
                }
                if !capabilities.supports_transactional_ddl {
                    warn!(
                        table = %name,
                        "rebuild failed without transactional DDL; the database may hold \
                         a partially applied state"
                    );
                }
                Err(err)
            }
        };

        if capabilities.enforces_foreign_keys_on_write {
            if let Some(sql) = self.dialect.enable_foreign_keys_sql() {
                if let Err(enable_err) = self.executor.execute(sql).await {
                    warn!(error = %enable_err, "failed to re-enable foreign key checks");
                }
            }
        }

        if result.is_ok() {
            info!(table = %name, "table rebuilt");
        }
        result
    }

    async fn recreate_steps(
        &mut self,
        schema: Option<&str>,
        name: &str,
        temp: &str,
        plan: &RecreationPlan,
        row_count: i64,
    ) -> Result<()> {
        let object = format!("table '{name}'");

        // Stage the target under the temporary name, without its indexes;
        // they are created after the data load. Foreign keys are deferred
        // to after the swap when the dialect can add them later.
        let defer_fks = self
            .dialect
            .can_alter_in_place(ObjectKind::ForeignKey, ChangeKind::Add);
        let mut staged = plan.target.clone();
        staged.name = temp.to_string();
        staged.indexes = Vec::new();
        let rendered = emit::render_create_table_filtered(self.dialect, &staged, !defer_fks)?;
        self.run_rendered(&rendered, &object).await?;

        // A table with zero rows skips the copy but runs every other step.
        if row_count > 0 {
            let rendered =
                emit::render_copy_rows(self.dialect, schema, temp, name, &plan.copy_columns)?;
            self.run_rendered(&rendered, &object).await?;
        }

        let rendered = emit::render_drop_table(self.dialect, schema, name)?;
        self.run_rendered(&rendered, &object).await?;
        let rendered = emit::render_rename_table(self.dialect, schema, temp, name)?;
        self.run_rendered(&rendered, &object).await?;

        if defer_fks {
            for fk in &plan.target.foreign_keys {
                let rendered = emit::render_add_foreign_key(self.dialect, schema, name, fk)?;
                self.run_rendered(&rendered, &object).await?;
            }
        }
        for index in &plan.target.indexes {
            let rendered = emit::render_create_index(self.dialect, schema, name, index)?;
            self.run_rendered(&rendered, &object).await?;
        }

        let Some(live) = self.introspector().get_table(schema, name).await? else {
            return Err(SyncError::RecreationIntegrity {
                table: name.to_string(),
                detail: "table missing after swap".to_string(),
            });
        };
        let mismatches = recreate::verify(&live, &plan.target);
        if !mismatches.is_empty() {
            return Err(SyncError::RecreationIntegrity {
                table: name.to_string(),
                detail: mismatches.join("; "),
            });
        }
        Ok(())
    }
}
