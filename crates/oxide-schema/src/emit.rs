//! DDL rendering.
//!
//! One render function per (object kind, operation). Rendering is
//! deterministic and side-effect-free: every function returns the statement
//! text plus any prerequisite statements, and never touches a connection.
//! Execution is the caller's concern, which is what keeps this module
//! unit-testable without a database.

use crate::dialect::{qualified_name, DialectKind, SqlDialect};
use crate::error::Result;
use crate::model::{
    CheckConstraint, Column, DefaultValue, ForeignKey, Index, Table, UniqueConstraint, View,
};

/// A rendered DDL operation: exactly one statement, preceded by zero or
/// more prerequisite statements (e.g. creating a schema before a table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The statement implementing the operation.
    pub statement: String,
    /// Statements that must run first.
    pub prerequisites: Vec<String>,
}

impl Rendered {
    /// Wraps a single statement with no prerequisites.
    #[must_use]
    pub fn statement(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            prerequisites: Vec::new(),
        }
    }

    /// Returns prerequisites followed by the statement, in execution order.
    #[must_use]
    pub fn in_order(&self) -> Vec<&str> {
        self.prerequisites
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.statement.as_str()))
            .collect()
    }
}

/// Renders one column definition for CREATE TABLE / ADD COLUMN.
///
/// `inline_pk` controls whether a single-column primary key is declared on
/// the column itself rather than in a table-level clause.
fn column_definition(dialect: &dyn SqlDialect, column: &Column, inline_pk: bool) -> Result<String> {
    let mut parts = vec![
        dialect.quote_identifier(&column.name)?,
        dialect.column_native_type(column)?,
    ];

    if column.primary_key && inline_pk {
        parts.push("PRIMARY KEY".to_string());
        if column.auto_increment {
            parts.push(dialect.auto_increment_sql().to_string());
        }
    } else if column.auto_increment {
        parts.push(dialect.auto_increment_sql().to_string());
    }

    if !column.nullable && !(column.primary_key && inline_pk) {
        parts.push("NOT NULL".to_string());
    }
    if column.unique && !column.primary_key {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default_sql) = dialect.format_default(&column.default) {
        parts.push(format!("DEFAULT {default_sql}"));
    }
    if let Some(check) = &column.check {
        if dialect.capabilities().supports_check_constraints {
            parts.push(format!("CHECK ({check})"));
        }
    }

    Ok(parts.join(" "))
}

fn quoted_list(dialect: &dyn SqlDialect, columns: &[String]) -> Result<String> {
    let quoted: Vec<String> = columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Result<_>>()?;
    Ok(quoted.join(", "))
}

fn foreign_key_clause(dialect: &dyn SqlDialect, fk: &ForeignKey) -> Result<String> {
    let referenced = qualified_name(dialect, fk.references_schema.as_deref(), &fk.references_table)?;
    Ok(format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        dialect.quote_identifier(&fk.name)?,
        quoted_list(dialect, &fk.columns)?,
        referenced,
        quoted_list(dialect, &fk.references_columns)?,
        fk.on_delete.to_sql(),
        fk.on_update.to_sql(),
    ))
}

/// Renders schema creation, idempotent where the backend allows it.
///
/// # Errors
///
/// Returns an error when the schema name cannot be quoted.
pub fn render_create_schema(dialect: &dyn SqlDialect, name: &str) -> Result<Rendered> {
    let quoted = dialect.quote_identifier(name)?;
    let statement = match dialect.kind() {
        DialectKind::Postgres | DialectKind::Mysql => {
            format!("CREATE SCHEMA IF NOT EXISTS {quoted}")
        }
        DialectKind::Mssql => format!(
            "IF SCHEMA_ID(N{}) IS NULL EXEC(N'CREATE SCHEMA {}')",
            dialect.quote_literal(name),
            quoted.replace('\'', "''"),
        ),
        DialectKind::Sqlite => format!("-- schemas are not supported; requested {quoted}"),
    };
    Ok(Rendered::statement(statement))
}

/// Renders CREATE TABLE with all constraints inline.
///
/// # Errors
///
/// Returns an error on unquotable identifiers or unmappable column types.
pub fn render_create_table(dialect: &dyn SqlDialect, table: &Table) -> Result<Rendered> {
    render_create_table_filtered(dialect, table, true)
}

/// Renders CREATE TABLE, optionally leaving out foreign keys so they can be
/// added after the table exists (used by the recreation planner on dialects
/// that support adding constraints later).
///
/// Indexes are never part of the statement; see [`render_table_indexes`].
///
/// # Errors
///
/// Returns an error on unquotable identifiers or unmappable column types.
pub fn render_create_table_filtered(
    dialect: &dyn SqlDialect,
    table: &Table,
    include_foreign_keys: bool,
) -> Result<Rendered> {
    let mut prerequisites = Vec::new();
    if let Some(schema) = &table.schema {
        if dialect.capabilities().supports_schemas {
            prerequisites.push(render_create_schema(dialect, schema)?.statement);
        }
    }

    // Named default constraints fold into their columns' definitions.
    let mut columns = table.columns.clone();
    for dc in &table.default_constraints {
        if let Some(col) = columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&dc.column))
        {
            if col.default.is_none() {
                col.default = dc.value.clone();
            }
        }
    }

    let pk_columns = table.primary_key_columns();
    let inline_pk = pk_columns.len() == 1 && table.primary_key.is_none();

    let mut clauses: Vec<String> = Vec::new();
    for column in &columns {
        clauses.push(column_definition(dialect, column, inline_pk)?);
    }

    if !pk_columns.is_empty() && !inline_pk {
        let clause = match table.primary_key.as_ref().and_then(|pk| pk.name.as_deref()) {
            Some(name) => format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                dialect.quote_identifier(name)?,
                quoted_list(dialect, &pk_columns)?
            ),
            None => format!("PRIMARY KEY ({})", quoted_list(dialect, &pk_columns)?),
        };
        clauses.push(clause);
    }

    for unique in &table.unique_constraints {
        clauses.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            dialect.quote_identifier(&unique.name)?,
            quoted_list(dialect, &unique.columns)?
        ));
    }

    if include_foreign_keys {
        for fk in &table.foreign_keys {
            clauses.push(foreign_key_clause(dialect, fk)?);
        }
    }

    if dialect.capabilities().supports_check_constraints {
        for check in &table.check_constraints {
            clauses.push(format!(
                "CONSTRAINT {} CHECK ({})",
                dialect.quote_identifier(&check.name)?,
                check.expression
            ));
        }
    }

    let statement = format!(
        "CREATE TABLE {} (\n  {}\n)",
        qualified_name(dialect, table.schema.as_deref(), &table.name)?,
        clauses.join(",\n  ")
    );

    Ok(Rendered {
        statement,
        prerequisites,
    })
}

/// Renders CREATE INDEX statements for every index of the table.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_table_indexes(dialect: &dyn SqlDialect, table: &Table) -> Result<Vec<Rendered>> {
    table
        .indexes
        .iter()
        .map(|index| render_create_index(dialect, table.schema.as_deref(), &table.name, index))
        .collect()
}

/// Renders DROP TABLE.
///
/// # Errors
///
/// Returns an error when the table name cannot be quoted.
pub fn render_drop_table(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    name: &str,
) -> Result<Rendered> {
    Ok(Rendered::statement(format!(
        "DROP TABLE {}",
        qualified_name(dialect, schema, name)?
    )))
}

/// Renders a table rename.
///
/// # Errors
///
/// Returns an error when either name cannot be quoted.
pub fn render_rename_table(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    old_name: &str,
    new_name: &str,
) -> Result<Rendered> {
    let statement = match dialect.kind() {
        DialectKind::Mysql => format!(
            "RENAME TABLE {} TO {}",
            qualified_name(dialect, schema, old_name)?,
            qualified_name(dialect, schema, new_name)?
        ),
        DialectKind::Mssql => format!(
            "EXEC sp_rename {}, {}",
            dialect.quote_literal(&object_path(schema, old_name)),
            dialect.quote_literal(new_name)
        ),
        DialectKind::Sqlite | DialectKind::Postgres => format!(
            "ALTER TABLE {} RENAME TO {}",
            qualified_name(dialect, schema, old_name)?,
            dialect.quote_identifier(new_name)?
        ),
    };
    Ok(Rendered::statement(statement))
}

fn object_path(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(s) => format!("{s}.{name}"),
        None => name.to_string(),
    }
}

/// Renders ADD COLUMN.
///
/// # Errors
///
/// Returns an error on unquotable identifiers or unmappable column types.
pub fn render_add_column(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    column: &Column,
) -> Result<Rendered> {
    let keyword = match dialect.kind() {
        DialectKind::Mssql => "ADD",
        _ => "ADD COLUMN",
    };
    Ok(Rendered::statement(format!(
        "ALTER TABLE {} {keyword} {}",
        qualified_name(dialect, schema, table)?,
        column_definition(dialect, column, false)?
    )))
}

/// Renders DROP COLUMN.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_drop_column(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    column: &str,
) -> Result<Rendered> {
    Ok(Rendered::statement(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        qualified_name(dialect, schema, table)?,
        dialect.quote_identifier(column)?
    )))
}

/// Renders a native column rename.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_rename_column(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    old_name: &str,
    new_name: &str,
) -> Result<Rendered> {
    let statement = match dialect.kind() {
        DialectKind::Mssql => format!(
            "EXEC sp_rename {}, {}, 'COLUMN'",
            dialect.quote_literal(&format!("{}.{old_name}", object_path(schema, table))),
            dialect.quote_literal(new_name)
        ),
        _ => format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            qualified_name(dialect, schema, table)?,
            dialect.quote_identifier(old_name)?,
            dialect.quote_identifier(new_name)?
        ),
    };
    Ok(Rendered::statement(statement))
}

/// Renders an in-place column alteration to the target definition.
///
/// Only meaningful on dialects whose capabilities allow the change; the
/// recreation planner covers the rest.
///
/// # Errors
///
/// Returns an error on unquotable identifiers or unmappable column types.
pub fn render_alter_column(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    column: &Column,
) -> Result<Rendered> {
    let qualified = qualified_name(dialect, schema, table)?;
    let quoted_col = dialect.quote_identifier(&column.name)?;
    let native = dialect.column_native_type(column)?;
    let statement = match dialect.kind() {
        DialectKind::Mysql => format!(
            "ALTER TABLE {qualified} MODIFY COLUMN {}",
            column_definition(dialect, column, false)?
        ),
        DialectKind::Mssql => format!(
            "ALTER TABLE {qualified} ALTER COLUMN {quoted_col} {native} {}",
            if column.nullable { "NULL" } else { "NOT NULL" }
        ),
        DialectKind::Postgres | DialectKind::Sqlite => {
            let mut actions = vec![format!("ALTER COLUMN {quoted_col} TYPE {native}")];
            actions.push(format!(
                "ALTER COLUMN {quoted_col} {} NOT NULL",
                if column.nullable { "DROP" } else { "SET" }
            ));
            match dialect.format_default(&column.default) {
                Some(default_sql) => actions.push(format!(
                    "ALTER COLUMN {quoted_col} SET DEFAULT {default_sql}"
                )),
                None => actions.push(format!("ALTER COLUMN {quoted_col} DROP DEFAULT")),
            }
            format!("ALTER TABLE {qualified} {}", actions.join(", "))
        }
    };
    Ok(Rendered::statement(statement))
}

/// Renders CREATE INDEX with per-column directions.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_create_index(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    index: &Index,
) -> Result<Rendered> {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|c| {
            Ok(format!(
                "{} {}",
                dialect.quote_identifier(&c.name)?,
                c.order.to_sql()
            ))
        })
        .collect::<Result<_>>()?;
    Ok(Rendered::statement(format!(
        "CREATE {unique}INDEX {} ON {} ({})",
        dialect.quote_identifier(&index.name)?,
        qualified_name(dialect, schema, table)?,
        columns.join(", ")
    )))
}

/// Renders DROP INDEX.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_drop_index(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    name: &str,
) -> Result<Rendered> {
    let statement = match dialect.kind() {
        DialectKind::Mysql | DialectKind::Mssql => format!(
            "DROP INDEX {} ON {}",
            dialect.quote_identifier(name)?,
            qualified_name(dialect, schema, table)?
        ),
        DialectKind::Postgres => format!("DROP INDEX {}", qualified_name(dialect, schema, name)?),
        DialectKind::Sqlite => format!("DROP INDEX {}", dialect.quote_identifier(name)?),
    };
    Ok(Rendered::statement(statement))
}

/// Renders ADD CONSTRAINT ... PRIMARY KEY.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_add_primary_key(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    name: Option<&str>,
    columns: &[String],
) -> Result<Rendered> {
    let qualified = qualified_name(dialect, schema, table)?;
    let cols = quoted_list(dialect, columns)?;
    let statement = match (dialect.kind(), name) {
        (DialectKind::Mysql, _) => format!("ALTER TABLE {qualified} ADD PRIMARY KEY ({cols})"),
        (_, Some(n)) => format!(
            "ALTER TABLE {qualified} ADD CONSTRAINT {} PRIMARY KEY ({cols})",
            dialect.quote_identifier(n)?
        ),
        (_, None) => format!("ALTER TABLE {qualified} ADD PRIMARY KEY ({cols})"),
    };
    Ok(Rendered::statement(statement))
}

/// Renders ADD CONSTRAINT ... FOREIGN KEY.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_add_foreign_key(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    fk: &ForeignKey,
) -> Result<Rendered> {
    Ok(Rendered::statement(format!(
        "ALTER TABLE {} ADD {}",
        qualified_name(dialect, schema, table)?,
        foreign_key_clause(dialect, fk)?
    )))
}

/// Renders the addition of a unique constraint. On SQLite this is a unique
/// index, which is how the engine models unique constraints there.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_add_unique(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    unique: &UniqueConstraint,
) -> Result<Rendered> {
    if dialect.kind() == DialectKind::Sqlite {
        let index = Index {
            name: unique.name.clone(),
            columns: unique
                .columns
                .iter()
                .map(|c| crate::model::IndexColumn::asc(c.clone()))
                .collect(),
            unique: true,
        };
        return render_create_index(dialect, schema, table, &index);
    }
    Ok(Rendered::statement(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
        qualified_name(dialect, schema, table)?,
        dialect.quote_identifier(&unique.name)?,
        quoted_list(dialect, &unique.columns)?
    )))
}

/// Renders ADD CONSTRAINT ... CHECK.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_add_check(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    check: &CheckConstraint,
) -> Result<Rendered> {
    Ok(Rendered::statement(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
        qualified_name(dialect, schema, table)?,
        dialect.quote_identifier(&check.name)?,
        check.expression
    )))
}

/// Renders the addition of a column default.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_add_default(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    name: &str,
    column: &str,
    value: &DefaultValue,
) -> Result<Rendered> {
    let qualified = qualified_name(dialect, schema, table)?;
    let quoted_col = dialect.quote_identifier(column)?;
    let default_sql = dialect
        .format_default(value)
        .unwrap_or_else(|| "NULL".to_string());
    let statement = match dialect.kind() {
        DialectKind::Mssql => format!(
            "ALTER TABLE {qualified} ADD CONSTRAINT {} DEFAULT {default_sql} FOR {quoted_col}",
            dialect.quote_identifier(name)?
        ),
        _ => format!(
            "ALTER TABLE {qualified} ALTER COLUMN {quoted_col} SET DEFAULT {default_sql}"
        ),
    };
    Ok(Rendered::statement(statement))
}

/// Renders the removal of a column default.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_drop_default(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    name: &str,
    column: &str,
) -> Result<Rendered> {
    let qualified = qualified_name(dialect, schema, table)?;
    let statement = match dialect.kind() {
        DialectKind::Mssql => format!(
            "ALTER TABLE {qualified} DROP CONSTRAINT {}",
            dialect.quote_identifier(name)?
        ),
        _ => format!(
            "ALTER TABLE {qualified} ALTER COLUMN {} DROP DEFAULT",
            dialect.quote_identifier(column)?
        ),
    };
    Ok(Rendered::statement(statement))
}

/// Kinds of named table constraints that can be dropped in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintDropKind {
    /// A primary key constraint.
    PrimaryKey,
    /// A foreign key constraint.
    ForeignKey,
    /// A unique constraint.
    Unique,
    /// A check constraint.
    Check,
}

/// Renders the removal of a named constraint.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_drop_constraint(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    name: &str,
    kind: ConstraintDropKind,
) -> Result<Rendered> {
    let qualified = qualified_name(dialect, schema, table)?;
    let quoted = dialect.quote_identifier(name)?;
    let statement = match (dialect.kind(), kind) {
        (DialectKind::Sqlite, ConstraintDropKind::Unique) => {
            format!("DROP INDEX {quoted}")
        }
        (DialectKind::Mysql, ConstraintDropKind::PrimaryKey) => {
            format!("ALTER TABLE {qualified} DROP PRIMARY KEY")
        }
        (DialectKind::Mysql, ConstraintDropKind::ForeignKey) => {
            format!("ALTER TABLE {qualified} DROP FOREIGN KEY {quoted}")
        }
        (DialectKind::Mysql, ConstraintDropKind::Unique) => {
            format!("ALTER TABLE {qualified} DROP INDEX {quoted}")
        }
        (DialectKind::Mysql, ConstraintDropKind::Check) => {
            format!("ALTER TABLE {qualified} DROP CHECK {quoted}")
        }
        _ => format!("ALTER TABLE {qualified} DROP CONSTRAINT {quoted}"),
    };
    Ok(Rendered::statement(statement))
}

/// Renders CREATE VIEW, resolving the `{schema}` placeholder in the
/// defining query to `"schema".` (or nothing when schemas don't apply).
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_create_view(dialect: &dyn SqlDialect, view: &View) -> Result<Rendered> {
    let mut prerequisites = Vec::new();
    if let Some(schema) = &view.schema {
        if dialect.capabilities().supports_schemas {
            prerequisites.push(render_create_schema(dialect, schema)?.statement);
        }
    }

    let resolved_prefix = match &view.schema {
        Some(schema) if dialect.capabilities().supports_schemas => {
            format!("{}.", dialect.quote_identifier(schema)?)
        }
        _ => String::new(),
    };
    let query = view.query.replace("{schema}", &resolved_prefix);

    Ok(Rendered {
        statement: format!(
            "CREATE VIEW {} AS {query}",
            qualified_name(dialect, view.schema.as_deref(), &view.name)?
        ),
        prerequisites,
    })
}

/// Renders DROP VIEW.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_drop_view(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    name: &str,
) -> Result<Rendered> {
    Ok(Rendered::statement(format!(
        "DROP VIEW {}",
        qualified_name(dialect, schema, name)?
    )))
}

/// Renders the bulk row copy used by the recreation planner: one INSERT ...
/// SELECT over the given (target, source) column pairs.
///
/// # Errors
///
/// Returns an error when any identifier cannot be quoted.
pub fn render_copy_rows(
    dialect: &dyn SqlDialect,
    schema: Option<&str>,
    target: &str,
    source: &str,
    columns: &[(String, String)],
) -> Result<Rendered> {
    let insert_cols: Vec<String> = columns
        .iter()
        .map(|(t, _)| dialect.quote_identifier(t))
        .collect::<Result<_>>()?;
    let select_cols: Vec<String> = columns
        .iter()
        .map(|(_, s)| dialect.quote_identifier(s))
        .collect::<Result<_>>()?;
    Ok(Rendered::statement(format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        qualified_name(dialect, schema, target)?,
        insert_cols.join(", "),
        select_cols.join(", "),
        qualified_name(dialect, schema, source)?
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{dialect_for, DialectKind};
    use crate::model::{ForeignKeyAction, ForeignKeyBuilder, IndexColumn};
    use crate::types::TypeDescriptor;

    fn orders() -> Table {
        Table::new("orders")
            .column(
                Column::new("id", TypeDescriptor::Int64)
                    .primary_key()
                    .auto_increment(),
            )
            .column(Column::new("amount", TypeDescriptor::decimal(18, 6)).not_null())
            .column(
                Column::new("status", TypeDescriptor::varstring(20))
                    .not_null()
                    .default(DefaultValue::String("pending".to_string())),
            )
    }

    #[test]
    fn test_create_table_sqlite() {
        let d = dialect_for(DialectKind::Sqlite);
        let rendered = render_create_table(d, &orders()).unwrap();
        assert!(rendered.prerequisites.is_empty());
        assert!(rendered.statement.starts_with("CREATE TABLE \"orders\""));
        assert!(rendered
            .statement
            .contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(rendered.statement.contains("\"amount\" NUMERIC(18,6) NOT NULL"));
        assert!(rendered
            .statement
            .contains("\"status\" VARCHAR(20) NOT NULL DEFAULT 'pending'"));
    }

    #[test]
    fn test_create_table_schema_prerequisite() {
        let d = dialect_for(DialectKind::Postgres);
        let table = orders().schema("sales");
        let rendered = render_create_table(d, &table).unwrap();
        assert_eq!(
            rendered.prerequisites,
            vec!["CREATE SCHEMA IF NOT EXISTS \"sales\"".to_string()]
        );
        assert!(rendered
            .statement
            .starts_with("CREATE TABLE \"sales\".\"orders\""));
        assert!(rendered
            .statement
            .contains("\"id\" BIGINT PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY"));
    }

    #[test]
    fn test_create_table_composite_key_and_fk() {
        let d = dialect_for(DialectKind::Sqlite);
        let table = Table::new("order_items")
            .column(Column::new("order_id", TypeDescriptor::Int64).not_null())
            .column(Column::new("line", TypeDescriptor::Int32).not_null())
            .primary_key(None, vec!["order_id".to_string(), "line".to_string()])
            .foreign_key(
                ForeignKeyBuilder::new("fk_items_order")
                    .columns(vec!["order_id".to_string()])
                    .references("orders", vec!["id".to_string()])
                    .on_delete(ForeignKeyAction::Cascade)
                    .build(),
            );
        let rendered = render_create_table(d, &table).unwrap();
        assert!(rendered
            .statement
            .contains("PRIMARY KEY (\"order_id\", \"line\")"));
        assert!(rendered.statement.contains(
            "CONSTRAINT \"fk_items_order\" FOREIGN KEY (\"order_id\") REFERENCES \"orders\" (\"id\") ON DELETE CASCADE ON UPDATE NO ACTION"
        ));
    }

    #[test]
    fn test_create_table_without_foreign_keys() {
        let d = dialect_for(DialectKind::Postgres);
        let table = orders().foreign_key(
            ForeignKeyBuilder::new("fk_x")
                .columns(vec!["amount".to_string()])
                .references("other", vec!["id".to_string()])
                .build(),
        );
        let rendered = render_create_table_filtered(d, &table, false).unwrap();
        assert!(!rendered.statement.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_mysql_skips_check_clauses() {
        let d = dialect_for(DialectKind::Mysql);
        let table = orders().check_constraint(CheckConstraint::new("ck_amount", "amount >= 0"));
        let rendered = render_create_table(d, &table).unwrap();
        assert!(!rendered.statement.contains("CHECK"));
    }

    #[test]
    fn test_add_column_keyword_per_dialect() {
        let col = Column::new("note", TypeDescriptor::Text);
        let mssql = render_add_column(dialect_for(DialectKind::Mssql), Some("dbo"), "orders", &col)
            .unwrap();
        assert_eq!(
            mssql.statement,
            "ALTER TABLE [dbo].[orders] ADD [note] NVARCHAR(MAX)"
        );
        let sqlite =
            render_add_column(dialect_for(DialectKind::Sqlite), None, "orders", &col).unwrap();
        assert_eq!(
            sqlite.statement,
            "ALTER TABLE \"orders\" ADD COLUMN \"note\" TEXT"
        );
    }

    #[test]
    fn test_create_index_directions() {
        let d = dialect_for(DialectKind::Sqlite);
        let index = Index::new(
            "idx_orders_customer_date",
            vec![
                IndexColumn::asc("customer_id"),
                IndexColumn::desc("order_date"),
            ],
        );
        let rendered = render_create_index(d, None, "orders", &index).unwrap();
        assert_eq!(
            rendered.statement,
            "CREATE INDEX \"idx_orders_customer_date\" ON \"orders\" (\"customer_id\" ASC, \"order_date\" DESC)"
        );
    }

    #[test]
    fn test_drop_index_per_dialect() {
        assert_eq!(
            render_drop_index(dialect_for(DialectKind::Mysql), None, "orders", "idx")
                .unwrap()
                .statement,
            "DROP INDEX `idx` ON `orders`"
        );
        assert_eq!(
            render_drop_index(dialect_for(DialectKind::Sqlite), None, "orders", "idx")
                .unwrap()
                .statement,
            "DROP INDEX \"idx\""
        );
    }

    #[test]
    fn test_rename_column_mssql_uses_sp_rename() {
        let rendered = render_rename_column(
            dialect_for(DialectKind::Mssql),
            Some("dbo"),
            "orders",
            "status",
            "state",
        )
        .unwrap();
        assert_eq!(
            rendered.statement,
            "EXEC sp_rename 'dbo.orders.status', 'state', 'COLUMN'"
        );
    }

    #[test]
    fn test_unique_on_sqlite_is_unique_index() {
        let unique = UniqueConstraint {
            name: "uq_orders_ref".to_string(),
            columns: vec!["reference".to_string()],
        };
        let rendered =
            render_add_unique(dialect_for(DialectKind::Sqlite), None, "orders", &unique).unwrap();
        assert_eq!(
            rendered.statement,
            "CREATE UNIQUE INDEX \"uq_orders_ref\" ON \"orders\" (\"reference\" ASC)"
        );
    }

    #[test]
    fn test_create_view_resolves_schema_placeholder() {
        let d = dialect_for(DialectKind::Postgres);
        let view = View::new("recent_orders", "SELECT * FROM {schema}orders WHERE amount > 0")
            .schema("sales");
        let rendered = render_create_view(d, &view).unwrap();
        assert_eq!(
            rendered.statement,
            "CREATE VIEW \"sales\".\"recent_orders\" AS SELECT * FROM \"sales\".orders WHERE amount > 0"
        );

        let sqlite = dialect_for(DialectKind::Sqlite);
        let view = View::new("recent_orders", "SELECT * FROM {schema}orders");
        let rendered = render_create_view(sqlite, &view).unwrap();
        assert_eq!(
            rendered.statement,
            "CREATE VIEW \"recent_orders\" AS SELECT * FROM orders"
        );
    }

    #[test]
    fn test_copy_rows() {
        let d = dialect_for(DialectKind::Sqlite);
        let rendered = render_copy_rows(
            d,
            None,
            "orders__rebuild_1",
            "orders",
            &[
                ("id".to_string(), "id".to_string()),
                ("amount".to_string(), "amount".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(
            rendered.statement,
            "INSERT INTO \"orders__rebuild_1\" (\"id\", \"amount\") SELECT \"id\", \"amount\" FROM \"orders\""
        );
    }

    #[test]
    fn test_rendered_in_order() {
        let rendered = Rendered {
            statement: "B".to_string(),
            prerequisites: vec!["A".to_string()],
        };
        assert_eq!(rendered.in_order(), vec!["A", "B"]);
    }
}
