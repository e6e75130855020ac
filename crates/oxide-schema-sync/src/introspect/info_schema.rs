//! Catalog introspection for the server dialects.
//!
//! PostgreSQL, MySQL and SQL Server all expose the standard
//! `information_schema` views, which cover tables, columns and key
//! constraints with one shared shape. Index metadata has no standard view,
//! so each dialect contributes its own query text; the row handling is
//! shared.

use std::collections::BTreeMap;

use oxide_schema::dialect::{DialectKind, SqlDialect};
use oxide_schema::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKey, ForeignKeyAction, Index, IndexColumn,
    PrimaryKey, SortOrder, Table, UniqueConstraint, View,
};

use crate::error::Result;
use crate::executor::{Executor, SqlValue};

use super::{parse_default, run_query};

/// Renders the `table_schema` predicate, falling back to the dialect's
/// default namespace when the caller supplied none.
fn schema_predicate(dialect: &dyn SqlDialect, column: &str, schema: Option<&str>) -> String {
    match (dialect.kind(), schema) {
        (_, Some(s)) => format!("{column} = {}", dialect.quote_literal(s)),
        (DialectKind::Mysql, None) => format!("{column} = DATABASE()"),
        (DialectKind::Mssql, None) => format!("{column} = 'dbo'"),
        _ => format!("{column} = 'public'"),
    }
}

fn object_id_literal(dialect: &dyn SqlDialect, schema: Option<&str>, table: &str) -> String {
    let path = match schema {
        Some(s) => format!("{s}.{table}"),
        None => format!("dbo.{table}"),
    };
    dialect.quote_literal(&path)
}

pub(super) async fn table_exists<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    name: &str,
) -> Result<bool> {
    let sql = format!(
        "SELECT table_name FROM information_schema.tables \
         WHERE {} AND table_name = {}",
        schema_predicate(dialect, "table_schema", schema),
        dialect.quote_literal(name)
    );
    let rows = run_query(executor, &sql, &format!("table '{name}'")).await?;
    Ok(!rows.is_empty())
}

pub(super) async fn list_tables<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT table_name FROM information_schema.tables \
         WHERE {} AND table_type = 'BASE TABLE' ORDER BY table_name",
        schema_predicate(dialect, "table_schema", schema)
    );
    let rows = run_query(executor, &sql, "table list").await?;
    Ok(rows
        .into_iter()
        .filter_map(|mut row| row.swap_remove(0).into_string())
        .collect())
}

pub(super) async fn get_view<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    name: &str,
) -> Result<Option<View>> {
    let sql = format!(
        "SELECT view_definition FROM information_schema.views \
         WHERE {} AND table_name = {}",
        schema_predicate(dialect, "table_schema", schema),
        dialect.quote_literal(name)
    );
    let rows = run_query(executor, &sql, &format!("view '{name}'")).await?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    Ok(Some(View {
        schema: schema.map(str::to_string),
        name: name.to_string(),
        query: row
            .into_iter()
            .next()
            .and_then(SqlValue::into_string)
            .unwrap_or_default(),
    }))
}

pub(super) async fn index_exists<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    table: &str,
    name: &str,
) -> Result<bool> {
    let sql = match dialect.kind() {
        DialectKind::Mysql => format!(
            "SELECT DISTINCT index_name FROM information_schema.statistics \
             WHERE {} AND table_name = {} AND index_name = {}",
            schema_predicate(dialect, "table_schema", schema),
            dialect.quote_literal(table),
            dialect.quote_literal(name)
        ),
        DialectKind::Mssql => format!(
            "SELECT name FROM sys.indexes \
             WHERE object_id = OBJECT_ID({}) AND name = {}",
            object_id_literal(dialect, schema, table),
            dialect.quote_literal(name)
        ),
        _ => format!(
            "SELECT indexname FROM pg_indexes WHERE {} AND tablename = {} AND indexname = {}",
            schema_predicate(dialect, "schemaname", schema),
            dialect.quote_literal(table),
            dialect.quote_literal(name)
        ),
    };
    let rows = run_query(executor, &sql, &format!("index '{name}'")).await?;
    Ok(!rows.is_empty())
}

/// Rebuilds a native type string from `information_schema.columns` facts so
/// the dialect's type catalog can parse it.
fn native_string(
    data_type: &str,
    char_length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    if let Some(len) = char_length {
        if len < 0 {
            return format!("{data_type}(max)");
        }
        return format!("{data_type}({len})");
    }
    match (data_type.to_lowercase().as_str(), precision) {
        ("numeric" | "decimal" | "dec" | "fixed", Some(p)) => {
            format!("{data_type}({p},{})", scale.unwrap_or(0))
        }
        _ => data_type.to_string(),
    }
}

/// Strips a PostgreSQL cast suffix (`'x'::character varying`) from a stored
/// column default.
fn strip_cast(default: &str) -> &str {
    match default.find("::") {
        Some(pos) => default[..pos].trim(),
        None => default.trim(),
    }
}

pub(super) async fn get_table<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    name: &str,
) -> Result<Option<Table>> {
    let object = format!("table '{name}'");
    if !table_exists(executor, dialect, schema, name).await? {
        return Ok(None);
    }

    let mut table = Table::new(name);
    table.schema = schema.map(str::to_string);

    load_columns(executor, dialect, schema, &mut table, &object).await?;
    load_keys(executor, dialect, schema, &mut table, &object).await?;
    load_foreign_keys(executor, dialect, schema, &mut table, &object).await?;
    if dialect.capabilities().supports_check_constraints {
        load_checks(executor, dialect, schema, &mut table, &object).await?;
    }
    load_indexes(executor, dialect, schema, &mut table, &object).await?;
    if dialect.kind() == DialectKind::Mssql {
        load_default_constraints(executor, dialect, schema, &mut table, &object).await?;
    }

    Ok(Some(table))
}

async fn load_columns<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    table: &mut Table,
    object: &str,
) -> Result<()> {
    let sql = format!(
        "SELECT column_name, data_type, character_maximum_length, numeric_precision, \
                numeric_scale, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE {} AND table_name = {} ORDER BY ordinal_position",
        schema_predicate(dialect, "table_schema", schema),
        dialect.quote_literal(&table.name)
    );
    let rows = run_query(executor, &sql, object).await?;
    for row in rows {
        let col_name = row[0].as_str().unwrap_or_default().to_string();
        let native = native_string(
            row[1].as_str().unwrap_or_default(),
            row[2].as_i64(),
            row[3].as_i64(),
            row[4].as_i64(),
        );
        let mut column = Column::new(col_name, dialect.from_native_type(&native));
        column.nullable = row[5]
            .as_str()
            .is_some_and(|v| v.eq_ignore_ascii_case("YES"));
        column.default = row[6].as_str().map_or(
            oxide_schema::model::DefaultValue::None,
            |raw| parse_default(Some(strip_cast(raw))),
        );
        table.columns.push(column);
    }
    Ok(())
}

async fn load_keys<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    table: &mut Table,
    object: &str,
) -> Result<()> {
    let sql = format!(
        "SELECT tc.constraint_type, tc.constraint_name, kcu.column_name, kcu.ordinal_position \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON kcu.constraint_name = tc.constraint_name \
          AND kcu.table_schema = tc.table_schema \
          AND kcu.table_name = tc.table_name \
         WHERE {} AND tc.table_name = {} \
           AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
         ORDER BY tc.constraint_name, kcu.ordinal_position",
        schema_predicate(dialect, "tc.table_schema", schema),
        dialect.quote_literal(&table.name)
    );
    let rows = run_query(executor, &sql, object).await?;

    let mut primary: Vec<String> = Vec::new();
    let mut primary_name: Option<String> = None;
    let mut uniques: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let kind = row[0].as_str().unwrap_or_default().to_string();
        let constraint = row[1].as_str().unwrap_or_default().to_string();
        let column = row[2].as_str().unwrap_or_default().to_string();
        if kind == "PRIMARY KEY" {
            if !constraint.eq_ignore_ascii_case("PRIMARY") {
                primary_name = Some(constraint);
            }
            primary.push(column);
        } else {
            uniques.entry(constraint).or_default().push(column);
        }
    }

    if primary.len() == 1 {
        if let Some(col) = table
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&primary[0]))
        {
            col.primary_key = true;
            col.nullable = false;
        }
    } else if !primary.is_empty() {
        for name in &primary {
            if let Some(col) = table
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(name))
            {
                col.primary_key = true;
                col.nullable = false;
            }
        }
        table.primary_key = Some(PrimaryKey {
            name: primary_name,
            columns: primary,
        });
    }

    for (name, columns) in uniques {
        if columns.len() == 1 {
            if let Some(col) = table
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(&columns[0]))
            {
                col.unique = true;
                continue;
            }
        }
        table.unique_constraints.push(UniqueConstraint { name, columns });
    }
    Ok(())
}

async fn load_foreign_keys<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    table: &mut Table,
    object: &str,
) -> Result<()> {
    let sql = match dialect.kind() {
        DialectKind::Mysql => format!(
            "SELECT kcu.constraint_name, kcu.column_name, kcu.referenced_table_schema, \
                    kcu.referenced_table_name, kcu.referenced_column_name, \
                    rc.update_rule, rc.delete_rule \
             FROM information_schema.key_column_usage kcu \
             JOIN information_schema.referential_constraints rc \
               ON rc.constraint_schema = kcu.constraint_schema \
              AND rc.constraint_name = kcu.constraint_name \
             WHERE {} AND kcu.table_name = {} \
               AND kcu.referenced_table_name IS NOT NULL \
             ORDER BY kcu.constraint_name, kcu.ordinal_position",
            schema_predicate(dialect, "kcu.table_schema", schema),
            dialect.quote_literal(&table.name)
        ),
        _ => format!(
            "SELECT tc.constraint_name, kcu.column_name, ccu.table_schema, \
                    ccu.table_name, ccu.column_name, rc.update_rule, rc.delete_rule \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON kcu.constraint_name = tc.constraint_name \
              AND kcu.table_schema = tc.table_schema \
             JOIN information_schema.referential_constraints rc \
               ON rc.constraint_name = tc.constraint_name \
              AND rc.constraint_schema = tc.table_schema \
             JOIN information_schema.constraint_column_usage ccu \
               ON ccu.constraint_name = rc.unique_constraint_name \
              AND ccu.table_schema = rc.unique_constraint_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND {} AND tc.table_name = {} \
             ORDER BY tc.constraint_name, kcu.ordinal_position",
            schema_predicate(dialect, "tc.table_schema", schema),
            dialect.quote_literal(&table.name)
        ),
    };
    let rows = run_query(executor, &sql, object).await?;

    let mut groups: BTreeMap<String, ForeignKey> = BTreeMap::new();
    for row in rows {
        let name = row[0].as_str().unwrap_or_default().to_string();
        let entry = groups.entry(name.clone()).or_insert_with(|| ForeignKey {
            name,
            columns: Vec::new(),
            references_schema: row[2].as_str().map(str::to_string),
            references_table: row[3].as_str().unwrap_or_default().to_string(),
            references_columns: Vec::new(),
            on_update: ForeignKeyAction::parse(row[5].as_str().unwrap_or_default()),
            on_delete: ForeignKeyAction::parse(row[6].as_str().unwrap_or_default()),
        });
        entry
            .columns
            .push(row[1].as_str().unwrap_or_default().to_string());
        if let Some(referenced) = row[4].as_str() {
            entry.references_columns.push(referenced.to_string());
        }
    }
    table.foreign_keys.extend(groups.into_values());
    Ok(())
}

async fn load_checks<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    table: &mut Table,
    object: &str,
) -> Result<()> {
    let sql = format!(
        "SELECT tc.constraint_name, cc.check_clause \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.check_constraints cc \
           ON cc.constraint_schema = tc.table_schema \
          AND cc.constraint_name = tc.constraint_name \
         WHERE tc.constraint_type = 'CHECK' AND {} AND tc.table_name = {} \
         ORDER BY tc.constraint_name",
        schema_predicate(dialect, "tc.table_schema", schema),
        dialect.quote_literal(&table.name)
    );
    let rows = run_query(executor, &sql, object).await?;
    for row in rows {
        let name = row[0].as_str().unwrap_or_default().to_string();
        let clause = row[1].as_str().unwrap_or_default().trim().to_string();
        // PostgreSQL surfaces NOT NULL as generated check constraints.
        if clause.to_uppercase().ends_with("IS NOT NULL") {
            continue;
        }
        table
            .check_constraints
            .push(CheckConstraint::new(name, clause));
    }
    Ok(())
}

async fn load_indexes<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    table: &mut Table,
    object: &str,
) -> Result<()> {
    // Normalized row shape: index name, is_unique, ordinal, column, is_descending.
    let sql = match dialect.kind() {
        DialectKind::Mysql => format!(
            "SELECT index_name, CASE non_unique WHEN 0 THEN 1 ELSE 0 END, seq_in_index, \
                    column_name, CASE collation WHEN 'D' THEN 1 ELSE 0 END \
             FROM information_schema.statistics \
             WHERE {} AND table_name = {} AND index_name <> 'PRIMARY' \
             ORDER BY index_name, seq_in_index",
            schema_predicate(dialect, "table_schema", schema),
            dialect.quote_literal(&table.name)
        ),
        DialectKind::Mssql => format!(
            "SELECT i.name, CAST(i.is_unique AS INT), ic.key_ordinal, c.name, \
                    CAST(ic.is_descending_key AS INT) \
             FROM sys.indexes i \
             JOIN sys.index_columns ic \
               ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
             JOIN sys.columns c \
               ON c.object_id = i.object_id AND c.column_id = ic.column_id \
             WHERE i.object_id = OBJECT_ID({}) AND i.is_primary_key = 0 \
               AND i.is_unique_constraint = 0 AND ic.is_included_column = 0 \
             ORDER BY i.name, ic.key_ordinal",
            object_id_literal(dialect, schema, &table.name)
        ),
        _ => format!(
            "SELECT i.relname, CASE WHEN ix.indisunique THEN 1 ELSE 0 END, k.n, \
                    a.attname, ix.indoption[k.n - 1] & 1 \
             FROM pg_index ix \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             JOIN generate_subscripts(ix.indkey, 1) k(n) ON TRUE \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ix.indkey[k.n - 1] \
             WHERE {} AND t.relname = {} AND NOT ix.indisprimary \
             ORDER BY i.relname, k.n",
            schema_predicate(dialect, "n.nspname", schema),
            dialect.quote_literal(&table.name)
        ),
    };
    let rows = run_query(executor, &sql, object).await?;

    let constraint_backed: Vec<String> = table
        .unique_constraints
        .iter()
        .map(|u| u.name.to_lowercase())
        .collect();

    let mut groups: BTreeMap<String, Index> = BTreeMap::new();
    for row in rows {
        let name = row[0].as_str().unwrap_or_default().to_string();
        if constraint_backed.contains(&name.to_lowercase()) {
            continue;
        }
        let unique = row[1].as_i64().unwrap_or(0) != 0;
        let order = if row[4].as_i64().unwrap_or(0) != 0 {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        let column = row[3].as_str().unwrap_or_default().to_string();
        groups
            .entry(name.clone())
            .or_insert_with(|| Index {
                name,
                columns: Vec::new(),
                unique,
            })
            .columns
            .push(IndexColumn {
                name: column,
                order,
            });
    }
    table.indexes.extend(groups.into_values());
    Ok(())
}

async fn load_default_constraints<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    schema: Option<&str>,
    table: &mut Table,
    object: &str,
) -> Result<()> {
    let sql = format!(
        "SELECT dc.name, c.name, dc.definition \
         FROM sys.default_constraints dc \
         JOIN sys.columns c \
           ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id \
         WHERE dc.parent_object_id = OBJECT_ID({})",
        object_id_literal(dialect, schema, &table.name)
    );
    let rows = run_query(executor, &sql, object).await?;
    for row in rows {
        let definition = row[2].as_str().unwrap_or_default();
        // Definitions arrive parenthesised, e.g. ('pending') or ((0)).
        let trimmed = definition
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')');
        table.default_constraints.push(DefaultConstraint {
            name: row[0].as_str().unwrap_or_default().to_string(),
            column: row[1].as_str().unwrap_or_default().to_string(),
            value: parse_default(Some(trimmed)),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_string() {
        assert_eq!(native_string("varchar", Some(255), None, None), "varchar(255)");
        assert_eq!(native_string("nvarchar", Some(-1), None, None), "nvarchar(max)");
        assert_eq!(
            native_string("numeric", None, Some(18), Some(6)),
            "numeric(18,6)"
        );
        assert_eq!(native_string("integer", None, Some(32), Some(0)), "integer");
    }

    #[test]
    fn test_strip_cast() {
        assert_eq!(strip_cast("'pending'::character varying"), "'pending'");
        assert_eq!(strip_cast("42"), "42");
    }

    #[test]
    fn test_schema_predicate_defaults() {
        use oxide_schema::dialect::{dialect_for, DialectKind};
        assert_eq!(
            schema_predicate(dialect_for(DialectKind::Postgres), "table_schema", None),
            "table_schema = 'public'"
        );
        assert_eq!(
            schema_predicate(dialect_for(DialectKind::Mysql), "table_schema", None),
            "table_schema = DATABASE()"
        );
        assert_eq!(
            schema_predicate(
                dialect_for(DialectKind::Mssql),
                "table_schema",
                Some("sales")
            ),
            "table_schema = 'sales'"
        );
    }
}
