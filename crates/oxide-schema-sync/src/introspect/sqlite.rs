//! SQLite catalog introspection.
//!
//! Column, key and index metadata come from PRAGMA queries. SQLite does not
//! expose constraint names or CHECK expressions through any pragma, so
//! those are recovered from the stored `CREATE TABLE` text in
//! `sqlite_master` with a small token scanner that respects quoting.

use std::collections::BTreeMap;

use oxide_schema::dialect::SqlDialect;
use oxide_schema::model::{
    CheckConstraint, Column, DefaultValue, ForeignKey, ForeignKeyAction, Index, IndexColumn,
    PrimaryKey, SortOrder, Table, UniqueConstraint, View,
};

use crate::error::Result;
use crate::executor::{Executor, Row, SqlValue};

use super::run_query;

pub(super) async fn table_exists<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    name: &str,
) -> Result<bool> {
    let sql = format!(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
        dialect.quote_literal(name)
    );
    let rows = run_query(executor, &sql, &format!("table '{name}'")).await?;
    Ok(!rows.is_empty())
}

pub(super) async fn index_exists<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    name: &str,
) -> Result<bool> {
    let sql = format!(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name = {}",
        dialect.quote_literal(name)
    );
    let rows = run_query(executor, &sql, &format!("index '{name}'")).await?;
    Ok(!rows.is_empty())
}

pub(super) async fn list_tables<E: Executor>(
    executor: &mut E,
    _dialect: &'static dyn SqlDialect,
) -> Result<Vec<String>> {
    let sql = "SELECT name FROM sqlite_master \
               WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
    let rows = run_query(executor, sql, "table list").await?;
    Ok(rows
        .into_iter()
        .filter_map(|mut row| row.swap_remove(0).into_string())
        .collect())
}

pub(super) async fn get_view<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    name: &str,
) -> Result<Option<View>> {
    let sql = format!(
        "SELECT sql FROM sqlite_master WHERE type = 'view' AND name = {}",
        dialect.quote_literal(name)
    );
    let rows = run_query(executor, &sql, &format!("view '{name}'")).await?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    let create_sql = row
        .into_iter()
        .next()
        .and_then(SqlValue::into_string)
        .unwrap_or_default();
    Ok(Some(View {
        schema: None,
        name: name.to_string(),
        query: defining_query(&create_sql),
    }))
}

/// Extracts the defining query from a stored `CREATE VIEW ... AS <query>`.
fn defining_query(create_sql: &str) -> String {
    let upper = create_sql.to_uppercase();
    match upper.find(" AS ") {
        Some(pos) => create_sql[pos + 4..].trim().to_string(),
        None => create_sql.trim().to_string(),
    }
}

pub(super) async fn get_table<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    name: &str,
) -> Result<Option<Table>> {
    let object = format!("table '{name}'");
    let master_sql = format!(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = {}",
        dialect.quote_literal(name)
    );
    let rows = run_query(executor, &master_sql, &object).await?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    let create_sql = row
        .into_iter()
        .next()
        .and_then(SqlValue::into_string)
        .unwrap_or_default();
    let parsed = parse_table_sql(&create_sql);

    let mut table = Table::new(name);

    // Columns and primary key positions.
    let quoted = dialect.quote_identifier(name)?;
    let info_rows = run_query(executor, &format!("PRAGMA table_info({quoted})"), &object).await?;
    let mut pk_positions: Vec<(i64, String)> = Vec::new();
    for row in &info_rows {
        let col_name = row[1].as_str().unwrap_or_default().to_string();
        let native = row[2].as_str().unwrap_or_default();
        let notnull = row[3].as_i64().unwrap_or(0) != 0;
        let default = parse_default(row[4].as_str());
        let pk_pos = row[5].as_i64().unwrap_or(0);

        let mut column = Column::new(col_name.clone(), dialect.from_native_type(native));
        column.nullable = !notnull && pk_pos == 0;
        column.default = default;
        if pk_pos > 0 {
            column.primary_key = true;
            column.nullable = false;
            pk_positions.push((pk_pos, col_name));
        }
        table.columns.push(column);
    }

    pk_positions.sort_by_key(|(pos, _)| *pos);
    if pk_positions.len() > 1 {
        table.primary_key = Some(PrimaryKey {
            name: parsed.primary_key_name.clone(),
            columns: pk_positions.into_iter().map(|(_, c)| c).collect(),
        });
    } else if parsed.has_autoincrement {
        if let Some((_, pk_col)) = pk_positions.first() {
            if let Some(col) = table
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(pk_col))
            {
                col.auto_increment = true;
            }
        }
    }

    load_foreign_keys(executor, dialect, &mut table, &parsed, &object).await?;
    load_indexes(executor, dialect, &mut table, &parsed, &object).await?;

    for (i, (constraint_name, expression)) in parsed.checks.into_iter().enumerate() {
        let constraint_name =
            constraint_name.unwrap_or_else(|| format!("{name}_check_{}", i + 1));
        table
            .check_constraints
            .push(CheckConstraint::new(constraint_name, expression));
    }

    Ok(Some(table))
}

async fn load_foreign_keys<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    table: &mut Table,
    parsed: &ParsedTableSql,
    object: &str,
) -> Result<()> {
    let quoted = dialect.quote_identifier(&table.name)?;
    let rows = run_query(
        executor,
        &format!("PRAGMA foreign_key_list({quoted})"),
        object,
    )
    .await?;

    // Row layout: id, seq, table, from, to, on_update, on_delete, match.
    let mut groups: BTreeMap<i64, Vec<&Row>> = BTreeMap::new();
    for row in &rows {
        groups.entry(row[0].as_i64().unwrap_or(0)).or_default().push(row);
    }

    let mut used_names: Vec<usize> = Vec::new();
    for (id, mut group) in groups {
        group.sort_by_key(|row| row[1].as_i64().unwrap_or(0));
        let references_table = group[0][2].as_str().unwrap_or_default().to_string();
        let on_update = ForeignKeyAction::parse(group[0][5].as_str().unwrap_or_default());
        let on_delete = ForeignKeyAction::parse(group[0][6].as_str().unwrap_or_default());

        let columns: Vec<String> = group
            .iter()
            .map(|row| row[3].as_str().unwrap_or_default().to_string())
            .collect();
        let mut references_columns: Vec<String> = group
            .iter()
            .filter_map(|row| row[4].as_str().map(str::to_string))
            .collect();
        if references_columns.len() != columns.len() {
            // References an implicit primary key; resolve it.
            references_columns =
                referenced_primary_key(executor, dialect, &references_table, object).await?;
        }

        let name = parsed
            .foreign_key_names
            .iter()
            .enumerate()
            .find(|(i, (_, ref_table))| {
                !used_names.contains(i) && ref_table.eq_ignore_ascii_case(&references_table)
            })
            .map(|(i, (fk_name, _))| {
                used_names.push(i);
                fk_name.clone()
            })
            .unwrap_or_else(|| format!("{}_fk_{id}", table.name));

        table.foreign_keys.push(ForeignKey {
            name,
            columns,
            references_schema: None,
            references_table,
            references_columns,
            on_delete,
            on_update,
        });
    }
    Ok(())
}

async fn referenced_primary_key<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    table: &str,
    object: &str,
) -> Result<Vec<String>> {
    let quoted = dialect.quote_identifier(table)?;
    let rows = run_query(executor, &format!("PRAGMA table_info({quoted})"), object).await?;
    let mut pk: Vec<(i64, String)> = rows
        .iter()
        .filter(|row| row[5].as_i64().unwrap_or(0) > 0)
        .map(|row| {
            (
                row[5].as_i64().unwrap_or(0),
                row[1].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    pk.sort_by_key(|(pos, _)| *pos);
    Ok(pk.into_iter().map(|(_, c)| c).collect())
}

async fn load_indexes<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    table: &mut Table,
    parsed: &ParsedTableSql,
    object: &str,
) -> Result<()> {
    let quoted = dialect.quote_identifier(&table.name)?;
    let list_rows = run_query(executor, &format!("PRAGMA index_list({quoted})"), object).await?;

    // Row layout: seq, name, unique, origin, partial.
    for row in &list_rows {
        let index_name = row[1].as_str().unwrap_or_default().to_string();
        let unique = row[2].as_i64().unwrap_or(0) != 0;
        let origin = row[3].as_str().unwrap_or_default();

        match origin {
            // Backing index of an inline or table-level UNIQUE clause.
            "u" => {
                let columns =
                    index_columns(executor, dialect, &index_name, object).await?;
                let plain: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
                if let Some((constraint_name, _)) =
                    parsed.unique_names.iter().find(|(_, cols)| {
                        cols.len() == plain.len()
                            && cols
                                .iter()
                                .zip(&plain)
                                .all(|(a, b)| a.eq_ignore_ascii_case(b))
                    })
                {
                    table.unique_constraints.push(UniqueConstraint {
                        name: constraint_name.clone(),
                        columns: plain,
                    });
                } else if plain.len() == 1 {
                    if let Some(col) = table
                        .columns
                        .iter_mut()
                        .find(|c| c.name.eq_ignore_ascii_case(&plain[0]))
                    {
                        col.unique = true;
                    }
                } else {
                    table.unique_constraints.push(UniqueConstraint {
                        name: index_name,
                        columns: plain,
                    });
                }
            }
            "pk" => {}
            _ => {
                if index_name.starts_with("sqlite_autoindex") {
                    continue;
                }
                let columns = index_columns(executor, dialect, &index_name, object).await?;
                table.indexes.push(Index {
                    name: index_name,
                    columns,
                    unique,
                });
            }
        }
    }
    Ok(())
}

async fn index_columns<E: Executor>(
    executor: &mut E,
    dialect: &'static dyn SqlDialect,
    index: &str,
    object: &str,
) -> Result<Vec<IndexColumn>> {
    let quoted = dialect.quote_identifier(index)?;
    let rows = run_query(executor, &format!("PRAGMA index_xinfo({quoted})"), object).await?;
    // Row layout: seqno, cid, name, desc, coll, key.
    let mut keyed: Vec<(i64, IndexColumn)> = rows
        .iter()
        .filter(|row| row[5].as_i64().unwrap_or(0) == 1)
        .map(|row| {
            let order = if row[3].as_i64().unwrap_or(0) != 0 {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            (
                row[0].as_i64().unwrap_or(0),
                IndexColumn {
                    name: row[2].as_str().unwrap_or_default().to_string(),
                    order,
                },
            )
        })
        .collect();
    keyed.sort_by_key(|(seq, _)| *seq);
    Ok(keyed.into_iter().map(|(_, c)| c).collect())
}

/// Parses a stored default text from `PRAGMA table_info` into a typed value.
pub(crate) fn parse_default(raw: Option<&str>) -> DefaultValue {
    let Some(text) = raw else {
        return DefaultValue::None;
    };
    let text = text.trim();
    if text.eq_ignore_ascii_case("NULL") {
        return DefaultValue::Null;
    }
    if let Ok(i) = text.parse::<i64>() {
        return DefaultValue::Integer(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return DefaultValue::Float(f);
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return DefaultValue::String(text[1..text.len() - 1].replace("''", "'"));
    }
    DefaultValue::Expression(text.to_string())
}

/// Constraint facts recovered from the stored `CREATE TABLE` text.
#[derive(Debug, Default)]
struct ParsedTableSql {
    /// Named or positional CHECK constraints, in order of appearance.
    checks: Vec<(Option<String>, String)>,
    /// `CONSTRAINT <name> FOREIGN KEY ... REFERENCES <table>` pairs.
    foreign_key_names: Vec<(String, String)>,
    /// `CONSTRAINT <name> UNIQUE (<cols>)` clauses.
    unique_names: Vec<(String, Vec<String>)>,
    /// Name of an explicit `CONSTRAINT <name> PRIMARY KEY`.
    primary_key_name: Option<String>,
    /// Whether the AUTOINCREMENT keyword appears.
    has_autoincrement: bool,
}

#[derive(Debug)]
struct SqlToken {
    offset: usize,
    text: String,
}

/// Tokenizes DDL text into identifiers, keywords and punctuation, skipping
/// string literal contents and stripping identifier quoting.
fn scan_tokens(sql: &str) -> Vec<SqlToken> {
    let mut tokens = Vec::new();
    let mut chars = sql.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\'' => {
                while let Some((_, c2)) = chars.next() {
                    if c2 == '\'' {
                        if matches!(chars.peek(), Some((_, '\''))) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                let mut name = String::new();
                while let Some((_, c2)) = chars.next() {
                    if c2 == close {
                        if close != ']' && matches!(chars.peek(), Some(&(_, p)) if p == close) {
                            name.push(close);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        name.push(c2);
                    }
                }
                tokens.push(SqlToken { offset, text: name });
            }
            '(' | ')' | ',' => tokens.push(SqlToken {
                offset,
                text: c.to_string(),
            }),
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                word.push(c);
                while let Some(&(_, p)) = chars.peek() {
                    if p.is_alphanumeric() || p == '_' {
                        word.push(p);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(SqlToken { offset, text: word });
            }
            _ => {}
        }
    }
    tokens
}

fn parse_table_sql(sql: &str) -> ParsedTableSql {
    let tokens = scan_tokens(sql);
    let mut parsed = ParsedTableSql::default();
    let mut pending_name: Option<String> = None;
    let mut i = 0;

    while i < tokens.len() {
        let text = tokens[i].text.as_str();

        if text.eq_ignore_ascii_case("AUTOINCREMENT") {
            parsed.has_autoincrement = true;
        } else if text.eq_ignore_ascii_case("CONSTRAINT") && i + 1 < tokens.len() {
            pending_name = Some(tokens[i + 1].text.clone());
            i += 2;
            continue;
        } else if text.eq_ignore_ascii_case("CHECK")
            && i + 1 < tokens.len()
            && tokens[i + 1].text == "("
        {
            if let Some(close) = matching_paren(&tokens, i + 1) {
                let expr = sql[tokens[i + 1].offset + 1..tokens[close].offset]
                    .trim()
                    .to_string();
                parsed.checks.push((pending_name.take(), expr));
                i = close + 1;
                continue;
            }
        } else if text.eq_ignore_ascii_case("FOREIGN") {
            if let Some(name) = pending_name.take() {
                let mut j = i + 1;
                while j < tokens.len() && !tokens[j].text.eq_ignore_ascii_case("REFERENCES") {
                    j += 1;
                }
                if j + 1 < tokens.len() {
                    parsed
                        .foreign_key_names
                        .push((name, tokens[j + 1].text.to_lowercase()));
                }
            }
        } else if text.eq_ignore_ascii_case("UNIQUE") {
            if let Some(name) = pending_name.take() {
                if i + 1 < tokens.len() && tokens[i + 1].text == "(" {
                    parsed
                        .unique_names
                        .push((name, column_list(&tokens, i + 1)));
                }
            }
        } else if text.eq_ignore_ascii_case("PRIMARY") {
            if let Some(name) = pending_name.take() {
                parsed.primary_key_name = Some(name);
            }
        }
        i += 1;
    }
    parsed
}

fn matching_paren(tokens: &[SqlToken], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (j, token) in tokens.iter().enumerate().skip(open) {
        match token.text.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
    }
    None
}

/// Reads the first identifier of each comma-separated entry between parens,
/// skipping direction and collation keywords.
fn column_list(tokens: &[SqlToken], open: usize) -> Vec<String> {
    let mut columns = Vec::new();
    let mut expect_column = true;
    for token in tokens.iter().skip(open + 1) {
        match token.text.as_str() {
            ")" => break,
            "," => expect_column = true,
            _ => {
                if expect_column {
                    columns.push(token.text.clone());
                    expect_column = false;
                }
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default() {
        assert_eq!(parse_default(None), DefaultValue::None);
        assert_eq!(parse_default(Some("NULL")), DefaultValue::Null);
        assert_eq!(parse_default(Some("42")), DefaultValue::Integer(42));
        assert_eq!(parse_default(Some("1.5")), DefaultValue::Float(1.5));
        assert_eq!(
            parse_default(Some("'pending'")),
            DefaultValue::String("pending".to_string())
        );
        assert_eq!(
            parse_default(Some("'it''s'")),
            DefaultValue::String("it's".to_string())
        );
        assert_eq!(
            parse_default(Some("CURRENT_TIMESTAMP")),
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string())
        );
    }

    #[test]
    fn test_parse_table_sql_checks_and_names() {
        let sql = r#"CREATE TABLE "orders" (
  "id" INTEGER PRIMARY KEY AUTOINCREMENT,
  "amount" NUMERIC(18,6) NOT NULL,
  "status" VARCHAR(20) NOT NULL DEFAULT 'pending',
  CONSTRAINT "uq_orders_ref" UNIQUE ("reference", "status"),
  CONSTRAINT "ck_amount" CHECK (amount >= 0),
  CHECK (status <> ''),
  CONSTRAINT "fk_orders_customer" FOREIGN KEY ("customer_id") REFERENCES "customers" ("id") ON DELETE CASCADE ON UPDATE NO ACTION
)"#;
        let parsed = parse_table_sql(sql);
        assert!(parsed.has_autoincrement);
        assert_eq!(
            parsed.checks,
            vec![
                (Some("ck_amount".to_string()), "amount >= 0".to_string()),
                (None, "status <> ''".to_string()),
            ]
        );
        assert_eq!(
            parsed.foreign_key_names,
            vec![("fk_orders_customer".to_string(), "customers".to_string())]
        );
        assert_eq!(
            parsed.unique_names,
            vec![(
                "uq_orders_ref".to_string(),
                vec!["reference".to_string(), "status".to_string()]
            )]
        );
    }

    #[test]
    fn test_scanner_skips_string_literals() {
        let sql = "CREATE TABLE t (a TEXT DEFAULT 'CHECK (bogus)', CONSTRAINT c CHECK (a <> ''))";
        let parsed = parse_table_sql(sql);
        assert_eq!(parsed.checks, vec![(Some("c".to_string()), "a <> ''".to_string())]);
    }

    #[test]
    fn test_defining_query() {
        assert_eq!(
            defining_query("CREATE VIEW v AS SELECT 1"),
            "SELECT 1".to_string()
        );
    }
}
