//! Table recreation planning.
//!
//! When a dialect cannot express a change through in-place ALTER, the table
//! is rebuilt around the new definition: snapshot the live table, apply the
//! requested delta, stage a temporary table, copy the rows, swap names, and
//! verify. This module holds the pure parts of that algorithm - delta
//! application, data-loss validation, copy-column planning and post-swap
//! verification - so they can be tested without a database. Execution lives
//! in [`crate::sync::SchemaSync`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use oxide_schema::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKey, Index, PrimaryKey, Table,
    UniqueConstraint,
};

use crate::error::{Result, SyncError};

static REBUILD_SEQ: AtomicU64 = AtomicU64::new(1);

/// Generates a candidate name for the staging table. Callers probe for
/// collisions and call again until the name is free.
#[must_use]
pub fn temp_name(base: &str) -> String {
    let n = REBUILD_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{base}__rebuild_{n}")
}

/// The changes a caller requests against an existing table.
///
/// Every drop is explicit: a column present in the live table and absent
/// from the requested outcome is an error unless it is listed in
/// `drop_columns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDelta {
    /// Columns to add.
    pub add_columns: Vec<Column>,
    /// Columns to drop, by name. Never inferred.
    pub drop_columns: Vec<String>,
    /// Replacement definitions for existing columns, matched by name.
    pub alter_columns: Vec<Column>,
    /// Column renames as (old, new) pairs.
    pub rename_columns: Vec<(String, String)>,
    /// Primary key to install. The table must not already have one.
    pub set_primary_key: Option<PrimaryKey>,
    /// Whether to remove the primary key.
    pub drop_primary_key: bool,
    /// Foreign keys to add.
    pub add_foreign_keys: Vec<ForeignKey>,
    /// Unique constraints to add.
    pub add_unique_constraints: Vec<UniqueConstraint>,
    /// Check constraints to add.
    pub add_check_constraints: Vec<CheckConstraint>,
    /// Default constraints to add.
    pub add_default_constraints: Vec<DefaultConstraint>,
    /// Named constraints to drop.
    pub drop_constraints: Vec<String>,
    /// Indexes to add.
    pub add_indexes: Vec<Index>,
    /// Indexes to drop, by name.
    pub drop_indexes: Vec<String>,
}

impl TableDelta {
    /// Creates an empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column.
    #[must_use]
    pub fn add_column(mut self, column: Column) -> Self {
        self.add_columns.push(column);
        self
    }

    /// Drops a column.
    #[must_use]
    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.drop_columns.push(name.into());
        self
    }

    /// Replaces an existing column's definition.
    #[must_use]
    pub fn alter_column(mut self, column: Column) -> Self {
        self.alter_columns.push(column);
        self
    }

    /// Renames a column.
    #[must_use]
    pub fn rename_column(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.rename_columns.push((old.into(), new.into()));
        self
    }

    /// Installs a primary key.
    #[must_use]
    pub fn set_primary_key(mut self, pk: PrimaryKey) -> Self {
        self.set_primary_key = Some(pk);
        self
    }

    /// Removes the primary key.
    #[must_use]
    pub fn drop_primary_key(mut self) -> Self {
        self.drop_primary_key = true;
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn add_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.add_foreign_keys.push(fk);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn add_unique_constraint(mut self, unique: UniqueConstraint) -> Self {
        self.add_unique_constraints.push(unique);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn add_check_constraint(mut self, check: CheckConstraint) -> Self {
        self.add_check_constraints.push(check);
        self
    }

    /// Adds a default constraint.
    #[must_use]
    pub fn add_default_constraint(mut self, default: DefaultConstraint) -> Self {
        self.add_default_constraints.push(default);
        self
    }

    /// Drops a named constraint.
    #[must_use]
    pub fn drop_constraint(mut self, name: impl Into<String>) -> Self {
        self.drop_constraints.push(name.into());
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn add_index(mut self, index: Index) -> Self {
        self.add_indexes.push(index);
        self
    }

    /// Drops an index.
    #[must_use]
    pub fn drop_index(mut self, name: impl Into<String>) -> Self {
        self.drop_indexes.push(name.into());
        self
    }

    /// Returns true when the delta requests nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this delta to a snapshot of the live table, producing the
    /// target definition.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] when the delta references columns
    /// or constraints the snapshot does not have, or adds ones it already
    /// has.
    pub fn apply(&self, snapshot: &Table) -> Result<Table> {
        let object = format!("table '{}'", snapshot.name);
        let mut target = snapshot.clone();

        for (old, new) in &self.rename_columns {
            if target.get_column(new).is_some() {
                return Err(SyncError::validation(
                    &object,
                    format!("cannot rename '{old}': column '{new}' already exists"),
                ));
            }
            let Some(column) = target
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(old))
            else {
                return Err(SyncError::validation(
                    &object,
                    format!("cannot rename unknown column '{old}'"),
                ));
            };
            column.name = new.clone();
            rename_references(&mut target, old, new);
        }

        for replacement in &self.alter_columns {
            let Some(column) = target
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(&replacement.name))
            else {
                return Err(SyncError::validation(
                    &object,
                    format!("cannot alter unknown column '{}'", replacement.name),
                ));
            };
            *column = replacement.clone();
        }

        for name in &self.drop_columns {
            let before = target.columns.len();
            target
                .columns
                .retain(|c| !c.name.eq_ignore_ascii_case(name));
            if target.columns.len() == before {
                return Err(SyncError::validation(
                    &object,
                    format!("cannot drop unknown column '{name}'"),
                ));
            }
            drop_references(&mut target, name);
        }

        for column in &self.add_columns {
            if target.get_column(&column.name).is_some() {
                return Err(SyncError::validation(
                    &object,
                    format!("cannot add column '{}': it already exists", column.name),
                ));
            }
            target.columns.push(column.clone());
        }

        if self.drop_primary_key {
            target.primary_key = None;
            for column in &mut target.columns {
                column.primary_key = false;
                column.auto_increment = false;
            }
        }
        if let Some(pk) = &self.set_primary_key {
            if !target.primary_key_columns().is_empty() {
                return Err(SyncError::validation(
                    &object,
                    "table already has a primary key",
                ));
            }
            for name in &pk.columns {
                let Some(column) = target
                    .columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                else {
                    return Err(SyncError::validation(
                        &object,
                        format!("primary key references unknown column '{name}'"),
                    ));
                };
                column.primary_key = true;
                column.nullable = false;
            }
            target.primary_key = Some(pk.clone());
        }

        for name in &self.drop_constraints {
            target
                .foreign_keys
                .retain(|fk| !fk.name.eq_ignore_ascii_case(name));
            target
                .unique_constraints
                .retain(|u| !u.name.eq_ignore_ascii_case(name));
            target
                .check_constraints
                .retain(|c| !c.name.eq_ignore_ascii_case(name));
            target
                .default_constraints
                .retain(|d| !d.name.eq_ignore_ascii_case(name));
        }
        for name in &self.drop_indexes {
            target.indexes.retain(|i| !i.name.eq_ignore_ascii_case(name));
        }

        target.foreign_keys.extend(self.add_foreign_keys.iter().cloned());
        target
            .unique_constraints
            .extend(self.add_unique_constraints.iter().cloned());
        target
            .check_constraints
            .extend(self.add_check_constraints.iter().cloned());
        target
            .default_constraints
            .extend(self.add_default_constraints.iter().cloned());
        target.indexes.extend(self.add_indexes.iter().cloned());

        Ok(target)
    }
}

/// Updates constraint and index references after a column rename.
fn rename_references(table: &mut Table, old: &str, new: &str) {
    let fix = |name: &mut String| {
        if name.eq_ignore_ascii_case(old) {
            *name = new.to_string();
        }
    };
    if let Some(pk) = &mut table.primary_key {
        pk.columns.iter_mut().for_each(fix);
    }
    for fk in &mut table.foreign_keys {
        fk.columns.iter_mut().for_each(fix);
    }
    for unique in &mut table.unique_constraints {
        unique.columns.iter_mut().for_each(fix);
    }
    for default in &mut table.default_constraints {
        fix(&mut default.column);
    }
    for index in &mut table.indexes {
        for column in &mut index.columns {
            fix(&mut column.name);
        }
    }
}

/// Removes constraints and indexes that referenced a dropped column. The
/// column drop itself was explicit; its dependents cannot survive it.
fn drop_references(table: &mut Table, dropped: &str) {
    if let Some(pk) = &mut table.primary_key {
        pk.columns.retain(|c| !c.eq_ignore_ascii_case(dropped));
        if pk.columns.is_empty() {
            table.primary_key = None;
        }
    }
    table
        .foreign_keys
        .retain(|fk| !fk.columns.iter().any(|c| c.eq_ignore_ascii_case(dropped)));
    table
        .unique_constraints
        .retain(|u| !u.columns.iter().any(|c| c.eq_ignore_ascii_case(dropped)));
    table
        .default_constraints
        .retain(|d| !d.column.eq_ignore_ascii_case(dropped));
    table.indexes.retain(|i| {
        !i.columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(dropped))
    });
}

/// A validated rebuild: the target definition and the (target, source)
/// column pairs for the row copy, in target order.
#[derive(Debug, Clone)]
pub struct RecreationPlan {
    /// The definition the rebuilt table must match.
    pub target: Table,
    /// Copy mapping: each target column paired with the source column it is
    /// filled from. Target-only columns are absent - the database's own
    /// default machinery populates them.
    pub copy_columns: Vec<(String, String)>,
}

/// Computes and validates a rebuild plan.
///
/// # Errors
///
/// Returns [`SyncError::Validation`] for an inconsistent outcome,
/// [`SyncError::DataLoss`] when a new column could not be back-filled or a
/// live column would silently disappear.
pub fn plan(snapshot: &Table, delta: &TableDelta) -> Result<RecreationPlan> {
    let target = delta.apply(snapshot)?;
    target.validate()?;

    let renamed_from: Vec<(&str, &str)> = delta
        .rename_columns
        .iter()
        .map(|(old, new)| (new.as_str(), old.as_str()))
        .collect();

    let mut copy_columns = Vec::new();
    let mut copied_sources: HashSet<String> = HashSet::new();
    for column in &target.columns {
        let source = renamed_from
            .iter()
            .find(|(new, _)| new.eq_ignore_ascii_case(&column.name))
            .map(|(_, old)| (*old).to_string())
            .or_else(|| {
                snapshot
                    .get_column(&column.name)
                    .map(|c| c.name.clone())
            });
        match source {
            Some(source) => {
                copied_sources.insert(source.to_lowercase());
                copy_columns.push((column.name.clone(), source));
            }
            None => {
                if !column.nullable && !column.default.is_usable_backfill() {
                    return Err(SyncError::DataLoss {
                        table: snapshot.name.clone(),
                        detail: format!(
                            "new column '{}' is NOT NULL and has no default to back-fill \
                             existing rows",
                            column.name
                        ),
                    });
                }
            }
        }
    }

    for column in &snapshot.columns {
        let kept = copied_sources.contains(&column.name.to_lowercase());
        let dropped = delta
            .drop_columns
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&column.name));
        if !kept && !dropped {
            return Err(SyncError::DataLoss {
                table: snapshot.name.clone(),
                detail: format!(
                    "column '{}' would be dropped without being requested",
                    column.name
                ),
            });
        }
    }

    Ok(RecreationPlan {
        target,
        copy_columns,
    })
}

fn normalize_expr(expr: &str) -> String {
    expr.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn unique_signatures(table: &Table) -> Vec<String> {
    let mut signatures: Vec<String> = table
        .unique_constraints
        .iter()
        .map(|u| {
            u.columns
                .iter()
                .map(|c| c.to_lowercase())
                .collect::<Vec<_>>()
                .join(",")
        })
        .chain(
            table
                .columns
                .iter()
                .filter(|c| c.unique)
                .map(|c| c.name.to_lowercase()),
        )
        .chain(table.indexes.iter().filter(|i| i.unique).map(|i| {
            i.columns
                .iter()
                .map(|c| c.name.to_lowercase())
                .collect::<Vec<_>>()
                .join(",")
        }))
        .collect();
    signatures.sort();
    signatures.dedup();
    signatures
}

fn foreign_key_signatures(table: &Table) -> Vec<String> {
    let mut signatures: Vec<String> = table
        .foreign_keys
        .iter()
        .map(|fk| {
            format!(
                "{}>{}({}) del:{} upd:{}",
                fk.columns.join(",").to_lowercase(),
                fk.references_table.to_lowercase(),
                fk.references_columns.join(",").to_lowercase(),
                fk.on_delete.to_sql(),
                fk.on_update.to_sql()
            )
        })
        .collect();
    signatures.sort();
    signatures
}

/// Compares a rebuilt table against its target definition and reports
/// every observed difference the engine treats as fatal.
#[must_use]
pub fn verify(live: &Table, target: &Table) -> Vec<String> {
    let mut mismatches = Vec::new();

    for expected in &target.columns {
        match live.get_column(&expected.name) {
            None => mismatches.push(format!("column '{}' is missing", expected.name)),
            Some(actual) => {
                if !actual.ty.same_class(&expected.ty) {
                    mismatches.push(format!(
                        "column '{}' has type {:?}, expected class of {:?}",
                        expected.name, actual.ty, expected.ty
                    ));
                }
                if actual.nullable != expected.nullable {
                    mismatches.push(format!(
                        "column '{}' nullability is {}, expected {}",
                        expected.name, actual.nullable, expected.nullable
                    ));
                }
            }
        }
    }
    for actual in &live.columns {
        if target.get_column(&actual.name).is_none() {
            mismatches.push(format!("unexpected column '{}'", actual.name));
        }
    }

    let live_pk: Vec<String> = live
        .primary_key_columns()
        .iter()
        .map(|c| c.to_lowercase())
        .collect();
    let target_pk: Vec<String> = target
        .primary_key_columns()
        .iter()
        .map(|c| c.to_lowercase())
        .collect();
    if live_pk != target_pk {
        mismatches.push(format!(
            "primary key is ({}), expected ({})",
            live_pk.join(", "),
            target_pk.join(", ")
        ));
    }

    if foreign_key_signatures(live) != foreign_key_signatures(target) {
        mismatches.push("foreign keys differ from the target".to_string());
    }
    if unique_signatures(live) != unique_signatures(target) {
        mismatches.push("unique constraints differ from the target".to_string());
    }

    let mut live_checks: Vec<String> = live
        .check_constraints
        .iter()
        .map(|c| normalize_expr(&c.expression))
        .chain(
            live.columns
                .iter()
                .filter_map(|c| c.check.as_deref().map(normalize_expr)),
        )
        .collect();
    let mut target_checks: Vec<String> = target
        .check_constraints
        .iter()
        .map(|c| normalize_expr(&c.expression))
        .chain(
            target
                .columns
                .iter()
                .filter_map(|c| c.check.as_deref().map(normalize_expr)),
        )
        .collect();
    live_checks.sort();
    target_checks.sort();
    if live_checks != target_checks {
        mismatches.push("check constraints differ from the target".to_string());
    }

    let mut live_indexes: Vec<String> = live
        .indexes
        .iter()
        .map(|i| i.name.to_lowercase())
        .collect();
    let mut target_indexes: Vec<String> = target
        .indexes
        .iter()
        .map(|i| i.name.to_lowercase())
        .collect();
    live_indexes.sort();
    target_indexes.sort();
    if live_indexes != target_indexes {
        mismatches.push(format!(
            "indexes are [{}], expected [{}]",
            live_indexes.join(", "),
            target_indexes.join(", ")
        ));
    }

    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_schema::model::{DefaultValue, IndexColumn};
    use oxide_schema::types::TypeDescriptor;

    fn orders() -> Table {
        Table::new("orders")
            .column(
                Column::new("id", TypeDescriptor::Int64)
                    .primary_key()
                    .auto_increment(),
            )
            .column(Column::new("amount", TypeDescriptor::decimal(18, 6)).not_null())
            .index(Index::new(
                "idx_orders_amount",
                vec![IndexColumn::asc("amount")],
            ))
    }

    #[test]
    fn test_temp_names_are_distinct() {
        assert_ne!(temp_name("orders"), temp_name("orders"));
    }

    #[test]
    fn test_plan_add_defaulted_column() {
        let delta = TableDelta::new().add_column(
            Column::new("status", TypeDescriptor::varstring(20))
                .not_null()
                .default(DefaultValue::String("pending".to_string())),
        );
        let plan = plan(&orders(), &delta).unwrap();
        assert_eq!(plan.target.columns.len(), 3);
        // The new column is not copied; its default back-fills it.
        assert_eq!(
            plan.copy_columns,
            vec![
                ("id".to_string(), "id".to_string()),
                ("amount".to_string(), "amount".to_string()),
            ]
        );
    }

    #[test]
    fn test_plan_rejects_not_null_without_default() {
        let delta = TableDelta::new()
            .add_column(Column::new("status", TypeDescriptor::varstring(20)).not_null());
        let err = plan(&orders(), &delta).unwrap_err();
        assert!(matches!(err, SyncError::DataLoss { .. }));
    }

    #[test]
    fn test_plan_keeps_data_through_rename_and_add() {
        let delta = TableDelta::new()
            .rename_column("amount", "total")
            .add_column(Column::new("note", TypeDescriptor::Text));
        let plan = plan(&orders(), &delta).unwrap();
        assert_eq!(
            plan.copy_columns,
            vec![
                ("id".to_string(), "id".to_string()),
                ("total".to_string(), "amount".to_string()),
            ]
        );
    }

    #[test]
    fn test_plan_rename_maps_copy_source() {
        let delta = TableDelta::new().rename_column("amount", "total");
        let plan = plan(&orders(), &delta).unwrap();
        assert!(plan
            .copy_columns
            .contains(&("total".to_string(), "amount".to_string())));
        // The index referencing the renamed column follows it.
        assert_eq!(plan.target.indexes[0].columns[0].name, "total");
    }

    #[test]
    fn test_drop_column_removes_dependents() {
        let delta = TableDelta::new().drop_column("amount");
        let plan = plan(&orders(), &delta).unwrap();
        assert!(plan.target.indexes.is_empty());
        assert_eq!(plan.copy_columns, vec![("id".to_string(), "id".to_string())]);
    }

    #[test]
    fn test_drop_primary_key_clears_column_flags() {
        let delta = TableDelta::new().drop_primary_key();
        let plan = plan(&orders(), &delta).unwrap();
        assert!(plan.target.primary_key_columns().is_empty());
        assert!(!plan.target.columns[0].primary_key);
        assert!(!plan.target.columns[0].auto_increment);
        // The column itself survives, so its data is still copied.
        assert!(plan
            .copy_columns
            .contains(&("id".to_string(), "id".to_string())));
    }

    #[test]
    fn test_set_primary_key_requires_a_bare_table() {
        let pk = PrimaryKey {
            name: None,
            columns: vec!["amount".to_string()],
        };
        let err = TableDelta::new()
            .set_primary_key(pk.clone())
            .apply(&orders())
            .unwrap_err();
        assert!(err.to_string().contains("already has a primary key"));

        let target = TableDelta::new()
            .drop_primary_key()
            .set_primary_key(pk)
            .apply(&orders())
            .unwrap();
        assert_eq!(target.primary_key_columns(), vec!["amount"]);
        assert!(!target.get_column("amount").unwrap().nullable);
    }

    #[test]
    fn test_apply_rejects_unknown_references() {
        assert!(TableDelta::new()
            .drop_column("missing")
            .apply(&orders())
            .is_err());
        assert!(TableDelta::new()
            .rename_column("missing", "x")
            .apply(&orders())
            .is_err());
        assert!(TableDelta::new()
            .add_column(Column::new("amount", TypeDescriptor::Int32))
            .apply(&orders())
            .is_err());
    }

    #[test]
    fn test_verify_reports_differences() {
        let target = orders();
        let mut live = orders();
        assert!(verify(&live, &target).is_empty());

        live.columns[1].nullable = true;
        live.indexes.clear();
        let mismatches = verify(&live, &target);
        assert_eq!(mismatches.len(), 2);
        assert!(mismatches[0].contains("nullability"));
        assert!(mismatches[1].contains("indexes"));
    }

    #[test]
    fn test_verify_treats_unique_index_as_constraint() {
        let mut target = orders();
        target.unique_constraints.push(UniqueConstraint {
            name: "uq_orders_amount".to_string(),
            columns: vec!["amount".to_string()],
        });
        let mut live = orders();
        live.columns[1].unique = true;
        // Same column set, expressed differently; only the index list
        // should be compared by name.
        let mismatches = verify(&live, &target);
        assert!(mismatches.is_empty());
    }
}
