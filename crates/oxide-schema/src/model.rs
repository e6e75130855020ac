//! Schema model types.
//!
//! These types are plain, serializable value descriptions of database
//! objects. They are built by callers (or a model factory layered on top),
//! handed to the synchronization engine, and also produced fresh by
//! introspection for comparison. None of them owns a live connection.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::types::{NativeTypeOverride, TypeDescriptor};

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns true when no default is set.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns true when the default can back-fill a non-nullable column.
    #[must_use]
    pub fn is_usable_backfill(&self) -> bool {
        !matches!(self, Self::None | Self::Null)
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if the referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the SQL representation back into an action.
    ///
    /// Unknown strings map to [`ForeignKeyAction::NoAction`].
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.trim().to_uppercase().as_str() {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

impl SortOrder {
    /// Returns the SQL keyword for this direction.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Definition of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Host type descriptor.
    pub ty: TypeDescriptor,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Whether this column is (part of) the primary key.
    pub primary_key: bool,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Whether this column carries a single-column UNIQUE constraint.
    pub unique: bool,
    /// Default value.
    pub default: DefaultValue,
    /// Column-level check expression (if any).
    pub check: Option<String>,
    /// Optional native type override, plain or per-dialect.
    pub native_override: Option<NativeTypeOverride>,
}

impl Column {
    /// Creates a new nullable column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: DefaultValue::None,
            check: None,
            native_override: None,
        }
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as (part of) the primary key.
    ///
    /// Primary key columns are always NOT NULL.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column as auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.nullable = false;
        self
    }

    /// Marks the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Sets a column-level check expression.
    #[must_use]
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(expr.into());
        self
    }

    /// Sets a native type override from its textual form.
    #[must_use]
    pub fn native_type(mut self, raw: &str) -> Self {
        self.native_override = Some(NativeTypeOverride::parse(raw));
        self
    }
}

/// A column participating in an index, with its sort direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Sort direction.
    pub order: SortOrder,
}

impl IndexColumn {
    /// Creates an ascending index column.
    #[must_use]
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Ascending,
        }
    }

    /// Creates a descending index column.
    #[must_use]
    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Descending,
        }
    }
}

/// Definition of an index.
///
/// Column order is significant: the leftmost column must be usable for
/// single-column lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Ordered indexed columns.
    pub columns: Vec<IndexColumn>,
    /// Whether this is a unique index.
    pub unique: bool,
}

impl Index {
    /// Creates a new non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<IndexColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name, if named.
    pub name: Option<String>,
    /// Ordered key columns.
    pub columns: Vec<String>,
}

/// Unique constraint over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name.
    pub name: String,
    /// Ordered constrained columns.
    pub columns: Vec<String>,
}

/// Foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Ordered referencing columns in this table.
    pub columns: Vec<String>,
    /// Schema of the referenced table, if any.
    pub references_schema: Option<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Ordered referenced columns (same arity as `columns`).
    pub references_columns: Vec<String>,
    /// Action on delete.
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    pub on_update: ForeignKeyAction,
}

/// Builder for foreign keys.
pub struct ForeignKeyBuilder {
    fk: ForeignKey,
}

impl ForeignKeyBuilder {
    /// Creates a new foreign key builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            fk: ForeignKey {
                name: name.into(),
                columns: Vec::new(),
                references_schema: None,
                references_table: String::new(),
                references_columns: Vec::new(),
                on_delete: ForeignKeyAction::NoAction,
                on_update: ForeignKeyAction::NoAction,
            },
        }
    }

    /// Sets the referencing columns.
    #[must_use]
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.fk.columns = columns;
        self
    }

    /// Sets the referenced table and columns.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, columns: Vec<String>) -> Self {
        self.fk.references_table = table.into();
        self.fk.references_columns = columns;
        self
    }

    /// Sets the referenced schema.
    #[must_use]
    pub fn references_schema(mut self, schema: impl Into<String>) -> Self {
        self.fk.references_schema = Some(schema.into());
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.fk.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.fk.on_update = action;
        self
    }

    /// Builds the foreign key.
    #[must_use]
    pub fn build(self) -> ForeignKey {
        self.fk
    }
}

/// Check constraint holding an opaque boolean SQL expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// Boolean SQL expression text.
    pub expression: String,
}

impl CheckConstraint {
    /// Creates a new check constraint.
    #[must_use]
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }
}

/// Named default constraint attached to a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultConstraint {
    /// Constraint name.
    pub name: String,
    /// Column the default applies to.
    pub column: String,
    /// Default value.
    pub value: DefaultValue,
}

/// Definition of a view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct View {
    /// Schema name, if any.
    pub schema: Option<String>,
    /// View name.
    pub name: String,
    /// Defining query text. May contain a `{schema}` placeholder resolved
    /// when the view is created.
    pub query: String,
}

impl View {
    /// Creates a new view definition.
    #[must_use]
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            query: query.into(),
        }
    }

    /// Places the view in a schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Complete definition of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Schema name, if any.
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
    /// Ordered column definitions.
    pub columns: Vec<Column>,
    /// Explicit (usually composite) primary key. Single-column keys are
    /// normally expressed inline via [`Column::primary_key`].
    pub primary_key: Option<PrimaryKey>,
    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,
    /// Unique constraints.
    pub unique_constraints: Vec<UniqueConstraint>,
    /// Check constraints.
    pub check_constraints: Vec<CheckConstraint>,
    /// Named default constraints.
    pub default_constraints: Vec<DefaultConstraint>,
    /// Secondary indexes.
    pub indexes: Vec<Index>,
}

impl Table {
    /// Creates a new empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            unique_constraints: Vec::new(),
            check_constraints: Vec::new(),
            default_constraints: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Places the table in a schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets an explicit (composite) primary key.
    #[must_use]
    pub fn primary_key(mut self, name: Option<String>, columns: Vec<String>) -> Self {
        self.primary_key = Some(PrimaryKey { name, columns });
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique_constraint(mut self, constraint: UniqueConstraint) -> Self {
        self.unique_constraints.push(constraint);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn check_constraint(mut self, constraint: CheckConstraint) -> Self {
        self.check_constraints.push(constraint);
        self
    }

    /// Adds a named default constraint.
    #[must_use]
    pub fn default_constraint(mut self, constraint: DefaultConstraint) -> Self {
        self.default_constraints.push(constraint);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Applies a caller-supplied transform before the table is used.
    ///
    /// This is the explicit replacement for process-wide "customize every
    /// table" hooks: the customization travels with the call instead of
    /// living in ambient state.
    #[must_use]
    pub fn finish_with(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }

    /// Gets a column by name (case-insensitive).
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the effective primary key column list: the explicit primary
    /// key when present, otherwise the columns flagged inline.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<String> {
        if let Some(pk) = &self.primary_key {
            return pk.columns.clone();
        }
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Validates the internal consistency of this definition.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Validation`] for duplicate column names,
    /// dangling column references in any constraint or index, mismatched
    /// foreign key arity, empty indexes, or a nullable auto-increment
    /// column.
    pub fn validate(&self) -> Result<()> {
        let object = format!("table '{}'", self.name);
        if self.name.trim().is_empty() {
            return Err(SchemaError::validation(object, "table name is empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_lowercase()) {
                return Err(SchemaError::validation(
                    &object,
                    format!("duplicate column name '{}'", column.name),
                ));
            }
            if column.auto_increment && column.nullable {
                return Err(SchemaError::validation(
                    &object,
                    format!("auto-increment column '{}' must be NOT NULL", column.name),
                ));
            }
        }
        if self.columns.is_empty() {
            return Err(SchemaError::validation(&object, "table has no columns"));
        }

        let check_ref = |kind: &str, name: &str, col: &str| -> Result<()> {
            if self.get_column(col).is_none() {
                return Err(SchemaError::validation(
                    &object,
                    format!("{kind} '{name}' references unknown column '{col}'"),
                ));
            }
            Ok(())
        };

        if let Some(pk) = &self.primary_key {
            if pk.columns.is_empty() {
                return Err(SchemaError::validation(&object, "primary key has no columns"));
            }
            for col in &pk.columns {
                check_ref("primary key", pk.name.as_deref().unwrap_or("<unnamed>"), col)?;
            }
            for column in &self.columns {
                if column.primary_key
                    && !pk.columns.iter().any(|c| c.eq_ignore_ascii_case(&column.name))
                {
                    return Err(SchemaError::validation(
                        &object,
                        format!(
                            "column '{}' is flagged as primary key but missing from the explicit key",
                            column.name
                        ),
                    ));
                }
            }
        }

        for fk in &self.foreign_keys {
            if fk.columns.is_empty() {
                return Err(SchemaError::validation(
                    &object,
                    format!("foreign key '{}' has no columns", fk.name),
                ));
            }
            if fk.columns.len() != fk.references_columns.len() {
                return Err(SchemaError::validation(
                    &object,
                    format!(
                        "foreign key '{}' maps {} columns to {} referenced columns",
                        fk.name,
                        fk.columns.len(),
                        fk.references_columns.len()
                    ),
                ));
            }
            for col in &fk.columns {
                check_ref("foreign key", &fk.name, col)?;
            }
        }

        for unique in &self.unique_constraints {
            if unique.columns.is_empty() {
                return Err(SchemaError::validation(
                    &object,
                    format!("unique constraint '{}' has no columns", unique.name),
                ));
            }
            for col in &unique.columns {
                check_ref("unique constraint", &unique.name, col)?;
            }
        }

        for default in &self.default_constraints {
            check_ref("default constraint", &default.name, &default.column)?;
        }

        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(SchemaError::validation(
                    &object,
                    format!("index '{}' has no columns", index.name),
                ));
            }
            for col in &index.columns {
                check_ref("index", &index.name, &col.name)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Table {
        Table::new("orders")
            .column(Column::new("id", TypeDescriptor::Int64).primary_key().auto_increment())
            .column(Column::new("amount", TypeDescriptor::decimal(18, 6)).not_null())
            .column(Column::new("customer_id", TypeDescriptor::Int64).not_null())
    }

    #[test]
    fn test_builders() {
        let table = orders()
            .index(Index::new(
                "idx_orders_customer",
                vec![IndexColumn::asc("customer_id")],
            ))
            .foreign_key(
                ForeignKeyBuilder::new("fk_orders_customer")
                    .columns(vec!["customer_id".to_string()])
                    .references("customers", vec!["id".to_string()])
                    .on_delete(ForeignKeyAction::Cascade)
                    .build(),
            );

        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.primary_key_columns(), vec!["id"]);
        assert_eq!(table.foreign_keys[0].on_delete, ForeignKeyAction::Cascade);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let table = orders().column(Column::new("AMOUNT", TypeDescriptor::Int32));
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn test_dangling_index_column_rejected() {
        let table = orders().index(Index::new("idx_bad", vec![IndexColumn::asc("missing")]));
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("unknown column 'missing'"));
    }

    #[test]
    fn test_foreign_key_arity_rejected() {
        let table = orders().foreign_key(
            ForeignKeyBuilder::new("fk_bad")
                .columns(vec!["customer_id".to_string()])
                .references("customers", vec!["id".to_string(), "extra".to_string()])
                .build(),
        );
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("maps 1 columns to 2"));
    }

    #[test]
    fn test_nullable_auto_increment_rejected() {
        let mut table = orders();
        table.columns[0].nullable = true;
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("must be NOT NULL"));
    }

    #[test]
    fn test_finish_with_transform() {
        let table = orders().finish_with(|t| {
            t.columns
                .push(Column::new("created_at", TypeDescriptor::DateTime).not_null());
        });
        assert!(table.get_column("created_at").is_some());
    }

    #[test]
    fn test_foreign_key_action_round_trip() {
        for action in [
            ForeignKeyAction::NoAction,
            ForeignKeyAction::Restrict,
            ForeignKeyAction::Cascade,
            ForeignKeyAction::SetNull,
            ForeignKeyAction::SetDefault,
        ] {
            assert_eq!(ForeignKeyAction::parse(action.to_sql()), action);
        }
    }
}
