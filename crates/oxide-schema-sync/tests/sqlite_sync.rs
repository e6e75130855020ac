//! End-to-end synchronization tests against in-memory SQLite.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use oxide_schema::model::{
    CheckConstraint, Column, DefaultValue, ForeignKeyAction, ForeignKeyBuilder, Index,
    IndexColumn, SortOrder, Table, UniqueConstraint, View,
};
use oxide_schema::types::TypeDescriptor;
use oxide_schema_sync::prelude::*;

use oxide_schema::dialect::{dialect_for, DialectKind};

async fn engine() -> SchemaSync<SqliteExecutor> {
    let executor = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
    SchemaSync::new(executor, DialectKind::Sqlite)
}

fn orders() -> Table {
    Table::new("orders")
        .column(
            Column::new("id", TypeDescriptor::Int64)
                .primary_key()
                .auto_increment(),
        )
        .column(Column::new("amount", TypeDescriptor::decimal(18, 6)).not_null())
        .column(Column::new("customer_id", TypeDescriptor::Int64).not_null())
}

fn customers() -> Table {
    Table::new("customers")
        .column(
            Column::new("id", TypeDescriptor::Int64)
                .primary_key()
                .auto_increment(),
        )
        .column(Column::new("name", TypeDescriptor::varstring(120)).not_null())
}

#[tokio::test]
async fn ensure_table_is_idempotent() {
    let mut sync = engine().await;
    assert!(sync.ensure_table(&orders()).await.unwrap());
    assert!(!sync.ensure_table(&orders()).await.unwrap());
}

#[tokio::test]
async fn ensure_table_never_alters_an_existing_table() {
    let mut sync = engine().await;
    sync.ensure_table(&orders()).await.unwrap();

    // A divergent definition under the same name is not applied.
    let divergent = Table::new("orders")
        .column(Column::new("id", TypeDescriptor::Int64).primary_key())
        .column(Column::new("note", TypeDescriptor::Text));
    assert!(!sync.ensure_table(&divergent).await.unwrap());

    let live = sync.get_table(None, "orders").await.unwrap().unwrap();
    assert!(live.get_column("amount").is_some());
    assert!(live.get_column("note").is_none());
}

#[tokio::test]
async fn create_then_introspect_round_trips() {
    let mut sync = engine().await;
    sync.ensure_table(&customers()).await.unwrap();

    let table = orders()
        .column(
            Column::new("status", TypeDescriptor::varstring(20))
                .not_null()
                .default(DefaultValue::String("pending".to_string())),
        )
        .foreign_key(
            ForeignKeyBuilder::new("fk_orders_customer")
                .columns(vec!["customer_id".to_string()])
                .references("customers", vec!["id".to_string()])
                .on_delete(ForeignKeyAction::Cascade)
                .build(),
        )
        .unique_constraint(UniqueConstraint {
            name: "uq_orders_amount_customer".to_string(),
            columns: vec!["amount".to_string(), "customer_id".to_string()],
        })
        .check_constraint(CheckConstraint::new("ck_orders_amount", "amount >= 0"));
    sync.ensure_table(&table).await.unwrap();

    let live = sync.get_table(None, "orders").await.unwrap().unwrap();
    assert_eq!(live.columns.len(), 4);

    let id = live.get_column("id").unwrap();
    assert!(id.primary_key);
    assert!(id.auto_increment);
    assert!(!id.nullable);

    let status = live.get_column("status").unwrap();
    assert!(!status.nullable);
    assert_eq!(
        status.default,
        DefaultValue::String("pending".to_string())
    );
    assert_eq!(status.ty, TypeDescriptor::varstring(20));

    let fk = &live.foreign_keys[0];
    assert_eq!(fk.name, "fk_orders_customer");
    assert_eq!(fk.references_table, "customers");
    assert_eq!(fk.references_columns, vec!["id"]);
    assert_eq!(fk.on_delete, ForeignKeyAction::Cascade);
    assert_eq!(fk.on_update, ForeignKeyAction::NoAction);

    assert_eq!(live.unique_constraints.len(), 1);
    assert_eq!(
        live.unique_constraints[0].name,
        "uq_orders_amount_customer"
    );
    assert_eq!(
        live.unique_constraints[0].columns,
        vec!["amount", "customer_id"]
    );

    assert_eq!(live.check_constraints.len(), 1);
    assert_eq!(live.check_constraints[0].name, "ck_orders_amount");
    assert_eq!(live.check_constraints[0].expression, "amount >= 0");
}

#[tokio::test]
async fn index_round_trips_with_directions() {
    let mut sync = engine().await;
    let table = orders().column(Column::new("order_date", TypeDescriptor::DateTime));
    sync.ensure_table(&table).await.unwrap();

    let index = Index::new(
        "idx_orders_customer_date",
        vec![
            IndexColumn::asc("customer_id"),
            IndexColumn::desc("order_date"),
        ],
    );
    assert!(sync.ensure_index(None, "orders", &index).await.unwrap());
    assert!(!sync.ensure_index(None, "orders", &index).await.unwrap());

    let live = sync
        .get_index(None, "orders", "idx_orders_customer_date")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.columns.len(), 2);
    assert_eq!(live.columns[0].name, "customer_id");
    assert_eq!(live.columns[0].order, SortOrder::Ascending);
    assert_eq!(live.columns[1].name, "order_date");
    assert_eq!(live.columns[1].order, SortOrder::Descending);
    assert!(!live.unique);

    assert!(sync
        .drop_index(None, "orders", "idx_orders_customer_date")
        .await
        .unwrap());
    assert!(!sync
        .drop_index(None, "orders", "idx_orders_customer_date")
        .await
        .unwrap());
}

#[tokio::test]
async fn ensure_column_adds_in_place_when_nullable() {
    let mut sync = engine().await;
    sync.ensure_table(&orders()).await.unwrap();

    let note = Column::new("note", TypeDescriptor::Text);
    assert!(sync.ensure_column(None, "orders", &note).await.unwrap());
    assert!(!sync.ensure_column(None, "orders", &note).await.unwrap());

    let live = sync.get_column(None, "orders", "note").await.unwrap().unwrap();
    assert!(live.nullable);
    assert_eq!(live.ty, TypeDescriptor::Text);

    let dialect = dialect_for(DialectKind::Sqlite);
    let mut introspector = Introspector::new(sync.executor_mut(), dialect);
    assert!(introspector
        .column_exists(None, "orders", "note")
        .await
        .unwrap());
    assert!(!introspector
        .column_exists(None, "orders", "ghost")
        .await
        .unwrap());
}

#[tokio::test]
async fn views_create_drop_and_read_back() {
    let mut sync = engine().await;
    sync.ensure_table(&orders()).await.unwrap();

    let view = View::new(
        "big_orders",
        "SELECT id, amount FROM orders WHERE amount > 100",
    );
    assert!(sync.ensure_view(&view).await.unwrap());
    assert!(!sync.ensure_view(&view).await.unwrap());

    let live = sync.get_view(None, "big_orders").await.unwrap().unwrap();
    assert_eq!(live.query, "SELECT id, amount FROM orders WHERE amount > 100");

    assert!(sync.drop_view(None, "big_orders").await.unwrap());
    assert!(!sync.drop_view(None, "big_orders").await.unwrap());
}

#[tokio::test]
async fn unique_constraint_as_index_and_back() {
    let mut sync = engine().await;
    sync.ensure_table(&orders()).await.unwrap();

    let unique = UniqueConstraint {
        name: "uq_orders_customer".to_string(),
        columns: vec!["customer_id".to_string()],
    };
    assert!(sync
        .ensure_unique_constraint(None, "orders", &unique)
        .await
        .unwrap());
    assert!(!sync
        .ensure_unique_constraint(None, "orders", &unique)
        .await
        .unwrap());

    assert!(sync
        .drop_unique_constraint(None, "orders", "uq_orders_customer")
        .await
        .unwrap());
    assert!(!sync
        .drop_unique_constraint(None, "orders", "uq_orders_customer")
        .await
        .unwrap());
}

#[tokio::test]
async fn constraint_getters_return_live_definitions() {
    let mut sync = engine().await;
    sync.ensure_table(&customers()).await.unwrap();

    let table = orders()
        .foreign_key(
            ForeignKeyBuilder::new("fk_orders_customer")
                .columns(vec!["customer_id".to_string()])
                .references("customers", vec!["id".to_string()])
                .build(),
        )
        .unique_constraint(UniqueConstraint {
            name: "uq_orders_amount_customer".to_string(),
            columns: vec!["amount".to_string(), "customer_id".to_string()],
        })
        .check_constraint(CheckConstraint::new("ck_orders_amount", "amount >= 0"));
    sync.ensure_table(&table).await.unwrap();

    let pk = sync.get_primary_key(None, "orders").await.unwrap().unwrap();
    assert_eq!(pk.columns, vec!["id"]);

    let fk = sync
        .get_foreign_key(None, "orders", "fk_orders_customer")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fk.references_table, "customers");

    let unique = sync
        .get_unique_constraint(None, "orders", "uq_orders_amount_customer")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unique.columns, vec!["amount", "customer_id"]);

    let check = sync
        .get_check_constraint(None, "orders", "ck_orders_amount")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(check.expression, "amount >= 0");

    assert!(sync
        .get_foreign_key(None, "orders", "fk_missing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn list_tables_applies_filter() {
    let mut sync = engine().await;
    sync.ensure_table(&orders()).await.unwrap();
    sync.ensure_table(&customers()).await.unwrap();

    let all = sync.list_tables(None, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let filtered = sync.list_tables(None, Some("ord")).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].name, "orders");
}

#[tokio::test]
async fn rename_table_and_column_prefer_native_statements() {
    let mut sync = engine().await;
    sync.ensure_table(&orders()).await.unwrap();
    sync.executor_mut()
        .execute("INSERT INTO orders (amount, customer_id) VALUES (5, 1)")
        .await
        .unwrap();

    sync.rename_column(None, "orders", "amount", "total")
        .await
        .unwrap();
    sync.rename_table(None, "orders", "purchases").await.unwrap();

    let live = sync.get_table(None, "purchases").await.unwrap().unwrap();
    assert!(live.get_column("total").is_some());
    assert!(live.get_column("amount").is_none());

    let rows = sync
        .executor_mut()
        .query("SELECT total FROM purchases")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

/// Wraps the SQLite executor, recording every executed statement.
struct RecordingExecutor {
    inner: SqliteExecutor,
    statements: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&mut self, sql: &str) -> std::result::Result<u64, ExecutorError> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.inner.execute(sql).await
    }

    async fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, ExecutorError> {
        self.inner.query(sql).await
    }

    async fn begin(&mut self) -> std::result::Result<(), ExecutorError> {
        self.statements.lock().unwrap().push("BEGIN".to_string());
        self.inner.begin().await
    }

    async fn commit(&mut self) -> std::result::Result<(), ExecutorError> {
        self.statements.lock().unwrap().push("COMMIT".to_string());
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> std::result::Result<(), ExecutorError> {
        self.statements.lock().unwrap().push("ROLLBACK".to_string());
        self.inner.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }
}

#[tokio::test]
async fn dangling_foreign_key_fails_before_any_statement() {
    let inner = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
    let statements = Arc::new(Mutex::new(Vec::new()));
    let recording = RecordingExecutor {
        inner,
        statements: statements.clone(),
    };
    let mut sync = SchemaSync::new(recording, DialectKind::Sqlite);

    let table = orders().foreign_key(
        ForeignKeyBuilder::new("fk_orders_customer")
            .columns(vec!["customer_id".to_string()])
            .references("customers", vec!["id".to_string()])
            .build(),
    );
    let err = sync.ensure_table(&table).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation { .. }));
    assert!(err.to_string().contains("missing table 'customers'"));
    assert!(statements.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_model_fails_before_any_statement() {
    let inner = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
    let statements = Arc::new(Mutex::new(Vec::new()));
    let recording = RecordingExecutor {
        inner,
        statements: statements.clone(),
    };
    let mut sync = SchemaSync::new(recording, DialectKind::Sqlite);

    let table = orders().column(Column::new("AMOUNT", TypeDescriptor::Int32));
    let err = sync.ensure_table(&table).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation { .. }));
    assert!(statements.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_is_observed_before_statements() {
    let token = CancellationToken::new();
    token.cancel();

    let executor = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
    let mut sync = SchemaSync::new(executor, DialectKind::Sqlite)
        .with_options(OpOptions::new().cancellation(token));

    let err = sync.ensure_table(&orders()).await.unwrap_err();
    assert!(matches!(err, SyncError::Cancelled { .. }));
}

#[tokio::test]
async fn statement_timeout_passes_through_on_fast_statements() {
    let executor = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
    let mut sync = SchemaSync::new(executor, DialectKind::Sqlite).with_options(
        OpOptions::new().statement_timeout(std::time::Duration::from_secs(30)),
    );
    assert!(sync.ensure_table(&orders()).await.unwrap());
}

#[tokio::test]
async fn ensure_schema_is_a_noop_without_schema_support() {
    let mut sync = engine().await;
    assert!(!sync.ensure_schema("sales").await.unwrap());
}
