#[path = "../fixtures.rs"]
mod fixtures;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use prism::compile::CompiledQuery;
use prism::model::FieldId;
use prism::query::{MetricQuery, SortSpec};
use prism::results::{JsonRow, RawValue};
use prism::runner::{abort_pair, ExecutionError, QueryRunner, RowStream, WarehouseClient};
use prism::{CoreError, Dialect};
use serde_json::{json, Value};

/// In-memory warehouse: replays canned rows for any SQL.
struct FakeWarehouse {
    rows: Vec<JsonRow>,
    fail_with: Option<ExecutionError>,
}

impl FakeWarehouse {
    fn new(rows: Vec<JsonRow>) -> Self {
        Self {
            rows,
            fail_with: None,
        }
    }

    fn failing(error: ExecutionError) -> Self {
        Self {
            rows: vec![],
            fail_with: Some(error),
        }
    }
}

#[async_trait]
impl WarehouseClient for FakeWarehouse {
    async fn execute(&self, _query: &CompiledQuery) -> Result<RowStream, ExecutionError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let rows = self.rows.clone();
        Ok(futures::stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}

fn row(pairs: &[(&str, Value)]) -> JsonRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn runner() -> QueryRunner {
    QueryRunner::new(Arc::new(fixtures::orders_catalog()), Dialect::Postgres)
}

fn status_count_query() -> MetricQuery {
    MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "count")],
        sorts: vec![SortSpec {
            field: FieldId::new("orders", "status"),
            descending: false,
        }],
        ..MetricQuery::new("orders")
    }
}

#[tokio::test]
async fn end_to_end_grouped_query() {
    let client = FakeWarehouse::new(vec![
        row(&[("orders_status", json!("A")), ("orders_count", json!(2))]),
        row(&[("orders_status", json!("B")), ("orders_count", json!(1))]),
    ]);

    let results = runner()
        .run(status_count_query(), &client)
        .await
        .unwrap();

    // Echo of the request plus per-execution cache metadata.
    assert_eq!(results.metric_query.explore_name, "orders");
    assert!(!results.cache_metadata.cache_hit);
    assert!(!results.cache_metadata.fingerprint.is_empty());

    // Rows in warehouse order, fully populated.
    assert_eq!(results.rows.len(), 2);
    let first = &results.rows[0];
    assert_eq!(
        first.get(&FieldId::new("orders", "status")).unwrap().raw,
        RawValue::String("A".into())
    );
    assert_eq!(
        first.get(&FieldId::new("orders", "count")).unwrap().raw,
        RawValue::Int(2)
    );

    // Field descriptors for every output column.
    assert_eq!(results.fields.len(), 2);
    assert_eq!(results.fields["orders.count"].kind, "metric");
    assert_eq!(results.fields["orders.status"].kind, "dimension");
}

#[tokio::test]
async fn validation_failure_produces_no_sql() {
    let client = FakeWarehouse::new(vec![]);
    let query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "ghost")],
        ..MetricQuery::new("orders")
    };
    let err = runner().run(query, &client).await.unwrap_err();
    match err {
        CoreError::Validation(errors) => {
            assert!(errors
                .iter()
                .any(|e| e.to_string().contains("orders.ghost")));
        }
        other => panic!("expected validation failure, got {}", other),
    }
}

#[tokio::test]
async fn warehouse_errors_surface_verbatim() {
    let client = FakeWarehouse::failing(ExecutionError::Warehouse {
        message: "relation \"fct_orders\" does not exist".into(),
    });
    let err = runner()
        .run(status_count_query(), &client)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("fct_orders"));
}

#[tokio::test]
async fn aborting_before_consumption_cancels_the_run() {
    let client = FakeWarehouse::new(vec![row(&[
        ("orders_status", json!("A")),
        ("orders_count", json!(2)),
    ])]);
    let (handle, registration) = abort_pair();
    handle.abort();

    let err = runner()
        .run_cancellable(status_count_query(), &client, registration)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Execution(ExecutionError::Cancelled)
    ));
}

#[tokio::test]
async fn streaming_yields_rows_incrementally() {
    let client = FakeWarehouse::new(vec![
        row(&[("orders_status", json!("A")), ("orders_count", json!(2))]),
        row(&[("orders_status", json!("B")), ("orders_count", json!(1))]),
    ]);
    let (_handle, registration) = abort_pair();
    let mut streaming = runner()
        .run_streaming(status_count_query(), &client, registration)
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Some(item) = streaming.rows.next().await {
        let row = item.unwrap();
        seen.push(
            row.get(&FieldId::new("orders", "status"))
                .unwrap()
                .formatted
                .clone(),
        );
    }
    assert_eq!(seen, vec!["A", "B"]);
}

#[tokio::test]
async fn mapping_contract_breach_is_fatal() {
    let client = FakeWarehouse::new(vec![row(&[("not_a_column", json!(1))])]);
    let err = runner()
        .run(status_count_query(), &client)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Mapping(_)));
}

#[tokio::test]
async fn timeout_is_surfaced_as_execution_error() {
    use std::time::Duration;

    /// Never yields a row.
    struct StallingWarehouse;

    #[async_trait]
    impl WarehouseClient for StallingWarehouse {
        async fn execute(&self, _query: &CompiledQuery) -> Result<RowStream, ExecutionError> {
            Ok(futures::stream::pending().boxed())
        }
    }

    let err = runner()
        .run_with_timeout(
            status_count_query(),
            &StallingWarehouse,
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Execution(ExecutionError::Timeout { .. })
    ));
}
