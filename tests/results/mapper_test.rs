#[path = "../fixtures.rs"]
mod fixtures;

use std::sync::Arc;

use prism::compile::compile;
use prism::model::{FieldId, FormatOptions};
use prism::query::{MetricQuery, TableCalculation};
use prism::resolve::resolve_joins;
use prism::results::{JsonRow, MappingError, RawValue, ResultMapper};
use prism::validate::validate;
use prism::Dialect;
use serde_json::{json, Value};

fn mapper_for(query: MetricQuery, dialect: Dialect) -> ResultMapper {
    let catalog = fixtures::orders_catalog();
    let validated = validate(query, &catalog).unwrap();
    let resolved = resolve_joins(validated, &catalog).unwrap();
    let compiled = compile(&resolved, &catalog, dialect).unwrap();
    ResultMapper::new(Arc::new(compiled))
}

fn row(pairs: &[(&str, Value)]) -> JsonRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn revenue_query() -> MetricQuery {
    MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "revenue")],
        ..MetricQuery::new("orders")
    }
}

#[test]
fn rows_carry_raw_and_formatted_values() {
    let mapper = mapper_for(revenue_query(), Dialect::Postgres);
    let mapped = mapper
        .map_row(&row(&[
            ("orders_status", json!("shipped")),
            ("orders_revenue", json!(1234.5)),
        ]))
        .unwrap();

    let revenue = mapped.get(&FieldId::new("orders", "revenue")).unwrap();
    assert_eq!(revenue.raw, RawValue::Float(1234.5));
    assert_eq!(revenue.formatted, "$1234.50");

    let status = mapped.get(&FieldId::new("orders", "status")).unwrap();
    assert_eq!(status.formatted, "shipped");
}

#[test]
fn every_output_field_exists_on_every_row() {
    let mapper = mapper_for(revenue_query(), Dialect::Postgres);
    let mapped = mapper.map_row(&row(&[])).unwrap();

    assert_eq!(mapped.len(), 2);
    for (_, value) in mapped.iter() {
        assert_eq!(value.raw, RawValue::Null);
        assert_eq!(value.formatted, "-");
    }
}

#[test]
fn unknown_column_is_a_mapping_error() {
    let mapper = mapper_for(revenue_query(), Dialect::Postgres);
    let err = mapper
        .map_row(&row(&[("surprise", json!(1))]))
        .unwrap_err();
    assert!(matches!(err, MappingError::UnexpectedColumn { alias } if alias == "surprise"));
}

#[test]
fn mapper_evaluates_unpushed_calculations_per_row() {
    let mut query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "count")],
        ..MetricQuery::new("orders")
    };
    query.table_calculations.push(TableCalculation {
        name: "pretty_status".into(),
        label: None,
        sql: "initcap(${orders.status})".into(),
        format: FormatOptions::default(),
    });
    // MySQL cannot push initcap; the mapper computes it from the row's own
    // already-mapped values.
    let mapper = mapper_for(query, Dialect::MySql);
    let mapped = mapper
        .map_row(&row(&[
            ("orders_status", json!("partially shipped")),
            ("orders_count", json!(7)),
        ]))
        .unwrap();

    let pretty = mapped.get(&FieldId::named("pretty_status")).unwrap();
    assert_eq!(pretty.raw, RawValue::String("Partially Shipped".into()));
}

#[test]
fn pushed_calculation_values_come_back_from_the_warehouse() {
    let mut query = revenue_query();
    query.table_calculations.push(TableCalculation {
        name: "doubled".into(),
        label: None,
        sql: "${orders.revenue} * 2".into(),
        format: FormatOptions::default(),
    });
    let mapper = mapper_for(query, Dialect::Postgres);
    let mapped = mapper
        .map_row(&row(&[
            ("orders_status", json!("shipped")),
            ("orders_revenue", json!(10)),
            ("doubled", json!(20)),
        ]))
        .unwrap();
    assert_eq!(
        mapped.get(&FieldId::named("doubled")).unwrap().raw,
        RawValue::Int(20)
    );
}

#[tokio::test]
async fn map_stream_is_lazy_and_ordered() {
    use futures::StreamExt;

    let mapper = mapper_for(revenue_query(), Dialect::Postgres);
    let rows = vec![
        Ok::<_, std::convert::Infallible>(row(&[
            ("orders_status", json!("a")),
            ("orders_revenue", json!(1)),
        ])),
        Ok(row(&[
            ("orders_status", json!("b")),
            ("orders_revenue", json!(2)),
        ])),
    ];
    let mapped: Vec<_> = mapper
        .map_stream(futures::stream::iter(rows))
        .collect()
        .await;

    assert_eq!(mapped.len(), 2);
    let first = mapped[0].as_ref().unwrap();
    assert_eq!(
        first.get(&FieldId::new("orders", "status")).unwrap().formatted,
        "a"
    );
}

#[test]
fn result_rows_serialize_as_objects_in_column_order() {
    let mapper = mapper_for(revenue_query(), Dialect::Postgres);
    let mapped = mapper
        .map_row(&row(&[
            ("orders_status", json!("shipped")),
            ("orders_revenue", json!(5)),
        ]))
        .unwrap();
    let json = serde_json::to_value(&mapped).unwrap();
    assert_eq!(json["orders.status"]["raw"], json!("shipped"));
    assert_eq!(json["orders.revenue"]["formatted"], json!("$5.00"));
}
