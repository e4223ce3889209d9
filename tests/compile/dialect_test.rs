#[path = "../fixtures.rs"]
mod fixtures;

use prism::compile::{compile, CompileError};
use prism::model::{FieldId, FormatOptions};
use prism::query::{MetricQuery, TableCalculation};
use prism::resolve::resolve_joins;
use prism::validate::validate;
use prism::Dialect;

fn compile_for(
    query: MetricQuery,
    dialect: Dialect,
) -> Result<prism::compile::CompiledQuery, CompileError> {
    let catalog = fixtures::orders_catalog();
    let validated = validate(query, &catalog).unwrap();
    let resolved = resolve_joins(validated, &catalog).unwrap();
    compile(&resolved, &catalog, dialect)
}

fn median_query() -> MetricQuery {
    MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "median_amount")],
        ..MetricQuery::new("orders")
    }
}

#[test]
fn median_diverges_per_dialect() {
    let postgres = compile_for(median_query(), Dialect::Postgres).unwrap();
    assert!(postgres
        .sql
        .contains("PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY orders.amount)"));

    let duckdb = compile_for(median_query(), Dialect::DuckDb).unwrap();
    assert!(duckdb.sql.contains("MEDIAN(orders.amount)"));

    let bigquery = compile_for(median_query(), Dialect::BigQuery).unwrap();
    assert!(bigquery
        .sql
        .contains("APPROX_QUANTILES(orders.amount, 100)[OFFSET(50)]"));
}

#[test]
fn mysql_cannot_express_median() {
    let err = compile_for(median_query(), Dialect::MySql).unwrap_err();
    match err {
        CompileError::UnsupportedAggregate { dialect, field, .. } => {
            assert_eq!(dialect, "mysql");
            assert_eq!(field.as_str(), "orders.median_amount");
        }
        other => panic!("expected UnsupportedAggregate, got {:?}", other),
    }
}

#[test]
fn identifier_quoting_follows_the_dialect() {
    let query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "count")],
        ..MetricQuery::new("orders")
    };
    let postgres = compile_for(query.clone(), Dialect::Postgres).unwrap();
    assert!(postgres.sql.contains("AS \"orders_status\""));

    let bigquery = compile_for(query, Dialect::BigQuery).unwrap();
    assert!(bigquery.sql.contains("AS `orders_status`"));
    assert!(bigquery.sql.contains("FROM `analytics`.`fct_orders` AS `orders`"));
}

#[test]
fn timezone_conversion_diverges_per_dialect() {
    let query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "created_at")],
        metrics: vec![FieldId::new("orders", "count")],
        timezone: Some("Pacific/Auckland".into()),
        ..MetricQuery::new("orders")
    };

    let snowflake = compile_for(query.clone(), Dialect::Snowflake).unwrap();
    assert!(snowflake
        .sql
        .contains("CONVERT_TIMEZONE('Pacific/Auckland', orders.created_at)"));

    let bigquery = compile_for(query.clone(), Dialect::BigQuery).unwrap();
    assert!(bigquery
        .sql
        .contains("DATETIME(orders.created_at, 'Pacific/Auckland')"));

    let mysql = compile_for(query, Dialect::MySql).unwrap();
    assert!(mysql
        .sql
        .contains("CONVERT_TZ(orders.created_at, 'UTC', 'Pacific/Auckland')"));
}

#[test]
fn unpushable_calculation_falls_back_to_the_mapper() {
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

    // PostgreSQL has INITCAP: pushed into SQL.
    let postgres = compile_for(query.clone(), Dialect::Postgres).unwrap();
    assert!(postgres.post_calcs.is_empty());
    assert!(postgres.sql.contains("INITCAP(\"orders_status\") AS \"pretty_status\""));

    // MySQL does not: the mapper computes it, and the column is absent from
    // the SQL while still present in the output field list.
    let mysql = compile_for(query, Dialect::MySql).unwrap();
    assert_eq!(mysql.post_calcs.len(), 1);
    assert!(!mysql.sql.contains("pretty_status"));
    assert!(mysql.field(&FieldId::named("pretty_status")).is_some());
}
