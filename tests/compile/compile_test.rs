#[path = "../fixtures.rs"]
mod fixtures;

use prism::compile::{compile, CompileError};
use prism::model::{Aggregation, FieldId, FormatOptions};
use prism::query::{
    AdditionalMetric, BucketRange, CustomDimension, CustomDimensionKind, FilterComparison,
    FilterNode, FilterOperator, MetricQuery, SortSpec, TableCalculation,
};
use prism::resolve::resolve_joins;
use prism::validate::validate;
use prism::Dialect;
use serde_json::json;

fn compile_for(query: MetricQuery, dialect: Dialect) -> Result<prism::compile::CompiledQuery, CompileError> {
    let catalog = fixtures::orders_catalog();
    let validated = validate(query, &catalog).unwrap();
    let resolved = resolve_joins(validated, &catalog).unwrap();
    compile(&resolved, &catalog, dialect)
}

fn sql_for(query: MetricQuery) -> String {
    compile_for(query, Dialect::Postgres).unwrap().sql
}

fn grouped_query() -> MetricQuery {
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

#[test]
fn grouped_query_selects_groups_and_orders() {
    let sql = sql_for(grouped_query());

    assert!(sql.contains("SELECT"));
    assert!(sql.contains("orders.status AS \"orders_status\""));
    assert!(sql.contains("COUNT(orders.id) AS \"orders_count\""));
    assert!(sql.contains("FROM \"analytics\".\"fct_orders\" AS \"orders\""));
    assert!(sql.contains("GROUP BY orders.status"));
    assert!(sql.contains("ORDER BY \"orders_status\" ASC"));
    // Single statement, no stray clauses.
    assert!(!sql.contains("HAVING"));
    assert!(!sql.contains("WITH"));
}

#[test]
fn compilation_is_deterministic() {
    let first = compile_for(grouped_query(), Dialect::Postgres).unwrap();
    let second = compile_for(grouped_query(), Dialect::Postgres).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.fingerprint, second.fingerprint);

    let bigquery = compile_for(grouped_query(), Dialect::BigQuery).unwrap();
    assert_ne!(first.fingerprint, bigquery.fingerprint);
}

#[test]
fn output_field_order_is_dimensions_metrics_calculations() {
    let mut query = grouped_query();
    query.dimensions.push(FieldId::new("users", "country"));
    query.table_calculations.push(TableCalculation {
        name: "doubled".into(),
        label: None,
        sql: "${orders.count} * 2".into(),
        format: FormatOptions::default(),
    });
    let compiled = compile_for(query, Dialect::Postgres).unwrap();
    let ids: Vec<_> = compiled.fields.iter().map(|f| f.id.to_string()).collect();
    assert_eq!(
        ids,
        vec!["orders.status", "users.country", "orders.count", "doubled"]
    );
}

#[test]
fn dimension_and_metric_filters_split_into_where_and_having() {
    let mut query = grouped_query();
    query.filters = Some(FilterNode::and(vec![
        FilterNode::equals(FieldId::new("users", "country"), json!("NZ")),
        FilterNode::Compare(FilterComparison {
            field: FieldId::new("orders", "revenue"),
            op: FilterOperator::GreaterThan,
            values: vec![json!(1000)],
        }),
    ]));
    let sql = sql_for(query);

    assert!(sql.contains("WHERE users.country = 'NZ'"));
    assert!(sql.contains("HAVING SUM(orders.amount) > 1000"));
}

#[test]
fn filtered_but_unselected_fields_stay_out_of_the_select_list() {
    let mut query = grouped_query();
    query.filters = Some(FilterNode::equals(
        FieldId::new("users", "country"),
        json!("NZ"),
    ));
    let compiled = compile_for(query, Dialect::Postgres).unwrap();

    assert!(compiled.field(&FieldId::new("users", "country")).is_none());
    assert!(compiled.sql.contains("LEFT JOIN \"analytics\".\"dim_users\" AS \"users\""));
    assert!(compiled.sql.contains("WHERE users.country = 'NZ'"));
}

#[test]
fn filters_render_compiled_expressions_not_column_names() {
    // A filter on a bucketed custom dimension reuses the CASE expression.
    let mut query = grouped_query();
    query.custom_dimensions.push(CustomDimension {
        id: "amount_tier".into(),
        label: None,
        kind: CustomDimensionKind::Bucket {
            base_dimension: FieldId::new("orders", "amount"),
            ranges: vec![
                BucketRange {
                    from: None,
                    to: Some(100.0),
                    label: Some("small".into()),
                },
                BucketRange {
                    from: Some(100.0),
                    to: None,
                    label: Some("large".into()),
                },
            ],
        },
    });
    query.filters = Some(FilterNode::equals(FieldId::named("amount_tier"), json!("large")));
    let sql = sql_for(query);

    assert!(sql.contains(
        "WHERE CASE WHEN orders.amount < 100.0 THEN 'small' WHEN orders.amount >= 100.0 THEN 'large' END = 'large'"
    ));
    // And the custom dimension is selected and grouped like any dimension.
    assert!(sql.contains("AS \"amount_tier\""));
    assert!(sql.contains("GROUP BY orders.status, CASE WHEN"));
}

#[test]
fn table_calculations_wrap_the_query_in_a_cte() {
    let mut query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "revenue")],
        ..MetricQuery::new("orders")
    };
    query.additional_metrics.push(AdditionalMetric {
        name: "cost".into(),
        table: "orders".into(),
        sql: "${TABLE}.cost".into(),
        aggregation: Aggregation::Sum,
        percentile: None,
        label: None,
        format: FormatOptions::default(),
    });
    query.metrics.push(FieldId::new("orders", "cost"));
    query.table_calculations.push(TableCalculation {
        name: "profit".into(),
        label: None,
        sql: "${orders.revenue} - ${orders.cost}".into(),
        format: FormatOptions::default(),
    });
    let sql = sql_for(query);

    assert!(sql.starts_with("WITH \"metrics\" AS ("));
    assert!(sql.contains("FROM \"metrics\""));
    assert!(sql.contains("\"orders_revenue\" - \"orders_cost\" AS \"profit\""));
    // The calculation stays out of the aggregation query: it appears only
    // after the GROUP BY of the CTE body.
    assert!(sql.contains("GROUP BY orders.status"));
    assert!(sql.find("profit").unwrap() > sql.find("GROUP BY").unwrap());
}

#[test]
fn sorting_on_a_calculation_uses_the_outer_query() {
    let mut query = grouped_query();
    query.table_calculations.push(TableCalculation {
        name: "doubled".into(),
        label: None,
        sql: "${orders.count} * 2".into(),
        format: FormatOptions::default(),
    });
    query.sorts = vec![SortSpec {
        field: FieldId::named("doubled"),
        descending: true,
    }];
    let sql = sql_for(query);
    let order_at = sql.find("ORDER BY \"doubled\" DESC").unwrap();
    assert!(order_at > sql.find("FROM \"metrics\"").unwrap());
}

#[test]
fn sorting_on_an_unpushable_calculation_is_a_compile_error() {
    // DuckDB has no INITCAP; the calculation falls back to the mapper and
    // cannot be sorted in SQL.
    let mut query = grouped_query();
    query.table_calculations.push(TableCalculation {
        name: "pretty_status".into(),
        label: None,
        sql: "initcap(${orders.status})".into(),
        format: FormatOptions::default(),
    });
    query.sorts.push(SortSpec {
        field: FieldId::named("pretty_status"),
        descending: false,
    });
    let err = compile_for(query, Dialect::DuckDb).unwrap_err();
    assert!(matches!(err, CompileError::SortOnUnpushedCalculation { .. }));
}

#[test]
fn limit_renders_only_when_requested() {
    let mut query = grouped_query();
    assert!(!sql_for(query.clone()).contains("LIMIT"));
    query.limit = Some(50);
    assert!(sql_for(query).contains("LIMIT 50"));
}

#[test]
fn timezone_wraps_timestamp_dimensions() {
    let mut query = grouped_query();
    query.dimensions.push(FieldId::new("orders", "created_at"));
    query.timezone = Some("Pacific/Auckland".into());
    let sql = sql_for(query);
    assert!(sql.contains("(orders.created_at AT TIME ZONE 'Pacific/Auckland') AS \"orders_created_at\""));
}
