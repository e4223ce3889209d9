#[path = "../fixtures.rs"]
mod fixtures;

use std::collections::HashMap;

use prism::drill::{resolve_drill_down, UnderlyingDataConfig, DRILL_LIMIT};
use prism::model::FieldId;
use prism::query::{FilterNode, FilterOperator, MetricQuery};
use prism::validate::validate;
use serde_json::{json, Value};

fn original() -> MetricQuery {
    MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "count")],
        filters: Some(FilterNode::equals(
            FieldId::new("users", "country"),
            json!("NZ"),
        )),
        ..MetricQuery::new("orders")
    }
}

fn config_for(status: Value) -> UnderlyingDataConfig {
    UnderlyingDataConfig {
        item: FieldId::new("orders", "count"),
        value: Some(json!(2)),
        field_values: [(FieldId::new("orders", "status"), status)]
            .into_iter()
            .collect(),
        dimensions_ids: None,
    }
}

#[test]
fn drill_query_is_flat_and_pinned() {
    let catalog = fixtures::orders_catalog();
    let drill = resolve_drill_down(&original(), &catalog, &config_for(json!("shipped"))).unwrap();

    assert!(drill.metrics.is_empty());
    assert!(drill.table_calculations.is_empty());
    assert_eq!(drill.limit, Some(DRILL_LIMIT));
    assert_eq!(drill.explore_name, "orders");

    // Pin on the grouping dimension plus the surviving dimension filter.
    let mut pins = Vec::new();
    drill
        .filters
        .as_ref()
        .unwrap()
        .for_each_leaf(&mut |cmp| pins.push((cmp.field.to_string(), cmp.op, cmp.values.clone())));
    assert_eq!(pins.len(), 2);
    assert_eq!(pins[0].0, "orders.status");
    assert_eq!(pins[0].1, FilterOperator::Equals);
    assert_eq!(pins[0].2, vec![json!("shipped")]);
    assert_eq!(pins[1].0, "users.country");
}

#[test]
fn drill_query_revalidates_cleanly() {
    // The derived query re-enters the pipeline at validation.
    let catalog = fixtures::orders_catalog();
    let drill = resolve_drill_down(&original(), &catalog, &config_for(json!("shipped"))).unwrap();
    let validated = validate(drill, &catalog).expect("drill query validates");
    assert!(validated.metrics().is_empty());
    assert!(!validated.dimensions().is_empty());
}

#[test]
fn aggregation_over_pinned_rows_reproduces_the_cell() {
    // Underlying rows behind the aggregate [{A},{A},{B}]: the drill query for
    // the A cell must select exactly the rows whose aggregation rebuilds 2.
    let catalog = fixtures::orders_catalog();
    let underlying = vec![
        json!({"orders.status": "A"}),
        json!({"orders.status": "A"}),
        json!({"orders.status": "B"}),
    ];

    let query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "count")],
        ..MetricQuery::new("orders")
    };
    let config = config_for(json!("A"));
    let drill = resolve_drill_down(&query, &catalog, &config).unwrap();

    // Apply the drill filter's equality pins to the raw rows.
    let mut pins: HashMap<String, Value> = HashMap::new();
    drill.filters.as_ref().unwrap().for_each_leaf(&mut |cmp| {
        if cmp.op == FilterOperator::Equals {
            pins.insert(cmp.field.to_string(), cmp.values[0].clone());
        }
    });
    let matched = underlying
        .iter()
        .filter(|row| pins.iter().all(|(field, value)| &row[field] == value))
        .count();

    // COUNT over the matched rows equals the clicked cell's raw value.
    assert_eq!(matched as i64, 2);
}

#[test]
fn null_cells_pin_with_is_null() {
    let catalog = fixtures::orders_catalog();
    let drill = resolve_drill_down(&original(), &catalog, &config_for(Value::Null)).unwrap();
    let mut found = false;
    drill.filters.as_ref().unwrap().for_each_leaf(&mut |cmp| {
        if cmp.field == FieldId::new("orders", "status") {
            assert_eq!(cmp.op, FilterOperator::IsNull);
            assert!(cmp.values.is_empty());
            found = true;
        }
    });
    assert!(found);
}

#[test]
fn metric_on_joined_table_includes_that_tables_dimensions() {
    let catalog = fixtures::orders_catalog();
    // Clicked item lives on the base table, but the original query touches
    // users through its filter; users dimensions are included.
    let drill = resolve_drill_down(&original(), &catalog, &config_for(json!("x"))).unwrap();
    assert!(drill.dimensions.contains(&FieldId::new("users", "country")));
    // Hidden join keys stay hidden.
    assert!(!drill.dimensions.contains(&FieldId::new("users", "id")));
}

#[test]
fn explicit_dimension_ids_override_discovery() {
    let catalog = fixtures::orders_catalog();
    let mut config = config_for(json!("x"));
    config.dimensions_ids = Some(vec![FieldId::new("orders", "status")]);
    let drill = resolve_drill_down(&original(), &catalog, &config).unwrap();
    assert_eq!(drill.dimensions, vec![FieldId::new("orders", "status")]);
}
