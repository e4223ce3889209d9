#[path = "../fixtures.rs"]
mod fixtures;

use prism::model::FieldId;
use prism::query::{FilterNode, MetricQuery};
use prism::resolve::resolve_joins;
use prism::validate::validate;
use serde_json::json;

fn resolve(query: MetricQuery) -> Vec<String> {
    let catalog = fixtures::orders_catalog();
    let validated = validate(query, &catalog).unwrap();
    let resolved = resolve_joins(validated, &catalog).unwrap();
    resolved.joins().iter().map(|j| j.table.clone()).collect()
}

#[test]
fn base_table_queries_join_nothing() {
    let query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "count")],
        ..MetricQuery::new("orders")
    };
    assert!(resolve(query).is_empty());
}

#[test]
fn dependency_table_always_joins_before_its_dependent() {
    // orgs joins through users; whichever order fields are requested in,
    // users must come first.
    for dims in [
        vec![FieldId::new("orgs", "name"), FieldId::new("users", "country")],
        vec![FieldId::new("users", "country"), FieldId::new("orgs", "name")],
        vec![FieldId::new("orgs", "name")],
    ] {
        let query = MetricQuery {
            dimensions: dims,
            ..MetricQuery::new("orders")
        };
        assert_eq!(resolve(query), vec!["users", "orgs"]);
    }
}

#[test]
fn filter_only_references_pull_joins() {
    let query = MetricQuery {
        metrics: vec![FieldId::new("orders", "count")],
        filters: Some(FilterNode::equals(
            FieldId::new("users", "country"),
            json!("NZ"),
        )),
        ..MetricQuery::new("orders")
    };
    assert_eq!(resolve(query), vec!["users"]);
}

#[test]
fn unused_tables_are_pruned() {
    let query = MetricQuery {
        dimensions: vec![FieldId::new("users", "country")],
        metrics: vec![FieldId::new("orders", "count")],
        ..MetricQuery::new("orders")
    };
    // orgs is never referenced and never joined.
    assert_eq!(resolve(query), vec!["users"]);
}

#[test]
fn resolution_is_deterministic() {
    let query = MetricQuery {
        dimensions: vec![
            FieldId::new("orgs", "name"),
            FieldId::new("users", "country"),
            FieldId::new("orders", "status"),
        ],
        metrics: vec![FieldId::new("orders", "count")],
        ..MetricQuery::new("orders")
    };
    let first = resolve(query.clone());
    let second = resolve(query);
    assert_eq!(first, second);
}
