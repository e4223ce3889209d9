#[path = "../fixtures.rs"]
mod fixtures;

use std::sync::Arc;
use std::thread;

use prism::catalog::{CatalogError, CatalogItem};
use prism::model::{ExploreJoin, JoinKind};
use prism::{FieldCatalog, FieldId};

#[test]
fn resolves_fields_and_precompiles_sql() {
    let catalog = fixtures::orders_catalog();

    let status = catalog.resolve(&FieldId::new("orders", "status")).unwrap();
    assert_eq!(status.compiled_sql, "orders.status");

    let revenue = catalog.resolve(&FieldId::new("orders", "revenue")).unwrap();
    assert_eq!(revenue.compiled_sql, "orders.amount");

    assert!(catalog.resolve(&FieldId::new("orders", "missing")).is_none());
}

#[test]
fn all_fields_iterates_in_definition_order() {
    let catalog = fixtures::orders_catalog();
    let names: Vec<String> = catalog
        .all_fields()
        .map(|f| f.field.id().to_string())
        .collect();
    assert_eq!(names[0], "orders.status");
    assert_eq!(names[1], "orders.amount");
    // Metrics of a table come after its dimensions.
    assert!(names.iter().position(|n| n == "orders.count").unwrap() > 3);
}

#[test]
fn join_path_carries_transitive_dependencies() {
    let catalog = fixtures::orders_catalog();

    let orgs_path: Vec<_> = catalog
        .join_path("orgs")
        .unwrap()
        .iter()
        .map(|j| j.table.clone())
        .collect();
    assert_eq!(orgs_path, vec!["users", "orgs"]);

    let users_path: Vec<_> = catalog
        .join_path("users")
        .unwrap()
        .iter()
        .map(|j| j.table.clone())
        .collect();
    assert_eq!(users_path, vec!["users"]);

    assert_eq!(catalog.join_path("orders"), Some(vec![]));
    assert_eq!(catalog.join_path("nowhere"), None);
}

#[test]
fn join_conditions_compile_field_references() {
    let catalog = fixtures::orders_catalog();
    let join = catalog.join("users").unwrap();
    assert_eq!(join.sql_on, "orders.user_id = users.id");
}

#[test]
fn rejects_second_join_to_same_table() {
    let mut explore = fixtures::orders_explore();
    explore.joins.push(ExploreJoin {
        table: "users".into(),
        sql_on: "${orders.user_id} = ${users.id}".into(),
        kind: JoinKind::Inner,
    });
    let err = FieldCatalog::build(explore).unwrap_err();
    assert!(matches!(err, CatalogError::AmbiguousJoinPath { table } if table == "users"));
}

#[test]
fn rejects_join_cycles() {
    let mut explore = fixtures::orders_explore();
    explore.joins[0].sql_on = "${orgs.id} = ${users.id}".into();
    let err = FieldCatalog::build(explore).unwrap_err();
    assert!(matches!(err, CatalogError::JoinCycle { .. }));
}

#[test]
fn snapshot_is_shareable_across_threads() {
    let catalog = Arc::new(fixtures::orders_catalog());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || {
                catalog
                    .resolve(&FieldId::new("users", "country"))
                    .map(|f| f.compiled_sql.clone())
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), "users.country");
    }
}

#[test]
fn catalog_items_project_tables_then_visible_fields() {
    let catalog = fixtures::orders_catalog();
    let items = catalog.catalog_items();

    let tables: Vec<_> = items
        .iter()
        .filter_map(|item| match item {
            CatalogItem::Table(t) => Some(t.name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(tables, vec!["orders", "users", "orgs"]);

    // Hidden keys (user_id, ids) are excluded; tags flow from the table.
    let fields: Vec<_> = items
        .iter()
        .filter_map(|item| match item {
            CatalogItem::Field(f) => Some(f),
            _ => None,
        })
        .collect();
    assert!(fields.iter().all(|f| f.name != "user_id"));
    let status = fields.iter().find(|f| f.name == "status").unwrap();
    assert_eq!(status.tags, vec!["sales"]);
    assert_eq!(status.basic_type, "string");
    let count = fields.iter().find(|f| f.name == "count").unwrap();
    assert_eq!(count.basic_type, "number");
}
