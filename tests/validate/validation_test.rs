#[path = "../fixtures.rs"]
mod fixtures;

use prism::model::{Aggregation, FieldId, FormatOptions};
use prism::query::{
    AdditionalMetric, CustomDimension, CustomDimensionKind, FilterComparison, FilterNode,
    FilterOperator, MetricQuery, SortSpec, TableCalculation,
};
use prism::validate::{validate, HandleKind, ValidationError};
use serde_json::json;

fn base_query() -> MetricQuery {
    MetricQuery {
        dimensions: vec![FieldId::new("orders", "status")],
        metrics: vec![FieldId::new("orders", "count")],
        ..MetricQuery::new("orders")
    }
}

#[test]
fn accepts_a_well_formed_query() {
    let catalog = fixtures::orders_catalog();
    let validated = validate(base_query(), &catalog).unwrap();
    assert_eq!(validated.dimensions().len(), 1);
    assert_eq!(validated.metrics().len(), 1);
}

#[test]
fn unknown_reference_is_named_in_the_error() {
    let catalog = fixtures::orders_catalog();
    let mut query = base_query();
    query.dimensions.push(FieldId::new("orders", "ghost"));

    let errors = validate(query, &catalog).unwrap_err();
    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(rendered.iter().any(|m| m.contains("orders.ghost")));
}

#[test]
fn reports_every_violation_not_just_the_first() {
    let catalog = fixtures::orders_catalog();
    let query = MetricQuery {
        dimensions: vec![FieldId::new("orders", "ghost")],
        metrics: vec![FieldId::new("users", "country")],
        sorts: vec![SortSpec {
            field: FieldId::new("orgs", "name"),
            descending: true,
        }],
        limit: Some(0),
        ..MetricQuery::new("orders")
    };
    let errors = validate(query, &catalog).unwrap_err();
    assert!(errors.len() >= 4);
    assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidLimit)));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::NotAMetric { .. })));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::SortFieldNotSelected { .. })));
}

#[test]
fn additional_metric_resolves_and_collides() {
    let catalog = fixtures::orders_catalog();

    let aov = AdditionalMetric {
        name: "aov".into(),
        table: "orders".into(),
        sql: "${TABLE}.amount".into(),
        aggregation: Aggregation::Avg,
        percentile: None,
        label: None,
        format: FormatOptions::default(),
    };
    let mut query = base_query();
    query.metrics.push(FieldId::new("orders", "aov"));
    query.additional_metrics.push(aov.clone());
    let validated = validate(query, &catalog).unwrap();
    assert_eq!(
        validated.kind_of(&FieldId::new("orders", "aov")),
        Some(HandleKind::AdditionalMetric)
    );

    // Same inline id as a catalog metric.
    let mut collision = aov;
    collision.name = "count".into();
    let mut query = base_query();
    query.additional_metrics.push(collision);
    let errors = validate(query, &catalog).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::IdCollision { .. })));
}

#[test]
fn bucket_base_must_be_a_numeric_dimension() {
    let catalog = fixtures::orders_catalog();
    let mut query = base_query();
    query.custom_dimensions.push(CustomDimension {
        id: "status_bucket".into(),
        label: None,
        kind: CustomDimensionKind::Bucket {
            base_dimension: FieldId::new("orders", "status"),
            ranges: vec![],
        },
    });
    let errors = validate(query, &catalog).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::OperatorTypeMismatch { .. })));
}

#[test]
fn table_calculation_may_only_reference_selected_fields() {
    let catalog = fixtures::orders_catalog();
    let mut query = base_query();
    query.table_calculations.push(TableCalculation {
        name: "margin".into(),
        label: None,
        sql: "${orders.revenue} / ${orders.count}".into(),
        format: FormatOptions::default(),
    });
    // revenue is not selected.
    let errors = validate(query, &catalog).unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::CalcUnknownReference { reference, .. }
            if reference.as_str() == "orders.revenue"
    )));
}

#[test]
fn filters_do_not_require_selection_but_must_type_check() {
    let catalog = fixtures::orders_catalog();

    let mut query = base_query();
    query.filters = Some(FilterNode::Compare(FilterComparison {
        field: FieldId::new("users", "country"),
        op: FilterOperator::Equals,
        values: vec![json!("NZ")],
    }));
    assert!(validate(query, &catalog).is_ok());

    let mut query = base_query();
    query.filters = Some(FilterNode::Compare(FilterComparison {
        field: FieldId::new("orders", "amount"),
        op: FilterOperator::GreaterThan,
        values: vec![json!("not a number")],
    }));
    let errors = validate(query, &catalog).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::ValueTypeMismatch { .. })));
}

#[test]
fn in_between_needs_exactly_two_values() {
    let catalog = fixtures::orders_catalog();
    let mut query = base_query();
    query.filters = Some(FilterNode::Compare(FilterComparison {
        field: FieldId::new("orders", "amount"),
        op: FilterOperator::InBetween,
        values: vec![json!(10)],
    }));
    let errors = validate(query, &catalog).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::WrongValueCount { .. })));
}

#[test]
fn rejects_garbage_timezones() {
    let catalog = fixtures::orders_catalog();
    let mut query = base_query();
    query.timezone = Some("Pacific/Auckland; DROP TABLE".into());
    let errors = validate(query, &catalog).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::InvalidTimezone { .. })));

    let mut query = base_query();
    query.timezone = Some("Pacific/Auckland".into());
    assert!(validate(query, &catalog).is_ok());
}
