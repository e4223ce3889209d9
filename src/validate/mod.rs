//! Query validation.
//!
//! Checks a declarative [`MetricQuery`] against a catalog before anything is
//! compiled. Validation is batched: every violation found is reported, not
//! just the first, so callers can surface a complete error list.
//!
//! Successful validation produces [`FieldHandle`]s - typed references that
//! can only be minted here, so later stages never meet an unknown field id.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::calc::{self, CalcExpr, CalcParseError};
use crate::catalog::FieldCatalog;
use crate::model::{Aggregation, FieldId, FormatOptions, SemanticType};
use crate::query::{
    BoolOp, CustomDimensionKind, FilterComparison, FilterNode, FilterOperator, MetricQuery,
};

pub type ValidateResult<T> = Result<T, Vec<ValidationError>>;

/// A single validation failure, with enough detail to fix the request.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Query names a different explore than the catalog snapshot.
    WrongExplore { requested: String, catalog: String },
    /// A referenced field id resolved nowhere.
    UnknownField { field: FieldId, context: String },
    /// The dimensions list contains something that is not a dimension.
    NotADimension { field: FieldId },
    /// The metrics list contains something that is not a metric.
    NotAMetric { field: FieldId },
    /// An inline definition reuses an id already taken.
    IdCollision { id: FieldId },
    /// Filter operator does not apply to the field's type.
    OperatorTypeMismatch {
        field: FieldId,
        op: FilterOperator,
        semantic_type: SemanticType,
    },
    /// Filter has the wrong number of comparison values.
    WrongValueCount {
        field: FieldId,
        op: FilterOperator,
        expected: String,
        got: usize,
    },
    /// Filter value's JSON type does not match the field's type.
    ValueTypeMismatch { field: FieldId, value: Value },
    /// An OR group mixes dimension and metric comparisons; such a group
    /// cannot be split between WHERE and HAVING.
    MixedOrGroup,
    /// Filters cannot target table calculations.
    FilterOnTableCalculation { field: FieldId },
    /// A table calculation failed to parse.
    CalcParse { name: String, error: CalcParseError },
    /// A table calculation references something outside the select set.
    CalcUnknownReference { name: String, reference: FieldId },
    /// A table calculation references a later (or itself as a) calculation.
    CalcForwardReference { name: String, reference: FieldId },
    /// Sorted field is not part of the output.
    SortFieldNotSelected { field: FieldId },
    /// Limit must be a positive integer.
    InvalidLimit,
    /// Percentile metrics need a percentile in (0, 1].
    InvalidPercentile { field: FieldId },
    /// Timezone string contains characters no IANA name uses.
    InvalidTimezone { timezone: String },
    /// A referenced table is not part of the explore, or cannot be joined.
    UnreachableTable { table: String, context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::WrongExplore { requested, catalog } => {
                write!(
                    f,
                    "Query targets explore '{}' but the catalog is for '{}'",
                    requested, catalog
                )
            }
            ValidationError::UnknownField { field, context } => {
                write!(f, "Unknown field '{}' in {}", field, context)
            }
            ValidationError::NotADimension { field } => {
                write!(f, "'{}' is not a dimension", field)
            }
            ValidationError::NotAMetric { field } => {
                write!(f, "'{}' is not a metric", field)
            }
            ValidationError::IdCollision { id } => {
                write!(f, "Inline definition id '{}' is already in use", id)
            }
            ValidationError::OperatorTypeMismatch {
                field,
                op,
                semantic_type,
            } => {
                write!(
                    f,
                    "Operator {:?} cannot be applied to '{}' ({:?} field)",
                    op, field, semantic_type
                )
            }
            ValidationError::WrongValueCount {
                field,
                op,
                expected,
                got,
            } => {
                write!(
                    f,
                    "Filter on '{}' with {:?} expects {} value(s), got {}",
                    field, op, expected, got
                )
            }
            ValidationError::ValueTypeMismatch { field, value } => {
                write!(f, "Filter value {} does not match type of '{}'", value, field)
            }
            ValidationError::MixedOrGroup => {
                write!(
                    f,
                    "An OR group mixes dimension and metric filters; split them into separate groups"
                )
            }
            ValidationError::FilterOnTableCalculation { field } => {
                write!(f, "Cannot filter on table calculation '{}'", field)
            }
            ValidationError::CalcParse { name, error } => {
                write!(f, "Table calculation '{}' failed to parse: {}", name, error)
            }
            ValidationError::CalcUnknownReference { name, reference } => {
                write!(
                    f,
                    "Table calculation '{}' references '{}', which is not selected",
                    name, reference
                )
            }
            ValidationError::CalcForwardReference { name, reference } => {
                write!(
                    f,
                    "Table calculation '{}' references '{}' before it is evaluated",
                    name, reference
                )
            }
            ValidationError::SortFieldNotSelected { field } => {
                write!(f, "Cannot sort on '{}': it is not selected", field)
            }
            ValidationError::InvalidLimit => {
                write!(f, "Limit must be a positive integer")
            }
            ValidationError::InvalidPercentile { field } => {
                write!(
                    f,
                    "Metric '{}' needs a percentile between 0 (exclusive) and 1",
                    field
                )
            }
            ValidationError::InvalidTimezone { timezone } => {
                write!(f, "Invalid timezone name: '{}'", timezone)
            }
            ValidationError::UnreachableTable { table, context } => {
                write!(f, "Table '{}' ({}) is not reachable in this explore", table, context)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// What a validated field id points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Dimension,
    Metric,
    AdditionalMetric,
    CustomDimension,
    TableCalculation,
}

impl HandleKind {
    /// Aggregated fields end up in HAVING; the rest in WHERE.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, HandleKind::Metric | HandleKind::AdditionalMetric)
    }
}

/// A catalog-checked field reference. Only produced by [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHandle {
    id: FieldId,
    kind: HandleKind,
}

impl FieldHandle {
    fn new(id: FieldId, kind: HandleKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }
}

/// A table calculation with its parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCalc {
    pub name: String,
    pub label: Option<String>,
    pub expr: CalcExpr,
    pub format: FormatOptions,
}

/// A query that passed validation. The select lists are complete: custom
/// dimensions and additional metrics not named in the request's lists are
/// appended to their blocks in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    query: MetricQuery,
    dimensions: Vec<FieldHandle>,
    metrics: Vec<FieldHandle>,
    calcs: Vec<ValidatedCalc>,
    universe: HashMap<FieldId, HandleKind>,
}

impl ValidatedQuery {
    /// The original request, echoed back in responses.
    pub fn request(&self) -> &MetricQuery {
        &self.query
    }

    /// Dimension block handles, in output order.
    pub fn dimensions(&self) -> &[FieldHandle] {
        &self.dimensions
    }

    /// Metric block handles, in output order.
    pub fn metrics(&self) -> &[FieldHandle] {
        &self.metrics
    }

    /// Table calculations in declaration order.
    pub fn calcs(&self) -> &[ValidatedCalc] {
        &self.calcs
    }

    pub fn timezone(&self) -> Option<&str> {
        self.query.timezone.as_deref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.query.limit
    }

    pub fn filters(&self) -> Option<&FilterNode> {
        self.query.filters.as_ref()
    }

    /// Kind of any id validated against this query.
    pub fn kind_of(&self, id: &FieldId) -> Option<HandleKind> {
        self.universe.get(id).copied()
    }
}

/// Validate a metric query against a catalog.
///
/// Returns every violation found. No SQL is produced for invalid queries.
pub fn validate(query: MetricQuery, catalog: &FieldCatalog) -> ValidateResult<ValidatedQuery> {
    let mut errors = Vec::new();

    if query.explore_name != catalog.explore_name() {
        errors.push(ValidationError::WrongExplore {
            requested: query.explore_name.clone(),
            catalog: catalog.explore_name().to_string(),
        });
    }

    // The resolution universe: catalog fields plus inline definitions.
    let mut universe: HashMap<FieldId, HandleKind> = HashMap::new();
    for compiled in catalog.all_fields() {
        let kind = if compiled.field.is_metric() {
            HandleKind::Metric
        } else {
            HandleKind::Dimension
        };
        universe.insert(compiled.field.id(), kind);
    }
    for metric in &query.additional_metrics {
        let id = metric.id();
        if universe.contains_key(&id) {
            errors.push(ValidationError::IdCollision { id });
        } else {
            universe.insert(id, HandleKind::AdditionalMetric);
        }
    }
    for custom in &query.custom_dimensions {
        let id = custom.field_id();
        if universe.contains_key(&id) {
            errors.push(ValidationError::IdCollision { id });
        } else {
            universe.insert(id, HandleKind::CustomDimension);
        }
    }
    for calc in &query.table_calculations {
        let id = calc.field_id();
        if universe.contains_key(&id) {
            errors.push(ValidationError::IdCollision { id });
        } else {
            universe.insert(id, HandleKind::TableCalculation);
        }
    }

    // Custom dimension bases must be numeric catalog dimensions; SQL custom
    // dimensions may only reference catalog dimensions.
    for custom in &query.custom_dimensions {
        match &custom.kind {
            CustomDimensionKind::Bucket { base_dimension, .. } => {
                match catalog.resolve(base_dimension) {
                    Some(compiled) if compiled.field.is_dimension() => {
                        if !compiled.field.semantic_type().is_numeric() {
                            errors.push(ValidationError::OperatorTypeMismatch {
                                field: base_dimension.clone(),
                                op: FilterOperator::InBetween,
                                semantic_type: compiled.field.semantic_type(),
                            });
                        }
                    }
                    Some(_) => errors.push(ValidationError::NotADimension {
                        field: base_dimension.clone(),
                    }),
                    None => errors.push(ValidationError::UnknownField {
                        field: base_dimension.clone(),
                        context: format!("custom dimension '{}'", custom.id),
                    }),
                }
            }
            CustomDimensionKind::Sql { sql, .. } => {
                for reference in calc::scan_references(sql) {
                    match catalog.resolve(&reference) {
                        Some(compiled) if compiled.field.is_dimension() => {}
                        Some(_) => {
                            errors.push(ValidationError::NotADimension { field: reference })
                        }
                        None => errors.push(ValidationError::UnknownField {
                            field: reference,
                            context: format!("custom dimension '{}'", custom.id),
                        }),
                    }
                }
            }
        }
    }

    // Additional metrics must live on a table the explore can reach.
    for metric in &query.additional_metrics {
        if catalog.table(&metric.table).is_none() {
            errors.push(ValidationError::UnreachableTable {
                table: metric.table.clone(),
                context: format!("additional metric '{}'", metric.id()),
            });
        }
    }

    // Percentile metrics need their parameter.
    for metric in &query.additional_metrics {
        if metric.aggregation == Aggregation::Percentile {
            let valid = metric.percentile.map(|p| p > 0.0 && p <= 1.0).unwrap_or(false);
            if !valid {
                errors.push(ValidationError::InvalidPercentile { field: metric.id() });
            }
        }
    }

    // Dimension block: request order, then unreferenced custom dimensions.
    let mut dimensions = Vec::new();
    for id in &query.dimensions {
        match universe.get(id) {
            Some(HandleKind::Dimension) | Some(HandleKind::CustomDimension) => {
                dimensions.push(FieldHandle::new(id.clone(), universe[id]));
            }
            Some(_) => errors.push(ValidationError::NotADimension { field: id.clone() }),
            None => errors.push(ValidationError::UnknownField {
                field: id.clone(),
                context: "dimensions".to_string(),
            }),
        }
    }
    for custom in &query.custom_dimensions {
        let id = custom.field_id();
        if !query.dimensions.contains(&id) && universe.get(&id) == Some(&HandleKind::CustomDimension)
        {
            dimensions.push(FieldHandle::new(id, HandleKind::CustomDimension));
        }
    }

    // Metric block: request order, then unreferenced additional metrics.
    let mut metrics = Vec::new();
    for id in &query.metrics {
        match universe.get(id) {
            Some(HandleKind::Metric) | Some(HandleKind::AdditionalMetric) => {
                metrics.push(FieldHandle::new(id.clone(), universe[id]));
            }
            Some(_) => errors.push(ValidationError::NotAMetric { field: id.clone() }),
            None => errors.push(ValidationError::UnknownField {
                field: id.clone(),
                context: "metrics".to_string(),
            }),
        }
    }
    for metric in &query.additional_metrics {
        let id = metric.id();
        if !query.metrics.contains(&id) && universe.get(&id) == Some(&HandleKind::AdditionalMetric) {
            metrics.push(FieldHandle::new(id, HandleKind::AdditionalMetric));
        }
    }

    // Table calculations: parse, then check references against the select set
    // plus earlier calculations only.
    let mut calcs = Vec::new();
    let mut selectable: Vec<FieldId> = dimensions
        .iter()
        .chain(metrics.iter())
        .map(|h| h.id().clone())
        .collect();
    for table_calc in &query.table_calculations {
        match calc::parse(&table_calc.sql) {
            Ok(expr) => {
                for reference in expr.references() {
                    if selectable.contains(reference) {
                        continue;
                    }
                    let error = match universe.get(reference) {
                        Some(HandleKind::TableCalculation) => {
                            ValidationError::CalcForwardReference {
                                name: table_calc.name.clone(),
                                reference: reference.clone(),
                            }
                        }
                        _ => ValidationError::CalcUnknownReference {
                            name: table_calc.name.clone(),
                            reference: reference.clone(),
                        },
                    };
                    errors.push(error);
                }
                calcs.push(ValidatedCalc {
                    name: table_calc.name.clone(),
                    label: table_calc.label.clone(),
                    expr,
                    format: table_calc.format.clone(),
                });
            }
            Err(error) => errors.push(ValidationError::CalcParse {
                name: table_calc.name.clone(),
                error,
            }),
        }
        selectable.push(table_calc.field_id());
    }

    // Filters: resolve every leaf, check operator/type compatibility, and
    // reject OR groups that mix WHERE- and HAVING-eligible comparisons.
    if let Some(filters) = &query.filters {
        validate_filter_node(filters, catalog, &query, &universe, &mut errors);
    }

    // Sorts must reference output columns.
    for sort in &query.sorts {
        if !selectable.contains(&sort.field) {
            errors.push(ValidationError::SortFieldNotSelected {
                field: sort.field.clone(),
            });
        }
    }

    if query.limit == Some(0) {
        errors.push(ValidationError::InvalidLimit);
    }

    if let Some(tz) = &query.timezone {
        let plausible = !tz.is_empty()
            && tz
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '+' | '-'));
        if !plausible {
            errors.push(ValidationError::InvalidTimezone {
                timezone: tz.clone(),
            });
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedQuery {
        query,
        dimensions,
        metrics,
        calcs,
        universe,
    })
}

fn validate_filter_node(
    node: &FilterNode,
    catalog: &FieldCatalog,
    query: &MetricQuery,
    universe: &HashMap<FieldId, HandleKind>,
    errors: &mut Vec<ValidationError>,
) {
    match node {
        FilterNode::Compare(cmp) => validate_comparison(cmp, catalog, query, universe, errors),
        FilterNode::Group(group) => {
            for child in &group.children {
                validate_filter_node(child, catalog, query, universe, errors);
            }
            if group.op == BoolOp::Or && !or_group_is_homogeneous(node, universe) {
                errors.push(ValidationError::MixedOrGroup);
            }
        }
    }
}

fn or_group_is_homogeneous(node: &FilterNode, universe: &HashMap<FieldId, HandleKind>) -> bool {
    let mut saw_aggregate = false;
    let mut saw_plain = false;
    node.for_each_leaf(&mut |cmp| match universe.get(&cmp.field) {
        Some(kind) if kind.is_aggregate() => saw_aggregate = true,
        Some(_) => saw_plain = true,
        None => {}
    });
    !(saw_aggregate && saw_plain)
}

fn validate_comparison(
    cmp: &FilterComparison,
    catalog: &FieldCatalog,
    query: &MetricQuery,
    universe: &HashMap<FieldId, HandleKind>,
    errors: &mut Vec<ValidationError>,
) {
    let semantic_type = match universe.get(&cmp.field) {
        None => {
            errors.push(ValidationError::UnknownField {
                field: cmp.field.clone(),
                context: "filters".to_string(),
            });
            return;
        }
        Some(HandleKind::TableCalculation) => {
            errors.push(ValidationError::FilterOnTableCalculation {
                field: cmp.field.clone(),
            });
            return;
        }
        Some(HandleKind::AdditionalMetric) | Some(HandleKind::Metric) => SemanticType::Number,
        Some(HandleKind::CustomDimension) => query
            .custom_dimensions
            .iter()
            .find(|c| c.field_id() == cmp.field)
            .map(|c| c.semantic_type())
            .unwrap_or(SemanticType::String),
        Some(HandleKind::Dimension) => catalog
            .resolve(&cmp.field)
            .map(|c| c.field.semantic_type())
            .unwrap_or(SemanticType::String),
    };

    if !cmp.op.supports(semantic_type) {
        errors.push(ValidationError::OperatorTypeMismatch {
            field: cmp.field.clone(),
            op: cmp.op,
            semantic_type,
        });
        return;
    }

    let got = cmp.values.len();
    match cmp.op.expected_values() {
        Some(expected) if got != expected => {
            errors.push(ValidationError::WrongValueCount {
                field: cmp.field.clone(),
                op: cmp.op,
                expected: expected.to_string(),
                got,
            });
            return;
        }
        None if got == 0 => {
            errors.push(ValidationError::WrongValueCount {
                field: cmp.field.clone(),
                op: cmp.op,
                expected: "at least 1".to_string(),
                got,
            });
            return;
        }
        _ => {}
    }

    for value in &cmp.values {
        let compatible = match semantic_type {
            SemanticType::Number => value.is_number(),
            SemanticType::Boolean => value.is_boolean(),
            SemanticType::String | SemanticType::Date | SemanticType::Timestamp => {
                value.is_string()
            }
        };
        if !compatible {
            errors.push(ValidationError::ValueTypeMismatch {
                field: cmp.field.clone(),
                value: value.clone(),
            });
        }
    }
}
