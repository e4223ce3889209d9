//! Filter tree - recursive AND/OR groups over field comparisons.
//!
//! The tree shape is preserved exactly through compilation; only the split
//! between WHERE-eligible and HAVING-eligible leaves is applied automatically.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{FieldId, SemanticType};

/// Boolean connective for a filter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
}

/// Comparison operator for a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    StartsWith,
    EndsWith,
    Include,
    NotInclude,
    IsNull,
    NotNull,
    InBetween,
}

impl FilterOperator {
    /// Whether this operator can apply to a field of the given semantic type.
    pub fn supports(&self, semantic_type: SemanticType) -> bool {
        use FilterOperator::*;
        match self {
            Equals | NotEquals | IsNull | NotNull => true,
            LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual | InBetween => {
                matches!(
                    semantic_type,
                    SemanticType::Number | SemanticType::Date | SemanticType::Timestamp
                )
            }
            StartsWith | EndsWith | Include | NotInclude => {
                semantic_type == SemanticType::String
            }
        }
    }

    /// Number of comparison values this operator expects, if fixed.
    pub fn expected_values(&self) -> Option<usize> {
        match self {
            FilterOperator::IsNull | FilterOperator::NotNull => Some(0),
            FilterOperator::InBetween => Some(2),
            // Equality operators accept one-or-many (rendered as IN lists);
            // the rest take exactly one value.
            FilterOperator::Equals | FilterOperator::NotEquals => None,
            _ => Some(1),
        }
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterComparison {
    pub field: FieldId,
    pub op: FilterOperator,
    #[serde(default)]
    pub values: Vec<Value>,
}

/// A group of filters joined by one boolean connective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub op: BoolOp,
    pub children: Vec<FilterNode>,
}

/// A node in the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Group(FilterGroup),
    Compare(FilterComparison),
}

impl FilterNode {
    /// Shorthand for an AND group.
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Group(FilterGroup {
            op: BoolOp::And,
            children,
        })
    }

    /// Shorthand for an OR group.
    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Group(FilterGroup {
            op: BoolOp::Or,
            children,
        })
    }

    /// Shorthand for an equality leaf.
    pub fn equals(field: FieldId, value: Value) -> Self {
        FilterNode::Compare(FilterComparison {
            field,
            op: FilterOperator::Equals,
            values: vec![value],
        })
    }

    /// Visit every comparison leaf in declaration order.
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a FilterComparison)) {
        match self {
            FilterNode::Compare(cmp) => f(cmp),
            FilterNode::Group(group) => {
                for child in &group.children {
                    child.for_each_leaf(f);
                }
            }
        }
    }

    /// Collect every field id referenced by the tree, in declaration order.
    pub fn referenced_fields(&self) -> Vec<&FieldId> {
        let mut fields = Vec::new();
        self.for_each_leaf(&mut |cmp| fields.push(&cmp.field));
        fields
    }
}
