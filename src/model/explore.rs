//! Explore definitions - the queryable unit of the semantic model.
//!
//! An explore is a root table plus zero or more joined tables. Join conditions
//! are written with `${table.field}` references so they survive renames of the
//! underlying physical columns.

use serde::{Deserialize, Serialize};

use super::field::{Dimension, Metric};

/// How a joined table is attached to the join tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Left,
    Inner,
}

/// A table participating in an explore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreTable {
    /// Semantic name, used to qualify field ids.
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Physical schema, if the warehouse table is schema-qualified.
    #[serde(default)]
    pub sql_schema: Option<String>,
    /// Physical table name.
    pub sql_table: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub required_attributes: Vec<String>,
    /// Free-form tags surfaced through the catalog projection.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A join attaching one table to the explore.
///
/// `sql_on` references fields as `${table.field}`; the catalog resolves those
/// references to compiled field expressions at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreJoin {
    /// The table being joined in.
    pub table: String,
    /// Join condition template, e.g. `${orders.user_id} = ${users.id}`.
    pub sql_on: String,
    #[serde(default)]
    pub kind: JoinKind,
}

/// A root table plus its reachable joined tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explore {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Name of the root table; must appear in `tables`.
    pub base_table: String,
    pub tables: Vec<ExploreTable>,
    #[serde(default)]
    pub joins: Vec<ExploreJoin>,
}

impl Explore {
    pub fn table(&self, name: &str) -> Option<&ExploreTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        let explore = Explore {
            name: "orders".into(),
            label: None,
            base_table: "orders".into(),
            tables: vec![ExploreTable {
                name: "orders".into(),
                label: None,
                sql_schema: Some("analytics".into()),
                sql_table: "fct_orders".into(),
                dimensions: vec![],
                metrics: vec![],
                required_attributes: vec![],
                tags: vec![],
            }],
            joins: vec![],
        };
        assert!(explore.table("orders").is_some());
        assert!(explore.table("users").is_none());
    }
}
