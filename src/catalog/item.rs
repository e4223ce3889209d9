//! Catalog items - the search/display projection of catalog data.
//!
//! Denormalized, one-way: derived from the catalog, never written back.
//! Usage counters come from an external analytics collaborator and default to
//! zero.

use serde::Serialize;

use crate::model::{Field, FieldId, SemanticType};

use super::FieldCatalog;

/// Field kind for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogFieldKind {
    Dimension,
    Metric,
}

/// Basic type string used by search and metadata surfaces.
pub fn basic_type(field: &Field) -> &'static str {
    match field.semantic_type() {
        SemanticType::String => "string",
        SemanticType::Number => "number",
        SemanticType::Boolean => "boolean",
        SemanticType::Date => "date",
        SemanticType::Timestamp => "timestamp",
    }
}

/// Table entry in the catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogTableItem {
    pub name: String,
    pub label: String,
    pub tags: Vec<String>,
    /// Tables joined to this one in the explore.
    pub joined_tables: Vec<String>,
    /// Charts using this table, populated by an external analytics source.
    pub chart_usage: u32,
}

/// Field entry in the catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogFieldItem {
    pub id: FieldId,
    pub name: String,
    pub label: String,
    pub table_name: String,
    pub table_label: String,
    pub kind: CatalogFieldKind,
    pub basic_type: &'static str,
    /// Tags inherited from the owning table.
    pub tags: Vec<String>,
    pub required_attributes: Vec<String>,
    pub chart_usage: u32,
}

/// One entry of the catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CatalogItem {
    Table(CatalogTableItem),
    Field(CatalogFieldItem),
}

impl FieldCatalog {
    /// Project the catalog into its search/display listing: tables first,
    /// then visible fields, both in definition order.
    pub fn catalog_items(&self) -> Vec<CatalogItem> {
        let mut items = Vec::new();

        let joined: Vec<String> = self
            .explore()
            .joins
            .iter()
            .map(|j| j.table.clone())
            .collect();

        for table in self.tables() {
            items.push(CatalogItem::Table(CatalogTableItem {
                name: table.name.clone(),
                label: table
                    .label
                    .clone()
                    .unwrap_or_else(|| table.name.clone()),
                tags: table.tags.clone(),
                joined_tables: if table.name == self.base_table() {
                    joined.clone()
                } else {
                    vec![]
                },
                chart_usage: 0,
            }));
        }

        for compiled in self.all_fields() {
            let field = &compiled.field;
            if field.hidden() {
                continue;
            }
            let table = self.table(field.table());
            items.push(CatalogItem::Field(CatalogFieldItem {
                id: field.id(),
                name: field.name().to_string(),
                label: field.label(),
                table_name: field.table().to_string(),
                table_label: table
                    .and_then(|t| t.label.clone())
                    .unwrap_or_else(|| field.table().to_string()),
                kind: if field.is_metric() {
                    CatalogFieldKind::Metric
                } else {
                    CatalogFieldKind::Dimension
                },
                basic_type: basic_type(field),
                tags: table.map(|t| t.tags.clone()).unwrap_or_default(),
                required_attributes: match field {
                    Field::Dimension(d) => d.required_attributes.clone(),
                    Field::Metric(m) => m.required_attributes.clone(),
                },
                chart_usage: 0,
            }));
        }

        items
    }
}
