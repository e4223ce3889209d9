//! Field catalog - immutable per-explore index of fields and join metadata.
//!
//! Built once per explore snapshot. Rebuilt wholesale (never mutated) when the
//! explore definition changes, so an `Arc<FieldCatalog>` can be shared across
//! concurrent compilations; readers always see one consistent snapshot.

pub mod item;

pub use item::{CatalogFieldItem, CatalogItem, CatalogTableItem};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;

use crate::model::{Explore, ExploreTable, Field, FieldId, JoinKind};

/// Pattern for `${...}` templates inside field SQL and join conditions.
static TEMPLATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_.]+)\}").expect("template pattern"));

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors detected while building a catalog. All are model-definition
/// problems, reported at build time so no query ever sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// The explore's base table is missing from its table list.
    UnknownBaseTable { table: String },
    /// Two fields compiled to the same id.
    DuplicateFieldId { id: FieldId },
    /// Two tables share a name.
    DuplicateTable { table: String },
    /// A join names a table the explore does not define.
    JoinOnUnknownTable { table: String },
    /// A table is joined more than once: two resolved paths would exist.
    AmbiguousJoinPath { table: String },
    /// Join conditions form a cycle.
    JoinCycle { tables: Vec<String> },
    /// A joined table is not reachable from the base table.
    UnreachableTable { table: String },
    /// A `${...}` template did not resolve.
    InvalidReference { context: String, reference: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::UnknownBaseTable { table } => {
                write!(f, "Base table '{}' is not defined in the explore", table)
            }
            CatalogError::DuplicateFieldId { id } => {
                write!(f, "Duplicate field id: '{}'", id)
            }
            CatalogError::DuplicateTable { table } => {
                write!(f, "Duplicate table name: '{}'", table)
            }
            CatalogError::JoinOnUnknownTable { table } => {
                write!(f, "Join references unknown table '{}'", table)
            }
            CatalogError::AmbiguousJoinPath { table } => {
                write!(
                    f,
                    "Table '{}' is joined more than once; every table must have exactly one join path",
                    table
                )
            }
            CatalogError::JoinCycle { tables } => {
                write!(f, "Join conditions form a cycle: {}", tables.join(" -> "))
            }
            CatalogError::UnreachableTable { table } => {
                write!(
                    f,
                    "Table '{}' is not reachable from the base table through its join condition",
                    table
                )
            }
            CatalogError::InvalidReference { context, reference } => {
                write!(f, "Unresolved reference '${{{}}}' in {}", reference, context)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// A field with its table-qualified SQL expression resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    pub field: Field,
    /// The field's SQL with `${TABLE}` substituted, e.g. `orders.status`.
    pub compiled_sql: String,
}

/// A join with its condition resolved to compiled field expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledJoin {
    /// The table this join brings in.
    pub table: String,
    pub kind: JoinKind,
    /// Join condition with every `${table.field}` replaced by the referenced
    /// field's compiled SQL.
    pub sql_on: String,
    /// Tables (other than `table`) the condition references; all must be
    /// joined first.
    pub depends_on: Vec<String>,
}

/// Immutable index of one explore's fields and join topology.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    explore: Explore,
    fields: Vec<CompiledField>,
    index: HashMap<FieldId, usize>,
    joins: HashMap<String, CompiledJoin>,
    /// Per joined table: the ordered join chain that brings it in.
    join_paths: HashMap<String, Vec<String>>,
}

impl FieldCatalog {
    /// Build a catalog from an explore definition.
    ///
    /// Rejects duplicate field ids, unknown/duplicate/ambiguous joins, join
    /// cycles, and unresolved `${...}` references.
    pub fn build(explore: Explore) -> CatalogResult<Self> {
        if explore.table(&explore.base_table).is_none() {
            return Err(CatalogError::UnknownBaseTable {
                table: explore.base_table.clone(),
            });
        }

        let mut seen_tables = HashSet::new();
        for table in &explore.tables {
            if !seen_tables.insert(table.name.clone()) {
                return Err(CatalogError::DuplicateTable {
                    table: table.name.clone(),
                });
            }
        }

        let mut fields = Vec::new();
        let mut index = HashMap::new();
        for table in &explore.tables {
            for dim in &table.dimensions {
                let field = Field::Dimension(dim.clone());
                push_field(&mut fields, &mut index, field, &table.name)?;
            }
            for metric in &table.metrics {
                let field = Field::Metric(metric.clone());
                push_field(&mut fields, &mut index, field, &table.name)?;
            }
        }

        let joins = compile_joins(&explore, &fields, &index)?;
        let join_paths = resolve_join_paths(&explore, &joins)?;

        tracing::debug!(
            explore = %explore.name,
            fields = fields.len(),
            joins = joins.len(),
            "catalog built"
        );

        Ok(Self {
            explore,
            fields,
            index,
            joins,
            join_paths,
        })
    }

    pub fn explore_name(&self) -> &str {
        &self.explore.name
    }

    pub fn base_table(&self) -> &str {
        &self.explore.base_table
    }

    pub fn explore(&self) -> &Explore {
        &self.explore
    }

    /// Look up a field by id.
    pub fn resolve(&self, id: &FieldId) -> Option<&CompiledField> {
        self.index.get(id).map(|&i| &self.fields[i])
    }

    /// All fields, in definition order. Deterministic.
    pub fn all_fields(&self) -> impl Iterator<Item = &CompiledField> {
        self.fields.iter()
    }

    /// The ordered join chain required to bring `table` into a query, or
    /// `None` if the table is the base table or unknown.
    ///
    /// Each entry is a join the chain depends on, dependencies first.
    pub fn join_path(&self, table: &str) -> Option<Vec<&CompiledJoin>> {
        if table == self.explore.base_table {
            return Some(vec![]);
        }
        let path = self.join_paths.get(table)?;
        Some(path.iter().map(|t| &self.joins[t]).collect())
    }

    pub fn join(&self, table: &str) -> Option<&CompiledJoin> {
        self.joins.get(table)
    }

    pub fn table(&self, name: &str) -> Option<&ExploreTable> {
        self.explore.table(name)
    }

    /// Tables in definition order.
    pub fn tables(&self) -> impl Iterator<Item = &ExploreTable> {
        self.explore.tables.iter()
    }
}

fn push_field(
    fields: &mut Vec<CompiledField>,
    index: &mut HashMap<FieldId, usize>,
    field: Field,
    table: &str,
) -> CatalogResult<()> {
    let id = field.id();
    if index.contains_key(&id) {
        return Err(CatalogError::DuplicateFieldId { id });
    }
    let compiled_sql = compile_field_sql(field.sql(), table, &id)?;
    index.insert(id, fields.len());
    fields.push(CompiledField {
        field,
        compiled_sql,
    });
    Ok(())
}

/// Substitute `${TABLE}` in a field's SQL template. Any other reference is a
/// definition error: field SQL may not reach into other tables.
fn compile_field_sql(sql: &str, table: &str, id: &FieldId) -> CatalogResult<String> {
    let mut result = String::with_capacity(sql.len());
    let mut last = 0;
    for cap in TEMPLATE_PATTERN.captures_iter(sql) {
        let whole = cap.get(0).expect("capture 0");
        result.push_str(&sql[last..whole.start()]);
        let name = &cap[1];
        if name == "TABLE" {
            result.push_str(table);
        } else {
            return Err(CatalogError::InvalidReference {
                context: format!("field '{}'", id),
                reference: name.to_string(),
            });
        }
        last = whole.end();
    }
    result.push_str(&sql[last..]);
    Ok(result)
}

fn compile_joins(
    explore: &Explore,
    fields: &[CompiledField],
    index: &HashMap<FieldId, usize>,
) -> CatalogResult<HashMap<String, CompiledJoin>> {
    let mut joins = HashMap::new();

    for join in &explore.joins {
        if explore.table(&join.table).is_none() {
            return Err(CatalogError::JoinOnUnknownTable {
                table: join.table.clone(),
            });
        }
        if join.table == explore.base_table || joins.contains_key(&join.table) {
            return Err(CatalogError::AmbiguousJoinPath {
                table: join.table.clone(),
            });
        }

        let mut sql_on = String::with_capacity(join.sql_on.len());
        let mut depends_on = Vec::new();
        let mut references_self = false;
        let mut last = 0;

        for cap in TEMPLATE_PATTERN.captures_iter(&join.sql_on) {
            let whole = cap.get(0).expect("capture 0");
            sql_on.push_str(&join.sql_on[last..whole.start()]);
            let reference = FieldId::from(&cap[1]);
            let compiled = index
                .get(&reference)
                .map(|&i| &fields[i])
                .ok_or_else(|| CatalogError::InvalidReference {
                    context: format!("join on '{}'", join.table),
                    reference: cap[1].to_string(),
                })?;
            let ref_table = compiled.field.table();
            if ref_table == join.table {
                references_self = true;
            } else if !depends_on.iter().any(|t| t == ref_table) {
                depends_on.push(ref_table.to_string());
            }
            sql_on.push_str(&compiled.compiled_sql);
            last = whole.end();
        }
        sql_on.push_str(&join.sql_on[last..]);

        if !references_self || depends_on.is_empty() {
            return Err(CatalogError::UnreachableTable {
                table: join.table.clone(),
            });
        }

        joins.insert(
            join.table.clone(),
            CompiledJoin {
                table: join.table.clone(),
                kind: join.kind,
                sql_on,
                depends_on,
            },
        );
    }

    Ok(joins)
}

/// Check the join dependency graph and precompute each table's unique join
/// chain (dependencies first).
fn resolve_join_paths(
    explore: &Explore,
    joins: &HashMap<String, CompiledJoin>,
) -> CatalogResult<HashMap<String, Vec<String>>> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    nodes.insert(
        explore.base_table.as_str(),
        graph.add_node(explore.base_table.clone()),
    );
    for join in &explore.joins {
        nodes.insert(join.table.as_str(), graph.add_node(join.table.clone()));
    }

    for join in &explore.joins {
        let compiled = &joins[&join.table];
        let target = nodes[join.table.as_str()];
        for dep in &compiled.depends_on {
            let source = nodes
                .get(dep.as_str())
                .copied()
                .ok_or_else(|| CatalogError::JoinOnUnknownTable { table: dep.clone() })?;
            graph.add_edge(source, target, ());
        }
    }

    if is_cyclic_directed(&graph) {
        let tables = explore.joins.iter().map(|j| j.table.clone()).collect();
        return Err(CatalogError::JoinCycle { tables });
    }

    // Walk each join's dependency closure. Acyclic by the check above, so the
    // recursion terminates.
    let mut paths: HashMap<String, Vec<String>> = HashMap::new();
    for join in &explore.joins {
        let mut path = Vec::new();
        build_path(&join.table, explore, joins, &mut path)?;
        paths.insert(join.table.clone(), path);
    }
    Ok(paths)
}

fn build_path(
    table: &str,
    explore: &Explore,
    joins: &HashMap<String, CompiledJoin>,
    out: &mut Vec<String>,
) -> CatalogResult<()> {
    if table == explore.base_table || out.iter().any(|t| t == table) {
        return Ok(());
    }
    let join = joins
        .get(table)
        .ok_or_else(|| CatalogError::UnreachableTable {
            table: table.to_string(),
        })?;
    for dep in &join.depends_on {
        build_path(dep, explore, joins, out)?;
    }
    out.push(table.to_string());
    Ok(())
}
