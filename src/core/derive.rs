//! Relationship deriver: schema → renderable node-link graph
//!
//! Junction tables (see [`Table::is_junction`]) are collapsed into a single
//! many-to-many edge between the two tables they join and never appear as
//! nodes. Every other foreign key becomes a one-to-many edge pointing from
//! the table holding the key to the table it references.

use std::collections::HashMap;

use derive_more::Display;
use petgraph::Directed;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use serde::{Deserialize, Serialize};

use crate::core::geometry::{Rect, Vec2};
use crate::core::schema::{ColumnId, Schema, Table, TableId};

/// Fixed node width
pub const NODE_WIDTH: f64 = 240.0;
/// Table name header
pub const HEADER_HEIGHT: f64 = 40.0;
/// One column row
pub const ROW_HEIGHT: f64 = 28.0;
/// Padding under the last row
pub const FOOTER_HEIGHT: f64 = 12.0;

/// Relationship kind of a derived edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Cardinality {
    #[display("1:N")]
    OneToMany,
    #[display("N:N")]
    ManyToMany,
}

/// Glyph drawn where an edge meets a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndMarker {
    /// Perpendicular bar
    One,
    /// Crow's foot
    Many,
}

/// Graph node: one rendered table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagramNode {
    pub table_id: TableId,
    pub name: String,
    pub width: f64,
    pub height: f64,
    /// Stored (pinned) centre, if any
    pub position: Option<Vec2>,
}

impl DiagramNode {
    fn from_table(table: &Table) -> Self {
        Self {
            table_id: table.id,
            name: table.name.clone(),
            width: NODE_WIDTH,
            height: node_height(table.columns.len()),
            position: table.position,
        }
    }

    pub fn rect_at(&self, center: Vec2) -> Rect {
        Rect::new(center, self.width, self.height)
    }
}

/// Graph edge
///
/// For one-to-many edges the source is the table holding the foreign key
/// (the "many" end) and the target is the referenced table (the "one" end).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub cardinality: Cardinality,
    /// Foreign-key column on the source table (one-to-many only)
    pub column: Option<ColumnId>,
    /// Collapsed junction table (many-to-many only)
    pub junction: Option<TableId>,
}

impl DiagramEdge {
    pub fn source_marker(&self) -> EndMarker {
        EndMarker::Many
    }

    pub fn target_marker(&self) -> EndMarker {
        match self.cardinality {
            Cardinality::OneToMany => EndMarker::One,
            Cardinality::ManyToMany => EndMarker::Many,
        }
    }
}

/// Graph type: nodes are tables, edges are relationships
pub type DiagramGraph = StableGraph<DiagramNode, DiagramEdge, Directed>;

/// Derived diagram plus a lookup from table id to graph node
#[derive(Clone, Debug, Default)]
pub struct Diagram {
    pub graph: DiagramGraph,
    index: HashMap<TableId, NodeIndex>,
}

impl Diagram {
    pub fn node_index(&self, table: TableId) -> Option<NodeIndex> {
        self.index.get(&table).copied()
    }

    pub fn node(&self, table: TableId) -> Option<&DiagramNode> {
        self.node_index(table)
            .and_then(|idx| self.graph.node_weight(idx))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DiagramNode> {
        self.graph.node_weights()
    }

    /// `(source table, target table, edge)` triples
    pub fn edges(&self) -> impl Iterator<Item = (TableId, TableId, &DiagramEdge)> {
        self.graph.edge_indices().filter_map(|e| {
            let (a, b) = self.graph.edge_endpoints(e)?;
            Some((
                self.graph[a].table_id,
                self.graph[b].table_id,
                self.graph.edge_weight(e)?,
            ))
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Header + one row per column + footer
pub fn node_height(column_count: usize) -> f64 {
    HEADER_HEIGHT + column_count as f64 * ROW_HEIGHT + FOOTER_HEIGHT
}

/// Builds the diagram for a schema
pub fn derive(schema: &Schema) -> Diagram {
    let mut diagram = Diagram::default();
    let by_name: HashMap<&str, &Table> =
        schema.tables.iter().map(|t| (t.name.as_str(), t)).collect();
    let is_junction_name = |name: &str| by_name.get(name).is_some_and(|t| t.is_junction());

    for table in schema.tables.iter().filter(|t| !t.is_junction()) {
        let idx = diagram.graph.add_node(DiagramNode::from_table(table));
        diagram.index.insert(table.id, idx);
    }

    let node_for = |diagram: &Diagram, name: &str| {
        by_name
            .get(name)
            .and_then(|t| diagram.node_index(t.id))
    };

    for table in &schema.tables {
        if table.is_junction() {
            let sides: Vec<&str> = table
                .columns
                .iter()
                .filter_map(|c| c.foreign_key().map(|(t, _)| t))
                .collect();
            let (Some(a), Some(b)) = (node_for(&diagram, sides[0]), node_for(&diagram, sides[1]))
            else {
                tracing::debug!("Junction '{}' joins a table with no node", table.name);
                continue;
            };
            diagram.graph.add_edge(
                a,
                b,
                DiagramEdge {
                    cardinality: Cardinality::ManyToMany,
                    column: None,
                    junction: Some(table.id),
                },
            );
            continue;
        }

        let Some(source) = diagram.node_index(table.id) else {
            continue;
        };
        for column in &table.columns {
            let Some((target_name, _)) = column.foreign_key() else {
                continue;
            };
            if is_junction_name(target_name) {
                continue;
            }
            let Some(target) = node_for(&diagram, target_name) else {
                tracing::debug!(
                    "Foreign key {}.{} points at missing table '{}'",
                    table.name,
                    column.name,
                    target_name
                );
                continue;
            };
            diagram.graph.add_edge(
                source,
                target,
                DiagramEdge {
                    cardinality: Cardinality::OneToMany,
                    column: Some(column.id),
                    junction: None,
                },
            );
        }
    }

    diagram
}
