use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::geometry::Vec2;

/// Stable table identifier; nil until minted
pub type TableId = Uuid;

/// Stable column identifier; nil until minted
pub type ColumnId = Uuid;

/// Default data type for freshly added columns
pub const DEFAULT_COLUMN_TYPE: &str = "VARCHAR(255)";

/// Data type of the `id` column every new table starts with
pub const DEFAULT_ID_TYPE: &str = "INTEGER";

pub const NOT_NULL: &str = "NOT NULL";

/// Table column
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(default)]
    pub id: ColumnId,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_column: Option<String>,
    /// Ordered, deduplicated constraint tags such as `NOT NULL`
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            data_type: data_type.into(),
            is_primary_key: false,
            is_foreign_key: false,
            foreign_key_table: None,
            foreign_key_column: None,
            constraints: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: ColumnId) -> Self {
        self.id = id;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.with_constraint(NOT_NULL)
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.foreign_key_table = Some(table.into());
        self.foreign_key_column = Some(column.into());
        self
    }

    pub fn not_null(self) -> Self {
        self.with_constraint(NOT_NULL)
    }

    pub fn unique(self) -> Self {
        self.with_constraint("UNIQUE")
    }

    /// Adds a constraint tag, keeping the list free of duplicates
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.add_constraint(constraint);
        self
    }

    pub fn add_constraint(&mut self, constraint: impl Into<String>) {
        let constraint = constraint.into();
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
    }

    /// Referenced `(table, column)` pair, only when the column is a complete foreign key
    pub fn foreign_key(&self) -> Option<(&str, &str)> {
        if !self.is_foreign_key {
            return None;
        }
        match (&self.foreign_key_table, &self.foreign_key_column) {
            (Some(table), Some(column)) => Some((table.as_str(), column.as_str())),
            _ => None,
        }
    }

    pub fn references_table(&self, table: &str) -> bool {
        self.foreign_key().is_some_and(|(t, _)| t == table)
    }

    pub fn references_column(&self, table: &str, column: &str) -> bool {
        self.foreign_key() == Some((table, column))
    }
}

/// Database table
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub id: TableId,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Centre of the table on the canvas, absent until laid out or placed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            columns: Vec::new(),
            position: None,
        }
    }

    pub fn with_id(mut self, id: TableId) -> Self {
        self.id = id;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Vec2::new(x, y));
        self
    }

    pub fn add_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    pub fn column_position(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn find_column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns.iter().enumerate().find(|(_, c)| c.name == name)
    }

    pub fn has_column_named(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// First primary-key column, used as the target of new connections
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    /// Exactly two columns, each both primary key and foreign key
    pub fn is_junction(&self) -> bool {
        self.columns.len() == 2
            && self
                .columns
                .iter()
                .all(|c| c.is_primary_key && c.foreign_key().is_some())
    }
}

/// The canonical schema: tables in insertion order
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn has_table_named(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    /// True when any table or column still carries a nil identifier
    pub fn has_missing_identities(&self) -> bool {
        self.tables
            .iter()
            .any(|t| t.id.is_nil() || t.columns.iter().any(|c| c.id.is_nil()))
    }

    /// Sample schema with a one-to-many chain and a junction table
    pub fn demo() -> Self {
        Schema::new()
            .with_table(
                Table::new("users")
                    .with_position(200.0, 200.0)
                    .add_column(Column::new("id", DEFAULT_ID_TYPE).primary_key())
                    .add_column(Column::new("username", "VARCHAR(255)").not_null().unique())
                    .add_column(Column::new("email", "VARCHAR(255)").not_null().unique())
                    .add_column(Column::new("created_at", "TIMESTAMP").not_null()),
            )
            .with_table(
                Table::new("posts")
                    .add_column(Column::new("id", DEFAULT_ID_TYPE).primary_key())
                    .add_column(
                        Column::new("user_id", DEFAULT_ID_TYPE)
                            .not_null()
                            .references("users", "id"),
                    )
                    .add_column(Column::new("title", "VARCHAR(255)").not_null())
                    .add_column(Column::new("content", "TEXT")),
            )
            .with_table(
                Table::new("comments")
                    .add_column(Column::new("id", DEFAULT_ID_TYPE).primary_key())
                    .add_column(
                        Column::new("post_id", DEFAULT_ID_TYPE)
                            .not_null()
                            .references("posts", "id"),
                    )
                    .add_column(
                        Column::new("user_id", DEFAULT_ID_TYPE)
                            .not_null()
                            .references("users", "id"),
                    )
                    .add_column(Column::new("content", "TEXT").not_null()),
            )
            .with_table(
                Table::new("tags")
                    .add_column(Column::new("id", DEFAULT_ID_TYPE).primary_key())
                    .add_column(Column::new("label", "VARCHAR(64)").not_null().unique()),
            )
            .with_table(
                Table::new("posts_tags")
                    .add_column(
                        Column::new("posts_id", DEFAULT_ID_TYPE)
                            .primary_key()
                            .references("posts", "id"),
                    )
                    .add_column(
                        Column::new("tags_id", DEFAULT_ID_TYPE)
                            .primary_key()
                            .references("tags", "id"),
                    ),
            )
    }
}
