//! Schema mutation operations
//!
//! Each operation validates first and only then mutates, so a returned error
//! always leaves the schema untouched. Committing the result to history is
//! the caller's job (see [`crate::core::editor::Editor`]).

use uuid::Uuid;

use crate::core::geometry::Vec2;
use crate::core::schema::{
    Column, ColumnId, DEFAULT_COLUMN_TYPE, DEFAULT_ID_TYPE, Schema, Table, TableId,
};
use crate::core::validation::{ValidationError, validate_name};

pub const NEW_TABLE_NAME: &str = "new_table";
pub const NEW_COLUMN_NAME: &str = "new_column";

/// Validation failures for schema operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Table not found")]
    TableNotFound(TableId),
    #[error("Column not found in table '{table}'")]
    ColumnNotFound { table: String, column: ColumnId },
    #[error("A table named '{0}' already exists")]
    DuplicateTableName(String),
    #[error("Column '{name}' already exists in table '{table}'")]
    DuplicateColumnName { table: String, name: String },
    #[error("Invalid name: {0}")]
    InvalidName(#[from] ValidationError),
    #[error("Column '{table}.{column}' is referenced by '{by_table}.{by_column}'")]
    ColumnReferenced {
        table: String,
        column: String,
        by_table: String,
        by_column: String,
    },
    #[error("Table '{0}' has no primary key")]
    MissingPrimaryKey(String),
    #[error("Foreign key target '{table}.{column}' does not exist")]
    DanglingReference { table: String, column: String },
    #[error("Deleting table '{0}' requires confirmation")]
    DeleteNotConfirmed(String),
    #[error("Column index {index} is out of range for table '{table}'")]
    ColumnIndexOutOfRange { table: String, index: usize },
}

/// Requested state of a column in the property editor
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnEdit {
    pub name: String,
    pub data_type: String,
    pub is_primary_key: bool,
    /// `Some((table, column))` makes the column a foreign key
    pub foreign_key: Option<(String, String)>,
    pub constraints: Vec<String>,
}

impl ColumnEdit {
    /// Pre-filled with the column's current state
    pub fn from_column(column: &Column) -> Self {
        Self {
            name: column.name.clone(),
            data_type: column.data_type.clone(),
            is_primary_key: column.is_primary_key,
            foreign_key: column
                .foreign_key()
                .map(|(t, c)| (t.to_string(), c.to_string())),
            constraints: column.constraints.clone(),
        }
    }
}

/// `base`, `base_2`, `base_3`, ... first one not taken
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| format!("{}_{}", base, Uuid::new_v4().simple()))
}

impl Schema {
    fn table_or_err(&self, id: TableId) -> Result<&Table, SchemaError> {
        self.table(id).ok_or(SchemaError::TableNotFound(id))
    }

    fn column_or_err(&self, table: TableId, column: ColumnId) -> Result<&Column, SchemaError> {
        let owner = self.table_or_err(table)?;
        owner.column(column).ok_or_else(|| SchemaError::ColumnNotFound {
            table: owner.name.clone(),
            column,
        })
    }

    // ========================================================================
    // Table operations
    // ========================================================================

    /// Adds `new_table` (or the first free `new_table_N`) with an `id` primary key
    pub fn add_table(&mut self, position: Vec2) -> TableId {
        let name = unique_name(NEW_TABLE_NAME, |n| self.has_table_named(n));
        let id = Uuid::new_v4();
        self.tables.push(Table {
            id,
            name,
            columns: vec![
                Column::new("id", DEFAULT_ID_TYPE)
                    .with_id(Uuid::new_v4())
                    .primary_key(),
            ],
            position: Some(position),
        });
        id
    }

    /// Removes a table and every foreign-key column elsewhere that referenced it
    pub fn delete_table(&mut self, id: TableId, confirmed: bool) -> Result<Table, SchemaError> {
        let index = self
            .tables
            .iter()
            .position(|t| t.id == id)
            .ok_or(SchemaError::TableNotFound(id))?;
        if !confirmed {
            return Err(SchemaError::DeleteNotConfirmed(self.tables[index].name.clone()));
        }

        let removed = self.tables.remove(index);
        for table in &mut self.tables {
            table.columns.retain(|c| !c.references_table(&removed.name));
        }
        Ok(removed)
    }

    /// Renames a table and rewrites every foreign key that referenced the old name
    pub fn rename_table(&mut self, id: TableId, new_name: &str) -> Result<(), SchemaError> {
        let new_name = new_name.trim();
        let old_name = self.table_or_err(id)?.name.clone();
        if old_name == new_name {
            return Ok(());
        }
        validate_name(new_name)?;
        if self.tables.iter().any(|t| t.id != id && t.name == new_name) {
            return Err(SchemaError::DuplicateTableName(new_name.to_string()));
        }

        for table in &mut self.tables {
            if table.id == id {
                table.name = new_name.to_string();
            }
            for column in &mut table.columns {
                if column.references_table(&old_name) {
                    column.foreign_key_table = Some(new_name.to_string());
                }
            }
        }
        Ok(())
    }

    /// Position writes are layout state and never go through history
    pub fn set_table_position(&mut self, id: TableId, position: Vec2) -> Result<(), SchemaError> {
        let table = self.table_mut(id).ok_or(SchemaError::TableNotFound(id))?;
        table.position = Some(position);
        Ok(())
    }

    // ========================================================================
    // Column operations
    // ========================================================================

    /// Appends `new_column` (or `new_column_N`) with the default type
    pub fn add_column(&mut self, table: TableId) -> Result<ColumnId, SchemaError> {
        let owner = self.table_mut(table).ok_or(SchemaError::TableNotFound(table))?;
        let name = unique_name(NEW_COLUMN_NAME, |n| owner.has_column_named(n));
        let id = Uuid::new_v4();
        owner
            .columns
            .push(Column::new(name, DEFAULT_COLUMN_TYPE).with_id(id));
        Ok(id)
    }

    /// Refused while any foreign key still points at this column
    pub fn delete_column(&mut self, table: TableId, column: ColumnId) -> Result<Column, SchemaError> {
        let owner = self.table_or_err(table)?;
        let target = self.column_or_err(table, column)?;
        let blocker = self.tables.iter().find_map(|t| {
            t.columns
                .iter()
                .find(|c| {
                    !(t.id == table && c.id == column)
                        && c.references_column(&owner.name, &target.name)
                })
                .map(|c| (t, c))
        });
        if let Some((by_table, by_column)) = blocker {
            return Err(SchemaError::ColumnReferenced {
                table: owner.name.clone(),
                column: target.name.clone(),
                by_table: by_table.name.clone(),
                by_column: by_column.name.clone(),
            });
        }

        let owner = self.table_mut(table).ok_or(SchemaError::TableNotFound(table))?;
        let index = owner
            .column_position(column)
            .ok_or_else(|| SchemaError::ColumnNotFound {
                table: owner.name.clone(),
                column,
            })?;
        Ok(owner.columns.remove(index))
    }

    /// Applies a property-editor change to one column
    ///
    /// Renaming a column rewrites every foreign key that pointed at it.
    pub fn edit_column(
        &mut self,
        table: TableId,
        column: ColumnId,
        edit: ColumnEdit,
    ) -> Result<(), SchemaError> {
        let owner = self.table_or_err(table)?;
        let current = self.column_or_err(table, column)?;
        let table_name = owner.name.clone();
        let old_name = current.name.clone();
        let new_name = edit.name.trim().to_string();

        if new_name != old_name {
            validate_name(&new_name)?;
            if owner
                .columns
                .iter()
                .any(|c| c.id != column && c.name == new_name)
            {
                return Err(SchemaError::DuplicateColumnName {
                    table: table_name,
                    name: new_name,
                });
            }
        }

        if let Some((ref_table, ref_column)) = &edit.foreign_key {
            let unchanged = current.foreign_key() == Some((ref_table.as_str(), ref_column.as_str()));
            let resolves = self
                .table_by_name(ref_table)
                .is_some_and(|t| t.has_column_named(ref_column));
            if !unchanged && !resolves {
                return Err(SchemaError::DanglingReference {
                    table: ref_table.clone(),
                    column: ref_column.clone(),
                });
            }
        }

        let renamed = new_name != old_name;
        for t in &mut self.tables {
            let is_owner = t.id == table;
            for c in &mut t.columns {
                if is_owner && c.id == column {
                    c.name = new_name.clone();
                    c.data_type = edit.data_type.clone();
                    c.is_primary_key = edit.is_primary_key;
                    c.is_foreign_key = edit.foreign_key.is_some();
                    c.foreign_key_table = edit.foreign_key.as_ref().map(|(ft, _)| ft.clone());
                    c.foreign_key_column = edit.foreign_key.as_ref().map(|(_, fc)| fc.clone());
                    c.constraints.clear();
                    for constraint in &edit.constraints {
                        c.add_constraint(constraint.clone());
                    }
                } else if renamed && c.references_column(&table_name, &old_name) {
                    c.foreign_key_column = Some(new_name.clone());
                }
            }
        }
        Ok(())
    }

    /// Moves a column to another slot within its table
    pub fn move_column(&mut self, table: TableId, from: usize, to: usize) -> Result<(), SchemaError> {
        let owner = self.table_mut(table).ok_or(SchemaError::TableNotFound(table))?;
        let len = owner.columns.len();
        if let Some(index) = [from, to].into_iter().find(|&i| i >= len) {
            return Err(SchemaError::ColumnIndexOutOfRange {
                table: owner.name.clone(),
                index,
            });
        }
        let column = owner.columns.remove(from);
        owner.columns.insert(to, column);
        Ok(())
    }

    // ========================================================================
    // Connection operations
    // ========================================================================

    /// Adds a foreign-key column on `source` pointing at `target`'s primary key
    pub fn connect_one_to_many(
        &mut self,
        source: TableId,
        target: TableId,
    ) -> Result<ColumnId, SchemaError> {
        let target_table = self.table_or_err(target)?;
        let target_pk = target_table
            .primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(target_table.name.clone()))?;
        let target_name = target_table.name.clone();
        let pk_name = target_pk.name.clone();
        let pk_type = target_pk.data_type.clone();

        let owner = self.table_mut(source).ok_or(SchemaError::TableNotFound(source))?;
        let name = unique_name(&format!("{}_{}", target_name, pk_name), |n| {
            owner.has_column_named(n)
        });
        let id = Uuid::new_v4();
        owner.columns.push(
            Column::new(name, pk_type)
                .with_id(id)
                .references(target_name, pk_name),
        );
        Ok(id)
    }

    /// Creates a junction table joining the primary keys of both tables
    pub fn connect_many_to_many(
        &mut self,
        source: TableId,
        target: TableId,
    ) -> Result<TableId, SchemaError> {
        let left = self.table_or_err(source)?;
        let right = self.table_or_err(target)?;
        let left_pk = left
            .primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(left.name.clone()))?;
        let right_pk = right
            .primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(right.name.clone()))?;

        let name = unique_name(&format!("{}_{}", left.name, right.name), |n| {
            self.has_table_named(n)
        });
        let left_column = format!("{}_{}", left.name, left_pk.name);
        let right_column = unique_name(&format!("{}_{}", right.name, right_pk.name), |n| {
            n == left_column
        });

        let position = match (left.position, right.position) {
            (Some(a), Some(b)) => Some(a.midpoint(b)),
            (a, b) => a.or(b),
        };

        let junction = Table {
            id: Uuid::new_v4(),
            name,
            columns: vec![
                Column::new(left_column, left_pk.data_type.clone())
                    .with_id(Uuid::new_v4())
                    .primary_key()
                    .references(left.name.clone(), left_pk.name.clone()),
                Column::new(right_column, right_pk.data_type.clone())
                    .with_id(Uuid::new_v4())
                    .primary_key()
                    .references(right.name.clone(), right_pk.name.clone()),
            ],
            position,
        };
        let id = junction.id;
        self.tables.push(junction);
        Ok(id)
    }
}
