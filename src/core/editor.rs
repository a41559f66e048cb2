//! Top-level editor controller
//!
//! The [`Editor`] is the single owner of application state: the workspace
//! of projects, the derived diagram, the layout simulation, the camera and
//! the tool-mode state. Rendering code reads snapshots and projections;
//! every change goes through one of its methods.
//!
//! Schema mutations are committed through the active project's history.
//! Position-only writes (drag end, auto layout, settled layout capture)
//! bypass it. While an assistant request is in flight the editor is
//! `loading` and rejects mutations and tool switches with
//! [`EditorError::Busy`].

use crate::core::assistant::{AssistantError, DdlTarget, SchemaAssistant};
use crate::core::auto_layout::{LayoutEvent, LayoutSnapshot, Simulation, auto_layout};
use crate::core::config::Config;
use crate::core::derive::{Cardinality, Diagram, derive};
use crate::core::edge_geometry::{EdgeGeometry, GlyphStyle, edge_geometry};
use crate::core::geometry::Vec2;
use crate::core::history::History;
use crate::core::identity::{assign_identities, reconcile};
use crate::core::interaction::{
    ConnectionKind, Effect, InputEvent, InteractionState, Tool, transition,
};
use crate::core::operations::{ColumnEdit, SchemaError};
use crate::core::project::{Project, ProjectId, ProjectNotFound, Sender, Workspace};
use crate::core::schema::{ColumnId, Schema, TableId};
use crate::core::share::{self, ShareError};
use crate::core::storage::{KeyValueStore, Storage, StorageError};
use crate::core::viewport::{self, Camera, MinimapConfig, MinimapFrame};

/// Editor errors
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error(transparent)]
    Share(#[from] ShareError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    ProjectNotFound(#[from] ProjectNotFound),

    #[error("Another request is still in progress")]
    Busy,
}

/// An edge ready to draw
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedEdge {
    pub source: TableId,
    pub target: TableId,
    pub cardinality: Cardinality,
    pub geometry: EdgeGeometry,
}

pub struct Editor<S: KeyValueStore> {
    config: Config,
    storage: Storage<S>,
    workspace: Workspace,
    diagram: Diagram,
    simulation: Simulation,
    interaction: InteractionState,
    camera: Camera,
    minimap: MinimapConfig,
    glyphs: GlyphStyle,
    error: Option<String>,
    loading: bool,
}

impl<S: KeyValueStore> Editor<S> {
    /// Loads the workspace from `store` (falling back to a fresh default project)
    pub fn new(config: Config, store: S) -> Self {
        let storage = Storage::new(store);
        let mut workspace = storage.load_workspace();
        for project in workspace.projects_mut() {
            project.history.set_limit(config.history_limit);
        }

        let simulation = Simulation::new(config.layout.clone(), config.viewport_center());
        let mut editor = Self {
            config,
            storage,
            workspace,
            diagram: Diagram::default(),
            simulation,
            interaction: InteractionState::default(),
            camera: Camera::default(),
            minimap: MinimapConfig::default(),
            glyphs: GlyphStyle::default(),
            error: None,
            loading: false,
        };
        editor.refresh();
        editor
    }

    // ========================================================================
    // Read-only state
    // ========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn project(&self) -> &Project {
        self.workspace.active()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.workspace.active().schema.as_ref()
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn history(&self) -> &History {
        &self.workspace.active().history
    }

    pub fn can_undo(&self) -> bool {
        self.history().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history().can_redo()
    }

    // ========================================================================
    // Internal plumbing
    // ========================================================================

    fn ensure_idle(&self) -> Result<(), EditorError> {
        if self.loading {
            tracing::warn!("Rejected input while a request is in progress");
            return Err(EditorError::Busy);
        }
        Ok(())
    }

    /// Puts an error into the single error slot, replacing the previous one
    fn report(&mut self, error: EditorError) -> EditorError {
        tracing::warn!("{}", error);
        self.error = Some(error.to_string());
        error
    }

    /// Re-derives the diagram and hands it to the simulation
    fn refresh(&mut self) {
        let empty = Schema::new();
        let schema = self.workspace.active().schema.as_ref().unwrap_or(&empty);
        self.diagram = derive(schema);
        self.simulation.sync(&self.diagram);
    }

    fn save(&self) {
        if let Err(e) = self.storage.save_workspace(&self.workspace) {
            tracing::warn!("Failed to save workspace: {}", e);
        }
    }

    /// Replaces the active schema, recording the old one for undo
    fn commit(&mut self, next: Option<Schema>) {
        let project = self.workspace.active_mut();
        let previous = std::mem::replace(&mut project.schema, next);
        project.history.commit(previous);
        project.touch();
        tracing::debug!(
            "Committed schema change ({} undo step(s))",
            project.history.undo_len()
        );
        self.refresh();
        self.save();
    }

    /// Runs an operation on a copy of the schema and commits it on success
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut Schema) -> Result<T, SchemaError>,
    ) -> Result<T, EditorError> {
        self.ensure_idle()?;
        let mut schema = self.schema().cloned().unwrap_or_default();
        match op(&mut schema) {
            Ok(value) => {
                if self.schema() != Some(&schema) {
                    self.commit(Some(schema));
                }
                Ok(value)
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    /// Writes table centres into the schema without a history entry
    fn write_positions(&mut self, positions: impl IntoIterator<Item = (TableId, Vec2)>) {
        let project = self.workspace.active_mut();
        let Some(schema) = project.schema.as_mut() else {
            return;
        };
        let written = positions
            .into_iter()
            .filter(|&(id, position)| schema.set_table_position(id, position).is_ok())
            .count();
        if written == 0 {
            return;
        }
        project.touch();
        self.refresh();
        self.save();
    }

    // ========================================================================
    // Schema operations
    // ========================================================================

    pub fn add_table(&mut self, at: Vec2) -> Result<TableId, EditorError> {
        self.mutate(|schema| Ok(schema.add_table(at)))
    }

    pub fn delete_table(&mut self, table: TableId, confirmed: bool) -> Result<(), EditorError> {
        self.mutate(|schema| schema.delete_table(table, confirmed).map(|_| ()))
    }

    pub fn rename_table(&mut self, table: TableId, name: &str) -> Result<(), EditorError> {
        self.mutate(|schema| schema.rename_table(table, name))
    }

    pub fn add_column(&mut self, table: TableId) -> Result<ColumnId, EditorError> {
        self.mutate(|schema| schema.add_column(table))
    }

    pub fn delete_column(&mut self, table: TableId, column: ColumnId) -> Result<(), EditorError> {
        self.mutate(|schema| schema.delete_column(table, column).map(|_| ()))
    }

    pub fn edit_column(
        &mut self,
        table: TableId,
        column: ColumnId,
        edit: ColumnEdit,
    ) -> Result<(), EditorError> {
        self.mutate(|schema| schema.edit_column(table, column, edit))
    }

    pub fn move_column(&mut self, table: TableId, from: usize, to: usize) -> Result<(), EditorError> {
        self.mutate(|schema| schema.move_column(table, from, to))
    }

    pub fn connect_one_to_many(
        &mut self,
        source: TableId,
        target: TableId,
    ) -> Result<ColumnId, EditorError> {
        self.mutate(|schema| schema.connect_one_to_many(source, target))
    }

    pub fn connect_many_to_many(
        &mut self,
        source: TableId,
        target: TableId,
    ) -> Result<TableId, EditorError> {
        self.mutate(|schema| schema.connect_many_to_many(source, target))
    }

    /// Restores the previous snapshot; `false` when there is nothing to undo
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        self.ensure_idle()?;
        let project = self.workspace.active_mut();
        if !project.history.can_undo() {
            return Ok(false);
        }
        let current = project.schema.take();
        project.schema = project.history.undo(current).flatten();
        project.touch();
        self.refresh();
        self.save();
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        self.ensure_idle()?;
        let project = self.workspace.active_mut();
        if !project.history.can_redo() {
            return Ok(false);
        }
        let current = project.schema.take();
        project.schema = project.history.redo(current).flatten();
        project.touch();
        self.refresh();
        self.save();
        Ok(true)
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn set_tool(&mut self, tool: Tool) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.interaction = transition(&self.interaction, &InputEvent::SelectTool(tool)).0;
        Ok(())
    }

    /// Feeds one input event through the interaction state machine
    ///
    /// Returns the effects that need UI handling (inline rename, column
    /// editor). Failed operations land in the error slot.
    pub fn handle_input(&mut self, event: InputEvent) -> Vec<Effect> {
        if let InputEvent::SelectTool(tool) = event {
            // Busy is already logged
            let _ = self.set_tool(tool);
            return Vec::new();
        }

        let (mut next, effects) = transition(&self.interaction, &event);
        if self.loading && next.tool != self.interaction.tool {
            tracing::warn!("Ignoring switch to {} while a request is in progress", next.tool);
            next.tool = self.interaction.tool;
        }
        self.interaction = next;

        let mut ui = Vec::new();
        for effect in effects {
            if self.loading && effect.mutates_schema() {
                tracing::warn!("Ignoring {:?} while a request is in progress", effect);
                continue;
            }
            let outcome = match effect {
                Effect::AddTable { at } => self.add_table(at).map(|_| ()),
                Effect::Connect {
                    kind: ConnectionKind::OneToMany,
                    source,
                    target,
                } => self.connect_one_to_many(source, target).map(|_| ()),
                Effect::Connect {
                    kind: ConnectionKind::ManyToMany,
                    source,
                    target,
                } => self.connect_many_to_many(source, target).map(|_| ()),
                Effect::DragStart { table } => {
                    self.simulation.drag_start(table);
                    Ok(())
                }
                Effect::DragMove { table, to } => {
                    self.simulation.drag_move(table, to);
                    Ok(())
                }
                Effect::DragEnd { table, at } => {
                    if let Some(position) = self.simulation.drag_end(table, at) {
                        self.write_positions([(table, position)]);
                    }
                    Ok(())
                }
                Effect::PanBy(delta) => {
                    self.camera.pan_by(delta);
                    Ok(())
                }
                Effect::ZoomAt { anchor, factor } => {
                    self.camera.zoom_at(anchor, factor);
                    Ok(())
                }
                Effect::Undo => self.undo().map(|_| ()),
                Effect::Redo => self.redo().map(|_| ()),
                Effect::BeginRename { .. } | Effect::EditColumn { .. } => {
                    ui.push(effect);
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                tracing::debug!("Effect {:?} failed: {}", effect, e);
            }
        }
        ui
    }

    // ========================================================================
    // Layout and rendering
    // ========================================================================

    /// One simulation step; call once per frame
    ///
    /// When the layout settles, unpositioned tables get their settled centre.
    pub fn tick(&mut self) -> LayoutEvent {
        let event = self.simulation.step();
        if event == LayoutEvent::Settled {
            self.pin_settled_layout();
        }
        event
    }

    /// Stores the simulated centre of every table that has no position yet
    pub fn pin_settled_layout(&mut self) -> usize {
        let Some(schema) = self.schema() else {
            return 0;
        };
        let positions: Vec<(TableId, Vec2)> = schema
            .tables
            .iter()
            .filter(|t| t.position.is_none())
            .filter_map(|t| Some((t.id, self.simulation.position(t.id)?)))
            .collect();
        let count = positions.len();
        if count > 0 {
            tracing::debug!("Pinned {} settled table position(s)", count);
            self.write_positions(positions);
        }
        count
    }

    /// Re-lays out every table from scratch
    pub fn auto_layout(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let center = self.config.viewport_center();
        let project = self.workspace.active_mut();
        let Some(schema) = project.schema.as_mut() else {
            return Ok(());
        };
        auto_layout(schema, &self.config.layout, center);
        project.touch();
        tracing::info!("Auto layout applied");
        self.refresh();
        self.save();
        Ok(())
    }

    pub fn resize_viewport(&mut self, size: Vec2) {
        self.config.viewport_width = size.x;
        self.config.viewport_height = size.y;
        self.simulation.set_center(self.config.viewport_center());
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        self.simulation.snapshot()
    }

    pub fn is_settled(&self) -> bool {
        self.simulation.is_settled()
    }

    pub fn edges(&self) -> Vec<RenderedEdge> {
        let snapshot = self.simulation.snapshot();
        self.diagram
            .edges()
            .filter_map(|(source, target, edge)| {
                let a = snapshot.node(source)?.rect;
                let b = snapshot.node(target)?.rect;
                Some(RenderedEdge {
                    source,
                    target,
                    cardinality: edge.cardinality,
                    geometry: edge_geometry(&a, &b, edge, &self.glyphs)?,
                })
            })
            .collect()
    }

    pub fn minimap(&self) -> MinimapFrame {
        viewport::project(
            &self.simulation.snapshot(),
            &self.camera,
            self.config.viewport_size(),
            &self.minimap,
        )
    }

    /// Minimap drag: centres the camera on the world point under `point`
    pub fn minimap_pan(&mut self, point: Vec2) {
        let frame = self.minimap();
        frame.pan_camera(&mut self.camera, point, self.config.viewport_size());
    }

    // ========================================================================
    // Projects
    // ========================================================================

    /// Fresh view state for a newly activated project
    fn activate(&mut self) {
        self.interaction = InteractionState::default();
        self.camera = Camera::default();
        self.simulation = Simulation::new(self.config.layout.clone(), self.config.viewport_center());
        self.refresh();
        self.save();
    }

    fn apply_history_limit(&mut self) {
        let limit = self.config.history_limit;
        for project in self.workspace.projects_mut() {
            project.history.set_limit(limit);
        }
    }

    pub fn create_project(&mut self, name: &str) -> Result<ProjectId, EditorError> {
        self.ensure_idle()?;
        let id = self.workspace.create(name);
        self.apply_history_limit();
        self.activate();
        Ok(id)
    }

    pub fn rename_project(&mut self, id: ProjectId, name: &str) -> Result<(), EditorError> {
        match self.workspace.rename(id, name) {
            Ok(()) => {
                self.save();
                Ok(())
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    pub fn switch_project(&mut self, id: ProjectId) -> Result<(), EditorError> {
        self.ensure_idle()?;
        if id == self.workspace.active_id() {
            return Ok(());
        }
        match self.workspace.switch(id) {
            Ok(()) => {
                self.activate();
                Ok(())
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    pub fn delete_project(&mut self, id: ProjectId) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let was_active = id == self.workspace.active_id();
        if let Err(e) = self.workspace.delete(id) {
            return Err(self.report(e.into()));
        }
        self.apply_history_limit();
        if was_active {
            self.activate();
        } else {
            self.save();
        }
        Ok(())
    }

    // ========================================================================
    // Share codes
    // ========================================================================

    pub fn share_code(&mut self) -> Result<String, EditorError> {
        let schema = self.schema().cloned().unwrap_or_default();
        share::encode(&schema).map_err(|e| self.report(e.into()))
    }

    /// Replaces the schema with a decoded share code (undoable)
    pub fn load_share_code(&mut self, code: &str) -> Result<(), EditorError> {
        self.ensure_idle()?;
        match share::decode(code) {
            Ok(schema) => {
                self.commit(Some(schema));
                Ok(())
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    // ========================================================================
    // Assistant requests
    // ========================================================================

    /// Enters the loading state
    pub fn begin_request(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.loading = true;
        self.error = None;
        Ok(())
    }

    /// Completes a prompt request: reconcile against the current schema, then commit
    pub fn finish_prompt(&mut self, result: Result<Schema, AssistantError>) -> Result<(), EditorError> {
        self.loading = false;
        match result {
            Ok(schema) => {
                let current = self.schema().cloned().unwrap_or_default();
                let merged = reconcile(schema, &current);
                let summary = format!("Schema updated: {} table(s)", merged.tables.len());
                tracing::info!("{}", summary);
                self.workspace
                    .active_mut()
                    .push_message(Sender::Assistant, summary);
                self.commit(Some(merged));
                Ok(())
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    /// Completes an import; a failure commits an empty schema
    pub fn finish_import(&mut self, result: Result<Schema, AssistantError>) -> Result<(), EditorError> {
        self.loading = false;
        match result {
            Ok(schema) => {
                let schema = assign_identities(schema);
                tracing::info!("Imported {} table(s)", schema.tables.len());
                self.commit(Some(schema));
                Ok(())
            }
            Err(e) => {
                let error = self.report(e.into());
                self.commit(Some(Schema::new()));
                Err(error)
            }
        }
    }

    pub fn finish_ddl(&mut self, result: Result<String, AssistantError>) -> Result<String, EditorError> {
        self.loading = false;
        match result {
            Ok(ddl) => {
                let project = self.workspace.active_mut();
                project.last_ddl = ddl.clone();
                project.touch();
                self.save();
                Ok(ddl)
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    /// Sends a chat prompt: creates a schema from scratch or modifies the current one
    pub async fn submit_prompt<A: SchemaAssistant>(
        &mut self,
        assistant: &A,
        prompt: &str,
    ) -> Result<(), EditorError> {
        self.begin_request()?;
        self.workspace
            .active_mut()
            .push_message(Sender::User, prompt);

        let current = self.schema().filter(|s| !s.is_empty()).cloned();
        let result = match &current {
            Some(schema) => assistant.modify(prompt, schema).await,
            None => assistant.create_from_prompt(prompt).await,
        };
        self.finish_prompt(result)
    }

    pub async fn import_ddl<A: SchemaAssistant>(
        &mut self,
        assistant: &A,
        ddl: &str,
    ) -> Result<(), EditorError> {
        self.begin_request()?;
        let project = self.workspace.active_mut();
        project.last_ddl = ddl.to_string();
        project.touch();

        let result = assistant.parse(ddl).await;
        self.finish_import(result)
    }

    pub async fn generate_ddl<A: SchemaAssistant>(
        &mut self,
        assistant: &A,
        target: &DdlTarget,
    ) -> Result<String, EditorError> {
        self.begin_request()?;
        let schema = self.schema().cloned().unwrap_or_default();
        let result = assistant.generate_ddl(&schema, target).await;
        self.finish_ddl(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interaction::{Key, PointerTarget};
    use crate::core::schema::{Column, Table};
    use crate::core::storage::{FileStore, MemoryStore};
    use futures::executor::block_on;
    use tempfile::TempDir;

    struct FakeAssistant {
        schema: Result<Schema, AssistantError>,
        ddl: Result<String, AssistantError>,
    }

    impl FakeAssistant {
        fn returning(schema: Schema) -> Self {
            Self {
                schema: Ok(schema),
                ddl: Ok("CREATE TABLE users (id INTEGER PRIMARY KEY);".to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                schema: Err(AssistantError::Network("connection reset".to_string())),
                ddl: Err(AssistantError::MalformedResponse("empty".to_string())),
            }
        }
    }

    impl SchemaAssistant for FakeAssistant {
        async fn parse(&self, _ddl: &str) -> Result<Schema, AssistantError> {
            self.schema.clone()
        }

        async fn create_from_prompt(&self, _prompt: &str) -> Result<Schema, AssistantError> {
            self.schema.clone()
        }

        async fn modify(&self, _prompt: &str, _current: &Schema) -> Result<Schema, AssistantError> {
            self.schema.clone()
        }

        async fn generate_ddl(
            &self,
            _schema: &Schema,
            _target: &DdlTarget,
        ) -> Result<String, AssistantError> {
            self.ddl.clone()
        }
    }

    fn editor() -> Editor<MemoryStore> {
        Editor::new(Config::default(), MemoryStore::new())
    }

    fn table_id(editor: &Editor<MemoryStore>, name: &str) -> TableId {
        editor.schema().unwrap().table_by_name(name).unwrap().id
    }

    fn settle(editor: &mut Editor<MemoryStore>) {
        for _ in 0..editor.config().layout.max_steps {
            if editor.tick() == LayoutEvent::Idle {
                break;
            }
        }
    }

    #[test]
    fn test_new_editor_starts_empty() {
        let editor = editor();
        assert!(editor.schema().is_none());
        assert!(!editor.can_undo());
        assert!(editor.error().is_none());
        assert_eq!(editor.diagram().node_count(), 0);
    }

    #[test]
    fn test_mutation_commits_and_undoes() {
        let mut editor = editor();
        let id = editor.add_table(Vec2::new(10.0, 20.0)).unwrap();
        assert_eq!(editor.schema().unwrap().tables.len(), 1);
        assert_eq!(editor.diagram().node_count(), 1);
        assert!(editor.can_undo());

        editor.rename_table(id, "users").unwrap();
        assert!(editor.undo().unwrap());
        assert_eq!(editor.schema().unwrap().tables[0].name, "new_table");
        assert!(editor.undo().unwrap());
        assert!(editor.schema().is_none());
        assert!(!editor.undo().unwrap());

        assert!(editor.redo().unwrap());
        assert!(editor.redo().unwrap());
        assert_eq!(editor.schema().unwrap().tables[0].name, "users");
        assert!(!editor.redo().unwrap());
    }

    #[test]
    fn test_validation_error_fills_slot_without_history() {
        let mut editor = editor();
        let a = editor.add_table(Vec2::ZERO).unwrap();
        editor.add_table(Vec2::new(400.0, 0.0)).unwrap();
        let undo_steps = editor.history().undo_len();
        let before = editor.schema().cloned();

        let result = editor.rename_table(a, "new_table_2");
        assert!(matches!(
            result,
            Err(EditorError::Schema(SchemaError::DuplicateTableName(_)))
        ));
        assert_eq!(editor.schema().cloned(), before);
        assert_eq!(editor.history().undo_len(), undo_steps);
        assert!(editor.error().unwrap().contains("new_table_2"));

        // A new error replaces the old one
        let _ = editor.delete_table(a, false);
        assert!(editor.error().unwrap().contains("confirmation"));
        editor.clear_error();
        assert!(editor.error().is_none());
    }

    #[test]
    fn test_noop_rename_is_not_recorded() {
        let mut editor = editor();
        let id = editor.add_table(Vec2::ZERO).unwrap();
        editor.rename_table(id, "new_table").unwrap();
        assert_eq!(editor.history().undo_len(), 1);
    }

    #[test]
    fn test_loading_gates_mutations_and_tools() {
        let mut editor = editor();
        editor.begin_request().unwrap();
        assert!(editor.is_loading());
        assert!(matches!(editor.add_table(Vec2::ZERO), Err(EditorError::Busy)));
        assert!(matches!(editor.set_tool(Tool::AddTable), Err(EditorError::Busy)));
        assert!(matches!(editor.begin_request(), Err(EditorError::Busy)));
        assert!(matches!(editor.undo(), Err(EditorError::Busy)));

        // Pan is view state and still allowed
        editor.handle_input(InputEvent::PointerDown {
            target: PointerTarget::Canvas,
            screen: Vec2::ZERO,
            world: Vec2::ZERO,
        });
        editor.handle_input(InputEvent::PointerMove {
            screen: Vec2::new(5.0, 5.0),
            world: Vec2::new(5.0, 5.0),
        });
        assert_eq!(editor.camera().pan, Vec2::new(5.0, 5.0));
        assert_eq!(editor.interaction().tool, Tool::Select);

        editor.finish_prompt(Ok(Schema::new())).unwrap();
        assert!(!editor.is_loading());
    }

    #[test]
    fn test_escape_keeps_tool_while_loading() {
        let mut editor = editor();
        editor.set_tool(Tool::AddTable).unwrap();
        editor.begin_request().unwrap();

        editor.handle_input(InputEvent::Key(Key::Escape));
        assert_eq!(editor.interaction().tool, Tool::AddTable);

        editor.finish_prompt(Ok(Schema::new())).unwrap();
        editor.handle_input(InputEvent::Key(Key::Escape));
        assert_eq!(editor.interaction().tool, Tool::Select);
    }

    #[test]
    fn test_add_table_tool_through_input() {
        let mut editor = editor();
        editor.set_tool(Tool::AddTable).unwrap();
        let ui = editor.handle_input(InputEvent::PointerDown {
            target: PointerTarget::Canvas,
            screen: Vec2::new(300.0, 200.0),
            world: Vec2::new(300.0, 200.0),
        });
        assert!(ui.is_empty());
        let table = &editor.schema().unwrap().tables[0];
        assert_eq!(table.position, Some(Vec2::new(300.0, 200.0)));
    }

    #[test]
    fn test_connect_through_input() {
        let mut editor = editor();
        let users = editor.add_table(Vec2::ZERO).unwrap();
        let posts = editor.add_table(Vec2::new(500.0, 0.0)).unwrap();
        editor.set_tool(Tool::AddOneToMany).unwrap();

        for table in [posts, users] {
            editor.handle_input(InputEvent::PointerDown {
                target: PointerTarget::Node {
                    table,
                    center: Vec2::ZERO,
                },
                screen: Vec2::ZERO,
                world: Vec2::ZERO,
            });
        }
        assert_eq!(editor.diagram().edge_count(), 1);
        assert_eq!(editor.edges().len(), 1);
        assert_eq!(editor.edges()[0].source, posts);
    }

    #[test]
    fn test_failed_connection_reports_error() {
        let mut editor = editor();
        let a = editor.add_table(Vec2::ZERO).unwrap();
        let b = editor.add_table(Vec2::new(500.0, 0.0)).unwrap();
        let pk = editor.schema().unwrap().table(b).unwrap().columns[0].id;
        let mut edit = ColumnEdit::from_column(&editor.schema().unwrap().table(b).unwrap().columns[0]);
        edit.is_primary_key = false;
        editor.edit_column(b, pk, edit).unwrap();
        let steps = editor.history().undo_len();

        assert!(editor.connect_one_to_many(a, b).is_err());
        assert_eq!(editor.history().undo_len(), steps);
        assert!(editor.error().unwrap().contains("primary key"));
    }

    #[test]
    fn test_drag_end_persists_position_without_history() {
        let mut editor = editor();
        let id = editor.add_table(Vec2::new(100.0, 100.0)).unwrap();
        let steps = editor.history().undo_len();

        editor.handle_input(InputEvent::PointerDown {
            target: PointerTarget::Node {
                table: id,
                center: Vec2::new(100.0, 100.0),
            },
            screen: Vec2::new(100.0, 100.0),
            world: Vec2::new(100.0, 100.0),
        });
        editor.handle_input(InputEvent::PointerMove {
            screen: Vec2::new(150.0, 120.0),
            world: Vec2::new(150.0, 120.0),
        });
        assert!(!editor.is_settled());
        editor.tick();
        editor.handle_input(InputEvent::PointerUp {
            screen: Vec2::new(180.0, 140.0),
            world: Vec2::new(180.0, 140.0),
        });

        let table = editor.schema().unwrap().table(id).unwrap();
        assert_eq!(table.position, Some(Vec2::new(180.0, 140.0)));
        assert_eq!(editor.history().undo_len(), steps);
    }

    #[test]
    fn test_settled_layout_is_captured() {
        let mut editor = editor();
        editor.load_share_code(&share::encode(&Schema::demo()).unwrap()).unwrap();
        let steps = editor.history().undo_len();
        settle(&mut editor);

        assert!(editor.is_settled());
        let schema = editor.schema().unwrap();
        for table in schema.tables.iter().filter(|t| !t.is_junction()) {
            assert!(table.position.is_some(), "{} has no position", table.name);
        }
        assert_eq!(editor.history().undo_len(), steps);
        assert_eq!(editor.edges().len(), 4);
    }

    #[test]
    fn test_auto_layout_is_not_recorded() {
        let mut editor = editor();
        editor.load_share_code(&share::encode(&Schema::demo()).unwrap()).unwrap();
        let steps = editor.history().undo_len();
        editor.auto_layout().unwrap();
        assert_eq!(editor.history().undo_len(), steps);
        let users = editor.schema().unwrap().table_by_name("users").unwrap();
        assert!(users.position.is_some());
    }

    #[test]
    fn test_submit_prompt_creates_then_modifies() {
        let mut editor = editor();
        let users = Schema::new().with_table(
            Table::new("users").add_column(Column::new("id", "INTEGER").primary_key()),
        );
        block_on(editor.submit_prompt(&FakeAssistant::returning(users.clone()), "a users table"))
            .unwrap();
        let first_id = table_id(&editor, "users");
        assert!(!editor.schema().unwrap().has_missing_identities());
        assert_eq!(editor.project().messages.len(), 2);

        let extended = users.with_table(
            Table::new("posts")
                .add_column(Column::new("id", "INTEGER").primary_key())
                .add_column(Column::new("users_id", "INTEGER").references("users", "id")),
        );
        block_on(editor.submit_prompt(&FakeAssistant::returning(extended), "add posts")).unwrap();
        assert_eq!(table_id(&editor, "users"), first_id);
        assert_eq!(editor.diagram().edge_count(), 1);
        assert_eq!(editor.project().messages.len(), 4);
        assert_eq!(editor.project().messages[3].sender, Sender::Assistant);

        assert!(editor.undo().unwrap());
        assert_eq!(editor.schema().unwrap().tables.len(), 1);
    }

    #[test]
    fn test_failed_prompt_keeps_schema() {
        let mut editor = editor();
        editor.add_table(Vec2::ZERO).unwrap();
        let before = editor.schema().cloned();
        let result = block_on(editor.submit_prompt(&FakeAssistant::failing(), "break it"));
        assert!(matches!(result, Err(EditorError::Assistant(_))));
        assert_eq!(editor.schema().cloned(), before);
        assert!(!editor.is_loading());
        assert!(editor.error().unwrap().contains("connection reset"));
    }

    #[test]
    fn test_failed_import_resets_to_empty_undoably() {
        let mut editor = editor();
        editor.add_table(Vec2::ZERO).unwrap();
        let before = editor.schema().cloned();

        let result = block_on(editor.import_ddl(&FakeAssistant::failing(), "CREATE TABLE ("));
        assert!(result.is_err());
        assert_eq!(editor.schema(), Some(&Schema::new()));
        assert_eq!(editor.project().last_ddl, "CREATE TABLE (");

        editor.undo().unwrap();
        assert_eq!(editor.schema().cloned(), before);
    }

    #[test]
    fn test_import_assigns_identities() {
        let mut editor = editor();
        block_on(editor.import_ddl(&FakeAssistant::returning(Schema::demo()), "-- demo")).unwrap();
        assert!(!editor.schema().unwrap().has_missing_identities());
        assert_eq!(editor.diagram().node_count(), 4);
    }

    #[test]
    fn test_generate_ddl() {
        let mut editor = editor();
        let target = DdlTarget::Freeform("SQL".to_string());
        let ddl = block_on(editor.generate_ddl(&FakeAssistant::returning(Schema::new()), &target))
            .unwrap();
        assert!(ddl.starts_with("CREATE TABLE"));
        assert_eq!(editor.project().last_ddl, ddl);

        let result = block_on(editor.generate_ddl(&FakeAssistant::failing(), &target));
        assert!(result.is_err());
        assert_eq!(editor.project().last_ddl, ddl);
    }

    #[test]
    fn test_share_code_round_trip() {
        let mut editor = editor();
        editor.add_table(Vec2::new(1.0, 2.0)).unwrap();
        let code = editor.share_code().unwrap();
        let original = editor.schema().cloned();

        let mut other = self::editor();
        other.load_share_code(&code).unwrap();
        assert_eq!(other.schema().cloned(), original);
        assert!(other.load_share_code("%%%").is_err());
        assert!(other.error().is_some());
    }

    #[test]
    fn test_projects_are_isolated() {
        let mut editor = editor();
        let first = editor.project().id;
        editor.add_table(Vec2::ZERO).unwrap();
        editor.set_tool(Tool::AddTable).unwrap();

        let second = editor.create_project("Second").unwrap();
        assert!(editor.schema().is_none());
        assert!(!editor.can_undo());
        assert_eq!(editor.interaction().tool, Tool::Select);

        editor.switch_project(first).unwrap();
        assert_eq!(editor.schema().unwrap().tables.len(), 1);

        editor.delete_project(first).unwrap();
        assert_eq!(editor.project().id, second);
        assert!(editor.switch_project(first).is_err());
        editor.rename_project(second, "Renamed").unwrap();
        assert_eq!(editor.project().name, "Renamed");
    }

    #[test]
    fn test_workspace_survives_restart() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            storage_dir: dir.path().to_path_buf(),
            ..Config::default()
        };

        let mut editor = Editor::new(config.clone(), FileStore::new(dir.path()));
        editor.add_table(Vec2::new(5.0, 5.0)).unwrap();
        let id = editor.project().id;
        drop(editor);

        let mut reloaded = Editor::new(config, FileStore::new(dir.path()));
        assert_eq!(reloaded.project().id, id);
        assert_eq!(reloaded.schema().unwrap().tables.len(), 1);
        assert!(reloaded.undo().unwrap());
        assert!(reloaded.schema().is_none());
    }

    #[test]
    fn test_history_limit_applies() {
        let config = Config {
            history_limit: Some(2),
            ..Config::default()
        };
        let mut editor = Editor::new(config, MemoryStore::new());
        for _ in 0..5 {
            editor.add_table(Vec2::ZERO).unwrap();
        }
        assert_eq!(editor.history().undo_len(), 2);
    }

    #[test]
    fn test_double_click_effects_reach_ui() {
        let mut editor = editor();
        let table = editor.add_table(Vec2::ZERO).unwrap();
        let column = editor.schema().unwrap().tables[0].columns[0].id;
        let ui = editor.handle_input(InputEvent::DoubleClickColumn {
            table,
            column,
            screen: Vec2::new(3.0, 4.0),
        });
        assert_eq!(
            ui,
            vec![Effect::EditColumn {
                table,
                column,
                screen: Vec2::new(3.0, 4.0)
            }]
        );
    }

    #[test]
    fn test_minimap_pan_moves_camera() {
        let mut editor = editor();
        editor.add_table(Vec2::new(2000.0, 2000.0)).unwrap();
        let frame = editor.minimap();
        assert_eq!(frame.nodes.len(), 1);
        let target = frame.nodes[0].1.center;
        editor.minimap_pan(target);
        let visible = editor.camera().visible_world(editor.config().viewport_size());
        assert!(visible.center.distance(Vec2::new(2000.0, 2000.0)) < 1e-6);
    }
}
