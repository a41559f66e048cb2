//! Core domain models and business logic for the diagram engine

pub mod assistant;
pub mod auto_layout;
pub mod config;
pub mod derive;
pub mod edge_geometry;
pub mod editor;
pub mod geometry;
pub mod history;
pub mod identity;
pub mod interaction;
pub mod operations;
pub mod project;
mod schema;
pub mod share;
pub mod storage;
pub mod validation;
pub mod viewport;

pub use assistant::{AssistantError, DdlTarget, SchemaAssistant, SqlDialect};
pub use auto_layout::{LayoutConfig, LayoutEvent, LayoutSnapshot, NodeFrame, Simulation, auto_layout};
pub use config::Config;
pub use derive::{Cardinality, Diagram, DiagramEdge, DiagramNode, EndMarker, derive};
pub use edge_geometry::{EdgeGeometry, Glyph, GlyphStyle, Segment, boundary_point, edge_geometry};
pub use editor::{Editor, EditorError, RenderedEdge};
pub use geometry::{Rect, Vec2};
pub use history::History;
pub use identity::{assign_identities, reconcile};
pub use interaction::{
    ConnectionKind, ConnectionStage, Effect, Gesture, InputEvent, InteractionState, Key,
    PointerTarget, Tool, transition,
};
pub use operations::{ColumnEdit, SchemaError};
pub use project::{Message, Project, ProjectId, ProjectNotFound, Sender, Workspace};
pub use schema::*;
pub use share::ShareError;
pub use storage::{FileStore, KeyValueStore, MemoryStore, Storage, StorageError};
pub use validation::{NameWarning, ValidationError, check_name, name_warnings, validate_name};
pub use viewport::{Camera, MinimapConfig, MinimapFrame};
