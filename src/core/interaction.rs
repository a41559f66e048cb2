//! Tool-mode interaction state machine
//!
//! [`transition`] is a pure function from the current state and one input
//! event to the next state plus the effects the controller should apply.
//! It knows nothing about rendering or about the schema itself.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::core::geometry::Vec2;
use crate::core::schema::{ColumnId, TableId};

/// Zoom multiplier per wheel notch
pub const ZOOM_STEP: f64 = 1.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Tool {
    /// Select, drag nodes, pan the canvas
    #[default]
    Select,
    AddTable,
    AddOneToMany,
    AddManyToMany,
}

impl Tool {
    pub fn connection_kind(&self) -> Option<ConnectionKind> {
        match self {
            Tool::AddOneToMany => Some(ConnectionKind::OneToMany),
            Tool::AddManyToMany => Some(ConnectionKind::ManyToMany),
            Tool::Select | Tool::AddTable => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    OneToMany,
    ManyToMany,
}

/// Two-click connection protocol
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStage {
    #[default]
    Idle,
    SourceSelected(TableId),
}

/// Pointer gesture in progress
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Gesture {
    #[default]
    None,
    /// Pointer is down on a node; becomes a drag on first move
    NodePressed {
        table: TableId,
        grab_offset: Vec2,
        dragging: bool,
    },
    /// Pointer is down on empty canvas
    Panning { last: Vec2 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InteractionState {
    pub tool: Tool,
    pub connection: ConnectionStage,
    pub gesture: Gesture,
}

impl InteractionState {
    pub fn selected_source(&self) -> Option<TableId> {
        match self.connection {
            ConnectionStage::SourceSelected(table) => Some(table),
            ConnectionStage::Idle => None,
        }
    }
}

/// What the pointer went down on
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerTarget {
    Canvas,
    /// A node and its current centre in world coordinates
    Node { table: TableId, center: Vec2 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Undo,
    Redo,
}

/// Raw input, already hit-tested and converted to world coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    SelectTool(Tool),
    PointerDown {
        target: PointerTarget,
        screen: Vec2,
        world: Vec2,
    },
    PointerMove {
        screen: Vec2,
        world: Vec2,
    },
    PointerUp {
        screen: Vec2,
        world: Vec2,
    },
    DoubleClickTableName {
        table: TableId,
        screen: Vec2,
    },
    DoubleClickColumn {
        table: TableId,
        column: ColumnId,
        screen: Vec2,
    },
    Wheel {
        screen: Vec2,
        delta_y: f64,
    },
    Key(Key),
}

/// Side effects requested from the controller
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    AddTable {
        at: Vec2,
    },
    Connect {
        kind: ConnectionKind,
        source: TableId,
        target: TableId,
    },
    DragStart {
        table: TableId,
    },
    DragMove {
        table: TableId,
        to: Vec2,
    },
    DragEnd {
        table: TableId,
        at: Vec2,
    },
    PanBy(Vec2),
    ZoomAt {
        anchor: Vec2,
        factor: f64,
    },
    BeginRename {
        table: TableId,
        screen: Vec2,
    },
    EditColumn {
        table: TableId,
        column: ColumnId,
        screen: Vec2,
    },
    Undo,
    Redo,
}

impl Effect {
    /// Whether applying this effect changes the schema
    pub fn mutates_schema(&self) -> bool {
        matches!(
            self,
            Effect::AddTable { .. } | Effect::Connect { .. } | Effect::Undo | Effect::Redo
        )
    }
}

/// Releases whatever the current gesture holds
fn end_gesture(gesture: Gesture, world: Vec2, effects: &mut Vec<Effect>) {
    if let Gesture::NodePressed {
        table,
        grab_offset,
        dragging: true,
    } = gesture
    {
        effects.push(Effect::DragEnd {
            table,
            at: world.sub(grab_offset),
        });
    }
}

pub fn transition(state: &InteractionState, event: &InputEvent) -> (InteractionState, Vec<Effect>) {
    let mut next = *state;
    let mut effects = Vec::new();

    match *event {
        InputEvent::SelectTool(tool) => {
            next.tool = tool;
            next.connection = ConnectionStage::Idle;
        }

        InputEvent::PointerDown {
            target,
            screen,
            world,
        } => match (state.tool, target) {
            (Tool::Select, PointerTarget::Node { table, center }) => {
                next.gesture = Gesture::NodePressed {
                    table,
                    grab_offset: world.sub(center),
                    dragging: false,
                };
            }
            (Tool::Select, PointerTarget::Canvas) => {
                next.gesture = Gesture::Panning { last: screen };
            }
            (Tool::AddTable, PointerTarget::Canvas) => {
                effects.push(Effect::AddTable { at: world });
            }
            (Tool::AddTable, PointerTarget::Node { .. }) => {}
            (tool, PointerTarget::Node { table, .. }) => {
                let Some(kind) = tool.connection_kind() else {
                    return (next, effects);
                };
                match state.connection {
                    ConnectionStage::Idle => {
                        next.connection = ConnectionStage::SourceSelected(table);
                    }
                    ConnectionStage::SourceSelected(source) if source == table => {}
                    ConnectionStage::SourceSelected(source) => {
                        effects.push(Effect::Connect {
                            kind,
                            source,
                            target: table,
                        });
                        next.connection = ConnectionStage::Idle;
                    }
                }
            }
            (_, PointerTarget::Canvas) => {}
        },

        InputEvent::PointerMove { screen, world } => match state.gesture {
            Gesture::NodePressed {
                table,
                grab_offset,
                dragging,
            } => {
                if !dragging {
                    effects.push(Effect::DragStart { table });
                }
                effects.push(Effect::DragMove {
                    table,
                    to: world.sub(grab_offset),
                });
                next.gesture = Gesture::NodePressed {
                    table,
                    grab_offset,
                    dragging: true,
                };
            }
            Gesture::Panning { last } => {
                let delta = screen.sub(last);
                if delta != Vec2::ZERO {
                    effects.push(Effect::PanBy(delta));
                }
                next.gesture = Gesture::Panning { last: screen };
            }
            Gesture::None => {}
        },

        InputEvent::PointerUp { world, .. } => {
            end_gesture(state.gesture, world, &mut effects);
            next.gesture = Gesture::None;
        }

        InputEvent::DoubleClickTableName { table, screen } => {
            effects.push(Effect::BeginRename { table, screen });
        }

        InputEvent::DoubleClickColumn {
            table,
            column,
            screen,
        } => {
            effects.push(Effect::EditColumn {
                table,
                column,
                screen,
            });
        }

        InputEvent::Wheel { screen, delta_y } => {
            if delta_y != 0.0 {
                let factor = if delta_y < 0.0 {
                    ZOOM_STEP
                } else {
                    1.0 / ZOOM_STEP
                };
                effects.push(Effect::ZoomAt {
                    anchor: screen,
                    factor,
                });
            }
        }

        InputEvent::Key(Key::Escape) => {
            // Gestures end with the pointer, not the key
            if state.connection == ConnectionStage::Idle && state.gesture == Gesture::None {
                next.tool = Tool::Select;
            }
            next.connection = ConnectionStage::Idle;
        }
        InputEvent::Key(Key::Undo) => effects.push(Effect::Undo),
        InputEvent::Key(Key::Redo) => effects.push(Effect::Redo),
    }

    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn down_on(table: TableId) -> InputEvent {
        InputEvent::PointerDown {
            target: PointerTarget::Node {
                table,
                center: Vec2::new(100.0, 100.0),
            },
            screen: Vec2::new(110.0, 105.0),
            world: Vec2::new(110.0, 105.0),
        }
    }

    fn down_on_canvas(at: Vec2) -> InputEvent {
        InputEvent::PointerDown {
            target: PointerTarget::Canvas,
            screen: at,
            world: at,
        }
    }

    fn with_tool(tool: Tool) -> InteractionState {
        transition(&InteractionState::default(), &InputEvent::SelectTool(tool)).0
    }

    #[test]
    fn test_add_table_on_canvas_click() {
        let state = with_tool(Tool::AddTable);
        let (next, effects) = transition(&state, &down_on_canvas(Vec2::new(40.0, 50.0)));
        assert_eq!(
            effects,
            vec![Effect::AddTable {
                at: Vec2::new(40.0, 50.0)
            }]
        );
        assert_eq!(next.tool, Tool::AddTable);
    }

    #[test]
    fn test_connection_protocol() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let state = with_tool(Tool::AddOneToMany);

        let (state, effects) = transition(&state, &down_on(a));
        assert!(effects.is_empty());
        assert_eq!(state.connection, ConnectionStage::SourceSelected(a));

        // Same node again is a no-op
        let (state, effects) = transition(&state, &down_on(a));
        assert!(effects.is_empty());
        assert_eq!(state.selected_source(), Some(a));

        // Empty canvas keeps the source
        let (state, effects) = transition(&state, &down_on_canvas(Vec2::ZERO));
        assert!(effects.is_empty());
        assert_eq!(state.selected_source(), Some(a));

        let (state, effects) = transition(&state, &down_on(b));
        assert_eq!(
            effects,
            vec![Effect::Connect {
                kind: ConnectionKind::OneToMany,
                source: a,
                target: b
            }]
        );
        assert_eq!(state.connection, ConnectionStage::Idle);
        assert_eq!(state.tool, Tool::AddOneToMany);
    }

    #[test]
    fn test_many_to_many_tool() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let state = with_tool(Tool::AddManyToMany);
        let (state, _) = transition(&state, &down_on(a));
        let (_, effects) = transition(&state, &down_on(b));
        assert!(matches!(
            effects[0],
            Effect::Connect {
                kind: ConnectionKind::ManyToMany,
                ..
            }
        ));
    }

    #[test]
    fn test_switching_tools_resets_source() {
        let a = Uuid::new_v4();
        let state = with_tool(Tool::AddOneToMany);
        let (state, _) = transition(&state, &down_on(a));
        assert!(state.selected_source().is_some());

        let (state, effects) = transition(&state, &InputEvent::SelectTool(Tool::AddManyToMany));
        assert!(effects.is_empty());
        assert_eq!(state.connection, ConnectionStage::Idle);

        let (state, _) = transition(&state, &down_on(a));
        let (state, _) = transition(&state, &InputEvent::SelectTool(Tool::AddManyToMany));
        assert_eq!(state.connection, ConnectionStage::Idle);
    }

    #[test]
    fn test_node_drag_sequence() {
        let table = Uuid::new_v4();
        let state = InteractionState::default();

        let (state, effects) = transition(&state, &down_on(table));
        assert!(effects.is_empty());

        let (state, effects) = transition(
            &state,
            &InputEvent::PointerMove {
                screen: Vec2::new(210.0, 105.0),
                world: Vec2::new(210.0, 105.0),
            },
        );
        assert_eq!(
            effects,
            vec![
                Effect::DragStart { table },
                Effect::DragMove {
                    table,
                    to: Vec2::new(200.0, 100.0)
                }
            ]
        );

        let (state, effects) = transition(
            &state,
            &InputEvent::PointerMove {
                screen: Vec2::new(220.0, 105.0),
                world: Vec2::new(220.0, 105.0),
            },
        );
        assert_eq!(effects.len(), 1);

        let (state, effects) = transition(
            &state,
            &InputEvent::PointerUp {
                screen: Vec2::new(220.0, 115.0),
                world: Vec2::new(220.0, 115.0),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::DragEnd {
                table,
                at: Vec2::new(210.0, 110.0)
            }]
        );
        assert_eq!(state.gesture, Gesture::None);
    }

    #[test]
    fn test_click_without_move_is_not_a_drag() {
        let table = Uuid::new_v4();
        let (state, _) = transition(&InteractionState::default(), &down_on(table));
        let (_, effects) = transition(
            &state,
            &InputEvent::PointerUp {
                screen: Vec2::ZERO,
                world: Vec2::ZERO,
            },
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_canvas_drag_pans() {
        let (state, _) = transition(
            &InteractionState::default(),
            &down_on_canvas(Vec2::new(10.0, 10.0)),
        );
        let (state, effects) = transition(
            &state,
            &InputEvent::PointerMove {
                screen: Vec2::new(25.0, 5.0),
                world: Vec2::new(25.0, 5.0),
            },
        );
        assert_eq!(effects, vec![Effect::PanBy(Vec2::new(15.0, -5.0))]);
        assert!(effects.iter().all(|e| !e.mutates_schema()));
        let (state, effects) = transition(
            &state,
            &InputEvent::PointerUp {
                screen: Vec2::ZERO,
                world: Vec2::ZERO,
            },
        );
        assert!(effects.is_empty());
        assert_eq!(state.gesture, Gesture::None);
    }

    #[test]
    fn test_wheel_zoom() {
        let anchor = Vec2::new(300.0, 200.0);
        let (_, effects) = transition(
            &InteractionState::default(),
            &InputEvent::Wheel {
                screen: anchor,
                delta_y: -120.0,
            },
        );
        assert_eq!(
            effects,
            vec![Effect::ZoomAt {
                anchor,
                factor: ZOOM_STEP
            }]
        );
    }

    #[test]
    fn test_escape_cancels_then_returns_to_select() {
        let a = Uuid::new_v4();
        let state = with_tool(Tool::AddOneToMany);
        let (state, _) = transition(&state, &down_on(a));

        let (state, effects) = transition(&state, &InputEvent::Key(Key::Escape));
        assert!(effects.is_empty());
        assert_eq!(state.connection, ConnectionStage::Idle);
        assert_eq!(state.tool, Tool::AddOneToMany);

        let (state, _) = transition(&state, &InputEvent::Key(Key::Escape));
        assert_eq!(state.tool, Tool::Select);
    }

    #[test]
    fn test_undo_redo_keys_and_double_clicks() {
        let state = InteractionState::default();
        let (_, effects) = transition(&state, &InputEvent::Key(Key::Undo));
        assert_eq!(effects, vec![Effect::Undo]);
        let (_, effects) = transition(&state, &InputEvent::Key(Key::Redo));
        assert_eq!(effects, vec![Effect::Redo]);

        let (table, column) = (Uuid::new_v4(), Uuid::new_v4());
        let screen = Vec2::new(5.0, 6.0);
        let (_, effects) = transition(
            &state,
            &InputEvent::DoubleClickColumn {
                table,
                column,
                screen,
            },
        );
        assert_eq!(
            effects,
            vec![Effect::EditColumn {
                table,
                column,
                screen
            }]
        );
        let (_, effects) = transition(&state, &InputEvent::DoubleClickTableName { table, screen });
        assert_eq!(effects, vec![Effect::BeginRename { table, screen }]);
    }
}
