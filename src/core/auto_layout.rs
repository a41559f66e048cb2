//! Force-directed layout for the diagram
//!
//! The simulation is stepped incrementally, one [`Simulation::step`] per
//! display frame, and cools down until it settles. Forces:
//! - **Repulsion**: every pair of tables pushes apart (inverse square)
//! - **Attraction**: related tables are pulled toward a rest distance (springs)
//! - **Centering**: a gentle pull toward the viewport centre prevents drift
//! - **Collision**: tables never overlap, using each rectangle's half diagonal
//!   plus a clearance margin as its radius
//!
//! Tables with a stored position are pinned. Dragging pins a table to the
//! pointer and re-energizes the simulation until the drag ends.

use std::collections::HashMap;

use rand::Rng;

use crate::core::derive::Diagram;
use crate::core::geometry::{Rect, Vec2};
use crate::core::schema::{Schema, TableId};

/// Layout configuration
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Rest length of a relationship spring
    pub link_distance: f64,
    /// Spring stiffness
    pub link_strength: f64,
    /// Repulsion strength between all nodes
    pub repulsion_strength: f64,
    /// Pull toward the centre
    pub center_strength: f64,
    /// Clearance added to each node's collision radius
    pub collision_margin: f64,
    /// Fraction of overlap resolved per step
    pub collision_strength: f64,
    /// Velocity lost per step
    pub velocity_decay: f64,
    /// Energy below which the simulation counts as settled
    pub alpha_min: f64,
    /// Per-step approach of alpha toward its target
    pub alpha_decay: f64,
    /// Alpha target held while a node is dragged
    pub drag_alpha_target: f64,
    /// Alpha used when nodes are added or removed
    pub reheat_alpha: f64,
    /// Spacing of the spiral used to seed unplaced nodes
    pub initial_spacing: f64,
    /// Upper bound on steps for one-shot layouts
    pub max_steps: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            link_distance: 260.0,
            link_strength: 0.3,
            repulsion_strength: 1200.0,
            center_strength: 0.02,
            collision_margin: 24.0,
            collision_strength: 0.7,
            velocity_decay: 0.4,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            drag_alpha_target: 0.3,
            reheat_alpha: 0.6,
            initial_spacing: 90.0,
            max_steps: 1000,
        }
    }
}

/// What a single step did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutEvent {
    /// Nodes moved
    Tick,
    /// This step brought the simulation to rest
    Settled,
    /// Already at rest, nothing moved
    Idle,
}

/// One simulated table
#[derive(Clone, Debug)]
struct SimNode {
    table_id: TableId,
    position: Vec2,
    velocity: Vec2,
    pinned: Option<Vec2>,
    width: f64,
    height: f64,
}

impl SimNode {
    fn radius(&self, margin: f64) -> f64 {
        Rect::new(self.position, self.width, self.height).half_diagonal() + margin
    }
}

/// Read-only copy of one node, handed to rendering and the minimap
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeFrame {
    pub table_id: TableId,
    pub rect: Rect,
    pub pinned: bool,
}

/// Immutable snapshot of the whole layout between steps
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutSnapshot {
    pub nodes: Vec<NodeFrame>,
    pub links: Vec<(TableId, TableId)>,
}

impl LayoutSnapshot {
    pub fn node(&self, table: TableId) -> Option<&NodeFrame> {
        self.nodes.iter().find(|n| n.table_id == table)
    }

    /// Bounding box of every node
    pub fn bounds(&self) -> Option<Rect> {
        let mut rects = self.nodes.iter().map(|n| n.rect);
        let first = rects.next()?;
        Some(rects.fold(first, |acc, r| acc.union(&r)))
    }
}

/// Incremental force simulation
///
/// Node records live in an arena addressed by index; `index` maps table ids
/// to slots. Only the simulation writes positions; readers take snapshots.
#[derive(Clone, Debug)]
pub struct Simulation {
    config: LayoutConfig,
    nodes: Vec<SimNode>,
    index: HashMap<TableId, usize>,
    links: Vec<(usize, usize)>,
    center: Vec2,
    alpha: f64,
    alpha_target: f64,
    dragging: Option<TableId>,
}

impl Simulation {
    pub fn new(config: LayoutConfig, center: Vec2) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            index: HashMap::new(),
            links: Vec::new(),
            center,
            alpha: 0.0,
            alpha_target: 0.0,
            dragging: None,
        }
    }

    /// Simulation seeded from a diagram and heated up
    pub fn from_diagram(diagram: &Diagram, config: LayoutConfig, center: Vec2) -> Self {
        let mut simulation = Self::new(config, center);
        simulation.sync(diagram);
        simulation
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
    }

    pub fn dragging(&self) -> Option<TableId> {
        self.dragging
    }

    pub fn is_settled(&self) -> bool {
        self.dragging.is_none() && self.alpha < self.config.alpha_min
    }

    pub fn position(&self, table: TableId) -> Option<Vec2> {
        self.index.get(&table).map(|&i| self.nodes[i].position)
    }

    /// Brings the node set in line with a freshly derived diagram
    ///
    /// Surviving nodes keep their simulated position and velocity. Stored
    /// positions become pins; a node losing its stored position floats
    /// again. Added or removed nodes reheat the simulation.
    pub fn sync(&mut self, diagram: &Diagram) {
        let previous: HashMap<TableId, SimNode> = self
            .nodes
            .drain(..)
            .map(|node| (node.table_id, node))
            .collect();
        let structure_changed = previous.len() != diagram.node_count()
            || diagram.nodes().any(|n| !previous.contains_key(&n.table_id));

        let mut seeded = 0usize;
        for node in diagram.nodes() {
            let old = previous.get(&node.table_id);
            let pinned = match (node.position, self.dragging) {
                (_, Some(dragged)) if dragged == node.table_id => old.and_then(|o| o.pinned),
                (stored, _) => stored,
            };
            let position = pinned
                .or_else(|| old.map(|o| o.position))
                .unwrap_or_else(|| {
                    seeded += 1;
                    self.seed_position(previous.len() + seeded)
                });
            self.nodes.push(SimNode {
                table_id: node.table_id,
                position,
                velocity: old.map(|o| o.velocity).unwrap_or_default(),
                pinned,
                width: node.width,
                height: node.height,
            });
        }

        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.table_id, i))
            .collect();
        self.links = diagram
            .edges()
            .filter_map(|(a, b, _)| Some((*self.index.get(&a)?, *self.index.get(&b)?)))
            .filter(|(a, b)| a != b)
            .collect();

        if let Some(dragged) = self.dragging
            && !self.index.contains_key(&dragged)
        {
            self.dragging = None;
            self.alpha_target = 0.0;
        }

        if structure_changed {
            self.reheat();
        }
    }

    /// Phyllotaxis spiral around the centre, so unplaced tables start spread out
    fn seed_position(&self, i: usize) -> Vec2 {
        let golden_angle = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        let radius = self.config.initial_spacing * (0.5 + i as f64).sqrt();
        let angle = i as f64 * golden_angle;
        self.center
            .add(Vec2::new(radius * angle.cos(), radius * angle.sin()))
    }

    /// Re-energizes the simulation
    pub fn reheat(&mut self) {
        self.alpha = self.alpha.max(self.config.reheat_alpha);
    }

    /// Advances the simulation by one step
    pub fn step(&mut self) -> LayoutEvent {
        if self.is_settled() {
            return LayoutEvent::Idle;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;

        self.apply_links(alpha);
        self.apply_repulsion(alpha);
        self.apply_centering(alpha);
        self.apply_collisions();

        let decay = 1.0 - self.config.velocity_decay;
        for node in &mut self.nodes {
            match node.pinned {
                Some(pin) => {
                    node.position = pin;
                    node.velocity = Vec2::ZERO;
                }
                None => {
                    node.velocity = node.velocity.scale(decay);
                    node.position = node.position.add(node.velocity);
                }
            }
        }

        if self.is_settled() {
            tracing::debug!("Layout settled with {} nodes", self.nodes.len());
            LayoutEvent::Settled
        } else {
            LayoutEvent::Tick
        }
    }

    /// Steps until settled (or `max_steps`), returning the number of steps taken
    pub fn run_until_settled(&mut self) -> usize {
        let mut steps = 0;
        while steps < self.config.max_steps && self.step() != LayoutEvent::Idle {
            steps += 1;
            if self.is_settled() {
                break;
            }
        }
        steps
    }

    fn apply_links(&mut self, alpha: f64) {
        let mut degree = vec![0usize; self.nodes.len()];
        for &(a, b) in &self.links {
            degree[a] += 1;
            degree[b] += 1;
        }

        for &(a, b) in &self.links {
            let predicted_a = self.nodes[a].position.add(self.nodes[a].velocity);
            let predicted_b = self.nodes[b].position.add(self.nodes[b].velocity);
            let mut delta = predicted_b.sub(predicted_a);
            if delta.length_squared() < 1e-9 {
                delta = jiggle();
            }
            let distance = delta.length();
            let stretch = (distance - self.config.link_distance) / distance
                * alpha
                * self.config.link_strength;
            let correction = delta.scale(stretch);
            let bias = degree[a] as f64 / (degree[a] + degree[b]) as f64;

            self.nodes[b].velocity = self.nodes[b].velocity.sub(correction.scale(bias));
            self.nodes[a].velocity = self.nodes[a].velocity.add(correction.scale(1.0 - bias));
        }
    }

    fn apply_repulsion(&mut self, alpha: f64) {
        let count = self.nodes.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let mut delta = self.nodes[j].position.sub(self.nodes[i].position);
                if delta.length_squared() < 1e-9 {
                    delta = jiggle();
                }
                let distance_sq = delta.length_squared().max(1.0);
                let push = delta.scale(self.config.repulsion_strength * alpha / distance_sq);

                self.nodes[i].velocity = self.nodes[i].velocity.sub(push);
                self.nodes[j].velocity = self.nodes[j].velocity.add(push);
            }
        }
    }

    fn apply_centering(&mut self, alpha: f64) {
        let strength = self.config.center_strength * alpha;
        for node in &mut self.nodes {
            let to_center = self.center.sub(node.position);
            node.velocity = node.velocity.add(to_center.scale(strength));
        }
    }

    fn apply_collisions(&mut self) {
        let margin = self.config.collision_margin;
        let count = self.nodes.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let ri = self.nodes[i].radius(margin);
                let rj = self.nodes[j].radius(margin);
                let predicted_i = self.nodes[i].position.add(self.nodes[i].velocity);
                let predicted_j = self.nodes[j].position.add(self.nodes[j].velocity);
                let mut delta = predicted_j.sub(predicted_i);
                if delta.length_squared() < 1e-9 {
                    delta = jiggle();
                }
                let distance = delta.length();
                let min_distance = ri + rj;
                if distance >= min_distance {
                    continue;
                }

                let overlap =
                    (min_distance - distance) / distance * self.config.collision_strength;
                let push = delta.scale(overlap);
                let share_i = rj * rj / (ri * ri + rj * rj);

                self.nodes[i].velocity = self.nodes[i].velocity.sub(push.scale(share_i));
                self.nodes[j].velocity = self.nodes[j].velocity.add(push.scale(1.0 - share_i));
            }
        }
    }

    // ========================================================================
    // Drag contract
    // ========================================================================

    /// Pins the node where it currently is and keeps the simulation warm
    pub fn drag_start(&mut self, table: TableId) -> bool {
        let Some(&i) = self.index.get(&table) else {
            return false;
        };
        let node = &mut self.nodes[i];
        node.pinned = Some(node.position);
        self.dragging = Some(table);
        self.alpha_target = self.config.drag_alpha_target;
        self.reheat();
        true
    }

    /// Moves the pin of the dragged node
    pub fn drag_move(&mut self, table: TableId, to: Vec2) {
        if self.dragging != Some(table) {
            return;
        }
        if let Some(&i) = self.index.get(&table) {
            self.nodes[i].pinned = Some(to);
        }
    }

    /// Pins the node at the release point and lets the simulation cool down
    ///
    /// Returns the coordinate to persist into the schema.
    pub fn drag_end(&mut self, table: TableId, at: Vec2) -> Option<Vec2> {
        if self.dragging != Some(table) {
            return None;
        }
        self.dragging = None;
        self.alpha_target = 0.0;
        let &i = self.index.get(&table)?;
        self.nodes[i].pinned = Some(at);
        Some(at)
    }

    /// Releases every pin (used by one-shot auto layout)
    pub fn unpin_all(&mut self) {
        for node in &mut self.nodes {
            node.pinned = None;
        }
        self.reheat();
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeFrame {
                    table_id: n.table_id,
                    rect: Rect::new(n.position, n.width, n.height),
                    pinned: n.pinned.is_some(),
                })
                .collect(),
            links: self
                .links
                .iter()
                .map(|&(a, b)| (self.nodes[a].table_id, self.nodes[b].table_id))
                .collect(),
        }
    }
}

/// Tiny random offset separating coincident nodes
fn jiggle() -> Vec2 {
    let mut rng = rand::thread_rng();
    Vec2::new(rng.gen_range(-1e-3..1e-3), rng.gen_range(-1e-3..1e-3))
}

/// Lays out every table from scratch and writes the settled centres back
pub fn auto_layout(schema: &mut Schema, config: &LayoutConfig, center: Vec2) {
    let mut unplaced = schema.clone();
    for table in &mut unplaced.tables {
        table.position = None;
    }
    let diagram = crate::core::derive::derive(&unplaced);
    let mut simulation = Simulation::from_diagram(&diagram, config.clone(), center);
    let steps = simulation.run_until_settled();
    tracing::debug!("Auto layout finished after {} steps", steps);

    for table in &mut schema.tables {
        if let Some(position) = simulation.position(table.id) {
            table.position = Some(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::derive::derive;
    use crate::core::identity::assign_identities;
    use crate::core::schema::{Column, Table};

    fn chain(n: usize) -> Schema {
        let mut schema = Schema::new();
        for i in 0..n {
            let mut table =
                Table::new(format!("t{}", i)).add_column(Column::new("id", "INT").primary_key());
            if i > 0 {
                table = table.add_column(
                    Column::new("parent_id", "INT").references(format!("t{}", i - 1), "id"),
                );
            }
            schema.tables.push(table);
        }
        assign_identities(schema)
    }

    fn settle(schema: &Schema) -> Simulation {
        let mut simulation =
            Simulation::from_diagram(&derive(schema), LayoutConfig::default(), Vec2::ZERO);
        simulation.run_until_settled();
        simulation
    }

    #[test]
    fn test_empty_simulation_is_settled() {
        let mut simulation = Simulation::new(LayoutConfig::default(), Vec2::ZERO);
        assert!(simulation.is_settled());
        assert_eq!(simulation.step(), LayoutEvent::Idle);
        assert!(simulation.snapshot().nodes.is_empty());
    }

    #[test]
    fn test_simulation_settles() {
        let simulation = settle(&chain(4));
        assert!(simulation.is_settled());
        assert_eq!(simulation.snapshot().nodes.len(), 4);
        assert_eq!(simulation.snapshot().links.len(), 3);
    }

    #[test]
    fn test_no_overlaps_after_settling() {
        let mut schema = chain(0);
        for i in 0..6 {
            schema.tables.push(
                Table::new(format!("loose_{}", i)).add_column(Column::new("id", "INT").primary_key()),
            );
        }
        let schema = assign_identities(schema);
        let snapshot = settle(&schema).snapshot();

        for (i, a) in snapshot.nodes.iter().enumerate() {
            for b in &snapshot.nodes[i + 1..] {
                let dx = (a.rect.center.x - b.rect.center.x).abs();
                let dy = (a.rect.center.y - b.rect.center.y).abs();
                let epsilon = 1.0;
                assert!(
                    dx >= (a.rect.width + b.rect.width) / 2.0 - epsilon
                        || dy >= (a.rect.height + b.rect.height) / 2.0 - epsilon,
                    "Tables overlap: dx={}, dy={}",
                    dx,
                    dy
                );
            }
        }
    }

    #[test]
    fn test_connected_tables_stay_close() {
        let schema = chain(2);
        let simulation = settle(&schema);
        let a = simulation.position(schema.tables[0].id).unwrap();
        let b = simulation.position(schema.tables[1].id).unwrap();
        let distance = a.distance(b);
        assert!(
            distance < LayoutConfig::default().link_distance * 2.5,
            "Connected tables should be close together, but distance is {}",
            distance
        );
    }

    #[test]
    fn test_pinned_nodes_do_not_move() {
        let mut schema = chain(3);
        schema.tables[0].position = Some(Vec2::new(500.0, -200.0));
        let simulation = settle(&schema);
        assert_eq!(
            simulation.position(schema.tables[0].id),
            Some(Vec2::new(500.0, -200.0))
        );
        assert!(simulation.snapshot().node(schema.tables[0].id).unwrap().pinned);
    }

    #[test]
    fn test_drag_contract() {
        let schema = chain(3);
        let id = schema.tables[1].id;
        let mut simulation = settle(&schema);
        let start = simulation.position(id).unwrap();

        assert!(simulation.drag_start(id));
        assert!(!simulation.is_settled());
        assert_eq!(simulation.dragging(), Some(id));
        simulation.step();
        assert_eq!(simulation.position(id), Some(start));

        let target = start.add(Vec2::new(300.0, 120.0));
        simulation.drag_move(id, target);
        for _ in 0..50 {
            assert_ne!(simulation.step(), LayoutEvent::Idle);
        }
        assert_eq!(simulation.position(id), Some(target));

        let released = target.add(Vec2::new(10.0, 0.0));
        assert_eq!(simulation.drag_end(id, released), Some(released));
        simulation.run_until_settled();
        assert!(simulation.is_settled());
        assert_eq!(simulation.position(id), Some(released));
    }

    #[test]
    fn test_drag_end_without_start_is_ignored() {
        let schema = chain(2);
        let mut simulation = settle(&schema);
        assert_eq!(simulation.drag_end(schema.tables[0].id, Vec2::ZERO), None);
        assert!(!simulation.drag_start(uuid::Uuid::new_v4()));
    }

    #[test]
    fn test_sync_keeps_positions_and_reheats() {
        let mut schema = chain(2);
        let mut simulation = settle(&schema);
        let kept = simulation.position(schema.tables[0].id).unwrap();

        schema.tables.push(
            Table::new("extra")
                .with_id(uuid::Uuid::new_v4())
                .add_column(Column::new("id", "INT").with_id(uuid::Uuid::new_v4())),
        );
        simulation.sync(&derive(&schema));
        assert!(!simulation.is_settled());
        assert_eq!(simulation.position(schema.tables[0].id), Some(kept));
        assert_eq!(simulation.snapshot().nodes.len(), 3);
    }

    #[test]
    fn test_sync_without_structural_change_stays_settled() {
        let schema = chain(3);
        let mut simulation = settle(&schema);
        simulation.sync(&derive(&schema));
        assert!(simulation.is_settled());
    }

    #[test]
    fn test_auto_layout_writes_every_position() {
        let mut schema = chain(4);
        schema.tables[0].position = Some(Vec2::new(1e6, 1e6));
        auto_layout(&mut schema, &LayoutConfig::default(), Vec2::ZERO);
        assert!(schema.tables.iter().all(|t| t.position.is_some()));
        assert_ne!(schema.tables[0].position, Some(Vec2::new(1e6, 1e6)));
    }

    #[test]
    fn test_layout_config_default() {
        let config = LayoutConfig::default();
        assert_eq!(config.link_distance, 260.0);
        assert!(config.alpha_decay > 0.0 && config.alpha_decay < 1.0);
        assert_eq!(config.max_steps, 1000);
    }
}
