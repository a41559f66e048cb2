//! Camera and minimap projection
//!
//! Pan and zoom are view state: they never touch the schema or history.
//! The minimap is a down-scaled, read-only projection of a layout snapshot
//! plus the rectangle the primary viewport currently shows.

use serde::{Deserialize, Serialize};

use crate::core::auto_layout::LayoutSnapshot;
use crate::core::edge_geometry::Segment;
use crate::core::geometry::{Rect, Vec2};
use crate::core::schema::TableId;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 4.0;

/// Primary viewport camera
///
/// `screen = world * zoom + pan`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub pan: Vec2,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        screen.sub(self.pan).scale(1.0 / self.zoom)
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world.scale(self.zoom).add(self.pan)
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan = self.pan.add(delta);
    }

    /// Multiplies the zoom, keeping the world point under `anchor` fixed
    pub fn zoom_at(&mut self, anchor: Vec2, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world = self.screen_to_world(anchor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = anchor.sub(world.scale(self.zoom));
    }

    /// World-space rectangle visible through a viewport of `size`
    pub fn visible_world(&self, size: Vec2) -> Rect {
        Rect::from_corners(
            self.screen_to_world(Vec2::ZERO),
            self.screen_to_world(size),
        )
    }

    /// Pans so that `world` ends up in the middle of the viewport
    pub fn center_on(&mut self, world: Vec2, size: Vec2) {
        self.pan = size.scale(0.5).sub(world.scale(self.zoom));
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinimapConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 150.0,
            padding: 8.0,
        }
    }
}

/// One frame of the minimap, in minimap pixels
#[derive(Clone, Debug, PartialEq)]
pub struct MinimapFrame {
    pub nodes: Vec<(TableId, Rect)>,
    pub edges: Vec<Segment>,
    /// The primary viewport's visible area
    pub viewport: Rect,
    scale: f64,
    offset: Vec2,
}

impl MinimapFrame {
    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn to_minimap(&self, world: Vec2) -> Vec2 {
        world.scale(self.scale).add(self.offset)
    }

    pub fn minimap_to_world(&self, point: Vec2) -> Vec2 {
        point.sub(self.offset).scale(1.0 / self.scale)
    }

    /// Drag-to-pan: centres the primary camera on the world point under `point`
    pub fn pan_camera(&self, camera: &mut Camera, point: Vec2, viewport_size: Vec2) {
        camera.center_on(self.minimap_to_world(point), viewport_size);
    }
}

/// Projects a snapshot and the camera's visible area into the minimap
///
/// The world area shown covers every node and the visible viewport, scaled
/// uniformly to fit inside the padded minimap and centred in it.
pub fn project(
    snapshot: &LayoutSnapshot,
    camera: &Camera,
    viewport_size: Vec2,
    config: &MinimapConfig,
) -> MinimapFrame {
    let visible = camera.visible_world(viewport_size);
    let world = snapshot
        .bounds()
        .map(|bounds| bounds.union(&visible))
        .unwrap_or(visible);

    let inner_w = (config.width - 2.0 * config.padding).max(1.0);
    let inner_h = (config.height - 2.0 * config.padding).max(1.0);
    let scale = (inner_w / world.width.max(1.0)).min(inner_h / world.height.max(1.0));

    let minimap_center = Vec2::new(config.width / 2.0, config.height / 2.0);
    let offset = minimap_center.sub(world.center.scale(scale));

    let mut frame = MinimapFrame {
        nodes: Vec::with_capacity(snapshot.nodes.len()),
        edges: Vec::with_capacity(snapshot.links.len()),
        viewport: Rect::new(Vec2::ZERO, 0.0, 0.0),
        scale,
        offset,
    };

    frame.nodes = snapshot
        .nodes
        .iter()
        .map(|n| {
            (
                n.table_id,
                Rect::new(
                    frame.to_minimap(n.rect.center),
                    n.rect.width * scale,
                    n.rect.height * scale,
                ),
            )
        })
        .collect();
    frame.edges = snapshot
        .links
        .iter()
        .filter_map(|(a, b)| {
            let a = snapshot.node(*a)?.rect.center;
            let b = snapshot.node(*b)?.rect.center;
            Some(Segment::new(frame.to_minimap(a), frame.to_minimap(b)))
        })
        .collect();
    frame.viewport = Rect::new(
        frame.to_minimap(visible.center),
        visible.width * scale,
        visible.height * scale,
    );
    frame
}
