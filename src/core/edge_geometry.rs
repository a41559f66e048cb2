//! Edge path geometry with crow's-foot cardinality glyphs
//!
//! Edges run straight between the points where the centre-to-centre line
//! leaves each node's rectangle. The "many" end gets a three-pronged
//! crow's foot, the "one" end a perpendicular bar with the line pulled back
//! slightly so the bar stands apart from the line end.

use crate::core::derive::{DiagramEdge, EndMarker};
use crate::core::geometry::{Rect, Vec2};

/// Glyph dimensions
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphStyle {
    /// Distance from the boundary to the crow's-foot apex
    pub crow_length: f64,
    /// Half-angle of the crow's-foot wedge, in radians
    pub crow_spread: f64,
    /// Distance from the boundary to the bar
    pub bar_offset: f64,
    /// Half-length of the bar
    pub bar_half_length: f64,
    /// How far the line is pulled back at a "one" end
    pub line_inset: f64,
}

impl Default for GlyphStyle {
    fn default() -> Self {
        Self {
            crow_length: 14.0,
            crow_spread: 30f64.to_radians(),
            bar_offset: 12.0,
            bar_half_length: 7.0,
            line_inset: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: Vec2,
    pub to: Vec2,
}

impl Segment {
    pub fn new(from: Vec2, to: Vec2) -> Self {
        Self { from, to }
    }

    pub fn length(&self) -> f64 {
        self.from.distance(self.to)
    }
}

/// Cardinality glyph at one end of an edge
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Glyph {
    /// Prongs from the apex to the two outer feet and the middle foot
    CrowsFoot([Segment; 3]),
    Bar(Segment),
}

impl Glyph {
    pub fn segments(&self) -> &[Segment] {
        match self {
            Glyph::CrowsFoot(prongs) => prongs,
            Glyph::Bar(bar) => std::slice::from_ref(bar),
        }
    }
}

/// Everything needed to draw one edge
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeGeometry {
    pub line: Segment,
    pub source_glyph: Glyph,
    pub target_glyph: Glyph,
}

impl EdgeGeometry {
    /// SVG path data for the line and both glyphs
    pub fn to_svg_path(&self) -> String {
        std::iter::once(&self.line)
            .chain(self.source_glyph.segments())
            .chain(self.target_glyph.segments())
            .map(|s| {
                format!(
                    "M {:.2} {:.2} L {:.2} {:.2}",
                    s.from.x, s.from.y, s.to.x, s.to.y
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Midpoint of the connecting line, for labels
    pub fn label_position(&self) -> Vec2 {
        self.line.from.midpoint(self.line.to)
    }
}

/// Point where the ray from the rectangle's centre toward `toward` crosses
/// its boundary
///
/// `t` is the larger of `|dx| / half-width` and `|dy| / half-height`, so the
/// scaled direction lands exactly on the nearer rectangle side. Returns the
/// centre itself when `toward` coincides with it.
pub fn boundary_point(rect: &Rect, toward: Vec2) -> Vec2 {
    let d = toward.sub(rect.center);
    let half_w = rect.width / 2.0;
    let half_h = rect.height / 2.0;
    if half_w <= 0.0 || half_h <= 0.0 {
        return rect.center;
    }
    let t = (d.x.abs() / half_w).max(d.y.abs() / half_h);
    if t <= f64::EPSILON {
        return rect.center;
    }
    rect.center.add(d.scale(1.0 / t))
}

/// Glyph anchored at `tip`, with `outward` pointing away from the node
fn glyph(marker: EndMarker, tip: Vec2, outward: Vec2, style: &GlyphStyle) -> Glyph {
    let across = outward.perp();
    match marker {
        EndMarker::Many => {
            let apex = tip.add(outward.scale(style.crow_length));
            let spread = style.crow_length * style.crow_spread.tan();
            Glyph::CrowsFoot([
                Segment::new(apex, tip.add(across.scale(spread))),
                Segment::new(apex, tip),
                Segment::new(apex, tip.sub(across.scale(spread))),
            ])
        }
        EndMarker::One => {
            let center = tip.add(outward.scale(style.bar_offset));
            Glyph::Bar(Segment::new(
                center.add(across.scale(style.bar_half_length)),
                center.sub(across.scale(style.bar_half_length)),
            ))
        }
    }
}

/// Computes the line and glyphs for an edge between two node rectangles
///
/// `None` for self edges and coincident centres, which have no direction.
pub fn edge_geometry(
    source: &Rect,
    target: &Rect,
    edge: &DiagramEdge,
    style: &GlyphStyle,
) -> Option<EdgeGeometry> {
    let direction = target.center.sub(source.center);
    if direction.length() < 0.0001 {
        return None;
    }
    let direction = direction.normalize();

    let start = boundary_point(source, target.center);
    let end = boundary_point(target, source.center);
    if end.sub(start).length() < 0.0001 {
        // Overlapping rectangles
        return None;
    }

    let source_marker = edge.source_marker();
    let target_marker = edge.target_marker();
    let inset = |marker: EndMarker| match marker {
        EndMarker::One => style.line_inset,
        EndMarker::Many => 0.0,
    };

    Some(EdgeGeometry {
        line: Segment::new(
            start.add(direction.scale(inset(source_marker))),
            end.sub(direction.scale(inset(target_marker))),
        ),
        source_glyph: glyph(source_marker, start, direction, style),
        target_glyph: glyph(target_marker, end, direction.scale(-1.0), style),
    })
}
