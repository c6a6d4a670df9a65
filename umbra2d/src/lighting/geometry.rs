//! Shadow volume construction for a single light and caster.
//!
//! Everything here is pure CPU geometry: no GPU state, no allocation beyond
//! the caller's [`ShadowTriangles`] sink. Output triangles live in world
//! space and are consumed by the stencil pass of the light they were built
//! for.

use crate::lighting::light::{Light, ShadowCaster};
use crate::math::Vec2;

/// Shadow volumes reach this far past the light radius so the far edge of the
/// volume never lines up with the falloff boundary.
pub const SHADOW_EXTRUSION_SCALE: f32 = 1.1;

const EPSILON: f32 = 1e-6;

/// Append-only list of world-space triangles (stride 3).
///
/// [`build_shadow_volume`] only ever appends; callers reuse one sink across
/// casters and call [`clear`](Self::clear) when they are done with a light.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShadowTriangles {
    vertices: Vec<Vec2>,
}

impl ShadowTriangles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangles * 3),
        }
    }

    pub fn push_triangle(&mut self, a: Vec2, b: Vec2, c: Vec2) {
        self.vertices.extend_from_slice(&[a, b, c]);
    }

    /// Flat vertex list, three per triangle.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec2; 3]> + '_ {
        self.vertices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of vertices (three per triangle).
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }
}

/// Conservative reach test: can `caster` shadow anything inside `light`'s radius?
///
/// Uses the distance from the light to the caster's bounding box, so it may
/// report casters that are slightly out of reach but never misses one.
pub fn is_caster_in_range(light: &Light, caster: &ShadowCaster) -> bool {
    if !light.layer_mask.intersects(caster.layer_mask) {
        return false;
    }

    let Some((min, max)) = bounds(&caster.points) else {
        return false;
    };

    let closest = light.position.max(min).min(max);
    closest.distance(light.position) <= light.radius
}

/// Appends the shadow volume `caster` casts for `light` to `out`.
///
/// Degenerate input (too few points, zero-length edges, a light sitting on a
/// vertex) skips the offending element; this never fails.
pub fn build_shadow_volume(light: &Light, caster: &ShadowCaster, out: &mut ShadowTriangles) {
    let points = caster.points.as_slice();
    if points.len() < 2 || !light.layer_mask.intersects(caster.layer_mask) {
        return;
    }

    // A two-point "polygon" has no interior; cast it as a plain segment.
    let closed = caster.is_closed() && points.len() >= 3;
    let two_sided = caster.is_two_sided();
    let volume = VolumeBuilder {
        light: light.position,
        points,
        closed,
        two_sided,
        flip_normals: closed && !two_sided && signed_area(points) < 0.0,
        extrusion: light.radius * SHADOW_EXTRUSION_SCALE,
    };

    for index in 0..volume.edge_count() {
        if let Some(edge) = volume.edge(index).filter(|edge| edge.facing) {
            volume.plan(&edge).emit(light.position, out);
        }
    }

    volume.emit_silhouette_fins(out);
}

/// Shoelace area; negative for clockwise outlines.
pub fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let twice_area: f32 = (0..n)
        .map(|i| points[i].cross(points[(i + 1) % n]))
        .sum();
    twice_area * 0.5
}

fn bounds(points: &[Vec2]) -> Option<(Vec2, Vec2)> {
    let first = *points.first()?;
    Some(
        points
            .iter()
            .fold((first, first), |(min, max), &p| (min.min(p), max.max(p))),
    )
}

struct Edge {
    start: Vec2,
    end: Vec2,
    normal: Vec2,
    facing: bool,
}

/// How a single light-facing edge is turned into triangles.
enum EdgeVolume {
    /// The light sits on an endpoint.
    Skip,
    /// Radial extrusion forms a simple quad.
    Quad {
        p0: Vec2,
        p1: Vec2,
        p0e: Vec2,
        p1e: Vec2,
    },
    /// Radial quad would self-intersect; cover the whole wedge instead.
    Fan {
        p0: Vec2,
        p1: Vec2,
        p0e: Vec2,
        p1e: Vec2,
    },
    /// The edge spans more than a quarter turn as seen from the light.
    Divergent {
        p0: Vec2,
        p1: Vec2,
        p0e: Vec2,
        p1e: Vec2,
        p0n: Vec2,
        p1n: Vec2,
    },
}

impl EdgeVolume {
    fn emit(&self, light: Vec2, out: &mut ShadowTriangles) {
        match *self {
            EdgeVolume::Skip => {}
            EdgeVolume::Quad { p0, p1, p0e, p1e } => {
                out.push_triangle(p0, p1, p1e);
                out.push_triangle(p0, p1e, p0e);
            }
            EdgeVolume::Fan { p0, p1, p0e, p1e } => {
                out.push_triangle(light, p0, p0e);
                out.push_triangle(light, p1, p1e);
                out.push_triangle(light, p0, p1);
                out.push_triangle(p0, p1, p0e);
                out.push_triangle(p1, p1e, p0e);
            }
            EdgeVolume::Divergent {
                p0,
                p1,
                p0e,
                p1e,
                p0n,
                p1n,
            } => {
                out.push_triangle(p0, p1, p1n);
                out.push_triangle(p0, p1n, p0n);
                out.push_triangle(p0, p0n, p0e);
                out.push_triangle(p1, p1e, p1n);
                out.push_triangle(p0n, p1n, p0e);
                out.push_triangle(p1n, p1e, p0e);
            }
        }
    }
}

struct VolumeBuilder<'a> {
    light: Vec2,
    points: &'a [Vec2],
    closed: bool,
    two_sided: bool,
    flip_normals: bool,
    extrusion: f32,
}

impl VolumeBuilder<'_> {
    fn edge_count(&self) -> usize {
        if self.closed {
            self.points.len()
        } else {
            self.points.len() - 1
        }
    }

    /// Zero-length edges have no normal and are reported as `None`.
    fn edge(&self, index: usize) -> Option<Edge> {
        let start = self.points[index];
        let end = self.points[(index + 1) % self.points.len()];
        let delta = end - start;
        let length = delta.length();
        if length <= EPSILON {
            return None;
        }

        let dir = delta / length;
        let mut normal = Vec2::new(dir.y, -dir.x);
        if self.flip_normals {
            normal = -normal;
        }

        let facing = self.two_sided || normal.dot(self.light - start) > 0.0;
        Some(Edge {
            start,
            end,
            normal,
            facing,
        })
    }

    fn is_facing(&self, index: usize) -> bool {
        self.edge(index).is_some_and(|edge| edge.facing)
    }

    /// Pushes `point` away from the light by the extrusion distance.
    fn extrude(&self, point: Vec2) -> Option<Vec2> {
        let to_point = point - self.light;
        let length = to_point.length();
        if length <= EPSILON {
            return None;
        }
        Some(point + to_point / length * self.extrusion)
    }

    fn plan(&self, edge: &Edge) -> EdgeVolume {
        let (p0, p1) = (edge.start, edge.end);
        let (Some(p0e), Some(p1e)) = (self.extrude(p0), self.extrude(p1)) else {
            return EdgeVolume::Skip;
        };

        let radial0 = (p0 - self.light).normalized();
        let radial1 = (p1 - self.light).normalized();

        if radial0.dot(radial1) >= 0.0 {
            let along = p1 - p0;
            let side0 = along.cross(p0e - p0);
            let side1 = along.cross(p1e - p0);
            if side0 * side1 > 0.0 {
                EdgeVolume::Quad { p0, p1, p0e, p1e }
            } else {
                EdgeVolume::Fan { p0, p1, p0e, p1e }
            }
        } else {
            let away = if edge.normal.dot(self.light - p0) > 0.0 {
                -edge.normal
            } else {
                edge.normal
            };
            EdgeVolume::Divergent {
                p0,
                p1,
                p0e,
                p1e,
                p0n: p0 + away * self.extrusion,
                p1n: p1 + away * self.extrusion,
            }
        }
    }

    /// Closes the gap at vertices where a facing edge meets a non-facing one.
    ///
    /// A plain radial quad already contains the fin triangle, so fins are only
    /// emitted next to fan, divergent, or skipped edges.
    fn emit_silhouette_fins(&self, out: &mut ShadowTriangles) {
        let n = self.points.len();
        let edge_count = self.edge_count();
        // Open chains have no edge before the first vertex or after the last.
        let vertices = if self.closed { 0..n } else { 1..n - 1 };

        for vertex in vertices {
            let prev_edge = if vertex == 0 { edge_count - 1 } else { vertex - 1 };
            let next_edge = vertex;

            let prev_facing = self.is_facing(prev_edge);
            let next_facing = self.is_facing(next_edge);
            if prev_facing == next_facing {
                continue;
            }

            let (facing_edge, adjacent) = if next_facing {
                (next_edge, (vertex + 1) % n)
            } else {
                (prev_edge, prev_edge)
            };

            let already_covered = self
                .edge(facing_edge)
                .is_some_and(|edge| matches!(self.plan(&edge), EdgeVolume::Quad { .. }));
            if already_covered {
                continue;
            }

            let point = self.points[vertex];
            let (Some(point_e), Some(adjacent_e)) =
                (self.extrude(point), self.extrude(self.points[adjacent]))
            else {
                continue;
            };

            let winding = (point_e - point).cross(adjacent_e - point);
            if winding.abs() <= EPSILON {
                continue;
            }
            if winding > 0.0 {
                out.push_triangle(point, point_e, adjacent_e);
            } else {
                out.push_triangle(point, adjacent_e, point_e);
            }
        }
    }
}
