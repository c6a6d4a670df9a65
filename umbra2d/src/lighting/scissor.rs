use glam::{Mat4, Vec4};

use crate::math::Vec2;

/// Pixel rectangle with a bottom-left origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whole-viewport rectangle.
    pub fn full(viewport_width: u32, viewport_height: u32) -> Self {
        Self::new(0, 0, viewport_width, viewport_height)
    }

    pub fn contains(&self, other: &ScissorRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Same rectangle measured from the top edge, for APIs whose framebuffer
    /// origin is the top-left corner.
    pub fn to_top_left(&self, viewport_height: u32) -> ScissorRect {
        let top = viewport_height.saturating_sub(self.y + self.height);
        ScissorRect::new(self.x, top, self.width, self.height)
    }
}

/// Screen-space rectangle covering a light's world-space bounding square.
///
/// Returns `None` when the light cannot touch any pixel: non-positive radius,
/// an empty viewport, or a rectangle that lies entirely off screen. The
/// result is conservative; it bounds the square, not the circle.
pub fn compute_scissor_rect(
    view_projection: &Mat4,
    position: Vec2,
    radius: f32,
    viewport_width: u32,
    viewport_height: u32,
) -> Option<ScissorRect> {
    if radius <= 0.0 || viewport_width == 0 || viewport_height == 0 {
        return None;
    }

    let (w, h) = (viewport_width as f32, viewport_height as f32);
    let corners = [
        Vec2::new(position.x - radius, position.y - radius),
        Vec2::new(position.x + radius, position.y - radius),
        Vec2::new(position.x + radius, position.y + radius),
        Vec2::new(position.x - radius, position.y + radius),
    ];

    let mut min = Vec2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for corner in corners {
        let clip = *view_projection * Vec4::new(corner.x, corner.y, 0.0, 1.0);
        if clip.w <= 0.0 {
            // Behind the eye; the projected box is unbounded.
            return Some(ScissorRect::full(viewport_width, viewport_height));
        }

        let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);
        let pixel = Vec2::new((ndc.x * 0.5 + 0.5) * w, (ndc.y * 0.5 + 0.5) * h);
        min = min.min(pixel);
        max = max.max(pixel);
    }

    let x0 = min.x.floor().clamp(0.0, w);
    let y0 = min.y.floor().clamp(0.0, h);
    let x1 = max.x.ceil().clamp(0.0, w);
    let y1 = max.y.ceil().clamp(0.0, h);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(ScissorRect::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}
