use glam::{Mat4, Vec2 as GlamVec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// 2D vector type used throughout Umbra2D.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the squared length of the vector (faster than `length()`).
    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len == 0.0 {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Computes the dot product of two vectors.
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Z component of the 3D cross product of `self` and `rhs`.
    ///
    /// Positive when `rhs` lies counter-clockwise from `self`.
    pub fn cross(self, rhs: Self) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    /// Rotates the vector by 90 degrees counter-clockwise.
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Computes the distance between two points.
    pub fn distance(self, rhs: Self) -> f32 {
        (self - rhs).length()
    }

    /// Computes the squared distance between two points (faster than `distance()`).
    pub fn distance_squared(self, rhs: Self) -> f32 {
        (self - rhs).length_squared()
    }

    /// Creates a unit vector pointing in the given direction (angle in radians).
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// Returns a vector with component-wise minimum values.
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y))
    }

    /// Returns a vector with component-wise maximum values.
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y))
    }

    pub fn to_glam(&self) -> GlamVec2 {
        GlamVec2::new(self.x, self.y)
    }

    pub fn to_array(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from(value: (f32, f32)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

impl From<GlamVec2> for Vec2 {
    fn from(value: GlamVec2) -> Self {
        Self::new(value.x, value.y)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Div<f32> for Vec2 {
    type Output = Self;

    fn div(self, rhs: f32) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// Transform describing 2D position, scale, and rotation.
///
/// Used to place local-space occluder outlines into the world before they
/// are submitted as shadow casters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation in radians around the Z axis.
    pub rotation: f32,
}

impl Transform2D {
    pub fn new(position: Vec2, scale: Vec2, rotation: f32) -> Self {
        Self {
            position,
            scale,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(Vec3::new(self.position.x, self.position.y, 0.0));
        let rotation = Mat4::from_rotation_z(self.rotation);
        let scale = Mat4::from_scale(Vec3::new(self.scale.x, self.scale.y, 1.0));

        translation * rotation * scale
    }

    /// Maps a local-space point into world space (scale, then rotate, then translate).
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        let world = self.to_matrix() * Vec4::new(point.x, point.y, 0.0, 1.0);
        Vec2::new(world.x, world.y)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Anything that can provide a view-projection matrix for a frame.
pub trait Camera {
    fn view_projection_matrix(&self) -> Mat4;
}

impl Camera for Mat4 {
    fn view_projection_matrix(&self) -> Mat4 {
        *self
    }
}

/// Centered orthographic camera with a y-up world.
///
/// `half_extents` is half of the visible world region at zoom 1.0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
    pub half_extents: Vec2,
}

impl Camera2D {
    pub fn new(position: Vec2, half_extents: Vec2) -> Self {
        Self {
            position,
            zoom: 1.0,
            half_extents,
        }
    }

    /// Camera showing one world unit per pixel at zoom 1.0.
    pub fn from_viewport(position: Vec2, width: u32, height: u32) -> Self {
        Self::new(position, Vec2::new(width as f32 * 0.5, height as f32 * 0.5))
    }

    pub fn view_projection(&self) -> Mat4 {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        let hx = self.half_extents.x / zoom;
        let hy = self.half_extents.y / zoom;
        let projection = Mat4::orthographic_rh_gl(-hx, hx, -hy, hy, -1.0, 1.0);

        let translation =
            Mat4::from_translation(Vec3::new(-self.position.x, -self.position.y, 0.0));

        projection * translation
    }

    /// World-space bounds of the visible region as `(min, max)`.
    pub fn visible_bounds(&self) -> (Vec2, Vec2) {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        let half = self.half_extents / zoom;
        (self.position - half, self.position + half)
    }
}

impl Camera for Camera2D {
    fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection()
    }
}

impl Default for Camera2D {
    fn default() -> Self {
        Self::new(Vec2::ZERO, Vec2::new(640.0, 360.0))
    }
}
