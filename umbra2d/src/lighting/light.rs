use serde::{Deserialize, Serialize};

use crate::math::{Transform2D, Vec2};

/// Bitmask pairing lights with the casters they interact with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    /// Mask with only layer `index` set. Layers past 31 do not exist and
    /// give an empty mask.
    pub const fn bit(index: u32) -> Self {
        match 1u32.checked_shl(index) {
            Some(bit) => Self(bit),
            None => Self::NONE,
        }
    }

    /// True when the masks share at least one layer.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for LayerMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Shape of a light's contribution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Emits in all directions.
    Point,
    /// Emits a cone around `direction`.
    Spot {
        /// Normalized cone axis.
        direction: Vec2,
        /// Half-angle (radians) of the fully lit core.
        inner_angle: f32,
        /// Half-angle (radians) where the cone fades to zero.
        outer_angle: f32,
    },
}

/// A light submitted for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    /// Position of the light in world coordinates
    pub position: Vec2,
    /// Influence distance in world units
    pub radius: f32,
    /// Linear RGB, can exceed 1.0 for HDR
    pub color: [f32; 3],
    pub intensity: f32,
    /// Falloff curve (1.0 = linear, 2.0 = quadratic, higher = sharper falloff)
    pub falloff: f32,
    pub cast_shadows: bool,
    /// 0.0 = shadows fully lit, 1.0 = shadows fully dark.
    pub shadow_strength: f32,
    pub layer_mask: LayerMask,
}

impl Light {
    /// Create a point light (emits in all directions).
    pub fn point(position: Vec2, color: [f32; 3], intensity: f32, radius: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            radius,
            color,
            intensity,
            falloff: 2.0,
            cast_shadows: true,
            shadow_strength: 1.0,
            layer_mask: LayerMask::ALL,
        }
    }

    /// Create a spot light. Angles are cone half-angles in radians; the outer
    /// angle is raised to the inner one if given smaller.
    pub fn spot(
        position: Vec2,
        direction: Vec2,
        color: [f32; 3],
        intensity: f32,
        radius: f32,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        let inner_angle = inner_angle.max(0.0);
        Self {
            kind: LightKind::Spot {
                direction: direction.normalized(),
                inner_angle,
                outer_angle: outer_angle.max(inner_angle),
            },
            ..Self::point(position, color, intensity, radius)
        }
    }

    /// Set the falloff curve (1.0 = linear, 2.0 = quadratic).
    pub fn with_falloff(mut self, falloff: f32) -> Self {
        self.falloff = falloff;
        self
    }

    pub fn with_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    /// Set how dark this light's shadows are, clamped to `[0, 1]`.
    pub fn with_shadow_strength(mut self, strength: f32) -> Self {
        self.shadow_strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn with_layer_mask(mut self, mask: LayerMask) -> Self {
        self.layer_mask = mask;
        self
    }

    /// Lights with a non-positive radius or intensity add nothing to a frame.
    pub fn contributes(&self) -> bool {
        self.radius > 0.0 && self.intensity > 0.0
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::point(Vec2::ZERO, [1.0, 1.0, 1.0], 1.0, 100.0)
    }
}

/// Whether the last point of a caster connects back to the first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outline {
    Closed,
    Open,
}

/// Which edges of a caster may cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sides {
    /// Only edges whose outward normal faces the light.
    OneSided,
    /// Every edge, regardless of winding.
    TwoSided,
}

/// A polygon or polyline that blocks light for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowCaster {
    pub points: Vec<Vec2>,
    pub outline: Outline,
    pub sides: Sides,
    pub layer_mask: LayerMask,
}

impl ShadowCaster {
    /// Closed, one-sided outline. Either winding is accepted.
    pub fn polygon(points: impl Into<Vec<Vec2>>) -> Self {
        Self {
            points: points.into(),
            outline: Outline::Closed,
            sides: Sides::OneSided,
            layer_mask: LayerMask::ALL,
        }
    }

    /// Open chain; casts from both sides.
    pub fn polyline(points: impl Into<Vec<Vec2>>) -> Self {
        Self {
            points: points.into(),
            outline: Outline::Open,
            sides: Sides::TwoSided,
            layer_mask: LayerMask::ALL,
        }
    }

    /// Axis-aligned box centered on `center`, wound counter-clockwise.
    pub fn rectangle(center: Vec2, size: Vec2) -> Self {
        let h = size * 0.5;
        Self::polygon(vec![
            Vec2::new(center.x - h.x, center.y - h.y),
            Vec2::new(center.x + h.x, center.y - h.y),
            Vec2::new(center.x + h.x, center.y + h.y),
            Vec2::new(center.x - h.x, center.y + h.y),
        ])
    }

    pub fn two_sided(mut self) -> Self {
        self.sides = Sides::TwoSided;
        self
    }

    pub fn one_sided(mut self) -> Self {
        self.sides = Sides::OneSided;
        self
    }

    pub fn with_layer_mask(mut self, mask: LayerMask) -> Self {
        self.layer_mask = mask;
        self
    }

    /// Maps the outline from local space into the world.
    pub fn transformed(mut self, transform: &Transform2D) -> Self {
        for point in &mut self.points {
            *point = transform.transform_point(*point);
        }
        self
    }

    pub fn is_closed(&self) -> bool {
        self.outline == Outline::Closed
    }

    pub fn is_two_sided(&self) -> bool {
        self.sides == Sides::TwoSided
    }

    /// Number of edges described by the outline.
    pub fn edge_count(&self) -> usize {
        match (self.points.len(), self.outline) {
            (0 | 1, _) => 0,
            (n, Outline::Closed) => n,
            (n, Outline::Open) => n - 1,
        }
    }

    /// A caster needs at least one edge to block anything.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_masks_need_a_shared_bit() {
        let a = LayerMask::bit(0) | LayerMask::bit(3);
        assert!(a.intersects(LayerMask::bit(3)));
        assert!(!a.intersects(LayerMask::bit(1)));
        assert!(!LayerMask::NONE.intersects(LayerMask::ALL));
    }

    #[test]
    fn out_of_range_layer_is_empty() {
        assert_eq!(LayerMask::bit(31), LayerMask(0x8000_0000));
        assert_eq!(LayerMask::bit(32), LayerMask::NONE);
        assert_eq!(LayerMask::bit(u32::MAX), LayerMask::NONE);
    }

    #[test]
    fn non_positive_radius_or_intensity_does_not_contribute() {
        let light = Light::point(Vec2::ZERO, [1.0; 3], 1.0, 5.0);
        assert!(light.contributes());
        assert!(!Light { radius: 0.0, ..light }.contributes());
        assert!(!Light { intensity: -1.0, ..light }.contributes());
    }

    #[test]
    fn spot_light_normalizes_direction_and_orders_angles() {
        let light = Light::spot(Vec2::ZERO, Vec2::new(0.0, 3.0), [1.0; 3], 1.0, 5.0, 0.6, 0.2);
        match light.kind {
            LightKind::Spot {
                direction,
                inner_angle,
                outer_angle,
            } => {
                assert_eq!(direction, Vec2::new(0.0, 1.0));
                assert_eq!(inner_angle, 0.6);
                assert_eq!(outer_angle, 0.6);
            }
            LightKind::Point => panic!("expected a spot light"),
        }
    }

    #[test]
    fn shadow_strength_is_clamped() {
        let light = Light::default().with_shadow_strength(1.5);
        assert_eq!(light.shadow_strength, 1.0);
        let light = light.with_shadow_strength(-0.5);
        assert_eq!(light.shadow_strength, 0.0);
    }

    #[test]
    fn edge_count_depends_on_outline() {
        let points = vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)];
        assert_eq!(ShadowCaster::polygon(points.clone()).edge_count(), 3);
        assert_eq!(ShadowCaster::polyline(points).edge_count(), 2);
        assert_eq!(ShadowCaster::polygon(vec![Vec2::ZERO]).edge_count(), 0);
    }

    #[test]
    fn transformed_moves_every_point() {
        let caster = ShadowCaster::rectangle(Vec2::ZERO, Vec2::new(2.0, 2.0)).transformed(
            &Transform2D::new(Vec2::new(10.0, 5.0), Vec2::ONE, 0.0),
        );
        assert_eq!(caster.points[0], Vec2::new(9.0, 4.0));
        assert_eq!(caster.points[2], Vec2::new(11.0, 6.0));
    }
}
