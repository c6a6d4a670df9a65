//! Umbra2D - deferred 2D lighting with dynamic stencil shadows.
//!
//! An external renderer draws the unlit scene into an offscreen target, then
//! [`LightingPipeline`] accumulates every submitted light (masked by shadow
//! volumes built from the submitted casters) and composites the result.

pub mod lighting;
pub mod math;
pub mod render;

pub use crate::lighting::{
    LayerMask, Light, LightKind, LightingError, LightingPipeline, LightingSettings,
    PipelineState, SceneOutput, ShadowCaster,
};
pub use crate::math::{Camera, Camera2D, Transform2D, Vec2};
pub use crate::render::{
    HeadlessBackend, LightingBackend, SceneRenderer, ShapeRenderer, WgpuBackend,
};
