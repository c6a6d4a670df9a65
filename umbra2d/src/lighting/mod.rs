//! Deferred 2D lighting with dynamic stencil shadows.

mod error;
pub mod geometry;
mod light;
mod pipeline;
mod scissor;
mod settings;

pub use error::LightingError;
pub use geometry::{
    build_shadow_volume, is_caster_in_range, ShadowTriangles, SHADOW_EXTRUSION_SCALE,
};
pub use light::{LayerMask, Light, LightKind, Outline, ShadowCaster, Sides};
pub use pipeline::{FrameStats, LightingPipeline, PipelineState, SceneOutput};
pub use scissor::{compute_scissor_rect, ScissorRect};
pub use settings::LightingSettings;
