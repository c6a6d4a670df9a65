//! The graphics API surface the lighting pipeline drives.
//!
//! [`LightingPipeline`](crate::lighting::LightingPipeline) only talks to the
//! GPU through [`LightingBackend`], so the same orchestration runs against
//! wgpu or the recording [`HeadlessBackend`](crate::render::HeadlessBackend).

use glam::Mat4;

use crate::lighting::{Light, LightingError, ScissorRect, ShadowTriangles};

/// An offscreen color target the lighting output can be composited into.
pub trait Framebuffer {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Blend state of the bound program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Disabled,
    Alpha,
    /// `ONE, ONE` accumulation.
    Additive,
}

/// Which stencil value a light draw is restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilTest {
    /// Stencil == 0: pixels no shadow volume covered.
    Unshadowed,
    /// Stencil == 1: pixels inside a shadow volume.
    Shadowed,
}

impl StencilTest {
    pub fn reference(self) -> u32 {
        match self {
            StencilTest::Unshadowed => 0,
            StencilTest::Shadowed => 1,
        }
    }
}

/// Stencil state of the bound program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilMode {
    Disabled,
    /// Always pass, replace with the given reference.
    Write(u32),
    Test(StencilTest),
}

/// Render target currently bound for drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetBinding {
    Backbuffer,
    SceneColor,
    LightAccumulation,
    Framebuffer,
}

/// GPU program currently bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    Light,
    Shadow,
    Composite,
    /// Anything not owned by the lighting pipeline.
    External,
}

/// Every piece of mutable graphics state the lighting pass touches.
///
/// Captured when a scene opens and restored when it ends so the lighting
/// pass leaves no trace on the rest of the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphicsStateSnapshot {
    pub blend: BlendMode,
    pub depth_test: bool,
    pub stencil: StencilMode,
    pub scissor: Option<ScissorRect>,
    pub color_writes: bool,
    pub target: TargetBinding,
    pub viewport: (u32, u32),
    pub program: Option<Program>,
}

impl Default for GraphicsStateSnapshot {
    fn default() -> Self {
        Self {
            blend: BlendMode::Alpha,
            depth_test: false,
            stencil: StencilMode::Disabled,
            scissor: None,
            color_writes: true,
            target: TargetBinding::Backbuffer,
            viewport: (0, 0),
            program: None,
        }
    }
}

/// Where the composite pass writes the lit image.
#[derive(Debug)]
pub enum CompositeTarget<'a, F> {
    Backbuffer { width: u32, height: u32 },
    Framebuffer(&'a F),
}

impl<F: Framebuffer> CompositeTarget<'_, F> {
    pub fn size(&self) -> (u32, u32) {
        match self {
            CompositeTarget::Backbuffer { width, height } => (*width, *height),
            CompositeTarget::Framebuffer(fb) => (fb.width(), fb.height()),
        }
    }
}

/// GPU operations the lighting pipeline is built from.
///
/// Calls arrive in a fixed order each frame:
/// `clear_scene_color`, the external renderer, `unbind_scene_color`,
/// `begin_light_accumulation`, per light `set_scissor` / `clear_stencil` /
/// `draw_shadow_volume` / `draw_light`, `end_light_accumulation`, `composite`.
pub trait LightingBackend {
    type Framebuffer: Framebuffer + Clone;

    /// Compile the light, shadow and composite programs and create the fixed
    /// quad geometry.
    fn create_resources(&mut self) -> Result<(), LightingError>;

    /// Drop every GPU object created by `create_resources` and `resize_targets`.
    fn release_resources(&mut self);

    fn capture_state(&self) -> GraphicsStateSnapshot;

    fn restore_state(&mut self, snapshot: &GraphicsStateSnapshot);

    /// (Re)create the scene color and light accumulation targets.
    fn resize_targets(&mut self, width: u32, height: u32) -> Result<(), LightingError>;

    /// Clear scene color to transparent black and bind it for the external renderer.
    fn clear_scene_color(&mut self) -> Result<(), LightingError>;

    fn unbind_scene_color(&mut self);

    /// Bind light accumulation, clear it to `clear_color`, enable additive blending.
    fn begin_light_accumulation(&mut self, view_projection: Mat4, clear_color: [f32; 3]);

    /// Restrict following draws to `rect`, or lift the restriction.
    fn set_scissor(&mut self, rect: Option<ScissorRect>);

    /// Reset the stencil to zero inside the current scissor.
    fn clear_stencil(&mut self);

    /// Mark the covered pixels with stencil value 1, writing no color.
    fn draw_shadow_volume(&mut self, triangles: &ShadowTriangles);

    /// Draw `light` additively with `intensity`, where the stencil passes `test`.
    fn draw_light(&mut self, light: &Light, intensity: f32, test: StencilTest);

    fn end_light_accumulation(&mut self) -> Result<(), LightingError>;

    /// Multiply scene color by light accumulation into `target`.
    fn composite(
        &mut self,
        target: &CompositeTarget<'_, Self::Framebuffer>,
    ) -> Result<(), LightingError>;
}

/// Draws the unlit scene into scene color while a lighting scene is open.
pub trait SceneRenderer<B: LightingBackend> {
    fn begin_scene(&mut self, backend: &mut B, view_projection: Mat4);

    fn end_scene(&mut self, backend: &mut B) -> Result<(), LightingError>;
}
