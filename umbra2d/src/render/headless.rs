use glam::Mat4;

use crate::lighting::{Light, LightingError, ScissorRect, ShadowTriangles};
use crate::math::Vec2;
use crate::render::backend::{
    BlendMode, CompositeTarget, Framebuffer, GraphicsStateSnapshot, LightingBackend, Program,
    StencilMode, StencilTest, TargetBinding,
};

/// Offscreen target of the [`HeadlessBackend`]; only its size matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessFramebuffer {
    pub width: u32,
    pub height: u32,
}

impl HeadlessFramebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Framebuffer for HeadlessFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// One call received by the [`HeadlessBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCommand {
    CreateResources,
    ReleaseResources,
    ResizeTargets { width: u32, height: u32 },
    ClearSceneColor,
    UnbindSceneColor,
    BeginLightAccumulation { clear_color: [f32; 3] },
    SetScissor(Option<ScissorRect>),
    ClearStencil,
    DrawShadowVolume { vertices: Vec<Vec2> },
    DrawLight {
        position: Vec2,
        intensity: f32,
        test: StencilTest,
    },
    EndLightAccumulation,
    Composite {
        target: TargetBinding,
        width: u32,
        height: u32,
    },
    RestoreState,
}

/// Backend that records commands and tracks graphics state without a GPU.
///
/// Useful for tests and for running the lighting pass headless.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    commands: Vec<BackendCommand>,
    state: GraphicsStateSnapshot,
    resources: bool,
    targets: Option<(u32, u32)>,
    failing_program: Option<&'static str>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_resources` fail as if `program` did not compile.
    pub fn with_shader_failure(mut self, program: &'static str) -> Self {
        self.failing_program = Some(program);
        self
    }

    /// Start from a specific graphics state, as if another renderer set it.
    pub fn with_state(mut self, state: GraphicsStateSnapshot) -> Self {
        self.state = state;
        self
    }

    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn has_resources(&self) -> bool {
        self.resources
    }

    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.targets
    }

    /// Current state, as a real context would report it.
    pub fn state(&self) -> &GraphicsStateSnapshot {
        &self.state
    }

    /// Mutable access so tests can play the part of an external renderer.
    pub fn state_mut(&mut self) -> &mut GraphicsStateSnapshot {
        &mut self.state
    }
}

impl LightingBackend for HeadlessBackend {
    type Framebuffer = HeadlessFramebuffer;

    fn create_resources(&mut self) -> Result<(), LightingError> {
        if let Some(program) = self.failing_program {
            return Err(LightingError::ShaderCompilation {
                program,
                message: "rejected by headless backend".into(),
            });
        }
        self.resources = true;
        self.commands.push(BackendCommand::CreateResources);
        Ok(())
    }

    fn release_resources(&mut self) {
        self.resources = false;
        self.targets = None;
        self.commands.push(BackendCommand::ReleaseResources);
    }

    fn capture_state(&self) -> GraphicsStateSnapshot {
        self.state
    }

    fn restore_state(&mut self, snapshot: &GraphicsStateSnapshot) {
        self.state = *snapshot;
        self.commands.push(BackendCommand::RestoreState);
    }

    fn resize_targets(&mut self, width: u32, height: u32) -> Result<(), LightingError> {
        if !self.resources {
            return Err(LightingError::MissingTarget("lighting resources"));
        }
        self.targets = Some((width, height));
        self.commands
            .push(BackendCommand::ResizeTargets { width, height });
        Ok(())
    }

    fn clear_scene_color(&mut self) -> Result<(), LightingError> {
        let (width, height) = self
            .targets
            .ok_or(LightingError::MissingTarget("scene color"))?;
        self.state.target = TargetBinding::SceneColor;
        self.state.viewport = (width, height);
        self.commands.push(BackendCommand::ClearSceneColor);
        Ok(())
    }

    fn unbind_scene_color(&mut self) {
        self.state.target = TargetBinding::Backbuffer;
        self.commands.push(BackendCommand::UnbindSceneColor);
    }

    fn begin_light_accumulation(&mut self, _view_projection: Mat4, clear_color: [f32; 3]) {
        self.state.target = TargetBinding::LightAccumulation;
        self.state.blend = BlendMode::Additive;
        self.state.depth_test = false;
        self.commands
            .push(BackendCommand::BeginLightAccumulation { clear_color });
    }

    fn set_scissor(&mut self, rect: Option<ScissorRect>) {
        self.state.scissor = rect;
        self.commands.push(BackendCommand::SetScissor(rect));
    }

    fn clear_stencil(&mut self) {
        self.commands.push(BackendCommand::ClearStencil);
    }

    fn draw_shadow_volume(&mut self, triangles: &ShadowTriangles) {
        self.state.program = Some(Program::Shadow);
        self.state.stencil = StencilMode::Write(1);
        self.state.color_writes = false;
        self.commands.push(BackendCommand::DrawShadowVolume {
            vertices: triangles.vertices().to_vec(),
        });
    }

    fn draw_light(&mut self, light: &Light, intensity: f32, test: StencilTest) {
        self.state.program = Some(Program::Light);
        self.state.stencil = StencilMode::Test(test);
        self.state.color_writes = true;
        self.commands.push(BackendCommand::DrawLight {
            position: light.position,
            intensity,
            test,
        });
    }

    fn end_light_accumulation(&mut self) -> Result<(), LightingError> {
        self.state.stencil = StencilMode::Disabled;
        self.commands.push(BackendCommand::EndLightAccumulation);
        Ok(())
    }

    fn composite(
        &mut self,
        target: &CompositeTarget<'_, HeadlessFramebuffer>,
    ) -> Result<(), LightingError> {
        let (width, height) = target.size();
        let binding = match target {
            CompositeTarget::Backbuffer { .. } => TargetBinding::Backbuffer,
            CompositeTarget::Framebuffer(_) => TargetBinding::Framebuffer,
        };
        self.state.target = binding;
        self.state.blend = BlendMode::Disabled;
        self.state.depth_test = false;
        self.state.program = Some(Program::Composite);
        self.state.viewport = (width, height);
        self.commands.push(BackendCommand::Composite {
            target: binding,
            width,
            height,
        });
        Ok(())
    }
}
