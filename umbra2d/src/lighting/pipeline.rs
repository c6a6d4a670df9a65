//! Per-frame orchestration of the deferred lighting pass.
//!
//! ```text
//! begin_scene -> [external renderer draws unlit scene] -> submit_* -> end_scene
//! ```
//!
//! `end_scene` clears the light accumulation buffer to ambient, and for each
//! light builds shadow volumes into the stencil buffer, adds the light where
//! the stencil is clear, then multiplies scene color by the accumulated light
//! into the output target.

use glam::Mat4;

use crate::lighting::error::{contract_violation, LightingError};
use crate::lighting::geometry::{build_shadow_volume, is_caster_in_range, ShadowTriangles};
use crate::lighting::light::{Light, ShadowCaster};
use crate::lighting::scissor::compute_scissor_rect;
use crate::lighting::settings::LightingSettings;
use crate::math::Camera;
use crate::render::{
    CompositeTarget, Framebuffer, GraphicsStateSnapshot, LightingBackend, SceneRenderer,
    StencilTest,
};

/// Lifecycle of a [`LightingPipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// No GPU resources exist.
    Uninitialized,
    /// Resources exist, no scene is open.
    Initialized,
    /// Between `begin_scene` and `end_scene`.
    SceneOpen,
}

/// Where a scene is composited and how large it is.
#[derive(Clone, Debug)]
pub enum SceneOutput<F> {
    /// The default target (swapchain image) at an explicit size.
    Backbuffer { width: u32, height: u32 },
    /// An offscreen target; the size is taken from it.
    Framebuffer(F),
    /// The default target at the size used by the previous scene.
    PreviousSize,
}

/// Counters from the most recent `end_scene`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub lights_submitted: usize,
    pub lights_drawn: usize,
    /// Non-positive radius or intensity.
    pub lights_skipped: usize,
    /// Entirely outside the viewport.
    pub lights_culled: usize,
    pub casters_submitted: usize,
    pub shadow_triangles: usize,
}

/// Deferred 2D lighting with stencil shadow volumes.
///
/// Owns its backend and with it every GPU resource the pass needs. Resources
/// are released by [`shutdown`](Self::shutdown) or when the pipeline is dropped.
pub struct LightingPipeline<B: LightingBackend> {
    backend: B,
    state: PipelineState,
    /// Viewport of the current (or last) scene.
    viewport: (u32, u32),
    /// Size the offscreen targets were last created with.
    target_size: Option<(u32, u32)>,
    view_projection: Mat4,
    settings: LightingSettings,
    output: Option<B::Framebuffer>,
    snapshot: GraphicsStateSnapshot,
    lights: Vec<Light>,
    casters: Vec<ShadowCaster>,
    scratch: ShadowTriangles,
    stats: FrameStats,
}

impl<B: LightingBackend> LightingPipeline<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: PipelineState::Uninitialized,
            viewport: (0, 0),
            target_size: None,
            view_projection: Mat4::IDENTITY,
            settings: LightingSettings::default(),
            output: None,
            snapshot: GraphicsStateSnapshot::default(),
            lights: Vec::new(),
            casters: Vec::new(),
            scratch: ShadowTriangles::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    /// Settings of the open scene, or of the last one.
    pub fn settings(&self) -> &LightingSettings {
        &self.settings
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Compile programs and create fixed geometry. Calling it again is a no-op.
    pub fn init(&mut self) -> Result<(), LightingError> {
        if self.state != PipelineState::Uninitialized {
            return Ok(());
        }

        if let Err(err) = self.backend.create_resources() {
            log::error!("Lighting pipeline failed to initialize: {err}");
            self.backend.release_resources();
            return Err(err);
        }

        self.state = PipelineState::Initialized;
        log::debug!("Lighting pipeline initialized");
        Ok(())
    }

    /// Release every GPU resource. Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        match self.state {
            PipelineState::Uninitialized => return,
            PipelineState::SceneOpen => {
                log::warn!("Lighting pipeline shut down with a scene still open");
                self.reset_scene();
                self.backend.restore_state(&self.snapshot);
            }
            PipelineState::Initialized => {}
        }

        self.backend.release_resources();
        self.target_size = None;
        self.state = PipelineState::Uninitialized;
        log::debug!("Lighting pipeline shut down");
    }

    /// Open a scene and hand scene color to `renderer` for the unlit pass.
    ///
    /// Errors come from the backend (target allocation, clears). Calling this
    /// before `init` or while a scene is open is a caller bug.
    pub fn begin_scene<C, R>(
        &mut self,
        camera: &C,
        output: SceneOutput<B::Framebuffer>,
        settings: LightingSettings,
        renderer: &mut R,
    ) -> Result<(), LightingError>
    where
        C: Camera + ?Sized,
        R: SceneRenderer<B> + ?Sized,
    {
        match self.state {
            PipelineState::Uninitialized => {
                contract_violation!("begin_scene called before the lighting pipeline was initialized");
                return Ok(());
            }
            PipelineState::SceneOpen => {
                contract_violation!("begin_scene called while a lighting scene is already open");
                return Ok(());
            }
            PipelineState::Initialized => {}
        }

        self.snapshot = self.backend.capture_state();

        let (width, height) = match output {
            SceneOutput::Backbuffer { width, height } => (width, height),
            SceneOutput::Framebuffer(framebuffer) => {
                let size = (framebuffer.width(), framebuffer.height());
                self.output = Some(framebuffer);
                size
            }
            SceneOutput::PreviousSize => self.viewport,
        };
        self.viewport = (width, height);
        self.view_projection = camera.view_projection_matrix();
        self.settings = settings;
        self.lights.clear();
        self.casters.clear();

        if let Err(err) = self.prepare_targets() {
            self.output = None;
            self.backend.restore_state(&self.snapshot);
            return Err(err);
        }

        self.state = PipelineState::SceneOpen;
        renderer.begin_scene(&mut self.backend, self.view_projection);
        Ok(())
    }

    /// Queue a light for this scene. Submitting with no scene open is a
    /// caller bug; release builds drop the light.
    pub fn submit_light(&mut self, light: Light) {
        if self.state != PipelineState::SceneOpen {
            contract_violation!("submit_light called while no lighting scene is open");
            return;
        }
        self.lights.push(light);
    }

    /// Queue a shadow caster for this scene. Casters with fewer than two
    /// points are dropped. Submitting with no scene open is a caller bug.
    pub fn submit_shadow_caster(&mut self, caster: ShadowCaster) {
        if self.state != PipelineState::SceneOpen {
            contract_violation!("submit_shadow_caster called while no lighting scene is open");
            return;
        }
        if caster.is_degenerate() {
            log::debug!(
                "Dropping shadow caster with {} point(s)",
                caster.points.len()
            );
            return;
        }
        self.casters.push(caster);
    }

    /// Run the shadow and light passes, composite, and close the scene.
    ///
    /// The graphics state captured by `begin_scene` is restored even when the
    /// backend reports an error.
    pub fn end_scene<R>(&mut self, renderer: &mut R) -> Result<(), LightingError>
    where
        R: SceneRenderer<B> + ?Sized,
    {
        if self.state != PipelineState::SceneOpen {
            contract_violation!("end_scene called without a matching begin_scene");
            return Ok(());
        }

        let result = self.render_scene(renderer);

        self.reset_scene();
        self.backend.restore_state(&self.snapshot);
        self.state = PipelineState::Initialized;
        result
    }

    fn prepare_targets(&mut self) -> Result<(), LightingError> {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            log::warn!("Lighting scene opened with an empty {width}x{height} viewport");
            return Ok(());
        }

        if self.target_size != Some((width, height)) {
            log::debug!("Resizing lighting targets to {width}x{height}");
            self.target_size = None;
            self.backend.resize_targets(width, height)?;
            self.target_size = Some((width, height));
        }

        self.backend.clear_scene_color()
    }

    fn render_scene<R>(&mut self, renderer: &mut R) -> Result<(), LightingError>
    where
        R: SceneRenderer<B> + ?Sized,
    {
        let mut stats = FrameStats {
            lights_submitted: self.lights.len(),
            casters_submitted: self.casters.len(),
            ..FrameStats::default()
        };

        renderer.end_scene(&mut self.backend)?;
        self.backend.unbind_scene_color();

        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            self.stats = stats;
            return Ok(());
        }

        self.accumulate_lights(&mut stats);
        self.backend.end_light_accumulation()?;

        let target = match &self.output {
            Some(framebuffer) => CompositeTarget::Framebuffer(framebuffer),
            None => CompositeTarget::Backbuffer { width, height },
        };
        self.backend.composite(&target)?;

        log::trace!("Lighting frame: {stats:?}");
        self.stats = stats;
        Ok(())
    }

    fn accumulate_lights(&mut self, stats: &mut FrameStats) {
        let (width, height) = self.viewport;
        let shadows_enabled = self.settings.enable_shadows;

        self.backend
            .begin_light_accumulation(self.view_projection, self.settings.ambient_clear_color());

        for light in &self.lights {
            if !light.contributes() {
                stats.lights_skipped += 1;
                continue;
            }

            let Some(rect) = compute_scissor_rect(
                &self.view_projection,
                light.position,
                light.radius,
                width,
                height,
            ) else {
                stats.lights_culled += 1;
                continue;
            };

            self.backend.set_scissor(Some(rect));
            self.backend.clear_stencil();

            let mut shadowed = false;
            if shadows_enabled && light.cast_shadows {
                self.scratch.clear();
                for caster in self.casters.iter().filter(|c| is_caster_in_range(light, c)) {
                    build_shadow_volume(light, caster, &mut self.scratch);
                }

                if !self.scratch.is_empty() {
                    self.backend.draw_shadow_volume(&self.scratch);
                    stats.shadow_triangles += self.scratch.triangle_count();
                    shadowed = true;
                }
            }

            self.backend
                .draw_light(light, light.intensity, StencilTest::Unshadowed);

            // Partial shadows get a dimmer pass over the shadowed pixels.
            let strength = light.shadow_strength.clamp(0.0, 1.0);
            if shadowed && strength < 1.0 {
                let dimmed = light.intensity * (1.0 - strength);
                self.backend.draw_light(light, dimmed, StencilTest::Shadowed);
            }

            stats.lights_drawn += 1;
        }

        self.backend.set_scissor(None);
    }

    fn reset_scene(&mut self) {
        self.lights.clear();
        self.casters.clear();
        self.scratch.clear();
        self.output = None;
    }
}

impl<B: LightingBackend> Drop for LightingPipeline<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
