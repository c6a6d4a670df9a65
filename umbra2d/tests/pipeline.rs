use glam::Mat4;
use umbra2d::lighting::{
    FrameStats, LayerMask, Light, LightingError, LightingPipeline, LightingSettings,
    PipelineState, SceneOutput, ScissorRect, ShadowCaster,
};
use umbra2d::math::Vec2;
use umbra2d::render::{
    BackendCommand, BlendMode, GraphicsStateSnapshot, HeadlessBackend, HeadlessFramebuffer,
    LightingBackend, Program, SceneRenderer, StencilMode, StencilTest, TargetBinding,
};

/// Scene renderer that only counts the calls it receives.
#[derive(Default)]
struct RecordingRenderer {
    begun: usize,
    ended: usize,
    view_projection: Option<Mat4>,
    target_during_scene: Option<TargetBinding>,
    fail_with: Option<&'static str>,
}

impl SceneRenderer<HeadlessBackend> for RecordingRenderer {
    fn begin_scene(&mut self, backend: &mut HeadlessBackend, view_projection: Mat4) {
        self.begun += 1;
        self.view_projection = Some(view_projection);
        self.target_during_scene = Some(backend.state().target);
    }

    fn end_scene(&mut self, _backend: &mut HeadlessBackend) -> Result<(), LightingError> {
        self.ended += 1;
        match self.fail_with {
            Some(reason) => Err(LightingError::Backend(reason.into())),
            None => Ok(()),
        }
    }
}

const VIEWPORT: SceneOutput<HeadlessFramebuffer> = SceneOutput::Backbuffer {
    width: 100,
    height: 100,
};

fn white_light(position: Vec2, radius: f32) -> Light {
    Light::point(position, [1.0, 1.0, 1.0], 1.0, radius)
}

/// Small square to the right of the origin, inside a 0.5-radius light at the origin.
fn blocker() -> ShadowCaster {
    ShadowCaster::rectangle(Vec2::new(0.2, 0.0), Vec2::new(0.1, 0.1))
}

fn initialized() -> LightingPipeline<HeadlessBackend> {
    let mut pipeline = LightingPipeline::new(HeadlessBackend::new());
    pipeline.init().unwrap();
    pipeline.backend_mut().take_commands();
    pipeline
}

fn run_frame(
    pipeline: &mut LightingPipeline<HeadlessBackend>,
    settings: LightingSettings,
    lights: Vec<Light>,
    casters: Vec<ShadowCaster>,
) -> Vec<BackendCommand> {
    let mut renderer = RecordingRenderer::default();
    pipeline
        .begin_scene(&Mat4::IDENTITY, VIEWPORT, settings, &mut renderer)
        .unwrap();
    for light in lights {
        pipeline.submit_light(light);
    }
    for caster in casters {
        pipeline.submit_shadow_caster(caster);
    }
    pipeline.end_scene(&mut renderer).unwrap();
    pipeline.backend_mut().take_commands()
}

fn light_draws(commands: &[BackendCommand]) -> Vec<(f32, StencilTest)> {
    commands
        .iter()
        .filter_map(|c| match c {
            BackendCommand::DrawLight {
                intensity, test, ..
            } => Some((*intensity, *test)),
            _ => None,
        })
        .collect()
}

fn shadow_draws(commands: &[BackendCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, BackendCommand::DrawShadowVolume { .. }))
        .count()
}

#[test]
fn init_is_idempotent() {
    let mut pipeline = LightingPipeline::new(HeadlessBackend::new());
    assert_eq!(pipeline.state(), PipelineState::Uninitialized);

    pipeline.init().unwrap();
    pipeline.init().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Initialized);
    assert_eq!(
        pipeline.backend().commands(),
        &[BackendCommand::CreateResources]
    );
}

#[test]
fn shader_failure_leaves_pipeline_uninitialized() {
    let mut pipeline = LightingPipeline::new(HeadlessBackend::new().with_shader_failure("shadow"));

    let err = pipeline.init().unwrap_err();
    assert!(matches!(
        err,
        LightingError::ShaderCompilation {
            program: "shadow",
            ..
        }
    ));
    assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    assert!(!pipeline.backend().has_resources());
}

#[test]
fn frame_issues_commands_in_order() {
    let mut pipeline = initialized();
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5)],
        vec![blocker()],
    );

    let scissor = match commands[4] {
        BackendCommand::SetScissor(Some(rect)) => rect,
        ref other => panic!("expected a scissor, got {other:?}"),
    };
    assert!(scissor.x <= 25 && scissor.x + scissor.width >= 75);
    assert!(scissor.y <= 25 && scissor.y + scissor.height >= 75);

    let kinds: Vec<&str> = commands
        .iter()
        .map(|c| match c {
            BackendCommand::ResizeTargets { .. } => "resize",
            BackendCommand::ClearSceneColor => "clear-scene",
            BackendCommand::UnbindSceneColor => "unbind-scene",
            BackendCommand::BeginLightAccumulation { .. } => "begin-light",
            BackendCommand::SetScissor(Some(_)) => "scissor",
            BackendCommand::SetScissor(None) => "no-scissor",
            BackendCommand::ClearStencil => "clear-stencil",
            BackendCommand::DrawShadowVolume { .. } => "shadow",
            BackendCommand::DrawLight { .. } => "light",
            BackendCommand::EndLightAccumulation => "end-light",
            BackendCommand::Composite { .. } => "composite",
            BackendCommand::RestoreState => "restore",
            BackendCommand::CreateResources | BackendCommand::ReleaseResources => "resources",
        })
        .collect();

    assert_eq!(
        kinds,
        [
            "resize",
            "clear-scene",
            "unbind-scene",
            "begin-light",
            "scissor",
            "clear-stencil",
            "shadow",
            "light",
            "no-scissor",
            "end-light",
            "composite",
            "restore",
        ]
    );
    assert_eq!(
        commands[10],
        BackendCommand::Composite {
            target: TargetBinding::Backbuffer,
            width: 100,
            height: 100,
        }
    );
}

#[test]
fn renderer_draws_into_scene_color_with_the_camera_matrix() {
    let mut pipeline = initialized();
    let mut renderer = RecordingRenderer::default();
    let camera = Mat4::from_scale(glam::Vec3::new(0.5, 0.5, 1.0));

    pipeline
        .begin_scene(&camera, VIEWPORT, LightingSettings::default(), &mut renderer)
        .unwrap();
    assert_eq!(renderer.begun, 1);
    assert_eq!(renderer.ended, 0);
    assert_eq!(renderer.view_projection, Some(camera));
    assert_eq!(renderer.target_during_scene, Some(TargetBinding::SceneColor));

    pipeline.end_scene(&mut renderer).unwrap();
    assert_eq!(renderer.ended, 1);
}

#[test]
fn light_accumulation_starts_from_ambient() {
    let mut pipeline = initialized();
    let settings = LightingSettings {
        ambient_color: [1.0, 0.5, 0.25],
        ambient_intensity: 0.5,
        enable_shadows: true,
    };
    let commands = run_frame(&mut pipeline, settings, vec![], vec![]);

    let clear = commands.iter().find_map(|c| match c {
        BackendCommand::BeginLightAccumulation { clear_color } => Some(*clear_color),
        _ => None,
    });
    assert_eq!(clear, Some([0.5, 0.25, 0.125]));
    assert!(light_draws(&commands).is_empty());
}

#[test]
fn lights_outside_the_viewport_are_culled() {
    let mut pipeline = initialized();
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![
            white_light(Vec2::new(5.0, 5.0), 1.0),
            white_light(Vec2::ZERO, 0.5),
        ],
        vec![],
    );

    assert_eq!(light_draws(&commands).len(), 1);
    let stats = pipeline.frame_stats();
    assert_eq!(stats.lights_submitted, 2);
    assert_eq!(stats.lights_culled, 1);
    assert_eq!(stats.lights_drawn, 1);
}

#[test]
fn lights_without_contribution_are_skipped() {
    let mut pipeline = initialized();
    let dark = Light::point(Vec2::ZERO, [1.0; 3], 0.0, 0.5);
    let tiny = white_light(Vec2::ZERO, 0.0);
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![dark, tiny],
        vec![],
    );

    assert!(light_draws(&commands).is_empty());
    assert_eq!(
        pipeline.frame_stats(),
        FrameStats {
            lights_submitted: 2,
            lights_skipped: 2,
            ..FrameStats::default()
        }
    );
}

#[test]
fn each_light_clears_the_stencil_inside_its_own_scissor() {
    let mut pipeline = initialized();
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![
            white_light(Vec2::new(-0.5, 0.0), 0.2),
            white_light(Vec2::new(0.5, 0.0), 0.2),
        ],
        vec![],
    );

    let rects: Vec<ScissorRect> = commands
        .windows(2)
        .filter_map(|pair| match pair {
            [BackendCommand::SetScissor(Some(rect)), BackendCommand::ClearStencil] => Some(*rect),
            _ => None,
        })
        .collect();
    assert_eq!(rects.len(), 2);
    assert!(rects[0].x + rects[0].width <= rects[1].x);
}

#[test]
fn shadows_can_be_disabled_globally() {
    let mut pipeline = initialized();
    let settings = LightingSettings {
        enable_shadows: false,
        ..LightingSettings::default()
    };
    let commands = run_frame(
        &mut pipeline,
        settings,
        vec![white_light(Vec2::ZERO, 0.5)],
        vec![blocker()],
    );

    assert_eq!(shadow_draws(&commands), 0);
    assert_eq!(light_draws(&commands), [(1.0, StencilTest::Unshadowed)]);
}

#[test]
fn shadows_can_be_disabled_per_light() {
    let mut pipeline = initialized();
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5).with_shadows(false)],
        vec![blocker()],
    );

    assert_eq!(shadow_draws(&commands), 0);
    assert_eq!(light_draws(&commands).len(), 1);
}

#[test]
fn casters_out_of_range_or_on_other_layers_cast_nothing() {
    let mut pipeline = initialized();
    let far = ShadowCaster::rectangle(Vec2::new(0.9, 0.9), Vec2::new(0.05, 0.05));
    let other_layer = blocker().with_layer_mask(LayerMask(0b10));
    let light = white_light(Vec2::ZERO, 0.5).with_layer_mask(LayerMask(0b01));

    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![light],
        vec![far, other_layer],
    );

    assert_eq!(shadow_draws(&commands), 0);
    assert_eq!(pipeline.frame_stats().casters_submitted, 2);
}

#[test]
fn full_strength_shadows_draw_the_light_once() {
    let mut pipeline = initialized();
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5)],
        vec![blocker()],
    );

    assert_eq!(shadow_draws(&commands), 1);
    assert_eq!(light_draws(&commands), [(1.0, StencilTest::Unshadowed)]);
    assert_eq!(pipeline.frame_stats().shadow_triangles, 2);
}

#[test]
fn partial_shadows_add_a_dimmed_pass_over_shadowed_pixels() {
    let mut pipeline = initialized();
    let light = Light::point(Vec2::ZERO, [1.0; 3], 2.0, 0.5).with_shadow_strength(0.75);
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![light],
        vec![blocker()],
    );

    assert_eq!(
        light_draws(&commands),
        [(2.0, StencilTest::Unshadowed), (0.5, StencilTest::Shadowed)]
    );
}

#[test]
fn out_of_range_shadow_strength_is_clamped() {
    let mut pipeline = initialized();
    let mut negative = Light::point(Vec2::ZERO, [1.0; 3], 2.0, 0.5);
    negative.shadow_strength = -0.5;
    let mut excessive = Light::point(Vec2::ZERO, [1.0; 3], 2.0, 0.5);
    excessive.shadow_strength = 3.0;

    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![negative, excessive],
        vec![blocker()],
    );

    // Negative strength acts as no shadow at all; the dimmed pass never
    // exceeds the unshadowed one.
    assert_eq!(
        light_draws(&commands),
        [
            (2.0, StencilTest::Unshadowed),
            (2.0, StencilTest::Shadowed),
            (2.0, StencilTest::Unshadowed),
        ]
    );
}

#[test]
fn partial_shadows_without_casters_skip_the_dimmed_pass() {
    let mut pipeline = initialized();
    let light = white_light(Vec2::ZERO, 0.5).with_shadow_strength(0.5);
    let commands = run_frame(&mut pipeline, LightingSettings::default(), vec![light], vec![]);

    assert_eq!(light_draws(&commands), [(1.0, StencilTest::Unshadowed)]);
}

#[test]
fn all_casters_in_range_share_one_shadow_draw() {
    let mut pipeline = initialized();
    let left = ShadowCaster::rectangle(Vec2::new(-0.2, 0.0), Vec2::new(0.1, 0.1));
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5)],
        vec![blocker(), left],
    );

    let vertices = commands
        .iter()
        .find_map(|c| match c {
            BackendCommand::DrawShadowVolume { vertices } => Some(vertices.len()),
            _ => None,
        })
        .unwrap();
    assert_eq!(shadow_draws(&commands), 1);
    assert_eq!(vertices, 12);
}

#[test]
fn degenerate_casters_are_dropped() {
    let mut pipeline = initialized();
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5)],
        vec![
            ShadowCaster::polygon(vec![]),
            ShadowCaster::polyline(vec![Vec2::new(0.2, 0.0)]),
        ],
    );

    assert_eq!(pipeline.frame_stats().casters_submitted, 0);
    assert_eq!(shadow_draws(&commands), 0);
}

#[cfg(not(debug_assertions))]
#[test]
fn submissions_outside_a_scene_are_dropped_in_release() {
    let mut pipeline = initialized();
    pipeline.submit_light(white_light(Vec2::ZERO, 0.5));
    pipeline.submit_shadow_caster(blocker());

    let commands = run_frame(&mut pipeline, LightingSettings::default(), vec![], vec![]);
    assert!(light_draws(&commands).is_empty());
    assert_eq!(pipeline.frame_stats().lights_submitted, 0);
}

#[test]
fn submissions_do_not_leak_into_the_next_scene() {
    let mut pipeline = initialized();
    run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5)],
        vec![blocker()],
    );
    let commands = run_frame(&mut pipeline, LightingSettings::default(), vec![], vec![]);

    assert!(light_draws(&commands).is_empty());
    assert_eq!(shadow_draws(&commands), 0);
}

#[test]
fn graphics_state_is_restored_after_the_scene() {
    let external = GraphicsStateSnapshot {
        blend: BlendMode::Alpha,
        depth_test: true,
        stencil: StencilMode::Disabled,
        scissor: Some(ScissorRect::new(1, 2, 3, 4)),
        color_writes: true,
        target: TargetBinding::Backbuffer,
        viewport: (640, 480),
        program: Some(Program::External),
    };
    let mut pipeline = LightingPipeline::new(HeadlessBackend::new().with_state(external));
    pipeline.init().unwrap();

    run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5).with_shadow_strength(0.5)],
        vec![blocker()],
    );

    assert_eq!(*pipeline.backend().state(), external);
    assert_eq!(pipeline.state(), PipelineState::Initialized);
}

#[test]
fn renderer_errors_still_restore_state_and_close_the_scene() {
    let mut pipeline = initialized();
    let before = *pipeline.backend().state();
    let mut renderer = RecordingRenderer {
        fail_with: Some("device lost"),
        ..RecordingRenderer::default()
    };

    pipeline
        .begin_scene(&Mat4::IDENTITY, VIEWPORT, LightingSettings::default(), &mut renderer)
        .unwrap();
    let err = pipeline.end_scene(&mut renderer).unwrap_err();

    assert!(matches!(err, LightingError::Backend(_)));
    assert_eq!(pipeline.state(), PipelineState::Initialized);
    assert_eq!(*pipeline.backend().state(), before);
}

#[test]
fn targets_are_resized_only_when_the_viewport_changes() {
    let mut pipeline = initialized();
    let mut renderer = RecordingRenderer::default();
    let sizes = [(100, 100), (100, 100), (200, 50), (200, 50)];

    for (width, height) in sizes {
        let output = SceneOutput::Backbuffer { width, height };
        pipeline
            .begin_scene(&Mat4::IDENTITY, output, LightingSettings::default(), &mut renderer)
            .unwrap();
        pipeline.end_scene(&mut renderer).unwrap();
    }

    let resizes: Vec<(u32, u32)> = pipeline
        .backend()
        .commands()
        .iter()
        .filter_map(|c| match c {
            BackendCommand::ResizeTargets { width, height } => Some((*width, *height)),
            _ => None,
        })
        .collect();
    assert_eq!(resizes, [(100, 100), (200, 50)]);
}

#[test]
fn framebuffer_output_sets_the_viewport_and_composite_target() {
    let mut pipeline = initialized();
    let mut renderer = RecordingRenderer::default();
    let output = SceneOutput::Framebuffer(HeadlessFramebuffer::new(64, 32));

    pipeline
        .begin_scene(&Mat4::IDENTITY, output, LightingSettings::default(), &mut renderer)
        .unwrap();
    assert_eq!(pipeline.viewport(), (64, 32));
    pipeline.end_scene(&mut renderer).unwrap();

    assert!(pipeline
        .backend()
        .commands()
        .contains(&BackendCommand::Composite {
            target: TargetBinding::Framebuffer,
            width: 64,
            height: 32,
        }));
}

#[test]
fn previous_size_reuses_the_last_viewport() {
    let mut pipeline = initialized();
    run_frame(&mut pipeline, LightingSettings::default(), vec![], vec![]);

    let mut renderer = RecordingRenderer::default();
    pipeline
        .begin_scene(
            &Mat4::IDENTITY,
            SceneOutput::PreviousSize,
            LightingSettings::default(),
            &mut renderer,
        )
        .unwrap();
    pipeline.end_scene(&mut renderer).unwrap();

    assert_eq!(pipeline.viewport(), (100, 100));
    let commands = pipeline.backend().commands();
    assert!(!commands
        .iter()
        .any(|c| matches!(c, BackendCommand::ResizeTargets { .. })));
    assert!(commands.contains(&BackendCommand::Composite {
        target: TargetBinding::Backbuffer,
        width: 100,
        height: 100,
    }));
}

#[test]
fn empty_viewport_renders_nothing_but_closes_cleanly() {
    let mut pipeline = initialized();
    let mut renderer = RecordingRenderer::default();
    let output = SceneOutput::Backbuffer {
        width: 0,
        height: 0,
    };

    pipeline
        .begin_scene(&Mat4::IDENTITY, output, LightingSettings::default(), &mut renderer)
        .unwrap();
    pipeline.submit_light(white_light(Vec2::ZERO, 0.5));
    pipeline.end_scene(&mut renderer).unwrap();

    let commands = pipeline.backend().commands();
    assert!(light_draws(commands).is_empty());
    assert!(!commands
        .iter()
        .any(|c| matches!(c, BackendCommand::Composite { .. })));
    assert_eq!(renderer.ended, 1);
    assert_eq!(pipeline.state(), PipelineState::Initialized);
}

#[test]
fn shutdown_is_idempotent_and_allows_reinit() {
    let mut pipeline = initialized();
    pipeline.shutdown();
    pipeline.shutdown();

    assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    assert_eq!(
        pipeline.backend().commands(),
        &[BackendCommand::ReleaseResources]
    );

    pipeline.init().unwrap();
    pipeline.backend_mut().take_commands();
    let commands = run_frame(
        &mut pipeline,
        LightingSettings::default(),
        vec![white_light(Vec2::ZERO, 0.5)],
        vec![],
    );
    // Targets were released with the resources, so they are recreated.
    assert!(matches!(
        commands[0],
        BackendCommand::ResizeTargets {
            width: 100,
            height: 100
        }
    ));
}

#[test]
fn shutdown_with_an_open_scene_restores_state() {
    let mut pipeline = initialized();
    let before = *pipeline.backend().state();
    let mut renderer = RecordingRenderer::default();
    pipeline
        .begin_scene(&Mat4::IDENTITY, VIEWPORT, LightingSettings::default(), &mut renderer)
        .unwrap();

    pipeline.shutdown();

    assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    assert_eq!(*pipeline.backend().state(), before);
    assert!(!pipeline.backend().has_resources());
}

#[test]
fn resize_failure_is_reported_and_leaves_the_scene_closed() {
    #[derive(Default)]
    struct FailingResize(HeadlessBackend);

    impl LightingBackend for FailingResize {
        type Framebuffer = HeadlessFramebuffer;

        fn create_resources(&mut self) -> Result<(), LightingError> {
            self.0.create_resources()
        }
        fn release_resources(&mut self) {
            self.0.release_resources()
        }
        fn capture_state(&self) -> GraphicsStateSnapshot {
            self.0.capture_state()
        }
        fn restore_state(&mut self, snapshot: &GraphicsStateSnapshot) {
            self.0.restore_state(snapshot)
        }
        fn resize_targets(&mut self, _: u32, _: u32) -> Result<(), LightingError> {
            Err(LightingError::Backend("out of memory".into()))
        }
        fn clear_scene_color(&mut self) -> Result<(), LightingError> {
            self.0.clear_scene_color()
        }
        fn unbind_scene_color(&mut self) {
            self.0.unbind_scene_color()
        }
        fn begin_light_accumulation(&mut self, view_projection: Mat4, clear_color: [f32; 3]) {
            self.0.begin_light_accumulation(view_projection, clear_color)
        }
        fn set_scissor(&mut self, rect: Option<ScissorRect>) {
            self.0.set_scissor(rect)
        }
        fn clear_stencil(&mut self) {
            self.0.clear_stencil()
        }
        fn draw_shadow_volume(&mut self, triangles: &umbra2d::lighting::ShadowTriangles) {
            self.0.draw_shadow_volume(triangles)
        }
        fn draw_light(&mut self, light: &Light, intensity: f32, test: StencilTest) {
            self.0.draw_light(light, intensity, test)
        }
        fn end_light_accumulation(&mut self) -> Result<(), LightingError> {
            self.0.end_light_accumulation()
        }
        fn composite(
            &mut self,
            target: &umbra2d::render::CompositeTarget<'_, HeadlessFramebuffer>,
        ) -> Result<(), LightingError> {
            self.0.composite(target)
        }
    }

    struct Noop;
    impl SceneRenderer<FailingResize> for Noop {
        fn begin_scene(&mut self, _: &mut FailingResize, _: Mat4) {}
        fn end_scene(&mut self, _: &mut FailingResize) -> Result<(), LightingError> {
            Ok(())
        }
    }

    let mut pipeline = LightingPipeline::new(FailingResize::default());
    pipeline.init().unwrap();

    let err = pipeline
        .begin_scene(&Mat4::IDENTITY, VIEWPORT, LightingSettings::default(), &mut Noop)
        .unwrap_err();
    assert!(matches!(err, LightingError::Backend(_)));
    assert_eq!(pipeline.state(), PipelineState::Initialized);
}

#[cfg(debug_assertions)]
mod contract_violations {
    use super::*;

    #[test]
    #[should_panic(expected = "already open")]
    fn begin_twice_panics_in_debug() {
        let mut pipeline = initialized();
        let mut renderer = RecordingRenderer::default();
        pipeline
            .begin_scene(&Mat4::IDENTITY, VIEWPORT, LightingSettings::default(), &mut renderer)
            .unwrap();
        let _ = pipeline.begin_scene(
            &Mat4::IDENTITY,
            VIEWPORT,
            LightingSettings::default(),
            &mut renderer,
        );
    }

    #[test]
    #[should_panic(expected = "submit_light called while no lighting scene is open")]
    fn submit_light_outside_a_scene_panics_in_debug() {
        let mut pipeline = initialized();
        pipeline.submit_light(white_light(Vec2::ZERO, 0.5));
    }

    #[test]
    #[should_panic(expected = "submit_shadow_caster called while no lighting scene is open")]
    fn submit_caster_after_end_scene_panics_in_debug() {
        let mut pipeline = initialized();
        run_frame(&mut pipeline, LightingSettings::default(), vec![], vec![]);
        pipeline.submit_shadow_caster(blocker());
    }

    #[test]
    #[should_panic(expected = "without a matching begin_scene")]
    fn end_without_begin_panics_in_debug() {
        let mut pipeline = initialized();
        let _ = pipeline.end_scene(&mut RecordingRenderer::default());
    }

    #[test]
    #[should_panic(expected = "before the lighting pipeline was initialized")]
    fn begin_before_init_panics_in_debug() {
        let mut pipeline = LightingPipeline::new(HeadlessBackend::new());
        let _ = pipeline.begin_scene(
            &Mat4::IDENTITY,
            VIEWPORT,
            LightingSettings::default(),
            &mut RecordingRenderer::default(),
        );
    }
}
