use std::time::Instant;

use anyhow::{anyhow, Result};
use umbra2d::lighting::{Light, LightingPipeline, LightingSettings, SceneOutput, ShadowCaster};
use umbra2d::math::{Camera2D, Transform2D, Vec2};
use umbra2d::render::{ShapeRenderer, WgpuBackend};
use wgpu::{
    CompositeAlphaMode, DeviceDescriptor, Instance, PresentMode, RequestAdapterOptions, Surface,
    SurfaceConfiguration, TextureUsages, TextureViewDescriptor,
};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

const BOX_COLOR: [f32; 4] = [0.8, 0.75, 0.7, 1.0];
const WALL_COLOR: [f32; 4] = [0.35, 0.4, 0.5, 1.0];
const FLOOR_COLOR: [f32; 4] = [0.55, 0.55, 0.6, 1.0];

struct Demo {
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    lighting: LightingPipeline<WgpuBackend>,
    shapes: ShapeRenderer,
    settings: LightingSettings,
    started: Instant,
}

impl Demo {
    fn new(window: &'static Window, settings: LightingSettings) -> Result<Self> {
        let instance = Instance::default();
        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&DeviceDescriptor {
            label: Some("umbra2d-demo-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        }))?;

        let size = window.inner_size();
        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(CompositeAlphaMode::Opaque);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let mut lighting = LightingPipeline::new(WgpuBackend::new(device, queue));
        lighting.init()?;

        Ok(Self {
            surface,
            surface_config,
            lighting,
            shapes: ShapeRenderer::new(),
            settings,
            started: Instant::now(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface
            .configure(self.lighting.backend().device(), &self.surface_config);
    }

    fn draw(&mut self) -> Result<()> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface
                    .configure(self.lighting.backend().device(), &self.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let view = surface_texture
            .texture
            .create_view(&TextureViewDescriptor::default());

        let (width, height) = (self.surface_config.width, self.surface_config.height);
        self.lighting
            .backend_mut()
            .set_backbuffer(view, self.surface_config.format);

        let camera = Camera2D::from_viewport(Vec2::ZERO, width, height);
        self.lighting.begin_scene(
            &camera,
            SceneOutput::Backbuffer { width, height },
            self.settings,
            &mut self.shapes,
        )?;

        let time = self.started.elapsed().as_secs_f32();
        self.populate_scene(time);

        self.lighting.end_scene(&mut self.shapes)?;
        surface_texture.present();
        Ok(())
    }

    fn populate_scene(&mut self, time: f32) {
        self.shapes
            .draw_rect(Vec2::ZERO, Vec2::new(2000.0, 2000.0), FLOOR_COLOR);

        // A ring of boxes, each one a caster.
        for i in 0..6 {
            let angle = i as f32 / 6.0 * std::f32::consts::TAU + time * 0.2;
            let transform =
                Transform2D::new(Vec2::from_angle(angle) * 220.0, Vec2::new(1.0, 1.0), angle);
            let caster = ShadowCaster::rectangle(Vec2::ZERO, Vec2::new(50.0, 50.0))
                .transformed(&transform);
            self.shapes.draw_polygon(&caster.points, BOX_COLOR);
            self.lighting.submit_shadow_caster(caster);
        }

        // Thin wall, lit and shadowed from either side.
        let wall = [Vec2::new(-300.0, -250.0), Vec2::new(300.0, -250.0)];
        self.shapes
            .draw_rect(Vec2::new(0.0, -250.0), Vec2::new(600.0, 6.0), WALL_COLOR);
        self.lighting
            .submit_shadow_caster(ShadowCaster::polyline(wall.to_vec()));

        let pillar_center = Vec2::new(380.0, 160.0);
        self.shapes.draw_circle(pillar_center, 30.0, BOX_COLOR);
        let pillar: Vec<Vec2> = (0..12)
            .map(|i| {
                let angle = i as f32 / 12.0 * std::f32::consts::TAU;
                pillar_center + Vec2::from_angle(angle) * 30.0
            })
            .collect();
        self.lighting.submit_shadow_caster(ShadowCaster::polygon(pillar));

        self.lighting
            .submit_light(Light::point(Vec2::ZERO, [1.0, 0.9, 0.7], 1.5, 450.0));

        let orbit = Vec2::from_angle(time * 0.7) * 320.0;
        self.lighting.submit_light(Light::spot(
            orbit,
            -orbit,
            [0.4, 0.6, 1.0],
            2.0,
            600.0,
            0.25,
            0.5,
        ));

        self.lighting.submit_light(
            Light::point(Vec2::new(-380.0, 200.0), [1.0, 0.3, 0.3], 1.2, 350.0)
                .with_shadow_strength(0.6),
        );
    }
}

fn load_settings() -> Result<LightingSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading lighting settings from {path}");
            Ok(LightingSettings::load(path)?)
        }
        None => Ok(LightingSettings::default()),
    }
}

fn is_escape_pressed(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && matches!(event.physical_key, PhysicalKey::Code(KeyCode::Escape))
}

fn main() -> Result<()> {
    env_logger::init();
    let settings = load_settings()?;

    let event_loop = EventLoop::new()?;
    let mut window_attributes = Window::default_attributes();
    window_attributes.title = "Umbra2D - Lighting Demo".into();
    window_attributes.inner_size = Some(LogicalSize::new(1280, 720).into());
    let window = event_loop.create_window(window_attributes)?;
    // The surface borrows the window for the rest of the program.
    let window: &'static Window = Box::leak(Box::new(window));

    let mut demo = Demo::new(window, settings)?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } if is_escape_pressed(&event) => elwt.exit(),
            WindowEvent::Resized(size) => demo.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if let Err(err) = demo.draw() {
                    log::error!("Frame failed: {err:?}");
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
