//! wgpu implementation of [`LightingBackend`].
//!
//! Light pass calls are queued as [`LightPassCommand`]s and replayed in a
//! single render pass when the accumulation ends, the same way sprites and
//! lights are batched per frame. Everything recorded during a scene goes into
//! one command encoder that is submitted after compositing.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use wgpu::{
    vertex_attr_array, AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry,
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource,
    BindingType, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoder, CommandEncoderDescriptor, CompareFunction, CompilationMessageType,
    DepthStencilState, Extent3d, FilterMode, FragmentState, LoadOp, MultisampleState, Operations,
    PipelineLayoutDescriptor, PrimitiveState, RenderPass, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor, ShaderModule,
    ShaderModuleDescriptor, ShaderSource, StencilFaceState, StencilOperation, StencilState,
    Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType,
    TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension, VertexState,
};

use crate::lighting::{Light, LightKind, LightingError, ScissorRect, ShadowTriangles};
use crate::render::backend::{
    BlendMode, CompositeTarget, Framebuffer, GraphicsStateSnapshot, LightingBackend, Program,
    StencilMode, StencilTest, TargetBinding,
};

pub const SCENE_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;
/// Float so accumulated light can exceed 1.0 before compositing.
pub const LIGHT_ACCUMULATION_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const STENCIL_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;
/// Light draws per scene, counting the dimmed second pass of soft shadows.
pub const MAX_LIGHT_DRAWS: usize = 512;

/// A color texture that can be rendered into and sampled.
#[derive(Clone, Debug)]
pub struct OffscreenTarget {
    pub texture: Texture,
    pub view: TextureView,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl OffscreenTarget {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }
}

impl Framebuffer for OffscreenTarget {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

struct RenderTargets {
    scene_color: OffscreenTarget,
    light_accumulation: OffscreenTarget,
    _stencil_texture: Texture,
    stencil_view: TextureView,
    width: u32,
    height: u32,
}

impl RenderTargets {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let scene_color =
            OffscreenTarget::new(device, width, height, SCENE_COLOR_FORMAT, "scene-color");
        let light_accumulation = OffscreenTarget::new(
            device,
            width,
            height,
            LIGHT_ACCUMULATION_FORMAT,
            "light-accumulation",
        );
        let stencil_texture = device.create_texture(&TextureDescriptor {
            label: Some("shadow-stencil"),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: STENCIL_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let stencil_view = stencil_texture.create_view(&TextureViewDescriptor::default());

        Self {
            scene_color,
            light_accumulation,
            _stencil_texture: stencil_texture,
            stencil_view,
            width,
            height,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CompositeVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct LightUniforms {
    view_proj: [[f32; 4]; 4],
    position: [f32; 2],
    radius: f32,
    intensity: f32,
    color: [f32; 3],
    falloff: f32,
    direction: [f32; 2],
    cos_inner: f32,
    // Below -1.0 marks a point light.
    cos_outer: f32,
}

impl LightUniforms {
    fn new(light: &Light, intensity: f32, view_proj: Mat4) -> Self {
        let (direction, cos_inner, cos_outer) = match light.kind {
            LightKind::Point => ([0.0, 0.0], -2.0, -2.0),
            LightKind::Spot {
                direction,
                inner_angle,
                outer_angle,
            } => (direction.to_array(), inner_angle.cos(), outer_angle.cos()),
        };

        Self {
            view_proj: view_proj.to_cols_array_2d(),
            position: light.position.to_array(),
            radius: light.radius,
            intensity,
            color: light.color,
            falloff: light.falloff,
            direction,
            cos_inner,
            cos_outer,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ShadowUniforms {
    view_proj: [[f32; 4]; 4],
}

/// Quad over [-1, 1]², scaled by the light radius in the vertex shader.
const LIGHT_QUAD: [QuadVertex; 6] = [
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [-1.0, 1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0] },
];

// Texture v runs downward, so NDC y = -1 samples v = 1.
const FULLSCREEN_QUAD: [CompositeVertex; 6] = [
    CompositeVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    CompositeVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    CompositeVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    CompositeVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    CompositeVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    CompositeVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
];

struct LightProgram {
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    uniform_buffer: Buffer,
    uniform_stride: u64,
    vertex_buffer: Buffer,
}

struct ShadowProgram {
    pipeline: RenderPipeline,
    stencil_clear: RenderPipeline,
    bind_group: BindGroup,
    uniform_buffer: Buffer,
    clear_vertex_buffer: Buffer,
    vertices: DynamicVertexBuffer,
}

struct CompositeProgram {
    shader: ShaderModule,
    bind_group_layout: BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: Sampler,
    vertex_buffer: Buffer,
    pipelines: HashMap<TextureFormat, RenderPipeline>,
}

impl CompositeProgram {
    fn pipeline(&mut self, device: &wgpu::Device, format: TextureFormat) -> &RenderPipeline {
        let shader = &self.shader;
        let layout = &self.pipeline_layout;
        self.pipelines
            .entry(format)
            .or_insert_with(|| create_composite_pipeline(device, shader, layout, format))
    }
}

struct Programs {
    light: LightProgram,
    shadow: ShadowProgram,
    composite: CompositeProgram,
}

/// Vertex buffer that grows to fit the largest upload seen so far.
struct DynamicVertexBuffer {
    buffer: Buffer,
    capacity: u64,
    label: &'static str,
}

impl DynamicVertexBuffer {
    fn new(device: &wgpu::Device, capacity: u64, label: &'static str) -> Self {
        Self {
            buffer: create_vertex_buffer(device, capacity, label),
            capacity,
            label,
        }
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) {
        let needed = bytes.len() as u64;
        if needed > self.capacity {
            let capacity = needed.next_power_of_two();
            log::debug!("Growing {} to {capacity} bytes", self.label);
            self.buffer = create_vertex_buffer(device, capacity, self.label);
            self.capacity = capacity;
        }
        if needed > 0 {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, size: u64, label: &str) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// One queued step of the light accumulation pass.
#[derive(Clone, Debug, PartialEq)]
enum LightPassCommand {
    Scissor(Option<ScissorRect>),
    ClearStencil,
    Shadow { vertices: std::ops::Range<u32> },
    Light { uniform_offset: u32, stencil_reference: u32 },
}

/// Lighting backend on top of a wgpu device.
///
/// The unlit scene is drawn into [`begin_scene_pass`](Self::begin_scene_pass);
/// the backbuffer view for the composite is supplied per frame through
/// [`set_backbuffer`](Self::set_backbuffer).
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    programs: Option<Programs>,
    targets: Option<RenderTargets>,
    encoder: Option<CommandEncoder>,
    backbuffer: Option<(TextureView, TextureFormat)>,
    state: GraphicsStateSnapshot,
    view_projection: Mat4,
    ambient: [f32; 3],
    light_pass: Vec<LightPassCommand>,
    shadow_vertices: Vec<QuadVertex>,
    light_draws: usize,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            programs: None,
            targets: None,
            encoder: None,
            backbuffer: None,
            state: GraphicsStateSnapshot::default(),
            view_projection: Mat4::IDENTITY,
            ambient: [0.0; 3],
            light_pass: Vec::new(),
            shadow_vertices: Vec::new(),
            light_draws: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Swapchain view that `SceneOutput::Backbuffer` composites into.
    pub fn set_backbuffer(&mut self, view: TextureView, format: TextureFormat) {
        self.backbuffer = Some((view, format));
    }

    /// Create an offscreen target the lit scene can be composited into.
    pub fn create_framebuffer(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> OffscreenTarget {
        OffscreenTarget::new(&self.device, width, height, format, "lighting-output")
    }

    /// Render pass into scene color that keeps what is already there.
    pub fn begin_scene_pass(&mut self) -> Result<RenderPass<'_>, LightingError> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(LightingError::MissingTarget("scene color"))?;
        let encoder = active_encoder(&mut self.encoder, &self.device);

        Ok(encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("scene-pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &targets.scene_color.view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            multiview_mask: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        }))
    }

    /// Submit recorded work without waiting for a composite.
    pub fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn reset_light_pass(&mut self) {
        self.light_pass.clear();
        self.shadow_vertices.clear();
        self.light_draws = 0;
    }

    fn record_light_pass(&mut self) -> Result<(), LightingError> {
        let programs = self
            .programs
            .as_mut()
            .ok_or(LightingError::MissingTarget("lighting resources"))?;
        let targets = self
            .targets
            .as_ref()
            .ok_or(LightingError::MissingTarget("light accumulation"))?;

        programs.shadow.vertices.upload(
            &self.device,
            &self.queue,
            bytemuck::cast_slice(&self.shadow_vertices),
        );

        let [r, g, b] = self.ambient;
        let encoder = active_encoder(&mut self.encoder, &self.device);
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("light-accumulation-pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &targets.light_accumulation.view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &targets.stencil_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: Some(Operations {
                    load: LoadOp::Clear(0),
                    store: wgpu::StoreOp::Discard,
                }),
            }),
            multiview_mask: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let (width, height) = (targets.width, targets.height);
        for command in &self.light_pass {
            match command {
                LightPassCommand::Scissor(rect) => {
                    let rect = rect.unwrap_or_else(|| ScissorRect::full(width, height));
                    let rect = rect.to_top_left(height);
                    pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
                }
                LightPassCommand::ClearStencil => {
                    pass.set_pipeline(&programs.shadow.stencil_clear);
                    pass.set_stencil_reference(0);
                    pass.set_vertex_buffer(0, programs.shadow.clear_vertex_buffer.slice(..));
                    pass.draw(0..6, 0..1);
                }
                LightPassCommand::Shadow { vertices } => {
                    pass.set_pipeline(&programs.shadow.pipeline);
                    pass.set_stencil_reference(1);
                    pass.set_bind_group(0, &programs.shadow.bind_group, &[]);
                    pass.set_vertex_buffer(0, programs.shadow.vertices.buffer.slice(..));
                    pass.draw(vertices.clone(), 0..1);
                }
                LightPassCommand::Light {
                    uniform_offset,
                    stencil_reference,
                } => {
                    pass.set_pipeline(&programs.light.pipeline);
                    pass.set_stencil_reference(*stencil_reference);
                    pass.set_bind_group(0, &programs.light.bind_group, &[*uniform_offset]);
                    pass.set_vertex_buffer(0, programs.light.vertex_buffer.slice(..));
                    pass.draw(0..6, 0..1);
                }
            }
        }

        drop(pass);
        Ok(())
    }
}

fn active_encoder<'a>(
    slot: &'a mut Option<CommandEncoder>,
    device: &wgpu::Device,
) -> &'a mut CommandEncoder {
    slot.get_or_insert_with(|| {
        device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("lighting-encoder"),
        })
    })
}

impl LightingBackend for WgpuBackend {
    type Framebuffer = OffscreenTarget;

    fn create_resources(&mut self) -> Result<(), LightingError> {
        let light = create_light_program(&self.device)?;
        let shadow = create_shadow_program(&self.device)?;
        let composite = create_composite_program(&self.device)?;

        self.programs = Some(Programs {
            light,
            shadow,
            composite,
        });
        Ok(())
    }

    fn release_resources(&mut self) {
        self.programs = None;
        self.targets = None;
        self.encoder = None;
        self.backbuffer = None;
        self.reset_light_pass();
    }

    fn capture_state(&self) -> GraphicsStateSnapshot {
        self.state
    }

    fn restore_state(&mut self, snapshot: &GraphicsStateSnapshot) {
        self.state = *snapshot;
    }

    fn resize_targets(&mut self, width: u32, height: u32) -> Result<(), LightingError> {
        if self.programs.is_none() {
            return Err(LightingError::MissingTarget("lighting resources"));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(LightingError::Backend(format!(
                "lighting targets of {width}x{height} exceed the device limit of {max}"
            )));
        }
        self.targets = Some(RenderTargets::new(&self.device, width, height));
        Ok(())
    }

    fn clear_scene_color(&mut self) -> Result<(), LightingError> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(LightingError::MissingTarget("scene color"))?;
        let encoder = active_encoder(&mut self.encoder, &self.device);

        let _clear = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("clear-scene-color"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &targets.scene_color.view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            multiview_mask: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        self.state.target = TargetBinding::SceneColor;
        self.state.viewport = (targets.width, targets.height);
        Ok(())
    }

    fn unbind_scene_color(&mut self) {
        self.state.target = TargetBinding::Backbuffer;
    }

    fn begin_light_accumulation(&mut self, view_projection: Mat4, clear_color: [f32; 3]) {
        self.reset_light_pass();
        self.view_projection = view_projection;
        self.ambient = clear_color;

        if let Some(programs) = &self.programs {
            let uniforms = ShadowUniforms {
                view_proj: view_projection.to_cols_array_2d(),
            };
            self.queue.write_buffer(
                &programs.shadow.uniform_buffer,
                0,
                bytemuck::bytes_of(&uniforms),
            );
        }

        self.state.target = TargetBinding::LightAccumulation;
        self.state.blend = BlendMode::Additive;
        self.state.depth_test = false;
    }

    fn set_scissor(&mut self, rect: Option<ScissorRect>) {
        self.state.scissor = rect;
        self.light_pass.push(LightPassCommand::Scissor(rect));
    }

    fn clear_stencil(&mut self) {
        self.light_pass.push(LightPassCommand::ClearStencil);
    }

    fn draw_shadow_volume(&mut self, triangles: &ShadowTriangles) {
        let start = self.shadow_vertices.len() as u32;
        self.shadow_vertices.extend(
            triangles
                .vertices()
                .iter()
                .map(|v| QuadVertex { position: v.to_array() }),
        );
        let end = self.shadow_vertices.len() as u32;
        self.light_pass
            .push(LightPassCommand::Shadow { vertices: start..end });

        self.state.program = Some(Program::Shadow);
        self.state.stencil = StencilMode::Write(1);
        self.state.color_writes = false;
    }

    fn draw_light(&mut self, light: &Light, intensity: f32, test: StencilTest) {
        let Some(programs) = &self.programs else {
            return;
        };
        if self.light_draws >= MAX_LIGHT_DRAWS {
            log::warn!("Light draw limit of {MAX_LIGHT_DRAWS} reached; dropping light");
            return;
        }

        let offset = self.light_draws as u64 * programs.light.uniform_stride;
        let uniforms = LightUniforms::new(light, intensity, self.view_projection);
        self.queue.write_buffer(
            &programs.light.uniform_buffer,
            offset,
            bytemuck::bytes_of(&uniforms),
        );
        self.light_draws += 1;
        self.light_pass.push(LightPassCommand::Light {
            uniform_offset: offset as u32,
            stencil_reference: test.reference(),
        });

        self.state.program = Some(Program::Light);
        self.state.stencil = StencilMode::Test(test);
        self.state.color_writes = true;
    }

    fn end_light_accumulation(&mut self) -> Result<(), LightingError> {
        let result = self.record_light_pass();
        self.reset_light_pass();
        self.state.stencil = StencilMode::Disabled;
        result
    }

    fn composite(
        &mut self,
        target: &CompositeTarget<'_, OffscreenTarget>,
    ) -> Result<(), LightingError> {
        let (view, format, binding) = match target {
            CompositeTarget::Backbuffer { .. } => {
                let (view, format) = self
                    .backbuffer
                    .as_ref()
                    .ok_or(LightingError::MissingTarget("backbuffer"))?;
                (view.clone(), *format, TargetBinding::Backbuffer)
            }
            CompositeTarget::Framebuffer(framebuffer) => (
                framebuffer.view.clone(),
                framebuffer.format,
                TargetBinding::Framebuffer,
            ),
        };

        let programs = self
            .programs
            .as_mut()
            .ok_or(LightingError::MissingTarget("lighting resources"))?;
        let targets = self
            .targets
            .as_ref()
            .ok_or(LightingError::MissingTarget("scene color"))?;

        let composite = &mut programs.composite;
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("composite-bind-group"),
            layout: &composite.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&targets.scene_color.view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&composite.sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::TextureView(&targets.light_accumulation.view),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: BindingResource::Sampler(&composite.sampler),
                },
            ],
        });
        let pipeline = composite.pipeline(&self.device, format).clone();

        let encoder = active_encoder(&mut self.encoder, &self.device);
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("composite-pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            multiview_mask: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, composite.vertex_buffer.slice(..));
        pass.draw(0..6, 0..1);
        drop(pass);

        self.flush();

        let (width, height) = target.size();
        self.state.target = binding;
        self.state.blend = BlendMode::Disabled;
        self.state.depth_test = false;
        self.state.program = Some(Program::Composite);
        self.state.viewport = (width, height);
        Ok(())
    }
}

/// Compile `source`, turning compiler errors into [`LightingError::ShaderCompilation`].
fn compile_shader(
    device: &wgpu::Device,
    program: &'static str,
    source: &'static str,
) -> Result<ShaderModule, LightingError> {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some(program),
        source: ShaderSource::Wgsl(source.into()),
    });

    let info = pollster::block_on(shader.get_compilation_info());
    let errors: Vec<String> = info
        .messages
        .iter()
        .filter(|m| matches!(m.message_type, CompilationMessageType::Error))
        .map(|m| m.message.clone())
        .collect();

    if errors.is_empty() {
        Ok(shader)
    } else {
        Err(LightingError::ShaderCompilation {
            program,
            message: errors.join("\n"),
        })
    }
}

fn uniform_layout_entry(min_size: u64, dynamic: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: std::num::NonZeroU64::new(min_size),
        },
        count: None,
    }
}

fn stencil_state(
    compare: CompareFunction,
    pass_op: StencilOperation,
    write_mask: u32,
) -> DepthStencilState {
    let face = StencilFaceState {
        compare,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op,
    };

    DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: CompareFunction::Always,
        stencil: StencilState {
            front: face,
            back: face,
            read_mask: 0xff,
            write_mask,
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

fn triangle_list() -> PrimitiveState {
    PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    }
}

const QUAD_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &vertex_attr_array![0 => Float32x2],
};

fn create_light_program(device: &wgpu::Device) -> Result<LightProgram, LightingError> {
    let shader = compile_shader(device, "light", include_str!("light.wgsl"))?;
    let uniform_size = std::mem::size_of::<LightUniforms>() as u64;

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("light-bind-group-layout"),
        entries: &[uniform_layout_entry(uniform_size, true)],
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("light-pipeline-layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
    let uniform_stride = (uniform_size + uniform_alignment - 1) & !(uniform_alignment - 1);

    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("light-uniform-buffer"),
        size: uniform_stride * MAX_LIGHT_DRAWS as u64,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("light-bind-group"),
        layout: &bind_group_layout,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &uniform_buffer,
                offset: 0,
                size: std::num::NonZeroU64::new(uniform_size),
            }),
        }],
    });

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("light-vertex-buffer"),
        contents: bytemuck::cast_slice(&LIGHT_QUAD),
        usage: BufferUsages::VERTEX,
    });

    let additive = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };

    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("light-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[QUAD_VERTEX_LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format: LIGHT_ACCUMULATION_FORMAT,
                blend: Some(wgpu::BlendState {
                    color: additive,
                    alpha: additive,
                }),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: triangle_list(),
        depth_stencil: Some(stencil_state(CompareFunction::Equal, StencilOperation::Keep, 0)),
        multisample: MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    Ok(LightProgram {
        pipeline,
        bind_group,
        uniform_buffer,
        uniform_stride,
        vertex_buffer,
    })
}

fn create_shadow_program(device: &wgpu::Device) -> Result<ShadowProgram, LightingError> {
    let shader = compile_shader(device, "shadow", include_str!("shadow.wgsl"))?;
    let uniform_size = std::mem::size_of::<ShadowUniforms>() as u64;

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("shadow-bind-group-layout"),
        entries: &[uniform_layout_entry(uniform_size, false)],
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("shadow-pipeline-layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });
    let clear_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("stencil-clear-pipeline-layout"),
        bind_group_layouts: &[],
        immediate_size: 0,
    });

    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("shadow-uniform-buffer"),
        size: uniform_size,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("shadow-bind-group"),
        layout: &bind_group_layout,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }],
    });

    let stencil_only = |label: &str, layout: &wgpu::PipelineLayout, entry_point: &str| {
        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some(entry_point),
                buffers: &[QUAD_VERTEX_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: LIGHT_ACCUMULATION_FORMAT,
                    blend: None,
                    write_mask: ColorWrites::empty(),
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: triangle_list(),
            depth_stencil: Some(stencil_state(
                CompareFunction::Always,
                StencilOperation::Replace,
                0xff,
            )),
            multisample: MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    };

    // Shadows write reference 1, the clear quad writes reference 0.
    let pipeline = stencil_only("shadow-pipeline", &pipeline_layout, "vs_main");
    let stencil_clear = stencil_only("stencil-clear-pipeline", &clear_layout, "vs_fullscreen");

    let clear_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("stencil-clear-vertex-buffer"),
        contents: bytemuck::cast_slice(&LIGHT_QUAD),
        usage: BufferUsages::VERTEX,
    });

    // Room for a few dozen shadow quads before the first grow.
    let vertices = DynamicVertexBuffer::new(
        device,
        (std::mem::size_of::<QuadVertex>() * 6 * 64) as u64,
        "shadow-vertex-buffer",
    );

    Ok(ShadowProgram {
        pipeline,
        stencil_clear,
        bind_group,
        uniform_buffer,
        clear_vertex_buffer,
        vertices,
    })
}

fn create_composite_program(device: &wgpu::Device) -> Result<CompositeProgram, LightingError> {
    let shader = compile_shader(device, "composite", include_str!("composite.wgsl"))?;

    let texture_entry = |binding| BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let sampler_entry = |binding| BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::Filtering),
        count: None,
    };

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("composite-bind-group-layout"),
        entries: &[
            texture_entry(0),
            sampler_entry(1),
            texture_entry(2),
            sampler_entry(3),
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("composite-pipeline-layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let sampler = device.create_sampler(&SamplerDescriptor {
        label: Some("composite-sampler"),
        address_mode_u: AddressMode::ClampToEdge,
        address_mode_v: AddressMode::ClampToEdge,
        address_mode_w: AddressMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    });

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("composite-vertex-buffer"),
        contents: bytemuck::cast_slice(&FULLSCREEN_QUAD),
        usage: BufferUsages::VERTEX,
    });

    Ok(CompositeProgram {
        shader,
        bind_group_layout,
        pipeline_layout,
        sampler,
        vertex_buffer,
        pipelines: HashMap::new(),
    })
}

fn create_composite_pipeline(
    device: &wgpu::Device,
    shader: &ShaderModule,
    layout: &wgpu::PipelineLayout,
    format: TextureFormat,
) -> RenderPipeline {
    log::debug!("Creating composite pipeline for {format:?}");

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("composite-pipeline"),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<CompositeVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &vertex_attr_array![0 => Float32x2, 1 => Float32x2],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: triangle_list(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
