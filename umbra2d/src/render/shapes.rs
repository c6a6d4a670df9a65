use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use wgpu::{
    vertex_attr_array, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferUsages, ColorTargetState,
    ColorWrites, FragmentState, MultisampleState, PipelineLayoutDescriptor, PrimitiveState,
    RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource, VertexState,
};

use crate::lighting::LightingError;
use crate::math::Vec2;
use crate::render::backend::SceneRenderer;
use crate::render::wgpu_backend::{WgpuBackend, SCENE_COLOR_FORMAT};

const CIRCLE_SEGMENTS: usize = 32;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ShapeVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ShapeUniforms {
    view_proj: [[f32; 4]; 4],
}

struct ShapePipeline {
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    uniform_buffer: Buffer,
}

/// Flat-colored polygons and circles drawn as the unlit scene.
///
/// Shapes are queued between `begin_scene` and `end_scene` and drawn into
/// scene color in one pass when the lighting pipeline closes the scene.
#[derive(Default)]
pub struct ShapeRenderer {
    pipeline: Option<ShapePipeline>,
    vertices: Vec<ShapeVertex>,
    view_projection: Mat4,
}

impl ShapeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a convex polygon. Fewer than three points draws nothing.
    pub fn draw_polygon(&mut self, points: &[Vec2], color: [f32; 4]) {
        if points.len() < 3 {
            return;
        }

        // Fan triangulation; concave input is the caller's problem.
        for i in 1..points.len() - 1 {
            for point in [points[0], points[i], points[i + 1]] {
                self.vertices.push(ShapeVertex {
                    position: point.to_array(),
                    color,
                });
            }
        }
    }

    pub fn draw_rect(&mut self, center: Vec2, size: Vec2, color: [f32; 4]) {
        let half = size * 0.5;
        self.draw_polygon(
            &[
                Vec2::new(center.x - half.x, center.y - half.y),
                Vec2::new(center.x + half.x, center.y - half.y),
                Vec2::new(center.x + half.x, center.y + half.y),
                Vec2::new(center.x - half.x, center.y + half.y),
            ],
            color,
        );
    }

    pub fn draw_circle(&mut self, center: Vec2, radius: f32, color: [f32; 4]) {
        if radius <= 0.0 {
            return;
        }

        let rim: Vec<Vec2> = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let angle = (i as f32 / CIRCLE_SEGMENTS as f32) * std::f32::consts::TAU;
                center + Vec2::from_angle(angle) * radius
            })
            .collect();
        self.draw_polygon(&rim, color);
    }

    /// Vertices queued for the current scene.
    pub fn vertices(&self) -> &[ShapeVertex] {
        &self.vertices
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device) -> &ShapePipeline {
        self.pipeline
            .get_or_insert_with(|| create_shape_pipeline(device))
    }
}

impl SceneRenderer<WgpuBackend> for ShapeRenderer {
    fn begin_scene(&mut self, _backend: &mut WgpuBackend, view_projection: Mat4) {
        self.view_projection = view_projection;
        self.vertices.clear();
    }

    fn end_scene(&mut self, backend: &mut WgpuBackend) -> Result<(), LightingError> {
        if self.vertices.is_empty() {
            return Ok(());
        }

        let vertices = mem::take(&mut self.vertices);
        let uniforms = ShapeUniforms {
            view_proj: self.view_projection.to_cols_array_2d(),
        };

        let pipeline = self.ensure_pipeline(backend.device());
        backend
            .queue()
            .write_buffer(&pipeline.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        let vertex_buffer = backend
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("shape-vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: BufferUsages::VERTEX,
            });

        let mut pass = backend.begin_scene_pass()?;
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &pipeline.bind_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.draw(0..vertices.len() as u32, 0..1);
        drop(pass);

        self.vertices = vertices;
        self.vertices.clear();
        Ok(())
    }
}

fn create_shape_pipeline(device: &wgpu::Device) -> ShapePipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("shape-shader"),
        source: ShaderSource::Wgsl(include_str!("shape.wgsl").into()),
    });

    let uniform_size = mem::size_of::<ShapeUniforms>() as u64;
    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("shape-bind-group-layout"),
        entries: &[BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(uniform_size),
            },
            count: None,
        }],
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("shape-pipeline-layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("shape-uniform-buffer"),
        size: uniform_size,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("shape-bind-group"),
        layout: &bind_group_layout,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }],
    });

    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("shape-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: mem::size_of::<ShapeVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &vertex_attr_array![0 => Float32x2, 1 => Float32x4],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format: SCENE_COLOR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    ShapePipeline {
        pipeline,
        bind_group,
        uniform_buffer,
    }
}
