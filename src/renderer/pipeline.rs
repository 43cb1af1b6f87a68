use glam::{Affine2, Mat4};

use crate::layer::{RectVertex, SquareVertex};

/// Format of the per-band offscreen rasters.
pub const BAND_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Stride between uniform slots; the minimum dynamic-offset alignment every
/// adapter supports.
pub const UNIFORM_SLOT_SIZE: u64 = 256;

// ── Uniforms ──────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileUniforms {
    pub projection: [[f32; 4]; 4],
    /// Tileset size in pixels; texture coordinates are divided by it.
    pub sampler_size: [f32; 2],
    pub animation_offset: [f32; 2],
}

impl TileUniforms {
    pub fn new(projection: Mat4, sampler_size: [f32; 2], animation_offset: [f32; 2]) -> Self {
        Self { projection: projection.to_cols_array_2d(), sampler_size, animation_offset }
    }
}

// ── Vertex layouts ────────────────────────────────────────────────────────────

impl SquareVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2,  // dest
        1 => Float32x2,  // source
        2 => Float32,    // size
        3 => Float32x2,  // anim
    ];

    /// One instance per record; the shader expands it to six corners.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SquareVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

impl RectVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2,  // position
        1 => Float32x2,  // uv
        2 => Float32x2,  // anim
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<RectVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl ShadowVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ShadowVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

// ── Pipelines ─────────────────────────────────────────────────────────────────

pub struct TilePipelines {
    /// Instanced square records → band raster.
    pub square: wgpu::RenderPipeline,
    /// Six-vertex rect records → band raster.
    pub rect: wgpu::RenderPipeline,
    /// Solid shadow rects → band raster.
    pub shadow: wgpu::RenderPipeline,
    /// Band raster → output, premultiplied.
    pub compose: wgpu::RenderPipeline,
    pub uniform_bind_group_layout: wgpu::BindGroupLayout,
    pub texture_bind_group_layout: wgpu::BindGroupLayout,
}

pub fn create_tile_pipelines(
    device: &wgpu::Device,
    output_format: wgpu::TextureFormat,
) -> TilePipelines {
    let square_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("square_tile_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/square_tile.wgsl").into()),
    });
    let rect_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("rect_tile_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/rect_tile.wgsl").into()),
    });
    let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shadow_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
    });

    let uniform_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tile_uniforms_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<TileUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

    let texture_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tileset_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

    let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("tile_pipeline_layout"),
        bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
        ..Default::default()
    });
    let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("shadow_pipeline_layout"),
        bind_group_layouts: &[&uniform_bind_group_layout],
        ..Default::default()
    });

    let blend = wgpu::BlendState::ALPHA_BLENDING;
    let square = build_pipeline(
        device,
        "square_tile_pipeline",
        &textured_layout,
        &square_shader,
        SquareVertex::layout(),
        BAND_FORMAT,
        blend,
    );
    let rect = build_pipeline(
        device,
        "rect_tile_pipeline",
        &textured_layout,
        &rect_shader,
        RectVertex::layout(),
        BAND_FORMAT,
        blend,
    );
    let shadow = build_pipeline(
        device,
        "shadow_pipeline",
        &shadow_layout,
        &shadow_shader,
        ShadowVertex::layout(),
        BAND_FORMAT,
        blend,
    );
    // Band rasters hold colour already multiplied by alpha.
    let compose = build_pipeline(
        device,
        "compose_pipeline",
        &textured_layout,
        &rect_shader,
        RectVertex::layout(),
        output_format,
        wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
    );

    TilePipelines {
        square,
        rect,
        shadow,
        compose,
        uniform_bind_group_layout,
        texture_bind_group_layout,
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    vertex_layout: wgpu::VertexBufferLayout<'static>,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

// ── Projection helpers ────────────────────────────────────────────────────────

/// Orthographic projection matrix (column-major) mapping pixel coords to clip space.
pub fn orthographic_projection(width: f32, height: f32) -> [f32; 16] {
    [
        2.0 / width, 0.0,           0.0, 0.0,
        0.0,         -2.0 / height, 0.0, 0.0,
        0.0,         0.0,           1.0, 0.0,
        -1.0,        1.0,           0.0, 1.0,
    ]
}

pub fn ortho_mat4(width: f32, height: f32) -> Mat4 {
    Mat4::from_cols_array(&orthographic_projection(width, height))
}

/// Lift a 2D affine transform into a 4×4 matrix acting on the xy plane.
pub fn affine_to_mat4(t: Affine2) -> Mat4 {
    let m = t.matrix2;
    let o = t.translation;
    Mat4::from_cols_array(&[
        m.x_axis.x, m.x_axis.y, 0.0, 0.0,
        m.y_axis.x, m.y_axis.y, 0.0, 0.0,
        0.0,        0.0,        1.0, 0.0,
        o.x,        o.y,        0.0, 1.0,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec4};

    #[test]
    fn ortho_maps_corners_to_clip_space() {
        let p = ortho_mat4(200.0, 100.0);
        let tl = p * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let br = p * Vec4::new(200.0, 100.0, 0.0, 1.0);
        assert_eq!((tl.x, tl.y), (-1.0, 1.0));
        assert_eq!((br.x, br.y), (1.0, -1.0));
    }

    #[test]
    fn affine_lift_matches_affine() {
        let t = Affine2::from_scale_angle_translation(Vec2::new(2.0, 3.0), 0.0, Vec2::new(5.0, -1.0));
        let p = Vec2::new(4.0, 7.0);
        let expected = t.transform_point2(p);
        let lifted = affine_to_mat4(t) * Vec4::new(p.x, p.y, 0.0, 1.0);
        assert!((lifted.x - expected.x).abs() < 1e-5);
        assert!((lifted.y - expected.y).abs() < 1e-5);
    }

    #[test]
    fn uniforms_fit_one_slot() {
        assert!(std::mem::size_of::<TileUniforms>() as u64 <= UNIFORM_SLOT_SIZE);
        assert_eq!(std::mem::size_of::<TileUniforms>() % 16, 0);
    }
}
