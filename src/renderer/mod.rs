pub mod pipeline;

use std::ops::Range;
use std::sync::{Arc, Weak};

use glam::{Affine2, Mat4};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::buffer_pool::{BufferId, VertexBufferPool};
use crate::config::TilemapConfig;
use crate::layer::{FrameParams, RasterTarget, RectVertex, TileLayer, VertexMode};
use crate::quad::{FillRect, QuadRecord};
use crate::tilemap::Tilemap;
use crate::tileset::Tileset;
use pipeline::{
    affine_to_mat4, create_tile_pipelines, ortho_mat4, ShadowVertex, TilePipelines, TileUniforms,
    BAND_FORMAT, UNIFORM_SLOT_SIZE,
};

// ── TileRenderer ──────────────────────────────────────────────────────────────

struct GpuTileset {
    bind_group: wgpu::BindGroup,
    size: [f32; 2],
}

/// GPU state shared by every tilemap drawn on one device: pipelines, the
/// vertex buffer pool and the uploaded tileset textures.
pub struct TileRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    output_format: wgpu::TextureFormat,
    pipelines: TilePipelines,
    sampler: wgpu::Sampler,
    pool: VertexBufferPool<wgpu::Buffer>,
    /// Uploaded tilesets.  Entries whose tileset was dropped are pruned on
    /// the next lookup.
    tilesets: Vec<(Weak<Tileset>, GpuTileset)>,
    /// Bumped on every context change; rasters built under an older
    /// generation are rebuilt.
    generation: u64,
}

fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("tileset_sampler"),
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

impl TileRenderer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        output_format: wgpu::TextureFormat,
        idle_ms: u64,
    ) -> Self {
        let pipelines = create_tile_pipelines(&device, output_format);
        let sampler = create_sampler(&device);
        Self {
            device,
            queue,
            output_format,
            pipelines,
            sampler,
            pool: VertexBufferPool::new(idle_ms),
            tilesets: Vec::new(),
            generation: 0,
        }
    }

    /// A renderer on the default adapter with no surface.  `None` when no
    /// adapter or device is available.
    pub async fn headless(output_format: wgpu::TextureFormat, idle_ms: u64) -> Option<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .ok()?;
        Some(Self::new(device, queue, output_format, idle_ms))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pool(&self) -> &VertexBufferPool<wgpu::Buffer> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut VertexBufferPool<wgpu::Buffer> {
        &mut self.pool
    }

    /// Rebuild everything tied to the device after the context was lost or
    /// replaced.  Layers recreate their buffers on their next draw.
    pub fn on_context_change(&mut self) {
        self.pipelines = create_tile_pipelines(&self.device, self.output_format);
        self.sampler = create_sampler(&self.device);
        self.pool.clear();
        self.tilesets.clear();
        self.generation += 1;
        info!(generation = self.generation, "tile renderer rebuilt after context change");
    }

    fn texture_bind_group(&self, label: &str, view: &wgpu::TextureView) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.pipelines.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn find_tileset(&self, tileset: &Arc<Tileset>) -> Option<&GpuTileset> {
        self.tilesets
            .iter()
            .find(|(weak, _)| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(tileset)))
            .map(|(_, gpu)| gpu)
    }

    /// Upload `tileset` if needed and return its pixel size.  `None` while
    /// its image is still pending.
    fn prepare_tileset(&mut self, tileset: &Arc<Tileset>) -> Option<[f32; 2]> {
        self.tilesets.retain(|(weak, _)| weak.strong_count() > 0);
        if let Some(gpu) = self.find_tileset(tileset) {
            return Some(gpu.size);
        }

        let img = tileset.image()?;
        let (width, height) = img.dimensions();
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some("tileset"),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            img,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.texture_bind_group("tileset_bg", &view);
        let size = [width as f32, height as f32];

        debug!(name = tileset.name(), width, height, "tileset texture uploaded");
        self.tilesets.push((Arc::downgrade(tileset), GpuTileset { bind_group, size }));
        Some(size)
    }

    /// Make sure `layer` has a pooled buffer large enough for its backing
    /// store, uploading when the data was repacked or the buffer is new.
    fn prepare_layer_buffer(&mut self, layer: &mut TileLayer, repacked: bool) -> Option<BufferId> {
        let needed = layer.capacity_bytes() as u64;
        if needed == 0 {
            return None;
        }

        let reusable = layer
            .buffer_id()
            .filter(|&id| self.pool.acquire(id).is_some_and(|entry| entry.size >= needed));
        let (id, fresh) = match reusable {
            Some(id) => (id, false),
            None => {
                if let Some(old) = layer.buffer_id() {
                    self.pool.release(old);
                }
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("tile_layer_vertices"),
                    size: needed,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let id = self.pool.create(buffer, needed);
                layer.set_buffer_id(Some(id));
                debug!(bytes = needed, pooled = self.pool.len(), "tile layer vertex buffer created");
                (id, true)
            }
        };

        if repacked || fresh {
            if let Some(entry) = self.pool.get(id) {
                self.queue.write_buffer(&entry.buffer, 0, layer.upload_bytes());
            }
        }
        Some(id)
    }
}

// ── GpuRaster ─────────────────────────────────────────────────────────────────

/// Borrowed GPU state a band needs while it repaints.
pub struct GpuFrame<'a> {
    pub renderer: &'a mut TileRenderer,
    pub encoder: &'a mut wgpu::CommandEncoder,
}

struct BandTarget {
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    /// Full-target quad used when composing.
    quad: wgpu::Buffer,
    width: u32,
    height: u32,
}

struct UniformRing {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    slots: usize,
}

enum DrawCmd {
    Tiles {
        mode: VertexMode,
        buffer: BufferId,
        tileset: Arc<Tileset>,
        slot: usize,
        records: u32,
    },
    Shadows {
        slot: usize,
        vertices: Range<u32>,
    },
}

/// Offscreen texture a z-band paints into on the GPU.
///
/// Draws are collected while the band's layers rasterize and recorded as one
/// render pass in [`finish`](RasterTarget::finish).  Each draw gets its own
/// uniform slot; slot 0 is kept for composing the band onto the output.
pub struct GpuRaster {
    target: Option<BandTarget>,
    generation: u64,
    uniforms: Vec<TileUniforms>,
    ring: Option<UniformRing>,
    commands: Vec<DrawCmd>,
    shadow_vertices: Vec<ShadowVertex>,
    shadow_buffer: Option<(wgpu::Buffer, u64)>,
}

impl Default for GpuRaster {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuRaster {
    pub fn new() -> Self {
        Self {
            target: None,
            generation: 0,
            uniforms: vec![bytemuck::Zeroable::zeroed()],
            ring: None,
            commands: Vec::new(),
            shadow_vertices: Vec::new(),
            shadow_buffer: None,
        }
    }

    /// Drop everything built under an older renderer generation.
    pub fn sync_generation(&mut self, generation: u64) {
        if self.generation != generation {
            self.generation = generation;
            self.target = None;
            self.ring = None;
            self.shadow_buffer = None;
            self.commands.clear();
        }
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.target.as_ref().map(|t| &t.view)
    }

    fn push_uniforms(&mut self, uniforms: TileUniforms) -> usize {
        self.uniforms.push(uniforms);
        self.uniforms.len() - 1
    }

    fn layer_projection(&self, frame: &FrameParams) -> Option<Mat4> {
        let t = self.target.as_ref()?;
        let origin = Mat4::from_translation(frame.origin.extend(0.0));
        Some(ortho_mat4(t.width as f32, t.height as f32) * origin)
    }

    fn ensure_ring(&mut self, renderer: &TileRenderer, slots: usize) {
        if self.ring.as_ref().is_some_and(|r| r.slots >= slots) {
            return;
        }
        let slots = slots.next_power_of_two().max(4);
        let buffer = renderer.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tile_uniform_ring"),
            size: slots as u64 * UNIFORM_SLOT_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tile_uniform_ring_bg"),
            layout: &renderer.pipelines.uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<TileUniforms>() as u64),
                }),
            }],
        });
        self.ring = Some(UniformRing { buffer, bind_group, slots });
    }

    fn upload_shadows(&mut self, renderer: &TileRenderer) {
        if self.shadow_vertices.is_empty() {
            return;
        }
        let bytes: &[u8] = bytemuck::cast_slice(&self.shadow_vertices);
        let needed = bytes.len() as u64;
        if self.shadow_buffer.as_ref().is_none_or(|(_, size)| *size < needed) {
            let size = needed.next_power_of_two();
            let buffer = renderer.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("shadow_vertices"),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.shadow_buffer = Some((buffer, size));
        }
        if let Some((buffer, _)) = &self.shadow_buffer {
            renderer.queue.write_buffer(buffer, 0, bytes);
        }
    }

    /// Draw the band raster onto `output_view`, mapping raster pixels
    /// through `transform` into an output of `output_size` pixels.
    pub fn compose(
        &mut self,
        renderer: &TileRenderer,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
        output_size: (u32, u32),
        transform: Affine2,
    ) {
        self.ensure_ring(renderer, self.uniforms.len());
        let (Some(target), Some(ring)) = (self.target.as_ref(), self.ring.as_ref()) else {
            return;
        };

        let projection =
            ortho_mat4(output_size.0 as f32, output_size.1 as f32) * affine_to_mat4(transform);
        let uniforms =
            TileUniforms::new(projection, [target.width as f32, target.height as f32], [0.0, 0.0]);
        renderer.queue.write_buffer(&ring.buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tilemap_compose"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&renderer.pipelines.compose);
        pass.set_bind_group(0, &ring.bind_group, &[0]);
        pass.set_bind_group(1, &target.bind_group, &[]);
        pass.set_vertex_buffer(0, target.quad.slice(..));
        pass.draw(0..6, 0..1);
    }
}

impl RasterTarget for GpuRaster {
    type Context<'a> = GpuFrame<'a>;

    fn size(&self) -> Option<(u32, u32)> {
        self.target.as_ref().map(|t| (t.width, t.height))
    }

    fn reset(&mut self, ctx: &mut GpuFrame<'_>, width: u32, height: u32) {
        self.sync_generation(ctx.renderer.generation);
        self.commands.clear();
        self.uniforms.truncate(1);
        self.shadow_vertices.clear();
        if self.size() == Some((width, height)) {
            return;
        }

        let renderer = &*ctx.renderer;
        let texture = renderer.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("zband_raster"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: BAND_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = renderer.texture_bind_group("zband_raster_bg", &view);
        let full = QuadRecord::new([0.0, 0.0], [0.0, 0.0], [width as f32, height as f32]);
        let quad = renderer.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("zband_quad"),
            contents: bytemuck::cast_slice(&RectVertex::quad(&full)[..]),
            usage: wgpu::BufferUsages::VERTEX,
        });

        debug!(width, height, "z-band raster allocated");
        self.target = Some(BandTarget { view, bind_group, quad, width, height });
    }

    fn draw_tiles(
        &mut self,
        ctx: &mut GpuFrame<'_>,
        layer: &mut TileLayer,
        mode: VertexMode,
        frame: &FrameParams,
    ) {
        let Some(projection) = self.layer_projection(frame) else {
            return;
        };
        let Some(tileset) = layer.texture().cloned() else {
            return;
        };
        let Some(sampler_size) = ctx.renderer.prepare_tileset(&tileset) else {
            return;
        };
        let repacked = layer.prepare_vertices(mode);
        let Some(buffer) = ctx.renderer.prepare_layer_buffer(layer, repacked) else {
            return;
        };

        let slot = self.push_uniforms(TileUniforms::new(
            projection,
            sampler_size,
            frame.animation_offset.to_array(),
        ));
        self.commands.push(DrawCmd::Tiles {
            mode,
            buffer,
            tileset,
            slot,
            records: layer.len() as u32,
        });
    }

    fn fill_rects(
        &mut self,
        _ctx: &mut GpuFrame<'_>,
        rects: &[FillRect],
        color: [f32; 4],
        frame: &FrameParams,
    ) {
        let Some(projection) = self.layer_projection(frame) else {
            return;
        };
        let first = self.shadow_vertices.len() as u32;
        for r in rects {
            let (x0, y0, x1, y1) = (r.x, r.y, r.x + r.width, r.y + r.height);
            for position in [[x0, y0], [x1, y0], [x1, y1], [x0, y0], [x1, y1], [x0, y1]] {
                self.shadow_vertices.push(ShadowVertex { position, color });
            }
        }
        let last = self.shadow_vertices.len() as u32;
        if last > first {
            let slot = self.push_uniforms(TileUniforms::new(projection, [1.0, 1.0], [0.0, 0.0]));
            self.commands.push(DrawCmd::Shadows { slot, vertices: first..last });
        }
    }

    fn finish(&mut self, ctx: &mut GpuFrame<'_>) {
        if self.target.is_none() {
            return;
        }
        self.ensure_ring(ctx.renderer, self.uniforms.len());
        self.upload_shadows(ctx.renderer);

        let renderer = &*ctx.renderer;
        let (Some(target), Some(ring)) = (self.target.as_ref(), self.ring.as_ref()) else {
            return;
        };
        for (slot, uniforms) in self.uniforms.iter().enumerate().skip(1) {
            renderer.queue.write_buffer(
                &ring.buffer,
                slot as u64 * UNIFORM_SLOT_SIZE,
                bytemuck::bytes_of(uniforms),
            );
        }

        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("zband_paint"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for cmd in &self.commands {
            match cmd {
                DrawCmd::Tiles { mode, buffer, tileset, slot, records } => {
                    let (Some(entry), Some(gpu)) =
                        (renderer.pool.get(*buffer), renderer.find_tileset(tileset))
                    else {
                        continue;
                    };
                    let bytes = *records as u64 * mode.record_stride() as u64;
                    let offset = (*slot as u64 * UNIFORM_SLOT_SIZE) as u32;
                    pass.set_bind_group(0, &ring.bind_group, &[offset]);
                    pass.set_bind_group(1, &gpu.bind_group, &[]);
                    pass.set_vertex_buffer(0, entry.buffer.slice(..bytes));
                    match mode {
                        VertexMode::Square => {
                            pass.set_pipeline(&renderer.pipelines.square);
                            pass.draw(0..6, 0..*records);
                        }
                        VertexMode::Rect => {
                            pass.set_pipeline(&renderer.pipelines.rect);
                            pass.draw(0..*records * 6, 0..1);
                        }
                    }
                }
                DrawCmd::Shadows { slot, vertices } => {
                    let Some((buffer, _)) = &self.shadow_buffer else {
                        continue;
                    };
                    let offset = (*slot as u64 * UNIFORM_SLOT_SIZE) as u32;
                    pass.set_pipeline(&renderer.pipelines.shadow);
                    pass.set_bind_group(0, &ring.bind_group, &[offset]);
                    pass.set_vertex_buffer(0, buffer.slice(..));
                    pass.draw(vertices.clone(), 0..1);
                }
            }
        }
        drop(pass);
        self.commands.clear();
    }
}

// ── Tilemap entry point ───────────────────────────────────────────────────────

impl Tilemap<GpuRaster> {
    /// A tilemap whose bands paint on the GPU.  Rasters are allocated on the
    /// first [`render_gpu`](Self::render_gpu).
    pub fn gpu(config: TilemapConfig) -> Self {
        Self::new(config, GpuRaster::new(), GpuRaster::new())
    }

    /// Repaint stale bands and compose both onto `output_view`.
    ///
    /// `world` maps tilemap space to output pixels.  Everything is recorded
    /// into `encoder`; the caller submits it.  Returns how many bands were
    /// repainted.
    pub fn render_gpu(
        &mut self,
        renderer: &mut TileRenderer,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
        output_size: (u32, u32),
        world: Affine2,
    ) -> usize {
        let generation = renderer.generation();
        for band in self.bands_mut() {
            band.raster_mut().sync_generation(generation);
        }

        let painted = {
            let mut frame = GpuFrame { renderer: &mut *renderer, encoder: &mut *encoder };
            self.paint_bands(&mut frame)
        };

        for band in self.bands_mut() {
            if !band.transform.visible {
                continue;
            }
            let placed = world * Affine2::from_translation(band.transform.position);
            band.raster_mut().compose(renderer, encoder, output_view, output_size, placed);
        }
        painted
    }
}
