// Scrolls a generated map through the GPU tilemap.  Arrow keys move the
// view; pass a JSON config path as the first argument to override defaults.
use std::collections::HashSet;
use std::sync::Arc;

use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use shader_tilemap::autotile::{SET_A1, SET_A2, SET_A5, SET_B};
use shader_tilemap::map_data::{MapData, SHADOW_PLANE};
use shader_tilemap::tile_code::{self, TileFlags};
use shader_tilemap::{GpuRaster, TileRenderer, Tilemap, TilemapConfig, Tileset};

const MAP_W: usize = 64;
const MAP_H: usize = 48;
const SCROLL_SPEED: f32 = 4.0;

// ── Generated content ─────────────────────────────────────────────────────────

/// A sheet of `cols × rows` tiles; each half-tile gets its own shade of
/// `base` so autotile quadrants stay distinguishable.
fn generated_sheet(cols: u32, rows: u32, tile: u32, base: [u8; 3]) -> RgbaImage {
    let half = (tile / 2).max(1);
    RgbaImage::from_fn(cols * tile, rows * tile, |x, y| {
        let (qx, qy) = (x / half, y / half);
        let shade = ((qx * 7 + qy * 13) % 5) as u8 * 12;
        let edge = x % half == 0 || y % half == 0;
        let k = if edge { 30 } else { shade };
        Rgba([
            base[0].saturating_sub(k),
            base[1].saturating_sub(k),
            base[2].saturating_sub(k),
            255,
        ])
    })
}

fn generated_tilesets(tile: u32) -> Vec<Option<Arc<Tileset>>> {
    let mut sets = vec![None; 9];
    sets[SET_A1] = Some(Tileset::loaded("A1", generated_sheet(16, 12, tile, [40, 90, 200])));
    sets[SET_A2] = Some(Tileset::loaded("A2", generated_sheet(16, 12, tile, [90, 170, 70])));
    sets[SET_A5] = Some(Tileset::loaded("A5", generated_sheet(8, 16, tile, [160, 140, 110])));
    sets[SET_B] = Some(Tileset::loaded("B", generated_sheet(16, 16, tile, [200, 120, 60])));
    sets
}

fn generated_map() -> (MapData, TileFlags) {
    let mut map = MapData::new(MAP_W, MAP_H);
    let grass = tile_code::TILE_ID_A2;
    let water = tile_code::TILE_ID_A1;
    let path = tile_code::TILE_ID_A5 + 1;
    let crate_tile = tile_code::TILE_ID_B + 3;
    let tree_top = tile_code::TILE_ID_B + 9;

    for y in 0..MAP_H as i32 {
        for x in 0..MAP_W as i32 {
            let in_pond = (x - 20).pow(2) + (y - 16).pow(2) < 36;
            let code = if in_pond {
                water
            } else if x % 12 == 5 || y % 10 == 3 {
                path
            } else {
                grass
            };
            map.write(x, y, 0, code);
            if (x * 31 + y * 17) % 23 == 0 && !in_pond {
                map.write(x, y, 2, crate_tile);
                map.write(x + 1, y, SHADOW_PLANE, 0b0101);
            }
            if (x * 13 + y * 7) % 29 == 0 && !in_pond {
                map.write(x, y, 3, tree_top);
            }
        }
    }

    let mut flags = TileFlags::default();
    flags.insert(tree_top, tile_code::FLAG_HIGHER);
    (map, flags)
}

fn load_config() -> TilemapConfig {
    let Some(path) = std::env::args().nth(1) else {
        return TilemapConfig::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(json) => TilemapConfig::from_json(&json).unwrap_or_else(|e| {
            warn!(%path, error = %e, "invalid config, using defaults");
            TilemapConfig::default()
        }),
        Err(e) => {
            warn!(%path, error = %e, "could not read config, using defaults");
            TilemapConfig::default()
        }
    }
}

// ── Viewer ────────────────────────────────────────────────────────────────────

struct Viewer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: TileRenderer,
    tilemap: Tilemap<GpuRaster>,
    keys_held: HashSet<KeyCode>,
}

impl Viewer {
    async fn new(window: Arc<Window>, config: TilemapConfig) -> Self {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(Arc::clone(&window)).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .expect("no suitable GPU adapter found");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .expect("failed to create device");

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats[0];
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let renderer = TileRenderer::new(device, queue, format, config.buffer_idle_ms);

        let tile = config.tile_width;
        let mut tilemap = Tilemap::gpu(config);
        let (map, flags) = generated_map();
        tilemap.set_map(map);
        tilemap.set_flags(flags);
        tilemap.set_tilesets(generated_tilesets(tile));
        tilemap.resize(surface_config.width, surface_config.height);

        Self { window, surface, surface_config, renderer, tilemap, keys_held: HashSet::new() }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(self.renderer.device(), &self.surface_config);
        self.tilemap.resize(width, height);
    }

    fn scroll(&mut self) {
        let mut delta = Vec2::ZERO;
        for (key, dir) in [
            (KeyCode::ArrowLeft, Vec2::NEG_X),
            (KeyCode::ArrowRight, Vec2::X),
            (KeyCode::ArrowUp, Vec2::NEG_Y),
            (KeyCode::ArrowDown, Vec2::Y),
        ] {
            if self.keys_held.contains(&key) {
                delta += dir;
            }
        }
        self.tilemap.origin += delta * SCROLL_SPEED;
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("viewer") });

        {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewer_clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        let size = (self.surface_config.width, self.surface_config.height);
        self.tilemap.render_gpu(&mut self.renderer, &mut encoder, &view, size, Affine2::IDENTITY);

        self.renderer.queue().submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

// ── App (winit ApplicationHandler) ────────────────────────────────────────────

struct App {
    config: TilemapConfig,
    viewer: Option<Viewer>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("tilemap viewer")
                        .with_inner_size(winit::dpi::PhysicalSize::new(
                            self.config.width,
                            self.config.height,
                        )),
                )
                .unwrap(),
        );
        self.viewer = Some(pollster::block_on(Viewer::new(window, self.config.clone())));
        info!("viewer ready");
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_ref() {
            viewer.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(viewer) = self.viewer.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => viewer.resize(size.width, size.height),

            WindowEvent::RedrawRequested => {
                viewer.scroll();
                viewer.tilemap.update();
                match viewer.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = viewer.window.inner_size();
                        viewer.resize(size.width, size.height);
                    }
                    Err(e) => error!(error = %e, "render error"),
                }
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                ..
            } => match state {
                ElementState::Pressed => {
                    if code == KeyCode::Escape {
                        event_loop.exit();
                    }
                    viewer.keys_held.insert(code);
                }
                ElementState::Released => {
                    viewer.keys_held.remove(&code);
                }
            },

            _ => {}
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config();
    let event_loop = EventLoop::new().unwrap();
    let mut app = App { config, viewer: None };
    event_loop.run_app(&mut app).unwrap();
}
