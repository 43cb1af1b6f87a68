pub mod composite;
pub mod overlay;
pub mod tile_layer;
pub mod zband;

pub use composite::CompositeLayer;
pub use overlay::OverlayLayer;
pub use tile_layer::{RectVertex, SquareVertex, TileLayer, VertexMode};
pub use zband::ZBandCache;

use glam::Vec2;

use crate::quad::FillRect;

// ── LayerTransform ────────────────────────────────────────────────────────────

/// Placement of a layer relative to its parent, held by value in every layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayerTransform {
    pub position: Vec2,
    pub visible: bool,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self { position: Vec2::ZERO, visible: true }
    }
}

// ── FrameParams ───────────────────────────────────────────────────────────────

/// Per-frame inputs shared by every layer drawn in a pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameParams {
    /// Raw animation frame counter; a change means animated quads must be
    /// redrawn.
    pub animation_frame: u32,
    /// Pixel shift applied to a quad's source, scaled by its anim factors.
    pub animation_offset: Vec2,
    /// Where the layer being drawn sits inside the raster target.
    pub origin: Vec2,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self { animation_frame: 0, animation_offset: Vec2::ZERO, origin: Vec2::ZERO }
    }
}

impl FrameParams {
    pub fn new(animation_frame: u32, animation_offset: Vec2) -> Self {
        Self { animation_frame, animation_offset, origin: Vec2::ZERO }
    }

    /// Same frame, drawn `by` pixels further into the target.
    pub fn translated(&self, by: Vec2) -> Self {
        Self { origin: self.origin + by, ..*self }
    }
}

// ── RasterTarget ──────────────────────────────────────────────────────────────

/// Surface a z-band rasterizes its layers into.
///
/// Implemented by the CPU canvas (`canvas::CanvasRaster`) and the GPU
/// offscreen target (`renderer::GpuRaster`).  `Context` carries whatever
/// borrowed state the target needs while painting (nothing for the canvas,
/// device/queue/encoder for the GPU).
pub trait RasterTarget {
    type Context<'a>;

    /// Current size, or `None` before the first paint.
    fn size(&self) -> Option<(u32, u32)>;

    /// Resize to `width × height` if needed and clear to transparent.
    fn reset(&mut self, ctx: &mut Self::Context<'_>, width: u32, height: u32);

    /// Draw every record of `layer`, sampling its tileset.
    fn draw_tiles(
        &mut self,
        ctx: &mut Self::Context<'_>,
        layer: &mut TileLayer,
        mode: VertexMode,
        frame: &FrameParams,
    );

    /// Blend solid `color` rectangles.
    fn fill_rects(
        &mut self,
        ctx: &mut Self::Context<'_>,
        rects: &[FillRect],
        color: [f32; 4],
        frame: &FrameParams,
    );

    /// Called once after all layers of a repaint were drawn.
    fn finish(&mut self, _ctx: &mut Self::Context<'_>) {}
}

// ── Layer ─────────────────────────────────────────────────────────────────────

/// The layer kinds a z-band can hold.
#[derive(Debug)]
pub enum Layer {
    Composite(CompositeLayer),
    Overlay(OverlayLayer),
}

impl Layer {
    pub fn transform(&self) -> &LayerTransform {
        match self {
            Layer::Composite(l) => &l.transform,
            Layer::Overlay(l) => &l.transform,
        }
    }

    pub fn transform_mut(&mut self) -> &mut LayerTransform {
        match self {
            Layer::Composite(l) => &mut l.transform,
            Layer::Overlay(l) => &mut l.transform,
        }
    }

    pub fn rasterize<T: RasterTarget>(
        &mut self,
        target: &mut T,
        ctx: &mut T::Context<'_>,
        frame: &FrameParams,
    ) {
        match self {
            Layer::Composite(l) => l.rasterize(target, ctx, frame),
            Layer::Overlay(l) => l.rasterize(target, ctx, frame),
        }
    }

    pub fn is_modified(&self, anim_changed: bool) -> bool {
        match self {
            Layer::Composite(l) => l.is_modified(anim_changed),
            Layer::Overlay(l) => l.is_modified(),
        }
    }

    pub fn clear_modify(&mut self) {
        match self {
            Layer::Composite(l) => l.clear_modify(),
            Layer::Overlay(l) => l.clear_modify(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Layer::Composite(l) => l.clear(),
            Layer::Overlay(l) => l.clear(),
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeLayer> {
        match self {
            Layer::Composite(l) => Some(l),
            Layer::Overlay(_) => None,
        }
    }

    pub fn as_composite_mut(&mut self) -> Option<&mut CompositeLayer> {
        match self {
            Layer::Composite(l) => Some(l),
            Layer::Overlay(_) => None,
        }
    }

    pub fn as_overlay(&self) -> Option<&OverlayLayer> {
        match self {
            Layer::Overlay(l) => Some(l),
            Layer::Composite(_) => None,
        }
    }

    pub fn as_overlay_mut(&mut self) -> Option<&mut OverlayLayer> {
        match self {
            Layer::Overlay(l) => Some(l),
            Layer::Composite(_) => None,
        }
    }
}

impl From<CompositeLayer> for Layer {
    fn from(layer: CompositeLayer) -> Self {
        Layer::Composite(layer)
    }
}

impl From<OverlayLayer> for Layer {
    fn from(layer: OverlayLayer) -> Self {
        Layer::Overlay(layer)
    }
}
