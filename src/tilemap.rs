//! The tilemap: decides which cells are on screen, feeds their decoded quads
//! into the layers, and keeps the two z-bands up to date.
//!
//! ```text
//! lower band (z 0):  lowest composite │ shadow overlay │ lower composite
//! upper band (z 4):  upper composite
//! ```
//!
//! The bands cover one tile more than the visible area in each direction and
//! are only refilled when the top-left visible cell changes.  Scrolling within
//! a tile just moves the bands.

use std::sync::Arc;

use glam::{IVec2, Vec2};
use tracing::debug;

use crate::autotile::{decode_shadow, decode_table_edge, decode_tile, DecodedTile};
use crate::config::TilemapConfig;
use crate::layer::{
    CompositeLayer, FrameParams, Layer, OverlayLayer, RasterTarget, VertexMode, ZBandCache,
};
use crate::map_data::{MapData, SHADOW_PLANE};
use crate::tile_code::{self, TileFlags};
use crate::tileset::Tileset;

pub const LOWER_Z: i32 = 0;
pub const UPPER_Z: i32 = 4;

// Layer indices inside the bands.
const LOWEST: usize = 0;
const SHADOW: usize = 1;
const LOWER: usize = 2;
const UPPER: usize = 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LayerSlot {
    Lowest,
    Lower,
    Upper,
}

pub struct Tilemap<T: RasterTarget> {
    config: TilemapConfig,
    /// Scroll position in pixels.
    pub origin: Vec2,
    map: MapData,
    flags: TileFlags,
    tilesets: Vec<Option<Arc<Tileset>>>,
    last_tileset_count: Option<usize>,

    lower: ZBandCache<T>,
    upper: ZBandCache<T>,
    layer_width: u32,
    layer_height: u32,

    needs_repaint: bool,
    last_start: Option<IVec2>,
    animation_count: u32,
    animation_frame: u32,
}

impl<T: RasterTarget> Tilemap<T> {
    /// `lower` and `upper` are the raster targets of the two bands.
    pub fn new(config: TilemapConfig, lower: T, upper: T) -> Self {
        let mode = if config.square_shader { VertexMode::Square } else { VertexMode::Rect };

        let mut lower = ZBandCache::new(LOWER_Z, lower);
        lower.push(CompositeLayer::new(mode));
        lower.push(OverlayLayer::new(config.shadow_color));
        lower.push(CompositeLayer::new(mode));

        let mut upper = ZBandCache::new(UPPER_Z, upper);
        upper.push(CompositeLayer::new(mode));

        let mut tilemap = Self {
            config,
            origin: Vec2::ZERO,
            map: MapData::default(),
            flags: TileFlags::default(),
            tilesets: Vec::new(),
            last_tileset_count: None,
            lower,
            upper,
            layer_width: 0,
            layer_height: 0,
            needs_repaint: true,
            last_start: None,
            animation_count: 0,
            animation_frame: 0,
        };
        tilemap.update_layer_size();
        tilemap
    }

    fn update_layer_size(&mut self) {
        let (tw, th) = self.tile_size_px();
        let cols = self.config.width.div_ceil(tw) + 1;
        let rows = self.config.height.div_ceil(th) + 1;
        self.layer_width = cols * tw;
        self.layer_height = rows * th;
        self.needs_repaint = true;
    }

    fn tile_size_px(&self) -> (u32, u32) {
        (self.config.tile_width.max(1), self.config.tile_height.max(1))
    }

    fn tile_size(&self) -> Vec2 {
        let (tw, th) = self.tile_size_px();
        Vec2::new(tw as f32, th as f32)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &TilemapConfig {
        &self.config
    }

    /// Pixel size of the band rasters.
    pub fn layer_size(&self) -> (u32, u32) {
        (self.layer_width, self.layer_height)
    }

    /// Change the visible area.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.update_layer_size();
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    /// Edit the map in place.  Forces a repaint.
    pub fn map_mut(&mut self) -> &mut MapData {
        self.needs_repaint = true;
        &mut self.map
    }

    /// Replace the map's codes.  Wrap flags and overpass cells carry over.
    pub fn set_data(&mut self, width: usize, height: usize, codes: Vec<u16>) {
        self.map.replace_codes(width, height, codes);
        self.needs_repaint = true;
    }

    pub fn set_map(&mut self, map: MapData) {
        self.map = map;
        self.needs_repaint = true;
    }

    pub fn set_wrap(&mut self, horizontal: bool, vertical: bool) {
        self.map.horizontal_wrap = horizontal;
        self.map.vertical_wrap = vertical;
        self.needs_repaint = true;
    }

    pub fn flags(&self) -> &TileFlags {
        &self.flags
    }

    pub fn set_flags(&mut self, flags: TileFlags) {
        self.flags = flags;
        self.needs_repaint = true;
    }

    pub fn tilesets(&self) -> &[Option<Arc<Tileset>>] {
        &self.tilesets
    }

    /// Put `tileset` in `slot`.  A new slot count takes effect on the next
    /// [`refresh`](Self::refresh); an existing slot is swapped right away.
    pub fn set_tileset(&mut self, slot: usize, tileset: Option<Arc<Tileset>>) {
        if self.tilesets.len() <= slot {
            self.tilesets.resize(slot + 1, None);
        }
        self.tilesets[slot] = tileset.clone();
        for composite in self.composites_mut() {
            if let Some(child) = composite.child_mut(slot) {
                child.set_texture(tileset.clone());
            }
        }
        self.needs_repaint = true;
    }

    pub fn set_tilesets(&mut self, tilesets: Vec<Option<Arc<Tileset>>>) {
        self.tilesets = tilesets;
        self.last_tileset_count = None;
        self.refresh();
    }

    pub fn lower_band(&self) -> &ZBandCache<T> {
        &self.lower
    }

    pub fn upper_band(&self) -> &ZBandCache<T> {
        &self.upper
    }

    /// Bands in draw order.
    pub fn bands(&self) -> [&ZBandCache<T>; 2] {
        [&self.lower, &self.upper]
    }

    pub fn bands_mut(&mut self) -> [&mut ZBandCache<T>; 2] {
        [&mut self.lower, &mut self.upper]
    }

    pub fn shadow_layer(&self) -> Option<&OverlayLayer> {
        self.lower.layer(SHADOW).and_then(Layer::as_overlay)
    }

    pub fn lowest_layer(&self) -> Option<&CompositeLayer> {
        self.lower.layer(LOWEST).and_then(Layer::as_composite)
    }

    pub fn lower_layer(&self) -> Option<&CompositeLayer> {
        self.lower.layer(LOWER).and_then(Layer::as_composite)
    }

    pub fn upper_layer(&self) -> Option<&CompositeLayer> {
        self.upper.layer(UPPER).and_then(Layer::as_composite)
    }

    fn composite_mut(&mut self, slot: LayerSlot) -> Option<&mut CompositeLayer> {
        match slot {
            LayerSlot::Lowest => self.lower.layer_mut(LOWEST),
            LayerSlot::Lower => self.lower.layer_mut(LOWER),
            LayerSlot::Upper => self.upper.layer_mut(UPPER),
        }
        .and_then(Layer::as_composite_mut)
    }

    fn shadow_layer_mut(&mut self) -> Option<&mut OverlayLayer> {
        self.lower.layer_mut(SHADOW).and_then(Layer::as_overlay_mut)
    }

    fn composites_mut(&mut self) -> impl Iterator<Item = &mut CompositeLayer> {
        self.lower
            .layers_mut()
            .iter_mut()
            .chain(self.upper.layers_mut().iter_mut())
            .filter_map(Layer::as_composite_mut)
    }

    // ── Animation ─────────────────────────────────────────────────────────────

    /// Advance the animation clock by one tick.
    pub fn update(&mut self) {
        self.animation_count = self.animation_count.wrapping_add(1);
        self.animation_frame = self.animation_count / self.config.animation_interval.max(1);
    }

    pub fn animation_frame(&self) -> u32 {
        self.animation_frame
    }

    /// Source shift for the current animation frame.  Water cycles through
    /// columns 0, 1, 2, 1; waterfalls through rows 0, 1, 2.
    pub fn animation_offset(&self) -> Vec2 {
        let tile = self.tile_size();
        let af = match self.animation_frame % 4 {
            3 => 1,
            n => n,
        };
        Vec2::new(af as f32 * tile.x, (self.animation_frame % 3) as f32 * tile.y)
    }

    pub fn frame_params(&self) -> FrameParams {
        FrameParams::new(self.animation_frame, self.animation_offset())
    }

    // ── Painting ──────────────────────────────────────────────────────────────

    /// Force a full repaint, rebuilding the layer slots if the number of
    /// tilesets changed.
    pub fn refresh(&mut self) {
        if self.last_tileset_count != Some(self.tilesets.len()) {
            self.last_tileset_count = Some(self.tilesets.len());
            let tilesets = self.tilesets.clone();
            for composite in self.composites_mut() {
                composite.set_tilesets(&tilesets);
            }
            if let Some(shadow) = self.shadow_layer_mut() {
                shadow.clear();
            }
            debug!(tilesets = tilesets.len(), "tilemap layers rebuilt");
        }
        self.needs_repaint = true;
    }

    /// Top-left cell of the painted window for the current origin.
    pub fn start_cell(&self) -> IVec2 {
        let (tw, th) = self.tile_size_px();
        let o = self.origin.floor();
        let margin = self.config.margin as f32;
        IVec2::new(
            ((o.x - margin) / tw as f32).floor() as i32,
            ((o.y - margin) / th as f32).floor() as i32,
        )
    }

    /// Move the bands to follow `origin` and refill the layers when the
    /// window moved by a whole cell.  Returns whether the layers were
    /// refilled.
    pub fn update_transform(&mut self) -> bool {
        let start = self.start_cell();
        let tile = self.tile_size();
        let position = start.as_vec2() * tile - self.origin.floor();
        self.lower.transform.position = position;
        self.upper.transform.position = position;

        if !self.needs_repaint && self.last_start == Some(start) {
            return false;
        }
        self.last_start = Some(start);
        self.paint_all_tiles(start);
        self.needs_repaint = false;
        true
    }

    fn paint_all_tiles(&mut self, start: IVec2) {
        self.lower.clear_layers();
        self.upper.clear_layers();
        let shadow_color = self.config.shadow_color;
        if let Some(shadow) = self.shadow_layer_mut() {
            shadow.set_color(shadow_color);
        }

        let (tw, th) = self.tile_size_px();
        let cols = (self.layer_width / tw) as i32;
        let rows = (self.layer_height / th) as i32;
        for y in 0..rows {
            for x in 0..cols {
                self.paint_tiles(start, x, y);
            }
        }

        debug!(
            start_x = start.x,
            start_y = start.y,
            lowest = self.lowest_layer().map_or(0, CompositeLayer::quad_count),
            lower = self.lower_layer().map_or(0, CompositeLayer::quad_count),
            upper = self.upper_layer().map_or(0, CompositeLayer::quad_count),
            shadows = self.shadow_layer().map_or(0, OverlayLayer::len),
            "tilemap repainted"
        );
    }

    fn paint_tiles(&mut self, start: IVec2, x: i32, y: i32) {
        let (mx, my) = (start.x + x, start.y + y);
        let tile = self.tile_size();
        let dest = Vec2::new(x as f32, y as f32) * tile;

        let code = |z: usize| self.map.read(mx, my, z);
        let ids = [code(0), code(1), code(2), code(3)];
        let shadow_bits = code(SHADOW_PLANE);
        let upper_id1 = self.map.read(mx, my - 1, 1);

        let by_height = |id: u16, otherwise: LayerSlot| {
            if self.flags.is_higher(id) { LayerSlot::Upper } else { otherwise }
        };
        let mut slots = [
            by_height(ids[0], LayerSlot::Lowest),
            by_height(ids[1], LayerSlot::Lowest),
            by_height(ids[2], LayerSlot::Lower),
            by_height(ids[3], LayerSlot::Lower),
        ];
        if self.map.is_overpass(mx, my) {
            slots[2] = LayerSlot::Upper;
            slots[3] = LayerSlot::Upper;
        }

        let table_edge = self.flags.is_table(upper_id1)
            && !self.flags.is_table(ids[1])
            && !tile_code::is_shadowing(ids[0]);

        for z in 0..2 {
            self.draw_tile(slots[z], ids[z], dest, tile);
        }

        let shadows = decode_shadow(shadow_bits, dest, tile);
        if !shadows.is_empty() {
            if let Some(shadow) = self.shadow_layer_mut() {
                shadow.extend(shadows);
            }
        }

        if table_edge {
            if let Some(edge) = decode_table_edge(upper_id1, dest, tile) {
                self.push_decoded(LayerSlot::Lower, &edge);
            }
        }

        for z in 2..4 {
            self.draw_tile(slots[z], ids[z], dest, tile);
        }
    }

    fn draw_tile(&mut self, slot: LayerSlot, code: u16, dest: Vec2, tile: Vec2) {
        if let Some(decoded) = decode_tile(code, &self.flags, dest, tile) {
            self.push_decoded(slot, &decoded);
        }
    }

    fn push_decoded(&mut self, slot: LayerSlot, decoded: &DecodedTile) {
        if let Some(composite) = self.composite_mut(slot) {
            composite.add_decoded(decoded);
        }
    }

    /// Follow the origin, then repaint whichever band rasters are stale.
    /// Returns how many bands were repainted.
    pub fn paint_bands(&mut self, ctx: &mut T::Context<'_>) -> usize {
        self.update_transform();
        let frame = self.frame_params();
        let (w, h) = (self.layer_width, self.layer_height);
        let mut painted = 0;
        for band in self.bands_mut() {
            if band.paint_if_dirty(ctx, w, h, &frame) {
                painted += 1;
            }
        }
        painted
    }
}
