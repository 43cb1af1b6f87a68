use std::sync::Arc;

use crate::autotile::DecodedTile;
use crate::quad::QuadRecord;
use crate::tileset::Tileset;

use super::{FrameParams, LayerTransform, RasterTarget, TileLayer, VertexMode};

/// Tile layers indexed by texture-set slot, drawn in slot order.
#[derive(Debug)]
pub struct CompositeLayer {
    pub transform: LayerTransform,
    children: Vec<TileLayer>,
    mode: VertexMode,
    /// Child count at the last `clear_modify`; `None` once the children were
    /// rebuilt.
    child_marker: Option<usize>,
}

impl CompositeLayer {
    pub fn new(mode: VertexMode) -> Self {
        Self {
            transform: LayerTransform::default(),
            children: Vec::new(),
            mode,
            child_marker: Some(0),
        }
    }

    pub fn mode(&self) -> VertexMode {
        self.mode
    }

    /// Switching mode re-packs every child on its next draw.
    pub fn set_mode(&mut self, mode: VertexMode) {
        self.mode = mode;
    }

    /// Rebuild one child per tileset slot.  Slots without a tileset still get
    /// a child so indices keep lining up; quads aimed at them are dropped.
    /// The next dirty check always reports a change.
    pub fn set_tilesets(&mut self, tilesets: &[Option<Arc<Tileset>>]) {
        self.children = tilesets.iter().cloned().map(TileLayer::new).collect();
        self.child_marker = None;
    }

    pub fn children(&self) -> &[TileLayer] {
        &self.children
    }

    pub fn child(&self, set: usize) -> Option<&TileLayer> {
        self.children.get(set)
    }

    pub fn child_mut(&mut self, set: usize) -> Option<&mut TileLayer> {
        self.children.get_mut(set)
    }

    /// Append `quad` to the child for `set`.  Returns `false` when there is no
    /// such slot or it has no tileset.
    pub fn add_rect(&mut self, set: usize, quad: QuadRecord) -> bool {
        match self.children.get_mut(set) {
            Some(child) if child.texture().is_some() => {
                child.add_rect(quad);
                true
            }
            _ => false,
        }
    }

    pub fn add_decoded(&mut self, tile: &DecodedTile) -> bool {
        match self.children.get_mut(tile.set) {
            Some(child) if child.texture().is_some() => {
                for &quad in &tile.quads {
                    child.add_rect(quad);
                }
                true
            }
            _ => false,
        }
    }

    pub fn quad_count(&self) -> usize {
        self.children.iter().map(TileLayer::len).sum()
    }

    pub fn is_modified(&self, anim_changed: bool) -> bool {
        self.child_marker != Some(self.children.len())
            || self.children.iter().any(|c| c.is_modified(anim_changed))
    }

    pub fn clear_modify(&mut self) {
        self.child_marker = Some(self.children.len());
        for child in &mut self.children {
            child.clear_modify();
        }
    }

    /// Empty every child, keeping the slots.
    pub fn clear(&mut self) {
        for child in &mut self.children {
            child.clear();
        }
    }

    /// Draw each non-empty child whose tileset has loaded.  Children with a
    /// pending tileset keep their records and are tried again next paint.
    pub fn rasterize<T: RasterTarget>(
        &mut self,
        target: &mut T,
        ctx: &mut T::Context<'_>,
        frame: &FrameParams,
    ) {
        for child in &mut self.children {
            if child.is_empty() {
                continue;
            }
            let ready = child.texture().is_some_and(|t| t.is_ready());
            child.set_deferred(!ready);
            if ready {
                target.draw_tiles(ctx, child, self.mode, frame);
            }
        }
    }
}
