use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::buffer_pool::BufferId;
use crate::quad::{split_square, QuadRecord};
use crate::tileset::Tileset;

// ── VertexMode ────────────────────────────────────────────────────────────────

/// How a tile layer's records are turned into vertex data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VertexMode {
    /// One instance per record, expanded to a quad by the vertex shader.
    /// Only correct for square records.
    Square,
    /// Six explicit vertices (two triangles) per record.
    Rect,
}

impl VertexMode {
    pub fn vertices_per_record(self) -> usize {
        match self {
            VertexMode::Square => 1,
            VertexMode::Rect => 6,
        }
    }

    /// Bytes of packed vertex data one record occupies.
    pub fn record_stride(self) -> usize {
        match self {
            VertexMode::Square => std::mem::size_of::<SquareVertex>(),
            VertexMode::Rect => 6 * std::mem::size_of::<RectVertex>(),
        }
    }
}

// ── Vertex formats ────────────────────────────────────────────────────────────

/// Per-instance data for the square path (7 floats).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SquareVertex {
    pub dest: [f32; 2],
    pub source: [f32; 2],
    pub size: f32,
    pub anim: [f32; 2],
}

/// One corner of a rect-path quad (6 floats).  `uv` is in tileset pixels.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RectVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub anim: [f32; 2],
}

impl SquareVertex {
    pub fn from_record(q: &QuadRecord) -> Self {
        Self {
            dest: [q.dest_x, q.dest_y],
            source: [q.source_x, q.source_y],
            size: q.width,
            anim: [q.anim_x, q.anim_y],
        }
    }
}

impl RectVertex {
    /// Corners of `q` in draw order: TL, TR, BR, TL, BR, BL.
    pub fn quad(q: &QuadRecord) -> [Self; 6] {
        let anim = [q.anim_x, q.anim_y];
        let (x0, y0) = (q.dest_x, q.dest_y);
        let (x1, y1) = (q.dest_x + q.width, q.dest_y + q.height);
        let (u0, v0) = (q.source_x, q.source_y);
        let (u1, v1) = (q.source_x + q.width, q.source_y + q.height);

        let tl = Self { position: [x0, y0], uv: [u0, v0], anim };
        let tr = Self { position: [x1, y0], uv: [u1, v0], anim };
        let br = Self { position: [x1, y1], uv: [u1, v1], anim };
        let bl = Self { position: [x0, y1], uv: [u0, v1], anim };
        [tl, tr, br, tl, br, bl]
    }
}

// ── TileLayer ─────────────────────────────────────────────────────────────────

/// Quads that all sample one tileset, plus their packed vertex data.
///
/// Two markers are tracked separately:
/// - `modification_marker`: record count at the last `clear_modify`, drives
///   the z-band's dirty check.  `None` after `clear`, so an emptied layer
///   still gets repainted.
/// - `vertex_marker`: `(mode, vertex_count)` of the last packed block, drives
///   re-packing.
pub struct TileLayer {
    texture: Option<Arc<Tileset>>,
    records: Vec<QuadRecord>,
    modification_marker: Option<usize>,
    has_animation: bool,
    /// Records were skipped last paint because the tileset was pending.
    deferred: bool,

    buffer_id: Option<BufferId>,
    vertex_marker: Option<(VertexMode, usize)>,
    vertices: Vec<u8>,
    populated: usize,
}

impl TileLayer {
    pub fn new(texture: Option<Arc<Tileset>>) -> Self {
        Self {
            texture,
            records: Vec::new(),
            modification_marker: Some(0),
            has_animation: false,
            deferred: false,
            buffer_id: None,
            vertex_marker: None,
            vertices: Vec::new(),
            populated: 0,
        }
    }

    pub fn texture(&self) -> Option<&Arc<Tileset>> {
        self.texture.as_ref()
    }

    pub fn set_texture(&mut self, texture: Option<Arc<Tileset>>) {
        self.texture = texture;
    }

    /// Append a quad.  Wide rects are split into squares first.
    pub fn add_rect(&mut self, quad: QuadRecord) {
        for part in split_square(quad) {
            self.has_animation |= part.is_animated();
            self.records.push(part);
        }
    }

    pub fn records(&self) -> &[QuadRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sticky until `clear`.
    pub fn has_animation(&self) -> bool {
        self.has_animation
    }

    pub fn is_modified(&self, anim_changed: bool) -> bool {
        self.modification_marker != Some(self.records.len())
            || (anim_changed && self.has_animation)
            || (self.deferred && self.texture.as_ref().is_some_and(|t| t.is_ready()))
    }

    /// Record whether the last paint had to skip this layer.
    pub fn set_deferred(&mut self, deferred: bool) {
        self.deferred = deferred;
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn clear_modify(&mut self) {
        self.modification_marker = Some(self.records.len());
    }

    /// Drop all records.  The backing store and pooled buffer are kept.
    pub fn clear(&mut self) {
        if !self.records.is_empty() || self.modification_marker != Some(0) {
            self.modification_marker = None;
        }
        self.records.clear();
        self.vertex_marker = None;
        self.has_animation = false;
        self.deferred = false;
        self.populated = 0;
    }

    pub fn vertex_count(&self, mode: VertexMode) -> usize {
        self.records.len() * mode.vertices_per_record()
    }

    // ── Vertex packing ────────────────────────────────────────────────────────

    /// Pack the records for `mode` unless the last packed block already
    /// matches.  Returns whether anything was written.
    pub fn prepare_vertices(&mut self, mode: VertexMode) -> bool {
        let marker = (mode, self.vertex_count(mode));
        if self.vertex_marker == Some(marker) {
            return false;
        }

        let stride = mode.record_stride();
        let needed = self.records.len() * stride;
        self.reserve_bytes(needed, stride);

        for (i, record) in self.records.iter().enumerate() {
            let dst = &mut self.vertices[i * stride..(i + 1) * stride];
            match mode {
                VertexMode::Square => {
                    dst.copy_from_slice(bytemuck::bytes_of(&SquareVertex::from_record(record)));
                }
                VertexMode::Rect => {
                    let corners = RectVertex::quad(record);
                    dst.copy_from_slice(bytemuck::cast_slice(&corners[..]));
                }
            }
        }

        self.populated = needed;
        self.vertex_marker = Some(marker);
        true
    }

    /// Grow the backing store by doubling (starting at one stride) until it
    /// holds `needed` bytes.  Never shrinks; existing bytes are preserved.
    fn reserve_bytes(&mut self, needed: usize, stride: usize) {
        if self.vertices.len() >= needed {
            return;
        }
        let mut capacity = self.vertices.len().max(stride);
        while capacity < needed {
            capacity *= 2;
        }
        self.vertices.resize(capacity, 0);
    }

    /// Bytes written by the last `prepare_vertices`.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices[..self.populated]
    }

    pub fn populated_bytes(&self) -> usize {
        self.populated
    }

    pub fn capacity_bytes(&self) -> usize {
        self.vertices.len()
    }

    /// Byte range to send to the GPU: just the populated prefix when it is
    /// under half the store, otherwise the whole store.
    pub fn upload_range(&self) -> Range<usize> {
        if self.populated * 2 < self.vertices.len() {
            0..self.populated
        } else {
            0..self.vertices.len()
        }
    }

    pub fn upload_bytes(&self) -> &[u8] {
        &self.vertices[self.upload_range()]
    }

    pub fn buffer_id(&self) -> Option<BufferId> {
        self.buffer_id
    }

    pub fn set_buffer_id(&mut self, id: Option<BufferId>) {
        self.buffer_id = id;
    }
}

impl fmt::Debug for TileLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileLayer")
            .field("texture", &self.texture.as_ref().map(|t| t.name().to_owned()))
            .field("records", &self.records.len())
            .field("modification_marker", &self.modification_marker)
            .field("has_animation", &self.has_animation)
            .field("deferred", &self.deferred)
            .field("buffer_id", &self.buffer_id)
            .field("vertex_marker", &self.vertex_marker)
            .field("capacity_bytes", &self.vertices.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_sizes() {
        assert_eq!(std::mem::size_of::<SquareVertex>(), 28);
        assert_eq!(std::mem::size_of::<RectVertex>(), 24);
        assert_eq!(VertexMode::Rect.record_stride(), 144);
    }

    #[test]
    fn rect_corners_cover_the_quad() {
        let q = QuadRecord::new([10.0, 20.0], [1.0, 2.0], [4.0, 8.0]);
        let c = RectVertex::quad(&q);
        assert_eq!(c[0].position, [1.0, 2.0]);
        assert_eq!(c[1].position, [5.0, 2.0]);
        assert_eq!(c[2].position, [5.0, 10.0]);
        assert_eq!(c[5].position, [1.0, 10.0]);
        assert_eq!(c[2].uv, [14.0, 28.0]);
    }

    #[test]
    fn repack_is_skipped_when_marker_matches() {
        let mut layer = TileLayer::new(None);
        layer.add_rect(QuadRecord::new([0.0, 0.0], [0.0, 0.0], [24.0, 24.0]));
        assert!(layer.prepare_vertices(VertexMode::Square));
        assert!(!layer.prepare_vertices(VertexMode::Square));
        assert!(layer.prepare_vertices(VertexMode::Rect));
    }
}
