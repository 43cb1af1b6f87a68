use crate::quad::FillRect;

use super::{FrameParams, LayerTransform, RasterTarget};

/// Solid rectangles sharing one fill colour.  Used for drop shadows.
#[derive(Debug)]
pub struct OverlayLayer {
    pub transform: LayerTransform,
    rects: Vec<FillRect>,
    color: [f32; 4],
    /// Rect count at the last `clear_modify`; `None` once cleared.
    rect_marker: Option<usize>,
    painted_color: Option<[f32; 4]>,
}

impl OverlayLayer {
    pub fn new(color: [f32; 4]) -> Self {
        Self {
            transform: LayerTransform::default(),
            rects: Vec::new(),
            color,
            rect_marker: Some(0),
            painted_color: None,
        }
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
    }

    pub fn add_rect(&mut self, rect: FillRect) {
        self.rects.push(rect);
    }

    pub fn extend(&mut self, rects: impl IntoIterator<Item = FillRect>) {
        self.rects.extend(rects);
    }

    pub fn rects(&self) -> &[FillRect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.rect_marker != Some(self.rects.len()) || self.painted_color != Some(self.color)
    }

    pub fn clear_modify(&mut self) {
        self.rect_marker = Some(self.rects.len());
        self.painted_color = Some(self.color);
    }

    pub fn clear(&mut self) {
        if !self.rects.is_empty() || self.rect_marker != Some(0) {
            self.rect_marker = None;
        }
        self.rects.clear();
    }

    pub fn rasterize<T: RasterTarget>(
        &mut self,
        target: &mut T,
        ctx: &mut T::Context<'_>,
        frame: &FrameParams,
    ) {
        if self.rects.is_empty() || self.color[3] <= 0.0 {
            return;
        }
        target.fill_rects(ctx, &self.rects, self.color, frame);
    }
}
