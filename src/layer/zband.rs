use tracing::trace;

use super::{FrameParams, Layer, LayerTransform, RasterTarget};

/// Layers sharing one z value, rasterized together into a cached target.
///
/// The target is only repainted when something it shows changed; otherwise
/// the previous raster is composed again as-is.
pub struct ZBandCache<T: RasterTarget> {
    pub z: i32,
    pub transform: LayerTransform,
    layers: Vec<Layer>,
    raster: T,
    last_layer_count: Option<usize>,
    last_animation_frame: Option<u32>,
}

impl<T: RasterTarget> ZBandCache<T> {
    pub fn new(z: i32, raster: T) -> Self {
        Self {
            z,
            transform: LayerTransform::default(),
            layers: Vec::new(),
            raster,
            last_layer_count: None,
            last_animation_frame: None,
        }
    }

    /// Append a layer; returns its index.
    pub fn push(&mut self, layer: impl Into<Layer>) -> usize {
        self.layers.push(layer.into());
        self.layers.len() - 1
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn raster(&self) -> &T {
        &self.raster
    }

    pub fn raster_mut(&mut self) -> &mut T {
        &mut self.raster
    }

    /// Whether painting for `frame` at `width × height` would change the
    /// cached raster.  Has no side effects.
    pub fn is_dirty(&self, width: u32, height: u32, frame: &FrameParams) -> bool {
        let phase_changed = self.last_animation_frame != Some(frame.animation_frame);
        self.raster.size() != Some((width, height))
            || self.last_layer_count != Some(self.layers.len())
            || self.layers.iter().any(|l| l.is_modified(phase_changed))
    }

    /// Repaint the raster if [`is_dirty`](Self::is_dirty).  Returns whether
    /// it painted.
    pub fn paint_if_dirty(
        &mut self,
        ctx: &mut T::Context<'_>,
        width: u32,
        height: u32,
        frame: &FrameParams,
    ) -> bool {
        let dirty = self.is_dirty(width, height, frame);
        self.last_animation_frame = Some(frame.animation_frame);
        if !dirty {
            return false;
        }

        self.raster.reset(ctx, width, height);
        for layer in &mut self.layers {
            let transform = *layer.transform();
            if transform.visible {
                let local = frame.translated(transform.position);
                layer.rasterize(&mut self.raster, ctx, &local);
            }
            layer.clear_modify();
        }
        self.raster.finish(ctx);
        self.last_layer_count = Some(self.layers.len());

        trace!(z = self.z, width, height, frame = frame.animation_frame, "z-band repainted");
        true
    }

    /// Empty every layer's contents, keeping the layers.
    pub fn clear_layers(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
    }
}
