//! CPU rasterization into `image::RgbaImage`.
//!
//! Used when no GPU is available, and by the tests: every record is one
//! clipped blit from the tileset, shadows are blended rectangles, and bands
//! are composed onto the output with an inverse-mapped nearest-neighbour
//! affine copy.

use glam::{Affine2, Vec2};
use image::{Pixel, Rgba, RgbaImage};

use crate::config::TilemapConfig;
use crate::layer::{FrameParams, RasterTarget, TileLayer, VertexMode};
use crate::quad::FillRect;
use crate::tilemap::Tilemap;

#[derive(Debug, Default)]
pub struct CanvasRaster {
    image: Option<RgbaImage>,
}

impl CanvasRaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last painted raster, `None` before the first paint.
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Source-over `self` onto `output`, mapping raster pixels through
    /// `transform`.
    pub fn compose(&self, output: &mut RgbaImage, transform: Affine2) {
        let Some(src) = self.image.as_ref() else {
            return;
        };
        let (sw, sh) = src.dimensions();
        if sw == 0 || sh == 0 || transform.matrix2.determinant() == 0.0 {
            return;
        }

        let corners = [
            Vec2::ZERO,
            Vec2::new(sw as f32, 0.0),
            Vec2::new(0.0, sh as f32),
            Vec2::new(sw as f32, sh as f32),
        ]
        .map(|c| transform.transform_point2(c));
        let min = corners.iter().fold(Vec2::splat(f32::MAX), |a, c| a.min(*c));
        let max = corners.iter().fold(Vec2::splat(f32::MIN), |a, c| a.max(*c));

        let (ow, oh) = output.dimensions();
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(ow);
        let y1 = (max.y.ceil().max(0.0) as u32).min(oh);

        let inverse = transform.inverse();
        for y in y0..y1 {
            for x in x0..x1 {
                let p = inverse.transform_point2(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                if p.x < 0.0 || p.y < 0.0 {
                    continue;
                }
                let (sx, sy) = (p.x as u32, p.y as u32);
                if sx >= sw || sy >= sh {
                    continue;
                }
                let px = *src.get_pixel(sx, sy);
                if px[3] != 0 {
                    output.get_pixel_mut(x, y).blend(&px);
                }
            }
        }
    }
}

/// Copy a `w × h` region of `src` at `(sx, sy)` onto `dst` at `(dx, dy)`,
/// clipping against both images.
fn blit(dst: &mut RgbaImage, src: &RgbaImage, sx: i64, sy: i64, dx: i64, dy: i64, w: i64, h: i64) {
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);

    // Clip the source rect, shifting the destination with it.
    let (mut sx, mut sy, mut dx, mut dy, mut w, mut h) = (sx, sy, dx, dy, w, h);
    if sx < 0 {
        dx -= sx;
        w += sx;
        sx = 0;
    }
    if sy < 0 {
        dy -= sy;
        h += sy;
        sy = 0;
    }
    if dx < 0 {
        sx -= dx;
        w += dx;
        dx = 0;
    }
    if dy < 0 {
        sy -= dy;
        h += dy;
        dy = 0;
    }
    w = w.min(sw - sx).min(dw - dx);
    h = h.min(sh - sy).min(dh - dy);
    if w <= 0 || h <= 0 {
        return;
    }

    for row in 0..h {
        for col in 0..w {
            let px = *src.get_pixel((sx + col) as u32, (sy + row) as u32);
            if px[3] != 0 {
                dst.get_pixel_mut((dx + col) as u32, (dy + row) as u32).blend(&px);
            }
        }
    }
}

fn to_rgba8(color: [f32; 4]) -> Rgba<u8> {
    Rgba(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

impl RasterTarget for CanvasRaster {
    type Context<'a> = ();

    fn size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }

    fn reset(&mut self, _ctx: &mut (), width: u32, height: u32) {
        match &mut self.image {
            Some(img) if img.dimensions() == (width, height) => {
                img.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
            }
            slot => *slot = Some(RgbaImage::new(width, height)),
        }
    }

    fn draw_tiles(
        &mut self,
        _ctx: &mut (),
        layer: &mut TileLayer,
        _mode: VertexMode,
        frame: &FrameParams,
    ) {
        let (Some(dst), Some(sheet)) = (self.image.as_mut(), layer.texture().and_then(|t| t.image()))
        else {
            return;
        };
        for q in layer.records() {
            let sx = q.source_x + q.anim_x * frame.animation_offset.x;
            let sy = q.source_y + q.anim_y * frame.animation_offset.y;
            blit(
                dst,
                sheet,
                sx.round() as i64,
                sy.round() as i64,
                (q.dest_x + frame.origin.x).round() as i64,
                (q.dest_y + frame.origin.y).round() as i64,
                q.width.round() as i64,
                q.height.round() as i64,
            );
        }
    }

    fn fill_rects(&mut self, _ctx: &mut (), rects: &[FillRect], color: [f32; 4], frame: &FrameParams) {
        let Some(dst) = self.image.as_mut() else {
            return;
        };
        let fill = to_rgba8(color);
        let (dw, dh) = (dst.width() as f32, dst.height() as f32);
        for r in rects {
            let x0 = (r.x + frame.origin.x).round().clamp(0.0, dw) as u32;
            let y0 = (r.y + frame.origin.y).round().clamp(0.0, dh) as u32;
            let x1 = (r.x + r.width + frame.origin.x).round().clamp(0.0, dw) as u32;
            let y1 = (r.y + r.height + frame.origin.y).round().clamp(0.0, dh) as u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    dst.get_pixel_mut(x, y).blend(&fill);
                }
            }
        }
    }
}

// ── Tilemap entry point ───────────────────────────────────────────────────────

impl Tilemap<CanvasRaster> {
    pub fn canvas(config: TilemapConfig) -> Self {
        Self::new(config, CanvasRaster::new(), CanvasRaster::new())
    }

    /// Repaint whatever changed and draw both bands onto `output`.
    ///
    /// `world` maps tilemap space to output pixels.
    pub fn render_canvas(&mut self, output: &mut RgbaImage, world: Affine2) {
        self.paint_bands(&mut ());
        for band in self.bands() {
            if band.transform.visible {
                let placed = world * Affine2::from_translation(band.transform.position);
                band.raster().compose(output, placed);
            }
        }
    }
}
