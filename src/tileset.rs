use std::sync::{Arc, OnceLock};

use image::RgbaImage;

/// A tileset sheet shared between the layers that sample it.
///
/// Sheets are usually decoded off the render path, so a `Tileset` may exist
/// before its pixels do.  Layers keep recording quads for a pending sheet and
/// simply skip drawing it until [`Tileset::fulfil`] supplies the image.
#[derive(Debug)]
pub struct Tileset {
    name: String,
    image: OnceLock<RgbaImage>,
}

impl Tileset {
    /// A sheet whose image has not arrived yet.
    pub fn pending(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into(), image: OnceLock::new() })
    }

    pub fn loaded(name: impl Into<String>, image: RgbaImage) -> Arc<Self> {
        let tileset = Self { name: name.into(), image: OnceLock::new() };
        let _ = tileset.image.set(image);
        Arc::new(tileset)
    }

    /// Decode a PNG sheet held in memory.
    pub fn from_png(name: impl Into<String>, png_bytes: &[u8]) -> Result<Arc<Self>, image::ImageError> {
        let image = image::load_from_memory(png_bytes)?.to_rgba8();
        Ok(Self::loaded(name, image))
    }

    /// Supply the image of a pending sheet.  Returns `false` if it was
    /// already loaded (the first image wins).
    pub fn fulfil(&self, image: RgbaImage) -> bool {
        self.image.set(image).is_ok()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.get()
    }

    pub fn is_ready(&self) -> bool {
        self.image.get().is_some()
    }

    /// Pixel size, or `None` while pending.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.image.get().map(|img| img.dimensions())
    }
}
