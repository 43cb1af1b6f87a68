pub mod autotile;
pub mod buffer_pool;
pub mod canvas;
pub mod config;
pub mod layer;
pub mod map_data;
pub mod quad;
pub mod renderer;
pub mod tile_code;
pub mod tilemap;
pub mod tileset;

pub use buffer_pool::{BufferId, Clock, SystemClock, VertexBufferPool};
pub use canvas::CanvasRaster;
pub use config::TilemapConfig;
pub use layer::{FrameParams, Layer, LayerTransform, RasterTarget, VertexMode, ZBandCache};
pub use map_data::MapData;
pub use quad::{FillRect, QuadRecord};
pub use renderer::{GpuFrame, GpuRaster, TileRenderer};
pub use tile_code::TileFlags;
pub use tilemap::Tilemap;
pub use tileset::Tileset;
