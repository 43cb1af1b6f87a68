use std::sync::Arc;

use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};
use shader_tilemap::autotile::{SET_A2, SET_B};
use shader_tilemap::canvas::CanvasRaster;
use shader_tilemap::config::TilemapConfig;
use shader_tilemap::layer::CompositeLayer;
use shader_tilemap::map_data::{MapData, SHADOW_PLANE};
use shader_tilemap::tile_code::{TileFlags, FLAG_HIGHER, FLAG_TABLE, TILE_ID_A2};
use shader_tilemap::tilemap::Tilemap;
use shader_tilemap::tileset::Tileset;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn small_config() -> TilemapConfig {
    TilemapConfig { width: 96, height: 96, margin: 0, ..TilemapConfig::default() }
}

fn solid_sheets() -> Vec<Option<Arc<Tileset>>> {
    (0..=SET_B)
        .map(|i| Some(Tileset::loaded(format!("sheet{i}"), RgbaImage::from_pixel(768, 576, RED))))
        .collect()
}

/// 3×3 visible cells over a 4×4 map, every slot a solid red sheet.
fn tilemap() -> Tilemap<CanvasRaster> {
    let mut tilemap = Tilemap::canvas(small_config());
    tilemap.set_tilesets(solid_sheets());
    tilemap.set_map(MapData::new(4, 4));
    tilemap
}

fn count(layer: Option<&CompositeLayer>, set: usize) -> usize {
    layer.and_then(|l| l.child(set)).map_or(0, |c| c.len())
}

#[test]
fn test_layer_size_covers_one_extra_tile() {
    let tilemap = Tilemap::canvas(TilemapConfig::default());
    assert_eq!(tilemap.layer_size(), (864, 672));
    assert_eq!(tilemap.bands().len(), 2);
    assert_eq!(tilemap.lower_band().layers().len(), 3);
    assert_eq!(tilemap.upper_band().layers().len(), 1);
}

#[test]
fn test_scrolling_within_a_tile_only_moves_the_bands() {
    let mut tilemap = tilemap();
    assert!(tilemap.update_transform());
    assert!(!tilemap.update_transform());

    tilemap.origin = Vec2::new(10.0, 0.0);
    assert!(!tilemap.update_transform());
    assert_eq!(tilemap.lower_band().transform.position, Vec2::new(-10.0, 0.0));
    assert_eq!(tilemap.upper_band().transform.position, Vec2::new(-10.0, 0.0));

    tilemap.origin = Vec2::new(48.0, 0.0);
    assert!(tilemap.update_transform());
    assert_eq!(tilemap.lower_band().transform.position, Vec2::ZERO);
}

#[test]
fn test_margin_widens_the_window() {
    let config = TilemapConfig { margin: 20, ..small_config() };
    let tilemap = Tilemap::canvas(config);
    assert_eq!(tilemap.start_cell(), glam::IVec2::new(-1, -1));
}

#[test]
fn test_unchanged_bands_are_not_repainted() {
    let mut tilemap = tilemap();
    tilemap.map_mut().write(0, 0, 0, 1);
    assert_eq!(tilemap.paint_bands(&mut ()), 2);
    assert_eq!(tilemap.paint_bands(&mut ()), 0);

    tilemap.map_mut().write(1, 0, 0, 2);
    // Only the lower band gained quads.
    assert_eq!(tilemap.paint_bands(&mut ()), 1);
}

#[test]
fn test_higher_tiles_go_to_the_upper_band() {
    let mut tilemap = tilemap();
    let mut flags = TileFlags::default();
    flags.insert(1, FLAG_HIGHER);
    tilemap.set_flags(flags);
    tilemap.map_mut().write(0, 0, 0, 1);
    tilemap.map_mut().write(1, 0, 0, 2);
    tilemap.update_transform();

    assert_eq!(count(tilemap.upper_layer(), SET_B), 1);
    assert_eq!(count(tilemap.lowest_layer(), SET_B), 1);
}

#[test]
fn test_overpass_lifts_upper_planes() {
    let mut tilemap = tilemap();
    let map = tilemap.map_mut();
    map.write(1, 1, 0, 3);
    map.write(1, 1, 2, 2);
    map.set_overpass(1, 1, true);
    tilemap.update_transform();

    assert_eq!(count(tilemap.upper_layer(), SET_B), 1);
    assert_eq!(count(tilemap.lower_layer(), SET_B), 0);
    assert_eq!(count(tilemap.lowest_layer(), SET_B), 1);
}

#[test]
fn test_shadow_plane_fills_quadrants() {
    let mut tilemap = tilemap();
    tilemap.map_mut().write(2, 2, SHADOW_PLANE, 0b0011);
    tilemap.update_transform();

    let shadow = tilemap.shadow_layer().unwrap();
    assert_eq!(shadow.len(), 2);
    assert_eq!((shadow.rects()[0].x, shadow.rects()[0].y), (96.0, 96.0));
    assert_eq!(shadow.color(), tilemap.config().shadow_color);
}

#[test]
fn test_table_edge_below_table_tile() {
    let table = TILE_ID_A2;
    let mut tilemap = tilemap();
    let mut flags = TileFlags::default();
    flags.insert(table, FLAG_TABLE);
    tilemap.set_flags(flags);
    tilemap.map_mut().write(1, 0, 1, table);
    tilemap.update_transform();

    // Two 24×12 edge quads, each split into two squares.
    let lower = tilemap.lower_layer().unwrap();
    assert_eq!(count(Some(lower), SET_A2), 4);
    let first = lower.child(SET_A2).unwrap().records()[0];
    assert_eq!((first.dest_x, first.dest_y), (48.0, 48.0));

    // The table itself stays on the lowest layer.  Shape 0 has no front
    // quadrants, so it decodes to the plain four.
    assert_eq!(count(tilemap.lowest_layer(), SET_A2), 4);
}

#[test]
fn test_animation_offset_cycles() {
    let config = TilemapConfig { animation_interval: 1, ..small_config() };
    let mut tilemap = Tilemap::canvas(config);
    assert_eq!(tilemap.animation_offset(), Vec2::ZERO);

    tilemap.update();
    assert_eq!(tilemap.animation_frame(), 1);
    assert_eq!(tilemap.animation_offset(), Vec2::new(48.0, 48.0));

    tilemap.update();
    assert_eq!(tilemap.animation_offset(), Vec2::new(96.0, 96.0));

    tilemap.update();
    assert_eq!(tilemap.animation_offset(), Vec2::new(48.0, 0.0));
}

#[test]
fn test_render_canvas_draws_tiles() {
    let mut tilemap = tilemap();
    tilemap.map_mut().write(0, 0, 0, 1);
    let mut output = RgbaImage::new(96, 96);
    tilemap.render_canvas(&mut output, Affine2::IDENTITY);

    assert_eq!(*output.get_pixel(10, 10), RED);
    assert_eq!(output.get_pixel(60, 10)[3], 0);
}

#[test]
fn test_refresh_rebuilds_slots_on_count_change() {
    let mut tilemap = Tilemap::canvas(small_config());
    tilemap.set_tilesets(vec![None, None, None]);
    assert_eq!(tilemap.lowest_layer().unwrap().children().len(), 3);

    tilemap.set_tileset(SET_B, Some(Tileset::pending("B")));
    assert_eq!(tilemap.upper_layer().unwrap().children().len(), 3);

    tilemap.refresh();
    assert_eq!(tilemap.upper_layer().unwrap().children().len(), SET_B + 1);
    assert!(tilemap.upper_layer().unwrap().child(SET_B).unwrap().texture().is_some());
}

#[test]
fn test_pending_tileset_is_painted_once_loaded() {
    let mut tilesets = solid_sheets();
    let pending = Tileset::pending("B");
    tilesets[SET_B] = Some(Arc::clone(&pending));

    let mut tilemap = Tilemap::canvas(small_config());
    tilemap.set_tilesets(tilesets);
    tilemap.set_map(MapData::new(4, 4));
    tilemap.map_mut().write(0, 0, 0, 1);

    let mut output = RgbaImage::new(96, 96);
    tilemap.render_canvas(&mut output, Affine2::IDENTITY);
    assert_eq!(output.get_pixel(10, 10)[3], 0);

    pending.fulfil(RgbaImage::from_pixel(768, 768, RED));
    assert_eq!(tilemap.paint_bands(&mut ()), 1);
    tilemap.render_canvas(&mut output, Affine2::IDENTITY);
    assert_eq!(*output.get_pixel(10, 10), RED);
}

#[test]
fn test_horizontal_wrap_repeats_the_map() {
    let mut tilemap = tilemap();
    tilemap.set_data(2, 2, vec![0; 2 * 2 * 5]);
    tilemap.map_mut().write(0, 0, 0, 1);
    tilemap.update_transform();
    assert_eq!(count(tilemap.lowest_layer(), SET_B), 1);

    tilemap.set_wrap(true, false);
    tilemap.update_transform();
    assert_eq!(count(tilemap.lowest_layer(), SET_B), 2);

    tilemap.set_data(2, 2, vec![0; 2 * 2 * 5]);
    assert!(tilemap.map().horizontal_wrap);
}

#[test]
fn test_set_data_keeps_overpass_cells() {
    let mut tilemap = tilemap();
    tilemap.map_mut().set_overpass(1, 1, true);
    tilemap.set_data(2, 2, vec![0; 2 * 2 * 5]);
    assert!(tilemap.map().is_overpass(1, 1));

    tilemap.map_mut().write(1, 1, 2, 2);
    tilemap.update_transform();
    assert_eq!(count(tilemap.upper_layer(), SET_B), 1);
    assert_eq!(count(tilemap.lower_layer(), SET_B), 0);
}

#[test]
fn test_swapping_tilesets_wipes_tiles_of_removed_sheet() {
    let mut tilemap = tilemap();
    tilemap.map_mut().write(0, 0, 0, 1);
    let mut output = RgbaImage::new(96, 96);
    tilemap.render_canvas(&mut output, Affine2::IDENTITY);
    assert_eq!(*output.get_pixel(10, 10), RED);

    // Same slot count, B sheet removed: nothing lands in the B child.
    let mut tilesets = solid_sheets();
    tilesets[SET_B] = None;
    tilemap.set_tilesets(tilesets);
    assert_eq!(tilemap.paint_bands(&mut ()), 2);
    assert_eq!(count(tilemap.lowest_layer(), SET_B), 0);

    let mut output = RgbaImage::new(96, 96);
    tilemap.render_canvas(&mut output, Affine2::IDENTITY);
    assert_eq!(output.get_pixel(10, 10)[3], 0);
}
