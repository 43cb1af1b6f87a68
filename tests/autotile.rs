use glam::Vec2;
use shader_tilemap::autotile::*;
use shader_tilemap::tile_code::{self, TileFlags, FLAG_TABLE, TILE_ID_A1, TILE_ID_A2, TILE_ID_A3, TILE_ID_A5, TILE_ID_MAX};

const TILE: Vec2 = Vec2::new(48.0, 48.0);

fn a2(kind: u16, shape: u16) -> u16 {
    TILE_ID_A2 + kind * 48 + shape
}

#[test]
fn test_visibility_threshold() {
    let flags = TileFlags::default();
    assert!(decode_tile(0, &flags, Vec2::ZERO, TILE).is_none());
    assert!(decode_tile(TILE_ID_MAX, &flags, Vec2::ZERO, TILE).is_none());
    assert!(decode_tile(1, &flags, Vec2::ZERO, TILE).is_some());
}

#[test]
fn test_first_a5_tile() {
    let flags = TileFlags::default();
    let tile = decode_tile(TILE_ID_A5, &flags, Vec2::new(96.0, 48.0), TILE).unwrap();
    assert_eq!(tile.set, SET_A5);
    assert_eq!(tile.quads.len(), 1);
    let q = tile.quads[0];
    assert_eq!((q.source_x, q.source_y, q.width, q.height), (0.0, 0.0, 48.0, 48.0));
    assert_eq!((q.dest_x, q.dest_y), (96.0, 48.0));
    assert!(!q.is_animated());
}

#[test]
fn test_normal_tile_sheet_layout() {
    let flags = TileFlags::default();

    let q = decode_tile(9, &flags, Vec2::ZERO, TILE).unwrap();
    assert_eq!(q.set, SET_B);
    assert_eq!((q.quads[0].source_x, q.quads[0].source_y), (48.0, 48.0));

    // Second half of the B sheet.
    let q = decode_tile(128 + 3, &flags, Vec2::ZERO, TILE).unwrap();
    assert_eq!((q.quads[0].source_x, q.quads[0].source_y), (11.0 * 48.0, 0.0));

    // C sheet.
    assert_eq!(decode_tile(256 + 1, &flags, Vec2::ZERO, TILE).unwrap().set, SET_B + 1);
}

#[test]
fn test_autotile_emits_four_quadrants_inside_cell() {
    let flags = TileFlags::default();
    let dest = Vec2::new(144.0, 96.0);
    let tile = decode_tile(a2(0, 0), &flags, dest, TILE).unwrap();
    assert_eq!(tile.set, SET_A2);
    assert_eq!(tile.quads.len(), 4);
    for q in &tile.quads {
        assert_eq!((q.width, q.height), (24.0, 24.0));
        assert!(q.dest_x >= dest.x && q.dest_x + q.width <= dest.x + 48.0);
        assert!(q.dest_y >= dest.y && q.dest_y + q.height <= dest.y + 48.0);
    }
    // Floor shape 0, quadrant 0 reads half-tile (2, 4) of block (0, 0).
    assert_eq!((tile.quads[0].source_x, tile.quads[0].source_y), (48.0, 96.0));
}

#[test]
fn test_every_autotile_code_stays_inside_its_cell() {
    let plain = TileFlags::default();
    let tables = TileFlags::new(vec![FLAG_TABLE; TILE_ID_MAX as usize]);
    let dest = Vec2::new(96.0, 48.0);
    let mut decoded = 0;

    for code in TILE_ID_A1..TILE_ID_MAX {
        let Some(tile) = decode_tile(code, &plain, dest, TILE) else {
            assert!(decode_tile(code, &tables, dest, TILE).is_none());
            continue;
        };
        decoded += 1;
        assert_eq!(tile.quads.len(), 4, "code {code}");

        let table = decode_tile(code, &tables, dest, TILE).unwrap();
        // Every front quadrant adds one half-height quad.
        let fronts = table.quads.iter().filter(|q| q.height == 12.0).count();
        assert_eq!(table.quads.len(), 4 + fronts, "code {code}");
        if !tile_code::is_a2(code) {
            assert_eq!(fronts, 0, "code {code}");
        }

        for q in tile.quads.iter().chain(&table.quads) {
            assert!(q.width > 0.0 && q.height > 0.0, "code {code}");
            assert!(q.dest_x >= dest.x && q.dest_x + q.width <= dest.x + 48.0, "code {code}");
            assert!(q.dest_y >= dest.y && q.dest_y + q.height <= dest.y + 48.0, "code {code}");
        }
    }
    assert!(decoded > 0);
}

#[test]
fn test_table_variant_splits_front_quadrants() {
    // Shape 47 has its two lower quadrants on half-tile row 1.
    let code = a2(0, 47);
    let mut flags = TileFlags::default();
    flags.insert(code, FLAG_TABLE);

    let plain = decode_tile(code, &TileFlags::default(), Vec2::ZERO, TILE).unwrap();
    assert_eq!(plain.quads.len(), 4);

    let table = decode_tile(code, &flags, Vec2::ZERO, TILE).unwrap();
    assert_eq!(table.quads.len(), 6);
    for q in &table.quads {
        assert!(q.dest_x >= 0.0 && q.dest_x + q.width <= 48.0);
        assert!(q.dest_y >= 0.0 && q.dest_y + q.height <= 48.0);
    }

    // Bottom-left quadrant: table-row quad, then half-height original row.
    let edge = table.quads[2];
    let front = table.quads[3];
    assert_eq!((edge.dest_x, edge.dest_y, edge.width, edge.height), (0.0, 24.0, 24.0, 24.0));
    assert_eq!(edge.source_y, 3.0 * 24.0);
    assert_eq!((front.dest_y, front.height), (36.0, 12.0));
}

#[test]
fn test_water_animates_horizontally() {
    let tile = decode_tile(TILE_ID_A1, &TileFlags::default(), Vec2::ZERO, TILE).unwrap();
    assert_eq!(tile.set, SET_A1);
    assert!(tile.quads.iter().all(|q| q.anim_x == 2.0 && q.anim_y == 0.0));
}

#[test]
fn test_waterfall_animates_vertically() {
    let code = TILE_ID_A1 + 5 * 48;
    let tile = decode_tile(code, &TileFlags::default(), Vec2::ZERO, TILE).unwrap();
    assert!(tile.quads.iter().all(|q| q.anim_x == 0.0 && q.anim_y == 1.0));

    // Waterfalls only have four shapes.
    assert!(decode_tile(code + 4, &TileFlags::default(), Vec2::ZERO, TILE).is_none());
}

#[test]
fn test_missing_wall_shape_yields_nothing() {
    let code = TILE_ID_A3 + 20;
    assert!(tile_code::is_a3(code));
    assert!(decode_tile(code, &TileFlags::default(), Vec2::ZERO, TILE).is_none());
}

#[test]
fn test_table_edge_is_two_half_height_quads() {
    let dest = Vec2::new(48.0, 48.0);
    let edge = decode_table_edge(a2(1, 0), dest, TILE).unwrap();
    assert_eq!(edge.set, SET_A2);
    assert_eq!(edge.quads.len(), 2);
    assert_eq!((edge.quads[0].dest_x, edge.quads[0].dest_y), (48.0, 48.0));
    assert_eq!((edge.quads[1].dest_x, edge.quads[1].dest_y), (72.0, 48.0));
    assert!(edge.quads.iter().all(|q| q.width == 24.0 && q.height == 12.0));

    assert!(decode_table_edge(TILE_ID_A3, dest, TILE).is_none());
}

#[test]
fn test_shadow_bits_select_quadrants() {
    let rects = decode_shadow(0b0101, Vec2::new(48.0, 0.0), TILE);
    assert_eq!(rects.len(), 2);
    assert_eq!((rects[0].x, rects[0].y), (48.0, 0.0));
    assert_eq!((rects[1].x, rects[1].y), (48.0, 24.0));
    assert!(rects.iter().all(|r| r.width == 24.0 && r.height == 24.0));

    assert!(decode_shadow(0, Vec2::ZERO, TILE).is_empty());
    assert!(decode_shadow(0xf0, Vec2::ZERO, TILE).is_empty());
}
