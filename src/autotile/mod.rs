//! Tile code → textured quads.
//!
//! Every function here is pure: it reads a tile code (plus the tileset flags
//! where needed) and returns the quads to draw, tagged with the texture-set
//! slot they sample from.  Codes that cannot be drawn yield no geometry.
//!
//! Texture-set slots:
//! ```text
//! 0: A1  animated water / waterfalls     5: B
//! 1: A2  ground (may be a raised table)  6: C
//! 2: A3  building walls                  7: D
//! 3: A4  walls                           8: E
//! 4: A5  plain floor tiles
//! ```

pub mod tables;

use glam::Vec2;
use smallvec::SmallVec;

use crate::quad::{FillRect, QuadRecord};
use crate::tile_code::{self, TileFlags};
use tables::ShapeTable;

pub const SET_A1: usize = 0;
pub const SET_A2: usize = 1;
pub const SET_A3: usize = 2;
pub const SET_A4: usize = 3;
pub const SET_A5: usize = 4;
pub const SET_B: usize = 5;

/// Quads produced for one tile code, all sampling texture-set `set`.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedTile {
    pub set: usize,
    pub quads: SmallVec<[QuadRecord; 8]>,
}

/// Top-left corner of quadrant `i` (0 = TL, 1 = TR, 2 = BL, 3 = BR) of the
/// cell whose top-left corner is `dest`.
#[inline]
pub fn quadrant_origin(i: usize, dest: Vec2, half: Vec2) -> Vec2 {
    dest + Vec2::new((i % 2) as f32 * half.x, (i / 2) as f32 * half.y)
}

/// Decode `code` for the cell at pixel position `dest`.
///
/// Returns `None` for invisible codes and for autotile shapes the family's
/// table has no entry for.
pub fn decode_tile(code: u16, flags: &TileFlags, dest: Vec2, tile: Vec2) -> Option<DecodedTile> {
    if !tile_code::is_visible(code) {
        return None;
    }
    if tile_code::is_autotile(code) {
        decode_autotile(code, flags, dest, tile)
    } else {
        Some(decode_normal(code, dest, tile))
    }
}

fn decode_normal(code: u16, dest: Vec2, tile: Vec2) -> DecodedTile {
    let set = if tile_code::is_a5(code) {
        SET_A5
    } else {
        SET_B + (code / 256) as usize
    };

    // B..E sheets are two 8-column halves stacked side by side.
    let col = (code / 128) % 2 * 8 + code % 8;
    let row = (code % 256) / 8 % 16;
    let source = [col as f32 * tile.x, row as f32 * tile.y];

    let mut quads = SmallVec::new();
    quads.push(QuadRecord::new(source, dest.to_array(), tile.to_array()));
    DecodedTile { set, quads }
}

// ── Autotiles ───────────────────────────────────────────────────────────────

/// Where an autotile kind's block sits in its sheet and how it animates.
#[derive(Copy, Clone, Debug, PartialEq)]
struct AutotileBlock {
    set: usize,
    /// Block origin in tile units.
    bx: i32,
    by: i32,
    table: ShapeTable,
    anim_x: f32,
    anim_y: f32,
    raised: bool,
}

fn autotile_block(code: u16, flags: &TileFlags) -> Option<AutotileBlock> {
    let kind = tile_code::autotile_kind(code) as i32;
    let tx = kind % 8;
    let ty = kind / 8;

    let mut block = AutotileBlock {
        set: SET_A1,
        bx: 0,
        by: 0,
        table: ShapeTable::Floor,
        anim_x: 0.0,
        anim_y: 0.0,
        raised: false,
    };

    if tile_code::is_a1(code) {
        match kind {
            0 => block.anim_x = 2.0,
            1 => {
                block.anim_x = 2.0;
                block.by = 3;
            }
            2 => block.bx = 6,
            3 => {
                block.bx = 6;
                block.by = 3;
            }
            _ => {
                block.bx = tx / 4 * 8;
                block.by = ty * 6 + tx / 2 % 2 * 3;
                if kind % 2 == 0 {
                    block.anim_x = 2.0;
                } else {
                    block.bx += 6;
                    block.table = ShapeTable::Waterfall;
                    block.anim_y = 1.0;
                }
            }
        }
    } else if tile_code::is_a2(code) {
        block.set = SET_A2;
        block.bx = tx * 2;
        block.by = (ty - 2) * 3;
        block.raised = flags.is_table(code);
    } else if tile_code::is_a3(code) {
        block.set = SET_A3;
        block.bx = tx * 2;
        block.by = (ty - 6) * 2;
        block.table = ShapeTable::Wall;
    } else if tile_code::is_a4(code) {
        // Rows alternate between 3-tile roof blocks and 2-tile wall blocks.
        let odd = ty % 2 == 1;
        block.set = SET_A4;
        block.bx = tx * 2;
        block.by = ((ty - 10) * 5 + i32::from(odd)) / 2;
        if odd {
            block.table = ShapeTable::Wall;
        }
    } else {
        return None;
    }

    Some(block)
}

fn decode_autotile(code: u16, flags: &TileFlags, dest: Vec2, tile: Vec2) -> Option<DecodedTile> {
    let block = autotile_block(code, flags)?;
    let entry = block.table.entry(tile_code::autotile_shape(code))?;

    let half = tile * 0.5;
    let mut quads = SmallVec::new();

    for (i, &[qsx, qsy]) in entry.iter().enumerate() {
        let source = half_tile_source(&block, qsx as i32, qsy as i32, half);
        let corner = quadrant_origin(i, dest, half);

        if block.raised && (qsy == 1 || qsy == 5) {
            // Front face of a raised table: the table-row quadrant covers the
            // cell, then the lower half of the original quadrant is drawn over it.
            let qsx2 = if qsy == 1 { (4 - qsx as i32) % 4 } else { qsx as i32 };
            let edge_source = half_tile_source(&block, qsx2, 3, half);
            quads.push(
                QuadRecord::new(edge_source, corner.to_array(), half.to_array())
                    .with_anim(block.anim_x, block.anim_y),
            );
            quads.push(
                QuadRecord::new(
                    source,
                    [corner.x, corner.y + half.y / 2.0],
                    [half.x, half.y / 2.0],
                )
                .with_anim(block.anim_x, block.anim_y),
            );
        } else {
            quads.push(
                QuadRecord::new(source, corner.to_array(), half.to_array())
                    .with_anim(block.anim_x, block.anim_y),
            );
        }
    }

    Some(DecodedTile { set: block.set, quads })
}

#[inline]
fn half_tile_source(block: &AutotileBlock, qsx: i32, qsy: i32, half: Vec2) -> [f32; 2] {
    [
        (block.bx * 2 + qsx) as f32 * half.x,
        (block.by * 2 + qsy) as f32 * half.y,
    ]
}

/// Front face of the raised A2 tile `code` sitting in the cell above `dest`.
///
/// Only the two lower quadrants of the floor shape are used, each drawn at
/// half height along the top of the current cell.
pub fn decode_table_edge(code: u16, dest: Vec2, tile: Vec2) -> Option<DecodedTile> {
    if !tile_code::is_a2(code) {
        return None;
    }
    let kind = tile_code::autotile_kind(code) as i32;
    let bx = kind % 8 * 2;
    let by = (kind / 8 - 2) * 3;
    let entry = ShapeTable::Floor.entry(tile_code::autotile_shape(code))?;

    let half = tile * 0.5;
    let mut quads = SmallVec::new();
    for i in 0..2 {
        let [qsx, qsy] = entry[2 + i];
        let source = [
            (bx * 2 + qsx as i32) as f32 * half.x,
            (by * 2 + qsy as i32) as f32 * half.y + half.y / 2.0,
        ];
        let corner = quadrant_origin(i, dest, half);
        quads.push(QuadRecord::new(source, corner.to_array(), [half.x, half.y / 2.0]));
    }
    Some(DecodedTile { set: SET_A2, quads })
}

/// One half-tile fill per set bit of the low nibble of `bits`.
pub fn decode_shadow(bits: u16, dest: Vec2, tile: Vec2) -> SmallVec<[FillRect; 4]> {
    let mut rects = SmallVec::new();
    if bits & 0x0f == 0 {
        return rects;
    }
    let half = tile * 0.5;
    for i in 0..4 {
        if bits & (1 << i) != 0 {
            let corner = quadrant_origin(i, dest, half);
            rects.push(FillRect { x: corner.x, y: corner.y, width: half.x, height: half.y });
        }
    }
    rects
}
