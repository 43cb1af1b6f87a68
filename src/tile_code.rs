// =============================================================================
// TILE_CODE.RS — Tile code ranges and classification
//
// A map cell stores u16 tile codes.  The code space is split into fixed ranges:
// - B, C, D, E:  plain 256-tile sheets (B starts at 0)
// - A5:          plain 128-tile floor sheet
// - A1..A4:      autotile families, 48 shapes per kind
// =============================================================================

pub const TILE_ID_B: u16 = 0;
pub const TILE_ID_C: u16 = 256;
pub const TILE_ID_D: u16 = 512;
pub const TILE_ID_E: u16 = 768;
pub const TILE_ID_A5: u16 = 1536;
pub const TILE_ID_A1: u16 = 2048;
pub const TILE_ID_A2: u16 = 2816;
pub const TILE_ID_A3: u16 = 4352;
pub const TILE_ID_A4: u16 = 5888;
pub const TILE_ID_MAX: u16 = 8192;

/// Number of shapes per autotile kind.
pub const AUTOTILE_SHAPES: u16 = 48;

/// Flag bit: tile is drawn above characters (star passability).
pub const FLAG_HIGHER: u16 = 0x10;
/// Flag bit: A2 tile is a raised "counter" with a visible front edge.
pub const FLAG_TABLE: u16 = 0x80;

#[inline]
pub fn is_visible(code: u16) -> bool {
    code > 0 && code < TILE_ID_MAX
}

#[inline]
pub fn is_autotile(code: u16) -> bool {
    code >= TILE_ID_A1
}

/// Autotile kind; meaningful only when `is_autotile(code)`.
#[inline]
pub fn autotile_kind(code: u16) -> u16 {
    code.saturating_sub(TILE_ID_A1) / AUTOTILE_SHAPES
}

/// Autotile shape (0..48); meaningful only when `is_autotile(code)`.
#[inline]
pub fn autotile_shape(code: u16) -> u16 {
    code.saturating_sub(TILE_ID_A1) % AUTOTILE_SHAPES
}

#[inline]
pub fn is_a1(code: u16) -> bool {
    (TILE_ID_A1..TILE_ID_A2).contains(&code)
}

#[inline]
pub fn is_a2(code: u16) -> bool {
    (TILE_ID_A2..TILE_ID_A3).contains(&code)
}

#[inline]
pub fn is_a3(code: u16) -> bool {
    (TILE_ID_A3..TILE_ID_A4).contains(&code)
}

#[inline]
pub fn is_a4(code: u16) -> bool {
    (TILE_ID_A4..TILE_ID_MAX).contains(&code)
}

#[inline]
pub fn is_a5(code: u16) -> bool {
    (TILE_ID_A5..TILE_ID_A1).contains(&code)
}

/// Walls and roofs cast their own shading, so no table edge is drawn below them.
#[inline]
pub fn is_shadowing(code: u16) -> bool {
    is_a3(code) || is_a4(code)
}

// ── TileFlags ────────────────────────────────────────────────────────────────

/// Per-code tileset flags.  Codes past the end of the table read as 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileFlags(pub Vec<u16>);

impl TileFlags {
    pub fn new(flags: Vec<u16>) -> Self {
        Self(flags)
    }

    pub fn get(&self, code: u16) -> u16 {
        self.0.get(code as usize).copied().unwrap_or(0)
    }

    /// Set `bits` on `code`, growing the table as needed.
    pub fn insert(&mut self, code: u16, bits: u16) {
        let idx = code as usize;
        if self.0.len() <= idx {
            self.0.resize(idx + 1, 0);
        }
        self.0[idx] |= bits;
    }

    pub fn is_higher(&self, code: u16) -> bool {
        self.get(code) & FLAG_HIGHER != 0
    }

    pub fn is_table(&self, code: u16) -> bool {
        is_a2(code) && self.get(code) & FLAG_TABLE != 0
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_max_are_invisible() {
        assert!(!is_visible(0));
        assert!(!is_visible(TILE_ID_MAX));
        assert!(is_visible(1));
        assert!(is_visible(TILE_ID_MAX - 1));
    }

    #[test]
    fn kind_and_shape_split_code() {
        let code = TILE_ID_A2 + 48 * 3 + 17;
        assert_eq!(autotile_kind(code), 16 + 3);
        assert_eq!(autotile_shape(code), 17);
    }

    #[test]
    fn families_are_disjoint() {
        for code in [TILE_ID_A1, TILE_ID_A2, TILE_ID_A3, TILE_ID_A4, TILE_ID_A5] {
            let hits = [is_a1(code), is_a2(code), is_a3(code), is_a4(code), is_a5(code)]
                .iter()
                .filter(|&&b| b)
                .count();
            assert_eq!(hits, 1, "code {code}");
        }
    }

    #[test]
    fn table_flag_only_counts_on_a2() {
        let mut flags = TileFlags::default();
        flags.insert(TILE_ID_A2, FLAG_TABLE);
        flags.insert(TILE_ID_A3, FLAG_TABLE);
        assert!(flags.is_table(TILE_ID_A2));
        assert!(!flags.is_table(TILE_ID_A3));
        assert!(!flags.is_table(9000));
    }
}
