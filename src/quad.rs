use smallvec::SmallVec;

// ── QuadRecord ────────────────────────────────────────────────────────────────

/// One textured rectangle: a `width × height` region of the tileset at
/// (`source_x`, `source_y`) copied to (`dest_x`, `dest_y`) in layer space.
///
/// `anim_x` / `anim_y` scale the frame's animation offset before it is added
/// to the source position; 0 means the quad never animates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QuadRecord {
    pub source_x: f32,
    pub source_y: f32,
    pub dest_x: f32,
    pub dest_y: f32,
    pub width: f32,
    pub height: f32,
    pub anim_x: f32,
    pub anim_y: f32,
}

impl QuadRecord {
    pub fn new(source: [f32; 2], dest: [f32; 2], size: [f32; 2]) -> Self {
        Self {
            source_x: source[0],
            source_y: source[1],
            dest_x: dest[0],
            dest_y: dest[1],
            width: size[0],
            height: size[1],
            anim_x: 0.0,
            anim_y: 0.0,
        }
    }

    pub fn with_anim(mut self, anim_x: f32, anim_y: f32) -> Self {
        self.anim_x = anim_x;
        self.anim_y = anim_y;
        self
    }

    #[inline]
    pub fn is_animated(&self) -> bool {
        self.anim_x > 0.0 || self.anim_y > 0.0
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

/// Re-express `quad` as the records the square draw path can consume.
///
/// A `width × height` rect whose width is a whole multiple of its height
/// becomes `width / height` side-by-side squares.  Any other non-square rect
/// is kept as a single record; only the rect path draws it correctly.
pub fn split_square(quad: QuadRecord) -> SmallVec<[QuadRecord; 4]> {
    let mut out = SmallVec::new();
    if quad.width <= 0.0 || quad.height <= 0.0 {
        return out;
    }
    if quad.is_square() || quad.width % quad.height != 0.0 {
        out.push(quad);
        return out;
    }

    let side = quad.height;
    let count = (quad.width / side) as usize;
    for i in 0..count {
        let step = i as f32 * side;
        out.push(QuadRecord {
            source_x: quad.source_x + step,
            dest_x: quad.dest_x + step,
            width: side,
            ..quad
        });
    }
    out
}

// ── FillRect ──────────────────────────────────────────────────────────────────

/// Untextured rectangle in layer space, filled with the overlay's colour.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FillRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_is_kept_as_is() {
        let q = QuadRecord::new([0.0, 0.0], [10.0, 10.0], [24.0, 24.0]);
        assert_eq!(split_square(q).as_slice(), &[q]);
    }

    #[test]
    fn wide_rect_splits_into_squares() {
        let q = QuadRecord::new([48.0, 12.0], [0.0, 6.0], [24.0, 12.0]).with_anim(2.0, 0.0);
        let parts = split_square(q);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].source_x, 48.0);
        assert_eq!(parts[1].source_x, 60.0);
        assert_eq!(parts[1].dest_x, 12.0);
        assert!(parts.iter().all(|p| p.width == 12.0 && p.height == 12.0));
        assert!(parts.iter().all(|p| p.anim_x == 2.0));
    }

    #[test]
    fn uneven_rect_is_kept_whole() {
        let q = QuadRecord::new([0.0, 0.0], [0.0, 0.0], [20.0, 12.0]);
        let parts = split_square(q);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].width, 20.0);
    }

    #[test]
    fn degenerate_rect_is_dropped() {
        let q = QuadRecord::new([0.0, 0.0], [0.0, 0.0], [0.0, 12.0]);
        assert!(split_square(q).is_empty());
    }
}
