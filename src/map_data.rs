use std::collections::HashSet;

/// Number of stacked planes per cell: four tile layers and the shadow bits.
pub const PLANES: usize = 5;
pub const SHADOW_PLANE: usize = 4;

/// A map as five stacked planes of codes, laid out plane-major:
/// `codes[(z * height + y) * width + x]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapData {
    width: usize,
    height: usize,
    codes: Vec<u16>,
    pub horizontal_wrap: bool,
    pub vertical_wrap: bool,
    overpass: HashSet<(i32, i32)>,
}

impl MapData {
    /// An all-zero map.
    pub fn new(width: usize, height: usize) -> Self {
        Self::from_codes(width, height, vec![0; width * height * PLANES])
    }

    /// Wrap an existing plane-major array.  A short array reads as zero past
    /// its end.
    pub fn from_codes(width: usize, height: usize, codes: Vec<u16>) -> Self {
        Self {
            width,
            height,
            codes,
            horizontal_wrap: false,
            vertical_wrap: false,
            overpass: HashSet::new(),
        }
    }

    /// Swap in new dimensions and codes.  Wrap flags and overpass cells are
    /// kept.
    pub fn replace_codes(&mut self, width: usize, height: usize, codes: Vec<u16>) {
        self.width = width;
        self.height = height;
        self.codes = codes;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn codes(&self) -> &[u16] {
        &self.codes
    }

    fn index(&self, x: i32, y: i32, z: usize) -> Option<usize> {
        if self.width == 0 || self.height == 0 || z >= PLANES {
            return None;
        }
        let (w, h) = (self.width as i32, self.height as i32);
        let x = if self.horizontal_wrap { x.rem_euclid(w) } else { x };
        let y = if self.vertical_wrap { y.rem_euclid(h) } else { y };
        if x < 0 || x >= w || y < 0 || y >= h {
            return None;
        }
        Some((z * self.height + y as usize) * self.width + x as usize)
    }

    /// Code at `(x, y)` on plane `z`, applying wrap.  Out of range reads 0.
    pub fn read(&self, x: i32, y: i32, z: usize) -> u16 {
        self.index(x, y, z).and_then(|i| self.codes.get(i).copied()).unwrap_or(0)
    }

    /// Store a code.  Returns `false` when the cell is out of range.
    pub fn write(&mut self, x: i32, y: i32, z: usize, code: u16) -> bool {
        match self.index(x, y, z) {
            Some(i) if i < self.codes.len() => {
                self.codes[i] = code;
                true
            }
            _ => false,
        }
    }

    /// Mark a cell whose upper planes must draw above characters (bridges).
    pub fn set_overpass(&mut self, x: i32, y: i32, overpass: bool) {
        if overpass {
            self.overpass.insert((x, y));
        } else {
            self.overpass.remove(&(x, y));
        }
    }

    pub fn is_overpass(&self, x: i32, y: i32) -> bool {
        self.overpass.contains(&(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_zero_outside_the_map() {
        let mut map = MapData::new(3, 2);
        assert!(map.write(2, 1, 3, 42));
        assert_eq!(map.read(2, 1, 3), 42);
        assert_eq!(map.read(3, 1, 3), 0);
        assert_eq!(map.read(-1, 0, 0), 0);
        assert_eq!(map.read(0, 0, PLANES), 0);
    }

    #[test]
    fn wrap_folds_coordinates() {
        let mut map = MapData::new(3, 2);
        map.write(0, 1, 0, 7);
        map.horizontal_wrap = true;
        assert_eq!(map.read(3, 1, 0), 7);
        assert_eq!(map.read(-3, 1, 0), 7);
        assert_eq!(map.read(0, 3, 0), 0);
        map.vertical_wrap = true;
        assert_eq!(map.read(3, 3, 0), 7);
    }

    #[test]
    fn replacing_codes_keeps_wrap_and_overpass() {
        let mut map = MapData::new(3, 2);
        map.vertical_wrap = true;
        map.set_overpass(1, 1, true);
        map.replace_codes(2, 2, vec![9; 2 * 2 * PLANES]);
        assert_eq!((map.width(), map.height()), (2, 2));
        assert_eq!(map.read(1, 3, 0), 9);
        assert!(map.vertical_wrap);
        assert!(map.is_overpass(1, 1));
    }

    #[test]
    fn plane_major_layout() {
        let mut codes = vec![0; 2 * 2 * PLANES];
        codes[(SHADOW_PLANE * 2 + 1) * 2] = 5;
        let map = MapData::from_codes(2, 2, codes);
        assert_eq!(map.read(0, 1, SHADOW_PLANE), 5);
    }
}
