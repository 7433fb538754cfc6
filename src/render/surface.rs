pub type Rgba = [u8; 4];

pub const BACKGROUND: Rgba = [0, 0, 0, 255];

/// CPU-side RGBA8 pixel buffer, row-major, no row padding.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        let mut surface = Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        };
        surface.fill(BACKGROUND);
        surface
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) * 4) as usize
    }

    pub fn fill(&mut self, color: Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    #[cfg(test)]
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[i..i + 4]);
        Some(out)
    }

    pub fn put(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.pixels[i..i + 4].copy_from_slice(&color);
    }

    fn put_signed(&mut self, x: i32, y: i32, color: Rgba) {
        if x >= 0 && y >= 0 {
            self.put(x as u32, y as u32, color);
        }
    }

    /// Shift every row `columns` pixels to the left; the vacated right edge
    /// becomes background.
    pub fn scroll_left(&mut self, columns: u32) {
        let columns = columns.min(self.width);
        if columns == 0 {
            return;
        }
        let row_bytes = (self.width * 4) as usize;
        let shift = (columns * 4) as usize;
        for row in self.pixels.chunks_exact_mut(row_bytes) {
            row.copy_within(shift.., 0);
            for px in row[row_bytes - shift..].chunks_exact_mut(4) {
                px.copy_from_slice(&BACKGROUND);
            }
        }
    }

    /// Bresenham line, clipped per pixel.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;
        loop {
            self.put_signed(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Alpha-blend a horizontal rule across `[x0, x1)`.
    pub fn blend_hline(&mut self, y: u32, x0: u32, x1: u32, color: Rgba) {
        if y >= self.height {
            return;
        }
        let a = color[3] as f32 / 255.0;
        for x in x0..x1.min(self.width) {
            let i = self.offset(x, y);
            for c in 0..3 {
                let under = self.pixels[i + c] as f32;
                self.pixels[i + c] = (color[c] as f32 * a + under * (1.0 - a)) as u8;
            }
        }
    }

    /// Copy `src` into this surface with its top-left corner at (dx, dy).
    pub fn blit(&mut self, src: &Surface, dx: u32, dy: u32) {
        if dx >= self.width || dy >= self.height {
            return;
        }
        let cols = src.width.min(self.width - dx) as usize;
        let rows = src.height.min(self.height - dy);
        for row in 0..rows {
            let s = src.offset(0, row);
            let d = self.offset(dx, dy + row);
            self.pixels[d..d + cols * 4].copy_from_slice(&src.pixels[s..s + cols * 4]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = [255, 0, 0, 255];

    #[test]
    fn scroll_moves_columns_left() {
        let mut s = Surface::new(4, 2);
        s.put(3, 1, RED);
        s.scroll_left(1);
        assert_eq!(s.get(2, 1), Some(RED));
        assert_eq!(s.get(3, 1), Some(BACKGROUND));
        s.scroll_left(3);
        assert!(s.pixels().chunks(4).all(|px| px == BACKGROUND));
    }

    #[test]
    fn lines_are_clipped() {
        let mut s = Surface::new(8, 8);
        s.draw_line(-4, 2, 20, 2, RED);
        for x in 0..8 {
            assert_eq!(s.get(x, 2), Some(RED));
        }
        assert_eq!(s.get(0, 3), Some(BACKGROUND));
    }

    #[test]
    fn blit_places_source_at_offset() {
        let mut src = Surface::new(2, 2);
        src.fill(RED);
        let mut dst = Surface::new(5, 5);
        dst.blit(&src, 4, 4);
        assert_eq!(dst.get(4, 4), Some(RED));
        assert_eq!(dst.get(3, 4), Some(BACKGROUND));
    }
}
