use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::{Path, PathBuf};

use super::surface::{Rgba, Surface};

/// Tried in order when no font is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
];

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font: {}", path.display()))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font {}: {}", path.display(), e))?;
        Ok(Self { font, font_size })
    }

    /// Use `explicit` if given, otherwise the first system font that loads.
    /// `None` means labels are skipped for this run.
    pub fn discover(explicit: Option<&Path>, font_size: f32) -> Option<Self> {
        if let Some(path) = explicit {
            match Self::from_file(path, font_size) {
                Ok(overlay) => return Some(overlay),
                Err(err) => log::warn!("{:#}", err),
            }
        }
        let found = SYSTEM_FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .find_map(|p| Self::from_file(&p, font_size).ok());
        if found.is_none() {
            log::warn!("No usable font found; legend and readout text disabled (use --font)");
        }
        found
    }

    pub fn line_height(&self) -> u32 {
        self.font_size.ceil() as u32
    }

    /// Alpha-blend `text` onto the surface with its top-left at (x, y).
    pub fn composite(&self, surface: &mut Surface, text: &str, x: u32, y: u32, color: Rgba) {
        let (width, height) = (surface.width() as i32, surface.height() as i32);
        let pixels = surface.pixels_mut();
        let mut cursor_x = x as i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = y as i32 + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha == 0 {
                        continue;
                    }
                    let px = cursor_x + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 || px >= width || py >= height {
                        continue;
                    }

                    let idx = ((py * width + px) * 4) as usize;
                    let a = alpha as f32 / 255.0 * (color[3] as f32 / 255.0);
                    for c in 0..3 {
                        pixels[idx + c] = (color[c] as f32 * a + pixels[idx + c] as f32 * (1.0 - a)) as u8;
                    }
                    pixels[idx + 3] = 255;
                }
            }
            cursor_x += metrics.advance_width as i32;
        }
    }

    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}
