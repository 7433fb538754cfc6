use crate::audio::features::{format_hz, AnalysisParams, ScaleMode};
use crate::error::{CascadeError, Result};
use crate::mapping::{pixel_y_to_freq, RowMap, MAX_FREQ_HZ, MIN_FREQ_HZ};

use super::surface::{Rgba, Surface};

/// Fractions of the column height that get a legend label.
const LEGEND_FRACTIONS: [f64; 6] = [1.0, 0.75, 0.5, 0.35, 0.2, 0.0];

/// Byte magnitude to the waterfall palette (black → blue → magenta → white-ish).
pub fn intensity_to_color(magnitude: u8) -> Rgba {
    let v = magnitude as f64 / 255.0;
    [
        (255.0 * v.powi(3)).floor() as u8,
        (50.0 * v).floor() as u8,
        (255.0 * v.sqrt()).floor() as u8,
        255,
    ]
}

#[derive(Clone, Debug, PartialEq)]
pub struct LegendTick {
    pub y: u32,
    pub freq_hz: f64,
    pub label: String,
}

/// Legend labels for a column of `height` rows under `scale`.
pub fn legend_ticks(height: u32, scale: ScaleMode) -> Vec<LegendTick> {
    let last_row = height.saturating_sub(1);
    LEGEND_FRACTIONS
        .iter()
        .map(|&frac| {
            let y = ((frac * height as f64) as u32).min(last_row);
            let freq_hz = pixel_y_to_freq(y as f64, height, scale).clamp(MIN_FREQ_HZ, MAX_FREQ_HZ);
            LegendTick {
                y,
                freq_hz,
                label: format_hz(freq_hz),
            }
        })
        .collect()
}

/// Scrolling frequency-over-time image. History is never redrawn: each tick
/// shifts everything one pixel left and paints one new column on the right.
pub struct WaterfallRenderer {
    surface: Surface,
    rows: RowMap,
}

impl WaterfallRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Surface::new(width, height),
            rows: RowMap::default(),
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Drop all scrolled history.
    pub fn reset(&mut self) {
        let (w, h) = (self.surface.width(), self.surface.height());
        self.surface = Surface::new(w, h);
    }

    /// Scroll and paint one column. Bins sharing a row are painted in
    /// ascending order, so the highest bin wins.
    pub fn push_column(&mut self, magnitudes: &[u8], params: &AnalysisParams) -> Result<()> {
        let expected = params.buffer_length();
        if magnitudes.len() != expected {
            return Err(CascadeError::InvalidFrame {
                what: "magnitude bins",
                expected,
                actual: magnitudes.len(),
            });
        }
        if self.surface.width() == 0 {
            return Ok(());
        }

        self.surface.scroll_left(1);
        let x = self.surface.width() - 1;
        let rows = self.rows.rows(params, self.surface.height());
        for (row, &magnitude) in rows.iter().zip(magnitudes) {
            if let Some(y) = *row {
                self.surface.put(x, y, intensity_to_color(magnitude));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::bin_to_pixel_y;

    fn params(scale: ScaleMode) -> AnalysisParams {
        AnalysisParams::new(44_100, 2048, scale)
    }

    #[test]
    fn palette_endpoints() {
        assert_eq!(intensity_to_color(0), [0, 0, 0, 255]);
        assert_eq!(intensity_to_color(255), [255, 50, 255, 255]);
        let mid = intensity_to_color(128);
        assert_eq!(mid[1], 25);
        assert!(mid[0] < mid[2]);
    }

    #[test]
    fn new_column_lands_on_the_right() {
        let p = params(ScaleMode::Logarithmic);
        let mut w = WaterfallRenderer::new(16, 128);
        let mut mags = vec![0u8; 1024];
        mags[100] = 255;
        w.push_column(&mags, &p).unwrap();

        let y = bin_to_pixel_y(100, 1024, 128, p.scale_mode, 44_100, 2048).unwrap();
        // Row y is shared; only its highest bin decides the colour.
        let last_in_row = (0..1024)
            .filter(|&b| bin_to_pixel_y(b, 1024, 128, p.scale_mode, 44_100, 2048) == Some(y))
            .max()
            .unwrap();
        let expected = if last_in_row == 100 {
            intensity_to_color(255)
        } else {
            intensity_to_color(0)
        };
        assert_eq!(w.surface().get(15, y), Some(expected));

        w.push_column(&vec![0u8; 1024], &p).unwrap();
        assert_eq!(w.surface().get(14, y), Some(expected));
    }

    #[test]
    fn highest_bin_wins_shared_row() {
        let p = params(ScaleMode::Linear);
        let mut w = WaterfallRenderer::new(4, 8);
        let y = bin_to_pixel_y(500, 1024, 8, p.scale_mode, 44_100, 2048).unwrap();
        let sharing: Vec<usize> = (0..1024)
            .filter(|&b| bin_to_pixel_y(b, 1024, 8, p.scale_mode, 44_100, 2048) == Some(y))
            .collect();
        assert!(sharing.len() > 1);

        let mut mags = vec![0u8; 1024];
        for &b in &sharing {
            mags[b] = 255;
        }
        let last = *sharing.last().unwrap();
        mags[last] = 64;
        w.push_column(&mags, &p).unwrap();
        assert_eq!(w.surface().get(3, y), Some(intensity_to_color(64)));
    }

    #[test]
    fn scale_change_keeps_history() {
        let mut w = WaterfallRenderer::new(8, 64);
        let full = vec![255u8; 1024];
        w.push_column(&full, &params(ScaleMode::Logarithmic)).unwrap();
        let before: Vec<_> = (0..64).map(|y| w.surface().get(7, y)).collect();
        w.push_column(&vec![0u8; 1024], &params(ScaleMode::Linear)).unwrap();
        let after: Vec<_> = (0..64).map(|y| w.surface().get(6, y)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn rejects_mismatched_frame() {
        let mut w = WaterfallRenderer::new(8, 8);
        let before = w.surface().clone();
        assert!(w.push_column(&[0u8; 10], &params(ScaleMode::Linear)).is_err());
        assert_eq!(w.surface(), &before);
    }

    #[test]
    fn legend_runs_bottom_to_top() {
        let ticks = legend_ticks(400, ScaleMode::Logarithmic);
        assert_eq!(ticks.len(), 6);
        assert_eq!(ticks[0].y, 399);
        assert_eq!(ticks[0].freq_hz, MIN_FREQ_HZ);
        assert_eq!(ticks[5].y, 0);
        assert!(ticks.windows(2).all(|w| w[0].freq_hz < w[1].freq_hz));
        assert!(ticks[5].label.ends_with("kHz"));
    }
}
