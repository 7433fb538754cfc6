use super::surface::{Rgba, Surface};
use super::waterfall::intensity_to_color;

const WAVEFORM_COLOR: Rgba = [90, 220, 140, 255];
/// Spectrum segments never get darker than this palette entry.
const SPECTRUM_FLOOR: u8 = 96;

/// Polyline vertices for a byte waveform; 128 sits on the centre line.
pub fn waveform_points(samples: &[u8], width: u32, height: u32) -> Vec<(i32, i32)> {
    if samples.is_empty() {
        return Vec::new();
    }
    let step = width as f64 / samples.len() as f64;
    let h = height as f64;
    let max_y = height.saturating_sub(1) as f64;
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let v = s as f64 / 128.0;
            let y = ((v - 1.0) / 2.0 * h + h / 2.0).clamp(0.0, max_y);
            ((i as f64 * step) as i32, y as i32)
        })
        .collect()
}

/// Spectrum vertices, one every `ceil(len / width)` bins, so never more
/// than `width` points.
pub fn spectrum_points(magnitudes: &[u8], width: u32, height: u32) -> Vec<(i32, i32, u8)> {
    if magnitudes.is_empty() || width == 0 {
        return Vec::new();
    }
    let len = magnitudes.len();
    let stride = len.div_ceil(width as usize).max(1);
    let h = height as f64;
    let max_y = height.saturating_sub(1) as f64;
    (0..len)
        .step_by(stride)
        .map(|i| {
            let m = magnitudes[i];
            let x = (i as f64 * width as f64 / len as f64) as i32;
            let y = (h - m as f64 / 255.0 * h).clamp(0.0, max_y);
            (x, y as i32, m)
        })
        .collect()
}

/// Waveform and instantaneous spectrum panels. Both are redrawn from scratch
/// every tick.
pub struct AuxiliaryPlotRenderer {
    waveform: Surface,
    spectrum: Surface,
}

impl AuxiliaryPlotRenderer {
    pub fn new(waveform_size: (u32, u32), spectrum_size: (u32, u32)) -> Self {
        Self {
            waveform: Surface::new(waveform_size.0, waveform_size.1),
            spectrum: Surface::new(spectrum_size.0, spectrum_size.1),
        }
    }

    pub fn waveform(&self) -> &Surface {
        &self.waveform
    }

    pub fn spectrum(&self) -> &Surface {
        &self.spectrum
    }

    pub fn draw(&mut self, time_domain: &[u8], magnitudes: &[u8]) {
        self.draw_waveform(time_domain);
        self.draw_spectrum(magnitudes);
    }

    pub fn draw_waveform(&mut self, samples: &[u8]) {
        let surface = &mut self.waveform;
        surface.fill(super::surface::BACKGROUND);
        let points = waveform_points(samples, surface.width(), surface.height());
        for pair in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            surface.draw_line(x0, y0, x1, y1, WAVEFORM_COLOR);
        }
    }

    pub fn draw_spectrum(&mut self, magnitudes: &[u8]) {
        let surface = &mut self.spectrum;
        surface.fill(super::surface::BACKGROUND);
        let points = spectrum_points(magnitudes, surface.width(), surface.height());
        for pair in points.windows(2) {
            let ((x0, y0, m0), (x1, y1, m1)) = (pair[0], pair[1]);
            let color = intensity_to_color(m0.max(m1).max(SPECTRUM_FLOOR));
            surface.draw_line(x0, y0, x1, y1, color);
        }
    }
}
