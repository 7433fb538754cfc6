//! Bin / frequency / pixel-row conversions.
//!
//! Everything that places a frequency on screen goes through this module: the
//! waterfall column painter, the legend, the hover readout and the analyzer's
//! bin arithmetic. Keeping one implementation means the painted row, the label
//! next to it and the hover value can never disagree.

use crate::audio::features::{AnalysisParams, ScaleMode};

/// Lowest frequency shown on the waterfall.
pub const MIN_FREQ_HZ: f64 = 5.0;
/// Highest frequency shown on the waterfall.
pub const MAX_FREQ_HZ: f64 = 20_000.0;

/// Center frequency of a transform bin.
pub fn bin_frequency(bin: usize, sample_rate_hz: u32, transform_size: usize) -> f64 {
    bin as f64 * sample_rate_hz as f64 / transform_size as f64
}

/// Bin whose range contains `freq_hz`.
pub fn freq_to_bin(freq_hz: f64, sample_rate_hz: u32, transform_size: usize) -> usize {
    (freq_hz * transform_size as f64 / sample_rate_hz as f64).floor().max(0.0) as usize
}

/// Position of `freq_hz` as a fraction of the column, 0 = top (highest frequency).
fn fraction_for_freq(freq_hz: f64, scale: ScaleMode) -> f64 {
    match scale {
        ScaleMode::Logarithmic => {
            let span = MAX_FREQ_HZ.log10() - MIN_FREQ_HZ.log10();
            1.0 - (freq_hz.log10() - MIN_FREQ_HZ.log10()) / span
        }
        ScaleMode::Linear => 1.0 - (freq_hz - MIN_FREQ_HZ) / (MAX_FREQ_HZ - MIN_FREQ_HZ),
    }
}

fn freq_for_fraction(frac: f64, scale: ScaleMode) -> f64 {
    let norm = 1.0 - frac;
    match scale {
        ScaleMode::Logarithmic => {
            let span = MAX_FREQ_HZ.log10() - MIN_FREQ_HZ.log10();
            10f64.powf(MIN_FREQ_HZ.log10() + norm * span)
        }
        ScaleMode::Linear => MIN_FREQ_HZ + norm * (MAX_FREQ_HZ - MIN_FREQ_HZ),
    }
}

fn row_span(height: u32) -> f64 {
    height.saturating_sub(1).max(1) as f64
}

/// Pixel row for a bin, or `None` when the bin lies outside [5 Hz, 20 kHz].
pub fn bin_to_pixel_y(
    bin: usize,
    buffer_length: usize,
    height: u32,
    scale: ScaleMode,
    sample_rate_hz: u32,
    transform_size: usize,
) -> Option<u32> {
    if bin >= buffer_length || height == 0 {
        return None;
    }
    let freq = bin_frequency(bin, sample_rate_hz, transform_size);
    if !(MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&freq) {
        return None;
    }
    let frac = fraction_for_freq(freq, scale);
    Some((frac * height.saturating_sub(1) as f64).floor() as u32)
}

/// Inverse of [`bin_to_pixel_y`], sampled at the pixel center. Not clamped:
/// rows at the very bottom may yield values below the band.
pub fn pixel_y_to_freq(y: f64, height: u32, scale: ScaleMode) -> f64 {
    freq_for_fraction((y + 0.5) / row_span(height), scale)
}

/// Frequency under the cursor, clamped to the displayed band.
pub fn hover_frequency(y: f64, height: u32, scale: ScaleMode) -> f64 {
    pixel_y_to_freq(y, height, scale).clamp(MIN_FREQ_HZ, MAX_FREQ_HZ)
}

/// Per-bin row table, rebuilt only when the inputs that shape it change.
#[derive(Debug, Default)]
pub struct RowMap {
    key: Option<(usize, u32, ScaleMode, u32, usize)>,
    rows: Vec<Option<u32>>,
}

impl RowMap {
    pub fn rows(&mut self, params: &AnalysisParams, height: u32) -> &[Option<u32>] {
        let len = params.buffer_length();
        let key = (
            len,
            height,
            params.scale_mode,
            params.sample_rate_hz,
            params.transform_size,
        );
        if self.key != Some(key) {
            log::debug!(
                "Rebuilding row map: {} bins, {}px, {:?}",
                len,
                height,
                params.scale_mode
            );
            self.rows = (0..len)
                .map(|bin| {
                    bin_to_pixel_y(
                        bin,
                        len,
                        height,
                        params.scale_mode,
                        params.sample_rate_hz,
                        params.transform_size,
                    )
                })
                .collect();
            self.key = Some(key);
        }
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;
    const N: usize = 2048;
    const LEN: usize = N / 2;

    /// Frequency at a row boundary (edge = y means the top edge of row y).
    fn edge_freq(edge: u32, height: u32, scale: ScaleMode) -> f64 {
        freq_for_fraction(edge as f64 / row_span(height), scale)
    }

    fn assert_round_trip(scale: ScaleMode, height: u32) {
        let mut checked = 0;
        for bin in 0..LEN {
            let Some(y) = bin_to_pixel_y(bin, LEN, height, scale, SR, N) else {
                continue;
            };
            let truth = bin_frequency(bin, SR, N);
            let est = pixel_y_to_freq(y as f64, height, scale);
            // Rows run top (high) to bottom (low).
            let hi = edge_freq(y, height, scale) * (1.0 + 1e-9);
            let lo = edge_freq(y + 1, height, scale) * (1.0 - 1e-9);
            assert!(truth <= hi && truth >= lo, "bin {} outside row {}", bin, y);
            assert!(
                (est - truth).abs() <= hi - lo,
                "bin {} ({:.2} Hz) read back as {:.2} Hz",
                bin,
                truth,
                est
            );
            checked += 1;
        }
        assert!(checked > 900);
    }

    #[test]
    fn round_trip_within_one_row_log() {
        assert_round_trip(ScaleMode::Logarithmic, 400);
        assert_round_trip(ScaleMode::Logarithmic, 97);
    }

    #[test]
    fn round_trip_within_one_row_linear() {
        assert_round_trip(ScaleMode::Linear, 400);
        assert_round_trip(ScaleMode::Linear, 97);
    }

    #[test]
    fn out_of_band_bins() {
        for scale in [ScaleMode::Linear, ScaleMode::Logarithmic] {
            assert_eq!(bin_to_pixel_y(0, LEN, 300, scale, SR, N), None);
            // 929 * 44100 / 2048 ≈ 20004 Hz
            assert_eq!(bin_to_pixel_y(929, LEN, 300, scale, SR, N), None);
            assert!(bin_to_pixel_y(928, LEN, 300, scale, SR, N).is_some());
        }
    }

    #[test]
    fn higher_frequencies_sit_higher() {
        let low = bin_to_pixel_y(10, LEN, 300, ScaleMode::Logarithmic, SR, N).unwrap();
        let high = bin_to_pixel_y(500, LEN, 300, ScaleMode::Logarithmic, SR, N).unwrap();
        assert!(high < low);
    }

    #[test]
    fn hover_is_clamped_to_band() {
        assert_eq!(hover_frequency(-10.0, 300, ScaleMode::Linear), MAX_FREQ_HZ);
        assert_eq!(hover_frequency(299.0, 300, ScaleMode::Logarithmic), MIN_FREQ_HZ);
        let mid = hover_frequency(150.0, 300, ScaleMode::Logarithmic);
        assert!(mid > MIN_FREQ_HZ && mid < MAX_FREQ_HZ);
    }

    #[test]
    fn freq_to_bin_floors() {
        assert_eq!(freq_to_bin(100.0, SR, N), 4);
        assert_eq!(freq_to_bin(bin_frequency(37, SR, N), SR, N), 37);
    }

    #[test]
    fn row_map_tracks_scale_changes() {
        let mut map = RowMap::default();
        let mut params = AnalysisParams::new(SR, N, ScaleMode::Logarithmic);
        let log_row = map.rows(&params, 200)[100];
        params.scale_mode = ScaleMode::Linear;
        let lin_row = map.rows(&params, 200)[100];
        assert_ne!(log_row, lin_row);
        assert_eq!(
            lin_row,
            bin_to_pixel_y(100, LEN, 200, ScaleMode::Linear, SR, N)
        );
    }
}
