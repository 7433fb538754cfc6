use crate::error::{CascadeError, Result};
use crate::mapping::{bin_frequency, freq_to_bin};

use super::features::{AnalysisParams, FeatureSummary, Harmonic};

/// Fundamental search stops at this frequency.
const FUNDAMENTAL_CEILING_HZ: f64 = 2000.0;
/// A local peak must exceed this to count as a fundamental candidate.
const PEAK_THRESHOLD: u8 = 50;
/// Candidates at or below this are treated as DC leakage.
const MIN_FUNDAMENTAL_HZ: f64 = 10.0;
/// A harmonic bin must exceed this to be reported.
const HARMONIC_THRESHOLD: u8 = 30;
const HARMONIC_ORDERS: [u32; 3] = [2, 3, 4];

/// Turns one frame of byte magnitudes into a [`FeatureSummary`].
///
/// Stateless: each call looks only at the frame it is given.
#[derive(Clone, Copy, Debug)]
pub struct SpectralAnalyzer {
    params: AnalysisParams,
}

impl SpectralAnalyzer {
    pub fn new(params: AnalysisParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    pub fn set_params(&mut self, params: AnalysisParams) {
        self.params = params;
    }

    pub fn analyze(&self, magnitudes: &[u8]) -> Result<FeatureSummary> {
        let expected = self.params.buffer_length();
        if magnitudes.len() != expected || expected == 0 {
            return Err(CascadeError::InvalidFrame {
                what: "magnitude bins",
                expected,
                actual: magnitudes.len(),
            });
        }

        let dominant_bin = dominant_bin(magnitudes);
        let dominant_freq_hz = self.freq(dominant_bin);

        let fundamental_freq_hz = self
            .fundamental_bin(magnitudes)
            .map(|bin| self.freq(bin))
            .filter(|&f| f > MIN_FUNDAMENTAL_HZ);

        let harmonics = match fundamental_freq_hz {
            Some(f0) => self.harmonics(magnitudes, f0),
            None => Vec::new(),
        };

        Ok(FeatureSummary {
            dominant_freq_hz,
            fundamental_freq_hz,
            harmonics,
        })
    }

    fn freq(&self, bin: usize) -> f64 {
        bin_frequency(bin, self.params.sample_rate_hz, self.params.transform_size)
    }

    /// Strongest local peak below the fundamental ceiling, bin 0 excluded.
    fn fundamental_bin(&self, magnitudes: &[u8]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for i in 1..magnitudes.len() {
            if self.freq(i) >= FUNDAMENTAL_CEILING_HZ {
                break;
            }
            let m = magnitudes[i];
            let above_left = m > magnitudes[i - 1];
            let above_right = magnitudes.get(i + 1).map_or(true, |&r| m > r);
            if !(above_left && above_right && m > PEAK_THRESHOLD) {
                continue;
            }
            if best.map_or(true, |b| m > magnitudes[b]) {
                best = Some(i);
            }
        }
        best
    }

    fn harmonics(&self, magnitudes: &[u8], f0: f64) -> Vec<Harmonic> {
        HARMONIC_ORDERS
            .iter()
            .filter_map(|&order| {
                let frequency_hz = order as f64 * f0;
                let bin = freq_to_bin(
                    frequency_hz,
                    self.params.sample_rate_hz,
                    self.params.transform_size,
                );
                let amplitude = *magnitudes.get(bin)?;
                (amplitude > HARMONIC_THRESHOLD).then_some(Harmonic {
                    order,
                    frequency_hz,
                    amplitude,
                })
            })
            .collect()
    }
}

/// First bin holding the maximum magnitude; bin 0 on silence.
fn dominant_bin(magnitudes: &[u8]) -> usize {
    let mut best = 0;
    for (i, &m) in magnitudes.iter().enumerate() {
        if m > magnitudes[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::ScaleMode;

    fn analyzer() -> SpectralAnalyzer {
        SpectralAnalyzer::new(AnalysisParams::new(44_100, 2048, ScaleMode::Logarithmic))
    }

    fn bin_for(freq: f64) -> usize {
        freq_to_bin(freq, 44_100, 2048)
    }

    #[test]
    fn silence_has_no_fundamental() {
        let summary = analyzer().analyze(&[0u8; 1024]).unwrap();
        assert_eq!(summary.dominant_freq_hz, 0.0);
        assert_eq!(summary.fundamental_freq_hz, None);
        assert!(summary.harmonics.is_empty());
    }

    #[test]
    fn finds_fundamental_and_harmonics() {
        let a = analyzer();
        let mut mags = vec![0u8; 1024];
        let f0_bin = bin_for(100.0);
        mags[f0_bin] = 200;
        let f0 = bin_frequency(f0_bin, 44_100, 2048);
        for (order, value) in [(2u32, 120u8), (3, 90), (4, 60)] {
            mags[bin_for(order as f64 * f0)] = value;
        }

        let summary = a.analyze(&mags).unwrap();
        let found = summary.fundamental_freq_hz.unwrap();
        // One bin is ~21.5 Hz wide at this resolution.
        assert!((found - 100.0).abs() < 44_100.0 / 2048.0);
        assert_eq!(summary.dominant_freq_hz, found);

        let orders: Vec<u32> = summary.harmonics.iter().map(|h| h.order).collect();
        assert_eq!(orders, vec![2, 3, 4]);
        for h in &summary.harmonics {
            assert!((h.frequency_hz - h.order as f64 * found).abs() < 1e-9);
        }
        assert_eq!(summary.harmonics[0].amplitude, 120);
        assert_eq!(summary.harmonics[2].amplitude, 60);
    }

    #[test]
    fn weak_harmonics_are_dropped() {
        let mut mags = vec![0u8; 1024];
        mags[10] = 180;
        mags[20] = 30;
        mags[30] = 31;
        let summary = analyzer().analyze(&mags).unwrap();
        let orders: Vec<u32> = summary.harmonics.iter().map(|h| h.order).collect();
        assert_eq!(orders, vec![3]);
    }

    #[test]
    fn dominant_ties_go_to_lowest_bin() {
        let mut mags = vec![0u8; 1024];
        mags[300] = 90;
        mags[40] = 90;
        let summary = analyzer().analyze(&mags).unwrap();
        assert_eq!(summary.dominant_freq_hz, bin_frequency(40, 44_100, 2048));
    }

    #[test]
    fn peaks_above_ceiling_are_ignored() {
        let mut mags = vec![0u8; 1024];
        mags[bin_for(3000.0)] = 250;
        let summary = analyzer().analyze(&mags).unwrap();
        assert_eq!(summary.fundamental_freq_hz, None);
        assert!(summary.dominant_freq_hz > 2900.0);
    }

    #[test]
    fn plateau_is_not_a_peak() {
        let mut mags = vec![0u8; 1024];
        mags[12] = 120;
        mags[13] = 120;
        let summary = analyzer().analyze(&mags).unwrap();
        assert_eq!(summary.fundamental_freq_hz, None);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = analyzer().analyze(&[0u8; 512]).unwrap_err();
        assert!(matches!(
            err,
            CascadeError::InvalidFrame {
                expected: 1024,
                actual: 512,
                ..
            }
        ));
    }
}
