use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{CascadeError, Result};

use super::decode::DecodedAudio;
use super::features::{AnalysisParams, FrameView, ScaleMode};

/// Static shape of an acquisition session, fixed when it starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionParams {
    pub sample_rate_hz: u32,
    pub transform_size: usize,
}

impl AcquisitionParams {
    pub fn with_scale(self, scale_mode: ScaleMode) -> AnalysisParams {
        AnalysisParams::new(self.sample_rate_hz, self.transform_size, scale_mode)
    }
}

/// One tick's worth of analyser output.
#[derive(Clone, Debug, PartialEq)]
pub struct AcquiredFrame {
    pub magnitudes: Vec<u8>,
    pub time_domain: Vec<u8>,
}

impl AcquiredFrame {
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            magnitudes: &self.magnitudes,
            time_domain: &self.time_domain,
        }
    }
}

/// Anything that can feed live frames to the pipeline, one per tick.
pub trait FrameSource {
    fn params(&self) -> AcquisitionParams;

    /// Next frame, or `Ok(None)` once the input is exhausted.
    fn next_frame(&mut self) -> Result<Option<AcquiredFrame>>;

    /// Total ticks the source will produce, when known.
    fn tick_count_hint(&self) -> Option<usize> {
        None
    }
}

/// Byte-scaling and smoothing knobs of the analyser.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalyserSettings {
    pub transform_size: usize,
    pub min_decibels: f64,
    pub max_decibels: f64,
    /// Weight of the previous frame in the magnitude average (0.0-1.0)
    pub smoothing: f64,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            transform_size: 2048,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing: 0.8,
        }
    }
}

/// Plays a decoded file through a browser-style analyser: Blackman window,
/// temporal smoothing, dB range squeezed into bytes.
pub struct AnalyserSource {
    audio: DecodedAudio,
    settings: AnalyserSettings,
    fps: u32,
    tick: usize,
    total_ticks: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f64>,
}

impl AnalyserSource {
    pub fn new(audio: DecodedAudio, settings: AnalyserSettings, fps: u32) -> Result<Self> {
        let n = settings.transform_size;
        if !n.is_power_of_two() || !(32..=32768).contains(&n) {
            return Err(CascadeError::AcquisitionDenied(format!(
                "transform size {} is not a power of two in 32..=32768",
                n
            )));
        }
        if fps == 0 || audio.sample_rate == 0 {
            return Err(CascadeError::AcquisitionDenied(
                "tick rate and sample rate must be non-zero".into(),
            ));
        }
        if settings.max_decibels <= settings.min_decibels {
            return Err(CascadeError::AcquisitionDenied(format!(
                "decibel range [{}, {}] is empty",
                settings.min_decibels, settings.max_decibels
            )));
        }

        let total_ticks = (audio.duration_secs() * fps as f64).ceil() as usize;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        log::info!(
            "Analyser: {} bins at {}Hz, {} ticks @ {}fps",
            n / 2,
            audio.sample_rate,
            total_ticks,
            fps
        );

        Ok(Self {
            audio,
            settings,
            fps,
            tick: 0,
            total_ticks,
            fft,
            window: blackman_window(n),
            smoothed: vec![0.0; n / 2],
        })
    }

    /// Sample index at the end of the analysis window for `tick`.
    fn window_end(&self, tick: usize) -> usize {
        (tick as f64 * self.audio.sample_rate as f64 / self.fps as f64) as usize
    }

    fn analyse_window(&mut self, end: usize) -> AcquiredFrame {
        let n = self.settings.transform_size;
        let samples = &self.audio.samples;
        let start = end as isize - n as isize;

        let block: Vec<f32> = (0..n)
            .map(|i| {
                let idx = start + i as isize;
                if idx < 0 {
                    0.0
                } else {
                    samples.get(idx as usize).copied().unwrap_or(0.0)
                }
            })
            .collect();

        let time_domain = block
            .iter()
            .map(|&s| (128.0 * (1.0 + s)).floor().clamp(0.0, 255.0) as u8)
            .collect();

        let mut spectrum: Vec<Complex<f32>> = block
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut spectrum);

        let tau = self.settings.smoothing.clamp(0.0, 1.0);
        let range = self.settings.max_decibels - self.settings.min_decibels;
        let scale = 1.0 / n as f64;
        let magnitudes = spectrum[..n / 2]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(c, prev)| {
                *prev = tau * *prev + (1.0 - tau) * c.norm() as f64 * scale;
                let db = 20.0 * prev.log10();
                let byte = (255.0 / range * (db - self.settings.min_decibels)).floor();
                if byte.is_nan() {
                    0
                } else {
                    byte.clamp(0.0, 255.0) as u8
                }
            })
            .collect();

        AcquiredFrame {
            magnitudes,
            time_domain,
        }
    }
}

impl FrameSource for AnalyserSource {
    fn params(&self) -> AcquisitionParams {
        AcquisitionParams {
            sample_rate_hz: self.audio.sample_rate,
            transform_size: self.settings.transform_size,
        }
    }

    fn next_frame(&mut self) -> Result<Option<AcquiredFrame>> {
        if self.tick >= self.total_ticks {
            return Ok(None);
        }
        let end = self.window_end(self.tick);
        self.tick += 1;
        Ok(Some(self.analyse_window(end)))
    }

    fn tick_count_hint(&self) -> Option<usize> {
        Some(self.total_ticks)
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let denom = size.saturating_sub(1).max(1) as f32;
    (0..size)
        .map(|i| {
            let phase = std::f32::consts::TAU * i as f32 / denom;
            0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analysis::SpectralAnalyzer;

    // Quiet enough that the peak bin stays below the -30 dB ceiling.
    fn sine(freq: f32, sample_rate: u32, secs: f32) -> DecodedAudio {
        let len = (sample_rate as f32 * secs) as usize;
        let samples = (0..len)
            .map(|i| 0.05 * (std::f32::consts::TAU * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        DecodedAudio {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn rejects_bad_transform_size() {
        let audio = sine(440.0, 44_100, 0.1);
        let settings = AnalyserSettings {
            transform_size: 1000,
            ..Default::default()
        };
        assert!(matches!(
            AnalyserSource::new(audio, settings, 30),
            Err(CascadeError::AcquisitionDenied(_))
        ));
    }

    #[test]
    fn frames_have_analyser_shape() {
        let mut source = AnalyserSource::new(sine(440.0, 44_100, 0.5), AnalyserSettings::default(), 30).unwrap();
        assert_eq!(source.tick_count_hint(), Some(15));
        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.magnitudes.len(), 1024);
            assert_eq!(frame.time_domain.len(), 2048);
            count += 1;
        }
        assert_eq!(count, 15);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn first_tick_is_silent() {
        let mut source = AnalyserSource::new(sine(440.0, 44_100, 0.5), AnalyserSettings::default(), 30).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert!(frame.magnitudes.iter().all(|&m| m == 0));
        assert!(frame.time_domain.iter().all(|&s| s == 128));
    }

    #[test]
    fn sine_peaks_near_its_frequency() {
        let settings = AnalyserSettings {
            smoothing: 0.0,
            ..Default::default()
        };
        let mut source = AnalyserSource::new(sine(440.0, 44_100, 1.0), settings, 10).unwrap();
        let params = source.params().with_scale(ScaleMode::Linear);
        let analyzer = SpectralAnalyzer::new(params);
        source.next_frame().unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        let summary = analyzer.analyze(&frame.magnitudes).unwrap();
        assert!((summary.dominant_freq_hz - 440.0).abs() < 44_100.0 / 2048.0);
    }
}
