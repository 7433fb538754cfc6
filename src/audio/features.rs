use serde::{Deserialize, Serialize};

/// How frequency maps to vertical position on the waterfall and legend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    Linear,
    #[default]
    #[serde(alias = "log")]
    #[value(alias = "log")]
    Logarithmic,
}

/// Static shape of every frame produced by one acquisition session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisParams {
    pub sample_rate_hz: u32,
    /// Number of time-domain samples per transform
    pub transform_size: usize,
    pub scale_mode: ScaleMode,
}

impl AnalysisParams {
    pub fn new(sample_rate_hz: u32, transform_size: usize, scale_mode: ScaleMode) -> Self {
        Self {
            sample_rate_hz,
            transform_size,
            scale_mode,
        }
    }

    /// Number of magnitude bins per frame (half the transform size)
    pub fn buffer_length(&self) -> usize {
        self.transform_size / 2
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self::new(44_100, 2048, ScaleMode::Logarithmic)
    }
}

/// One sampled instant of a session, as captured or as stored in a recording.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Milliseconds since the first captured frame of the recording
    pub relative_time_ms: f64,
    /// Byte magnitudes, one per bin (buffer_length entries)
    pub magnitudes: Vec<u8>,
    /// Byte time-domain samples, 128 = silence (transform_size entries)
    pub time_domain: Vec<u8>,
}

/// Borrowed per-tick input for the render pipeline, live or replayed.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub magnitudes: &'a [u8],
    pub time_domain: &'a [u8],
}

impl Frame {
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            magnitudes: &self.magnitudes,
            time_domain: &self.time_domain,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Harmonic {
    /// Multiple of the fundamental (2..=4)
    pub order: u32,
    pub frequency_hz: f64,
    pub amplitude: u8,
}

/// Features derived from a single frame. Never carried across frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureSummary {
    pub dominant_freq_hz: f64,
    pub fundamental_freq_hz: Option<f64>,
    pub harmonics: Vec<Harmonic>,
}

impl FeatureSummary {
    /// One-line readout used by the on-frame overlay and the log.
    pub fn readout(&self) -> String {
        let mut line = format!("Dominant {}", format_hz(self.dominant_freq_hz));
        match self.fundamental_freq_hz {
            Some(f0) => line.push_str(&format!("  F0 {}", format_hz(f0))),
            None => line.push_str("  F0 --"),
        }
        for h in &self.harmonics {
            line.push_str(&format!("  H{} {}", h.order, format_hz(h.frequency_hz)));
        }
        line
    }
}

/// Hz below 1 kHz, kHz with one decimal above.
pub fn format_hz(hz: f64) -> String {
    if hz.round() >= 1000.0 {
        format!("{:.1} kHz", hz / 1000.0)
    } else {
        format!("{:.0} Hz", hz)
    }
}
