use crate::audio::analysis::SpectralAnalyzer;
use crate::audio::features::{AnalysisParams, FeatureSummary, FrameView};
use crate::error::{CascadeError, Result};

use super::frame::Layout;
use super::plots::AuxiliaryPlotRenderer;
use super::waterfall::WaterfallRenderer;

/// Per-tick consumers of a frame: analyzer, waterfall and the two plots.
/// Live capture and replay feed it identically.
pub struct RenderPipeline {
    analyzer: SpectralAnalyzer,
    waterfall: WaterfallRenderer,
    plots: AuxiliaryPlotRenderer,
    summary: FeatureSummary,
    ticks: u64,
}

impl RenderPipeline {
    pub fn new(layout: &Layout, params: AnalysisParams) -> Self {
        Self {
            analyzer: SpectralAnalyzer::new(params),
            waterfall: WaterfallRenderer::new(layout.waterfall.w, layout.waterfall.h),
            plots: AuxiliaryPlotRenderer::new(
                (layout.waveform.w, layout.waveform.h),
                (layout.spectrum.w, layout.spectrum.h),
            ),
            summary: FeatureSummary::default(),
            ticks: 0,
        }
    }

    pub fn params(&self) -> &AnalysisParams {
        self.analyzer.params()
    }

    /// Switch params for subsequent frames. Scrolled history is left as is.
    pub fn set_params(&mut self, params: AnalysisParams) {
        if params != *self.analyzer.params() {
            log::debug!("Pipeline params now {:?}", params);
            self.analyzer.set_params(params);
        }
    }

    /// Forget history and the last summary, e.g. when a new session starts.
    pub fn reset(&mut self) {
        self.waterfall.reset();
        self.summary = FeatureSummary::default();
        self.ticks = 0;
    }

    /// Analyze and draw one frame. A malformed frame is rejected before any
    /// surface is touched.
    pub fn process(&mut self, frame: FrameView<'_>) -> Result<&FeatureSummary> {
        let params = *self.analyzer.params();
        if frame.time_domain.len() != params.transform_size {
            return Err(CascadeError::InvalidFrame {
                what: "time-domain samples",
                expected: params.transform_size,
                actual: frame.time_domain.len(),
            });
        }
        let summary = self.analyzer.analyze(frame.magnitudes)?;
        self.waterfall.push_column(frame.magnitudes, &params)?;
        self.plots.draw(frame.time_domain, frame.magnitudes);

        log::trace!("tick {}: {}", self.ticks, summary.readout());
        self.summary = summary;
        self.ticks += 1;
        Ok(&self.summary)
    }

    pub fn summary(&self) -> &FeatureSummary {
        &self.summary
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn waterfall(&self) -> &WaterfallRenderer {
        &self.waterfall
    }

    pub fn plots(&self) -> &AuxiliaryPlotRenderer {
        &self.plots
    }
}
