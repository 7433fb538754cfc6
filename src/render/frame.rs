use crate::audio::features::ScaleMode;
use crate::mapping::hover_frequency;

use super::pipeline::RenderPipeline;
use super::surface::{Rgba, Surface, BACKGROUND};
use super::text::TextOverlay;
use super::waterfall::legend_ticks;

const GRID_COLOR: Rgba = [255, 255, 255, 40];
const LABEL_COLOR: Rgba = [220, 220, 220, 255];
const STATUS_COLOR: Rgba = [255, 90, 90, 255];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.w && y < self.y + self.h
    }
}

/// Where each panel sits in the output frame: legend strip and waterfall on
/// top, waveform and spectrum side by side below.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub legend: Rect,
    pub waterfall: Rect,
    pub waveform: Rect,
    pub spectrum: Rect,
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(4);
        let height = height.max(4);
        let legend_w = (width / 12).clamp(40, 96).min(width / 2);
        let top_h = (height * 65 / 100).max(2);
        let bottom_h = height - top_h;
        let half = width / 2;
        Self {
            width,
            height,
            legend: Rect { x: 0, y: 0, w: legend_w, h: top_h },
            waterfall: Rect { x: legend_w, y: 0, w: width - legend_w, h: top_h },
            waveform: Rect { x: 0, y: top_h, w: half, h: bottom_h },
            spectrum: Rect { x: half, y: top_h, w: width - half, h: bottom_h },
        }
    }

    /// Frequency under an output-frame pixel, if it lies on the waterfall.
    pub fn hover(&self, x: u32, y: u32, scale: ScaleMode) -> Option<f64> {
        if !self.waterfall.contains(x, y) {
            return None;
        }
        Some(hover_frequency(
            (y - self.waterfall.y) as f64,
            self.waterfall.h,
            scale,
        ))
    }
}

/// Assembles the pipeline's surfaces, legend and readout into one RGBA
/// frame for the encoder.
pub struct FrameComposer {
    layout: Layout,
    overlay: Option<TextOverlay>,
    frame: Surface,
}

impl FrameComposer {
    pub fn new(layout: Layout, overlay: Option<TextOverlay>) -> Self {
        Self {
            layout,
            overlay,
            frame: Surface::new(layout.width, layout.height),
        }
    }

    pub fn compose(&mut self, pipeline: &RenderPipeline, scale: ScaleMode, status: &str) -> &[u8] {
        let l = self.layout;
        let frame = &mut self.frame;
        frame.fill(BACKGROUND);
        frame.blit(pipeline.waterfall().surface(), l.waterfall.x, l.waterfall.y);
        frame.blit(pipeline.plots().waveform(), l.waveform.x, l.waveform.y);
        frame.blit(pipeline.plots().spectrum(), l.spectrum.x, l.spectrum.y);
        frame.blend_hline(l.waveform.y, 0, l.width, GRID_COLOR);

        let ticks = legend_ticks(l.waterfall.h, scale);
        for tick in &ticks {
            frame.blend_hline(
                l.waterfall.y + tick.y,
                l.waterfall.x,
                l.waterfall.x + l.waterfall.w,
                GRID_COLOR,
            );
        }

        let Some(overlay) = &self.overlay else {
            return frame.pixels();
        };
        let lh = overlay.line_height();
        let label_max_y = l.waterfall.h.saturating_sub(lh);
        for tick in &ticks {
            let y = tick.y.saturating_sub(lh / 2).min(label_max_y);
            overlay.composite(frame, &tick.label, 4, y, LABEL_COLOR);
        }

        let margin = lh / 2;
        overlay.composite(
            frame,
            &pipeline.summary().readout(),
            l.waterfall.x + margin,
            margin,
            LABEL_COLOR,
        );
        if !status.is_empty() {
            let tw = overlay.measure_width(status);
            let x = l.width.saturating_sub(tw + margin);
            overlay.composite(frame, status, x, margin, STATUS_COLOR);
        }
        frame.pixels()
    }
}
