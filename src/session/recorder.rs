use crate::audio::features::{AnalysisParams, Frame};

use super::recording::Recording;

/// Identity assigned to a recording when it is finalized.
#[derive(Clone, Debug)]
pub struct RecordingMeta {
    pub id: String,
    pub label: String,
    pub created_at_ms: u64,
}

#[derive(Debug, Default)]
enum RecorderState {
    #[default]
    Idle,
    Recording {
        /// Tick time of the first appended frame
        origin_ms: Option<f64>,
        frames: Vec<Frame>,
    },
}

/// Collects frames while recording is active.
#[derive(Debug, Default)]
pub struct RecordingBuffer {
    state: RecorderState,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    pub fn frame_count(&self) -> usize {
        match &self.state {
            RecorderState::Recording { frames, .. } => frames.len(),
            RecorderState::Idle => 0,
        }
    }

    /// Milliseconds covered so far, 0 when idle or empty.
    pub fn elapsed_ms(&self) -> f64 {
        match &self.state {
            RecorderState::Recording { frames, .. } => {
                frames.last().map_or(0.0, |f| f.relative_time_ms)
            }
            RecorderState::Idle => 0.0,
        }
    }

    /// Begin a fresh take, discarding anything not yet finalized.
    pub fn start(&mut self) {
        if self.frame_count() > 0 {
            log::warn!("Restarting recording; {} unsaved frames dropped", self.frame_count());
        }
        self.state = RecorderState::Recording {
            origin_ms: None,
            frames: Vec::new(),
        };
    }

    /// Append one tick's frame. Returns false when not recording.
    pub fn append(&mut self, now_ms: f64, magnitudes: Vec<u8>, time_domain: Vec<u8>) -> bool {
        let RecorderState::Recording { origin_ms, frames } = &mut self.state else {
            return false;
        };
        let origin = *origin_ms.get_or_insert(now_ms);
        // A clock that steps backwards must not break time ordering.
        let floor = frames.last().map_or(0.0, |f| f.relative_time_ms);
        frames.push(Frame {
            relative_time_ms: (now_ms - origin).max(floor),
            magnitudes,
            time_domain,
        });
        true
    }

    /// Leave recording mode. Yields a recording only if at least one frame
    /// was captured.
    pub fn stop(&mut self, params: AnalysisParams, meta: RecordingMeta) -> Option<Recording> {
        let RecorderState::Recording { frames, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        let duration_ms = frames.last()?.relative_time_ms;
        Some(Recording {
            id: meta.id,
            label: meta.label,
            created_at_ms: meta.created_at_ms,
            duration_ms,
            params,
            frames,
        })
    }
}
