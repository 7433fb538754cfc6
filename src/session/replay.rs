use std::rc::Rc;

use crate::audio::features::Frame;

use super::recording::Recording;

/// Which stored frame a replay tick shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    /// Elapsed time has passed the last frame; playback ends after this tick.
    pub complete: bool,
}

/// Plays a recording back against its own clock. Each tick shows the first
/// frame whose timestamp has not yet been passed, so frames are held until
/// their time arrives rather than interpolated.
#[derive(Debug)]
pub struct ReplayEngine {
    recording: Rc<Recording>,
    start_ms: f64,
    finished: bool,
}

impl ReplayEngine {
    pub fn new(recording: Rc<Recording>, start_ms: f64) -> Self {
        log::info!(
            "Replaying '{}' ({} frames, {:.0}ms)",
            recording.label,
            recording.frames.len(),
            recording.duration_ms
        );
        Self {
            recording,
            start_ms,
            finished: false,
        }
    }

    pub fn recording(&self) -> &Rc<Recording> {
        &self.recording
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        (now_ms - self.start_ms).max(0.0)
    }

    /// Nearest-next lookup: first frame with `t >= elapsed`, else the last.
    pub fn select(&self, elapsed_ms: f64) -> Option<Selection> {
        let frames = &self.recording.frames;
        if frames.is_empty() {
            return None;
        }
        let index = frames.partition_point(|f| f.relative_time_ms < elapsed_ms);
        Some(if index < frames.len() {
            Selection {
                index,
                complete: false,
            }
        } else {
            Selection {
                index: frames.len() - 1,
                complete: true,
            }
        })
    }

    /// Frame for the tick at `now_ms`, or `None` once playback has ended.
    pub fn tick(&mut self, now_ms: f64) -> Option<(&Frame, Selection)> {
        if self.finished {
            return None;
        }
        let selection = self.select(self.elapsed_ms(now_ms))?;
        if selection.complete {
            self.finished = true;
        }
        Some((&self.recording.frames[selection.index], selection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::AnalysisParams;

    fn recording(times: &[f64]) -> Rc<Recording> {
        Rc::new(Recording {
            id: "r".into(),
            label: "r".into(),
            created_at_ms: 0,
            duration_ms: times.last().copied().unwrap_or(0.0),
            params: AnalysisParams::default(),
            frames: times
                .iter()
                .map(|&t| Frame {
                    relative_time_ms: t,
                    magnitudes: vec![],
                    time_domain: vec![],
                })
                .collect(),
        })
    }

    #[test]
    fn selects_first_frame_not_yet_passed() {
        let engine = ReplayEngine::new(recording(&[0.0, 100.0, 200.0]), 0.0);
        assert_eq!(engine.select(0.0), Some(Selection { index: 0, complete: false }));
        assert_eq!(engine.select(50.0), Some(Selection { index: 1, complete: false }));
        assert_eq!(engine.select(150.0), Some(Selection { index: 2, complete: false }));
        assert_eq!(engine.select(200.0), Some(Selection { index: 2, complete: false }));
        assert_eq!(engine.select(250.0), Some(Selection { index: 2, complete: true }));
    }

    #[test]
    fn tick_uses_replay_clock_and_finishes() {
        let mut engine = ReplayEngine::new(recording(&[0.0, 100.0, 200.0]), 5000.0);
        let (frame, sel) = engine.tick(5150.0).unwrap();
        assert_eq!(frame.relative_time_ms, 200.0);
        assert!(!sel.complete);
        let (frame, sel) = engine.tick(5250.0).unwrap();
        assert_eq!(frame.relative_time_ms, 200.0);
        assert!(sel.complete);
        assert!(engine.is_finished());
        assert!(engine.tick(5300.0).is_none());
    }

    #[test]
    fn clock_before_start_shows_first_frame() {
        let mut engine = ReplayEngine::new(recording(&[10.0, 20.0]), 1000.0);
        let (frame, _) = engine.tick(900.0).unwrap();
        assert_eq!(frame.relative_time_ms, 10.0);
    }

    #[test]
    fn empty_recording_never_selects() {
        let engine = ReplayEngine::new(recording(&[]), 0.0);
        assert_eq!(engine.select(0.0), None);
    }
}
