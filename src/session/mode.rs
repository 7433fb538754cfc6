//! Live/replay mode switching.
//!
//! `ModeController` is the only place the current mode changes. Every change
//! bumps a [`TickEpoch`]; a driver holds the epoch it was started with and
//! passes it back on each tick, so a driver belonging to a mode that has since
//! been left gets [`TickOutcome::Cancelled`] and never reaches the surfaces.

use std::rc::Rc;

use crate::audio::acquisition::{AcquisitionParams, FrameSource};
use crate::audio::features::{FeatureSummary, ScaleMode};
use crate::error::CascadeError;
use crate::render::pipeline::RenderPipeline;

use super::recorder::RecordingBuffer;
use super::recording::Recording;
use super::replay::ReplayEngine;
use super::store::RecordingStore;

/// Token identifying the mode a tick driver belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickEpoch(u64);

enum Mode {
    Idle,
    Live {
        params: AcquisitionParams,
        source: Box<dyn FrameSource>,
    },
    Replaying(ReplayEngine),
}

#[derive(Debug)]
pub enum TickOutcome {
    /// The driver's mode is gone; it should stop scheduling ticks.
    Cancelled,
    Idle,
    Rendered(FeatureSummary),
    /// The frame was unusable and skipped; the next tick proceeds normally.
    Dropped(CascadeError),
    /// Live input ran out; the controller is now idle.
    Ended,
}

pub struct ModeController {
    mode: Mode,
    epoch: u64,
    scale: ScaleMode,
    pipeline: RenderPipeline,
    recorder: RecordingBuffer,
    store: RecordingStore,
}

impl ModeController {
    pub fn new(pipeline: RenderPipeline, store: RecordingStore) -> Self {
        let scale = pipeline.params().scale_mode;
        Self {
            mode: Mode::Idle,
            epoch: 0,
            scale,
            pipeline,
            recorder: RecordingBuffer::new(),
            store,
        }
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordingStore {
        &mut self.store
    }

    pub fn scale(&self) -> ScaleMode {
        self.scale
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.mode, Mode::Idle)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.mode, Mode::Live { .. })
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn replaying(&self) -> Option<&Rc<Recording>> {
        match &self.mode {
            Mode::Replaying(engine) => Some(engine.recording()),
            _ => None,
        }
    }

    /// Short mode label for overlays, e.g. `REC 00:03.2`.
    pub fn status(&self, now_ms: f64) -> String {
        match &self.mode {
            Mode::Idle => String::new(),
            Mode::Live { .. } if self.recorder.is_recording() => {
                format!("REC {}", clock(self.recorder.elapsed_ms()))
            }
            Mode::Live { .. } => "LIVE".to_string(),
            Mode::Replaying(engine) => format!(
                "REPLAY {} / {}",
                clock(engine.elapsed_ms(now_ms).min(engine.recording().duration_ms)),
                clock(engine.recording().duration_ms)
            ),
        }
    }

    /// Applies to columns painted from now on; history is not remapped.
    pub fn set_scale(&mut self, scale: ScaleMode) {
        self.scale = scale;
        let mut params = *self.pipeline.params();
        params.scale_mode = scale;
        self.pipeline.set_params(params);
    }

    fn transition(&mut self, mode: Mode) -> TickEpoch {
        self.mode = mode;
        self.epoch += 1;
        TickEpoch(self.epoch)
    }

    pub fn start_live(&mut self, source: Box<dyn FrameSource>) -> TickEpoch {
        self.stop();
        let params = source.params();
        log::info!(
            "Live capture: {}Hz, transform size {}",
            params.sample_rate_hz,
            params.transform_size
        );
        self.pipeline.set_params(params.with_scale(self.scale));
        self.pipeline.reset();
        self.transition(Mode::Live { params, source })
    }

    /// Only meaningful while live; returns whether recording started.
    pub fn start_recording(&mut self) -> bool {
        if !self.is_live() {
            log::warn!("Recording needs live capture");
            return false;
        }
        self.recorder.start();
        log::info!("Recording started");
        true
    }

    /// Finalize the current take into the collection.
    pub fn stop_recording(&mut self, label: Option<String>) -> Option<Rc<Recording>> {
        if !self.recorder.is_recording() {
            return None;
        }
        let params = match &self.mode {
            Mode::Live { params, .. } => params.with_scale(self.scale),
            _ => *self.pipeline.params(),
        };
        let meta = self.store.next_meta(label);
        match self.recorder.stop(params, meta) {
            Some(recording) => Some(self.store.insert(recording)),
            None => {
                log::info!("Recording stopped with no frames; nothing saved");
                None
            }
        }
    }

    /// Switch to replaying `id`. Live capture (and any take in progress) ends
    /// first.
    pub fn start_replay(&mut self, id: &str, now_ms: f64) -> Option<TickEpoch> {
        let Some(recording) = self.store.get(id) else {
            log::warn!("No recording with id {}", id);
            return None;
        };
        self.stop();
        let mut params = recording.params;
        params.scale_mode = self.scale;
        self.pipeline.set_params(params);
        self.pipeline.reset();
        Some(self.transition(Mode::Replaying(ReplayEngine::new(recording, now_ms))))
    }

    /// Back to idle from any mode. An active take is saved under its default
    /// label.
    pub fn stop(&mut self) {
        if self.recorder.is_recording() {
            self.stop_recording(None);
        }
        if !self.is_idle() {
            log::info!("Stopping {}", if self.is_live() { "live capture" } else { "replay" });
            self.transition(Mode::Idle);
        }
    }

    /// Delete a recording, cancelling its replay first if it is playing.
    pub fn delete_recording(&mut self, id: &str) -> bool {
        if self.replaying().is_some_and(|r| r.id == id) {
            self.stop();
        }
        self.store.delete(id)
    }

    pub fn rename_recording(&mut self, id: &str, label: &str) -> bool {
        self.store.rename(id, label)
    }

    /// Run one tick for the driver holding `epoch`.
    pub fn tick(&mut self, epoch: TickEpoch, now_ms: f64) -> TickOutcome {
        if epoch.0 != self.epoch {
            return TickOutcome::Cancelled;
        }
        match &mut self.mode {
            Mode::Idle => TickOutcome::Idle,
            Mode::Live { source, .. } => match source.next_frame() {
                Ok(None) => {
                    self.stop();
                    TickOutcome::Ended
                }
                Err(err) => {
                    log::warn!("Acquisition error, frame skipped: {}", err);
                    TickOutcome::Dropped(err)
                }
                Ok(Some(frame)) => match self.pipeline.process(frame.view()) {
                    Ok(summary) => {
                        let summary = summary.clone();
                        self.recorder.append(now_ms, frame.magnitudes, frame.time_domain);
                        TickOutcome::Rendered(summary)
                    }
                    Err(err) => {
                        log::warn!("Dropping frame: {}", err);
                        TickOutcome::Dropped(err)
                    }
                },
            },
            Mode::Replaying(engine) => {
                let Some((frame, selection)) = engine.tick(now_ms) else {
                    self.stop();
                    return TickOutcome::Idle;
                };
                let outcome = match self.pipeline.process(frame.view()) {
                    Ok(summary) => TickOutcome::Rendered(summary.clone()),
                    Err(err) => {
                        log::warn!("Dropping replayed frame {}: {}", selection.index, err);
                        TickOutcome::Dropped(err)
                    }
                };
                if selection.complete {
                    log::info!("Replay complete");
                    self.stop();
                }
                outcome
            }
        }
    }
}

fn clock(ms: f64) -> String {
    let ms = ms.max(0.0);
    let secs = (ms / 1000.0).floor() as u64;
    let tenths = ((ms % 1000.0) / 100.0).floor() as u64;
    format!("{:02}:{:02}.{}", secs / 60, secs % 60, tenths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::acquisition::AcquiredFrame;
    use crate::audio::features::AnalysisParams;
    use crate::error::Result;
    use crate::render::frame::Layout;

    const SR: u32 = 8000;
    const N: usize = 64;

    /// Emits `remaining` frames with a tone in bin 5, then ends.
    struct ScriptedSource {
        remaining: usize,
        bad_at: Option<usize>,
        emitted: usize,
    }

    impl ScriptedSource {
        fn boxed(remaining: usize) -> Box<dyn FrameSource> {
            Box::new(Self {
                remaining,
                bad_at: None,
                emitted: 0,
            })
        }
    }

    impl FrameSource for ScriptedSource {
        fn params(&self) -> AcquisitionParams {
            AcquisitionParams {
                sample_rate_hz: SR,
                transform_size: N,
            }
        }

        fn next_frame(&mut self) -> Result<Option<AcquiredFrame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let index = self.emitted;
            self.emitted += 1;
            let mut magnitudes = vec![0u8; N / 2];
            magnitudes[5] = 200;
            if self.bad_at == Some(index) {
                magnitudes.truncate(3);
            }
            Ok(Some(AcquiredFrame {
                magnitudes,
                time_domain: vec![128; N],
            }))
        }
    }

    fn controller() -> ModeController {
        let layout = Layout::new(160, 120);
        let pipeline = RenderPipeline::new(&layout, AnalysisParams::new(SR, N, ScaleMode::Linear));
        ModeController::new(pipeline, RecordingStore::in_memory())
    }

    #[test]
    fn records_live_ticks_and_replays_them() {
        let mut c = controller();
        let live = c.start_live(ScriptedSource::boxed(3));
        assert!(c.start_recording());
        for now in [0.0, 33.0, 66.0] {
            assert!(matches!(c.tick(live, now), TickOutcome::Rendered(_)));
        }
        assert!(matches!(c.tick(live, 99.0), TickOutcome::Ended));
        assert!(c.is_idle());

        // Input running out saved the take.
        assert_eq!(c.store().len(), 1);
        let rec = Rc::clone(&c.store().list()[0]);
        assert_eq!(rec.duration_ms, 66.0);
        assert_eq!(rec.frames.len(), 3);

        let replay = c.start_replay(&rec.id, 1000.0).unwrap();
        assert!(matches!(c.tick(live, 1000.0), TickOutcome::Cancelled));
        match c.tick(replay, 1010.0) {
            TickOutcome::Rendered(summary) => assert_eq!(summary.dominant_freq_hz, 625.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(c.replaying().is_some());
        assert!(matches!(c.tick(replay, 1100.0), TickOutcome::Rendered(_)));
        assert!(c.is_idle());
        assert!(matches!(c.tick(replay, 1133.0), TickOutcome::Cancelled));
    }

    #[test]
    fn stopping_recording_without_ticks_saves_nothing() {
        let mut c = controller();
        c.start_live(ScriptedSource::boxed(10));
        assert!(c.start_recording());
        assert!(c.stop_recording(Some("empty".into())).is_none());
        assert!(c.store().is_empty());
    }

    #[test]
    fn recording_requires_live_mode() {
        let mut c = controller();
        assert!(!c.start_recording());
    }

    #[test]
    fn replay_cancels_live_and_keeps_take() {
        let mut c = controller();
        let live = c.start_live(ScriptedSource::boxed(100));
        c.start_recording();
        c.tick(live, 0.0);
        c.tick(live, 40.0);
        let first = c.stop_recording(Some("first".into())).unwrap();
        c.start_recording();
        c.tick(live, 80.0);

        let replay = c.start_replay(&first.id, 500.0).unwrap();
        assert!(!c.is_live());
        assert!(!c.is_recording());
        // The in-progress take was finalized before switching.
        assert_eq!(c.store().len(), 2);
        assert!(matches!(c.tick(live, 500.0), TickOutcome::Cancelled));
        assert!(matches!(c.tick(replay, 500.0), TickOutcome::Rendered(_)));
    }

    #[test]
    fn deleting_replayed_recording_cancels_replay() {
        let mut c = controller();
        let live = c.start_live(ScriptedSource::boxed(2));
        c.start_recording();
        c.tick(live, 0.0);
        c.tick(live, 50.0);
        let rec = c.stop_recording(None).unwrap();
        let replay = c.start_replay(&rec.id, 0.0).unwrap();
        assert!(c.delete_recording(&rec.id));
        assert!(c.is_idle());
        assert!(matches!(c.tick(replay, 10.0), TickOutcome::Cancelled));
        assert!(c.store().is_empty());
    }

    #[test]
    fn rename_keeps_running_replay_snapshot() {
        let mut c = controller();
        let live = c.start_live(ScriptedSource::boxed(2));
        c.start_recording();
        c.tick(live, 0.0);
        c.tick(live, 50.0);
        let rec = c.stop_recording(Some("before".into())).unwrap();
        c.start_replay(&rec.id, 0.0).unwrap();
        assert!(c.rename_recording(&rec.id, "after"));
        assert_eq!(c.store().get(&rec.id).unwrap().label, "after");
        assert_eq!(c.replaying().unwrap().label, "before");
        assert!(!c.rename_recording("missing", "x"));
        assert!(!c.delete_recording("missing"));
        assert!(c.replaying().is_some());
    }

    #[test]
    fn bad_frame_is_dropped_and_loop_continues() {
        let mut c = controller();
        let live = c.start_live(Box::new(ScriptedSource {
            remaining: 3,
            bad_at: Some(1),
            emitted: 0,
        }));
        c.start_recording();
        assert!(matches!(c.tick(live, 0.0), TickOutcome::Rendered(_)));
        assert!(matches!(
            c.tick(live, 33.0),
            TickOutcome::Dropped(CascadeError::InvalidFrame { .. })
        ));
        assert!(matches!(c.tick(live, 66.0), TickOutcome::Rendered(_)));
        let rec = c.stop_recording(None).unwrap();
        assert_eq!(rec.frames.len(), 2);
        assert_eq!(rec.duration_ms, 66.0);
    }

    #[test]
    fn status_labels() {
        let mut c = controller();
        assert_eq!(c.status(0.0), "");
        let live = c.start_live(ScriptedSource::boxed(5));
        assert_eq!(c.status(0.0), "LIVE");
        c.start_recording();
        c.tick(live, 1000.0);
        c.tick(live, 4250.0);
        assert_eq!(c.status(0.0), "REC 00:03.2");
    }

    #[test]
    fn scale_switch_updates_pipeline() {
        let mut c = controller();
        c.set_scale(ScaleMode::Logarithmic);
        assert_eq!(c.pipeline().params().scale_mode, ScaleMode::Logarithmic);
        c.start_live(ScriptedSource::boxed(1));
        assert_eq!(c.pipeline().params().scale_mode, ScaleMode::Logarithmic);
    }
}
