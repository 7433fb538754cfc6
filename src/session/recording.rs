//! Recordings and their JSON transport form.
//!
//! The transport shape is
//! `{id, label, createdAt, durationMs, sampleRateHz, transformSize,
//! bufferLength, frames: [{t, freq: [...], timeDomain: [...]}]}`.
//! Imports are lenient: anything missing (or of the wrong type) falls back to
//! the caller's defaults, except `frames`, which must be a non-empty array.

use serde::Serialize;
use serde_json::Value;

use crate::audio::features::{AnalysisParams, Frame};
use crate::error::{CascadeError, Result};

/// A finished capture. Never mutated after creation apart from its label.
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    pub id: String,
    pub label: String,
    /// Milliseconds since the Unix epoch
    pub created_at_ms: u64,
    /// Time of the last frame
    pub duration_ms: f64,
    pub params: AnalysisParams,
    /// Chronological, non-decreasing in `relative_time_ms`
    pub frames: Vec<Frame>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordingDoc<'a> {
    id: &'a str,
    label: &'a str,
    created_at: u64,
    duration_ms: f64,
    sample_rate_hz: u32,
    transform_size: usize,
    buffer_length: usize,
    frames: Vec<FrameDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameDoc<'a> {
    t: f64,
    freq: &'a [u8],
    time_domain: &'a [u8],
}

impl Recording {
    pub fn to_json(&self) -> Value {
        let doc = RecordingDoc {
            id: &self.id,
            label: &self.label,
            created_at: self.created_at_ms,
            duration_ms: self.duration_ms,
            sample_rate_hz: self.params.sample_rate_hz,
            transform_size: self.params.transform_size,
            buffer_length: self.params.buffer_length(),
            frames: self
                .frames
                .iter()
                .map(|f| FrameDoc {
                    t: f.relative_time_ms,
                    freq: &f.magnitudes,
                    time_domain: &f.time_domain,
                })
                .collect(),
        };
        // Plain structs of numbers and strings always serialize.
        serde_json::to_value(doc).unwrap_or(Value::Null)
    }
}

/// Fills in whatever an imported entry leaves out.
#[derive(Clone, Debug)]
pub struct RecordingDefaults {
    /// Current live analysis params
    pub params: AnalysisParams,
    pub fresh_id: String,
    pub label: String,
    pub now_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialFrame {
    pub t: Option<f64>,
    pub freq: Option<Vec<u8>>,
    pub time_domain: Option<Vec<u8>>,
}

/// An imported entry with every field optional.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialRecording {
    pub id: Option<String>,
    pub label: Option<String>,
    pub created_at_ms: Option<u64>,
    pub duration_ms: Option<f64>,
    pub sample_rate_hz: Option<u32>,
    pub transform_size: Option<usize>,
    pub buffer_length: Option<usize>,
    pub frames: Vec<PartialFrame>,
}

fn malformed(msg: impl Into<String>) -> CascadeError {
    CascadeError::MalformedRecording(msg.into())
}

fn byte_array(value: &Value, field: &str) -> Result<Option<Vec<u8>>> {
    let Some(items) = value.as_array() else {
        return Ok(None);
    };
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .filter(|&n| n <= 255)
                .or_else(|| item.as_f64().filter(|n| (0.0..=255.0).contains(n)).map(|n| n as u64))
                .map(|n| n as u8)
                .ok_or_else(|| malformed(format!("{} holds {} which is not a byte", field, item)))
        })
        .collect::<Result<Vec<u8>>>()
        .map(Some)
}

fn positive_u64(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_f64).filter(|n| *n >= 0.0).map(|n| n as u64)
}

impl PartialRecording {
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| malformed("entry is not an object"))?;
        let frames = obj
            .get("frames")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("`frames` is not an array"))?;

        let frames = frames
            .iter()
            .map(|frame| {
                Ok(PartialFrame {
                    t: frame.get("t").and_then(Value::as_f64),
                    freq: match frame.get("freq") {
                        Some(v) => byte_array(v, "freq")?,
                        None => None,
                    },
                    time_domain: match frame.get("timeDomain") {
                        Some(v) => byte_array(v, "timeDomain")?,
                        None => None,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: obj.get("id").and_then(Value::as_str).map(str::to_owned),
            label: obj.get("label").and_then(Value::as_str).map(str::to_owned),
            created_at_ms: positive_u64(obj.get("createdAt")),
            duration_ms: obj.get("durationMs").and_then(Value::as_f64),
            sample_rate_hz: positive_u64(obj.get("sampleRateHz"))
                .filter(|&n| n > 0)
                .and_then(|n| u32::try_from(n).ok()),
            transform_size: positive_u64(obj.get("transformSize"))
                .filter(|&n| n >= 2)
                .map(|n| n as usize),
            buffer_length: positive_u64(obj.get("bufferLength"))
                .filter(|&n| n >= 1)
                .map(|n| n as usize),
            frames,
        })
    }
}

/// Merge an imported entry with defaults into a complete [`Recording`].
///
/// Frames are put in time order, missing timestamps repeat the previous one,
/// missing arrays become silence. The stored duration is always recomputed
/// from the last frame.
pub fn reconcile(partial: PartialRecording, defaults: &RecordingDefaults) -> Result<Recording> {
    if partial.frames.is_empty() {
        return Err(malformed("recording has no frames"));
    }

    if let (Some(n), Some(len)) = (partial.transform_size, partial.buffer_length) {
        if n / 2 != len {
            return Err(malformed(format!(
                "bufferLength {} does not match transformSize {}",
                len, n
            )));
        }
    }
    // Undeclared sizes come from the frames themselves before the defaults.
    let transform_size = partial
        .transform_size
        .or(partial.buffer_length.map(|len| len * 2))
        .or_else(|| {
            partial.frames.iter().find_map(|f| {
                f.freq
                    .as_ref()
                    .map(|m| m.len() * 2)
                    .or(f.time_domain.as_ref().map(Vec::len))
                    .filter(|&n| n >= 2)
            })
        })
        .unwrap_or(defaults.params.transform_size);
    let params = AnalysisParams::new(
        partial.sample_rate_hz.unwrap_or(defaults.params.sample_rate_hz),
        transform_size,
        defaults.params.scale_mode,
    );

    let mut last_t = 0.0;
    let mut frames: Vec<Frame> = partial
        .frames
        .into_iter()
        .map(|f| {
            let t = f.t.filter(|t| t.is_finite()).map_or(last_t, |t| t.max(0.0));
            last_t = t;
            Frame {
                relative_time_ms: t,
                magnitudes: f.freq.unwrap_or_else(|| vec![0; params.buffer_length()]),
                time_domain: f.time_domain.unwrap_or_else(|| vec![128; params.transform_size]),
            }
        })
        .collect();
    for (i, frame) in frames.iter().enumerate() {
        if frame.magnitudes.len() != params.buffer_length() {
            return Err(malformed(format!(
                "frame {} has {} magnitudes, expected {}",
                i,
                frame.magnitudes.len(),
                params.buffer_length()
            )));
        }
        if frame.time_domain.len() != params.transform_size {
            return Err(malformed(format!(
                "frame {} has {} time-domain samples, expected {}",
                i,
                frame.time_domain.len(),
                params.transform_size
            )));
        }
    }
    frames.sort_by(|a, b| a.relative_time_ms.total_cmp(&b.relative_time_ms));

    if let (Some(declared), Some(last)) = (partial.duration_ms, frames.last()) {
        if (declared - last.relative_time_ms).abs() > 1.0 {
            log::debug!(
                "Ignoring declared duration {}ms; last frame is at {}ms",
                declared,
                last.relative_time_ms
            );
        }
    }
    let duration_ms = frames.last().map_or(0.0, |f| f.relative_time_ms);

    Ok(Recording {
        id: partial.id.filter(|s| !s.is_empty()).unwrap_or_else(|| defaults.fresh_id.clone()),
        label: partial.label.unwrap_or_else(|| defaults.label.clone()),
        created_at_ms: partial.created_at_ms.unwrap_or(defaults.now_ms),
        duration_ms,
        params,
        frames,
    })
}
