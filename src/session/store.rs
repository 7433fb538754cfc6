use serde_json::Value;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::audio::features::AnalysisParams;
use crate::error::{CascadeError, Result};

use super::epoch_ms;
use super::recorder::RecordingMeta;
use super::recording::{reconcile, PartialRecording, Recording, RecordingDefaults};

/// Outcome of an import batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub skipped: usize,
}

/// The recordings collection, most recent first. Persists to a JSON file
/// after every change; if the file cannot be used the store keeps working in
/// memory for the rest of the session.
#[derive(Debug)]
pub struct RecordingStore {
    recordings: Vec<Rc<Recording>>,
    path: Option<PathBuf>,
    id_seq: u64,
}

impl RecordingStore {
    pub fn in_memory() -> Self {
        Self {
            recordings: Vec::new(),
            path: None,
            id_seq: 0,
        }
    }

    /// Restore the collection from `path`. A missing file starts empty; an
    /// unreadable one degrades to memory-only.
    pub fn open(path: PathBuf, defaults: AnalysisParams) -> Self {
        let mut store = Self::in_memory();
        match load_file(&path) {
            Ok(Some(entries)) => {
                let report = store.absorb(entries, defaults);
                log::info!(
                    "Loaded {} recordings from {} ({} skipped)",
                    report.imported.len(),
                    path.display(),
                    report.skipped
                );
                store.path = Some(path);
            }
            Ok(None) => {
                log::debug!("No recordings file at {}", path.display());
                store.path = Some(path);
            }
            Err(err) => log::warn!("{}; recordings will not be saved this session", err),
        }
        store
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    pub fn list(&self) -> &[Rc<Recording>] {
        &self.recordings
    }

    pub fn get(&self, id: &str) -> Option<Rc<Recording>> {
        self.recordings.iter().find(|r| r.id == id).cloned()
    }

    fn contains(&self, id: &str) -> bool {
        self.recordings.iter().any(|r| r.id == id)
    }

    /// An id not used by any stored recording.
    pub fn fresh_id(&mut self) -> String {
        let now = epoch_ms();
        loop {
            self.id_seq += 1;
            let id = format!("rec-{}-{}", now, self.id_seq);
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Identity for a recording that is about to be finalized.
    pub fn next_meta(&mut self, label: Option<String>) -> RecordingMeta {
        let label = label.unwrap_or_else(|| format!("Recording {}", self.len() + 1));
        RecordingMeta {
            id: self.fresh_id(),
            label,
            created_at_ms: epoch_ms(),
        }
    }

    pub fn insert(&mut self, recording: Recording) -> Rc<Recording> {
        let mut recording = recording;
        if self.contains(&recording.id) {
            recording.id = self.fresh_id();
        }
        let rc = Rc::new(recording);
        self.recordings.insert(0, Rc::clone(&rc));
        log::info!(
            "Stored recording {} '{}' ({} frames, {:.0}ms)",
            rc.id,
            rc.label,
            rc.frames.len(),
            rc.duration_ms
        );
        self.persist();
        rc
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.recordings.len();
        self.recordings.retain(|r| r.id != id);
        let removed = self.recordings.len() != before;
        if removed {
            log::info!("Deleted recording {}", id);
            self.persist();
        }
        removed
    }

    pub fn rename(&mut self, id: &str, label: &str) -> bool {
        let Some(slot) = self.recordings.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        Rc::make_mut(slot).label = label.to_string();
        self.persist();
        true
    }

    /// Import a JSON array (or a single object) of recordings. Bad entries
    /// are skipped; the rest land at the front in file order.
    pub fn import_json(&mut self, text: &str, defaults: AnalysisParams) -> Result<ImportReport> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CascadeError::MalformedRecording(format!("not valid JSON: {}", e)))?;
        let entries = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        let report = self.absorb(entries, defaults);
        if !report.imported.is_empty() {
            self.persist();
        }
        Ok(report)
    }

    fn absorb(&mut self, entries: Vec<Value>, defaults: AnalysisParams) -> ImportReport {
        let mut report = ImportReport::default();
        let mut accepted = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let fallback = RecordingDefaults {
                params: defaults,
                fresh_id: self.fresh_id(),
                label: format!("Imported {}", self.len() + accepted.len() + 1),
                now_ms: epoch_ms(),
            };
            let parsed = PartialRecording::from_json(entry).and_then(|p| reconcile(p, &fallback));
            match parsed {
                Ok(mut rec) => {
                    let taken = self.contains(&rec.id)
                        || accepted.iter().any(|r: &Recording| r.id == rec.id);
                    if taken {
                        rec.id = fallback.fresh_id;
                    }
                    report.imported.push(rec.id.clone());
                    accepted.push(rec);
                }
                Err(err) => {
                    log::warn!("Skipping recording entry {}: {}", i, err);
                    report.skipped += 1;
                }
            }
        }
        let tail = std::mem::take(&mut self.recordings);
        self.recordings = accepted.into_iter().map(Rc::new).chain(tail).collect();
        report
    }

    /// Serialize the given recordings (all when `ids` is empty).
    pub fn export_json(&self, ids: &[String]) -> Result<String> {
        let docs: Vec<Value> = self
            .recordings
            .iter()
            .filter(|r| ids.is_empty() || ids.contains(&r.id))
            .map(|r| r.to_json())
            .collect();
        serde_json::to_string_pretty(&docs)
            .map_err(|e| CascadeError::StorageUnavailable(e.to_string()))
    }

    fn persist(&mut self) {
        let Some(path) = self.path.clone() else {
            return;
        };
        if let Err(err) = self.write_file(&path) {
            log::warn!("{}; continuing without saving", err);
            self.path = None;
        }
    }

    fn write_file(&self, path: &Path) -> Result<()> {
        let unavailable = |e: std::io::Error| {
            CascadeError::StorageUnavailable(format!("{}: {}", path.display(), e))
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(unavailable)?;
        }
        let text = self.export_json(&[])?;
        std::fs::write(path, text).map_err(unavailable)
    }
}

fn load_file(path: &Path) -> Result<Option<Vec<Value>>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CascadeError::StorageUnavailable(format!(
                "{}: {}",
                path.display(),
                e
            )))
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(items)) => Ok(Some(items)),
        Ok(_) => Err(CascadeError::StorageUnavailable(format!(
            "{}: expected a JSON array",
            path.display()
        ))),
        Err(e) => Err(CascadeError::StorageUnavailable(format!(
            "{}: {}",
            path.display(),
            e
        ))),
    }
}
