//! Analysis progress reporting.
//!
//! The pipeline emits [`ProgressUpdate`]s: partial records naming only the
//! fields that changed (`status`, `progress`, `message`, and stage outputs
//! such as `selection` or `statistics`). A sink merges or renders them and
//! never receives a full overwrite. Human and JSON output go to **stderr**
//! so stdout remains parseable for scripts.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;

/// Lifecycle state of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::InProgress => "in-progress",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != RunStatus::InProgress
    }
}

/// A partial update of the run record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub status: Option<RunStatus>,
    /// Percent complete, 0 to 100.
    pub progress: Option<u8>,
    pub message: Option<String>,
    /// Additional named fields, merged by key.
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(progress: u8, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress.min(100)),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a named field. Values that fail to serialize are skipped.
    #[must_use]
    pub fn field<T: Serialize>(mut self, name: &str, value: &T) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(name.to_string(), v);
        }
        self
    }

    /// The update as a flat JSON object.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut obj = self.fields.clone();
        if let Some(status) = self.status {
            obj.insert("status".into(), status.as_str().into());
        }
        if let Some(progress) = self.progress {
            obj.insert("progress".into(), progress.into());
        }
        if let Some(message) = &self.message {
            obj.insert("message".into(), message.clone().into());
        }
        obj
    }
}

/// Receives partial run updates. Implementations must not block for long.
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: ProgressUpdate);
}

impl<T: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<T> {
    fn update(&self, update: ProgressUpdate) {
        (**self).update(update);
    }
}

/// Human-friendly progress on stderr: `[ 30%] fetching  12 / 50 files`.
pub struct StderrProgress {
    run_label: String,
}

impl StderrProgress {
    pub fn new(run_label: impl Into<String>) -> Self {
        Self {
            run_label: run_label.into(),
        }
    }
}

impl ProgressSink for StderrProgress {
    fn update(&self, update: ProgressUpdate) {
        let (Some(progress), Some(message)) = (update.progress, update.message.as_deref()) else {
            if let Some(status) = update.status.filter(|s| s.is_terminal()) {
                let _ = writeln!(std::io::stderr().lock(), "{}  {}", self.run_label, status.as_str());
            }
            return;
        };
        let line = format!("{}  [{:>3}%] {}\n", self.run_label, progress, message);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress {
    run_id: String,
}

impl JsonProgress {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }
}

impl ProgressSink for JsonProgress {
    fn update(&self, update: ProgressUpdate) {
        let mut obj = update.to_json();
        obj.insert("event".into(), "progress".into());
        obj.insert("runId".into(), self.run_id.clone().into());
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op sink when progress is disabled.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _update: ProgressUpdate) {}
}

/// Keeps the merged run record and the sequence of progress values.
#[derive(Default)]
pub struct RecordingProgress {
    record: Mutex<serde_json::Map<String, serde_json::Value>>,
    history: Mutex<Vec<u8>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// The merged record so far.
    pub fn record(&self) -> serde_json::Map<String, serde_json::Value> {
        self.record.lock().unwrap().clone()
    }

    /// Every progress value received, in order.
    pub fn history(&self) -> Vec<u8> {
        self.history.lock().unwrap().clone()
    }

    pub fn status(&self) -> Option<String> {
        self.record
            .lock()
            .unwrap()
            .get("status")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

impl ProgressSink for RecordingProgress {
    fn update(&self, update: ProgressUpdate) {
        if let Some(p) = update.progress {
            self.history.lock().unwrap().push(p);
        }
        let mut record = self.record.lock().unwrap();
        for (k, v) in update.to_json() {
            record.insert(k, v);
        }
    }
}

/// Forwards every update to several sinks.
pub struct FanOut(pub Vec<Box<dyn ProgressSink>>);

impl ProgressSink for FanOut {
    fn update(&self, update: ProgressUpdate) {
        for sink in &self.0 {
            sink.update(update.clone());
        }
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a sink for this mode.
    pub fn sink(&self, run_id: &str, label: &str) -> Box<dyn ProgressSink> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress::new(label)),
            ProgressMode::Json => Box::new(JsonProgress::new(run_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_merges_partial_updates() {
        let sink = RecordingProgress::new();
        sink.update(ProgressUpdate::at(5, "fetching metadata").status(RunStatus::InProgress));
        sink.update(ProgressUpdate::at(25, "selected 3 files").field("selection", &serde_json::json!({"selectedCount": 3})));
        sink.update(ProgressUpdate::new().status(RunStatus::Completed));

        let record = sink.record();
        assert_eq!(record["status"], "completed");
        assert_eq!(record["progress"], 25);
        assert_eq!(record["message"], "selected 3 files");
        assert_eq!(record["selection"]["selectedCount"], 3);
        assert_eq!(sink.history(), vec![5, 25]);
    }

    #[test]
    fn test_update_json_is_flat() {
        let update = ProgressUpdate::at(150, "done").status(RunStatus::Partial);
        let obj = update.to_json();
        assert_eq!(obj["progress"], 100);
        assert_eq!(obj["status"], "partial");
        assert_eq!(obj.len(), 3);
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let sink = std::sync::Arc::new(RecordingProgress::new());
        let fan = FanOut(vec![Box::new(NoProgress), Box::new(sink.clone())]);
        fan.update(ProgressUpdate::at(10, "x"));
        assert_eq!(sink.history(), vec![10]);
    }
}
