//! Structured progress events.
//!
//! Sinks must not fail or block the pipeline; write errors are logged and
//! dropped.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

/// Receives one record per stage transition, fallback and outcome.
pub trait EventSink: Send + Sync {
    fn record(&self, job_id: &str, stage: &str, payload: serde_json::Value);
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub job_id: String,
    pub stage: String,
    pub payload: serde_json::Value,
    pub at: String,
}

impl EventRecord {
    fn now(job_id: &str, stage: &str, payload: serde_json::Value) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage: stage.to_string(),
            payload,
            at: slidecast_common::clock::now_rfc3339(),
        }
    }
}

/// Appends events to `<dir>/job_<id>.jsonl`.
///
/// `record` only enqueues; a writer thread owns the files. Dropping the
/// sink drains the queue before returning.
#[derive(Debug)]
pub struct JsonlEventSink {
    dir: PathBuf,
    tx: Option<mpsc::Sender<EventRecord>>,
    writer: Option<JoinHandle<()>>,
}

impl JsonlEventSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (tx, rx) = mpsc::channel::<EventRecord>();
        let writer_dir = dir.clone();
        let writer = std::thread::Builder::new()
            .name("slidecast-events".to_string())
            .spawn(move || {
                for record in rx {
                    let path = jsonl_path(&writer_dir, &record.job_id);
                    if let Err(e) = append(&writer_dir, &path, &record) {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to write event");
                    }
                }
            });
        let writer = match writer {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot start event writer, events will be dropped");
                None
            }
        };
        Self {
            dir,
            tx: writer.as_ref().map(|_| tx),
            writer,
        }
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        jsonl_path(&self.dir, job_id)
    }
}

fn jsonl_path(dir: &Path, job_id: &str) -> PathBuf {
    dir.join(format!("job_{job_id}.jsonl"))
}

fn append(dir: &Path, path: &Path, record: &EventRecord) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

impl EventSink for JsonlEventSink {
    fn record(&self, job_id: &str, stage: &str, payload: serde_json::Value) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(EventRecord::now(job_id, stage, payload)).is_err() {
            tracing::warn!(job_id, stage, "Event writer stopped, dropping event");
        }
    }
}

impl Drop for JsonlEventSink {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                tracing::warn!("Event writer panicked");
            }
        }
    }
}

/// Emits events as tracing records only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, job_id: &str, stage: &str, payload: serde_json::Value) {
        tracing::info!(job_id, stage, payload = %payload, "Pipeline event");
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<EventRecord>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Stage names in recording order.
    pub fn stages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.stage).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, job_id: &str, stage: &str, payload: serde_json::Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push(EventRecord::now(job_id, stage, payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlEventSink::new(dir.path().join("events"));
        let path = sink.path_for("abc");
        sink.record("abc", "init", json!({"images": 3}));
        sink.record("abc", "resources_ready", json!({}));
        drop(sink);

        let content = std::fs::read_to_string(path).unwrap();
        let records: Vec<EventRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stage, "init");
        assert_eq!(records[0].payload["images"], 3);
        assert_eq!(records[1].job_id, "abc");
    }

    #[test]
    fn test_unwritable_sink_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = JsonlEventSink::new(blocker.join("events"));
        sink.record("abc", "init", json!(null));
        drop(sink);
    }

    #[test]
    fn test_jsonl_sink_keeps_order_through_queue() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlEventSink::new(dir.path().join("events"));
        let path = sink.path_for("q");
        for i in 0..100 {
            sink.record("q", "tick", json!(i));
        }
        drop(sink);

        let content = std::fs::read_to_string(path).unwrap();
        let ticks: Vec<i64> = content
            .lines()
            .map(|l| serde_json::from_str::<EventRecord>(l).unwrap().payload.as_i64().unwrap())
            .collect();
        assert_eq!(ticks, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_tracing_sink_accepts_events() {
        TracingEventSink.record("j", "init", json!({"images": 1}));
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryEventSink::new();
        sink.record("j", "a", json!(1));
        sink.record("j", "b", json!(2));
        assert_eq!(sink.stages(), ["a", "b"]);
    }
}
