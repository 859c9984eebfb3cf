//! Trajectory recording and persistence.
//!
//! The recorder owns the in-memory message sequence and two kinds of
//! persistence:
//!
//! - a **live log**: one JSON message per line, appended as messages arrive,
//!   so an observer can tail the run while it happens;
//! - a **snapshot**: the full serialized run state, rebuilt from scratch and
//!   overwritten on every checkpoint, so a crash leaves the latest
//!   consistent state on disk.
//!
//! Persistence is strictly best-effort. A write failure is logged and
//! swallowed; it must never abort the run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use ironloop_core::merge::recursive_merge;
use ironloop_core::message::Message;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Version tag written into every snapshot.
pub const TRAJECTORY_FORMAT: &str = "ironloop-trajectory-1";

/// Accumulates the conversation and persists it.
#[derive(Debug, Default)]
pub struct TrajectoryRecorder {
    messages: Vec<Message>,
    live_path: Option<PathBuf>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conversation so far, in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop all messages. The live log target is kept as-is.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Append messages to the sequence and stream them to the live log.
    pub fn append(&mut self, messages: Vec<Message>) {
        debug!(count = messages.len(), "Appending messages");
        if let Some(path) = &self.live_path {
            if let Err(e) = append_live_lines(path, &messages) {
                warn!(path = %path.display(), error = %e, "Failed to write live trajectory");
            }
        }
        self.messages.extend(messages);
    }

    /// Switch the live-log target, deleting any pre-existing file there.
    ///
    /// Passing `None` disables live logging. A missing file at the new path
    /// is not an error.
    pub fn reset_live_log(&mut self, path: Option<PathBuf>) {
        if let Some(path) = &path {
            if let Err(e) = remove_if_present(path) {
                warn!(path = %path.display(), error = %e, "Failed to reset live trajectory file");
            }
        }
        self.live_path = path;
    }

    /// Build the full snapshot: run info, the message sequence, and any
    /// collaborator-supplied extras, deep-merged in order.
    pub fn snapshot(&self, info: Value, extras: &[Value]) -> Value {
        let base = json!({
            "info": info,
            "messages": self.messages,
            "trajectory_format": TRAJECTORY_FORMAT,
        });
        extras
            .iter()
            .cloned()
            .fold(base, recursive_merge)
    }

    /// Serialize and write the snapshot to `path` when given.
    ///
    /// Always returns the in-memory snapshot. Write failures are logged and
    /// swallowed.
    pub fn save(&self, path: Option<&Path>, info: Value, extras: &[Value]) -> Value {
        let snapshot = self.snapshot(info, extras);
        if let Some(path) = path {
            if let Err(e) = write_snapshot(path, &snapshot) {
                warn!(path = %path.display(), error = %e, "Failed to save trajectory snapshot");
            }
        }
        snapshot
    }
}

fn append_live_lines(path: &Path, messages: &[Message]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for message in messages {
        let line = serde_json::to_string(message).map_err(std::io::Error::other)?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn write_snapshot(path: &Path, snapshot: &Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(snapshot).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}
