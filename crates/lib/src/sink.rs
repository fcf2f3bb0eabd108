//! Keyed log multiplexing with a durable transcript.
//!
//! Concurrent fetch tasks all report through one [`LogSink`]. Each package
//! owns a line slot keyed by `<collection>:<name>`: the first write appends,
//! later writes overwrite that line in place, so a live display shows one
//! up-to-date line per package. Every keyed write is also appended to a
//! transcript file so the full history survives the in-place overwrites.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::warn;

/// Errors raised while setting up the transcript file.
#[derive(Debug, Error)]
pub enum SinkError {
  /// The transcript file could not be opened for appending.
  #[error("failed to open transcript {}: {source}", path.display())]
  Transcript { path: PathBuf, source: io::Error },
}

/// A live display with addressable line slots.
///
/// The sink mirrors every write here; the host decides how lines render.
/// Slot numbers handed to [`Surface::set_line`] always refer to a line the
/// surface previously received via [`Surface::append`].
pub trait Surface: Send {
  /// Append a line to the end of the display.
  fn append(&self, text: &str);
  /// Replace the line at `slot` with new text.
  fn set_line(&self, slot: usize, text: &str);
  /// Reset the display.
  fn clear(&self);
}

struct Transcript {
  path: PathBuf,
  file: File,
  failed: bool,
}

impl Transcript {
  fn open(path: &Path) -> Result<Self, SinkError> {
    let as_sink_error = |source: io::Error| SinkError::Transcript { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(as_sink_error)?;
    }
    let file = OpenOptions::new()
      .append(true)
      .create(true)
      .open(path)
      .map_err(as_sink_error)?;
    Ok(Transcript { path: path.to_path_buf(), file, failed: false })
  }

  /// Append one `<key> <text>` line. Failures are reported once and the
  /// transcript goes quiet; the live display must keep working.
  fn write_line(&mut self, key: &str, text: &str) {
    if self.failed {
      return;
    }
    let result = writeln!(self.file, "{key} {text}").and_then(|()| self.file.flush());
    if let Err(err) = result {
      warn!(path = %self.path.display(), error = %err, "transcript write failed, giving up on it");
      self.failed = true;
    }
  }
}

struct SinkInner {
  surface: Box<dyn Surface>,
  header: String,
  lines: Vec<String>,
  slots: HashMap<String, usize>,
  transcript: Option<Transcript>,
}

/// Serialized, keyed log fan-in shared by every fetch task.
///
/// Internally a mutex around the line mirror and slot table; the lock scope
/// is one line write, and nothing awaits while holding it. The sink is
/// `Send + Sync` and travels as `Arc<LogSink>`.
pub struct LogSink {
  inner: Mutex<SinkInner>,
}

impl LogSink {
  /// Create a sink without a transcript.
  pub fn new(surface: Box<dyn Surface>, header: impl Into<String>) -> Self {
    Self::build(surface, header.into(), None)
  }

  /// Create a sink that also appends every keyed write to the transcript
  /// at `path`, creating parent directories as needed.
  pub fn with_transcript(
    surface: Box<dyn Surface>,
    header: impl Into<String>,
    path: &Path,
  ) -> Result<Self, SinkError> {
    let transcript = Transcript::open(path)?;
    Ok(Self::build(surface, header.into(), Some(transcript)))
  }

  fn build(surface: Box<dyn Surface>, header: String, transcript: Option<Transcript>) -> Self {
    surface.append(&header);
    LogSink {
      inner: Mutex::new(SinkInner {
        surface,
        lines: vec![header.clone()],
        header,
        slots: HashMap::new(),
        transcript,
      }),
    }
  }

  fn inner(&self) -> std::sync::MutexGuard<'_, SinkInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Append an unkeyed line.
  pub fn log(&self, text: &str) {
    let mut inner = self.inner();
    inner.lines.push(text.to_string());
    inner.surface.append(text);
  }

  /// Write `text` on the line owned by `key`.
  ///
  /// The first write for a key appends a new line and remembers its slot;
  /// later writes overwrite that line in place. Every call lands in the
  /// transcript regardless.
  pub fn log_to(&self, key: &str, text: &str) {
    let mut inner = self.inner();
    if let Some(transcript) = inner.transcript.as_mut() {
      transcript.write_line(key, text);
    }
    let formatted = format!("{key} {text}");
    match inner.slots.get(key).copied() {
      Some(slot) => {
        inner.lines[slot] = formatted.clone();
        inner.surface.set_line(slot, &formatted);
      }
      None => {
        let slot = inner.lines.len();
        inner.slots.insert(key.to_string(), slot);
        inner.lines.push(formatted.clone());
        inner.surface.append(&formatted);
      }
    }
  }

  /// Reset the display to the header line and forget every key slot.
  ///
  /// The transcript is untouched; it spans runs of multiple commands.
  pub fn clear(&self) {
    let mut inner = self.inner();
    inner.slots.clear();
    inner.lines.clear();
    let header = inner.header.clone();
    inner.lines.push(header.clone());
    inner.surface.clear();
    inner.surface.append(&header);
  }

  /// Snapshot of the displayed lines, header included.
  pub fn lines(&self) -> Vec<String> {
    self.inner().lines.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use tempfile::TempDir;

  /// Surface double that records the call sequence.
  #[derive(Default)]
  struct RecordingSurface {
    calls: Arc<Mutex<Vec<String>>>,
  }

  impl RecordingSurface {
    fn handle(&self) -> Arc<Mutex<Vec<String>>> {
      Arc::clone(&self.calls)
    }
  }

  impl Surface for RecordingSurface {
    fn append(&self, text: &str) {
      self.calls.lock().unwrap().push(format!("append {text}"));
    }
    fn set_line(&self, slot: usize, text: &str) {
      self.calls.lock().unwrap().push(format!("set {slot} {text}"));
    }
    fn clear(&self) {
      self.calls.lock().unwrap().push("clear".to_string());
    }
  }

  fn recording_sink() -> (LogSink, Arc<Mutex<Vec<String>>>) {
    let surface = RecordingSurface::default();
    let calls = surface.handle();
    (LogSink::new(Box::new(surface), "gpack"), calls)
  }

  #[test]
  fn sink_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<LogSink>();
  }

  #[test]
  fn unkeyed_lines_append() {
    let (sink, _) = recording_sink();
    sink.log("one");
    sink.log("two");

    assert_eq!(sink.lines(), vec!["gpack", "one", "two"]);
  }

  #[test]
  fn second_keyed_write_overwrites_in_place() {
    let (sink, calls) = recording_sink();
    sink.log_to("ui:z", "one");
    sink.log_to("ui:z", "two");

    // One line for the key, holding the latest text.
    assert_eq!(sink.lines(), vec!["gpack", "ui:z two"]);
    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec!["append gpack", "append ui:z one", "set 1 ui:z two"]);
  }

  #[test]
  fn distinct_keys_get_distinct_slots() {
    let (sink, _) = recording_sink();
    sink.log_to("ui:a", "cloning");
    sink.log_to("ui:b", "cloning");
    sink.log_to("ui:a", "done");

    assert_eq!(sink.lines(), vec!["gpack", "ui:a done", "ui:b cloning"]);
  }

  #[test]
  fn clear_resets_to_header_and_forgets_slots() {
    let (sink, _) = recording_sink();
    sink.log_to("ui:a", "cloning");
    sink.clear();

    assert_eq!(sink.lines(), vec!["gpack"]);

    // The old slot is gone; the key starts a fresh line.
    sink.log_to("ui:a", "pulling");
    assert_eq!(sink.lines(), vec!["gpack", "ui:a pulling"]);
  }

  #[test]
  fn transcript_keeps_overwritten_lines() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("transcript.log");
    let sink = LogSink::with_transcript(Box::new(RecordingSurface::default()), "gpack", &path).unwrap();

    sink.log_to("ui:z", "one");
    sink.log_to("ui:z", "two");
    sink.log("unkeyed lines stay out of the transcript");

    let transcript = fs::read_to_string(&path).unwrap();
    assert_eq!(transcript, "ui:z one\nui:z two\n");
  }

  #[test]
  fn transcript_survives_clear() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("transcript.log");
    let sink = LogSink::with_transcript(Box::new(RecordingSurface::default()), "gpack", &path).unwrap();

    sink.log_to("ui:z", "one");
    sink.clear();
    sink.log_to("ui:z", "two");

    let transcript = fs::read_to_string(&path).unwrap();
    assert_eq!(transcript, "ui:z one\nui:z two\n");
  }

  #[test]
  fn transcript_parent_directories_are_created() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("deep").join("transcript.log");
    let sink = LogSink::with_transcript(Box::new(RecordingSurface::default()), "gpack", &path).unwrap();

    sink.log_to("ui:z", "one");
    assert!(path.is_file());
  }

  #[test]
  fn unopenable_transcript_is_an_error() {
    let tmp = TempDir::new().unwrap();
    // A file where the parent directory belongs.
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let path = blocker.join("transcript.log");

    let result = LogSink::with_transcript(Box::new(RecordingSurface::default()), "gpack", &path);
    assert!(matches!(result, Err(SinkError::Transcript { .. })));
  }
}
