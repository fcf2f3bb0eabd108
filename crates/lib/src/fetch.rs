//! Concurrent git subprocess orchestration.
//!
//! One tokio task per package, collected in a [`JoinSet`]; there is no
//! throttling, every operation runs at once. Tasks carry owned job data and
//! an `Arc<LogSink>` only. Completions are consumed on the owner task via
//! `join_next`, which is where registry state gets touched. Both output
//! streams of each subprocess are forwarded line by line to the sink under
//! the package's key.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, warn};

use crate::consts::{ENV_GIT, GIT_BIN};
use crate::package::Package;
use crate::sink::LogSink;

/// Terminal line logged when a subprocess exits nonzero or cannot run.
const FAIL_LINE: &str = "Failed. See 'gpack log' for details.";

/// Errors raised while running a git subprocess.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The subprocess could not be spawned at all.
  #[error("failed to spawn git for '{key}': {source}")]
  Spawn { key: String, source: io::Error },

  /// A piped stdio stream was missing on the spawned child.
  #[error("failed to capture git output for '{key}'")]
  Stream { key: String },

  /// Waiting on the subprocess failed.
  #[error("failed waiting on git for '{key}': {source}")]
  Wait { key: String, source: io::Error },
}

/// Which git operation to run against a package's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOp {
  Clone,
  Pull,
}

impl FetchOp {
  /// Subcommand passed to git.
  pub fn git_verb(self) -> &'static str {
    match self {
      FetchOp::Clone => "clone",
      FetchOp::Pull => "pull",
    }
  }

  fn label(self) -> &'static str {
    match self {
      FetchOp::Clone => "Cloning",
      FetchOp::Pull => "Pulling",
    }
  }
}

/// Owned data one fetch task needs.
///
/// Copied out of the registry before spawning so tasks never borrow shared
/// state.
#[derive(Debug, Clone)]
pub struct FetchJob {
  pub key: String,
  pub uri: String,
  pub target_dir: PathBuf,
  pub flags: Vec<String>,
}

impl FetchJob {
  pub fn for_package(pkg: &Package) -> Self {
    FetchJob {
      key: pkg.key(),
      uri: pkg.uri.clone(),
      target_dir: pkg.target_dir.clone(),
      flags: pkg.flags.clone(),
    }
  }
}

/// What one finished task reports back to the owner.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
  /// Log key, `<collection>:<name>`.
  pub key: String,
  /// Source URI; releases the in-flight handle table entry.
  pub uri: String,
  pub op: FetchOp,
  pub success: bool,
}

/// Tally of finished fetch tasks, accumulated by the owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
  pub succeeded: usize,
  pub failed: usize,
}

impl FetchSummary {
  /// Fold one task outcome into the tally.
  pub fn record(&mut self, success: bool) {
    if success {
      self.succeeded += 1;
    } else {
      self.failed += 1;
    }
  }

  /// Total tasks observed.
  pub fn total(&self) -> usize {
    self.succeeded + self.failed
  }

  /// Check whether nothing failed.
  pub fn is_success(&self) -> bool {
    self.failed == 0
  }
}

/// Launch one fetch operation on its own task.
///
/// The task is added to `set` and its abort handle recorded in `handles`
/// under the job's URI; the owner removes the entry when the completion
/// arrives. A second spawn for a URI already in flight is allowed but races
/// on the target directory, so callers avoid it.
pub fn spawn(
  set: &mut JoinSet<FetchOutcome>,
  handles: &mut HashMap<String, AbortHandle>,
  op: FetchOp,
  job: FetchJob,
  sink: Arc<LogSink>,
) {
  let uri = job.uri.clone();
  let handle = set.spawn(run(op, job, sink));
  handles.insert(uri, handle);
}

async fn run(op: FetchOp, job: FetchJob, sink: Arc<LogSink>) -> FetchOutcome {
  let success = match run_git(op, &job, &sink).await {
    Ok(success) => success,
    Err(err) => {
      warn!(key = %job.key, error = %err, "fetch could not run");
      sink.log_to(&job.key, FAIL_LINE);
      false
    }
  };
  FetchOutcome { key: job.key, uri: job.uri, op, success }
}

async fn run_git(op: FetchOp, job: &FetchJob, sink: &Arc<LogSink>) -> Result<bool, FetchError> {
  sink.log_to(&job.key, &format!("{} {}...", op.label(), job.uri));

  let mut child = Command::new(git_binary())
    .arg(op.git_verb())
    .arg(&job.uri)
    .arg(&job.target_dir)
    .arg("--progress")
    .args(&job.flags)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(|source| FetchError::Spawn { key: job.key.clone(), source })?;

  let stdout = child.stdout.take().ok_or_else(|| FetchError::Stream { key: job.key.clone() })?;
  let stderr = child.stderr.take().ok_or_else(|| FetchError::Stream { key: job.key.clone() })?;

  let out_task = tokio::spawn(stream_lines(stdout, job.key.clone(), Arc::clone(sink)));
  let err_task = tokio::spawn(stream_lines(stderr, job.key.clone(), Arc::clone(sink)));

  let status = child
    .wait()
    .await
    .map_err(|source| FetchError::Wait { key: job.key.clone(), source })?;

  // Drain both readers before the terminal line so it lands last.
  let _ = tokio::join!(out_task, err_task);

  if status.success() {
    sink.log_to(&job.key, "Finished.");
    Ok(true)
  } else {
    debug!(key = %job.key, code = ?status.code(), "git exited with failure");
    sink.log_to(&job.key, FAIL_LINE);
    Ok(false)
  }
}

/// Forward every non-blank line of `stream` to the sink under `key`.
///
/// git rewrites progress with bare carriage returns, so each buffered line
/// is split on `\r` as well; per-stream order is preserved.
async fn stream_lines<R>(stream: R, key: String, sink: Arc<LogSink>)
where
  R: AsyncRead + Unpin,
{
  let mut lines = BufReader::new(stream).lines();
  loop {
    match lines.next_line().await {
      Ok(Some(line)) => {
        for piece in line.split('\r') {
          let piece = piece.trim();
          if piece.is_empty() {
            continue;
          }
          sink.log_to(&key, piece);
        }
      }
      Ok(None) => break,
      Err(err) => {
        debug!(key = %key, error = %err, "git output stream closed abnormally");
        break;
      }
    }
  }
}

/// Resolve the git binary, honoring the `GPACK_GIT` override.
fn git_binary() -> String {
  std::env::var(ENV_GIT).unwrap_or_else(|_| GIT_BIN.to_string())
}

/// Check whether a usable git binary is reachable.
///
/// Runs `git --version` once; callers surface a single warning on failure
/// and let per-package operations report their own errors.
pub async fn git_available() -> bool {
  let status = Command::new(git_binary())
    .arg("--version")
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .await;
  matches!(status, Ok(status) if status.success())
}
