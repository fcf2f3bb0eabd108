mod add;
mod clean;
mod install;
mod log;
mod status;
mod update;

pub use add::cmd_add;
pub use clean::cmd_clean;
pub use install::cmd_install;
pub use log::cmd_log;
pub use status::cmd_status;
pub use update::cmd_update;

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use gpack_lib::config;
use gpack_lib::consts::APP_NAME;
use gpack_lib::fetch::FetchSummary;
use gpack_lib::host::{HostResult, Loader, NullHost, TriggerHost};
use gpack_lib::manager::Manager;
use gpack_lib::paths;
use gpack_lib::sink::{LogSink, Surface};

use crate::output::{
  OutputFormat, TermSurface, format_duration, print_json, print_stat, print_success, print_warning,
};

/// Host bindings for a standalone CLI run.
///
/// There is no in-process load path and no event stream, so activation and
/// trigger registration are recorded at debug level and succeed.
struct CliHost;

impl Loader for CliHost {
  fn activate(&self, name: &str) -> HostResult {
    debug!(name, "activated (no in-process load path)");
    Ok(())
  }
}

impl TriggerHost for CliHost {
  fn register(&self, events: &[String], patterns: &[String], _callback: Box<dyn FnOnce()>) -> HostResult {
    debug!(?events, ?patterns, "trigger noted; a CLI run never fires events");
    Ok(())
  }
}

/// Everything a command needs after startup.
pub(crate) struct App {
  pub manager: Manager,
  pub sink: Arc<LogSink>,
}

/// Resolves paths, builds the sink, loads declarations and registers them.
///
/// Fails only when the environment is unusable: paths cannot be resolved or
/// the declaration file cannot be evaluated at all. Per-collection problems
/// are reported through the sink and the run continues with what parsed.
pub(crate) fn bootstrap(output: OutputFormat) -> Result<App> {
  let pack_root = paths::pack_root().context("Failed to resolve the pack directory")?;
  let config_path = paths::config_file().context("Failed to resolve the declaration file path")?;

  let loaded = config::load(&config_path)
    .with_context(|| format!("Failed to load declarations from {}", config_path.display()))?;

  let sink = Arc::new(build_sink(output));
  for err in &loaded.errors {
    sink.log(&err.to_string());
    warn!(error = %err, "declaration problem");
  }

  let host = Rc::new(CliHost);
  let mut manager = Manager::new(
    pack_root,
    Arc::clone(&sink),
    Rc::clone(&host) as Rc<dyn Loader>,
    host as Rc<dyn TriggerHost>,
  );
  for (collection, entries) in loaded.collections {
    if let Err(err) = manager.declare(&collection, entries) {
      // Already reported through the sink; the other collections proceed.
      debug!(error = %err, collection, "collection abandoned");
    }
  }

  Ok(App { manager, sink })
}

fn build_sink(output: OutputFormat) -> LogSink {
  match paths::transcript_file() {
    Ok(path) => match LogSink::with_transcript(make_surface(output), APP_NAME, &path) {
      Ok(sink) => return sink,
      Err(err) => warn!(error = %err, "transcript disabled"),
    },
    Err(err) => warn!(error = %err, "transcript disabled"),
  }
  LogSink::new(make_surface(output), APP_NAME)
}

fn make_surface(output: OutputFormat) -> Box<dyn Surface> {
  if output.is_json() {
    Box::new(NullHost)
  } else {
    Box::new(TermSurface::new())
  }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to start the async runtime")
}

/// Prints the install/update tail: counts, duration, failure pointer.
pub(crate) fn report_summary(
  done: &str,
  summary: FetchSummary,
  elapsed: Duration,
  output: OutputFormat,
) -> Result<()> {
  if output.is_json() {
    return print_json(&summary);
  }
  if summary.total() == 0 {
    // The sink already said there was nothing to do.
    return Ok(());
  }

  println!();
  if summary.is_success() {
    print_success(&format!("{done} {} package(s)", summary.succeeded));
  } else {
    print_warning(&format!(
      "{} of {} package(s) failed. See 'gpack log' for details.",
      summary.failed,
      summary.total()
    ));
  }
  print_stat("Succeeded", &summary.succeeded.to_string());
  print_stat("Failed", &summary.failed.to_string());
  print_stat("Duration", &format_duration(elapsed));
  Ok(())
}
