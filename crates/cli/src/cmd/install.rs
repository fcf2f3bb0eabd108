//! Implementation of the `gpack install` command.
//!
//! Clones every declared package whose checkout is missing on disk. Eager
//! packages come onto the (recorded) load path as their clones finish.

use std::time::Instant;

use anyhow::Result;
use tracing::warn;

use gpack_lib::fetch;

use crate::cmd::{bootstrap, report_summary, runtime};
use crate::output::{OutputFormat, print_warning};

/// Execute the install command.
///
/// # Arguments
///
/// * `collection` - Restrict the run to one collection.
/// * `output` - Text progress or a JSON summary.
///
/// # Errors
///
/// Returns an error only when the environment is unusable; per-package
/// fetch failures are reported and tallied, not raised.
pub fn cmd_install(collection: Option<&str>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let app = bootstrap(output)?;
  let rt = runtime()?;

  if !rt.block_on(fetch::git_available()) {
    print_warning("git was not found; every fetch will fail until it is installed.");
    warn!("git binary unavailable");
  }

  let summary = rt.block_on(app.manager.install(collection));
  report_summary("Installed", summary, start.elapsed(), output)
}
