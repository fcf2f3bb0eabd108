//! Implementation of the `gpack update` command.
//!
//! Pulls every declared package unconditionally; a package that was never
//! cloned simply fails its pull and is tallied.

use std::time::Instant;

use anyhow::Result;
use tracing::warn;

use gpack_lib::fetch;

use crate::cmd::{bootstrap, report_summary, runtime};
use crate::output::{OutputFormat, print_warning};

/// Execute the update command.
pub fn cmd_update(collection: Option<&str>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let app = bootstrap(output)?;
  let rt = runtime()?;

  if !rt.block_on(fetch::git_available()) {
    print_warning("git was not found; every fetch will fail until it is installed.");
    warn!("git binary unavailable");
  }

  let summary = rt.block_on(app.manager.update(collection));
  report_summary("Updated", summary, start.elapsed(), output)
}
