//! Implementation of the `gpack log` command: show the fetch transcript.

use anyhow::{Context, Result};

use gpack_lib::paths;

use crate::output::{print_info, symbols};

/// Execute the log command.
///
/// Prints the transcript path and its contents. The transcript only holds
/// keyed fetch lines, appended in real time across runs.
pub fn cmd_log() -> Result<()> {
  let path = paths::transcript_file().context("Failed to resolve the transcript path")?;
  if !path.exists() {
    print_info("No transcript yet. Run an install or update first.");
    return Ok(());
  }

  let contents =
    std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
  println!("{} {}", symbols::ARROW, path.display());
  print!("{contents}");
  Ok(())
}
