//! Implementation of the `gpack status` command.

use anyhow::Result;

use crate::cmd::bootstrap;
use crate::output::{OutputFormat, print_info, print_json};

/// Execute the status command.
///
/// The grouped per-package lines go through the sink as the manager walks
/// the registry; this wrapper only covers the empty case and `--json`.
pub fn cmd_status(collection: Option<&str>, output: OutputFormat) -> Result<()> {
  let app = bootstrap(output)?;
  let rows = app.manager.status(collection);

  if output.is_json() {
    return print_json(&rows);
  }
  if rows.is_empty() {
    print_info("No packages declared.");
  }
  Ok(())
}
