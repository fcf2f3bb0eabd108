//! Implementation of the `gpack clean` command.

use std::time::Instant;

use anyhow::Result;

use crate::cmd::bootstrap;
use crate::output::{
  OutputFormat, format_bytes, format_duration, print_error, print_info, print_json, print_stat,
  print_success,
};

/// Execute the clean command.
///
/// Reconciles every declared package, then deletes collections and package
/// directories that no declaration covers.
pub fn cmd_clean(dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let app = bootstrap(output)?;

  let stats = match app.manager.clean(dry_run) {
    Ok(stats) => stats,
    Err(err) => {
      print_error(&format!("Clean failed: {err}"));
      return Ok(());
    }
  };

  if output.is_json() {
    return print_json(&stats);
  }

  println!();
  if stats.dry_run {
    print_info("Dry run - no changes made");
  } else {
    print_success("Clean complete!");
  }
  print_stat("Collections removed", &stats.collections_removed.to_string());
  print_stat("Packages removed", &stats.packages_removed.to_string());
  print_stat("Space freed", &format_bytes(stats.bytes_freed));
  print_stat("Duration", &format_duration(start.elapsed()));
  Ok(())
}
