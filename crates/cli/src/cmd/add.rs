//! Implementation of the `gpack add` command: activate one package now.

use anyhow::Result;

use crate::cmd::bootstrap;
use crate::output::{OutputFormat, print_error, print_success};

/// Execute the add command.
///
/// Activation problems are reported, not raised: a missing name or a
/// rejected activation leaves the exit code at zero.
pub fn cmd_add(name: &str) -> Result<()> {
  let app = bootstrap(OutputFormat::Text)?;
  match app.manager.activate(name) {
    Ok(()) => {
      print_success(&format!("Activated '{name}'."));
      Ok(())
    }
    Err(err) => {
      print_error(&err.to_string());
      Ok(())
    }
  }
}
