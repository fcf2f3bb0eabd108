//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored
//! status messages, human-readable byte/duration formatting, and the
//! terminal-backed display surface the log sink writes through.

use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use gpack_lib::sink::Surface;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Display surface writing to stdout.
///
/// On a terminal, keyed updates rewrite their line in place with cursor
/// movement, so each package keeps a single progress line. Without a
/// terminal the updates degrade to plain appended lines.
pub struct TermSurface {
  printed: Mutex<usize>,
}

impl TermSurface {
  pub fn new() -> Self {
    TermSurface { printed: Mutex::new(0) }
  }
}

impl Surface for TermSurface {
  fn append(&self, text: &str) {
    let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
    println!("{text}");
    *printed += 1;
  }

  fn set_line(&self, slot: usize, text: &str) {
    let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
    let mut stdout = io::stdout().lock();
    if !stdout.is_terminal() || slot >= *printed {
      *printed += 1;
      let _ = writeln!(stdout, "{text}");
      return;
    }
    // Jump up to the slot's line, rewrite it, come back down.
    let up = *printed - slot;
    let _ = write!(stdout, "\x1b[{up}A\r\x1b[2K{text}\x1b[{up}B\r");
    let _ = stdout.flush();
  }

  fn clear(&self) {
    let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
    *printed = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bytes_scale_through_the_units() {
    assert_eq!(format_bytes(512), "512 B");
    assert_eq!(format_bytes(2048), "2.0 KB");
    assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
  }

  #[test]
  fn durations_pick_a_readable_form() {
    assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
    assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
    assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
  }

  #[test]
  fn surface_counts_appended_lines() {
    let surface = TermSurface::new();
    surface.append("one");
    surface.append("two");
    assert_eq!(*surface.printed.lock().unwrap(), 2);
    surface.clear();
    assert_eq!(*surface.printed.lock().unwrap(), 0);
  }
}
