//! Removal of on-disk directories no declaration accounts for.
//!
//! The sweep walks the pack root twice over: collection directories absent
//! from the registry go entirely; inside known collections, package
//! directories under `start/` or `opt/` that no record claims go too.
//! Deletion failures are logged and skipped, never fatal.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::consts::{EAGER_DIR, LAZY_DIR};

/// Errors raised while scanning the pack root.
#[derive(Debug, Error)]
pub enum CleanError {
  /// A directory listing failed outright.
  #[error("failed to scan {}: {source}", path.display())]
  Scan { path: PathBuf, source: io::Error },
}

/// Tally of one clean sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
  /// Whole collection directories removed.
  pub collections_removed: usize,
  /// Package directories removed from inside known collections.
  pub packages_removed: usize,
  /// Bytes the removed directories held.
  pub bytes_freed: u64,
  /// True when nothing was actually deleted.
  pub dry_run: bool,
}

impl CleanStats {
  /// Total directories removed.
  pub fn total_removed(&self) -> usize {
    self.collections_removed + self.packages_removed
  }
}

/// Delete every directory under `root` that the registry does not claim.
///
/// # Arguments
///
/// * `collections` - names of declared collections
/// * `keep` - package directories that must survive (targets and their
///   alternate-mode locations)
/// * `dry_run` - report sizes and counts without deleting
pub fn sweep(
  root: &Path,
  collections: &BTreeSet<&str>,
  keep: &HashSet<PathBuf>,
  dry_run: bool,
) -> Result<CleanStats, CleanError> {
  let mut stats = CleanStats { dry_run, ..CleanStats::default() };
  if !root.exists() {
    return Ok(stats);
  }

  let entries = fs::read_dir(root).map_err(|source| CleanError::Scan { path: root.to_path_buf(), source })?;
  for entry in entries {
    let entry = entry.map_err(|source| CleanError::Scan { path: root.to_path_buf(), source })?;
    let path = entry.path();
    if !path.is_dir() {
      continue;
    }
    let known = entry
      .file_name()
      .to_str()
      .is_some_and(|name| collections.contains(name));
    if known {
      sweep_collection(&path, keep, &mut stats);
    } else if let Some(bytes) = remove_dir(&path, dry_run) {
      stats.collections_removed += 1;
      stats.bytes_freed += bytes;
    }
  }

  info!(
    collections = stats.collections_removed,
    packages = stats.packages_removed,
    bytes = stats.bytes_freed,
    dry_run,
    "clean sweep complete"
  );
  Ok(stats)
}

/// Sweep the `start/` and `opt/` subdirectories of one known collection.
fn sweep_collection(collection_dir: &Path, keep: &HashSet<PathBuf>, stats: &mut CleanStats) {
  for mode_dir in [EAGER_DIR, LAZY_DIR] {
    let dir = collection_dir.join(mode_dir);
    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
      Err(err) => {
        warn!(path = %dir.display(), error = %err, "cannot inspect, skipping");
        continue;
      }
    };
    for entry in entries.flatten() {
      let path = entry.path();
      if !path.is_dir() || keep.contains(&path) {
        continue;
      }
      if let Some(bytes) = remove_dir(&path, stats.dry_run) {
        stats.packages_removed += 1;
        stats.bytes_freed += bytes;
      }
    }
  }
}

/// Measure and delete one directory tree. Returns the bytes it held, or
/// `None` when deletion failed and nothing should be counted.
fn remove_dir(path: &Path, dry_run: bool) -> Option<u64> {
  let bytes = dir_size(path);
  if dry_run {
    info!(path = %path.display(), bytes, "would remove");
    return Some(bytes);
  }
  match fs::remove_dir_all(path) {
    Ok(()) => {
      debug!(path = %path.display(), bytes, "removed");
      Some(bytes)
    }
    Err(err) => {
      warn!(path = %path.display(), error = %err, "failed to remove, skipping");
      None
    }
  }
}

/// Total size in bytes of all files under `path`.
fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|entry| entry.ok())
    .filter_map(|entry| entry.metadata().ok())
    .filter(|metadata| metadata.is_file())
    .map(|metadata| metadata.len())
    .sum()
}
