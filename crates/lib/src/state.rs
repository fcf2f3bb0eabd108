//! On-disk state probing and reconciliation.
//!
//! A package is "synced" when a git checkout sits at its target directory.
//! When the checkout sits under the other activation mode's directory
//! (a declaration flipped between eager and lazy since the last run), the
//! reconciler moves it with a single rename instead of re-fetching.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::GIT_DIR;
use crate::package::Package;
use crate::paths;

/// Errors raised while relocating a checkout between activation directories.
#[derive(Debug, Error)]
pub enum StateError {
  /// A misplaced checkout could not be moved to its target directory.
  #[error("failed to relocate '{name}' from {} to {}: {source}", from.display(), to.display())]
  Relocate {
    name: String,
    from: PathBuf,
    to: PathBuf,
    source: io::Error,
  },
}

/// What the prober found on disk for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
  /// Checkout present at the package's target directory.
  Synced,
  /// Checkout present under the other activation mode's directory.
  Misplaced,
  /// No checkout in either directory.
  Absent,
}

/// Check what exists on disk for `pkg`.
///
/// The `.git` marker may be a directory or a plain file; submodules and
/// worktrees write a gitfile instead of a directory.
pub fn probe(root: &Path, pkg: &Package) -> SyncState {
  if has_checkout(&pkg.target_dir) {
    return SyncState::Synced;
  }
  let alternate = paths::alternate_dir(root, &pkg.collection, pkg.activation_mode, &pkg.name);
  if has_checkout(&alternate) {
    return SyncState::Misplaced;
  }
  SyncState::Absent
}

/// Bring the on-disk location in line with the declaration.
///
/// # Returns
///
/// `Ok(true)` when a checkout sits at the target directory afterwards
/// (already there, or moved there now); `Ok(false)` when nothing exists on
/// disk and a fetch is needed. A failed move is returned as
/// [`StateError::Relocate`]; callers report it and treat the package as
/// absent for the rest of the run.
pub fn reconcile(root: &Path, pkg: &Package) -> Result<bool, StateError> {
  match probe(root, pkg) {
    SyncState::Synced => Ok(true),
    SyncState::Absent => Ok(false),
    SyncState::Misplaced => {
      let from = paths::alternate_dir(root, &pkg.collection, pkg.activation_mode, &pkg.name);
      relocate(pkg, &from)?;
      debug!(
        name = %pkg.name,
        from = %from.display(),
        to = %pkg.target_dir.display(),
        "relocated checkout"
      );
      Ok(true)
    }
  }
}

fn has_checkout(dir: &Path) -> bool {
  dir.join(GIT_DIR).exists()
}

fn relocate(pkg: &Package, from: &Path) -> Result<(), StateError> {
  let as_relocate = |source: io::Error| StateError::Relocate {
    name: pkg.name.clone(),
    from: from.to_path_buf(),
    to: pkg.target_dir.clone(),
    source,
  };
  if let Some(parent) = pkg.target_dir.parent() {
    fs::create_dir_all(parent).map_err(as_relocate)?;
  }
  fs::rename(from, &pkg.target_dir).map_err(as_relocate)
}
