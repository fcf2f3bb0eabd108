//! Data model for declared packages.
//!
//! This module defines the types that flow from the declaration file into the
//! registry:
//! - [`Entry`] - a parsed declaration (before a record is built)
//! - [`Package`] - the immutable record the registry holds
//! - [`ActivationMode`] - eager (`start/`) versus lazy (`opt/`) placement

use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::consts::DEFAULT_FETCH_FLAGS;
use crate::paths;

/// Callback run once after a package is activated.
pub type SetupFn = Rc<dyn Fn()>;

/// Where a package's directory lives, which decides when it loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
  /// Loaded at startup; lives under `start/`.
  Eager,
  /// Loaded on demand; lives under `opt/`.
  Lazy,
}

impl ActivationMode {
  /// Get the directory literal for this mode.
  pub fn dir_name(self) -> &'static str {
    match self {
      ActivationMode::Eager => crate::consts::EAGER_DIR,
      ActivationMode::Lazy => crate::consts::LAZY_DIR,
    }
  }

  /// Get the opposite mode.
  pub fn other(self) -> Self {
    match self {
      ActivationMode::Eager => ActivationMode::Lazy,
      ActivationMode::Lazy => ActivationMode::Eager,
    }
  }
}

/// Events and patterns that fire a lazy package's activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSpec {
  /// Event names the host listens for.
  pub events: Vec<String>,
  /// Patterns the event argument must match.
  pub patterns: Vec<String>,
}

/// A package declaration, as written in the configuration file.
///
/// Declarations come in two forms:
/// 1. Bare URI string: everything else takes defaults.
/// 2. Table with per-package overrides.
#[derive(Clone)]
pub enum Entry {
  /// Bare source URI.
  ///
  /// ```lua
  /// ui = {
  ///   "https://github.com/folke/tokyonight.nvim",
  /// }
  /// ```
  Uri(String),

  /// Structured declaration with overrides.
  ///
  /// ```lua
  /// tools = {
  ///   { uri = "https://x/y/z.git", opt = true, on = { "CmdRun" }, pat = { "z *" } },
  /// }
  /// ```
  Full {
    /// Fetch source. Must be non-empty; validated when declared.
    uri: String,
    /// Registry name; derived from the URI when `None`.
    name: Option<String>,
    /// Extra arguments for git; `None` keeps the default flags.
    flags: Option<Vec<String>>,
    /// Lazy activation (`opt/` placement) when true.
    opt: bool,
    /// Event names that trigger activation of a lazy package.
    on: Option<Vec<String>>,
    /// Patterns paired with `on`.
    pat: Option<Vec<String>>,
    /// Callback run once after activation. Host-side only; the
    /// configuration file reserves the field but the CLI ignores it.
    setup: Option<SetupFn>,
  },
}

impl Entry {
  /// Get the source URI of this entry.
  pub fn uri(&self) -> &str {
    match self {
      Entry::Uri(uri) => uri,
      Entry::Full { uri, .. } => uri,
    }
  }

  /// Check whether this entry declares lazy activation.
  pub fn is_lazy(&self) -> bool {
    matches!(self, Entry::Full { opt: true, .. })
  }
}

impl fmt::Debug for Entry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Entry::Uri(uri) => f.debug_tuple("Uri").field(uri).finish(),
      Entry::Full { uri, name, flags, opt, on, pat, setup } => f
        .debug_struct("Full")
        .field("uri", uri)
        .field("name", name)
        .field("flags", flags)
        .field("opt", opt)
        .field("on", on)
        .field("pat", pat)
        .field("setup", &setup.as_ref().map(|_| "<fn>"))
        .finish(),
    }
  }
}

/// A declared package, as the registry holds it.
///
/// Records are immutable once built; only the activation flag flips, and it
/// flips at most once.
pub struct Package {
  /// Registry key. Derived from the URI when the declaration names none.
  pub name: String,
  /// The named group this package belongs to.
  pub collection: String,
  /// Fetch source passed to git.
  pub uri: String,
  /// Extra arguments for git fetch operations.
  pub flags: Vec<String>,
  /// Eager or lazy placement.
  pub activation_mode: ActivationMode,
  /// On-disk directory. Computed once at declaration, never recomputed.
  pub target_dir: PathBuf,
  /// Activation triggers; meaningful for lazy packages only.
  pub triggers: Option<TriggerSpec>,
  /// Callback run once after activation.
  pub setup: Option<SetupFn>,
  activated: Cell<bool>,
}

impl Package {
  /// Build a record from a declaration entry.
  ///
  /// The registry name, activation mode, fetch flags, and target directory
  /// are all fixed here. Callers validate the URI first; an empty one is a
  /// configuration error, not a record.
  pub fn from_entry(root: &Path, collection: &str, entry: Entry) -> Self {
    match entry {
      Entry::Uri(uri) => {
        let name = derive_name(&uri);
        let target_dir = paths::package_dir(root, collection, ActivationMode::Eager, &name);
        Package {
          name,
          collection: collection.to_string(),
          uri,
          flags: default_flags(),
          activation_mode: ActivationMode::Eager,
          target_dir,
          triggers: None,
          setup: None,
          activated: Cell::new(false),
        }
      }
      Entry::Full { uri, name, flags, opt, on, pat, setup } => {
        let name = name.unwrap_or_else(|| derive_name(&uri));
        let mode = if opt { ActivationMode::Lazy } else { ActivationMode::Eager };
        let triggers = match (on, pat) {
          (None, None) => None,
          (on, pat) => Some(TriggerSpec {
            events: on.unwrap_or_default(),
            patterns: pat.unwrap_or_default(),
          }),
        };
        let target_dir = paths::package_dir(root, collection, mode, &name);
        Package {
          name,
          collection: collection.to_string(),
          uri,
          flags: flags.unwrap_or_else(default_flags),
          activation_mode: mode,
          target_dir,
          triggers,
          setup,
          activated: Cell::new(false),
        }
      }
    }
  }

  /// Get the log key for this package: `<collection>:<name>`.
  pub fn key(&self) -> String {
    format!("{}:{}", self.collection, self.name)
  }

  /// Check whether the package has been activated this run.
  pub fn is_activated(&self) -> bool {
    self.activated.get()
  }

  /// Record that the package was activated.
  pub fn mark_activated(&self) {
    self.activated.set(true);
  }
}

impl fmt::Debug for Package {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Package")
      .field("name", &self.name)
      .field("collection", &self.collection)
      .field("uri", &self.uri)
      .field("flags", &self.flags)
      .field("activation_mode", &self.activation_mode)
      .field("target_dir", &self.target_dir)
      .field("triggers", &self.triggers)
      .field("setup", &self.setup.as_ref().map(|_| "<fn>"))
      .field("activated", &self.activated.get())
      .finish()
  }
}

/// Derive a registry name from a source URI.
///
/// Takes the last path segment, tolerating a trailing slash, and strips a
/// trailing `.git` suffix.
pub fn derive_name(uri: &str) -> String {
  let trimmed = uri.trim_end_matches('/');
  let segment = match trimmed.rsplit_once('/') {
    Some((_, segment)) => segment,
    None => trimmed,
  };
  segment.strip_suffix(".git").unwrap_or(segment).to_string()
}

fn default_flags() -> Vec<String> {
  DEFAULT_FETCH_FLAGS.iter().map(|flag| flag.to_string()).collect()
}
