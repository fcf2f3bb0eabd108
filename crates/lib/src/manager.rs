//! Command layer tying the registry, prober, orchestrator and sink together.
//!
//! `Manager` is an injectable service object: every command takes the
//! registry state it owns plus the collaborators it was constructed with,
//! so tests run against fresh managers with recording doubles. Commands
//! never abort the process; per-package failures are reported through the
//! sink and tracing, and only unusable input surfaces as an `Err`.
//!
//! Mutation discipline: the registry, the in-flight handle table and the
//! activation flags are only touched from the owner task, as
//! `JoinSet::join_next` yields fetch completions. Worker tasks receive
//! owned job data and the shared sink, nothing else.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::clean::{self, CleanError, CleanStats};
use crate::config::{ConfigError, URI_CONSTRAINT};
use crate::fetch::{self, FetchJob, FetchOp, FetchSummary};
use crate::host::{Loader, TriggerHost};
use crate::package::{ActivationMode, Entry, Package};
use crate::paths;
use crate::registry::Registry;
use crate::sink::LogSink;
use crate::state::{self, SyncState};

/// Errors surfaced by manager commands.
#[derive(Debug, Error)]
pub enum ManagerError {
  /// A declaration entry violated a constraint.
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),

  /// The clean sweep could not scan the pack root.
  #[error("clean failed: {0}")]
  Clean(#[from] CleanError),

  /// `activate` was asked for a name the registry does not hold.
  #[error("no package named '{0}' is declared")]
  UnknownPackage(String),

  /// The host loader rejected an activation.
  #[error("failed to activate '{name}': {source}")]
  Loader {
    name: String,
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

/// Condition of one declared package, for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
  /// No checkout on disk in either mode directory.
  Missing,
  /// Checkout present at the declared location, not yet activated.
  Installed,
  /// Activation has run this session.
  Activated,
}

impl PackageStatus {
  pub fn label(self) -> &'static str {
    match self {
      PackageStatus::Missing => "missing",
      PackageStatus::Installed => "installed",
      PackageStatus::Activated => "activated",
    }
  }
}

/// One row of `status` output, also serialized for `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRow {
  pub collection: String,
  pub name: String,
  pub uri: String,
  pub status: PackageStatus,
}

/// The service object behind every gpack command.
pub struct Manager {
  registry: Registry,
  sink: Arc<LogSink>,
  loader: Rc<dyn Loader>,
  triggers: Rc<dyn TriggerHost>,
  pack_root: PathBuf,
}

impl Manager {
  /// Creates a manager over `pack_root` with the host's collaborators.
  pub fn new(
    pack_root: PathBuf,
    sink: Arc<LogSink>,
    loader: Rc<dyn Loader>,
    triggers: Rc<dyn TriggerHost>,
  ) -> Self {
    Manager { registry: Registry::new(), sink, loader, triggers, pack_root }
  }

  /// Registers a collection's entries and settles each one on disk.
  ///
  /// Every entry is validated, turned into a package record, appended to
  /// the registry and reconciled. Lazy packages with triggers get their
  /// one-shot activation registered; eager packages already on disk are
  /// activated on the spot.
  ///
  /// The first invalid entry abandons the remainder of the collection:
  /// prior entries stay registered, the error is reported through the sink
  /// and returned. Other collections are unaffected because each gets its
  /// own `declare` call.
  pub fn declare(&mut self, collection: &str, entries: Vec<Entry>) -> Result<(), ManagerError> {
    for (position, entry) in entries.into_iter().enumerate() {
      if entry.uri().trim().is_empty() {
        let err = ConfigError::Entry {
          collection: collection.to_string(),
          index: position + 1,
          constraint: URI_CONSTRAINT.to_string(),
        };
        self.sink.log(&err.to_string());
        warn!(error = %err, "collection abandoned at first invalid entry");
        return Err(err.into());
      }

      let pkg = Rc::new(Package::from_entry(&self.pack_root, collection, entry));
      self.registry.add(Rc::clone(&pkg));

      let synced = match state::reconcile(&self.pack_root, &pkg) {
        Ok(synced) => synced,
        Err(err) => {
          self.sink.log(&err.to_string());
          warn!(error = %err, "reconcile failed during declaration");
          false
        }
      };

      match pkg.activation_mode {
        ActivationMode::Lazy => self.register_trigger(&pkg),
        ActivationMode::Eager if synced => {
          if let Err(err) = run_activation(&pkg, self.loader.as_ref()) {
            self.sink.log(&err.to_string());
            warn!(error = %err, "activation failed during declaration");
          }
        }
        ActivationMode::Eager => {}
      }
    }
    Ok(())
  }

  /// Wires a lazy package's one-shot trigger to its activation.
  fn register_trigger(&self, pkg: &Rc<Package>) {
    let Some(spec) = &pkg.triggers else { return };
    let loader = Rc::clone(&self.loader);
    let target = Rc::clone(pkg);
    let callback = Box::new(move || {
      if let Err(err) = run_activation(&target, loader.as_ref()) {
        warn!(name = %target.name, error = %err, "deferred activation failed");
      }
    });
    if let Err(err) = self.triggers.register(&spec.events, &spec.patterns, callback) {
      self.sink.log(&format!("failed to register trigger for '{}': {err}", pkg.name));
      warn!(name = %pkg.name, error = %err, "trigger registration failed");
    }
  }

  /// Clones every filtered package that is absent on disk.
  ///
  /// Eager packages are activated as their clones finish; lazy ones are
  /// left for the trigger registered at declaration.
  pub async fn install(&self, filter: Option<&str>) -> FetchSummary {
    self.sink.clear();
    let pending: Vec<Rc<Package>> = self
      .registry
      .filtered(filter)
      .filter(|pkg| state::probe(&self.pack_root, pkg) == SyncState::Absent)
      .cloned()
      .collect();
    if pending.is_empty() {
      self.sink.log("Nothing to install!");
      return FetchSummary::default();
    }
    self.run_fetches(FetchOp::Clone, pending).await
  }

  /// Pulls every filtered package, regardless of its sync state.
  pub async fn update(&self, filter: Option<&str>) -> FetchSummary {
    self.sink.clear();
    let targets: Vec<Rc<Package>> = self.registry.filtered(filter).cloned().collect();
    if targets.is_empty() {
      self.sink.log("Nothing to update!");
      return FetchSummary::default();
    }
    self.run_fetches(FetchOp::Pull, targets).await
  }

  /// Spawns one fetch task per package and drains completions.
  async fn run_fetches(&self, op: FetchOp, packages: Vec<Rc<Package>>) -> FetchSummary {
    let mut set = JoinSet::new();
    let mut handles = HashMap::new();
    for pkg in &packages {
      fetch::spawn(&mut set, &mut handles, op, FetchJob::for_package(pkg), Arc::clone(&self.sink));
    }

    let mut summary = FetchSummary::default();
    while let Some(joined) = set.join_next().await {
      match joined {
        Ok(outcome) => {
          handles.remove(&outcome.uri);
          summary.record(outcome.success);
          if outcome.success && outcome.op == FetchOp::Clone {
            self.finish_clone(&outcome.key);
          }
        }
        Err(err) => {
          error!(error = %err, "fetch task aborted");
          summary.record(false);
        }
      }
    }
    summary
  }

  /// Post-clone follow-up: eager packages come onto the load path now.
  fn finish_clone(&self, key: &str) {
    let Some(pkg) = self.find_by_key(key) else {
      debug!(key, "completion for a package no longer registered");
      return;
    };
    if pkg.activation_mode != ActivationMode::Eager {
      return;
    }
    if let Err(err) = run_activation(pkg, self.loader.as_ref()) {
      warn!(name = %pkg.name, error = %err, "activation after clone failed");
    }
  }

  /// Reports each filtered package as missing, installed or activated.
  ///
  /// Sink output keeps declaration order grouped by collection; the
  /// returned rows back the machine-readable form.
  pub fn status(&self, filter: Option<&str>) -> Vec<StatusRow> {
    self.sink.clear();
    let mut rows = Vec::new();
    let mut current: Option<&str> = None;
    for pkg in self.registry.filtered(filter) {
      if current != Some(pkg.collection.as_str()) {
        if current.is_some() {
          self.sink.log("");
        }
        self.sink.log(&format!("{}/", pkg.collection));
        current = Some(pkg.collection.as_str());
      }

      let status = if pkg.is_activated() {
        PackageStatus::Activated
      } else if state::probe(&self.pack_root, pkg) == SyncState::Synced {
        PackageStatus::Installed
      } else {
        PackageStatus::Missing
      };
      self.sink.log(&format!("  {} ({})", pkg.name, status.label()));
      rows.push(StatusRow {
        collection: pkg.collection.clone(),
        name: pkg.name.clone(),
        uri: pkg.uri.clone(),
        status,
      });
    }
    rows
  }

  /// Deletes everything under the pack root that no declaration covers.
  ///
  /// Every registered package is reconciled first so a checkout drifting
  /// in the wrong mode directory is moved home rather than swept. A
  /// package's directories in both modes survive by name.
  pub fn clean(&self, dry_run: bool) -> Result<CleanStats, ManagerError> {
    self.sink.clear();
    for pkg in self.registry.all() {
      if let Err(err) = state::reconcile(&self.pack_root, pkg) {
        warn!(error = %err, "pre-clean reconcile failed");
      }
    }

    let mut keep = HashSet::new();
    for pkg in self.registry.all() {
      keep.insert(pkg.target_dir.clone());
      keep.insert(paths::alternate_dir(&self.pack_root, &pkg.collection, pkg.activation_mode, &pkg.name));
    }

    let stats = clean::sweep(&self.pack_root, &self.registry.collections(), &keep, dry_run)?;
    let verb = if stats.dry_run { "Would remove" } else { "Removed" };
    self.sink.log(&format!(
      "{verb} {} collections and {} packages.",
      stats.collections_removed, stats.packages_removed
    ));
    Ok(stats)
  }

  /// Explicit on-demand activation by package name (last declaration wins).
  pub fn activate(&self, name: &str) -> Result<(), ManagerError> {
    let Some(pkg) = self.registry.find(name) else {
      let err = ManagerError::UnknownPackage(name.to_string());
      self.sink.log(&err.to_string());
      return Err(err);
    };
    run_activation(pkg, self.loader.as_ref())
  }

  fn find_by_key(&self, key: &str) -> Option<&Rc<Package>> {
    self.registry.all().iter().rev().find(|pkg| pkg.key() == key)
  }
}

/// Brings one package onto the load path and runs its setup callback.
///
/// Idempotent at the activation flag: a package that already activated is
/// left alone. The flag is only set after the loader accepted the package,
/// so a failed attempt can be retried.
fn run_activation(pkg: &Package, loader: &dyn Loader) -> Result<(), ManagerError> {
  if pkg.is_activated() {
    return Ok(());
  }
  loader
    .activate(&pkg.name)
    .map_err(|source| ManagerError::Loader { name: pkg.name.clone(), source })?;
  pkg.mark_activated();
  if let Some(setup) = &pkg.setup {
    setup();
  }
  debug!(name = %pkg.name, "package activated");
  Ok(())
}
