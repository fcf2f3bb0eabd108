//! Traits for the environment hosting the manager.
//!
//! A real host (an editor, a shell integration) supplies implementations of
//! these; the CLI binds minimal ones and tests use the recording doubles
//! defined here.

use std::cell::{Cell, RefCell};
use std::error::Error;

use crate::sink::Surface;

/// Outcome of a host call that can plausibly fail.
pub type HostResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Brings an activated package's files onto the load path.
pub trait Loader {
  fn activate(&self, name: &str) -> HostResult;
}

/// Registers one-shot triggers for lazy packages.
pub trait TriggerHost {
  /// Register `callback` to run at most once, when any of `events` fires
  /// with an argument matching any of `patterns`.
  fn register(&self, events: &[String], patterns: &[String], callback: Box<dyn FnOnce()>) -> HostResult;
}

/// No-op implementation of every collaborator trait.
///
/// Doubles as the quiet display surface when output should go nowhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Loader for NullHost {
  fn activate(&self, _name: &str) -> HostResult {
    Ok(())
  }
}

impl TriggerHost for NullHost {
  fn register(&self, _events: &[String], _patterns: &[String], _callback: Box<dyn FnOnce()>) -> HostResult {
    Ok(())
  }
}

impl Surface for NullHost {
  fn append(&self, _text: &str) {}
  fn set_line(&self, _slot: usize, _text: &str) {}
  fn clear(&self) {}
}

/// Test double that records every activation request.
#[derive(Default)]
pub struct RecordingLoader {
  activated: RefCell<Vec<String>>,
}

impl RecordingLoader {
  /// Names passed to [`Loader::activate`], in call order.
  pub fn names(&self) -> Vec<String> {
    self.activated.borrow().clone()
  }
}

impl Loader for RecordingLoader {
  fn activate(&self, name: &str) -> HostResult {
    self.activated.borrow_mut().push(name.to_string());
    Ok(())
  }
}

struct RegisteredTrigger {
  events: Vec<String>,
  patterns: Vec<String>,
  callback: Cell<Option<Box<dyn FnOnce()>>>,
}

/// Test double that stores registered triggers for on-demand firing.
#[derive(Default)]
pub struct RecordingTriggers {
  triggers: RefCell<Vec<RegisteredTrigger>>,
}

impl RecordingTriggers {
  /// Number of registrations so far.
  pub fn len(&self) -> usize {
    self.triggers.borrow().len()
  }

  /// Check whether nothing was registered.
  pub fn is_empty(&self) -> bool {
    self.triggers.borrow().is_empty()
  }

  /// The `(events, patterns)` pairs registered, in call order.
  pub fn registrations(&self) -> Vec<(Vec<String>, Vec<String>)> {
    self
      .triggers
      .borrow()
      .iter()
      .map(|t| (t.events.clone(), t.patterns.clone()))
      .collect()
  }

  /// Fire `event`: runs every matching callback that has not run yet.
  /// Each callback is consumed on first fire.
  pub fn fire(&self, event: &str) {
    let callbacks: Vec<Box<dyn FnOnce()>> = self
      .triggers
      .borrow()
      .iter()
      .filter(|t| t.events.iter().any(|e| e == event))
      .filter_map(|t| t.callback.take())
      .collect();
    for callback in callbacks {
      callback();
    }
  }
}

impl TriggerHost for RecordingTriggers {
  fn register(&self, events: &[String], patterns: &[String], callback: Box<dyn FnOnce()>) -> HostResult {
    self.triggers.borrow_mut().push(RegisteredTrigger {
      events: events.to_vec(),
      patterns: patterns.to_vec(),
      callback: Cell::new(Some(callback)),
    });
    Ok(())
  }
}
