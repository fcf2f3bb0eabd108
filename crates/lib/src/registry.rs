//! In-memory registry of declared packages.
//!
//! The registry is rebuilt from the declaration file on every run; nothing
//! here persists. Records are shared as [`Rc`] so trigger callbacks can hold
//! a package without borrowing the registry.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::package::Package;

/// Ordered collection of declared packages.
///
/// Insertion order is preserved for listings; lookups resolve duplicate
/// names to the most recent declaration.
#[derive(Debug, Default)]
pub struct Registry {
  packages: Vec<Rc<Package>>,
}

impl Registry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a record. Redeclaring a name is allowed; `find` resolves to
  /// the later record.
  pub fn add(&mut self, pkg: Rc<Package>) {
    self.packages.push(pkg);
  }

  /// Look up a package by name. The last declaration wins.
  pub fn find(&self, name: &str) -> Option<&Rc<Package>> {
    self.packages.iter().rev().find(|pkg| pkg.name == name)
  }

  /// All records in declaration order.
  pub fn all(&self) -> &[Rc<Package>] {
    &self.packages
  }

  /// Records in declaration order, optionally restricted to one collection.
  pub fn filtered<'a>(&'a self, collection: Option<&'a str>) -> impl Iterator<Item = &'a Rc<Package>> {
    self
      .packages
      .iter()
      .filter(move |pkg| collection.map_or(true, |c| pkg.collection == c))
  }

  /// Names of every declared collection, sorted.
  pub fn collections(&self) -> BTreeSet<&str> {
    self.packages.iter().map(|pkg| pkg.collection.as_str()).collect()
  }

  /// Number of declared packages.
  pub fn len(&self) -> usize {
    self.packages.len()
  }

  /// Check whether nothing has been declared.
  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }
}
