//! gpack-lib: Core types and logic for gpack
//!
//! This crate holds everything behind the `gpack` commands:
//! - `package` / `registry`: declared package records and their lookup
//! - `state`: probe and reconcile on-disk checkouts against declarations
//! - `fetch`: concurrent git subprocess orchestration
//! - `sink`: keyed progress lines over a display surface, plus transcript
//! - `manager`: the command layer composing all of the above

pub mod clean;
pub mod config;
pub mod consts;
pub mod fetch;
pub mod host;
pub mod manager;
pub mod package;
pub mod paths;
pub mod registry;
pub mod sink;
pub mod state;
