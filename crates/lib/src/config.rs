//! Evaluation of the Lua declaration file.
//!
//! The file returns one table keyed by collection name, each value an array
//! of entries:
//!
//! ```lua
//! return {
//!   ui = {
//!     "https://github.com/folke/tokyonight.nvim",
//!     { uri = "https://github.com/nvim-lualine/lualine.nvim", flags = {} },
//!   },
//!   tools = {
//!     { uri = "https://x/y/z.git", opt = true, on = { "CmdRun" }, pat = { "z *" } },
//!   },
//! }
//! ```
//!
//! A bad entry cuts its collection short at that position: earlier entries
//! of the collection stand, the error is recorded, and other collections
//! are unaffected. Only an unusable file (unreadable, not valid Lua, not
//! returning a table) fails the load outright.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use mlua::prelude::*;
use thiserror::Error;

use crate::package::Entry;

/// Constraint text for the one rule every entry must satisfy.
pub(crate) const URI_CONSTRAINT: &str = "a package entry requires a non-empty 'uri'";

/// Errors raised while evaluating the declaration file.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The file could not be read.
  #[error("failed to read declarations from {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  /// The file is not valid Lua.
  #[error("failed to evaluate declarations in {}: {source}", path.display())]
  Eval { path: PathBuf, source: mlua::Error },

  /// The file evaluated, but not to the expected shape.
  #[error("unexpected declaration shape: {message}")]
  Shape { message: String },

  /// A collection's value was not an array of entries.
  #[error("collection '{collection}' must be an array of entries, found {found}")]
  Collection { collection: String, found: String },

  /// One entry of a collection violated a constraint. `index` is the
  /// 1-based position within the collection.
  #[error("invalid entry {index} in collection '{collection}': {constraint}")]
  Entry {
    collection: String,
    index: usize,
    constraint: String,
  },
}

/// What a declaration file evaluates to: every entry that parsed, plus the
/// errors that cut collections short.
#[derive(Debug, Default)]
pub struct LoadedConfig {
  /// Entries per collection, in file array order. The map iterates in
  /// sorted collection order for deterministic processing.
  pub collections: BTreeMap<String, Vec<Entry>>,
  /// One error per collection that was cut short.
  pub errors: Vec<ConfigError>,
}

/// Evaluate the declaration file at `path`.
pub fn load(path: &Path) -> Result<LoadedConfig, ConfigError> {
  let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
  let source =
    std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path: path.clone(), source })?;

  let lua = Lua::new();
  let value = lua
    .load(&source)
    .set_name(format!("@{}", path.display()))
    .eval::<LuaValue>()
    .map_err(|source| ConfigError::Eval { path: path.clone(), source })?;

  let table = match value {
    LuaValue::Table(table) => table,
    other => {
      return Err(ConfigError::Shape {
        message: format!("declarations must return a table, found {}", other.type_name()),
      });
    }
  };
  parse_collections(table)
}

fn parse_collections(table: LuaTable) -> Result<LoadedConfig, ConfigError> {
  let mut loaded = LoadedConfig::default();
  for pair in table.pairs::<String, LuaValue>() {
    let (name, value) = pair.map_err(|source| ConfigError::Shape {
      message: format!("collections must be keyed by name: {source}"),
    })?;
    match value {
      LuaValue::Table(entries) => {
        let (parsed, error) = parse_entries(&name, &entries);
        loaded.collections.insert(name, parsed);
        if let Some(error) = error {
          loaded.errors.push(error);
        }
      }
      other => loaded.errors.push(ConfigError::Collection {
        collection: name,
        found: other.type_name().to_string(),
      }),
    }
  }
  Ok(loaded)
}

/// Parse one collection's array. Stops at the first bad entry, returning
/// everything parsed before it alongside the error.
fn parse_entries(collection: &str, table: &LuaTable) -> (Vec<Entry>, Option<ConfigError>) {
  let mut entries = Vec::new();
  for index in 1..=table.raw_len() {
    let value: LuaValue = match table.get(index) {
      Ok(value) => value,
      Err(source) => {
        return (entries, Some(entry_error(collection, index, source.to_string())));
      }
    };
    match parse_entry(collection, index, value) {
      Ok(entry) => entries.push(entry),
      Err(error) => return (entries, Some(error)),
    }
  }
  (entries, None)
}

fn parse_entry(collection: &str, index: usize, value: LuaValue) -> Result<Entry, ConfigError> {
  match value {
    LuaValue::String(uri) => {
      let uri = lua_string(collection, index, "uri", uri)?;
      if uri.trim().is_empty() {
        return Err(entry_error(collection, index, URI_CONSTRAINT.to_string()));
      }
      Ok(Entry::Uri(uri))
    }
    LuaValue::Table(table) => parse_full_entry(collection, index, &table),
    other => Err(entry_error(
      collection,
      index,
      format!("a package entry must be a string or a table, found {}", other.type_name()),
    )),
  }
}

fn parse_full_entry(collection: &str, index: usize, table: &LuaTable) -> Result<Entry, ConfigError> {
  let uri: Option<String> = table
    .get("uri")
    .map_err(|_| entry_error(collection, index, "'uri' must be a string".to_string()))?;
  let uri = uri.unwrap_or_default();
  if uri.trim().is_empty() {
    return Err(entry_error(collection, index, URI_CONSTRAINT.to_string()));
  }

  let name: Option<String> = table
    .get("name")
    .map_err(|_| entry_error(collection, index, "'name' must be a string".to_string()))?;
  let flags: Option<Vec<String>> = table
    .get("flags")
    .map_err(|_| entry_error(collection, index, "'flags' must be an array of strings".to_string()))?;
  let opt: Option<bool> = table
    .get("opt")
    .map_err(|_| entry_error(collection, index, "'opt' must be a boolean".to_string()))?;
  let on = string_or_array(collection, index, table, "on")?;
  let pat = string_or_array(collection, index, table, "pat")?;

  // The file format reserves `setup` for hosts that can hold a callback;
  // standalone evaluation accepts a function there and drops it.
  let setup: LuaValue = table
    .get("setup")
    .map_err(|_| entry_error(collection, index, "'setup' must be a function".to_string()))?;
  match setup {
    LuaValue::Nil | LuaValue::Function(_) => {}
    other => {
      return Err(entry_error(
        collection,
        index,
        format!("'setup' must be a function, found {}", other.type_name()),
      ));
    }
  }

  Ok(Entry::Full {
    uri,
    name,
    flags,
    opt: opt.unwrap_or(false),
    on,
    pat,
    setup: None,
  })
}

/// Accept `field = "one"` as shorthand for `field = { "one" }`.
fn string_or_array(
  collection: &str,
  index: usize,
  table: &LuaTable,
  field: &'static str,
) -> Result<Option<Vec<String>>, ConfigError> {
  let value: LuaValue = table
    .get(field)
    .map_err(|source| entry_error(collection, index, source.to_string()))?;
  match value {
    LuaValue::Nil => Ok(None),
    LuaValue::String(item) => Ok(Some(vec![lua_string(collection, index, field, item)?])),
    LuaValue::Table(items) => {
      let mut parsed = Vec::with_capacity(items.raw_len());
      for i in 1..=items.raw_len() {
        let item: String = items.get(i).map_err(|_| {
          entry_error(collection, index, format!("'{field}' must contain only strings"))
        })?;
        parsed.push(item);
      }
      Ok(Some(parsed))
    }
    other => Err(entry_error(
      collection,
      index,
      format!("'{field}' must be a string or an array of strings, found {}", other.type_name()),
    )),
  }
}

fn lua_string(collection: &str, index: usize, field: &str, value: LuaString) -> Result<String, ConfigError> {
  value
    .to_str()
    .map(|s| s.to_string())
    .map_err(|_| entry_error(collection, index, format!("'{field}' must be valid UTF-8")))
}

fn entry_error(collection: &str, index: usize, constraint: String) -> ConfigError {
  ConfigError::Entry { collection: collection.to_string(), index, constraint }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::package::ActivationMode;
  use crate::package::Package;
  use std::fs;
  use tempfile::TempDir;

  fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("packs.lua");
    fs::write(&path, content).unwrap();
    path
  }

  #[test]
  fn bare_strings_become_uri_entries() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"
      return {
        ui = {
          "https://github.com/folke/tokyonight.nvim",
          "https://x/y/z.git",
        },
      }
      "#,
    );

    let loaded = load(&path).unwrap();
    assert!(loaded.errors.is_empty());
    let ui = &loaded.collections["ui"];
    assert_eq!(ui.len(), 2);
    assert_eq!(ui[0].uri(), "https://github.com/folke/tokyonight.nvim");
    assert_eq!(ui[1].uri(), "https://x/y/z.git");
  }

  #[test]
  fn collections_iterate_in_sorted_order() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"return { zz = { "https://x/y/a" }, aa = { "https://x/y/b" } }"#,
    );

    let loaded = load(&path).unwrap();
    let order: Vec<&str> = loaded.collections.keys().map(String::as_str).collect();
    assert_eq!(order, vec!["aa", "zz"]);
  }

  #[test]
  fn full_tables_carry_overrides() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"
      return {
        tools = {
          { uri = "https://x/y/z.git", opt = true, on = { "CmdRun" }, pat = { "z *" } },
        },
      }
      "#,
    );

    let loaded = load(&path).unwrap();
    assert!(loaded.errors.is_empty());
    let entry = loaded.collections["tools"][0].clone();
    assert!(entry.is_lazy());

    let pkg = Package::from_entry(Path::new("/pack"), "tools", entry);
    assert_eq!(pkg.name, "z");
    assert_eq!(pkg.activation_mode, ActivationMode::Lazy);
    assert!(pkg.target_dir.ends_with("tools/opt/z"));
    let triggers = pkg.triggers.unwrap();
    assert_eq!(triggers.events, vec!["CmdRun".to_string()]);
    assert_eq!(triggers.patterns, vec!["z *".to_string()]);
  }

  #[test]
  fn on_and_pat_accept_bare_strings() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"return { tools = { { uri = "https://x/y/z", opt = true, on = "CmdRun", pat = "z *" } } }"#,
    );

    let loaded = load(&path).unwrap();
    match &loaded.collections["tools"][0] {
      Entry::Full { on, pat, .. } => {
        assert_eq!(on.as_deref(), Some(&["CmdRun".to_string()] as &[_]));
        assert_eq!(pat.as_deref(), Some(&["z *".to_string()] as &[_]));
      }
      other => panic!("expected a full entry, got {other:?}"),
    }
  }

  #[test]
  fn empty_flags_array_parses_as_empty() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"return { ui = { { uri = "https://x/y/z", flags = {} } } }"#,
    );

    let loaded = load(&path).unwrap();
    match &loaded.collections["ui"][0] {
      Entry::Full { flags, .. } => assert_eq!(flags.as_deref(), Some(&[] as &[String])),
      other => panic!("expected a full entry, got {other:?}"),
    }
  }

  #[test]
  fn missing_uri_cuts_the_collection_but_keeps_prior_entries() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"
      return {
        tools = {
          "https://x/y/first",
          { opt = true },
          "https://x/y/never-reached",
        },
        ui = { "https://x/y/fine" },
      }
      "#,
    );

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.collections["tools"].len(), 1);
    assert_eq!(loaded.collections["tools"][0].uri(), "https://x/y/first");
    assert_eq!(loaded.collections["ui"].len(), 1);

    assert_eq!(loaded.errors.len(), 1);
    match &loaded.errors[0] {
      ConfigError::Entry { collection, index, constraint } => {
        assert_eq!(collection, "tools");
        assert_eq!(*index, 2);
        assert!(constraint.contains("non-empty 'uri'"));
      }
      other => panic!("expected an entry error, got {other}"),
    }
  }

  #[test]
  fn blank_uri_is_rejected_like_a_missing_one() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), r#"return { ui = { { uri = "  " } } }"#);

    let loaded = load(&path).unwrap();
    assert!(loaded.collections["ui"].is_empty());
    assert!(matches!(loaded.errors[0], ConfigError::Entry { index: 1, .. }));
  }

  #[test]
  fn non_table_collection_is_recorded_and_skipped() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"return { broken = "not an array", ui = { "https://x/y/z" } }"#,
    );

    let loaded = load(&path).unwrap();
    assert!(!loaded.collections.contains_key("broken"));
    assert_eq!(loaded.collections["ui"].len(), 1);
    assert!(matches!(&loaded.errors[0], ConfigError::Collection { collection, .. } if collection == "broken"));
  }

  #[test]
  fn setup_function_is_accepted_and_dropped() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
      tmp.path(),
      r#"return { ui = { { uri = "https://x/y/z", setup = function() end } } }"#,
    );

    let loaded = load(&path).unwrap();
    assert!(loaded.errors.is_empty());
    match &loaded.collections["ui"][0] {
      Entry::Full { setup, .. } => assert!(setup.is_none()),
      other => panic!("expected a full entry, got {other:?}"),
    }
  }

  #[test]
  fn non_function_setup_is_an_entry_error() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), r#"return { ui = { { uri = "https://x/y/z", setup = 5 } } }"#);

    let loaded = load(&path).unwrap();
    assert!(matches!(&loaded.errors[0], ConfigError::Entry { constraint, .. } if constraint.contains("'setup'")));
  }

  #[test]
  fn non_table_return_fails_the_load() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), "return 42");

    assert!(matches!(load(&path), Err(ConfigError::Shape { .. })));
  }

  #[test]
  fn invalid_lua_fails_the_load() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), "return {");

    assert!(matches!(load(&path), Err(ConfigError::Eval { .. })));
  }

  #[test]
  fn missing_file_fails_the_load() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("never-written.lua");

    assert!(matches!(load(&path), Err(ConfigError::Read { .. })));
  }
}
