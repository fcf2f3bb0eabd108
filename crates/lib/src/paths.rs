//! Resolution of platform directories and package locations.
//!
//! Every environment lookup returns a [`PathsError`] instead of panicking so
//! callers can surface a warning and keep going.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{APP_NAME, CONFIG_FILE, ENV_CONFIG, ENV_PACK_DIR, TRANSCRIPT_FILE};
use crate::package::ActivationMode;

/// Errors that can occur while resolving platform directories.
#[derive(Debug, Error)]
pub enum PathsError {
  /// A required environment variable was unset.
  #[error("environment variable '{0}' is not set")]
  MissingEnv(&'static str),
}

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Result<PathBuf, PathsError> {
  let userprofile = std::env::var("USERPROFILE").map_err(|_| PathsError::MissingEnv("USERPROFILE"))?;
  Ok(PathBuf::from(userprofile))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Result<PathBuf, PathsError> {
  let home = std::env::var("HOME").map_err(|_| PathsError::MissingEnv("HOME"))?;
  Ok(PathBuf::from(home))
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> Result<PathBuf, PathsError> {
  let appdata = std::env::var("APPDATA").map_err(|_| PathsError::MissingEnv("APPDATA"))?;
  Ok(PathBuf::from(appdata).join(APP_NAME))
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> Result<PathBuf, PathsError> {
  let config_home = match std::env::var("XDG_CONFIG_HOME") {
    Ok(dir) => PathBuf::from(dir),
    Err(_) => home_dir()?.join(".config"),
  };
  Ok(config_home.join(APP_NAME))
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> Result<PathBuf, PathsError> {
  let appdata = std::env::var("APPDATA").map_err(|_| PathsError::MissingEnv("APPDATA"))?;
  Ok(PathBuf::from(appdata).join(APP_NAME))
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> Result<PathBuf, PathsError> {
  let data_home = match std::env::var("XDG_DATA_HOME") {
    Ok(dir) => PathBuf::from(dir),
    Err(_) => home_dir()?.join(".local").join("share"),
  };
  Ok(data_home.join(APP_NAME))
}

/// Returns the root directory that holds all managed collections.
///
/// Honors the `GPACK_DIR` override, otherwise defaults to
/// `<data_dir>/pack`.
pub fn pack_root() -> Result<PathBuf, PathsError> {
  if let Ok(dir) = std::env::var(ENV_PACK_DIR) {
    return Ok(PathBuf::from(dir));
  }
  Ok(data_dir()?.join("pack"))
}

/// Returns the path of the Lua declaration file.
///
/// Honors the `GPACK_CONFIG` override, otherwise defaults to
/// `<config_dir>/packs.lua`.
pub fn config_file() -> Result<PathBuf, PathsError> {
  if let Ok(path) = std::env::var(ENV_CONFIG) {
    return Ok(PathBuf::from(path));
  }
  Ok(config_dir()?.join(CONFIG_FILE))
}

/// Returns the path of the append-only fetch transcript.
pub fn transcript_file() -> Result<PathBuf, PathsError> {
  Ok(data_dir()?.join(TRANSCRIPT_FILE))
}

/// Computes the on-disk directory for a package.
///
/// Pure function of its inputs: `<root>/<collection>/<start|opt>/<name>`.
pub fn package_dir(root: &Path, collection: &str, mode: ActivationMode, name: &str) -> PathBuf {
  root.join(collection).join(mode.dir_name()).join(name)
}

/// Computes the directory the package would occupy under the other
/// activation mode. The prober checks here for misplaced checkouts.
pub fn alternate_dir(root: &Path, collection: &str, mode: ActivationMode, name: &str) -> PathBuf {
  package_dir(root, collection, mode.other(), name)
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn xdg_config_home_takes_precedence() {
    temp_env::with_vars(
      [
        ("XDG_CONFIG_HOME", Some("/custom/config")),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(
          config_dir().unwrap(),
          PathBuf::from("/custom/config").join(APP_NAME)
        );
      },
    );
  }

  #[test]
  #[serial]
  fn xdg_fallback_to_home_directories() {
    temp_env::with_vars(
      [
        ("XDG_CONFIG_HOME", None::<&str>),
        ("XDG_DATA_HOME", None::<&str>),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(
          config_dir().unwrap(),
          PathBuf::from("/home/user/.config").join(APP_NAME)
        );
        assert_eq!(
          data_dir().unwrap(),
          PathBuf::from("/home/user/.local/share").join(APP_NAME)
        );
      },
    );
  }

  #[test]
  #[serial]
  fn missing_home_is_an_error_not_a_panic() {
    temp_env::with_vars([("XDG_DATA_HOME", None::<&str>), ("HOME", None::<&str>)], || {
      assert!(data_dir().is_err());
    });
  }

  #[test]
  #[serial]
  fn pack_dir_override_takes_precedence() {
    temp_env::with_vars(
      [(ENV_PACK_DIR, Some("/tmp/mypack")), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(pack_root().unwrap(), PathBuf::from("/tmp/mypack"));
      },
    );
  }

  #[test]
  #[serial]
  fn pack_root_defaults_under_data_dir() {
    temp_env::with_vars(
      [
        (ENV_PACK_DIR, None::<&str>),
        ("XDG_DATA_HOME", Some("/data")),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(pack_root().unwrap(), PathBuf::from("/data").join(APP_NAME).join("pack"));
      },
    );
  }

  #[test]
  #[serial]
  fn config_file_override_takes_precedence() {
    temp_env::with_vars(
      [(ENV_CONFIG, Some("/etc/site-packs.lua")), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(config_file().unwrap(), PathBuf::from("/etc/site-packs.lua"));
      },
    );
  }

  #[test]
  fn package_dir_layout() {
    let root = Path::new("/data/gpack/pack");
    assert_eq!(
      package_dir(root, "plugins", ActivationMode::Eager, "treesitter"),
      PathBuf::from("/data/gpack/pack/plugins/start/treesitter")
    );
    assert_eq!(
      package_dir(root, "plugins", ActivationMode::Lazy, "telescope"),
      PathBuf::from("/data/gpack/pack/plugins/opt/telescope")
    );
  }

  #[test]
  fn alternate_dir_swaps_the_mode_literal() {
    let root = Path::new("/data/gpack/pack");
    assert_eq!(
      alternate_dir(root, "plugins", ActivationMode::Eager, "treesitter"),
      PathBuf::from("/data/gpack/pack/plugins/opt/treesitter")
    );
    assert_eq!(
      alternate_dir(root, "plugins", ActivationMode::Lazy, "telescope"),
      PathBuf::from("/data/gpack/pack/plugins/start/telescope")
    );
  }
}
