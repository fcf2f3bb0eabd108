//! Shared constants for directory names, environment variables, and git
//! invocation defaults.

/// Application name, used for platform directories and the sink header.
pub const APP_NAME: &str = "gpack";

/// Environment variable overriding the pack root directory.
pub const ENV_PACK_DIR: &str = "GPACK_DIR";

/// Environment variable overriding the declaration file path.
pub const ENV_CONFIG: &str = "GPACK_CONFIG";

/// Environment variable overriding the git executable.
///
/// Mainly a test seam: pointing this at a stub script lets the fetch
/// pipeline run without network access.
pub const ENV_GIT: &str = "GPACK_GIT";

/// Directory under a collection holding eagerly activated packages.
pub const EAGER_DIR: &str = "start";

/// Directory under a collection holding lazily activated packages.
pub const LAZY_DIR: &str = "opt";

/// Marker directory that identifies a fetched package on disk.
pub const GIT_DIR: &str = ".git";

/// Default git executable when [`ENV_GIT`] is unset.
pub const GIT_BIN: &str = "git";

/// Flags appended to every git invocation unless an entry overrides them.
pub const DEFAULT_FETCH_FLAGS: &[&str] = &["--depth=1"];

/// File name of the Lua declaration file.
pub const CONFIG_FILE: &str = "packs.lua";

/// File name of the append-only fetch transcript.
pub const TRANSCRIPT_FILE: &str = "transcript.log";
