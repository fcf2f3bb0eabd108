//! CLI smoke tests for gpack.
//!
//! Every test injects its own GPACK_* environment through the child
//! process, so tests are hermetic and parallel-safe. Tests that execute a
//! fetch use a unix shell stub in place of git.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the gpack binary.
fn gpack_cmd() -> Command {
  cargo_bin_cmd!("gpack")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  gpack_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  gpack_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("gpack"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["install", "update", "clean", "status", "add", "log"] {
    gpack_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn unknown_subcommand_fails() {
  gpack_cmd().arg("bogus").assert().failure();
}

#[test]
fn unreadable_declarations_are_fatal() {
  let temp = TempDir::new().unwrap();

  gpack_cmd()
    .arg("status")
    .env("GPACK_DIR", temp.path().join("pack"))
    .env("GPACK_CONFIG", temp.path().join("missing.lua"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load declarations"));
}

// =============================================================================
// Commands against a hermetic environment
// =============================================================================

#[cfg(unix)]
mod commands {
  use super::*;
  use std::fs;
  use std::os::unix::fs::PermissionsExt;
  use std::path::PathBuf;

  const ONE_PACKAGE: &str = r#"return { ui = { "https://x/y/z" } }"#;

  struct Env {
    root: TempDir,
  }

  fn setup(config: &str) -> Env {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("pack")).unwrap();
    fs::write(root.path().join("packs.lua"), config).unwrap();
    Env { root }
  }

  impl Env {
    fn pack(&self) -> PathBuf {
      self.root.path().join("pack")
    }

    fn cmd(&self) -> Command {
      let mut cmd = gpack_cmd();
      cmd
        .env("GPACK_DIR", self.pack())
        .env("GPACK_CONFIG", self.root.path().join("packs.lua"))
        .env("XDG_DATA_HOME", self.root.path().join("data"));
      cmd
    }

    /// Writes an executable shell script that stands in for git.
    fn stub_git(&self, body: &str) -> PathBuf {
      let path = self.root.path().join("stub-git");
      fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
      let mut perms = fs::metadata(&path).unwrap().permissions();
      perms.set_mode(0o755);
      fs::set_permissions(&path, perms).unwrap();
      path
    }
  }

  #[test]
  fn status_reports_a_missing_package() {
    let env = setup(ONE_PACKAGE);

    env
      .cmd()
      .arg("status")
      .assert()
      .success()
      .stdout(predicate::str::contains("ui/"))
      .stdout(predicate::str::contains("z (missing)"));
  }

  #[test]
  fn status_json_emits_rows() {
    let env = setup(ONE_PACKAGE);

    env
      .cmd()
      .args(["status", "--json"])
      .assert()
      .success()
      .stdout(predicate::str::contains(r#""status": "missing""#));
  }

  #[test]
  fn install_clones_and_the_transcript_remembers() {
    let env = setup(ONE_PACKAGE);
    let stub = env.stub_git(r#"mkdir -p "$3/.git""#);

    env
      .cmd()
      .arg("install")
      .env("GPACK_GIT", &stub)
      .assert()
      .success()
      .stdout(predicate::str::contains("ui:z Finished."))
      .stdout(predicate::str::contains("Installed 1 package(s)"));
    assert!(env.pack().join("ui/start/z/.git").exists());

    env
      .cmd()
      .arg("log")
      .assert()
      .success()
      .stdout(predicate::str::contains("ui:z Finished."));
  }

  #[test]
  fn install_with_everything_present_reports_nothing_to_do() {
    let env = setup(ONE_PACKAGE);
    fs::create_dir_all(env.pack().join("ui/start/z/.git")).unwrap();
    let stub = env.stub_git("exit 1");

    env
      .cmd()
      .arg("install")
      .env("GPACK_GIT", &stub)
      .assert()
      .success()
      .stdout(predicate::str::contains("Nothing to install!"));
  }

  #[test]
  fn failed_fetch_keeps_the_exit_code_at_zero() {
    let env = setup(ONE_PACKAGE);
    let stub = env.stub_git("echo 'fatal: repository not found' >&2; exit 128");

    env
      .cmd()
      .arg("update")
      .env("GPACK_GIT", &stub)
      .assert()
      .success()
      .stdout(predicate::str::contains("Failed. See 'gpack log' for details."))
      .stderr(predicate::str::contains("1 of 1 package(s) failed"));
  }

  #[test]
  fn clean_removes_undeclared_directories() {
    let env = setup(ONE_PACKAGE);
    fs::create_dir_all(env.pack().join("ui/start/stray/.git")).unwrap();
    fs::create_dir_all(env.pack().join("forgotten/opt/old/.git")).unwrap();

    env
      .cmd()
      .arg("clean")
      .assert()
      .success()
      .stdout(predicate::str::contains("Clean complete!"));
    assert!(!env.pack().join("ui/start/stray").exists());
    assert!(!env.pack().join("forgotten").exists());
  }

  #[test]
  fn add_reports_unknown_packages_without_failing() {
    let env = setup(ONE_PACKAGE);

    env
      .cmd()
      .args(["add", "ghost"])
      .assert()
      .success()
      .stderr(predicate::str::contains("no package named 'ghost'"));
  }

  #[test]
  fn add_activates_a_declared_package() {
    let env = setup(ONE_PACKAGE);

    env
      .cmd()
      .args(["add", "z"])
      .assert()
      .success()
      .stdout(predicate::str::contains("Activated 'z'."));
  }

  #[test]
  fn log_without_a_transcript_points_at_install() {
    let env = setup(ONE_PACKAGE);

    env
      .cmd()
      .arg("log")
      .assert()
      .success()
      .stdout(predicate::str::contains("No transcript yet"));
  }
}
