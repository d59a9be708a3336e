//! Exit status and output behavior of the `repacker` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_repacker(dir: &Path, args: &[&str]) -> Output {
  Command::new(env!("CARGO_BIN_EXE_repacker"))
    .current_dir(dir)
    .args(args)
    .output()
    .expect("Failed to run repacker")
}

/// A crate with a `model` package (source) and a `view` package (destination).
fn workspace() -> TempDir {
  let dir = TempDir::new().expect("Failed to create temp dir");
  let files = [
    ("Cargo.toml", "[package]\nname = \"shop\"\nversion = \"0.1.0\"\n"),
    (
      "src/model/mod.rs",
      "pub struct User {\n  #[tag = \"repack:\\\"id\\\"\"]\n  pub user_id: u64,\n  pub name: String,\n  pub age: i32,\n}\n",
    ),
    (
      "src/view/mod.rs",
      "#[derive(Default)]\npub struct UserView {\n  #[tag = \"repack:\\\"id\\\"\"]\n  pub id: u64,\n  pub name: String,\n  pub age: String,\n  pub nickname: String,\n}\n",
    ),
  ];
  for (name, text) in files.iter() {
    let path = dir.path().join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
  }
  dir
}

#[test]
fn test_missing_flags_is_usage_error() {
  let dir = workspace();
  let output = run_repacker(dir.path(), &["--srcdir", "src/model", "--srctype", "User"]);
  assert_eq!(output.status.code(), Some(2));
  assert!(String::from_utf8_lossy(&output.stderr).contains("--dsttype"));
}

#[test]
fn test_empty_flag_is_usage_error() {
  let dir = workspace();
  let output = run_repacker(
    dir.path(),
    &["--srcdir", "src/model", "--srctype", "", "--dsttype", "UserView"],
  );
  assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_empty_srcdir_is_usage_error() {
  let dir = workspace();
  let output = run_repacker(
    dir.path(),
    &["--srcdir", "", "--srctype", "User", "--dsttype", "UserView", "src/view"],
  );
  assert_eq!(output.status.code(), Some(2));
  assert!(!dir.path().join("src/view/userview_repack.rs").exists());
}

#[test]
fn test_two_directories_is_usage_error() {
  let dir = workspace();
  let output = run_repacker(
    dir.path(),
    &[
      "--srcdir", "src/model", "--srctype", "User", "--dsttype", "UserView", "src/view", "src/model",
    ],
  );
  assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_directory_is_fatal() {
  let dir = workspace();
  let output = run_repacker(
    dir.path(),
    &["--srcdir", "src/nope", "--srctype", "User", "--dsttype", "UserView", "src/view"],
  );
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("not a directory"));
  assert!(!dir.path().join("src/view/userview_repack.rs").exists());
}

#[test]
fn test_unknown_type_is_fatal() {
  let dir = workspace();
  let output = run_repacker(
    dir.path(),
    &["--srcdir", "src/model", "--srctype", "Account", "--dsttype", "UserView", "src/view"],
  );
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("`Account` not found"));
}

#[test]
fn test_writes_constructor() {
  let dir = workspace();
  let output = run_repacker(
    dir.path(),
    &["--srcdir", "src/model", "--srctype", "User", "--dsttype", "UserView", "src/view"],
  );
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let generated = fs::read_to_string(dir.path().join("src/view/userview_repack.rs")).unwrap();
  assert!(generated.starts_with(
    "// Code generated by \"repacker --srcdir src/model --srctype User --dsttype UserView src/view\"; DO NOT EDIT.\n"
  ));
  assert!(generated.contains("id: s.user_id.clone(),"));
  assert!(generated.contains("name: s.name.clone(),"));
  assert!(!generated.contains("nickname:"));
}

#[test]
fn test_default_directory_and_stdout() {
  let dir = workspace();
  let view = dir.path().join("src/view");
  let output = run_repacker(
    &view,
    &["--srcdir", "../model", "--srctype", "User", "--dsttype", "UserView", "--stdout"],
  );
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  assert!(String::from_utf8_lossy(&output.stdout).contains("pub fn new_user_view(s: &model::User)"));
  assert!(!view.join("userview_repack.rs").exists());
}
