//! Field resolution and code generation behind the `repacker` tool.
//!
//! The pipeline is linear: load the destination and source packages, look up
//! the two record types, resolve every destination field, emit the
//! constructor and format it. Nothing touches the disk until
//! [`Generated::write`].

mod catalog;
mod emit;
mod error;
mod format;
mod manifest;
mod resolve;
mod tag;
mod types;

pub use catalog::{output_file_name, Package, GENERATED_SUFFIX};
pub use emit::{emit, ConstructorSpec};
pub use error::{Error, Result};
pub use format::format_source;
pub use manifest::ModuleLocation;
pub use resolve::{resolve, Coercion, MappingDecision, Outcome, SkipReason};
pub use tag::{NormalizedTag, Tag, TagEntry, REPACK_KEY};
pub use types::{FieldDescriptor, RecordType, TypeRef};

use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Invocation parameters, threaded explicitly through the pipeline.
#[derive(Debug, Clone)]
pub struct Config {
  /// Destination package directory; the output file is written here.
  pub dir: PathBuf,
  pub src_dir: PathBuf,
  pub src_type: String,
  pub dst_type: String,
  /// Arguments echoed in the generated banner.
  pub invocation: Vec<String>,
}

#[derive(Debug)]
pub struct Generated {
  pub path: PathBuf,
  pub contents: String,
  pub spec: ConstructorSpec,
}

impl Generated {
  pub fn write(&self) -> Result<()> {
    fs::write(&self.path, &self.contents).map_err(|source| Error::Write {
      path: self.path.clone(),
      source,
    })
  }
}

pub fn generate(config: &Config) -> Result<Generated> {
  let dst_pkg = Package::load(&config.dir)?;
  let src_pkg = Package::load(&config.src_dir)?;

  let src = src_pkg.record(&config.src_type)?;
  let dst = dst_pkg.record(&config.dst_type)?;

  let decisions = resolve(src, dst);
  let spec = ConstructorSpec::new(&src_pkg, src, &dst_pkg, dst, decisions);
  let contents = format_source(&emit(&spec, &config.invocation))?;
  let path = config.dir.join(output_file_name(&dst.name));

  info!(
    source = %src.qualified_name(),
    destination = %dst.qualified_name(),
    mapped = spec.mapped_count(),
    skipped = spec.decisions.len() - spec.mapped_count(),
    output = %path.display(),
    "resolved fields"
  );

  Ok(Generated {
    path,
    contents,
    spec,
  })
}

#[cfg(test)]
fn fixture(files: &[(&str, &str)]) -> tempfile::TempDir {
  let dir = tempfile::tempdir().unwrap();
  for (name, text) in files {
    let path = dir.path().join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
  }
  dir
}

#[test]
fn test_generate_same_crate() {
  let root = fixture(&[
    ("Cargo.toml", "[package]\nname = \"shop\"\nversion = \"0.1.0\"\n"),
    ("src/model/mod.rs", "pub struct User { pub name: String, pub age: i32 }"),
    ("src/view/mod.rs", "#[derive(Default)]\npub struct UserView { pub name: String, pub age: String, pub nickname: String }"),
  ]);
  let config = Config {
    dir: root.path().join("src/view"),
    src_dir: root.path().join("src/model"),
    src_type: "User".to_string(),
    dst_type: "UserView".to_string(),
    invocation: vec![],
  };

  let generated = generate(&config).unwrap();
  assert_eq!(generated.path, config.dir.join("userview_repack.rs"));
  assert!(generated.contents.contains("use crate::model;"));
  assert!(generated.contents.contains("pub fn new_user_view(s: &model::User) -> Box<UserView> {"));
  assert!(generated.contents.contains("name: s.name.clone(),"));
  let compact: String = generated.contents.split_whitespace().collect();
  assert!(compact.contains("age:format!(\"{}\",s.age),"));
  assert!(!generated.contents.contains("nickname:"));
  assert!(generated.contents.contains("..Default::default()"));
  assert!(!generated.contents.contains("serde_json"));
  assert_eq!(generated.spec.mapped_count(), 2);
}

#[test]
fn test_generate_is_idempotent() {
  let root = fixture(&[
    ("src/mod.rs", "pub struct A { #[tag = \"repack:\\\"k\\\"\"] pub x: u8 }"),
    ("dst/mod.rs", "pub struct B { #[tag = \"repack:\\\"k\\\"\"] pub y: u8 }"),
  ]);
  let config = Config {
    dir: root.path().join("dst"),
    src_dir: root.path().join("src"),
    src_type: "A".to_string(),
    dst_type: "B".to_string(),
    invocation: vec!["--srctype".to_string(), "A".to_string()],
  };

  let first = generate(&config).unwrap();
  first.write().unwrap();
  let second = generate(&config).unwrap();
  assert_eq!(first.contents, second.contents);
  assert!(second.contents.contains("y: s.x.clone()"));
  assert_eq!(fs::read_to_string(&first.path).unwrap(), first.contents);
}

#[test]
fn test_generate_lookup_failure() {
  let root = fixture(&[
    ("src/mod.rs", "pub struct A { pub x: u8 }"),
    ("dst/mod.rs", "pub struct B { pub x: u8 }"),
  ]);
  let config = Config {
    dir: root.path().join("dst"),
    src_dir: root.path().join("src"),
    src_type: "Missing".to_string(),
    dst_type: "B".to_string(),
    invocation: vec![],
  };

  assert!(matches!(generate(&config), Err(Error::TypeNotFound { .. })));
  assert!(!root.path().join("dst").join("b_repack.rs").exists());
}
