use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

const MANIFEST: &str = "Cargo.toml";

#[derive(Debug, Deserialize)]
struct Manifest {
  package: Option<ManifestPackage>,
  lib: Option<ManifestLib>,
}

#[derive(Debug, Deserialize)]
struct ManifestPackage {
  name: String,
}

#[derive(Debug, Deserialize)]
struct ManifestLib {
  name: Option<String>,
}

/// Where a package directory sits in the Rust module tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLocation {
  /// Crate name, or `crate` when the directory is not below a crate's `src/`.
  pub root: String,
  /// Module segments below the crate root.
  pub segments: Vec<String>,
  pub manifest: Option<PathBuf>,
}

impl ModuleLocation {
  pub fn locate(dir: &Path) -> Result<Self> {
    let dir = dir.canonicalize().map_err(|source| Error::Io {
      path: dir.to_path_buf(),
      source,
    })?;

    for ancestor in dir.ancestors() {
      let manifest_path = ancestor.join(MANIFEST);
      if !manifest_path.is_file() {
        continue;
      }
      let crate_name = match read_crate_name(&manifest_path)? {
        Some(name) => name,
        // workspace manifest, keep looking
        None => continue,
      };
      let src = ancestor.join("src");
      if let Ok(relative) = dir.strip_prefix(&src) {
        return Ok(Self {
          root: crate_name,
          segments: module_segments(relative),
          manifest: Some(manifest_path),
        });
      }
      break;
    }

    Ok(Self {
      root: "crate".to_string(),
      segments: dir
        .file_name()
        .map(|name| vec![ident_segment(&name.to_string_lossy())])
        .unwrap_or_default(),
      manifest: None,
    })
  }

  /// Last module segment, or the crate name for a crate root.
  pub fn package_name(&self) -> &str {
    self.segments.last().unwrap_or(&self.root)
  }

  pub fn path(&self) -> Vec<String> {
    let mut path = vec![self.root.clone()];
    path.extend(self.segments.iter().cloned());
    path
  }

  pub fn same_crate(&self, other: &ModuleLocation) -> bool {
    match (&self.manifest, &other.manifest) {
      (Some(a), Some(b)) => a == b,
      (None, None) => true,
      _ => false,
    }
  }
}

fn read_crate_name(path: &Path) -> Result<Option<String>> {
  let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let manifest: Manifest = toml::from_str(&text).map_err(|source| Error::Manifest {
    path: path.to_path_buf(),
    source,
  })?;
  let Manifest { package, lib } = manifest;
  Ok(
    lib
      .and_then(|lib| lib.name)
      .or_else(|| package.map(|package| package.name))
      .map(|name| ident_segment(&name)),
  )
}

fn module_segments(relative: &Path) -> Vec<String> {
  relative
    .components()
    .filter_map(|component| match component {
      Component::Normal(name) => Some(ident_segment(&name.to_string_lossy())),
      _ => None,
    })
    .collect()
}

/// Maps a file or crate name onto a usable path segment.
pub(crate) fn ident_segment(name: &str) -> String {
  let mut segment: String = name
    .chars()
    .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
    .collect();
  if segment.starts_with(|c: char| c.is_ascii_digit()) {
    segment.insert(0, '_');
  }
  segment
}

#[test]
fn test_locate_below_src() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(
    dir.path().join("Cargo.toml"),
    "[package]\nname = \"my-app\"\nversion = \"0.1.0\"\n",
  )
  .unwrap();
  let model = dir.path().join("src").join("api").join("model");
  std::fs::create_dir_all(&model).unwrap();

  let location = ModuleLocation::locate(&model).unwrap();
  assert_eq!(location.root, "my_app");
  assert_eq!(location.segments, vec!["api".to_string(), "model".to_string()]);
  assert_eq!(location.package_name(), "model");

  let root = ModuleLocation::locate(&dir.path().join("src")).unwrap();
  assert!(root.segments.is_empty());
  assert_eq!(root.package_name(), "my_app");
  assert!(root.same_crate(&location));
}

#[test]
fn test_locate_without_manifest() {
  let dir = tempfile::tempdir().unwrap();
  let pkg = dir.path().join("dto-types");
  std::fs::create_dir_all(&pkg).unwrap();

  let location = ModuleLocation::locate(&pkg).unwrap();
  assert_eq!(location.root, "crate");
  assert_eq!(location.segments, vec!["dto_types".to_string()]);
}

#[test]
fn test_ident_segment() {
  assert_eq!(ident_segment("my-app"), "my_app");
  assert_eq!(ident_segment(".tmp3Xa"), "_tmp3Xa");
  assert_eq!(ident_segment("2fa"), "_2fa");
}

#[test]
fn test_lib_name_overrides_package_name() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(
    dir.path().join("Cargo.toml"),
    "[package]\nname = \"my-app\"\n\n[lib]\nname = \"core_lib\"\n",
  )
  .unwrap();
  std::fs::create_dir_all(dir.path().join("src")).unwrap();

  let location = ModuleLocation::locate(&dir.path().join("src")).unwrap();
  assert_eq!(location.root, "core_lib");
}

#[test]
fn test_workspace_manifest_has_no_crate_name() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("Cargo.toml"), "[workspace]\nmembers = []\n").unwrap();
  let model = dir.path().join("src").join("model");
  std::fs::create_dir_all(&model).unwrap();

  assert_eq!(read_crate_name(&dir.path().join("Cargo.toml")).unwrap(), None);
  let location = ModuleLocation::locate(&model).unwrap();
  assert_eq!(location.root, "crate");
  assert_eq!(location.segments, vec!["model".to_string()]);
  assert_eq!(location.manifest, None);
}
