use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{}: not a directory", .0.display())]
  NotADirectory(PathBuf),
  #[error("{}: no buildable Rust files", .0.display())]
  NoSourceFiles(PathBuf),
  #[error("cannot process {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("parsing package: {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: syn::Error,
  },
  #[error("reading manifest {}: {source}", path.display())]
  Manifest {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("{}: {message}", path.display())]
  Check { path: PathBuf, message: String },
  #[error("type `{name}` not found in package `{package}`")]
  TypeNotFound { package: String, name: String },
  #[error("type `{name}` is declared more than once in package `{package}`: {}", candidates.join(", "))]
  AmbiguousType {
    package: String,
    name: String,
    candidates: Vec<String>,
  },
  #[error("type `{name}` in package `{package}` is generic")]
  GenericType { package: String, name: String },
  #[error("failed to format generated code: {source}")]
  Format {
    #[source]
    source: syn::Error,
  },
  #[error("writing output {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl Error {
  pub(crate) fn check(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
    Error::Check {
      path: path.into(),
      message: message.into(),
    }
  }
}
