//! Loads the struct declarations of one package directory.
//!
//! Every `.rs` file of the directory is parsed, and each field type is
//! resolved against the imports, aliases and declarations visible from its
//! module so that the resolver can compare types by their display names.

use crate::error::{Error, Result};
use crate::manifest::{ident_segment, ModuleLocation};
use crate::types::{FieldDescriptor, RecordType, TypeRef};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use syn::visit_mut::{self, VisitMut};
use syn::{Attribute, Fields, Item, Lit, Meta, NestedMeta, UseTree};
use tracing::debug;

/// Suffix of generated files; they are never loaded back.
pub const GENERATED_SUFFIX: &str = "_repack.rs";

const TAG_ATTR: &str = "tag";

const BUILTIN_TYPES: &[&str] = &[
  "bool", "char", "str", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64",
  "i128", "isize", "f32", "f64", "String", "Vec", "Option", "Box", "Result",
];

const PRELUDE_PATHS: &[(&str, &str)] = &[
  ("string", "String"),
  ("vec", "Vec"),
  ("option", "Option"),
  ("boxed", "Box"),
  ("result", "Result"),
];

pub fn output_file_name(type_name: &str) -> String {
  format!("{}{}", type_name.to_lowercase(), GENERATED_SUFFIX)
}

#[derive(Debug)]
pub struct Package {
  pub dir: PathBuf,
  pub name: String,
  pub location: ModuleLocation,
  records: Vec<RecordType>,
}

impl Package {
  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref();
    if !fs::metadata(dir).map(|meta| meta.is_dir()).unwrap_or(false) {
      return Err(Error::NotADirectory(dir.to_path_buf()));
    }

    let location = ModuleLocation::locate(dir)?;
    let files = source_files(dir)?;
    if files.is_empty() {
      return Err(Error::NoSourceFiles(dir.to_path_buf()));
    }

    let mut modules = vec![];
    for path in &files {
      let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.clone(),
        source,
      })?;
      let file = syn::parse_file(&text).map_err(|source| Error::Parse {
        path: path.clone(),
        source,
      })?;

      let mut inner = vec![];
      if let Some(stem) = path.file_stem().map(|stem| stem.to_string_lossy()) {
        if !matches!(&*stem, "mod" | "lib" | "main") {
          inner.push(ident_segment(&stem));
        }
      }
      collect_module(path, &location.root, location.path(), inner, &file.items, &mut modules)?;
    }

    let records = Resolver::new(&modules).records()?;
    debug!(
      dir = %dir.display(),
      files = files.len(),
      records = records.len(),
      "loaded package"
    );

    Ok(Self {
      dir: dir.to_path_buf(),
      name: location.package_name().to_string(),
      location,
      records,
    })
  }

  pub fn records(&self) -> &[RecordType] {
    &self.records
  }

  pub fn record(&self, name: &str) -> Result<&RecordType> {
    let found: Vec<_> = self.records.iter().filter(|record| record.name == name).collect();
    match found.as_slice() {
      [] => Err(Error::TypeNotFound {
        package: self.name.clone(),
        name: name.to_string(),
      }),
      [record] if record.is_generic => Err(Error::GenericType {
        package: self.name.clone(),
        name: name.to_string(),
      }),
      [record] => Ok(record),
      _ => Err(Error::AmbiguousType {
        package: self.name.clone(),
        name: name.to_string(),
        candidates: found.iter().map(|record| record.qualified_name()).collect(),
      }),
    }
  }
}

fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
  let entries = fs::read_dir(dir).map_err(|source| Error::Io {
    path: dir.to_path_buf(),
    source,
  })?;

  let mut files = vec![];
  for entry in entries {
    let entry = entry.map_err(|source| Error::Io {
      path: dir.to_path_buf(),
      source,
    })?;
    let path = entry.path();
    let name = entry.file_name().to_string_lossy().into_owned();
    if !path.is_file() || name.starts_with('.') {
      continue;
    }
    if !name.ends_with(".rs") || name.ends_with(GENERATED_SUFFIX) {
      continue;
    }
    files.push(path);
  }
  files.sort();
  Ok(files)
}

#[derive(Debug)]
struct ModuleInfo {
  file: PathBuf,
  root: String,
  path: Vec<String>,
  inner: Vec<String>,
  imports: HashMap<String, Vec<String>>,
  has_glob: bool,
  types: HashSet<String>,
  mods: HashSet<String>,
  structs: Vec<syn::ItemStruct>,
  aliases: Vec<syn::ItemType>,
}

fn collect_module(
  file: &Path,
  root: &str,
  package_path: Vec<String>,
  inner: Vec<String>,
  items: &[Item],
  modules: &mut Vec<ModuleInfo>,
) -> Result<()> {
  let mut path = package_path.clone();
  path.extend(inner.iter().cloned());

  let mut info = ModuleInfo {
    file: file.to_path_buf(),
    root: root.to_string(),
    path,
    inner: inner.clone(),
    imports: HashMap::new(),
    has_glob: false,
    types: HashSet::new(),
    mods: HashSet::new(),
    structs: vec![],
    aliases: vec![],
  };

  let declare = |info: &mut ModuleInfo, ident: &syn::Ident| {
    let name = ident.to_string();
    if info.types.insert(name.clone()) {
      Ok(())
    } else {
      Err(Error::check(
        file,
        format!("the name `{}` is defined multiple times", name),
      ))
    }
  };

  let mut nested = vec![];
  for item in items {
    match item {
      Item::Struct(item) if !is_cfg_test(&item.attrs) => {
        declare(&mut info, &item.ident)?;
        info.structs.push(item.clone());
      }
      Item::Enum(item) if !is_cfg_test(&item.attrs) => declare(&mut info, &item.ident)?,
      Item::Union(item) if !is_cfg_test(&item.attrs) => declare(&mut info, &item.ident)?,
      Item::Type(item) if !is_cfg_test(&item.attrs) => {
        declare(&mut info, &item.ident)?;
        info.aliases.push(item.clone());
      }
      Item::Mod(item) if !is_cfg_test(&item.attrs) => {
        info.mods.insert(item.ident.to_string());
        if let Some((_, ref items)) = item.content {
          nested.push((item.ident.to_string(), items));
        }
      }
      _ => {}
    }
  }

  for item in items {
    if let Item::Use(item) = item {
      if is_cfg_test(&item.attrs) {
        continue;
      }
      let mut imports = vec![];
      flatten_use(&item.tree, &mut vec![], &mut imports, &mut info.has_glob);
      for (name, segments) in imports {
        let absolute = absolutize(&segments, &info.path, root, &info.mods);
        info.imports.insert(name, absolute);
      }
    }
  }

  modules.push(info);

  for (ident, items) in nested {
    let mut inner = inner.clone();
    inner.push(ident);
    collect_module(file, root, package_path.clone(), inner, items, modules)?;
  }
  Ok(())
}

fn is_cfg_test(attrs: &[Attribute]) -> bool {
  attrs.iter().any(|attr| {
    if !attr.path.is_ident("cfg") {
      return false;
    }
    match attr.parse_meta() {
      Ok(Meta::List(list)) => list.nested.iter().any(|nested| {
        matches!(nested, NestedMeta::Meta(Meta::Path(path)) if path.is_ident("test"))
      }),
      _ => false,
    }
  })
}

fn flatten_use(
  tree: &UseTree,
  prefix: &mut Vec<String>,
  out: &mut Vec<(String, Vec<String>)>,
  has_glob: &mut bool,
) {
  match tree {
    UseTree::Path(path) => {
      prefix.push(path.ident.to_string());
      flatten_use(&path.tree, prefix, out, has_glob);
      prefix.pop();
    }
    UseTree::Name(name) => {
      if name.ident == "self" {
        if let Some(last) = prefix.last() {
          out.push((last.clone(), prefix.clone()));
        }
      } else {
        let mut segments = prefix.clone();
        segments.push(name.ident.to_string());
        out.push((name.ident.to_string(), segments));
      }
    }
    UseTree::Rename(rename) => {
      if rename.rename == "_" {
        return;
      }
      let mut segments = prefix.clone();
      if rename.ident != "self" {
        segments.push(rename.ident.to_string());
      }
      out.push((rename.rename.to_string(), segments));
    }
    UseTree::Glob(_) => *has_glob = true,
    UseTree::Group(group) => {
      for tree in &group.items {
        flatten_use(tree, prefix, out, has_glob);
      }
    }
  }
}

fn absolutize(segments: &[String], module: &[String], root: &str, mods: &HashSet<String>) -> Vec<String> {
  let first = match segments.first() {
    Some(first) => first.as_str(),
    None => return vec![],
  };
  match first {
    "crate" => std::iter::once(root.to_string())
      .chain(segments[1..].iter().cloned())
      .collect(),
    "self" => module.iter().chain(segments[1..].iter()).cloned().collect(),
    "super" => {
      let supers = segments.iter().take_while(|segment| *segment == "super").count();
      let keep = module.len().saturating_sub(supers).max(1);
      module[..keep].iter().chain(segments[supers..].iter()).cloned().collect()
    }
    _ if mods.contains(first) => module.iter().chain(segments.iter()).cloned().collect(),
    _ => segments.to_vec(),
  }
}

fn raw_tag(attrs: &[Attribute], file: &Path, context: &str) -> Result<String> {
  let mut tags = vec![];
  for attr in attrs.iter().filter(|attr| attr.path.is_ident(TAG_ATTR)) {
    match attr.parse_meta() {
      Ok(Meta::NameValue(syn::MetaNameValue {
        lit: Lit::Str(ref lit),
        ..
      })) => tags.push(lit.value()),
      _ => {
        return Err(Error::check(
          file,
          format!("{}: expected `#[{} = \"...\"]`", context, TAG_ATTR),
        ))
      }
    }
  }
  Ok(tags.join(" "))
}

enum AliasState {
  Unresolved,
  Resolving,
  Resolved(syn::Type),
}

struct AliasDecl {
  module: usize,
  name: String,
  generic: bool,
  target: syn::Type,
  state: AliasState,
}

struct Resolver<'p> {
  modules: &'p [ModuleInfo],
  declared: HashMap<String, Vec<usize>>,
  aliases: Vec<AliasDecl>,
}

impl<'p> Resolver<'p> {
  fn new(modules: &'p [ModuleInfo]) -> Self {
    let mut declared: HashMap<String, Vec<usize>> = HashMap::new();
    let mut aliases = vec![];
    for (index, module) in modules.iter().enumerate() {
      for name in &module.types {
        declared.entry(name.clone()).or_default().push(index);
      }
      for alias in &module.aliases {
        aliases.push(AliasDecl {
          module: index,
          name: alias.ident.to_string(),
          generic: !alias.generics.params.is_empty(),
          target: (*alias.ty).clone(),
          state: AliasState::Unresolved,
        });
      }
    }
    Self {
      modules,
      declared,
      aliases,
    }
  }

  fn records(mut self) -> Result<Vec<RecordType>> {
    let modules = self.modules;
    let mut records = vec![];
    for (index, module) in modules.iter().enumerate() {
      for item in &module.structs {
        let named = match item.fields {
          Fields::Named(ref named) => named,
          _ => continue,
        };

        let generics: HashSet<String> = item
          .generics
          .type_params()
          .map(|param| param.ident.to_string())
          .collect();
        let name = item.ident.to_string();
        let mut self_path = module.path.clone();
        self_path.push(name.clone());

        let mut fields: Vec<FieldDescriptor> = vec![];
        for field in &named.named {
          let field_name = match field.ident {
            Some(ref ident) => ident.to_string(),
            None => continue,
          };
          let context = format!("{}::{}", name, field_name);
          if fields.iter().any(|existing| existing.name == field_name) {
            return Err(Error::check(
              &module.file,
              format!("field `{}` is already declared", context),
            ));
          }

          let mut ty = field.ty.clone();
          self.qualify(index, &generics, Some(&self_path), &mut ty, &context)?;
          fields.push(FieldDescriptor {
            name: field_name,
            ty: TypeRef::new(ty),
            raw_tag: raw_tag(&field.attrs, &module.file, &context)?,
          });
        }

        records.push(RecordType {
          name,
          module: module.path.clone(),
          inner: module.inner.clone(),
          file: module.file.clone(),
          is_generic: !item.generics.params.is_empty(),
          fields,
        });
      }
    }
    Ok(records)
  }

  fn qualify(
    &mut self,
    module: usize,
    generics: &HashSet<String>,
    self_path: Option<&Vec<String>>,
    ty: &mut syn::Type,
    context: &str,
  ) -> Result<()> {
    let file = self.modules[module].file.clone();
    let mut visitor = Qualify {
      resolver: self,
      module,
      generics,
      self_path,
      context,
      err: None,
    };
    visitor.visit_type_mut(ty);
    match visitor.err {
      Some(message) => Err(Error::check(file, message)),
      None => Ok(()),
    }
  }

  fn find_alias(&self, module: usize, name: &str) -> Option<usize> {
    let local = self
      .aliases
      .iter()
      .position(|alias| alias.module == module && alias.name == name);
    if local.is_some() {
      return local;
    }

    let info = &self.modules[module];
    if info.types.contains(name) || info.imports.contains_key(name) {
      return None;
    }
    let mut candidates = self
      .aliases
      .iter()
      .enumerate()
      .filter(|(_, alias)| alias.name == name)
      .map(|(index, _)| index);
    match (candidates.next(), candidates.next()) {
      (Some(index), None) => Some(index),
      _ => None,
    }
  }

  /// Expands a non-generic alias visible from `module`.
  fn alias(&mut self, module: usize, name: &str) -> Result<Option<syn::Type>, String> {
    let index = match self.find_alias(module, name) {
      Some(index) if !self.aliases[index].generic => index,
      _ => return Ok(None),
    };

    match self.aliases[index].state {
      AliasState::Resolved(ref ty) => return Ok(Some(ty.clone())),
      AliasState::Resolving => {
        return Err(format!("cycle detected when expanding type alias `{}`", name))
      }
      AliasState::Unresolved => {}
    }

    self.aliases[index].state = AliasState::Resolving;
    let alias_module = self.aliases[index].module;
    let mut ty = self.aliases[index].target.clone();
    let generics = HashSet::new();
    let mut visitor = Qualify {
      resolver: self,
      module: alias_module,
      generics: &generics,
      self_path: None,
      context: name,
      err: None,
    };
    visitor.visit_type_mut(&mut ty);
    if let Some(message) = visitor.err {
      return Err(message);
    }
    self.aliases[index].state = AliasState::Resolved(ty.clone());
    Ok(Some(ty))
  }

  /// Absolute replacement for the leading identifier of a path.
  fn resolve_name(&self, module: usize, name: &str) -> Option<Vec<String>> {
    let info = &self.modules[module];
    if info.types.contains(name) || info.mods.contains(name) {
      let mut path = info.path.clone();
      path.push(name.to_string());
      return Some(path);
    }
    if let Some(path) = info.imports.get(name) {
      return Some(path.clone());
    }
    match self.declared.get(name).map(Vec::as_slice) {
      Some([declaring]) => {
        let mut path = self.modules[*declaring].path.clone();
        path.push(name.to_string());
        Some(path)
      }
      _ => None,
    }
  }
}

struct Qualify<'r, 'p> {
  resolver: &'r mut Resolver<'p>,
  module: usize,
  generics: &'r HashSet<String>,
  self_path: Option<&'r Vec<String>>,
  context: &'r str,
  err: Option<String>,
}

impl<'r, 'p> Qualify<'r, 'p> {
  // (replacement segments, number of leading segments replaced)
  fn prefix(&self, idents: &[String]) -> Option<(Vec<String>, usize)> {
    let info = &self.resolver.modules[self.module];
    let first = idents[0].as_str();
    match first {
      "crate" | "self" | "super" => {
        let consumed = if first == "super" {
          idents.iter().take_while(|ident| *ident == "super").count()
        } else {
          1
        };
        let absolute = absolutize(&idents[..consumed], &info.path, &info.root, &info.mods);
        Some((absolute, consumed))
      }
      "Self" => self.self_path.map(|path| (path.clone(), 1)),
      _ if self.generics.contains(first) => None,
      _ => self
        .resolver
        .resolve_name(self.module, first)
        .map(|path| (path, 1)),
    }
  }

  fn is_known(&self, name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
      || self.generics.contains(name)
      || self.resolver.modules[self.module].has_glob
  }
}

impl<'r, 'p> VisitMut for Qualify<'r, 'p> {
  fn visit_type_mut(&mut self, node: &mut syn::Type) {
    if self.err.is_some() {
      return;
    }
    if let syn::Type::Path(ref type_path) = node {
      let path = &type_path.path;
      if type_path.qself.is_none()
        && path.leading_colon.is_none()
        && path.segments.len() == 1
        && path.segments[0].arguments.is_empty()
      {
        let name = path.segments[0].ident.to_string();
        if !self.generics.contains(&name) {
          match self.resolver.alias(self.module, &name) {
            Ok(Some(ty)) => {
              *node = ty;
              return;
            }
            Ok(None) => {}
            Err(message) => {
              self.err = Some(message);
              return;
            }
          }
        }
      }
    }
    visit_mut::visit_type_mut(self, node);
  }

  fn visit_type_path_mut(&mut self, node: &mut syn::TypePath) {
    visit_mut::visit_type_path_mut(self, node);
    if node.qself.is_some() || node.path.segments.is_empty() {
      return;
    }

    if node.path.leading_colon.is_none() {
      let idents: Vec<String> = node
        .path
        .segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect();

      match self.prefix(&idents) {
        Some((replacement, consumed)) => {
          if let Ok(mut path) = syn::parse_str::<syn::Path>(&replacement.join("::")) {
            if let Some(last) = path.segments.last_mut() {
              last.arguments = node.path.segments[consumed - 1].arguments.clone();
            }
            path
              .segments
              .extend(node.path.segments.iter().skip(consumed).cloned());
            node.path = path;
          }
        }
        None if idents.len() == 1 && !self.is_known(&idents[0]) => {
          self.err = Some(format!(
            "{}: cannot find type `{}` in this scope",
            self.context, idents[0]
          ));
          return;
        }
        None => {}
      }
    }

    canonicalize_prelude(&mut node.path);
  }
}

// `std::string::String` => `String`, and likewise for the other prelude types.
fn canonicalize_prelude(path: &mut syn::Path) {
  if path.segments.len() != 3 {
    return;
  }
  let idents: Vec<String> = path
    .segments
    .iter()
    .map(|segment| segment.ident.to_string())
    .collect();
  if !matches!(idents[0].as_str(), "std" | "alloc" | "core") {
    return;
  }
  let is_prelude = PRELUDE_PATHS
    .iter()
    .any(|(module, name)| idents[1] == *module && idents[2] == *name);
  if is_prelude {
    let last = path.segments[2].clone();
    path.leading_colon = None;
    path.segments.clear();
    path.segments.push(last);
  }
}

#[cfg(test)]
fn write_files(dir: &Path, files: &[(&str, &str)]) {
  for (name, text) in files {
    fs::write(dir.join(name), text).unwrap();
  }
}

#[cfg(test)]
fn field_type(package: &Package, record: &str, field: &str) -> String {
  package
    .records()
    .iter()
    .find(|candidate| candidate.name == record)
    .unwrap()
    .field(field)
    .unwrap()
    .ty
    .display_name()
    .to_string()
}

#[test]
fn test_load_fields_in_order() {
  let dir = tempfile::tempdir().unwrap();
  write_files(
    dir.path(),
    &[(
      "mod.rs",
      r#"
        pub struct User {
          #[tag = "repack:\"id\""]
          pub user_id: u64,
          pub name: String,
          pub age: i32,
        }
        pub struct Unit;
        pub struct Pair(i32, i32);
      "#,
    )],
  );

  let package = Package::load(dir.path()).unwrap();
  assert_eq!(package.records().len(), 1);
  let user = package.record("User").unwrap();
  let names: Vec<_> = user.fields.iter().map(|field| field.name.as_str()).collect();
  assert_eq!(names, vec!["user_id", "name", "age"]);
  assert_eq!(user.fields[0].raw_tag, r#"repack:"id""#);
  assert_eq!(user.fields[1].raw_tag, "");
  assert_eq!(user.fields[2].ty.display_name(), "i32");
}

#[test]
fn test_resolves_imports_aliases_and_locals() {
  let dir = tempfile::tempdir().unwrap();
  write_files(
    dir.path(),
    &[
      (
        "account.rs",
        r#"
          use std::collections::HashMap;
          use super::common::Address as Addr;

          type Labels = HashMap<String, std::string::String>;

          pub struct Account {
            pub labels: Labels,
            pub home: Addr,
            pub work: Option<Address>,
            pub next: Option<Box<Self>>,
          }

          pub struct Address {
            pub line: String,
          }
        "#,
      ),
      ("common.rs", "pub struct Address { pub line: String }"),
    ],
  );

  let package = Package::load(dir.path()).unwrap();
  let pkg = package.location.path().join("::");
  assert_eq!(
    field_type(&package, "Account", "labels"),
    "std::collections::HashMap<String, String>"
  );
  assert_eq!(
    field_type(&package, "Account", "home"),
    format!("{}::common::Address", pkg)
  );
  assert_eq!(
    field_type(&package, "Account", "work"),
    format!("Option<{}::account::Address>", pkg)
  );
  assert_eq!(
    field_type(&package, "Account", "next"),
    format!("Option<Box<{}::account::Account>>", pkg)
  );
}

#[test]
fn test_skips_generated_and_test_items() {
  let dir = tempfile::tempdir().unwrap();
  write_files(
    dir.path(),
    &[
      ("mod.rs", "pub struct User { pub name: String }\n#[cfg(test)]\nmod tests { pub struct Fixture { pub x: i32 } }"),
      ("user_repack.rs", "this is not rust"),
      ("notes.txt", "ignored"),
    ],
  );

  let package = Package::load(dir.path()).unwrap();
  assert_eq!(package.records().len(), 1);
  assert!(matches!(package.record("Fixture"), Err(Error::TypeNotFound { .. })));
}

#[test]
fn test_load_errors() {
  let dir = tempfile::tempdir().unwrap();
  assert!(matches!(
    Package::load(dir.path().join("missing")),
    Err(Error::NotADirectory(_))
  ));
  assert!(matches!(Package::load(dir.path()), Err(Error::NoSourceFiles(_))));

  write_files(dir.path(), &[("broken.rs", "pub struct {")]);
  assert!(matches!(Package::load(dir.path()), Err(Error::Parse { .. })));
}

#[test]
fn test_check_errors() {
  let cases = [
    "pub struct A { x: i32, x: i64 }",
    "pub struct A { x: i32 }\npub struct A { y: i32 }",
    "pub struct A { x: Missing }",
    "type A = B;\ntype B = A;\npub struct C { x: A }",
    "pub struct A { #[tag(repack)] x: i32 }",
  ];
  for case in cases.iter() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &[("mod.rs", case)]);
    let result = Package::load(dir.path());
    assert!(matches!(result, Err(Error::Check { .. })), "{}: {:?}", case, result);
  }
}

#[test]
fn test_glob_import_relaxes_unknown_types() {
  let dir = tempfile::tempdir().unwrap();
  write_files(
    dir.path(),
    &[("mod.rs", "use chrono::*;\npub struct Event { pub at: DateTime<Utc> }")],
  );
  let package = Package::load(dir.path()).unwrap();
  assert_eq!(field_type(&package, "Event", "at"), "DateTime<Utc>");
}

#[test]
fn test_record_lookup_errors() {
  let dir = tempfile::tempdir().unwrap();
  write_files(
    dir.path(),
    &[
      ("a.rs", "pub struct Item { pub x: i32 }\npub struct Page<T> { pub items: Vec<T> }"),
      ("b.rs", "pub struct Item { pub y: i32 }"),
    ],
  );
  let package = Package::load(dir.path()).unwrap();
  assert!(matches!(package.record("Item"), Err(Error::AmbiguousType { .. })));
  assert!(matches!(package.record("Page"), Err(Error::GenericType { .. })));
  assert_eq!(field_type(&package, "Page", "items"), "Vec<T>");
  assert!(matches!(package.record("Nope"), Err(Error::TypeNotFound { .. })));
}

#[test]
fn test_output_file_name() {
  assert_eq!(output_file_name("UserView"), "userview_repack.rs");
}
