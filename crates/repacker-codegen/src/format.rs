use crate::error::{Error, Result};
use proc_macro2::{TokenStream, TokenTree};
use std::collections::HashSet;
use syn::visit::{self, Visit};
use syn::{Item, UseTree};

/// Formats generated source and drops `use` items nothing refers to.
///
/// Leading `//` comments are kept verbatim since the parser discards them.
pub fn format_source(text: &str) -> Result<String> {
  let (header, body) = split_header(text);
  let mut file = syn::parse_file(body).map_err(|source| Error::Format { source })?;
  prune_imports(&mut file);

  let mut out = header.to_string();
  out.push_str(&prettyplease::unparse(&file));
  Ok(out)
}

fn split_header(text: &str) -> (&str, &str) {
  let mut end = 0;
  for line in text.split_inclusive('\n') {
    let trimmed = line.trim();
    let is_comment = trimmed.starts_with("//") && !trimmed.starts_with("///") && !trimmed.starts_with("//!");
    if !is_comment && !trimmed.is_empty() {
      break;
    }
    end += line.len();
  }
  text.split_at(end)
}

fn prune_imports(file: &mut syn::File) {
  let mut used = UsedIdents::default();
  for item in &file.items {
    if !matches!(item, Item::Use(_)) {
      used.visit_item(item);
    }
  }

  let items = std::mem::take(&mut file.items);
  file.items = items
    .into_iter()
    .filter_map(|item| match item {
      Item::Use(mut item_use) => {
        item_use.tree = prune_tree(item_use.tree, &used.0)?;
        Some(Item::Use(item_use))
      }
      item => Some(item),
    })
    .collect();
}

fn prune_tree(tree: UseTree, used: &HashSet<String>) -> Option<UseTree> {
  match tree {
    UseTree::Path(mut path) => {
      let inner = prune_tree(*path.tree, used)?;
      path.tree = Box::new(inner);
      Some(UseTree::Path(path))
    }
    UseTree::Name(name) => {
      if name.ident == "self" || used.contains(&name.ident.to_string()) {
        Some(UseTree::Name(name))
      } else {
        None
      }
    }
    UseTree::Rename(rename) => {
      if rename.rename == "_" || used.contains(&rename.rename.to_string()) {
        Some(UseTree::Rename(rename))
      } else {
        None
      }
    }
    UseTree::Glob(glob) => Some(UseTree::Glob(glob)),
    UseTree::Group(mut group) => {
      group.items = group
        .items
        .into_iter()
        .filter_map(|tree| prune_tree(tree, used))
        .collect();
      if group.items.is_empty() {
        None
      } else {
        Some(UseTree::Group(group))
      }
    }
  }
}

#[derive(Default)]
struct UsedIdents(HashSet<String>);

impl UsedIdents {
  fn visit_tokens(&mut self, tokens: TokenStream) {
    for token in tokens {
      match token {
        TokenTree::Ident(ident) => {
          self.0.insert(ident.to_string());
        }
        TokenTree::Group(group) => self.visit_tokens(group.stream()),
        _ => {}
      }
    }
  }
}

impl<'ast> Visit<'ast> for UsedIdents {
  fn visit_ident(&mut self, ident: &'ast proc_macro2::Ident) {
    self.0.insert(ident.to_string());
  }

  fn visit_macro(&mut self, mac: &'ast syn::Macro) {
    self.visit_tokens(mac.tokens.clone());
    visit::visit_macro(self, mac);
  }
}

#[test]
fn test_keeps_header_and_formats() {
  let text = "// Code generated by \"repacker\"; DO NOT EDIT.\n\nuse super :: A ; pub fn new_a () -> A { A { } }\n";
  let formatted = format_source(text).unwrap();
  assert!(formatted.starts_with("// Code generated by \"repacker\"; DO NOT EDIT.\n\n"));
  assert!(formatted.contains("use super::A;\n"));
  assert!(formatted.contains("pub fn new_a() -> A {"));
}

#[test]
fn test_prunes_unused_imports() {
  let text = r#"
    use serde_json;
    use std::collections::{HashMap, HashSet};
    use crate::model as m;
    use std::fmt::Write as _;
    pub fn f(x: &m::User) -> HashMap<String, String> { let _ = format!("{:?}", HashSet::<u8>::new()); HashMap::new() }
  "#;
  let formatted = format_source(text).unwrap();
  assert!(!formatted.contains("serde_json"));
  assert!(formatted.contains("use std::collections::{HashMap, HashSet};"));
  assert!(formatted.contains("use crate::model as m;"));
  assert!(formatted.contains("use std::fmt::Write as _;"));
}

#[test]
fn test_prunes_group_leaves() {
  let formatted = format_source("use std::collections::{BTreeMap, HashMap};\npub type M = HashMap<u8, u8>;").unwrap();
  assert!(formatted.contains("use std::collections::{HashMap};") || formatted.contains("use std::collections::HashMap;"));
  assert!(!formatted.contains("BTreeMap"));
}

#[test]
fn test_unbalanced_input_fails() {
  let result = format_source("pub fn broken() {");
  assert!(matches!(result, Err(Error::Format { .. })));
}

#[test]
fn test_inner_doc_is_not_header() {
  let (header, body) = split_header("// banner\n\n//! docs\nuse a::b;\n");
  assert_eq!(header, "// banner\n\n");
  assert_eq!(body, "//! docs\nuse a::b;\n");
}
