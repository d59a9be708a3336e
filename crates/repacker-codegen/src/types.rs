use crate::tag::{NormalizedTag, Tag};
use quote::ToTokens;
use std::fmt;
use std::path::PathBuf;

/// A resolved field type.
///
/// Two `TypeRef`s are equal when their display names are equal.
#[derive(Debug, Clone)]
pub struct TypeRef {
  ty: syn::Type,
  display: String,
}

impl TypeRef {
  pub fn new(ty: syn::Type) -> Self {
    let display = display_tokens(&ty.to_token_stream().to_string());
    Self { ty, display }
  }

  pub fn ty(&self) -> &syn::Type {
    &self.ty
  }

  pub fn display_name(&self) -> &str {
    &self.display
  }

  pub fn is_string(&self) -> bool {
    self.display == "String"
  }
}

impl PartialEq for TypeRef {
  fn eq(&self, other: &Self) -> bool {
    self.display == other.display
  }
}

impl Eq for TypeRef {}

impl fmt::Display for TypeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
  pub name: String,
  pub ty: TypeRef,
  pub raw_tag: String,
}

impl FieldDescriptor {
  pub fn repack_tag(&self) -> Option<NormalizedTag> {
    Tag::parse(&self.raw_tag).repack()
  }
}

/// A struct with named fields, in declaration order.
#[derive(Debug, Clone)]
pub struct RecordType {
  pub name: String,
  /// Absolute module path of the declaring module, e.g. `["app", "model", "user"]`.
  pub module: Vec<String>,
  /// Segments between the package module and the declaring module.
  pub inner: Vec<String>,
  pub file: PathBuf,
  pub is_generic: bool,
  pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
  pub fn qualified_name(&self) -> String {
    let mut segments = self.module.clone();
    segments.push(self.name.clone());
    segments.join("::")
  }

  pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
    self.fields.iter().find(|field| field.name == name)
  }
}

// Compacts `proc_macro2` token text: `Vec < Option < u8 > >` => `Vec<Option<u8>>`.
fn display_tokens(tokens: &str) -> String {
  let mut out = String::with_capacity(tokens.len());
  let mut prev: Option<&str> = None;
  for piece in tokens.split_whitespace() {
    if let Some(prev) = prev {
      if needs_space(prev, piece) {
        out.push(' ');
      }
    }
    out.push_str(piece);
    prev = Some(piece);
  }
  out
}

fn needs_space(prev: &str, next: &str) -> bool {
  if prev.ends_with("::") || prev.ends_with('<') || prev.ends_with('(') || prev.ends_with('[') {
    return false;
  }
  if prev == "&" || prev == "*" {
    return false;
  }
  if next.starts_with("::") || next.starts_with(&['<', '>', ',', ';', ')', ']'][..]) {
    return false;
  }
  if next.starts_with('(') {
    return prev == "->" || !prev.ends_with(|c: char| c.is_alphanumeric() || c == '_' || c == '>');
  }
  true
}

#[cfg(test)]
fn type_ref(src: &str) -> TypeRef {
  TypeRef::new(syn::parse_str(src).unwrap())
}

#[test]
fn test_display_paths() {
  assert_eq!(type_ref("String").display_name(), "String");
  assert_eq!(
    type_ref("std::collections::HashMap<String, Vec<u8>>").display_name(),
    "std::collections::HashMap<String, Vec<u8>>"
  );
  assert_eq!(type_ref("::core::option::Option<i32>").display_name(), "::core::option::Option<i32>");
}

#[test]
fn test_display_compound() {
  assert_eq!(type_ref("&'a str").display_name(), "&'a str");
  assert_eq!(type_ref("&mut [u8; 4]").display_name(), "&mut [u8; 4]");
  assert_eq!(type_ref("*const u8").display_name(), "*const u8");
  assert_eq!(type_ref("(i32, String)").display_name(), "(i32, String)");
  assert_eq!(type_ref("Box<dyn Fn(i32) -> bool>").display_name(), "Box<dyn Fn(i32) -> bool>");
}

#[test]
fn test_equality_is_by_display_name() {
  assert_eq!(type_ref("Vec< u8 >"), type_ref("Vec<u8>"));
  assert_ne!(type_ref("i32"), type_ref("i64"));
  assert!(type_ref("String").is_string());
  assert!(!type_ref("&str").is_string());
}

#[test]
fn test_repack_tag() {
  let field = FieldDescriptor {
    name: "user_id".to_string(),
    ty: type_ref("u64"),
    raw_tag: r#"json:"uid" repack:"id,omitempty""#.to_string(),
  };
  assert_eq!(field.repack_tag().map(|tag| tag.key), Some("id".to_string()));

  let field = FieldDescriptor {
    raw_tag: String::new(),
    ..field
  };
  assert_eq!(field.repack_tag(), None);
}
