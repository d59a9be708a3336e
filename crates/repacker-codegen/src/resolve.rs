use crate::types::{FieldDescriptor, RecordType, TypeRef};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
  /// Direct copy, the types are identical.
  None,
  /// Render the source value through its `Display` impl.
  ///
  /// Chosen for any source type whenever the destination is `String`; a
  /// source type without `Display` (`Vec<_>`, `Option<_>`) yields a
  /// constructor that does not compile.
  StringFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  NoMatchingField,
  TypeMismatch,
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SkipReason::NoMatchingField => f.write_str("no matching field"),
      SkipReason::TypeMismatch => f.write_str("type mismatch"),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Mapped {
    source: FieldDescriptor,
    coercion: Coercion,
  },
  Skipped {
    source: Option<FieldDescriptor>,
    reason: SkipReason,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingDecision {
  pub destination: FieldDescriptor,
  pub outcome: Outcome,
}

impl MappingDecision {
  pub fn source(&self) -> Option<&FieldDescriptor> {
    match self.outcome {
      Outcome::Mapped { ref source, .. } => Some(source),
      Outcome::Skipped { ref source, .. } => source.as_ref(),
    }
  }

  pub fn coercion(&self) -> Option<Coercion> {
    match self.outcome {
      Outcome::Mapped { coercion, .. } => Some(coercion),
      Outcome::Skipped { .. } => None,
    }
  }

  pub fn skipped_reason(&self) -> Option<SkipReason> {
    match self.outcome {
      Outcome::Mapped { .. } => None,
      Outcome::Skipped { reason, .. } => Some(reason),
    }
  }
}

/// One decision per destination field, in destination declaration order.
///
/// Each destination field takes the first source field, in source declaration
/// order, that has the same name or the same `repack` tag key. A source field
/// may feed any number of destination fields.
pub fn resolve(src: &RecordType, dst: &RecordType) -> Vec<MappingDecision> {
  dst
    .fields
    .iter()
    .map(|destination| {
      let outcome = match find_source(src, destination) {
        None => Outcome::Skipped {
          source: None,
          reason: SkipReason::NoMatchingField,
        },
        Some(source) => match coerce(&source.ty, &destination.ty) {
          Some(coercion) => Outcome::Mapped {
            source: source.clone(),
            coercion,
          },
          None => Outcome::Skipped {
            source: Some(source.clone()),
            reason: SkipReason::TypeMismatch,
          },
        },
      };
      MappingDecision {
        destination: destination.clone(),
        outcome,
      }
    })
    .collect()
}

fn find_source<'a>(src: &'a RecordType, destination: &FieldDescriptor) -> Option<&'a FieldDescriptor> {
  let destination_tag = destination.repack_tag();
  src.fields.iter().find(|source| {
    if source.name == destination.name {
      return true;
    }
    match (source.repack_tag(), destination_tag.as_ref()) {
      (Some(source_tag), Some(destination_tag)) => source_tag.key == destination_tag.key,
      _ => false,
    }
  })
}

fn coerce(source: &TypeRef, destination: &TypeRef) -> Option<Coercion> {
  if source == destination {
    Some(Coercion::None)
  } else if destination.is_string() {
    Some(Coercion::StringFormat)
  } else {
    None
  }
}

#[cfg(test)]
fn field(name: &str, ty: &str, raw_tag: &str) -> FieldDescriptor {
  FieldDescriptor {
    name: name.to_string(),
    ty: TypeRef::new(syn::parse_str(ty).unwrap()),
    raw_tag: raw_tag.to_string(),
  }
}

#[cfg(test)]
fn record(name: &str, fields: Vec<FieldDescriptor>) -> RecordType {
  RecordType {
    name: name.to_string(),
    module: vec!["crate".to_string(), "model".to_string()],
    inner: vec![],
    file: std::path::PathBuf::from("model/mod.rs"),
    is_generic: false,
    fields,
  }
}

#[test]
fn test_name_match_and_string_format() {
  let src = record("User", vec![field("name", "String", ""), field("age", "i32", "")]);
  let dst = record("UserView", vec![field("name", "String", ""), field("age", "String", "")]);

  let decisions = resolve(&src, &dst);
  assert_eq!(decisions.len(), 2);
  assert_eq!(decisions[0].coercion(), Some(Coercion::None));
  assert_eq!(decisions[0].source().unwrap().name, "name");
  assert_eq!(decisions[1].coercion(), Some(Coercion::StringFormat));
  assert_eq!(decisions[1].source().unwrap().name, "age");
}

#[test]
fn test_no_matching_field() {
  let src = record("User", vec![field("name", "String", "")]);
  let dst = record("UserView", vec![field("nickname", "String", "")]);

  let decisions = resolve(&src, &dst);
  assert_eq!(decisions[0].skipped_reason(), Some(SkipReason::NoMatchingField));
  assert_eq!(decisions[0].source(), None);
  assert_eq!(SkipReason::NoMatchingField.to_string(), "no matching field");
}

#[test]
fn test_type_mismatch_is_skipped() {
  let src = record("User", vec![field("age", "String", "")]);
  let dst = record("UserView", vec![field("age", "i64", "")]);

  let decisions = resolve(&src, &dst);
  assert_eq!(decisions[0].skipped_reason(), Some(SkipReason::TypeMismatch));
  assert_eq!(decisions[0].source().unwrap().name, "age");
  assert_eq!(SkipReason::TypeMismatch.to_string(), "type mismatch");
}

#[test]
fn test_tag_match_despite_name_mismatch() {
  let src = record("User", vec![field("user_id", "u64", r#"repack:"id""#)]);
  let dst = record("UserView", vec![field("id", "u64", r#"json:"id" repack:"id""#)]);

  let decisions = resolve(&src, &dst);
  assert_eq!(decisions[0].coercion(), Some(Coercion::None));
  assert_eq!(decisions[0].source().unwrap().name, "user_id");
}

#[test]
fn test_untagged_fields_never_tag_match() {
  let src = record("User", vec![field("a", "i32", ""), field("b", "i32", r#"json:"x""#)]);
  let dst = record("UserView", vec![field("c", "i32", ""), field("d", "i32", r#"json:"x""#)]);

  let decisions = resolve(&src, &dst);
  assert!(decisions
    .iter()
    .all(|decision| decision.skipped_reason() == Some(SkipReason::NoMatchingField)));
}

#[test]
fn test_empty_tags_match_each_other() {
  let src = record("User", vec![field("a", "i32", r#"repack:"""#)]);
  let dst = record("UserView", vec![field("b", "i32", r#"repack:"""#)]);

  assert_eq!(resolve(&src, &dst)[0].coercion(), Some(Coercion::None));
}

#[test]
fn test_first_match_in_source_order_wins() {
  // `code` tag-matches before the later, same-named `label`.
  let src = record(
    "Item",
    vec![field("code", "i32", r#"repack:"label""#), field("label", "String", "")],
  );
  let dst = record("ItemView", vec![field("label", "String", r#"repack:"label""#)]);

  let decisions = resolve(&src, &dst);
  assert_eq!(decisions[0].source().unwrap().name, "code");
  assert_eq!(decisions[0].coercion(), Some(Coercion::StringFormat));
}

#[test]
fn test_shadowed_match_does_not_fall_through() {
  let src = record("Item", vec![field("id", "String", ""), field("num", "u32", r#"repack:"id""#)]);
  let dst = record("ItemView", vec![field("id", "u32", r#"repack:"id""#)]);

  let decisions = resolve(&src, &dst);
  assert_eq!(decisions[0].skipped_reason(), Some(SkipReason::TypeMismatch));
  assert_eq!(decisions[0].source().unwrap().name, "id");
}

#[test]
fn test_source_field_feeds_several_destinations() {
  let src = record("User", vec![field("name", "String", r#"repack:"name""#)]);
  let dst = record(
    "UserView",
    vec![field("name", "String", ""), field("display", "String", r#"repack:"name""#)],
  );

  let decisions = resolve(&src, &dst);
  assert_eq!(decisions[0].source().unwrap().name, "name");
  assert_eq!(decisions[1].source().unwrap().name, "name");
}

#[test]
fn test_decisions_follow_destination_order() {
  let src = record("User", vec![field("a", "i32", ""), field("b", "i32", ""), field("c", "i32", "")]);
  let dst = record("UserView", vec![field("c", "i32", ""), field("x", "i32", ""), field("a", "i32", "")]);

  let names: Vec<_> = resolve(&src, &dst)
    .iter()
    .map(|decision| decision.destination.name.clone())
    .collect();
  assert_eq!(names, vec!["c", "x", "a"]);
}

#[test]
fn test_tag_options_do_not_affect_matching() {
  let src = record("User", vec![field("uid", "u64", r#"repack:"id,omitempty""#)]);
  let dst = record("UserView", vec![field("key", "u64", r#"repack:"id""#)]);

  assert_eq!(resolve(&src, &dst)[0].coercion(), Some(Coercion::None));
}
