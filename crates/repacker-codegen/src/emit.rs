use crate::catalog::Package;
use crate::resolve::{Coercion, MappingDecision, Outcome, SkipReason};
use crate::types::RecordType;
use convert_case::{Case, Casing};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use tracing::{debug, warn};

/// Everything the emitter needs to render one constructor.
#[derive(Debug, Clone)]
pub struct ConstructorSpec {
  pub source_package: String,
  /// Path the generated module uses to reach the source package.
  pub source_package_path: Vec<String>,
  /// Modules between the source package and the source type.
  pub source_inner: Vec<String>,
  pub source_type: String,
  pub destination_package: String,
  pub destination_inner: Vec<String>,
  pub destination_type: String,
  pub decisions: Vec<MappingDecision>,
}

impl ConstructorSpec {
  pub fn new(
    src_pkg: &Package,
    src: &RecordType,
    dst_pkg: &Package,
    dst: &RecordType,
    decisions: Vec<MappingDecision>,
  ) -> Self {
    let mut source_package_path = src_pkg.location.path();
    if src_pkg.location.same_crate(&dst_pkg.location) {
      source_package_path[0] = "crate".to_string();
    }

    Self {
      source_package: src_pkg.name.clone(),
      source_package_path,
      source_inner: src.inner.clone(),
      source_type: src.name.clone(),
      destination_package: dst_pkg.name.clone(),
      destination_inner: dst.inner.clone(),
      destination_type: dst.name.clone(),
      decisions,
    }
  }

  pub fn constructor_name(&self) -> String {
    format!("new_{}", self.destination_type.to_case(Case::Snake))
  }

  pub fn mapped_count(&self) -> usize {
    self
      .decisions
      .iter()
      .filter(|decision| decision.coercion().is_some())
      .count()
  }
}

/// Renders the constructor module. The text still has to go through
/// [`format_source`](crate::format_source).
pub fn emit(spec: &ConstructorSpec, invocation: &[String]) -> String {
  let mut buf = String::new();
  buf.push_str(&format!(
    "// Code generated by \"repacker {}\"; DO NOT EDIT.\n\n",
    invocation.join(" ")
  ));
  buf.push_str(&constructor_tokens(spec).to_string());
  buf.push('\n');
  buf
}

fn constructor_tokens(spec: &ConstructorSpec) -> TokenStream {
  let package_doc = format!(" Constructors for the `{}` package.", spec.destination_package);

  let dst_ident = format_ident!("{}", spec.destination_type);
  let dst_inner = idents(&spec.destination_inner);

  // `use crate::model;` then `model::User`, like a package qualifier
  let (src_use, src_base) = match spec.source_package_path.split_last() {
    Some((last, parents)) if !parents.is_empty() => {
      let path = path_tokens(&spec.source_package_path);
      (quote!(use #path;), format_ident!("{}", last))
    }
    _ => (quote!(), format_ident!("{}", spec.source_package_path[0])),
  };
  let src_inner = idents(&spec.source_inner);
  let src_ident = format_ident!("{}", spec.source_type);

  let fn_ident = format_ident!("{}", spec.constructor_name());
  let fn_doc = format!(
    " `{}` creates `{}` from `{}::{}`.",
    spec.constructor_name(),
    spec.destination_type,
    spec.source_package,
    spec.source_type
  );

  let mut complete = true;
  let assign_items: Vec<_> = spec
    .decisions
    .iter()
    .filter_map(|decision| {
      let destination = &decision.destination;
      match decision.outcome {
        Outcome::Mapped {
          ref source,
          coercion,
        } => {
          let field = format_ident!("{}", destination.name);
          let value = expand_value(coercion, &format_ident!("{}", source.name));
          Some(quote! {
            #field : #value
          })
        }
        Outcome::Skipped { ref source, reason } => {
          complete = false;
          match (reason, source) {
            (SkipReason::TypeMismatch, Some(source)) => warn!(
              field = %destination.name,
              source_field = %source.name,
              source_type = %source.ty,
              destination_type = %destination.ty,
              "skip field due to different types"
            ),
            _ => debug!(field = %destination.name, %reason, "skip field"),
          }
          None
        }
      }
    })
    .collect();

  let rest = if complete {
    quote!()
  } else {
    quote!(..Default::default())
  };

  quote! {
    #![doc = #package_doc]

    use serde_json;
    use super #(:: #dst_inner)* :: #dst_ident;
    #src_use

    #[doc = #fn_doc]
    pub fn #fn_ident(s: &#src_base #(:: #src_inner)* :: #src_ident) -> Box<#dst_ident> {
      Box::new(#dst_ident {
        #(#assign_items,)*
        #rest
      })
    }
  }
}

fn expand_value(coercion: Coercion, field: &Ident) -> TokenStream {
  match coercion {
    Coercion::None => quote! {
      s.#field.clone()
    },
    Coercion::StringFormat => quote! {
      format!("{}", s.#field)
    },
  }
}

fn idents(segments: &[String]) -> Vec<Ident> {
  segments
    .iter()
    .map(|segment| format_ident!("{}", segment))
    .collect()
}

fn path_tokens(segments: &[String]) -> TokenStream {
  let idents = idents(segments);
  let (first, rest) = match idents.split_first() {
    Some(split) => split,
    None => return quote!(),
  };
  quote!(#first #(:: #rest)*)
}

#[cfg(test)]
fn decision(name: &str, source: Option<&str>, outcome: Option<Coercion>, ty: &str) -> MappingDecision {
  use crate::types::{FieldDescriptor, TypeRef};
  let field = |name: &str, ty: &str| FieldDescriptor {
    name: name.to_string(),
    ty: TypeRef::new(syn::parse_str(ty).unwrap()),
    raw_tag: String::new(),
  };
  let destination = field(name, ty);
  let outcome = match (source, outcome) {
    (Some(source), Some(coercion)) => Outcome::Mapped {
      source: field(source, ty),
      coercion,
    },
    (Some(source), None) => Outcome::Skipped {
      source: Some(field(source, "u8")),
      reason: SkipReason::TypeMismatch,
    },
    (None, _) => Outcome::Skipped {
      source: None,
      reason: SkipReason::NoMatchingField,
    },
  };
  MappingDecision {
    destination,
    outcome,
  }
}

#[cfg(test)]
fn spec(decisions: Vec<MappingDecision>) -> ConstructorSpec {
  ConstructorSpec {
    source_package: "model".to_string(),
    source_package_path: vec!["crate".to_string(), "model".to_string()],
    source_inner: vec!["user".to_string()],
    source_type: "User".to_string(),
    destination_package: "view".to_string(),
    destination_inner: vec![],
    destination_type: "UserView".to_string(),
    decisions,
  }
}

#[cfg(test)]
fn compact(tokens: &str) -> String {
  tokens.split_whitespace().collect()
}

#[test]
fn test_emit_banner_and_preamble() {
  let invocation = vec!["--srcdir".to_string(), "../model".to_string()];
  let text = emit(&spec(vec![]), &invocation);
  assert!(text.starts_with("// Code generated by \"repacker --srcdir ../model\"; DO NOT EDIT.\n\n"));

  let body = compact(&text);
  assert!(body.contains("useserde_json;"));
  assert!(body.contains("usesuper::UserView;"));
  assert!(body.contains("usecrate::model;"));
  assert!(body.contains("pubfnnew_user_view(s:&model::user::User)->Box<UserView>"));
}

#[test]
fn test_emit_assignments() {
  let text = emit(
    &spec(vec![
      decision("name", Some("name"), Some(Coercion::None), "String"),
      decision("age", Some("age"), Some(Coercion::StringFormat), "String"),
    ]),
    &[],
  );
  let body = compact(&text);
  assert!(body.contains("name:s.name.clone(),"));
  assert!(body.contains("age:format!(\"{}\",s.age),"));
  assert!(!body.contains("Default::default()"));
}

#[test]
fn test_emit_skipped_fields() {
  let text = emit(
    &spec(vec![
      decision("id", Some("user_id"), Some(Coercion::None), "u64"),
      decision("nickname", None, None, "String"),
      decision("score", Some("score"), None, "i64"),
    ]),
    &[],
  );
  let body = compact(&text);
  assert!(body.contains("id:s.user_id.clone(),"));
  assert!(!body.contains("nickname:"));
  assert!(!body.contains("score:"));
  assert!(body.contains("..Default::default()"));
}

#[test]
fn test_emit_crate_root_source() {
  let mut spec = spec(vec![]);
  spec.source_package_path = vec!["other_crate".to_string()];
  spec.source_inner = vec![];
  spec.destination_inner = vec!["views".to_string()];
  let body = compact(&emit(&spec, &[]));
  assert!(!body.contains("useother_crate"));
  assert!(body.contains("s:&other_crate::User"));
  assert!(body.contains("usesuper::views::UserView;"));
}

#[test]
fn test_constructor_name() {
  assert_eq!(spec(vec![]).constructor_name(), "new_user_view");
}

#[cfg(test)]
#[derive(Clone, Default)]
struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl std::io::Write for CapturedLogs {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

#[test]
fn test_emit_reports_type_mismatch() {
  let logs = CapturedLogs::default();
  let writer = logs.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_writer(move || writer.clone())
    .with_ansi(false)
    .finish();

  let text = tracing::subscriber::with_default(subscriber, || {
    emit(&spec(vec![decision("score", Some("points"), None, "i64")]), &[])
  });
  assert!(!compact(&text).contains("score:"));

  let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
  assert!(logs.contains("skip field due to different types"));
  assert!(logs.contains("score"));
  assert!(logs.contains("points"));
}
