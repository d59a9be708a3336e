#[cfg(test)]
use repacker::{format_source, generate, Coercion, Config, Error, Generated, SkipReason};

#[cfg(test)]
fn crate_fixture(files: &[(&str, &str)]) -> tempfile::TempDir {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(
    dir.path().join("Cargo.toml"),
    "[package]\nname = \"app\"\nversion = \"0.1.0\"\n",
  )
  .unwrap();
  for (name, text) in files {
    let path = dir.path().join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
  }
  dir
}

#[cfg(test)]
fn run(root: &tempfile::TempDir, src_dir: &str, src_type: &str, dir: &str, dst_type: &str) -> Generated {
  let config = Config {
    dir: root.path().join(dir),
    src_dir: root.path().join(src_dir),
    src_type: src_type.to_string(),
    dst_type: dst_type.to_string(),
    invocation: vec![],
  };
  generate(&config).unwrap()
}

#[cfg(test)]
fn compact(text: &str) -> String {
  text.split_whitespace().collect()
}

#[test]
fn test_name_copy_and_string_format() {
  let root = crate_fixture(&[
    ("src/model/mod.rs", "pub struct User { pub name: String, pub age: i32 }"),
    ("src/view/mod.rs", "pub struct User { pub name: String, pub age: String }"),
  ]);
  let generated = run(&root, "src/model", "User", "src/view", "User");

  let body = compact(&generated.contents);
  assert!(body.contains("pubfnnew_user(s:&model::User)->Box<User>"));
  assert!(body.contains("name:s.name.clone(),"));
  assert!(body.contains("age:format!(\"{}\",s.age),"));
  assert!(!body.contains("Default::default()"));
}

#[test]
fn test_unmatched_destination_keeps_default() {
  let root = crate_fixture(&[
    ("src/model/mod.rs", "pub struct User { pub name: String }"),
    (
      "src/view/mod.rs",
      "#[derive(Default)]\npub struct Profile { pub name: String, pub nickname: String }",
    ),
  ]);
  let generated = run(&root, "src/model", "User", "src/view", "Profile");

  assert!(!generated.contents.contains("nickname"));
  assert!(generated.contents.contains("..Default::default()"));
  let nickname = &generated.spec.decisions[1];
  assert_eq!(nickname.skipped_reason(), Some(SkipReason::NoMatchingField));
}

#[test]
fn test_tag_match_across_names() {
  let root = crate_fixture(&[
    (
      "src/model/mod.rs",
      r#"pub struct Order { #[tag = "json:\"order_id\" repack:\"id\""] pub order_id: u64 }"#,
    ),
    (
      "src/view/mod.rs",
      r#"pub struct OrderView { #[tag = "repack:\"id\""] pub id: u64 }"#,
    ),
  ]);
  let generated = run(&root, "src/model", "Order", "src/view", "OrderView");
  assert!(compact(&generated.contents).contains("id:s.order_id.clone(),"));
}

#[test]
fn test_type_mismatch_is_omitted() {
  let root = crate_fixture(&[
    ("src/model/mod.rs", "pub struct Item { pub count: u32, pub price: f64 }"),
    ("src/view/mod.rs", "#[derive(Default)]\npub struct ItemView { pub count: u64, pub price: f64 }"),
  ]);
  let generated = run(&root, "src/model", "Item", "src/view", "ItemView");

  let body = compact(&generated.contents);
  assert!(!body.contains("count:"));
  assert!(body.contains("price:s.price.clone(),"));
  let count = &generated.spec.decisions[0];
  assert_eq!(count.skipped_reason(), Some(SkipReason::TypeMismatch));
  assert_eq!(count.source().unwrap().name, "count");
}

#[test]
fn test_first_declared_source_wins() {
  let root = crate_fixture(&[
    (
      "src/model/mod.rs",
      r#"pub struct Item { #[tag = "repack:\"title\""] pub headline: String, pub title: String }"#,
    ),
    ("src/view/mod.rs", r#"pub struct ItemView { #[tag = "repack:\"title\""] pub title: String }"#),
  ]);
  let generated = run(&root, "src/model", "Item", "src/view", "ItemView");
  assert!(compact(&generated.contents).contains("title:s.headline.clone(),"));
}

#[test]
fn test_one_source_feeds_many() {
  let root = crate_fixture(&[
    ("src/model/mod.rs", r#"pub struct User { #[tag = "repack:\"label\""] pub name: String }"#),
    (
      "src/view/mod.rs",
      r#"pub struct Card { pub name: String, #[tag = "repack:\"label\""] pub title: String }"#,
    ),
  ]);
  let generated = run(&root, "src/model", "User", "src/view", "Card");

  let body = compact(&generated.contents);
  assert!(body.contains("name:s.name.clone(),"));
  assert!(body.contains("title:s.name.clone(),"));
  assert_eq!(generated.spec.mapped_count(), 2);
}

#[test]
fn test_resolved_types_compare_by_path() {
  let root = crate_fixture(&[
    ("src/common.rs", "pub struct Money { pub cents: i64 }"),
    (
      "src/model/mod.rs",
      "use crate::common::Money;\npub struct Invoice { pub total: Money, pub tax: Money }",
    ),
    (
      "src/view/invoice.rs",
      "use crate::common;\n#[derive(Default)]\npub struct InvoiceView { pub total: common::Money, pub tax: Money }\n#[derive(Default)]\npub struct Money;",
    ),
  ]);
  let generated = run(&root, "src/model", "Invoice", "src/view", "InvoiceView");

  let body = compact(&generated.contents);
  assert!(body.contains("usesuper::invoice::InvoiceView;"));
  assert!(body.contains("total:s.total.clone(),"));
  assert!(!body.contains("tax:"));
}

#[test]
fn test_source_in_other_crate() {
  let root = tempfile::tempdir().unwrap();
  let files = [
    ("domain/Cargo.toml", "[package]\nname = \"shop-domain\"\nversion = \"0.1.0\"\n"),
    ("domain/src/orders/line.rs", "pub struct Line { pub sku: String, pub qty: u32 }"),
    ("api/Cargo.toml", "[package]\nname = \"shop-api\"\nversion = \"0.1.0\"\n"),
    ("api/src/dto/mod.rs", "pub struct LineDto { pub sku: String, pub qty: String }"),
  ];
  for (name, text) in files.iter() {
    let path = root.path().join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
  }

  let generated = run(&root, "domain/src/orders", "Line", "api/src/dto", "LineDto");
  let body = compact(&generated.contents);
  assert!(body.contains("useshop_domain::orders;"));
  assert!(body.contains("s:&orders::line::Line"));
  assert_eq!(generated.spec.decisions[1].coercion(), Some(Coercion::StringFormat));
}

#[test]
fn test_output_is_stable_under_formatting() {
  let root = crate_fixture(&[
    ("src/model/mod.rs", "pub struct User { pub name: String, pub age: i32 }"),
    ("src/view/mod.rs", "#[derive(Default)]\npub struct UserView { pub name: String, pub email: String }"),
  ]);
  let generated = run(&root, "src/model", "User", "src/view", "UserView");
  assert_eq!(format_source(&generated.contents).unwrap(), generated.contents);
}

#[test]
fn test_previous_output_is_not_reloaded() {
  let root = crate_fixture(&[
    ("src/model/mod.rs", "pub struct User { pub name: String }"),
    ("src/view/mod.rs", "pub struct UserView { pub name: String }"),
  ]);
  let first = run(&root, "src/model", "User", "src/view", "UserView");
  first.write().unwrap();

  let second = run(&root, "src/model", "User", "src/view", "UserView");
  assert_eq!(first.contents, second.contents);
}

#[test]
fn test_check_failure_writes_nothing() {
  let root = crate_fixture(&[
    ("src/model/mod.rs", "pub struct User { pub name: Name }"),
    ("src/view/mod.rs", "pub struct UserView { pub name: String }"),
  ]);
  let config = Config {
    dir: root.path().join("src/view"),
    src_dir: root.path().join("src/model"),
    src_type: "User".to_string(),
    dst_type: "UserView".to_string(),
    invocation: vec![],
  };
  assert!(matches!(generate(&config), Err(Error::Check { .. })));
  assert!(!root.path().join("src/view/userview_repack.rs").exists());
}

#[test]
fn test_tagged_package_builds() {
  let derive_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../repacker-derive");
  let manifest = format!(
    "[package]\nname = \"shop\"\nversion = \"0.1.0\"\nedition = \"2018\"\n\n[dependencies]\nrepacker-derive = {{ path = {:?} }}\n\n[workspace]\n",
    derive_dir.canonicalize().unwrap()
  );
  let root = tempfile::tempdir().unwrap();
  let files = [
    ("Cargo.toml", manifest.as_str()),
    ("src/lib.rs", "pub mod model;\npub mod view;\n"),
    (
      "src/model/mod.rs",
      "#[derive(repacker_derive::Repack)]\npub struct User {\n  #[tag = \"repack:\\\"id\\\"\"]\n  pub user_id: u64,\n  pub name: String,\n  pub age: i32,\n}\n",
    ),
    (
      "src/view/mod.rs",
      "mod userview_repack;\npub use userview_repack::new_user_view;\n\n#[derive(Default, repacker_derive::Repack)]\npub struct UserView {\n  #[tag = \"repack:\\\"id\\\"\"]\n  pub id: u64,\n  pub name: String,\n  pub age: String,\n  pub nickname: String,\n}\n",
    ),
  ];
  for (name, text) in files.iter() {
    let path = root.path().join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
  }

  let generated = run(&root, "src/model", "User", "src/view", "UserView");
  assert!(compact(&generated.contents).contains("id:s.user_id.clone(),"));
  generated.write().unwrap();

  let cargo = std::env::var_os("CARGO").unwrap_or_else(|| "cargo".into());
  let output = std::process::Command::new(cargo)
    .args(&["build", "--offline", "--quiet"])
    .current_dir(root.path())
    .env("CARGO_TARGET_DIR", root.path().join("target"))
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}
