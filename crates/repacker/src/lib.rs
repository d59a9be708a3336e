//! # Repacker
//!
//! Generates a constructor that builds one struct from another, copying the
//! fields the two types have in common.
//!
//! A destination field takes the first source field that has the same name,
//! or the same `repack` key in its `#[tag = "..."]` annotation. Fields of the
//! same type are cloned, fields that become a `String` are formatted with
//! `Display`, and anything else is left to `Default`.
//!
//! Structs carrying `#[tag = "..."]` annotations derive [`Repack`], which
//! registers `tag` as a field attribute and generates nothing else:
//!
//! ```
//!   #[derive(repacker::Repack)]
//!   pub struct User {
//!     #[tag = "json:\"user_id\" repack:\"id\""]
//!     pub user_id: u64,
//!   }
//! ```
//!
//! The generated `<dst>_repack.rs` is an ordinary module file; declare it
//! with `mod userview_repack;` next to the destination type.
//!
//! # Example
//! ```no_run
//!   use repacker::{generate, Config};
//!
//!   // src/model/mod.rs:
//!   //   pub struct User { pub name: String, pub age: i32 }
//!   //
//!   // src/view/mod.rs:
//!   //   #[derive(Default)]
//!   //   pub struct UserView { pub name: String, pub age: String, pub nickname: String }
//!   let config = Config {
//!     dir: "src/view".into(),
//!     src_dir: "src/model".into(),
//!     src_type: "User".to_string(),
//!     dst_type: "UserView".to_string(),
//!     invocation: vec![],
//!   };
//!
//!   let generated = generate(&config).unwrap();
//!   // src/view/userview_repack.rs:
//!   //   pub fn new_user_view(s: &model::User) -> Box<UserView> {
//!   //     Box::new(UserView {
//!   //       name: s.name.clone(),
//!   //       age: format!("{}", s.age),
//!   //       ..Default::default()
//!   //     })
//!   //   }
//!   generated.write().unwrap();
//! ```

pub use repacker_codegen::*;
pub use repacker_derive::Repack;
