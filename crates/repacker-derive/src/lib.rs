//! `#[derive(Repack)]` declares `tag` as a helper attribute so that
//! `#[tag = "repack:\"id\""]` annotations compile. The derive expands to
//! nothing; the annotations are only read by the `repacker` generator.

extern crate proc_macro;

use proc_macro::TokenStream;

#[proc_macro_derive(Repack, attributes(tag))]
pub fn derive_repack(_tokens: TokenStream) -> TokenStream {
  TokenStream::new()
}
