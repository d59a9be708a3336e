//! Field annotation parsing.
//!
//! A raw tag is a space separated list of `key:"value"` entries, e.g.
//! `json:"user_id,omitempty" repack:"id"`. Only the `repack` key takes part
//! in field matching.

use thiserror::Error;

pub const REPACK_KEY: &str = "repack";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
  #[error("Invalid tag key")]
  InvalidKey,
  #[error("Expected a quoted value")]
  MissingQuote,
  #[error("Unclosed tag value")]
  UnclosedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry<'a> {
  pub key: &'a str,
  pub value: Option<&'a str>,
}

/// The entries of a raw field tag, in declaration order.
///
/// Lexing stops at the first malformed entry; everything before it is kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag<'a> {
  entries: Vec<TagEntry<'a>>,
}

impl<'a> Tag<'a> {
  pub fn parse(raw: &'a str) -> Self {
    Self {
      entries: Lexer::new(raw).map_while(Result::ok).collect(),
    }
  }

  pub fn entries(&self) -> &[TagEntry<'a>] {
    &self.entries
  }

  /// Value of the first entry named `key` that carries a quoted value.
  ///
  /// `None` means "not found", which is different from `Some("")`.
  pub fn lookup(&self, key: &str) -> Option<&'a str> {
    self
      .entries
      .iter()
      .find(|entry| entry.key == key && entry.value.is_some())
      .and_then(|entry| entry.value)
  }

  pub fn repack(&self) -> Option<NormalizedTag> {
    self.lookup(REPACK_KEY).map(NormalizedTag::from_value)
  }
}

/// The `repack` value split into its matching key and qualifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTag {
  pub key: String,
  // Captured for later policies; matching only looks at `key`.
  pub options: Vec<String>,
}

impl NormalizedTag {
  fn from_value(value: &str) -> Self {
    let mut parts = value.split(',');
    let key = parts.next().unwrap_or_default().to_string();
    let options = parts
      .filter(|option| !option.is_empty())
      .map(str::to_string)
      .collect();
    Self { key, options }
  }
}

fn is_tag_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, ',' | '_' | '=' | '&' | '(' | ')' | '-')
}

struct Lexer<'a> {
  src: &'a str,
  err: Option<LexError>,
}

impl<'a> Lexer<'a> {
  fn new(src: &'a str) -> Self {
    Self { src, err: None }
  }

  fn take_chars(&mut self) -> &'a str {
    let end = self
      .src
      .find(|c: char| !is_tag_char(c))
      .unwrap_or(self.src.len());
    let (chars, rest) = self.src.split_at(end);
    self.src = rest;
    chars
  }

  fn parse_entry(&mut self) -> Result<TagEntry<'a>, LexError> {
    let key = self.take_chars();
    if key.is_empty() {
      return Err(LexError::InvalidKey);
    }

    let rest = match self.src.strip_prefix(':') {
      Some(rest) => rest,
      None => {
        if self.src.is_empty() || self.src.starts_with(char::is_whitespace) {
          return Ok(TagEntry { key, value: None });
        }
        return Err(LexError::InvalidKey);
      }
    };

    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    self.src = rest.strip_prefix('"').ok_or(LexError::MissingQuote)?;
    let value = self.take_chars();
    self.src = self.src.strip_prefix('"').ok_or(LexError::UnclosedValue)?;
    Ok(TagEntry {
      key,
      value: Some(value),
    })
  }
}

impl<'a> Iterator for Lexer<'a> {
  type Item = Result<TagEntry<'a>, LexError>;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(ref err) = self.err {
      return Some(Err(err.clone()));
    }

    self.src = self.src.trim_start();
    if self.src.is_empty() {
      return None;
    }

    Some(self.parse_entry().map_err(|err| {
      self.err = Some(err.clone());
      err
    }))
  }
}

#[test]
fn test_lookup_repack() {
  let tag = Tag::parse(r#"json:"user_id,omitempty" repack:"id""#);
  assert_eq!(tag.lookup("json"), Some("user_id,omitempty"));
  assert_eq!(tag.lookup("repack"), Some("id"));
  assert_eq!(tag.lookup("yaml"), None);
}

#[test]
fn test_found_but_empty() {
  let tag = Tag::parse(r#"repack:"""#);
  assert_eq!(tag.lookup("repack"), Some(""));
  assert_eq!(Tag::parse("").lookup("repack"), None);
}

#[test]
fn test_space_after_colon() {
  let tag = Tag::parse(r#"repack: "id""#);
  assert_eq!(tag.lookup("repack"), Some("id"));
}

#[test]
fn test_bare_key_is_not_found() {
  let tag = Tag::parse(r#"repack skip json:"name""#);
  assert_eq!(tag.lookup("repack"), None);
  assert_eq!(tag.lookup("json"), Some("name"));
  assert_eq!(tag.entries().len(), 3);
}

#[test]
fn test_stops_at_malformed_entry() {
  let tag = Tag::parse(r#"json:"name" repack:"a.b" yaml:"x""#);
  assert_eq!(tag.lookup("json"), Some("name"));
  assert_eq!(tag.lookup("repack"), None);
  assert_eq!(tag.lookup("yaml"), None);

  let tag = Tag::parse(r#"repack:"id"#);
  assert_eq!(tag.lookup("repack"), None);
}

#[test]
fn test_lexer_error_is_sticky() {
  let mut lexer = Lexer::new("a:b c:\"d\"");
  assert_eq!(lexer.next(), Some(Err(LexError::MissingQuote)));
  assert_eq!(lexer.next(), Some(Err(LexError::MissingQuote)));
}

#[test]
fn test_normalized_options() {
  let tag = Tag::parse(r#"repack:"id,omitempty,string""#).repack().unwrap();
  assert_eq!(tag.key, "id");
  assert_eq!(tag.options, vec!["omitempty".to_string(), "string".to_string()]);

  let tag = Tag::parse(r#"repack:",omitempty""#).repack().unwrap();
  assert_eq!(tag.key, "");
  assert_eq!(tag.options, vec!["omitempty".to_string()]);
}
