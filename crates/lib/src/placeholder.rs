//! Placeholder parsing and substitution for property references.
//!
//! Attribute values, conditions and property definitions may refer to
//! properties with `${name}`. This module splits such strings into literal
//! and reference segments and substitutes bound values.
//!
//! # Escaping
//!
//! `$$` produces a single literal `$`. A `$` followed by anything other than
//! `{` or `$` passes through unchanged, so shell variables like `$HOME` work
//! without escaping.
//!
//! # Example
//!
//! ```
//! use anvil_lib::placeholder::{parse, Segment};
//!
//! let segments = parse("${src.dir}/main.c:$HOME").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Property("src.dir".to_string()),
//!     Segment::Literal("/main.c:$HOME".to_string()),
//! ]);
//! ```

use thiserror::Error;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text, escapes already applied.
  Literal(String),

  /// A `${name}` reference.
  Property(String),
}

/// Errors that can occur during placeholder parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed property reference at position {position} in '{text}'")]
  Unclosed { position: usize, text: String },
}

/// Looks up the current value of a property.
pub trait Lookup {
  fn lookup(&self, name: &str) -> Option<String>;
}

impl<F> Lookup for F
where
  F: Fn(&str) -> Option<String>,
{
  fn lookup(&self, name: &str) -> Option<String> {
    self(name)
  }
}

/// Parse a string containing `${name}` references into segments.
///
/// Adjacent literal text is merged into a single segment.
///
/// # Errors
///
/// Returns [`PlaceholderError::Unclosed`] if a `${` has no matching `}`.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();
        literal.push('$');
      }
      Some((_, '{')) => {
        chars.next();

        let mut name = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          name.push(c);
        }

        if !found_close {
          return Err(PlaceholderError::Unclosed {
            position: pos,
            text: input.to_string(),
          });
        }

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Property(name));
      }
      // lone `$`, including a trailing one
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Substitute every bound reference in `input`.
///
/// References the lookup cannot satisfy are left verbatim as `${name}`.
pub fn substitute(input: &str, lookup: &impl Lookup) -> Result<String, PlaceholderError> {
  // fast path: nothing to parse
  if !input.contains('$') {
    return Ok(input.to_string());
  }

  let mut out = String::with_capacity(input.len());
  for segment in parse(input)? {
    match segment {
      Segment::Literal(text) => out.push_str(&text),
      Segment::Property(name) => match lookup.lookup(&name) {
        Some(value) => out.push_str(&value),
        None => {
          out.push_str("${");
          out.push_str(&name);
          out.push('}');
        }
      },
    }
  }
  Ok(out)
}

/// Names referenced by `input`, in order of appearance (duplicates kept).
pub fn references(input: &str) -> Result<Vec<String>, PlaceholderError> {
  Ok(
    parse(input)?
      .into_iter()
      .filter_map(|segment| match segment {
        Segment::Property(name) => Some(name),
        Segment::Literal(_) => None,
      })
      .collect(),
  )
}

/// Escape `$` so that `text` survives another round of parsing unchanged.
pub fn escape(text: &str) -> String {
  text.replace('$', "$$")
}
