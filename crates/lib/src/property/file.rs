//! Reader for `.properties` files.

use std::path::Path;

use super::PropertyError;

/// Read and parse a properties file.
pub fn read_properties(path: &Path) -> Result<Vec<(String, String)>, PropertyError> {
  let text = std::fs::read_to_string(path).map_err(|source| PropertyError::ReadFile {
    path: path.to_path_buf(),
    source,
  })?;
  parse_properties(&text).map_err(|(line, message)| PropertyError::Malformed {
    path: path.to_path_buf(),
    line,
    message,
  })
}

/// Parse properties text into ordered `(key, value)` pairs.
///
/// Supports `key=value`, `key: value` and `key value` separators, `#` and `!`
/// comments, backslash line continuation and the usual escapes including
/// `\uXXXX`. On error returns the 1-based line number and a message.
pub fn parse_properties(text: &str) -> Result<Vec<(String, String)>, (usize, String)> {
  let mut entries = Vec::new();
  let mut lines = text.lines().enumerate();

  while let Some((index, line)) = lines.next() {
    let start_line = index + 1;
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
      continue;
    }

    let mut logical = String::from(trimmed);
    while ends_with_continuation(&logical) {
      logical.pop();
      match lines.next() {
        Some((_, next)) => logical.push_str(next.trim_start()),
        None => break,
      }
    }

    let (key, value) = split_entry(&logical);
    let key = unescape(key).map_err(|m| (start_line, m))?;
    let value = unescape(value).map_err(|m| (start_line, m))?;
    entries.push((key, value));
  }

  Ok(entries)
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
  line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
  let mut escaped = false;
  let mut key_end = line.len();
  for (i, c) in line.char_indices() {
    if escaped {
      escaped = false;
      continue;
    }
    match c {
      '\\' => escaped = true,
      '=' | ':' | ' ' | '\t' | '\u{c}' => {
        key_end = i;
        break;
      }
      _ => {}
    }
  }

  let key = &line[..key_end];
  let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
  if let Some(stripped) = rest.strip_prefix(['=', ':']) {
    rest = stripped.trim_start_matches([' ', '\t', '\u{c}']);
  }
  (key, rest)
}

fn unescape(text: &str) -> Result<String, String> {
  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('t') => out.push('\t'),
      Some('n') => out.push('\n'),
      Some('r') => out.push('\r'),
      Some('f') => out.push('\u{c}'),
      Some('u') => {
        let hex: String = chars.by_ref().take(4).collect();
        let code = u32::from_str_radix(&hex, 16)
          .ok()
          .filter(|_| hex.len() == 4)
          .and_then(char::from_u32)
          .ok_or_else(|| format!("invalid unicode escape '\\u{hex}'"))?;
        out.push(code);
      }
      Some(other) => out.push(other),
      None => {}
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn parses_all_separator_styles() {
    let text = "a=1\nb: 2\nc 3\nd = spaced value\n";
    assert_eq!(
      parse_properties(text).unwrap(),
      pairs(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "spaced value")])
    );
  }

  #[test]
  fn skips_comments_and_blank_lines() {
    let text = "# comment\n! also comment\n\n   \nkey=value\n";
    assert_eq!(parse_properties(text).unwrap(), pairs(&[("key", "value")]));
  }

  #[test]
  fn joins_continuation_lines() {
    let text = "list=one, \\\n    two, \\\n    three\nnext=x\n";
    assert_eq!(
      parse_properties(text).unwrap(),
      pairs(&[("list", "one, two, three"), ("next", "x")])
    );
  }

  #[test]
  fn even_backslashes_do_not_continue() {
    let text = "path=c:\\\\\nother=1\n";
    assert_eq!(parse_properties(text).unwrap(), pairs(&[("path", "c:\\"), ("other", "1")]));
  }

  #[test]
  fn handles_escapes_in_keys_and_values() {
    let text = "my\\ key=tab\\there\nsnow=\\u2603\n";
    assert_eq!(
      parse_properties(text).unwrap(),
      pairs(&[("my key", "tab\there"), ("snow", "\u{2603}")])
    );
  }

  #[test]
  fn keeps_placeholders_untouched() {
    let text = "dist=${build}/dist\n";
    assert_eq!(parse_properties(text).unwrap(), pairs(&[("dist", "${build}/dist")]));
  }

  #[test]
  fn rejects_bad_unicode_escape() {
    let err = parse_properties("ok=1\nbad=\\u12\n").unwrap_err();
    assert_eq!(err.0, 2);
  }

  #[test]
  fn key_without_value_is_empty() {
    assert_eq!(parse_properties("lonely\n").unwrap(), pairs(&[("lonely", "")]));
  }

  #[test]
  fn read_missing_file_reports_path() {
    let err = read_properties(Path::new("/definitely/not/here.properties")).unwrap_err();
    assert!(err.to_string().contains("here.properties"));
  }
}
