//! CLI output formatting utilities.
//!
//! Status lines in the build's tone (success, failure, warning, note),
//! aligned `label: value` statistics and JSON output.

use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream, Style};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const FAILURE: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const NOTE: &str = "•";
  pub const ARROW: &str = "→";
}

/// Kind of a status line; decides symbol, colour and stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
  Success,
  Failure,
  Warning,
  Note,
}

impl Tone {
  fn symbol(self) -> &'static str {
    match self {
      Tone::Success => symbols::SUCCESS,
      Tone::Failure => symbols::FAILURE,
      Tone::Warning => symbols::WARNING,
      Tone::Note => symbols::NOTE,
    }
  }

  fn style(self) -> Style {
    match self {
      Tone::Success => Style::new().green().bold(),
      Tone::Failure => Style::new().red().bold(),
      Tone::Warning => Style::new().yellow(),
      Tone::Note => Style::new().blue(),
    }
  }

  /// Failures and warnings go to stderr.
  fn stream(self) -> Stream {
    match self {
      Tone::Failure | Tone::Warning => Stream::Stderr,
      Tone::Success | Tone::Note => Stream::Stdout,
    }
  }
}

/// Print `message` prefixed by the tone's symbol.
///
/// Notes colour only the symbol so long paths stay readable.
pub fn status(tone: Tone, message: &str) {
  let stream = tone.stream();
  let style = tone.style();
  let symbol = tone.symbol();
  let symbol = symbol.if_supports_color(stream, |s| s.style(style));
  let line = if tone == Tone::Note {
    format!("{symbol} {message}")
  } else {
    format!("{symbol} {}", message.if_supports_color(stream, |s| s.style(style)))
  };
  match stream {
    Stream::Stderr => eprintln!("{line}"),
    _ => println!("{line}"),
  }
}

pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}

/// Elapsed build time in words: `1 minute 5 seconds`, `3 seconds`, `250 ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
  fn plural(n: u64, unit: &str) -> String {
    if n == 1 { format!("1 {unit}") } else { format!("{n} {unit}s") }
  }

  let secs = elapsed.as_secs();
  match (secs / 60, secs % 60) {
    (0, 0) => format!("{} ms", elapsed.subsec_millis()),
    (0, s) => plural(s, "second"),
    (m, s) => format!("{} {}", plural(m, "minute"), plural(s, "second")),
  }
}

/// Display name of a target; the implicit target has none.
pub fn target_label(name: &str) -> &str {
  if name.is_empty() { "(top-level steps)" } else { name }
}
