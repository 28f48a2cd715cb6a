//! Console rendering of build events.

use owo_colors::{OwoColorize, Stream};

use anvil_lib::execute::listener::{BuildEvent, BuildListener, MessageLevel};
use anvil_lib::project::IMPLICIT_TARGET;

/// Width of the right-aligned `[step]` column.
const STEP_COLUMN: usize = 12;

/// Prints `target:` headers and `[step] message` lines for messages at or
/// above `threshold`.
#[derive(Debug)]
pub struct ConsoleListener {
  threshold: MessageLevel,
}

impl ConsoleListener {
  pub fn new(threshold: MessageLevel) -> Self {
    Self { threshold }
  }
}

/// `[step] message`, right-aligned like a classic build log.
pub fn format_message(step: Option<&str>, message: &str) -> String {
  match step {
    Some(step) => format!("{:>width$} {message}", format!("[{step}]"), width = STEP_COLUMN),
    None => message.to_string(),
  }
}

impl BuildListener for ConsoleListener {
  fn on_event(&self, event: &BuildEvent) {
    match event {
      BuildEvent::TargetStarted { target } if target != IMPLICIT_TARGET && self.threshold >= MessageLevel::Info => {
        println!();
        println!("{}:", target.if_supports_color(Stream::Stdout, |s| s.bold()));
      }
      BuildEvent::MessageLogged {
        step, level, message, ..
      } if *level <= self.threshold => {
        for line in message.lines() {
          let text = format_message(step.as_deref(), line);
          match level {
            MessageLevel::Error => eprintln!("{}", text.if_supports_color(Stream::Stderr, |s| s.red())),
            MessageLevel::Warning => println!("{}", text.if_supports_color(Stream::Stdout, |s| s.yellow())),
            MessageLevel::Info => println!("{text}"),
            MessageLevel::Verbose | MessageLevel::Debug => {
              println!("{}", text.if_supports_color(Stream::Stdout, |s| s.dimmed()))
            }
          }
        }
      }
      _ => {}
    }
  }
}
