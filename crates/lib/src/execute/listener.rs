//! Build events and listeners.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use super::types::TargetStatus;

/// Priority of a logged message, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
  Error,
  Warning,
  Info,
  Verbose,
  Debug,
}

impl MessageLevel {
  pub const NAMES: &'static [&'static str] = &["error", "warning", "info", "verbose", "debug"];

  pub fn from_name(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "error" => Some(MessageLevel::Error),
      "warning" | "warn" => Some(MessageLevel::Warning),
      "info" => Some(MessageLevel::Info),
      "verbose" => Some(MessageLevel::Verbose),
      "debug" => Some(MessageLevel::Debug),
      _ => None,
    }
  }
}

/// Something observable that happened during a build.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
  BuildStarted {
    project: String,
    targets: Vec<String>,
  },
  BuildFinished {
    success: bool,
    error: Option<String>,
    duration: Duration,
  },
  TargetStarted {
    target: String,
  },
  TargetFinished {
    target: String,
    status: TargetStatus,
  },
  StepStarted {
    target: String,
    step: String,
  },
  StepFinished {
    target: String,
    step: String,
    error: Option<String>,
  },
  MessageLogged {
    target: Option<String>,
    step: Option<String>,
    level: MessageLevel,
    message: String,
  },
}

/// Receives build events.
///
/// With parallel execution events arrive from several threads; events of one
/// target are still delivered in order.
pub trait BuildListener: Send + Sync {
  fn on_event(&self, event: &BuildEvent);
}

/// Forwards build events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingListener;

impl BuildListener for TracingListener {
  fn on_event(&self, event: &BuildEvent) {
    match event {
      BuildEvent::BuildStarted { project, targets } => info!(project = %project, ?targets, "build started"),
      BuildEvent::BuildFinished {
        success,
        error,
        duration,
      } => {
        if *success {
          info!(?duration, "build finished");
        } else {
          error!(?duration, error = error.as_deref().unwrap_or("unknown"), "build failed");
        }
      }
      BuildEvent::TargetStarted { target } => debug!(target_name = %target, "target started"),
      BuildEvent::TargetFinished { target, status } => debug!(target_name = %target, ?status, "target finished"),
      BuildEvent::StepStarted { target, step } => trace!(target_name = %target, step = %step, "step started"),
      BuildEvent::StepFinished { target, step, error } => match error {
        Some(error) => warn!(target_name = %target, step = %step, error = %error, "step failed"),
        None => trace!(target_name = %target, step = %step, "step finished"),
      },
      BuildEvent::MessageLogged { step, level, message, .. } => {
        let step = step.as_deref().unwrap_or("");
        match level {
          MessageLevel::Error => error!(step, "{message}"),
          MessageLevel::Warning => warn!(step, "{message}"),
          MessageLevel::Info => info!(step, "{message}"),
          MessageLevel::Verbose => debug!(step, "{message}"),
          MessageLevel::Debug => trace!(step, "{message}"),
        }
      }
    }
  }
}
