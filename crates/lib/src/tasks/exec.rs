//! The `exec` step: run an external program.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::component::Configurable;
use crate::configure::Schema;
use crate::step::{Step, StepContext, StepError};

/// Nested `<arg>`: `value` is one argument, `line` is split on whitespace.
#[derive(Debug, Default, Clone)]
pub struct ExecArg {
  parts: Vec<String>,
}

impl Configurable for ExecArg {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<ExecArg>("arg")
        .text("value", |a, v| a.parts.push(v))
        .text("line", |a, v| a.parts.extend(v.split_whitespace().map(str::to_string)))
        .path("path", |a, v| a.parts.push(v.display().to_string()))
        .shareable()
        .build()
    });
    &SCHEMA
  }
}

/// Nested `<env key="..." value="..."/>`.
#[derive(Debug, Default, Clone)]
pub struct ExecEnv {
  key: Option<String>,
  value: Option<String>,
}

impl Configurable for ExecEnv {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<ExecEnv>("env")
        .text("key", |e, v| e.key = Some(v))
        .text("value", |e, v| e.value = Some(v))
        .path("path", |e, v| e.value = Some(v.display().to_string()))
        .shareable()
        .build()
    });
    &SCHEMA
  }
}

#[derive(Debug)]
pub struct Exec {
  executable: Option<String>,
  dir: Option<PathBuf>,
  fail_on_error: bool,
  output_property: Option<String>,
  result_property: Option<String>,
  timeout: Option<Duration>,
  args: Vec<ExecArg>,
  env: Vec<ExecEnv>,
}

impl Default for Exec {
  fn default() -> Self {
    Self {
      executable: None,
      dir: None,
      fail_on_error: true,
      output_property: None,
      result_property: None,
      timeout: None,
      args: Vec::new(),
      env: Vec::new(),
    }
  }
}

impl Configurable for Exec {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Exec>("exec")
        .text("executable", |e, v| e.executable = Some(v))
        .path("dir", |e, v| e.dir = Some(v))
        .boolean("failonerror", |e, v| e.fail_on_error = v)
        .text("outputproperty", |e, v| e.output_property = Some(v))
        .text("resultproperty", |e, v| e.result_property = Some(v))
        .custom::<Duration>("timeout", |e, v| e.timeout = Some(v))
        .creator("arg", |e| {
          e.args.push(ExecArg::default());
          let last = e.args.len() - 1;
          &mut e.args[last]
        })
        .element_of::<ExecEnv>("env", |e, env| e.env.push(env))
        .build()
    });
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Exec {
  fn command(&self, ctx: &StepContext<'_>) -> Result<Command, StepError> {
    let executable = self
      .executable
      .as_deref()
      .filter(|e| !e.trim().is_empty())
      .ok_or_else(|| StepError::fatal("no executable specified"))?;

    let working_dir = match &self.dir {
      Some(dir) => ctx.resolve_path(dir),
      None => ctx.base_dir().to_path_buf(),
    };

    let mut command = Command::new(executable);
    command
      .args(self.args.iter().flat_map(|a| a.parts.iter()))
      .current_dir(&working_dir)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    for env in &self.env {
      let key = env
        .key
        .as_deref()
        .ok_or_else(|| StepError::fatal("<env> requires a 'key' attribute"))?;
      command.env(key, env.value.as_deref().unwrap_or_default());
    }

    debug!(executable = %executable, working_dir = ?working_dir, "spawning process");
    Ok(command)
  }

  /// Run the process to completion on a private current-thread runtime.
  fn run(&self, mut command: Command) -> Result<Output, StepError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .map_err(|e| StepError::io("cannot start process runtime", e))?;

    let timeout = self.timeout;
    runtime.block_on(async move {
      let output = command.output();
      let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, output).await {
          Ok(result) => result,
          Err(_) => {
            return Err(StepError::fatal(format!(
              "Timeout: killed the sub-process after {}",
              humantime::format_duration(limit)
            )));
          }
        },
        None => output.await,
      };
      result.map_err(|e| StepError::fatal_with(format!("Execute failed: {e}"), e))
    })
  }
}

impl Step for Exec {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    let command = self.command(ctx)?;
    info!(executable = ?self.executable, "executing command");
    let output = self.run(command)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    match &self.output_property {
      Some(name) => {
        ctx.properties().set(name.as_str(), stdout.trim_end());
      }
      None => {
        for line in stdout.lines() {
          ctx.info(line);
        }
      }
    }
    for line in stderr.lines() {
      ctx.warn(line);
    }

    // -1 when terminated by a signal
    let code = output.status.code().unwrap_or(-1);
    if let Some(name) = &self.result_property {
      ctx.properties().set(name.as_str(), code.to_string());
    }

    if output.status.success() {
      return Ok(());
    }
    let message = format!("exec returned: {code}");
    if self.fail_on_error {
      Err(StepError::fatal(message))
    } else {
      Err(StepError::recoverable(message))
    }
  }
}
