//! Cross-platform `exec` nodes for tests.
//!
//! Each helper returns an `exec` node running a small platform command, so
//! step tests read the same on Unix and Windows.

use crate::node::DeclNode;

fn exec(executable: &str, args: &[String]) -> DeclNode {
  args.iter().fold(DeclNode::new("exec").with_attr("executable", executable), |node, arg| {
    node.with_child(DeclNode::new("arg").with_attr("value", arg.as_str()))
  })
}

#[cfg(unix)]
fn script(script: &str) -> DeclNode {
  exec("/bin/sh", &["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
fn script(script: &str) -> DeclNode {
  exec("cmd.exe", &["/C".to_string(), script.to_string()])
}

/// Prints `line` on stdout.
pub fn echo_line(line: &str) -> DeclNode {
  script(&format!("echo {line}"))
}

/// Exits with `code`.
pub fn exit_with(code: i32) -> DeclNode {
  script(&format!("exit {code}"))
}

/// Prints the value of environment variable `var`.
#[cfg(unix)]
pub fn print_env(var: &str) -> DeclNode {
  script(&format!("echo \"${var}\""))
}

#[cfg(windows)]
pub fn print_env(var: &str) -> DeclNode {
  script(&format!("echo %{var}%"))
}

/// Prints the working directory.
#[cfg(unix)]
pub fn print_working_dir() -> DeclNode {
  script("pwd")
}

#[cfg(windows)]
pub fn print_working_dir() -> DeclNode {
  script("cd")
}

/// Sleeps for `seconds`.
#[cfg(unix)]
pub fn sleep_for(seconds: u32) -> DeclNode {
  exec("sleep", &[seconds.to_string()])
}

#[cfg(windows)]
pub fn sleep_for(seconds: u32) -> DeclNode {
  exec(
    "powershell.exe",
    &[
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("Start-Sleep -Seconds {seconds}"),
    ],
  )
}
