//! Helpers shared across modules; currently only platform-specific test
//! commands for the process-running steps.

#[cfg(test)]
pub mod testutil;
