mod plan;
mod run;
mod targets;

pub use plan::cmd_plan;
pub use run::cmd_run;
pub use targets::cmd_targets;
