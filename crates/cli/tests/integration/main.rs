mod common;
mod plan_tests;
mod run_tests;
mod targets_tests;
