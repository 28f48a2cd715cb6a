//! anvil-lib: declarative build orchestration.
//!
//! This crate provides the pieces of an anvil build:
//! - `PropertyStore`: write-once properties with `${name}` substitution
//! - `Registry`: named factories for steps, types and conditions
//! - `Configurer`: binds declarative nodes onto configurable objects
//! - `Project` and `Target`: the dependency graph a build walks
//! - `execute`: ordering, run-conditions and step execution

pub mod component;
pub mod configure;
pub mod document;
pub mod execute;
pub mod node;
pub mod placeholder;
pub mod project;
pub mod property;
pub mod registry;
pub mod step;
pub mod tasks;
pub mod util;
