//! Task execution module
//!
//! This module handles the actual execution of tasks: run plans, dependency
//! resolution, external command execution and the runner that ties them together.

pub mod command;
pub mod dependencies;
pub mod runner;
pub mod spec;

pub use command::CommandExecutor;
pub use dependencies::group_by_dependency_levels;
pub use runner::{TaskRunner, TaskRunnerConfig};
pub use spec::{RunSpec, RunStep};
