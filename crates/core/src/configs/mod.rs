//! Configuration sources
//!
//! - [`env`] resolves runtime values from the process environment and `.env`
//! - [`build`] describes source/output layout and external tools (`.marshal/build.yml`)
//! - [`tasks`] declares user-defined command tasks (`.marshal/tasks/*.yml`)

pub mod build;
pub mod env;
pub mod tasks;
