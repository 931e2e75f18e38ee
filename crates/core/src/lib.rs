//! Marshal Core Library
//!
//! This is the core library for the Marshal front-end build tool. It provides all the
//! business logic for configuration resolution, the task graph, the build pipeline,
//! static serving and release packaging.
//!
//! ## Architecture
//!
//! The core library is organized into several modules:
//!
//! - [`manager`] - High-level build management interface
//! - [`registry`] - Task definitions and the validated dependency graph
//! - [`execution`] - Task runner, run plans and external command execution
//! - [`pipeline`] - Built-in front-end build and deploy tasks
//! - [`context`] - Shared state handed to built-in tasks
//! - [`configs`] - Environment resolution, build configuration and user task files
//! - [`server`] - Environment-profile static server with live reload
//! - [`watch`] - Source watcher that re-runs tasks on change
//! - [`release`] - Build metadata and release archive packaging
//! - [`tasks`] - User-defined tasks and color management
//! - [`results`] - Result types for manager operations
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! The primary entry point is the [`BuildManager`] which provides a high-level
//! interface for all build operations:
//!
//! ```rust,no_run
//! use marshal_core::manager::{BuildManager, BuildManagerConfig};
//! use std::path::PathBuf;
//!
//! # async fn example() -> marshal_core::types::MarshalResult<()> {
//! let manager = BuildManager::new(BuildManagerConfig {
//!     project_root: PathBuf::from("."),
//! })?;
//!
//! let tasks = manager.list_tasks();
//! manager.run(&["deploy".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

pub mod configs;
pub mod context;
pub mod execution;
pub mod fsutil;
pub mod manager;
pub mod pipeline;
pub mod registry;
pub mod release;
pub mod results;
pub mod server;
pub mod tasks;
pub mod types;
pub mod watch;

// Re-export the main types for easier usage
pub use manager::{BuildManager, BuildManagerConfig};
pub use types::{MarshalError, MarshalResult};
