//! High-level build management interface
//!
//! This module provides the [`BuildManager`] which serves as the primary interface
//! for all build operations. It loads the environment and build configuration,
//! registers the built-in and user-defined tasks, and runs them.
//!
//! ## Example
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
//! // Get execution plan for a task
//! let plan = manager.get_execution_plan("deploy")?;
//!
//! // Run tasks in sequence
//! manager.run(&["build".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Color;
use tracing::info;

use crate::configs::build::load_build_config;
use crate::configs::env::EnvSources;
use crate::configs::tasks::load_task_configs;
use crate::context::BuildContext;
use crate::execution::spec::RunSpec;
use crate::execution::{group_by_dependency_levels, TaskRunner, TaskRunnerConfig};
use crate::pipeline::register_builtin_tasks;
use crate::registry::TaskRegistry;
use crate::results::{DependencyGraphResult, TaskInfo, TaskListResult, TaskPlanResult};
use crate::tasks::{get_task_color, register_user_tasks};
use crate::types::{MarshalError, MarshalResult};

/// High-level manager that owns the task registry and the shared build context
pub struct BuildManager {
    pub project_root: PathBuf,
    context: Arc<BuildContext>,
    registry: Arc<TaskRegistry>,
    runner_config: TaskRunnerConfig,
}

/// Configuration for initializing a build manager
pub struct BuildManagerConfig {
    pub project_root: PathBuf,
}

impl BuildManager {
    /// Initialize from the process environment and `<root>/.env`
    pub fn new(config: BuildManagerConfig) -> MarshalResult<Self> {
        let root = config.project_root.canonicalize().map_err(|e| {
            MarshalError::Config(format!(
                "Project root {} is not accessible: {}",
                config.project_root.display(),
                e
            ))
        })?;
        let env = EnvSources::from_process(&root)?;
        Self::with_env(&root, env)
    }

    /// Initialize with explicit configuration sources
    pub fn with_env(project_root: &Path, env: EnvSources) -> MarshalResult<Self> {
        let build = load_build_config(project_root)?;
        let context = Arc::new(BuildContext::new(project_root, env, build)?);

        let mut registry = TaskRegistry::new();
        register_builtin_tasks(&mut registry, &context)?;
        register_user_tasks(&mut registry, project_root, load_task_configs(project_root)?)?;
        registry.validate_references()?;

        let registry = Arc::new(registry);
        context.attach_registry(&registry);
        info!(tasks = registry.len(), root = %project_root.display(), "Registered tasks");

        Ok(Self {
            project_root: project_root.to_path_buf(),
            context,
            registry,
            runner_config: TaskRunnerConfig::default(),
        })
    }

    pub fn with_runner_config(mut self, runner_config: TaskRunnerConfig) -> Self {
        self.runner_config = runner_config;
        self
    }

    pub fn context(&self) -> &Arc<BuildContext> {
        &self.context
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Run tasks one after another in a single run
    pub async fn run(&self, tasks: &[String]) -> MarshalResult<()> {
        let runner = TaskRunner::with_config(Arc::clone(&self.registry), self.runner_config.clone());
        runner.run(RunSpec::from(tasks)).await
    }

    /// List all registered tasks
    pub fn list_tasks(&self) -> TaskListResult {
        let tasks: Vec<TaskInfo> = self
            .registry
            .names()
            .iter()
            .filter_map(|name| self.registry.lookup(name).ok())
            .map(TaskInfo::from)
            .collect();

        TaskListResult {
            task_colors: Self::colors(tasks.iter().map(|t| t.name.as_str())),
            tasks,
        }
    }

    /// Get execution plan for a task
    pub fn get_execution_plan(&self, task_name: &str) -> MarshalResult<TaskPlanResult> {
        let order = self.registry.execution_order(task_name)?;
        let levels = group_by_dependency_levels(&self.registry, task_name)?;
        Ok(TaskPlanResult {
            task_name: task_name.to_string(),
            task_colors: Self::colors(order.iter().map(String::as_str)),
            order,
            levels,
        })
    }

    /// Get dependency graph information
    pub fn get_dependency_graph(&self) -> DependencyGraphResult {
        DependencyGraphResult {
            graph: self.registry.graph().clone(),
        }
    }

    /// Keep servers and watchers started by the run alive until Ctrl+C
    pub async fn wait_for_background(&self) -> MarshalResult<()> {
        if !self.context.has_background_work().await {
            return Ok(());
        }

        info!("Press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;

        for watcher in self.context.take_watchers().await {
            watcher.stop();
        }
        for server in self.context.take_servers().await {
            let name = server.name().to_string();
            server.shutdown().await?;
            info!(server = %name, "Server stopped");
        }
        Ok(())
    }

    fn colors<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, Color> {
        names
            .map(|name| (name.to_string(), get_task_color(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn project_with_tasks(yaml: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let tasks_dir = dir.path().join(".marshal/tasks");
        std::fs::create_dir_all(&tasks_dir).unwrap();
        std::fs::write(tasks_dir.join("extra.yml"), yaml).unwrap();
        dir
    }

    fn env() -> EnvSources {
        EnvSources::new(
            HashMap::from([("COMMIT_ID".to_string(), "abc".to_string())]),
            HashMap::new(),
        )
    }

    #[test]
    fn test_user_tasks_join_builtin_tasks() {
        let dir = project_with_tasks(
            r#"
tasks:
  - name: e2e
    description: End-to-end tests
    command: echo e2e
    dependencies: [build]
"#,
        );
        let manager = BuildManager::with_env(dir.path(), env()).unwrap();

        let list = manager.list_tasks();
        let e2e = list.tasks.iter().find(|t| t.name == "e2e").unwrap();
        assert_eq!(e2e.description.as_deref(), Some("End-to-end tests"));
        assert!(list.task_colors.contains_key("e2e"));

        let deploy = list.tasks.iter().find(|t| t.name == "deploy").unwrap();
        assert!(deploy.is_composite());
        assert_eq!(deploy.plan, vec!["build", "unit-tests", "zip-build-folder"]);

        let plan = manager.get_execution_plan("e2e").unwrap();
        assert_eq!(plan.order.last().map(String::as_str), Some("e2e"));
        assert!(plan.order.contains(&"clean-deploy".to_string()));
        assert_eq!(plan.levels.concat().len(), plan.order.len());
    }

    #[test]
    fn test_unknown_reference_is_rejected() {
        let dir = project_with_tasks(
            r#"
tasks:
  - name: publish
    command: echo publish
    dependencies: [upload]
"#,
        );
        let err = BuildManager::with_env(dir.path(), env()).err().unwrap();
        assert!(err.to_string().contains("'upload'"));
    }

    #[test]
    fn test_user_task_cannot_shadow_builtin() {
        let dir = project_with_tasks("tasks:\n  - name: build\n    command: echo\n");
        let err = BuildManager::with_env(dir.path(), env()).err().unwrap();
        assert!(matches!(err, MarshalError::DuplicateTask(name) if name == "build"));
    }

    #[tokio::test]
    async fn test_run_sequence_and_graph() {
        let dir = project_with_tasks(
            r#"
tasks:
  - name: stamp
    command: echo stamped > stamp.txt
"#,
        );
        let manager = BuildManager::with_env(dir.path(), env())
            .unwrap()
            .with_runner_config(TaskRunnerConfig {
                show_headers: false,
            });

        manager
            .run(&["make-config".to_string(), "stamp".to_string()])
            .await
            .unwrap();
        assert!(dir.path().join("dist/js/config.js").is_file());
        assert!(dir.path().join("stamp.txt").is_file());

        let graph = manager.get_dependency_graph().graph;
        assert_eq!(graph.node_count(), manager.registry().len());

        let err = manager.run(&["nope".to_string()]).await.unwrap_err();
        assert!(matches!(err, MarshalError::TaskNotRegistered(_)));
        manager.wait_for_background().await.unwrap();
    }
}
