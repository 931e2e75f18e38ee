//! High-level task runner
//!
//! Executes [`RunSpec`]s against a [`TaskRegistry`]. Within one runner every task runs
//! at most once: the first request initialises a per-task cell and later or concurrent
//! requests await the same outcome. Parallel groups are spawned onto the tokio runtime
//! and joined through a channel; the first failure is returned immediately and the
//! remaining members are left to finish on their own.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use colored::*;
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, error, info};

use crate::execution::spec::{RunSpec, RunStep};
use crate::registry::{TaskAction, TaskRegistry};
use crate::tasks::get_task_color;
use crate::types::{MarshalError, MarshalResult};

/// Configuration for the task runner
#[derive(Debug, Clone)]
pub struct TaskRunnerConfig {
    /// Print a header for every task as it starts
    pub show_headers: bool,
}

impl Default for TaskRunnerConfig {
    fn default() -> Self {
        Self { show_headers: true }
    }
}

/// A failed task, cheap to clone so every waiter on a shared task sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub cause: String,
}

impl TaskFailure {
    fn from_error(task: &str, error: MarshalError) -> Self {
        match error {
            // Keep the name of the task where the failure originated
            MarshalError::TaskExecutionFailed { task, cause } => Self { task, cause },
            other => Self {
                task: task.to_string(),
                cause: other.to_string(),
            },
        }
    }
}

impl From<TaskFailure> for MarshalError {
    fn from(failure: TaskFailure) -> Self {
        MarshalError::TaskExecutionFailed {
            task: failure.task,
            cause: failure.cause,
        }
    }
}

type Outcome = Result<(), TaskFailure>;
type OutcomeFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

struct RunState {
    registry: Arc<TaskRegistry>,
    config: TaskRunnerConfig,
    completed: Mutex<HashMap<String, Arc<OnceCell<Outcome>>>>,
}

/// Runs tasks with memoisation; one runner corresponds to one run
#[derive(Clone)]
pub struct TaskRunner {
    state: Arc<RunState>,
}

impl TaskRunner {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self::with_config(registry, TaskRunnerConfig::default())
    }

    pub fn with_config(registry: Arc<TaskRegistry>, config: TaskRunnerConfig) -> Self {
        Self {
            state: Arc::new(RunState {
                registry,
                config,
                completed: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Run a task name or a plan.
    ///
    /// Every referenced task is resolved before anything executes, so an unknown name
    /// fails the run without side effects.
    pub async fn run(&self, request: impl Into<RunSpec>) -> MarshalResult<()> {
        let spec = request.into();
        if spec.is_empty() {
            debug!("Nothing to run");
            return Ok(());
        }
        for name in spec.task_names() {
            self.state.registry.execution_order(name)?;
        }

        info!(steps = spec.steps().len(), "Starting run");
        self.execute_plan(&spec).await.map_err(MarshalError::from)?;
        debug!(completed = ?self.completed_tasks(), "Run finished");
        Ok(())
    }

    /// Names of tasks that have finished successfully in this run
    pub fn completed_tasks(&self) -> Vec<String> {
        let completed = match self.state.completed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut names: Vec<String> = completed
            .iter()
            .filter(|(_, cell)| matches!(cell.get(), Some(Ok(()))))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    async fn execute_plan(&self, spec: &RunSpec) -> Outcome {
        let mut outcome = Ok(());
        for step in spec.steps() {
            let result = match step {
                RunStep::Task(name) => self.run_task(name.clone()).await,
                RunStep::Parallel(names) => self.run_parallel(names).await,
            };
            if let Err(failure) = result {
                outcome = Err(failure);
                break;
            }
        }

        if let Some(callback) = spec.completion() {
            let result = outcome.clone().map_err(MarshalError::from);
            callback(&result);
        }
        outcome
    }

    /// Fan out every member, then wait until all have reported or one fails
    async fn run_parallel(&self, names: &[String]) -> Outcome {
        if names.is_empty() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel(names.len());
        for name in names {
            let tx = tx.clone();
            let task = self.run_task(name.clone());
            tokio::spawn(async move {
                // The receiver is gone once another member has failed
                let _ = tx.send(task.await).await;
            });
        }
        drop(tx);

        while let Some(result) = rx.recv().await {
            result?;
        }
        Ok(())
    }

    /// Boxed so that plans and dependencies can recurse back into the runner
    fn run_task(&self, name: String) -> OutcomeFuture {
        let runner = self.clone();
        Box::pin(async move {
            let cell = runner.cell_for(&name);
            cell.get_or_init(|| runner.execute(name.clone()))
                .await
                .clone()
        })
    }

    fn cell_for(&self, name: &str) -> Arc<OnceCell<Outcome>> {
        let mut completed = match self.state.completed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(completed.entry(name.to_string()).or_default())
    }

    async fn execute(&self, name: String) -> Outcome {
        let task = self
            .state
            .registry
            .lookup(&name)
            .map_err(|e| TaskFailure::from_error(&name, e))?
            .clone();

        for dependency in &task.dependencies {
            self.run_task(dependency.clone()).await?;
        }

        self.print_header(&name);
        let started = Instant::now();
        let result = match &task.action {
            TaskAction::Step(step) => step()
                .await
                .map_err(|e| TaskFailure::from_error(&name, e)),
            TaskAction::Plan(plan) => {
                debug!(task = %name, "Running composite plan");
                self.execute_plan(plan).await
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => info!(task = %name, elapsed_ms, "Task finished"),
            Err(failure) => error!(
                task = %name,
                origin = %failure.task,
                cause = %failure.cause,
                "Task failed"
            ),
        }
        result
    }

    fn print_header(&self, name: &str) {
        if !self.state.config.show_headers {
            return;
        }
        println!(
            "{} {}",
            "┌─".bright_black(),
            format!("Running task '{}'", name)
                .color(get_task_color(name))
                .bold()
        );
    }
}
