//! Run plans
//!
//! A [`RunSpec`] is an ordered list of steps. Each step is either a single task or a
//! group of tasks that run concurrently and must all finish before the next step.

use std::fmt;
use std::sync::Arc;

use crate::types::MarshalResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStep {
    Task(String),
    Parallel(Vec<String>),
}

/// Invoked once with the outcome of the plan
pub type CompletionCallback = Arc<dyn Fn(&MarshalResult<()>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RunSpec {
    steps: Vec<RunStep>,
    on_complete: Option<CompletionCallback>,
}

impl RunSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single task
    pub fn then(mut self, name: impl Into<String>) -> Self {
        self.steps.push(RunStep::Task(name.into()));
        self
    }

    /// Append a group of tasks that run concurrently
    pub fn parallel<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps
            .push(RunStep::Parallel(names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MarshalResult<()>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn steps(&self) -> &[RunStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every task name referenced by the plan, in declaration order
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .flat_map(|step| match step {
                RunStep::Task(name) => std::slice::from_ref(name).iter(),
                RunStep::Parallel(names) => names.iter(),
            })
            .map(String::as_str)
    }

    pub(crate) fn completion(&self) -> Option<&CompletionCallback> {
        self.on_complete.as_ref()
    }
}

impl fmt::Debug for RunSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSpec")
            .field("steps", &self.steps)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl From<&str> for RunSpec {
    fn from(name: &str) -> Self {
        RunSpec::new().then(name)
    }
}

impl From<String> for RunSpec {
    fn from(name: String) -> Self {
        RunSpec::new().then(name)
    }
}

impl From<&[String]> for RunSpec {
    fn from(names: &[String]) -> Self {
        names.iter().fold(RunSpec::new(), |spec, name| spec.then(name.clone()))
    }
}

impl From<Vec<String>> for RunSpec {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().fold(RunSpec::new(), RunSpec::then)
    }
}
