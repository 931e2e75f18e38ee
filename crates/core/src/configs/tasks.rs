use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{MarshalError, MarshalResult};

/// Directory holding user-defined task files relative to the project root
pub const TASKS_DIR: &str = ".marshal/tasks";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    pub description: Option<String>,
    pub script: Option<String>,
    pub command: Option<Command>,
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TasksFileConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tasks: Vec<TaskConfig>,
}

pub fn parse_tasks_config(yaml_str: &str) -> MarshalResult<TasksFileConfig> {
    let config: TasksFileConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

/// Read every `*.yml` file in `.marshal/tasks`, sorted by file name
pub fn load_task_configs(project_root: &Path) -> MarshalResult<Vec<TaskConfig>> {
    let tasks_dir = project_root.join(TASKS_DIR);
    if !tasks_dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&tasks_dir).map_err(|e| {
        MarshalError::Config(format!(
            "Failed to read tasks directory {}: {}",
            tasks_dir.display(),
            e
        ))
    })? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("yml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tasks = Vec::new();
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        let config = parse_tasks_config(&content).map_err(|e| {
            MarshalError::Config(format!("Failed to parse task config {}: {}", path.display(), e))
        })?;
        tasks.extend(config.tasks);
    }
    Ok(tasks)
}
