use thiserror::Error;

/// The main error type for Marshal operations
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration value '{0}' is not set in the environment, .env or defaults")]
    ConfigurationMissing(String),

    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Circular task dependencies detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Task '{0}' not found")]
    TaskNotRegistered(String),

    #[error("Task '{task}' failed: {cause}")]
    TaskExecutionFailed { task: String, cause: String },

    #[error("Failed to bind server to {host}:{port}: {source}")]
    PortBindFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Packaging failed: {0}")]
    PackagingFailed(String),

    #[error("Command error: {0}")]
    Command(String),
}

/// Result type alias for Marshal operations
pub type MarshalResult<T> = Result<T, MarshalError>;
