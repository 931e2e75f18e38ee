//! Command execution utilities
//!
//! This module provides a unified interface for running external tools (shell commands,
//! scripts, executables with args) from the project root with consistent error handling
//! and logging. Asset compilers, linters, the test runner and git all go through here.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::types::{MarshalError, MarshalResult};

/// Unified command executor that handles common setup and execution patterns
pub struct CommandExecutor<'a> {
    root: &'a Path,
    env: Vec<(String, String)>,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self {
            root,
            env: Vec::new(),
        }
    }

    /// Extra environment variable passed to every spawned command
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Execute a command with common setup and error handling
    async fn execute_command(
        &self,
        command: &mut Command,
        execution_error_message: &str,
        failure_error_message: &str,
    ) -> MarshalResult<()> {
        self.prepare(command);

        let status = command
            .status()
            .await
            .map_err(|e| MarshalError::Command(format!("{}: {}", execution_error_message, e)))?;

        if !status.success() {
            return Err(MarshalError::Command(format!(
                "{}: {}",
                failure_error_message,
                status.code().unwrap_or(-1)
            )));
        }

        Ok(())
    }

    /// Execute a script file
    pub async fn execute_script(&self, script_path: &str) -> MarshalResult<()> {
        let script_path_buf = PathBuf::from(script_path);

        // If script path is relative, resolve it relative to the project root
        let full_script_path = if script_path_buf.is_relative() {
            self.root.join(script_path_buf)
        } else {
            script_path_buf
        };

        if !full_script_path.exists() {
            return Err(MarshalError::Command(format!(
                "Script file '{}' not found",
                full_script_path.display()
            )));
        }

        let mut command = Command::new(&full_script_path);
        self.execute_command(
            &mut command,
            &format!("Failed to execute script: {}", full_script_path.display()),
            "Script execution failed with exit code",
        )
        .await
    }

    /// Execute a command with arguments
    pub async fn execute_command_with_args(
        &self,
        command_path: &str,
        args: &[String],
    ) -> MarshalResult<()> {
        let mut command = Command::new(command_path);
        command.args(args);
        self.execute_command(
            &mut command,
            &format!("Failed to execute command '{}'", command_path),
            &format!("Command '{}' failed with exit code", command_path),
        )
        .await
    }

    /// Execute a single shell command
    pub async fn execute_shell_command(&self, cmd: &str) -> MarshalResult<()> {
        debug!(command = cmd, "Running shell command");
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        self.execute_command(
            &mut command,
            &format!("Failed to execute command '{}'", cmd),
            &format!("Command '{}' failed with exit code", cmd),
        )
        .await
    }

    /// Run a program and return its trimmed standard output
    pub async fn capture(&self, program: &str, args: &[&str]) -> MarshalResult<String> {
        let mut command = Command::new(program);
        command.args(args).stdout(Stdio::piped()).stderr(Stdio::null());
        self.prepare(&mut command);

        let output = command
            .output()
            .await
            .map_err(|e| MarshalError::Command(format!("Failed to execute '{}': {}", program, e)))?;

        if !output.status.success() {
            return Err(MarshalError::Command(format!(
                "'{} {}' failed with exit code {}",
                program,
                args.join(" "),
                output.status.code().unwrap_or(-1)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn prepare(&self, command: &mut Command) {
        command.current_dir(self.root);
        for (key, value) in &self.env {
            command.env(key, value);
        }
    }
}

/// Substitute `{name}` placeholders in a tool command line with shell-quoted values
pub fn render_tool_command(template: &str, values: &[(&str, &Path)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |command, (name, path)| {
            command.replace(
                &format!("{{{}}}", name),
                &shell_quote(&path.to_string_lossy()),
            )
        })
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
