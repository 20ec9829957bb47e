//! stackwatch-compose — drives the `docker-compose` CLI.
//!
//! The compose file is an external artifact: this crate only points the
//! compose binary at it. `up` and `down` stream their output to the
//! terminal; `ps` captures it.

use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use stackwatch_core::config::ComposeConfig;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("compose command is empty")]
    EmptyCommand,

    #[error("failed to execute '{command}': {source}. Is it installed?")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with code {code}{}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// A compose project on disk.
#[derive(Debug, Clone)]
pub struct ComposeStack {
    command: Vec<String>,
    file: String,
    project_name: Option<String>,
    build: bool,
}

impl ComposeStack {
    pub fn new(config: &ComposeConfig) -> Self {
        Self {
            command: config.command.clone(),
            file: config.file.clone(),
            project_name: config.project_name.clone(),
            build: config.build,
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.file.clone()];
        if let Some(project) = &self.project_name {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args
    }

    pub fn up_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(["up".to_string(), "-d".to_string()]);
        if self.build {
            args.push("--build".to_string());
        }
        args
    }

    pub fn down_args(&self, remove_volumes: bool) -> Vec<String> {
        let mut args = self.base_args();
        args.push("down".to_string());
        if remove_volumes {
            args.push("-v".to_string());
        }
        args.push("--remove-orphans".to_string());
        args
    }

    pub fn ps_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.push("ps".to_string());
        args
    }

    /// Start every service in the background.
    pub async fn up(&self) -> Result<(), ComposeError> {
        info!(file = %self.file, "bringing stack up");
        self.run(self.up_args(), false).await.map(|_| ())
    }

    /// Stop and remove the stack, optionally with its volumes.
    pub async fn down(&self, remove_volumes: bool) -> Result<(), ComposeError> {
        info!(file = %self.file, remove_volumes, "tearing stack down");
        self.run(self.down_args(remove_volumes), false)
            .await
            .map(|_| ())
    }

    /// Container listing as printed by compose.
    pub async fn ps(&self) -> Result<String, ComposeError> {
        self.run(self.ps_args(), true).await
    }

    async fn run(&self, args: Vec<String>, capture: bool) -> Result<String, ComposeError> {
        let (program, leading) = self.command.split_first().ok_or(ComposeError::EmptyCommand)?;
        let command_line = self
            .command
            .iter()
            .chain(args.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        debug!(command = %command_line, "running compose");

        let mut cmd = Command::new(program);
        cmd.args(leading).args(&args).stdin(Stdio::null());

        if capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let output = cmd.output().await.map_err(|source| ComposeError::Spawn {
            command: program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ComposeError::Failed {
                command: command_line,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
