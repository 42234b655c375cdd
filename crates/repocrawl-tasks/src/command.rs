//! Task handler that runs an external command.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{TaskError, TaskHandler};

/// Placeholder replaced by the comma-joined invocation arguments.
pub const ARGS_PLACEHOLDER: &str = "{args}";

/// Keep only the tail of stderr in errors; rake traces can be long.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Clone)]
pub struct CommandTask {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandTask {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Final argv (without the program) for one invocation.
    ///
    /// If any configured argument contains `{args}`, the invocation arguments
    /// are joined with `,` and substituted there; otherwise they are appended.
    #[must_use]
    pub fn command_args(&self, invocation_args: &[String]) -> Vec<String> {
        if self.args.iter().any(|a| a.contains(ARGS_PLACEHOLDER)) {
            let joined = invocation_args.join(",");
            self.args
                .iter()
                .map(|a| a.replace(ARGS_PLACEHOLDER, &joined))
                .collect()
        } else {
            self.args
                .iter()
                .chain(invocation_args.iter())
                .cloned()
                .collect()
        }
    }
}

#[async_trait]
impl TaskHandler for CommandTask {
    async fn run(&self, args: &[String]) -> Result<(), TaskError> {
        let argv = self.command_args(args);

        let mut command = Command::new(&self.program);
        command
            .args(&argv)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(program = %self.program, args = ?argv, "running task command");

        let output = command.output().await.map_err(|source| TaskError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        Err(TaskError::CommandFailed {
            program: self.program.clone(),
            code: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
