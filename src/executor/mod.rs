//! Shell command execution capability
//!
//! Every side effect of a release goes through an [`Executor`]. The core only
//! builds [`ShellCommand`] values; the executor decides where and how they run.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DeployError, Result};

pub mod local;
pub mod recording;
pub mod ssh;

pub use local::LocalExecutor;
pub use recording::RecordingExecutor;
pub use ssh::SshExecutor;

const REDACTED: &str = "***";

/// A shell command plus the scoped context it runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub command: String,
    pub privileged: bool,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub prefixes: Vec<String>,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            privileged: false,
            cwd: None,
            env: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    /// Run with privilege escalation
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Command that must succeed before the main command, e.g. environment activation
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Full script with working directory, environment and prefixes applied.
    /// Only executors should see this; it carries environment values verbatim.
    pub fn render(&self) -> String {
        self.script(false)
    }

    /// Script with every environment value masked, for logs and error messages
    pub fn redacted(&self) -> String {
        self.script(true)
    }

    fn script(&self, mask_env: bool) -> String {
        let mut parts = Vec::new();

        if let Some(dir) = &self.cwd {
            parts.push(format!("cd {}", quote_path(dir)));
        }

        for (key, value) in &self.env {
            let value = if mask_env { REDACTED } else { value.as_str() };
            parts.push(format!("export {}={}", key, quote(value)));
        }

        parts.extend(self.prefixes.iter().cloned());
        parts.push(self.command.clone());

        parts.join(" && ")
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.privileged {
            write!(f, "[sudo] {}", self.redacted())
        } else {
            write!(f, "{}", self.redacted())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute the command and report its exit status. A non-zero exit is not an error here.
    async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput>;

    /// Execute the command, failing on a non-zero exit
    async fn run(&self, command: ShellCommand) -> Result<CommandOutput> {
        debug!("Running: {}", command);

        let output = self.execute(&command).await?;
        if !output.success() {
            return Err(DeployError::RemoteCommand {
                command: command.redacted(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }

    /// Execute a check command; exit code zero means `true`
    async fn probe(&self, command: ShellCommand) -> Result<bool> {
        debug!("Probing: {}", command);
        Ok(self.execute(&command).await?.success())
    }
}

/// Double-quote a path operand for the shell
pub fn quote_path(path: impl AsRef<Path>) -> String {
    quote(&path.as_ref().to_string_lossy())
}

/// Double-quote an arbitrary operand, escaping the characters still special inside double quotes
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
