//! Executes commands on the local host

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::Result;
use crate::executor::{CommandOutput, Executor, ShellCommand};

pub struct LocalExecutor {
    shell: String,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput> {
        let script = command.render();

        let mut cmd = if command.privileged {
            let mut sudo = Command::new("sudo");
            sudo.arg(&self.shell);
            sudo
        } else {
            Command::new(&self.shell)
        };
        cmd.arg("-c").arg(&script);

        let output = cmd.output().await?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
