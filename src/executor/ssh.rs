//! Executes commands on a remote host through the system `ssh` client

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::Result;
use crate::executor::{CommandOutput, Executor, ShellCommand};

pub struct SshExecutor {
    host: String,
    port: Option<u16>,
    options: Vec<String>,
}

impl SshExecutor {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            options: vec!["BatchMode=yes".to_string()],
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Script as handed to the remote login shell
    fn remote_script(command: &ShellCommand) -> String {
        let inner = shell_words::quote(&command.render()).into_owned();
        if command.privileged {
            format!("sudo bash -c {inner}")
        } else {
            format!("bash -c {inner}")
        }
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput> {
        let script = Self::remote_script(command);
        debug!("Executing command on {}: {}", self.host, script);

        let mut cmd = Command::new("ssh");
        for option in &self.options {
            cmd.arg("-o").arg(option);
        }
        if let Some(port) = self.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.arg(&self.host).arg(script);

        let output = cmd.output().await?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
