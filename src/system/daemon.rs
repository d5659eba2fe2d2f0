//! Services restarted once a release has been switched live

use async_trait::async_trait;
use std::fmt;
use tracing::info;

use crate::error::Result;
use crate::executor::{Executor, ShellCommand};

#[async_trait]
pub trait Daemon: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn restart(&self, executor: &dyn Executor) -> Result<()>;
}

/// An OS service restarted through `service <name> restart`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemService {
    name: String,
}

impl SystemService {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn nginx() -> Self {
        Self::new("nginx")
    }

    pub fn uwsgi() -> Self {
        Self::new("uwsgi")
    }
}

#[async_trait]
impl Daemon for SystemService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn restart(&self, executor: &dyn Executor) -> Result<()> {
        info!("Restarting service {}", self.name);
        executor
            .run(
                ShellCommand::new(format!(
                    "service {} restart",
                    shell_words::quote(&self.name)
                ))
                .privileged(),
            )
            .await?;
        Ok(())
    }
}

/// Programs managed by supervisord; the configuration is re-read before the group restarts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supervisor {
    group: String,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Supervisor {
    pub const DEFAULT_GROUP: &'static str = "all";

    pub fn new(group: Option<&str>) -> Self {
        Self {
            group: group
                .filter(|g| !g.is_empty())
                .unwrap_or(Self::DEFAULT_GROUP)
                .to_string(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

#[async_trait]
impl Daemon for Supervisor {
    fn name(&self) -> &str {
        "supervisor"
    }

    async fn restart(&self, executor: &dyn Executor) -> Result<()> {
        info!("Restarting supervisor group {}", self.group);
        executor
            .run(ShellCommand::new("supervisorctl reread").privileged())
            .await?;
        executor
            .run(
                ShellCommand::new(format!(
                    "supervisorctl restart {}",
                    shell_words::quote(&self.group)
                ))
                .privileged(),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;

    #[tokio::test]
    async fn test_system_service_restart() {
        let executor = RecordingExecutor::new();

        SystemService::nginx().restart(&executor).await.unwrap();

        let history = executor.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].command, "service nginx restart");
        assert!(history[0].privileged);
    }

    #[tokio::test]
    async fn test_supervisor_rereads_before_restart() {
        let executor = RecordingExecutor::new();

        Supervisor::new(Some("celery")).restart(&executor).await.unwrap();

        assert_eq!(
            executor.commands(),
            vec!["supervisorctl reread", "supervisorctl restart celery"]
        );
    }

    #[test]
    fn test_supervisor_defaults_to_all_programs() {
        assert_eq!(Supervisor::default().group(), "all");
        assert_eq!(Supervisor::new(Some("")).group(), "all");
    }
}
