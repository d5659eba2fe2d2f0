use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cli::options::Target;
use crate::error::Result;
use crate::executor::{Executor, LocalExecutor, RecordingExecutor, SshExecutor};
use crate::factory::ProjectFactory;
use crate::project::ReleaseReport;
use crate::system::SlotStatus;

pub fn executor_for(target: &Target) -> Arc<dyn Executor> {
    match target {
        Target::DryRun => Arc::new(RecordingExecutor::new().with_echo()),
        Target::Local => Arc::new(LocalExecutor::new()),
        Target::Ssh { host, port } => {
            let mut ssh = SshExecutor::new(host.clone());
            if let Some(port) = port {
                ssh = ssh.with_port(*port);
            }
            Arc::new(ssh)
        }
    }
}

/// Assemble the project from `config` and release it
pub async fn run_release(
    config: &Path,
    tag: Option<&str>,
    executor: Arc<dyn Executor>,
) -> Result<ReleaseReport> {
    let mut project = ProjectFactory::from_file(config, executor)?.build()?;
    info!(
        "Releasing {} module(s){}",
        project.modules().len(),
        tag.map(|t| format!(" at tag {t}")).unwrap_or_default()
    );
    project.release(tag).await
}

pub async fn run_status(config: &Path, executor: Arc<dyn Executor>) -> Result<SlotStatus> {
    let system = ProjectFactory::from_file(config, executor)?.system(false)?;
    system.status().await
}
