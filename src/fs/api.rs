//! Idempotent filesystem primitives issued through an executor

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DeployError, Result};
use crate::executor::{quote_path, Executor, ShellCommand};
use crate::fs::entity::{EntityDefaults, FsEntity};

#[derive(Clone)]
pub struct FileSystem {
    executor: Arc<dyn Executor>,
    defaults: EntityDefaults,
}

impl FileSystem {
    pub fn new(executor: Arc<dyn Executor>, defaults: EntityDefaults) -> Self {
        Self { executor, defaults }
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn defaults(&self) -> &EntityDefaults {
        &self.defaults
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        self.executor
            .probe(ShellCommand::new(format!("test -e {}", quote_path(path))))
            .await
    }

    pub async fn is_link(&self, path: &Path) -> Result<bool> {
        self.executor
            .probe(ShellCommand::new(format!("test -L {}", quote_path(path))))
            .await
    }

    pub async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let output = self
            .executor
            .run(ShellCommand::new(format!("readlink -- {}", quote_path(path))))
            .await?;
        Ok(PathBuf::from(output.stdout.trim()))
    }

    /// `mkdir -p` without touching ownership
    pub async fn make_dirs(&self, path: &Path, privileged: bool) -> Result<()> {
        let command = ShellCommand::new(format!("mkdir -p -- {}", quote_path(path)));
        self.executor.run(escalate(command, privileged)).await?;
        Ok(())
    }

    pub async fn chown(&self, entity: &FsEntity, privileged: bool) -> Result<()> {
        let command = ShellCommand::new(format!(
            "chown {} -- {}",
            entity.ownership(),
            quote_path(&entity.path)
        ));
        self.executor.run(escalate(command, privileged)).await?;
        Ok(())
    }

    pub async fn chmod(&self, entity: &FsEntity, privileged: bool) -> Result<()> {
        let command = ShellCommand::new(format!(
            "chmod {} -- {}",
            entity.mode,
            quote_path(&entity.path)
        ));
        self.executor.run(escalate(command, privileged)).await?;
        Ok(())
    }

    /// Create the directory tree if needed, then apply the entity's ownership and mode
    pub async fn ensure_directory(&self, entity: &FsEntity, privileged: bool) -> Result<()> {
        debug!("Ensuring directory {}", entity.path.display());
        self.make_dirs(&entity.path, privileged).await?;
        self.chown(entity, privileged).await?;
        self.chmod(entity, privileged).await
    }

    /// Create the file if it is absent, then apply mode and ownership
    pub async fn ensure_file(&self, entity: &FsEntity) -> Result<()> {
        if self.exists(&entity.path).await? {
            debug!("File {} already exists", entity.path.display());
            return Ok(());
        }

        info!("Creating file {}", entity.path.display());
        self.executor
            .run(ShellCommand::new(format!("touch -- {}", quote_path(&entity.path))).privileged())
            .await?;
        self.chmod(entity, true).await?;
        self.chown(entity, true).await
    }

    /// Point the link at `entity.target` to `entity.path`.
    ///
    /// Without `force` an existing link location is left alone.
    pub async fn replace_symlink(&self, entity: &FsEntity, force: bool) -> Result<()> {
        if !entity.is_symlink() {
            return Err(DeployError::config(format!(
                "{} is a {}, not a symlink",
                entity.path.display(),
                entity.kind
            )));
        }

        let target = entity.target.as_ref().ok_or_else(|| {
            DeployError::config(format!("Symlink to {} has no target", entity.path.display()))
        })?;
        if target == &entity.path {
            return Err(DeployError::config(format!(
                "Symlink target equals its source: {}",
                target.display()
            )));
        }

        if !force && (self.exists(target).await? || self.is_link(target).await?) {
            debug!("Symlink location {} already present", target.display());
            return Ok(());
        }

        info!("Linking {} -> {}", target.display(), entity.path.display());
        let flags = if force { "-sfT" } else { "-sT" };
        self.executor
            .run(ShellCommand::new(format!(
                "ln {} -- {} {}",
                flags,
                quote_path(&entity.path),
                quote_path(target)
            )))
            .await?;
        Ok(())
    }
}

fn escalate(command: ShellCommand, privileged: bool) -> ShellCommand {
    if privileged {
        command.privileged()
    } else {
        command
    }
}
