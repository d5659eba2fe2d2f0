//! Blue/green slot management, log provisioning and service restarts

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{DeployError, Result};
use crate::executor::{quote_path, ShellCommand};
use crate::fs::{FileSystem, FsEntity};

pub mod daemon;

pub use daemon::{Daemon, Supervisor, SystemService};

/// Suffixes of the two deployment slots
pub const SLOT_SUFFIXES: [char; 2] = ['1', '2'];

/// Mode of log directories created on demand
const LOG_DIR_MODE: &str = "755";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    pub live_link: PathBuf,
    pub active: Option<PathBuf>,
    pub inactive: PathBuf,
}

pub struct System {
    fs: FileSystem,
    tree: Vec<FsEntity>,
    app_dir: PathBuf,
    log_files: Vec<FsEntity>,
    daemons: Vec<Box<dyn Daemon>>,
}

impl System {
    pub fn new(
        fs: FileSystem,
        tree: Vec<FsEntity>,
        app_dir: impl Into<PathBuf>,
        log_files: Vec<FsEntity>,
        daemons: Vec<Box<dyn Daemon>>,
    ) -> Self {
        // Slots are siblings named by suffix, so `/srv/app/` must become `/srv/app`
        let app_dir: PathBuf = app_dir.into().components().collect();
        Self {
            fs,
            tree,
            app_dir,
            log_files,
            daemons,
        }
    }

    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    /// The live symlink
    pub fn app_directory(&self) -> &Path {
        &self.app_dir
    }

    pub fn daemons(&self) -> &[Box<dyn Daemon>] {
        &self.daemons
    }

    pub fn project_tree(&self) -> &[FsEntity] {
        &self.tree
    }

    pub fn log_files(&self) -> &[FsEntity] {
        &self.log_files
    }

    fn slot(&self, suffix: char) -> PathBuf {
        let mut slot = self.app_dir.clone().into_os_string();
        slot.push(suffix.to_string());
        PathBuf::from(slot)
    }

    pub async fn create_project_tree(&self) -> Result<()> {
        info!("Ensuring project tree under {}", self.app_dir.display());
        for directory in &self.tree {
            self.fs.ensure_directory(directory, true).await?;
        }

        if !self.fs.is_link(&self.app_dir).await? {
            let first = self.slot(SLOT_SUFFIXES[0]);
            info!("No live slot yet, pointing {} at {}", self.app_dir.display(), first.display());
            let link = FsEntity::symlink(first, &self.app_dir, self.fs.defaults())?;
            self.fs.replace_symlink(&link, true).await?;
        }

        Ok(())
    }

    pub async fn ensure_log_files(&self) -> Result<()> {
        for log_file in &self.log_files {
            if self.fs.exists(&log_file.path).await? {
                debug!("Log file {} already exists", log_file.path.display());
                continue;
            }

            if let Some(parent) = log_file.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let mut directory = FsEntity::directory(parent, self.fs.defaults());
                directory.mode = LOG_DIR_MODE.to_string();
                self.fs.ensure_directory(&directory, true).await?;
            }

            self.fs.ensure_file(log_file).await?;
        }

        Ok(())
    }

    /// Slot the live symlink currently resolves to
    pub async fn active_slot(&self) -> Result<PathBuf> {
        let target = self.fs.read_link(&self.app_dir).await?;
        if target.is_absolute() {
            return Ok(target);
        }

        let base = self.app_dir.parent().unwrap_or_else(|| Path::new("/"));
        Ok(base.join(target))
    }

    /// The slot not targeted by the live symlink; `<app_dir>1` before the first release
    pub async fn inactive_slot(&self) -> Result<PathBuf> {
        if !self.fs.is_link(&self.app_dir).await? {
            return Ok(self.slot(SLOT_SUFFIXES[0]));
        }

        let active = self.active_slot().await?;
        let active_str = active.to_string_lossy().into_owned();
        let last = active_str
            .chars()
            .last()
            .ok_or_else(|| DeployError::InvalidSlot {
                target: active.clone(),
            })?;

        let live: BTreeSet<char> = [last].into_iter().collect();
        let all: BTreeSet<char> = SLOT_SUFFIXES.into_iter().collect();
        let remaining: Vec<char> = all.symmetric_difference(&live).copied().collect();

        match remaining.as_slice() {
            [suffix] => {
                let mut inactive = active_str[..active_str.len() - last.len_utf8()].to_string();
                inactive.push(*suffix);
                Ok(PathBuf::from(inactive))
            }
            _ => Err(DeployError::InvalidSlot { target: active }),
        }
    }

    /// Atomically repoint the live symlink at the inactive slot
    pub async fn switch_to_inactive(&self) -> Result<PathBuf> {
        let inactive = self.inactive_slot().await?;
        info!("Switching {} to {}", self.app_dir.display(), inactive.display());

        let link = FsEntity::symlink(&inactive, &self.app_dir, self.fs.defaults())?;
        self.fs.replace_symlink(&link, true).await?;
        Ok(inactive)
    }

    pub async fn status(&self) -> Result<SlotStatus> {
        let active = if self.fs.is_link(&self.app_dir).await? {
            Some(self.active_slot().await?)
        } else {
            None
        };

        Ok(SlotStatus {
            live_link: self.app_dir.clone(),
            active,
            inactive: self.inactive_slot().await?,
        })
    }

    /// Install the OS packages listed one per line in `requirements_file`
    pub async fn install_system_packages(&self, requirements_file: &Path) -> Result<()> {
        info!("Installing system packages from {}", requirements_file.display());
        self.fs
            .executor()
            .run(
                ShellCommand::new(format!(
                    "apt-get -y install -- `cat {}`",
                    quote_path(requirements_file)
                ))
                .privileged(),
            )
            .await?;
        Ok(())
    }

    /// Restart every daemon in configured order, stopping at the first failure
    pub async fn restart_all_daemons(&self) -> Result<()> {
        for daemon in &self.daemons {
            daemon.restart(self.fs.executor().as_ref()).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("app_dir", &self.app_dir)
            .field("tree", &self.tree)
            .field("log_files", &self.log_files)
            .field("daemons", &self.daemons)
            .finish()
    }
}
