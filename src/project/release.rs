//! Release orchestration across all modules of a project

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{DeployError, Result};
use crate::project::module::ProjectModule;
use crate::system::System;

/// Outcome of a successful release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub previous_slot: PathBuf,
    pub live_slot: PathBuf,
    pub modules: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct Project {
    system: Arc<System>,
    modules: Vec<ProjectModule>,
}

impl Project {
    pub fn new(system: Arc<System>, modules: Vec<ProjectModule>) -> Result<Self> {
        if modules.is_empty() {
            return Err(DeployError::config("Expected at least one module"));
        }
        Ok(Self { system, modules })
    }

    pub fn system(&self) -> &Arc<System> {
        &self.system
    }

    pub fn modules(&self) -> &[ProjectModule] {
        &self.modules
    }

    /// Update every module into the inactive slot, then make that slot live.
    ///
    /// The live symlink only moves once all modules updated. A daemon that
    /// fails to restart afterwards leaves the new slot live and is reported
    /// as [`DeployError::StateInconsistency`].
    pub async fn release(&mut self, tag: Option<&str>) -> Result<ReleaseReport> {
        self.system.create_project_tree().await?;
        self.system.ensure_log_files().await?;

        let previous_slot = self.system.active_slot().await?;
        let slot = self.system.inactive_slot().await?;
        info!("Releasing into {}", slot.display());

        let mut updated = Vec::with_capacity(self.modules.len());
        for module in &mut self.modules {
            module.set_base(&slot);
            module.update(tag).await?;
            updated.push(module.location());
        }

        let live_slot = self.system.switch_to_inactive().await?;

        if let Err(e) = self.system.restart_all_daemons().await {
            error!("Slot {} is live but services failed to restart", live_slot.display());
            return Err(DeployError::StateInconsistency {
                live_slot,
                source: Box::new(e),
            });
        }

        info!("Release complete, {} is live", live_slot.display());
        Ok(ReleaseReport {
            previous_slot,
            live_slot,
            modules: updated,
        })
    }
}
