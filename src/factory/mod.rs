//! Declarative assembly of a release plan from a config tree

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::load_project_config;
use crate::error::Result;
use crate::executor::Executor;
use crate::project::Project;
use crate::system::System;

pub mod components;
pub mod context;
pub mod module;
pub mod system;

pub use components::{DbFactory, GitFactory, HooksFactory, VirtualEnvFactory};
pub use context::AssemblyContext;
pub use module::ModuleFactory;
pub use system::{DaemonFactory, SystemFactory};

/// Builds one piece of the object graph from its config subtree
pub trait Factory {
    type Output;

    fn build(&self, config: &Value, ctx: &mut AssemblyContext) -> Result<Self::Output>;
}

/// Entry point: config document in, runnable [`Project`] out
pub struct ProjectFactory {
    context: AssemblyContext,
    modules: ModuleFactory,
}

impl ProjectFactory {
    /// `config` is the normalized `project` section
    pub fn new(config: Value, executor: Arc<dyn Executor>) -> Result<Self> {
        Ok(Self {
            context: AssemblyContext::new(config, executor)?,
            modules: ModuleFactory::new(),
        })
    }

    pub fn from_file(path: &Path, executor: Arc<dyn Executor>) -> Result<Self> {
        Self::new(load_project_config(path)?, executor)
    }

    pub fn context(&self) -> &AssemblyContext {
        &self.context
    }

    /// The slot manager shared by every module of this assembly
    pub fn system(&mut self, force_new: bool) -> Result<Arc<System>> {
        self.context.system(force_new)
    }

    pub fn build(&mut self) -> Result<Project> {
        let system = self.context.system(false)?;
        let config = self.context.config().clone();
        let modules = self.modules.build_all(&config, &mut self.context)?;
        info!(
            "Assembled project at {} with {} module(s)",
            system.app_directory().display(),
            modules.len()
        );
        Project::new(system, modules)
    }
}
