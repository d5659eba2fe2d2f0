//! State shared by the factories during one assembly run

use serde_json::Value;
use std::sync::Arc;

use crate::error::{DeployError, Result};
use crate::executor::Executor;
use crate::factory::system::SystemFactory;
use crate::factory::Factory;
use crate::fs::{EntityDefaults, FileSystem};
use crate::system::System;

/// Holds the parsed config and the single [`System`] built from it
pub struct AssemblyContext {
    config: Value,
    executor: Arc<dyn Executor>,
    defaults: EntityDefaults,
    system: Option<Arc<System>>,
}

impl AssemblyContext {
    /// `config` is the normalized `project` section
    pub fn new(config: Value, executor: Arc<dyn Executor>) -> Result<Self> {
        let defaults = match config.get("system").and_then(|s| s.get("defaults")) {
            Some(defaults) if !defaults.is_null() => serde_json::from_value(defaults.clone())
                .map_err(|e| DeployError::config(format!("Invalid entity defaults: {e}")))?,
            _ => EntityDefaults::default(),
        };

        Ok(Self {
            config,
            executor,
            defaults,
            system: None,
        })
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.executor)
    }

    pub fn defaults(&self) -> &EntityDefaults {
        &self.defaults
    }

    pub fn file_system(&self) -> FileSystem {
        FileSystem::new(self.executor(), self.defaults.clone())
    }

    /// The system built from this config; rebuilt only when `force_new` is set
    pub fn system(&mut self, force_new: bool) -> Result<Arc<System>> {
        if let (Some(system), false) = (&self.system, force_new) {
            return Ok(Arc::clone(system));
        }

        let config = self.config.clone();
        let system = Arc::new(SystemFactory::new().build(&config, self)?);
        self.system = Some(Arc::clone(&system));
        Ok(system)
    }
}
