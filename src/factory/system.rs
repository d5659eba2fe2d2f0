//! Assembly of the slot manager and its daemons

use serde_json::Value;
use std::collections::HashMap;

use crate::config::value::{as_map, items, optional_str, required, required_str, scalar};
use crate::error::{DeployError, Result};
use crate::factory::{AssemblyContext, Factory};
use crate::fs::{EntityKind, EntityOverrides, FsEntity};
use crate::system::{Daemon, Supervisor, System, SystemService};

type DaemonBuilder = fn(Option<&str>) -> Result<Box<dyn Daemon>>;

/// Builds daemons from `"nginx"` or `{text: "supervisor", name: "celery"}`
pub struct DaemonFactory {
    registry: HashMap<&'static str, DaemonBuilder>,
}

impl Default for DaemonFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            registry: HashMap::new(),
        };

        factory.register("nginx", |_| Ok(Box::new(SystemService::nginx())));
        factory.register("uwsgi", |_| Ok(Box::new(SystemService::uwsgi())));
        factory.register("service", |name| {
            let name = name.ok_or_else(|| DeployError::config("Service daemon needs a `name`"))?;
            Ok(Box::new(SystemService::new(name)))
        });
        factory.register("supervisor", |group| Ok(Box::new(Supervisor::new(group))));

        factory
    }

    pub fn register(&mut self, daemon_type: &'static str, builder: DaemonBuilder) {
        self.registry.insert(daemon_type, builder);
    }
}

impl Factory for DaemonFactory {
    type Output = Box<dyn Daemon>;

    fn build(&self, config: &Value, _ctx: &mut AssemblyContext) -> Result<Self::Output> {
        let (daemon_type, name) = match config {
            Value::Object(map) => (
                map.get("text")
                    .or_else(|| map.get("type"))
                    .and_then(scalar)
                    .ok_or_else(|| {
                        DeployError::config(format!("Daemon descriptor has no type: {config}"))
                    })?,
                optional_str(map, "name"),
            ),
            other => (
                scalar(other).ok_or_else(|| {
                    DeployError::config(format!("Invalid daemon descriptor: {other}"))
                })?,
                None,
            ),
        };

        let builder = self
            .registry
            .get(daemon_type.trim().to_lowercase().as_str())
            .ok_or_else(|| DeployError::config(format!("Unknown daemon type: {daemon_type}")))?;
        builder(name.as_deref())
    }
}

pub struct SystemFactory {
    daemons: DaemonFactory,
}

impl Default for SystemFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemFactory {
    pub fn new() -> Self {
        Self {
            daemons: DaemonFactory::new(),
        }
    }
}

impl Factory for SystemFactory {
    type Output = System;

    /// `config` is the whole `project` section
    fn build(&self, config: &Value, ctx: &mut AssemblyContext) -> Result<Self::Output> {
        let project = as_map(config, "project")?;
        let system = as_map(required(project, "system", "project")?, "system")?;

        let app_dir = required_str(system, "app_dir", "system")?;

        let directory = EntityOverrides::kind(EntityKind::Directory);
        let tree = system
            .get("project_tree")
            .map(|tree| items(tree, "item"))
            .unwrap_or_default()
            .into_iter()
            .map(|item| FsEntity::from_descriptor(item, &directory, ctx.defaults()))
            .collect::<Result<Vec<_>>>()?;

        let log_files = system
            .get("log_files")
            .map(|logs| items(logs, "item"))
            .unwrap_or_default()
            .into_iter()
            .map(|item| FsEntity::from_descriptor(item, &EntityOverrides::default(), ctx.defaults()))
            .collect::<Result<Vec<_>>>()?;

        let daemons = system
            .get("daemons")
            .map(|daemons| items(daemons, "daemon"))
            .unwrap_or_default()
            .into_iter()
            .map(|item| self.daemons.build(item, ctx))
            .collect::<Result<Vec<_>>>()?;

        Ok(System::new(ctx.file_system(), tree, app_dir, log_files, daemons))
    }
}
