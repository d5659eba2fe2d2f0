//! Sub-factories for the bindings a module is built from

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::value::{as_list, as_map, items, optional_str, required_str, scalar};
use crate::database::{Database, DatabaseKind, DatabaseSettings, Postgres};
use crate::error::{DeployError, Result};
use crate::factory::{AssemblyContext, Factory};
use crate::fs::{EntityKind, EntityOverrides, FsEntity};
use crate::project::{Hook, Priority};
use crate::vcs::Git;
use crate::virtualenv::VirtualEnv;

/// `{name, url, path?}`
#[derive(Debug, Default)]
pub struct GitFactory;

impl Factory for GitFactory {
    type Output = Git;

    fn build(&self, config: &Value, ctx: &mut AssemblyContext) -> Result<Self::Output> {
        let git = as_map(config, "git")?;
        Ok(Git::new(
            ctx.executor(),
            optional_str(git, "path").unwrap_or_default(),
            required_str(git, "name", "git")?,
            required_str(git, "url", "git")?,
        ))
    }
}

/// `{name?, python?, path?}`; an absent or empty section yields the defaults
#[derive(Debug, Default)]
pub struct VirtualEnvFactory;

impl Factory for VirtualEnvFactory {
    type Output = VirtualEnv;

    fn build(&self, config: &Value, ctx: &mut AssemblyContext) -> Result<Self::Output> {
        if config.is_null() {
            return Ok(VirtualEnv::new(ctx.executor(), PathBuf::new()));
        }

        let venv = as_map(config, "virtual_env")?;
        let mut env = VirtualEnv::new(
            ctx.executor(),
            optional_str(venv, "path").unwrap_or_default(),
        );
        if let Some(name) = optional_str(venv, "name") {
            env = env.with_name(name);
        }
        if let Some(python) = optional_str(venv, "python") {
            env = env.with_python(python);
        }
        Ok(env)
    }
}

/// `{type, path, name, user, password?, host?, port?, backup_count?}`
#[derive(Debug, Default)]
pub struct DbFactory;

impl Factory for DbFactory {
    type Output = Arc<dyn Database>;

    fn build(&self, config: &Value, ctx: &mut AssemblyContext) -> Result<Self::Output> {
        let db = as_map(config, "db")?;
        let kind: DatabaseKind = required_str(db, "type", "db")?.parse()?;

        let mut settings = DatabaseSettings::new(
            required_str(db, "path", "db")?,
            required_str(db, "name", "db")?,
            required_str(db, "user", "db")?,
            optional_str(db, "password").unwrap_or_default(),
        );
        if let Some(host) = optional_str(db, "host") {
            settings.host = host;
        }
        if let Some(port) = optional_str(db, "port") {
            settings.port = port;
        }
        if let Some(count) = optional_str(db, "backup_count") {
            settings.backup_count = count.trim().parse().map_err(|_| {
                DeployError::config(format!("Invalid backup_count: {count}"))
            })?;
        }

        match kind {
            DatabaseKind::Postgres => Ok(Arc::new(Postgres::new(ctx.executor(), settings)?)),
        }
    }
}

/// One `hooks.hook` record: `{type: create_symlink, priority?, item: ...}`
#[derive(Debug, Default)]
pub struct HooksFactory;

impl HooksFactory {
    /// All hooks of a module's `hooks` section, in declared order
    pub fn build_all(
        &self,
        config: Option<&Value>,
        ctx: &mut AssemblyContext,
    ) -> Result<Vec<(Priority, Hook)>> {
        config
            .map(|hooks| items(hooks, "hook"))
            .unwrap_or_default()
            .into_iter()
            .map(|hook| self.build(hook, ctx))
            .collect()
    }
}

impl Factory for HooksFactory {
    type Output = (Priority, Hook);

    fn build(&self, config: &Value, ctx: &mut AssemblyContext) -> Result<Self::Output> {
        let hook = as_map(config, "hook")?;
        let hook_type = required_str(hook, "type", "hook")?;

        let priority = match hook.get("priority").and_then(scalar) {
            Some(p) => p
                .trim()
                .parse::<i64>()
                .map(Priority::from)
                .map_err(|_| DeployError::config(format!("Invalid hook priority: {p}")))?,
            None => Priority::default(),
        };

        match hook_type.as_str() {
            "create_symlink" => {
                let symlink = EntityOverrides::kind(EntityKind::Symlink);
                let links = hook
                    .get("item")
                    .map(as_list)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|item| FsEntity::from_descriptor(item, &symlink, ctx.defaults()))
                    .collect::<Result<Vec<_>>>()?;
                Ok((priority, Hook::CreateSymlinks(links)))
            }
            other => Err(DeployError::config(format!("Unknown hook type: {other}"))),
        }
    }
}
