//! Module assembly keyed by the declared `type`

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::config::value::{as_map, items, optional_str, required, required_str, to_bool};
use crate::error::{DeployError, Result};
use crate::factory::components::{DbFactory, GitFactory, HooksFactory, VirtualEnvFactory};
use crate::factory::{AssemblyContext, Factory};
use crate::fs::{EntityKind, EntityOverrides, FsEntity};
use crate::project::{
    DjangoSettings, FrontendSettings, ModuleKind, ModuleType, ProjectModule, PythonRuntime,
};

type KindBuilder = fn(&Map<String, Value>, &mut AssemblyContext) -> Result<ModuleKind>;

/// Resolves module descriptors into [`ProjectModule`]s
pub struct ModuleFactory {
    registry: HashMap<ModuleType, KindBuilder>,
}

impl Default for ModuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            registry: HashMap::new(),
        };

        factory.register(ModuleType::Generic, |_, _| Ok(ModuleKind::Generic));
        factory.register(ModuleType::Python, |m, ctx| {
            Ok(ModuleKind::Python(python_runtime(m, ctx)?))
        });
        factory.register(ModuleType::Django, |m, ctx| {
            Ok(ModuleKind::Django(python_runtime(m, ctx)?, django_settings(m, ctx)?))
        });
        factory.register(ModuleType::Frontend, |m, _| {
            Ok(ModuleKind::Frontend(frontend_settings(m)?))
        });

        factory
    }

    pub fn register(&mut self, module_type: ModuleType, builder: KindBuilder) {
        self.registry.insert(module_type, builder);
    }

    /// Every module of the `modules.module` section, in declared order
    pub fn build_all(&self, project: &Value, ctx: &mut AssemblyContext) -> Result<Vec<ProjectModule>> {
        let project = as_map(project, "project")?;
        let modules = required(project, "modules", "project")?;
        if !modules.is_object() && !modules.is_array() {
            return Err(DeployError::config(format!(
                "`modules` must be a map or a list, got {modules}"
            )));
        }

        items(modules, "module")
            .into_iter()
            .map(|module| self.build(module, ctx))
            .collect()
    }
}

impl Factory for ModuleFactory {
    type Output = ProjectModule;

    fn build(&self, config: &Value, ctx: &mut AssemblyContext) -> Result<Self::Output> {
        let module = as_map(config, "module")?;
        let module_type: ModuleType = required_str(module, "type", "module")?.parse()?;
        let builder = self
            .registry
            .get(&module_type)
            .ok_or_else(|| DeployError::config(format!("No builder for {module_type} modules")))?;

        let system = ctx.system(false)?;
        let git = GitFactory.build(required(module, "git", "module")?, ctx)?;
        let kind = builder(module, ctx)?;
        let hooks = HooksFactory.build_all(module.get("hooks"), ctx)?;

        let base = optional_str(module, "path")
            .map(PathBuf::from)
            .unwrap_or_else(|| system.app_directory().to_path_buf());
        let container = optional_str(module, "container_name");

        debug!("Assembled {} module at {}", module_type, base.display());
        let mut project_module = ProjectModule::new(base, container.as_deref(), git, system, kind);
        project_module.add_hooks(hooks);
        Ok(project_module)
    }
}

fn python_runtime(module: &Map<String, Value>, ctx: &mut AssemblyContext) -> Result<PythonRuntime> {
    let venv = module.get("virtual_env").cloned().unwrap_or(Value::Null);
    Ok(PythonRuntime {
        virtual_env: VirtualEnvFactory.build(&venv, ctx)?,
        python_rq_file: required_str(module, "python_rq_file", "module")?.into(),
        apt_rq_file: required_str(module, "apt_rq_file", "module")?.into(),
    })
}

fn django_settings(module: &Map<String, Value>, ctx: &mut AssemblyContext) -> Result<DjangoSettings> {
    let media_dir = match module.get("media_dir").filter(|m| !m.is_null()) {
        Some(descriptor) => Some(FsEntity::from_descriptor(
            descriptor,
            &EntityOverrides::kind(EntityKind::Symlink),
            ctx.defaults(),
        )?),
        None => None,
    };

    Ok(DjangoSettings {
        db: DbFactory.build(required(module, "db", "module")?, ctx)?,
        manage_py: required_str(module, "manage_py", "module")?.into(),
        static_dir: optional_str(module, "static_dir")
            .unwrap_or_else(|| DjangoSettings::DEFAULT_STATIC_DIR.to_string())
            .into(),
        media_dir,
        collect_static: module.get("collect_static").map(to_bool).unwrap_or(true),
    })
}

fn frontend_settings(module: &Map<String, Value>) -> Result<FrontendSettings> {
    Ok(FrontendSettings {
        npm_root: required_str(module, "npm_root", "module")?.into(),
        apt_rq_file: required_str(module, "apt_rq_file", "module")?.into(),
        build_tool: optional_str(module, "build_tool")
            .unwrap_or_else(|| FrontendSettings::DEFAULT_BUILD_TOOL.to_string()),
        build_command: optional_str(module, "build_command")
            .unwrap_or_else(|| FrontendSettings::DEFAULT_BUILD_COMMAND.to_string()),
    })
}
