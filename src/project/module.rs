//! Deployable project modules and their intrinsic hooks

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::database::Database;
use crate::error::{DeployError, Result};
use crate::executor::{quote_path, Executor, ShellCommand};
use crate::fs::FsEntity;
use crate::project::hooks::{Hook, HookPipeline, Priority};
use crate::system::System;
use crate::vcs::Git;
use crate::virtualenv::VirtualEnv;

/// Type tags accepted in a module descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleType {
    Generic,
    Python,
    Django,
    Frontend,
}

impl ModuleType {
    pub const ALL: [ModuleType; 4] = [
        ModuleType::Generic,
        ModuleType::Python,
        ModuleType::Django,
        ModuleType::Frontend,
    ];
}

impl FromStr for ModuleType {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "generic" | "projectmodule" => Ok(ModuleType::Generic),
            "python" | "pythonprojectmodule" => Ok(ModuleType::Python),
            "django" | "djangoprojectmodule" => Ok(ModuleType::Django),
            "frontend" | "frontendprojectmodule" => Ok(ModuleType::Frontend),
            other => Err(DeployError::config(format!("Unknown module type: {other}"))),
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleType::Generic => "generic",
            ModuleType::Python => "python",
            ModuleType::Django => "django",
            ModuleType::Frontend => "frontend",
        };
        write!(f, "{name}")
    }
}

/// Interpreted-runtime part shared by python and django modules
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    pub virtual_env: VirtualEnv,
    pub python_rq_file: PathBuf,
    pub apt_rq_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DjangoSettings {
    pub db: Arc<dyn Database>,
    pub manage_py: PathBuf,
    pub static_dir: PathBuf,
    pub media_dir: Option<FsEntity>,
    pub collect_static: bool,
}

impl DjangoSettings {
    pub const DEFAULT_STATIC_DIR: &'static str = "static";
}

#[derive(Debug, Clone)]
pub struct FrontendSettings {
    pub npm_root: PathBuf,
    pub apt_rq_file: PathBuf,
    pub build_tool: String,
    pub build_command: String,
}

impl FrontendSettings {
    pub const DEFAULT_BUILD_TOOL: &'static str = "grunt-cli";
    pub const DEFAULT_BUILD_COMMAND: &'static str = "grunt";
}

#[derive(Debug, Clone)]
pub enum ModuleKind {
    Generic,
    Python(PythonRuntime),
    Django(PythonRuntime, DjangoSettings),
    Frontend(FrontendSettings),
}

impl ModuleKind {
    pub fn module_type(&self) -> ModuleType {
        match self {
            ModuleKind::Generic => ModuleType::Generic,
            ModuleKind::Python(_) => ModuleType::Python,
            ModuleKind::Django(..) => ModuleType::Django,
            ModuleKind::Frontend(_) => ModuleType::Frontend,
        }
    }

    /// Hooks every module of this kind runs, in order
    pub fn intrinsic_hooks(&self) -> Vec<Hook> {
        match self {
            ModuleKind::Generic => Vec::new(),
            ModuleKind::Python(_) => vec![Hook::InstallSystemPackages, Hook::InstallPythonPackages],
            ModuleKind::Django(_, django) => {
                let mut hooks = vec![
                    Hook::InstallSystemPackages,
                    Hook::InstallPythonPackages,
                    Hook::BackupDatabase,
                    Hook::Migrate,
                    Hook::EnsureMediaRoot,
                ];
                if django.collect_static {
                    hooks.push(Hook::EnsureStaticDir);
                    hooks.push(Hook::CollectStatic);
                }
                hooks
            }
            ModuleKind::Frontend(_) => vec![
                Hook::InstallSystemPackages,
                Hook::InstallFrontendTool,
                Hook::InstallFrontendPackages,
                Hook::BuildFrontend,
            ],
        }
    }

    fn runtime(&self) -> Option<&PythonRuntime> {
        match self {
            ModuleKind::Python(runtime) | ModuleKind::Django(runtime, _) => Some(runtime),
            _ => None,
        }
    }

    fn runtime_mut(&mut self) -> Option<&mut PythonRuntime> {
        match self {
            ModuleKind::Python(runtime) | ModuleKind::Django(runtime, _) => Some(runtime),
            _ => None,
        }
    }
}

/// One deployable unit, located at `<base>/<container_name>`
#[derive(Debug, Clone)]
pub struct ProjectModule {
    base: PathBuf,
    container_name: String,
    git: Git,
    system: Arc<System>,
    kind: ModuleKind,
    hooks: HookPipeline<Hook>,
}

impl ProjectModule {
    pub const DEFAULT_CONTAINER: &'static str = "data";

    pub fn new(
        base: impl Into<PathBuf>,
        container_name: Option<&str>,
        git: Git,
        system: Arc<System>,
        kind: ModuleKind,
    ) -> Self {
        let hooks = HookPipeline::new(kind.intrinsic_hooks());
        let mut module = Self {
            base: base.into(),
            container_name: container_name
                .filter(|c| !c.is_empty())
                .unwrap_or(Self::DEFAULT_CONTAINER)
                .to_string(),
            git,
            system,
            kind,
            hooks,
        };
        module.propagate_location();
        module
    }

    pub fn module_type(&self) -> ModuleType {
        self.kind.module_type()
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    pub fn virtual_env(&self) -> Option<&VirtualEnv> {
        self.kind.runtime().map(|runtime| &runtime.virtual_env)
    }

    pub fn hooks(&self) -> &[Hook] {
        self.hooks.as_slice()
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn location(&self) -> PathBuf {
        self.base.join(&self.container_name)
    }

    /// Move the module to a new base; the bindings follow
    pub fn set_base(&mut self, base: impl Into<PathBuf>) {
        self.base = base.into();
        self.propagate_location();
    }

    fn propagate_location(&mut self) {
        let location = self.location();
        self.git.set_path(&location);
        if let Some(runtime) = self.kind.runtime_mut() {
            runtime.virtual_env.set_path(&location);
        }
    }

    pub fn add_hooks<I, P>(&mut self, tagged: I)
    where
        I: IntoIterator<Item = (P, Hook)>,
        P: Into<Priority>,
    {
        self.hooks.add_hooks(tagged);
    }

    /// Update sources, then run every hook
    pub async fn update(&self, tag: Option<&str>) -> Result<()> {
        info!(
            "Updating {} module at {}",
            self.module_type(),
            self.location().display()
        );
        self.git.update(tag).await?;
        self.run_hooks().await
    }

    /// Run hooks in order, stopping at the first failure
    pub async fn run_hooks(&self) -> Result<()> {
        for hook in &self.hooks {
            info!("Running hook {} for {}", hook, self.location().display());
            self.run_hook(hook).await?;
        }
        Ok(())
    }

    fn executor(&self) -> &dyn Executor {
        self.system.fs().executor().as_ref()
    }

    fn mismatch(&self, hook: &Hook) -> DeployError {
        DeployError::config(format!(
            "Hook {} is not available for {} modules",
            hook,
            self.module_type()
        ))
    }

    pub async fn run_hook(&self, hook: &Hook) -> Result<()> {
        let location = self.location();
        let fs = self.system.fs();

        match (hook, &self.kind) {
            (Hook::InstallSystemPackages, ModuleKind::Python(runtime))
            | (Hook::InstallSystemPackages, ModuleKind::Django(runtime, _)) => {
                self.system
                    .install_system_packages(&location.join(&runtime.apt_rq_file))
                    .await
            }
            (Hook::InstallSystemPackages, ModuleKind::Frontend(frontend)) => {
                self.system
                    .install_system_packages(&location.join(&frontend.apt_rq_file))
                    .await
            }
            (Hook::InstallPythonPackages, ModuleKind::Python(runtime))
            | (Hook::InstallPythonPackages, ModuleKind::Django(runtime, _)) => {
                runtime
                    .virtual_env
                    .install_packages(&location.join(&runtime.python_rq_file))
                    .await
            }
            (Hook::BackupDatabase, ModuleKind::Django(_, django)) => {
                django.db.create_backup().await
            }
            (Hook::Migrate, ModuleKind::Django(runtime, django)) => {
                let manage_py = location.join(&django.manage_py);
                runtime
                    .virtual_env
                    .run(format!("python {} migrate", quote_path(manage_py)))
                    .await
            }
            (Hook::EnsureMediaRoot, ModuleKind::Django(_, django)) => match &django.media_dir {
                Some(media_dir) => fs.replace_symlink(&media_dir.anchored_at(&location), false).await,
                None => Ok(()),
            },
            (Hook::EnsureStaticDir, ModuleKind::Django(_, django)) => {
                let static_path = location.join(&django.static_dir);
                if !fs.exists(&static_path).await? {
                    fs.make_dirs(&static_path, false).await?;
                }
                Ok(())
            }
            (Hook::CollectStatic, ModuleKind::Django(runtime, django)) => {
                let manage_py = location.join(&django.manage_py);
                runtime
                    .virtual_env
                    .run(format!(
                        "python {} collectstatic --noinput",
                        quote_path(manage_py)
                    ))
                    .await
            }
            (Hook::InstallFrontendTool, ModuleKind::Frontend(frontend)) => {
                self.executor()
                    .run(
                        ShellCommand::new(format!(
                            "npm install -g {}",
                            shell_words::quote(&frontend.build_tool)
                        ))
                        .in_dir(location.join(&frontend.npm_root))
                        .privileged(),
                    )
                    .await?;
                Ok(())
            }
            (Hook::InstallFrontendPackages, ModuleKind::Frontend(frontend)) => {
                self.executor()
                    .run(ShellCommand::new("npm install").in_dir(location.join(&frontend.npm_root)))
                    .await?;
                Ok(())
            }
            (Hook::BuildFrontend, ModuleKind::Frontend(frontend)) => {
                self.executor()
                    .run(
                        ShellCommand::new(frontend.build_command.clone())
                            .in_dir(location.join(&frontend.npm_root)),
                    )
                    .await?;
                Ok(())
            }
            (Hook::CreateSymlinks(items), _) => {
                for item in items {
                    fs.replace_symlink(&item.anchored_at(&location), false).await?;
                }
                Ok(())
            }
            (hook, _) => Err(self.mismatch(hook)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DatabaseSettings, Postgres};
    use crate::executor::RecordingExecutor;
    use crate::fs::{EntityDefaults, FileSystem};

    fn system(executor: Arc<RecordingExecutor>) -> Arc<System> {
        let fs = FileSystem::new(executor, EntityDefaults::default());
        Arc::new(System::new(fs, Vec::new(), "/srv/app", Vec::new(), Vec::new()))
    }

    fn git(executor: Arc<RecordingExecutor>) -> Git {
        Git::new(executor, "", "src", "https://example.com/app.git")
    }

    fn runtime(executor: Arc<RecordingExecutor>) -> PythonRuntime {
        PythonRuntime {
            virtual_env: VirtualEnv::new(executor, ""),
            python_rq_file: "src/requirements.txt".into(),
            apt_rq_file: "src/apt.txt".into(),
        }
    }

    fn django(
        executor: Arc<RecordingExecutor>,
        media_dir: Option<FsEntity>,
        collect_static: bool,
    ) -> ProjectModule {
        let db = Postgres::new(
            executor.clone(),
            DatabaseSettings::new("/srv/backup", "app", "app", "secret"),
        )
        .unwrap();
        let kind = ModuleKind::Django(
            runtime(executor.clone()),
            DjangoSettings {
                db: Arc::new(db),
                manage_py: "src/manage.py".into(),
                static_dir: DjangoSettings::DEFAULT_STATIC_DIR.into(),
                media_dir,
                collect_static,
            },
        );
        ProjectModule::new(
            "/srv/app2",
            None,
            git(executor.clone()),
            system(executor),
            kind,
        )
    }

    #[test]
    fn test_intrinsic_hooks_per_kind() {
        let executor = Arc::new(RecordingExecutor::new());

        assert!(ModuleKind::Generic.intrinsic_hooks().is_empty());
        assert_eq!(
            ModuleKind::Python(runtime(executor.clone())).intrinsic_hooks(),
            vec![Hook::InstallSystemPackages, Hook::InstallPythonPackages]
        );
        assert_eq!(
            django(executor.clone(), None, true).hooks(),
            &[
                Hook::InstallSystemPackages,
                Hook::InstallPythonPackages,
                Hook::BackupDatabase,
                Hook::Migrate,
                Hook::EnsureMediaRoot,
                Hook::EnsureStaticDir,
                Hook::CollectStatic,
            ]
        );
        assert_eq!(django(executor, None, false).hooks().len(), 5);
    }

    #[test]
    fn test_location_defaults_to_data_container() {
        let executor = Arc::new(RecordingExecutor::new());
        let module = ProjectModule::new(
            "/srv/app1",
            Some(""),
            git(executor.clone()),
            system(executor),
            ModuleKind::Generic,
        );
        assert_eq!(module.location(), PathBuf::from("/srv/app1/data"));
    }

    #[test]
    fn test_set_base_moves_git_and_virtualenv() {
        let executor = Arc::new(RecordingExecutor::new());
        let mut module = django(executor, None, true);

        module.set_base("/srv/app1");

        let location = PathBuf::from("/srv/app1/data");
        assert_eq!(module.location(), location);
        assert_eq!(module.git().path(), location);
        assert_eq!(module.virtual_env().unwrap().path(), location);
        assert_eq!(module.git().repository_dir(), location.join("src"));
    }

    #[test]
    fn test_config_hooks_wrap_intrinsic_hooks() {
        let executor = Arc::new(RecordingExecutor::new());
        let mut module = ProjectModule::new(
            "/srv/app2",
            None,
            git(executor.clone()),
            system(executor.clone()),
            ModuleKind::Python(runtime(executor)),
        );
        let before = Hook::CreateSymlinks(Vec::new());
        module.add_hooks([(Priority::BEFORE, before.clone())]);

        assert_eq!(
            module.hooks(),
            &[before, Hook::InstallSystemPackages, Hook::InstallPythonPackages]
        );
    }

    #[tokio::test]
    async fn test_run_hooks_stops_at_first_failure() {
        let executor = Arc::new(RecordingExecutor::new().fail_on("apt-get"));
        let module = ProjectModule::new(
            "/srv/app2",
            None,
            git(executor.clone()),
            system(executor.clone()),
            ModuleKind::Python(runtime(executor.clone())),
        );

        let result = module.run_hooks().await;

        assert!(matches!(result, Err(DeployError::RemoteCommand { .. })));
        assert!(!executor.commands().iter().any(|c| c.starts_with("pip")));
    }

    #[tokio::test]
    async fn test_media_root_is_anchored_at_location() {
        let executor = Arc::new(RecordingExecutor::new());
        let defaults = EntityDefaults::default();
        let media = FsEntity::symlink("/srv/shared/media", "media", &defaults).unwrap();
        let module = django(executor.clone(), Some(media), true);

        module.run_hook(&Hook::EnsureMediaRoot).await.unwrap();

        assert_eq!(
            executor.link_target("/srv/app2/data/media"),
            Some(PathBuf::from("/srv/shared/media"))
        );
    }

    #[tokio::test]
    async fn test_media_root_without_descriptor_does_nothing() {
        let executor = Arc::new(RecordingExecutor::new());
        let module = django(executor.clone(), None, true);

        module.run_hook(&Hook::EnsureMediaRoot).await.unwrap();

        assert!(executor.history().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_runs_under_virtualenv() {
        let executor = Arc::new(RecordingExecutor::new());
        let module = django(executor.clone(), None, false);

        module.run_hook(&Hook::Migrate).await.unwrap();

        let history = executor.history();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].command,
            "python \"/srv/app2/data/src/manage.py\" migrate"
        );
        assert_eq!(
            history[0].prefixes,
            vec!["source \"/srv/app2/data/.virtualenv/bin/activate\"".to_string()]
        );
    }

    #[tokio::test]
    async fn test_frontend_steps_run_in_npm_root() {
        let executor = Arc::new(RecordingExecutor::new());
        let kind = ModuleKind::Frontend(FrontendSettings {
            npm_root: "src/static".into(),
            apt_rq_file: "src/apt.txt".into(),
            build_tool: FrontendSettings::DEFAULT_BUILD_TOOL.into(),
            build_command: FrontendSettings::DEFAULT_BUILD_COMMAND.into(),
        });
        let module = ProjectModule::new(
            "/srv/app2",
            Some("front"),
            git(executor.clone()),
            system(executor.clone()),
            kind,
        );

        module.run_hooks().await.unwrap();

        let history = executor.history();
        let npm_root = PathBuf::from("/srv/app2/front/src/static");
        let tool = history
            .iter()
            .find(|c| c.command == "npm install -g grunt-cli")
            .unwrap();
        assert!(tool.privileged);
        assert_eq!(tool.cwd.as_deref(), Some(npm_root.as_path()));
        assert_eq!(history.last().unwrap().command, "grunt");
    }

    #[tokio::test]
    async fn test_hook_of_another_kind_is_rejected() {
        let executor = Arc::new(RecordingExecutor::new());
        let module = ProjectModule::new(
            "/srv/app2",
            None,
            git(executor.clone()),
            system(executor),
            ModuleKind::Generic,
        );

        let result = module.run_hook(&Hook::Migrate).await;
        assert!(matches!(result, Err(DeployError::Configuration(_))));
    }
}
