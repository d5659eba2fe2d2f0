//! Python virtual environment living inside a module location

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::executor::{quote, quote_path, Executor, ShellCommand};

#[derive(Clone)]
pub struct VirtualEnv {
    executor: Arc<dyn Executor>,
    path: PathBuf,
    name: String,
    python: String,
}

impl VirtualEnv {
    pub const DEFAULT_NAME: &'static str = ".virtualenv";
    pub const DEFAULT_PYTHON: &'static str = "/usr/bin/python3";

    pub fn new(executor: Arc<dyn Executor>, path: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            path: path.into(),
            name: Self::DEFAULT_NAME.to_string(),
            python: Self::DEFAULT_PYTHON.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> PathBuf {
        self.path.join(&self.name)
    }

    pub fn python(&self) -> PathBuf {
        self.directory().join("bin").join("python")
    }

    pub async fn exists(&self) -> Result<bool> {
        self.executor
            .probe(ShellCommand::new(format!("test -e {}", quote_path(self.python()))))
            .await
    }

    /// Run `command` with the environment activated
    pub async fn run(&self, command: impl Into<String>) -> Result<()> {
        let activate = format!(
            "source {}",
            quote_path(self.directory().join("bin").join("activate"))
        );
        self.executor
            .run(ShellCommand::new(command).prefix(activate))
            .await?;
        Ok(())
    }

    pub async fn create(&self) -> Result<()> {
        if self.exists().await? {
            return Ok(());
        }

        info!("Creating virtual environment {}", self.directory().display());
        self.executor
            .run(
                ShellCommand::new(format!(
                    "virtualenv -p {} {}",
                    shell_words::quote(&self.python),
                    quote(&self.name)
                ))
                .in_dir(&self.path),
            )
            .await?;
        Ok(())
    }

    pub async fn install_packages(&self, packages_file: &Path) -> Result<()> {
        self.create().await?;

        info!("Installing python packages from {}", packages_file.display());
        self.run("pip install -U pip setuptools").await?;
        self.run(format!("pip install -r {}", quote_path(packages_file)))
            .await
    }
}

impl std::fmt::Debug for VirtualEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualEnv")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("python", &self.python)
            .finish()
    }
}
