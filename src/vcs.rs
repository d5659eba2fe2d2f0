//! Version control binding of a project module

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::executor::{quote, quote_path, Executor, ShellCommand};

#[derive(Clone)]
pub struct Git {
    executor: Arc<dyn Executor>,
    path: PathBuf,
    name: String,
    url: String,
}

impl Git {
    pub fn new(
        executor: Arc<dyn Executor>,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            path: path.into(),
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn repository_dir(&self) -> PathBuf {
        self.path.join(&self.name)
    }

    async fn exists(&self) -> Result<bool> {
        self.executor
            .probe(ShellCommand::new(format!(
                "test -e {}",
                quote_path(self.repository_dir())
            )))
            .await
    }

    pub async fn clone_repository(&self) -> Result<()> {
        if self.exists().await? {
            return Ok(());
        }

        info!("Cloning {} into {}", self.url, self.repository_dir().display());
        self.executor
            .run(ShellCommand::new(format!(
                "git clone {} {}",
                quote(&self.url),
                quote_path(self.repository_dir())
            )))
            .await?;
        Ok(())
    }

    /// Bring the working copy up to date, optionally pinned to `tag`
    pub async fn update(&self, tag: Option<&str>) -> Result<()> {
        self.clone_repository().await?;

        let repo = self.repository_dir();
        let git = |command: String| ShellCommand::new(command).in_dir(&repo);

        self.executor.run(git("git clean -fd".to_string())).await?;
        self.executor.run(git("git checkout -- .".to_string())).await?;

        match tag {
            // A tag checkout leaves a detached HEAD, where `git pull` has no
            // upstream and fails, so the tag is the final state.
            Some(tag) => {
                info!("Checking out {} in {}", tag, repo.display());
                self.executor.run(git("git fetch --tags".to_string())).await?;
                self.executor
                    .run(git(format!("git checkout {}", shell_words::quote(tag))))
                    .await?;
            }
            None => {
                info!("Pulling {}", repo.display());
                self.executor.run(git("git pull".to_string())).await?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}
