//! Database bindings with backup rotation

use async_trait::async_trait;
use chrono::Local;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DeployError, Result};
use crate::executor::{quote, quote_path, Executor, ShellCommand};

/// Connection settings plus the directory and retention of backups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub backup_dir: PathBuf,
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub backup_count: usize,
}

impl DatabaseSettings {
    pub const DEFAULT_BACKUP_COUNT: usize = 5;
    pub const DEFAULT_HOST: &'static str = "localhost";

    pub fn new(
        backup_dir: impl Into<PathBuf>,
        name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            name: name.into(),
            user: user.into(),
            password: password.into(),
            host: Self::DEFAULT_HOST.to_string(),
            port: String::new(),
            backup_count: Self::DEFAULT_BACKUP_COUNT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backup_count < 2 {
            return Err(DeployError::config(format!(
                "Backups count can't be less than 2, got {}",
                self.backup_count
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    Postgres,
}

impl FromStr for DatabaseKind {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DatabaseKind::Postgres),
            other => Err(DeployError::config(format!("Unknown database type: {other}"))),
        }
    }
}

#[async_trait]
pub trait Database: Send + Sync + fmt::Debug {
    fn settings(&self) -> &DatabaseSettings;

    fn executor(&self) -> &dyn Executor;

    /// Write one new dump into the backup directory and return its file name
    async fn dump(&self) -> Result<String>;

    fn backup_dir(&self) -> &Path {
        &self.settings().backup_dir
    }

    fn backup_count(&self) -> usize {
        self.settings().backup_count
    }

    /// Keep no more than `backup_count` dumps besides `fresh`, the one just written
    async fn rotate_backups(&self, fresh: &str) -> Result<()> {
        let listing = self
            .executor()
            .execute(&ShellCommand::new(format!(
                "ls -- {}",
                quote_path(self.backup_dir())
            )))
            .await?;
        if !listing.success() {
            debug!("No backups listed in {}", self.backup_dir().display());
            return Ok(());
        }

        let mut backups: Vec<&str> = listing
            .stdout
            .split_whitespace()
            .filter(|name| *name != fresh)
            .collect();
        if backups.len() <= self.backup_count() {
            return Ok(());
        }

        backups.sort_unstable();
        let stale = &backups[..backups.len() - self.backup_count()];
        info!(
            "Removing {} old backups from {}",
            stale.len(),
            self.backup_dir().display()
        );

        let operands: Vec<String> = stale.iter().map(|name| quote(name)).collect();
        self.executor()
            .run(
                ShellCommand::new(format!("rm -- {}", operands.join(" ")))
                    .in_dir(self.backup_dir()),
            )
            .await?;
        Ok(())
    }

    async fn create_backup(&self) -> Result<()> {
        let fresh = self.dump().await?;
        self.rotate_backups(&fresh).await
    }
}

#[derive(Clone)]
pub struct Postgres {
    executor: Arc<dyn Executor>,
    settings: DatabaseSettings,
}

impl Postgres {
    pub fn new(executor: Arc<dyn Executor>, settings: DatabaseSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { executor, settings })
    }

    fn dump_command(&self, file: &str) -> String {
        let s = &self.settings;
        let mut command = format!("pg_dump --clean -h {}", shell_words::quote(&s.host));
        if !s.port.is_empty() {
            command.push_str(&format!(" -p {}", shell_words::quote(&s.port)));
        }
        command.push_str(&format!(
            " -U {} {} | gzip > {}",
            shell_words::quote(&s.user),
            shell_words::quote(&s.name),
            quote(file)
        ));
        command
    }
}

#[async_trait]
impl Database for Postgres {
    fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    async fn dump(&self) -> Result<String> {
        let stamp = Local::now().format("%Y_%m_%d_%H_%M_%S");
        let file = format!("dump_sql_{stamp}_db.sq.gz");
        info!("Dumping database {} to {}", self.settings.name, file);

        self.executor
            .run(
                ShellCommand::new(self.dump_command(&file))
                    .in_dir(&self.settings.backup_dir)
                    .env("PGPASSWORD", &self.settings.password),
            )
            .await?;
        Ok(file)
    }
}

impl fmt::Debug for Postgres {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Postgres")
            .field("backup_dir", &self.settings.backup_dir)
            .field("name", &self.settings.name)
            .field("user", &self.settings.user)
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("backup_count", &self.settings.backup_count)
            .finish()
    }
}
