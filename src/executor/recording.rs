//! In-memory executor that records commands and simulates their filesystem effects
//!
//! Backs `--dry-run` and the test suite. Only the command shapes the core
//! itself emits are understood; anything else is recorded and succeeds.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::executor::{CommandOutput, Executor, ShellCommand};

const PROBES: &[&str] = &["test", "readlink", "ls"];

#[derive(Debug, Default)]
struct SimulatedHost {
    paths: BTreeSet<PathBuf>,
    links: BTreeMap<PathBuf, PathBuf>,
    listings: BTreeMap<PathBuf, Vec<String>>,
    failures: Vec<String>,
    history: Vec<ShellCommand>,
}

impl SimulatedHost {
    fn add_path(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() || ancestor == Path::new("/") {
                break;
            }
            self.paths.insert(ancestor.to_path_buf());
        }
    }

    /// Regular file written by a command, visible to later `ls` of its directory
    fn add_file(&mut self, path: &Path) {
        self.add_path(path);
        if let (Some(dir), Some(name)) = (path.parent(), path.file_name()) {
            let name = name.to_string_lossy().into_owned();
            let listing = self.listings.entry(dir.to_path_buf()).or_default();
            if !listing.contains(&name) {
                listing.push(name);
            }
        }
    }

    fn exists(&self, path: &Path) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        self.links
            .get(path)
            .map(|target| self.paths.contains(target))
            .unwrap_or(false)
    }

    fn apply(&mut self, command: &ShellCommand) -> CommandOutput {
        let rendered = command.render();
        if self.failures.iter().any(|pattern| rendered.contains(pattern)) {
            return CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("simulated failure: {}", command.command),
            };
        }

        let words = match shell_words::split(&command.command) {
            Ok(words) => words,
            Err(_) => return CommandOutput::default(),
        };
        let cwd = command.cwd.clone().unwrap_or_default();
        if let Some(target) = redirect_target(&words) {
            self.add_file(&cwd.join(target));
        }
        let operands: Vec<PathBuf> = words
            .iter()
            .skip(1)
            .filter(|w| !w.starts_with('-'))
            .map(|w| cwd.join(w))
            .collect();

        match words.first().map(String::as_str) {
            Some("test") => {
                let flag = words.get(1).map(String::as_str).unwrap_or("-e");
                let found = operands.first().map_or(false, |p| match flag {
                    "-L" | "-h" => self.links.contains_key(p),
                    _ => self.exists(p),
                });
                status(found)
            }
            Some("readlink") => match operands.first().and_then(|p| self.links.get(p)) {
                Some(target) => CommandOutput {
                    exit_code: 0,
                    stdout: format!("{}\n", target.display()),
                    stderr: String::new(),
                },
                None => status(false),
            },
            Some("ls") => match operands.first() {
                Some(dir) if self.listings.contains_key(dir) => CommandOutput {
                    exit_code: 0,
                    stdout: self.listings[dir].join("\n"),
                    stderr: String::new(),
                },
                Some(dir) => status(self.exists(dir)),
                None => status(true),
            },
            Some("mkdir") | Some("touch") => {
                for path in &operands {
                    self.add_path(path);
                }
                status(true)
            }
            Some("ln") if operands.len() >= 2 => {
                self.links
                    .insert(operands[operands.len() - 1].clone(), operands[0].clone());
                status(true)
            }
            Some("rm") => {
                if let Some(listing) = self.listings.get_mut(&cwd) {
                    listing.retain(|entry| !operands.contains(&cwd.join(entry)));
                }
                for path in &operands {
                    self.paths.remove(path);
                }
                status(true)
            }
            Some("git") if words.get(1).map(String::as_str) == Some("clone") => {
                if let Some(dest) = operands.last() {
                    self.add_path(dest);
                }
                status(true)
            }
            Some("virtualenv") | Some("/usr/bin/virtualenv") => {
                if let Some(env_dir) = operands.last() {
                    self.add_path(&env_dir.join("bin").join("python"));
                }
                status(true)
            }
            _ => status(true),
        }
    }
}

/// Output file of a `> file` or `>> file` redirection
fn redirect_target(words: &[String]) -> Option<&str> {
    words
        .windows(2)
        .find(|pair| pair[0] == ">" || pair[0] == ">>")
        .map(|pair| pair[1].as_str())
}

fn status(ok: bool) -> CommandOutput {
    CommandOutput {
        exit_code: if ok { 0 } else { 1 },
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[derive(Debug, Default)]
pub struct RecordingExecutor {
    host: Mutex<SimulatedHost>,
    echo: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print every command as it is issued
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.host_mut().add_path(path.as_ref());
        self
    }

    pub fn with_link(mut self, link: impl AsRef<Path>, target: impl AsRef<Path>) -> Self {
        self.host_mut()
            .links
            .insert(link.as_ref().to_path_buf(), target.as_ref().to_path_buf());
        self
    }

    pub fn with_listing<I, S>(mut self, dir: impl AsRef<Path>, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let host = self.host_mut();
        host.add_path(dir.as_ref());
        host.listings.insert(
            dir.as_ref().to_path_buf(),
            entries.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Fail every command whose rendered script contains `pattern`
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.host_mut().failures.push(pattern.into());
        self
    }

    pub fn history(&self) -> Vec<ShellCommand> {
        self.host().history.clone()
    }

    /// Bare command strings, in issue order
    pub fn commands(&self) -> Vec<String> {
        self.host()
            .history
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    /// Issued commands that can change the target, i.e. everything except probes
    pub fn mutations(&self) -> Vec<ShellCommand> {
        self.host()
            .history
            .iter()
            .filter(|c| {
                let program = c.command.split_whitespace().next().unwrap_or_default();
                !PROBES.contains(&program)
            })
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.host().history.clear();
    }

    pub fn link_target(&self, link: impl AsRef<Path>) -> Option<PathBuf> {
        self.host().links.get(link.as_ref()).cloned()
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.host().exists(path.as_ref())
    }

    pub fn listing(&self, dir: impl AsRef<Path>) -> Vec<String> {
        self.host()
            .listings
            .get(dir.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    fn host(&self) -> MutexGuard<'_, SimulatedHost> {
        self.host.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn host_mut(&mut self) -> &mut SimulatedHost {
        self.host
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput> {
        if self.echo {
            println!("{command}");
        }

        let mut host = self.host();
        host.history.push(command.clone());
        Ok(host.apply(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulates_directories_and_links() {
        let executor = RecordingExecutor::new();

        executor
            .run(ShellCommand::new("mkdir -p -- \"/srv/app1\""))
            .await
            .unwrap();
        executor
            .run(ShellCommand::new("ln -sfT -- \"/srv/app1\" \"/srv/app\""))
            .await
            .unwrap();

        assert!(executor.exists("/srv/app1"));
        assert!(executor.exists("/srv"));
        assert_eq!(
            executor.link_target("/srv/app"),
            Some(PathBuf::from("/srv/app1"))
        );

        let output = executor
            .run(ShellCommand::new("readlink -- \"/srv/app\""))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "/srv/app1");
    }

    #[tokio::test]
    async fn test_relative_operands_resolve_against_working_directory() {
        let executor = RecordingExecutor::new().with_listing("/backups", ["a", "b", "c"]);

        executor
            .run(ShellCommand::new("rm -- \"a\" \"b\"").in_dir("/backups"))
            .await
            .unwrap();

        assert_eq!(executor.listing("/backups"), vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_redirect_target_appears_in_listing() {
        let executor = RecordingExecutor::new().with_listing("/backups", ["a"]);

        executor
            .run(ShellCommand::new("pg_dump db | gzip > \"b\"").in_dir("/backups"))
            .await
            .unwrap();
        executor
            .run(ShellCommand::new("echo done > \"/tmp/out.log\""))
            .await
            .unwrap();

        assert_eq!(executor.listing("/backups"), vec!["a".to_string(), "b".to_string()]);
        assert!(executor.exists("/backups/b"));
        assert_eq!(executor.listing("/tmp"), vec!["out.log".to_string()]);

        let output = executor
            .run(ShellCommand::new("ls -- \"/backups\""))
            .await
            .unwrap();
        assert_eq!(output.stdout.split_whitespace().count(), 2);
    }

    #[tokio::test]
    async fn test_probes_are_not_mutations() {
        let executor = RecordingExecutor::new();

        executor
            .probe(ShellCommand::new("test -e \"/srv\""))
            .await
            .unwrap();
        executor
            .run(ShellCommand::new("touch -- \"/srv/file\""))
            .await
            .unwrap();

        assert_eq!(executor.history().len(), 2);
        assert_eq!(executor.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_pattern() {
        let executor = RecordingExecutor::new().fail_on("git pull");

        assert!(executor.run(ShellCommand::new("git pull")).await.is_err());
        assert!(executor.run(ShellCommand::new("git fetch")).await.is_ok());
    }
}
