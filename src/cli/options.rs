use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Blue/green release tool for multi-module web applications
#[derive(Parser, Debug)]
#[command(name = "web-deploy")]
#[command(about = "Zero-downtime blue/green releases driven by a declarative config")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct WebDeployCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (repeat for trace level)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Print the commands a release would issue without touching the host
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Run commands on this host over SSH instead of locally
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// SSH port of the target host
    #[arg(long, global = true)]
    pub port: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Update every module into the inactive slot and switch it live
    Release {
        /// Release config (YAML or JSON)
        config: PathBuf,
        /// Check out this tag instead of pulling the branch head
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Show the live symlink and both slots
    Status {
        /// Release config (YAML or JSON)
        config: PathBuf,
    },
}

/// Where commands are executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    DryRun,
    Local,
    Ssh { host: String, port: Option<u16> },
}

impl From<&WebDeployCli> for Target {
    fn from(cli: &WebDeployCli) -> Self {
        match (&cli.host, cli.dry_run) {
            (_, true) => Target::DryRun,
            (Some(host), false) => Target::Ssh {
                host: host.clone(),
                port: cli.port,
            },
            (None, false) => Target::Local,
        }
    }
}

impl WebDeployCli {
    pub fn log_level(&self) -> tracing::Level {
        match self.verbosity {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_with_tag() {
        let cli = WebDeployCli::parse_from(["web-deploy", "-vv", "release", "deploy.yaml", "--tag", "v1.2"]);
        assert_eq!(cli.log_level(), tracing::Level::TRACE);
        assert_eq!(Target::from(&cli), Target::Local);
        match cli.command {
            Commands::Release { config, tag } => {
                assert_eq!(config, PathBuf::from("deploy.yaml"));
                assert_eq!(tag.as_deref(), Some("v1.2"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_wins_over_host() {
        let cli = WebDeployCli::parse_from([
            "web-deploy", "--dry-run", "--host", "web1", "status", "deploy.yaml",
        ]);
        assert_eq!(Target::from(&cli), Target::DryRun);
        assert_eq!(cli.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_ssh_target() {
        let cli = WebDeployCli::parse_from([
            "web-deploy", "--host", "web1", "--port", "2222", "status", "deploy.yaml",
        ]);
        assert_eq!(
            Target::from(&cli),
            Target::Ssh { host: "web1".to_string(), port: Some(2222) }
        );
    }
}
