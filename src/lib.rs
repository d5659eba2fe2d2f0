//! Web Deploy - blue/green release orchestration
//!
//! Assembles a release plan from a declarative config document, updates every
//! project module into the inactive deployment slot, atomically repoints the
//! live symlink and restarts the dependent services.

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod factory;
pub mod fs;
pub mod project;
pub mod system;
pub mod vcs;
pub mod virtualenv;

pub use error::{DeployError, Result};
pub use executor::{Executor, LocalExecutor, RecordingExecutor, ShellCommand, SshExecutor};
pub use factory::ProjectFactory;
pub use project::{Project, ProjectModule, ReleaseReport};
pub use system::System;
