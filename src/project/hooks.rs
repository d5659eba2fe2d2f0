//! Ordered post-update hooks of a project module

use std::fmt;

use crate::fs::FsEntity;

/// Where an explicitly added hook lands relative to the module's own hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Before,
    After,
}

impl Priority {
    pub const BEFORE: i64 = 1;
    pub const AFTER: i64 = 2;
}

impl Default for Priority {
    fn default() -> Self {
        Priority::After
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        if value == Self::BEFORE {
            Priority::Before
        } else {
            Priority::After
        }
    }
}

/// Actions a module can run after its sources were updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    InstallSystemPackages,
    InstallPythonPackages,
    BackupDatabase,
    Migrate,
    EnsureMediaRoot,
    EnsureStaticDir,
    CollectStatic,
    InstallFrontendTool,
    InstallFrontendPackages,
    BuildFrontend,
    /// Declared in config: link every entity, leaving existing links alone.
    /// Relative link locations resolve against the module location.
    CreateSymlinks(Vec<FsEntity>),
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::InstallSystemPackages => "install_system_packages",
            Hook::InstallPythonPackages => "install_python_packages",
            Hook::BackupDatabase => "backup_database",
            Hook::Migrate => "migrate",
            Hook::EnsureMediaRoot => "ensure_media_root",
            Hook::EnsureStaticDir => "ensure_static_dir",
            Hook::CollectStatic => "collect_static",
            Hook::InstallFrontendTool => "install_frontend_tool",
            Hook::InstallFrontendPackages => "install_frontend_packages",
            Hook::BuildFrontend => "build_frontend",
            Hook::CreateSymlinks(_) => "create_symlink",
        };
        write!(f, "{name}")
    }
}

/// Hooks in execution order: explicit "before" hooks, the intrinsic hooks,
/// then explicit "after" hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookPipeline<H> {
    hooks: Vec<H>,
}

impl<H> Default for HookPipeline<H> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<H> HookPipeline<H> {
    pub fn new(intrinsic: Vec<H>) -> Self {
        Self { hooks: intrinsic }
    }

    /// Splice tagged hooks around the existing ones without reordering them
    pub fn add_hooks<I, P>(&mut self, tagged: I)
    where
        I: IntoIterator<Item = (P, H)>,
        P: Into<Priority>,
    {
        let mut before = Vec::new();
        let mut after = Vec::new();
        for (priority, hook) in tagged {
            match priority.into() {
                Priority::Before => before.push(hook),
                Priority::After => after.push(hook),
            }
        }

        before.append(&mut self.hooks);
        before.append(&mut after);
        self.hooks = before;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, H> {
        self.hooks.iter()
    }

    pub fn as_slice(&self) -> &[H] {
        &self.hooks
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl<'a, H> IntoIterator for &'a HookPipeline<H> {
    type Item = &'a H;
    type IntoIter = std::slice::Iter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.hooks.iter()
    }
}
