//! Canonical filesystem entities built from path strings or attributed records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::value::scalar;
use crate::error::{DeployError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    File,
    Directory,
    Symlink,
}

impl FromStr for EntityKind {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" | "f" => Ok(EntityKind::File),
            "directory" | "dir" | "d" => Ok(EntityKind::Directory),
            "symlink" | "link" | "l" => Ok(EntityKind::Symlink),
            other => Err(DeployError::config(format!(
                "Unknown filesystem entity type: {other}"
            ))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::File => "file",
            EntityKind::Directory => "directory",
            EntityKind::Symlink => "symlink",
        };
        write!(f, "{name}")
    }
}

/// Attribute values used when a descriptor does not carry its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDefaults {
    pub owner: String,
    pub group: String,
    pub mode: String,
    pub dir_mode: String,
}

impl Default for EntityDefaults {
    fn default() -> Self {
        Self {
            owner: "www-data".to_string(),
            group: "www-data".to_string(),
            mode: "0644".to_string(),
            dir_mode: "755".to_string(),
        }
    }
}

/// Caller-forced attributes. A forced value only wins over the descriptor
/// when it differs from the default.
#[derive(Debug, Clone, Default)]
pub struct EntityOverrides {
    pub kind: Option<EntityKind>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<String>,
}

impl EntityOverrides {
    pub fn kind(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}

/// A file, directory or symlink with ownership and permissions.
///
/// For symlinks `path` is what the link resolves to and `target` is where
/// the link itself is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntity {
    pub path: PathBuf,
    pub kind: EntityKind,
    pub owner: String,
    pub group: String,
    pub mode: String,
    pub target: Option<PathBuf>,
}

impl FsEntity {
    pub fn file(path: impl Into<PathBuf>, defaults: &EntityDefaults) -> Self {
        Self {
            path: path.into(),
            kind: EntityKind::File,
            owner: defaults.owner.clone(),
            group: defaults.group.clone(),
            mode: defaults.mode.clone(),
            target: None,
        }
    }

    pub fn directory(path: impl Into<PathBuf>, defaults: &EntityDefaults) -> Self {
        Self {
            kind: EntityKind::Directory,
            mode: defaults.dir_mode.clone(),
            ..Self::file(path, defaults)
        }
    }

    pub fn symlink(
        path: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        defaults: &EntityDefaults,
    ) -> Result<Self> {
        let entity = Self {
            kind: EntityKind::Symlink,
            target: Some(target.into()),
            ..Self::file(path, defaults)
        };
        entity.validate()?;
        Ok(entity)
    }

    /// Build an entity from a bare path string or a record with `path`/`text`
    /// and optional `type`, `owner`, `group`, `mode`, `target`.
    pub fn from_descriptor(
        descriptor: &Value,
        overrides: &EntityOverrides,
        defaults: &EntityDefaults,
    ) -> Result<Self> {
        let entity = match descriptor {
            Value::String(path) => Self::resolve(path, None, overrides, defaults)?,
            Value::Object(record) => {
                let path = record
                    .get("path")
                    .or_else(|| record.get("text"))
                    .and_then(scalar)
                    .ok_or_else(|| {
                        DeployError::config(format!(
                            "Filesystem descriptor needs `path` or `text`: {descriptor}"
                        ))
                    })?;
                Self::resolve(&path, Some(record), overrides, defaults)?
            }
            other => {
                return Err(DeployError::config(format!(
                    "Filesystem descriptor must be a string or a map, got {other}"
                )))
            }
        };

        entity.validate()?;
        Ok(entity)
    }

    fn resolve(
        path: &str,
        record: Option<&serde_json::Map<String, Value>>,
        overrides: &EntityOverrides,
        defaults: &EntityDefaults,
    ) -> Result<Self> {
        let field = |key: &str| record.and_then(|r| r.get(key)).and_then(scalar);

        let record_kind = field("type").map(|t| t.parse::<EntityKind>()).transpose()?;
        let kind = pick(overrides.kind, record_kind, EntityKind::default());

        let default_mode = if kind == EntityKind::Directory {
            &defaults.dir_mode
        } else {
            &defaults.mode
        };

        Ok(Self {
            path: PathBuf::from(path),
            kind,
            owner: pick(overrides.owner.clone(), field("owner"), defaults.owner.clone()),
            group: pick(overrides.group.clone(), field("group"), defaults.group.clone()),
            mode: pick(overrides.mode.clone(), field("mode"), default_mode.clone()),
            target: field("target").filter(|t| !t.is_empty()).map(PathBuf::from),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.kind != EntityKind::Symlink {
            return Ok(());
        }

        match &self.target {
            None => Err(DeployError::config(format!(
                "Symlink to {} has no target",
                self.path.display()
            ))),
            Some(target) if target == &self.path => Err(DeployError::config(format!(
                "Symlink target equals its source: {}",
                target.display()
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntityKind::Symlink
    }

    pub fn ownership(&self) -> String {
        format!("{}:{}", self.owner, self.group)
    }

    /// Copy of this entity with a relative link location anchored at `base`
    pub fn anchored_at(&self, base: &Path) -> Self {
        let mut entity = self.clone();
        entity.target = self.target.as_ref().map(|target| base.join(target));
        entity
    }
}

fn pick<T: PartialEq>(forced: Option<T>, record: Option<T>, default: T) -> T {
    match forced {
        Some(value) if value != default => value,
        _ => record.unwrap_or(default),
    }
}
