//! Project modules, their hook pipelines and the release sequence

pub mod hooks;
pub mod module;
pub mod release;

pub use hooks::{Hook, HookPipeline, Priority};
pub use module::{
    DjangoSettings, FrontendSettings, ModuleKind, ModuleType, ProjectModule, PythonRuntime,
};
pub use release::{Project, ReleaseReport};
