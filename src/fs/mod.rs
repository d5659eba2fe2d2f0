//! Filesystem entity model and the primitives that realise it on a target host

pub mod api;
pub mod entity;

pub use api::FileSystem;
pub use entity::{EntityDefaults, EntityKind, EntityOverrides, FsEntity};
