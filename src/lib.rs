// Library interface for Strata
// The CLI binary and integration tests use these modules

pub mod assembler;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod config_discovery;
pub mod context;
pub mod error;
pub mod files;
pub mod gateway;
pub mod hash;
pub mod identity;
pub mod keys;
pub mod logging;
pub mod merger;
pub mod pipeline;
pub mod resource;
pub mod storage;
pub mod userconfig;
pub mod validate;
pub mod version;

// Re-export commonly used types
pub use assembler::ContextBuilder;
pub use context::Context;
pub use error::{ContextError, ErrorKind, Result};
pub use gateway::{ContextStore, ResourceStatus, StatusCode, WorkloadSpec};
pub use keys::KeyNamespace;
pub use pipeline::FileMap;
pub use storage::{FilesystemStore, MemoryStore, ObjectStore, VersionStore};
pub use userconfig::AppConfig;
pub use validate::{StructuralValidator, Validator};
pub use version::DatasetVersionResolver;
